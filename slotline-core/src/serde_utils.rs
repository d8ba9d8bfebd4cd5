use crate::errors::{Result, SlotlineError};

/// Serializes a value to pretty JSON with canonical error handling.
pub fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| SlotlineError::SerializationError(err.to_string()))
}

/// Converts a value into a JSON document for the key-value store.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|err| SlotlineError::SerializationError(err.to_string()))
}

/// Deserializes a JSON string into the provided type with shared error semantics.
pub fn from_json_str<T: serde::de::DeserializeOwned>(input: &str) -> Result<T> {
    serde_json::from_str(input).map_err(|err| SlotlineError::DeserializationError(err.to_string()))
}

/// Deserializes a stored JSON document.
pub fn from_document<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| SlotlineError::DeserializationError(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_rejects_wrong_shape() {
        let value = serde_json::json!({"key": "value"});
        let err = from_document::<Vec<u8>>(value).unwrap_err();
        assert!(matches!(err, SlotlineError::DeserializationError(_)));
    }

    #[test]
    fn pretty_json_parses_back() {
        let value = serde_json::json!({"revenue": 12.5});
        let json = to_pretty_json(&value).expect("serialize");
        let decoded: serde_json::Value = from_json_str(&json).expect("deserialize");
        assert_eq!(decoded["revenue"], 12.5);
    }
}
