//! Local modification clock consulted by last-write-wins sync.

use chrono::{DateTime, Duration, Utc};

use crate::errors::Result;
use crate::keys;
use crate::store::{load, save, KeyValueStore};

pub fn local_last_modified(store: &dyn KeyValueStore) -> Option<DateTime<Utc>> {
    load(store, keys::LOCAL_LAST_MODIFIED)
}

/// Records a local mutation at `now` and returns the stored stamp.
///
/// The stamp never moves backwards: a clock that reads at or before the
/// previous stamp yields `previous + 1ms`.
pub fn mark_local_modified(store: &dyn KeyValueStore, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let stamp = match local_last_modified(store) {
        Some(previous) if now <= previous => previous + Duration::milliseconds(1),
        _ => now,
    };
    save(store, keys::LOCAL_LAST_MODIFIED, &stamp)?;
    Ok(stamp)
}

/// Overwrites the stamp, used after a remote snapshot has been adopted.
pub fn set_local_modified(store: &dyn KeyValueStore, stamp: DateTime<Utc>) -> Result<()> {
    save(store, keys::LOCAL_LAST_MODIFIED, &stamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    #[test]
    fn stamps_are_strictly_increasing() {
        let store = MemoryStore::new();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert!(local_last_modified(&store).is_none());

        let first = mark_local_modified(&store, t).unwrap();
        let second = mark_local_modified(&store, t).unwrap();
        let third = mark_local_modified(&store, t - Duration::hours(1)).unwrap();

        assert_eq!(first, t);
        assert!(second > first);
        assert!(third > second);
        assert_eq!(local_last_modified(&store), Some(third));
    }
}
