//! Change notifications from the remote mirror over a Phoenix-style WebSocket channel.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::driver::SyncTrigger;
use crate::error::{Result, SyncError};

const HEARTBEAT: Duration = Duration::from_secs(30);

/// Whether a channel frame announces a row change.
pub fn is_change_frame(frame: &Value) -> bool {
    matches!(
        frame.get("event").and_then(Value::as_str),
        Some("postgres_changes" | "INSERT" | "UPDATE")
    )
}

/// Websocket address of the realtime service that sits next to a REST `base_url`.
pub fn realtime_url_for(base_url: &str, key: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).map_err(|err| SyncError::InvalidUrl {
        url: base_url.to_string(),
        source: err,
    })?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(SyncError::Realtime(format!(
                "no realtime endpoint for {other} URLs"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| SyncError::Realtime(format!("cannot switch {base_url} to {scheme}")))?;
    let path = format!("{}/realtime/v1/websocket", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

/// Listens for row changes and turns them into [`SyncTrigger::RemoteChange`].
#[derive(Debug, Clone)]
pub struct RealtimeListener {
    url: Url,
    table: String,
    topic: String,
    access_token: Option<String>,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RealtimeListener {
    pub fn new(url: &str, table: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|err| SyncError::InvalidUrl {
            url: url.to_string(),
            source: err,
        })?;
        Ok(Self {
            url,
            table: table.to_string(),
            topic: format!("realtime:public:{table}"),
            access_token: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        })
    }

    /// Token sent with the channel join; the mirror's API key when no user token exists.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Join request subscribing to every change of the mirrored table.
    fn join_frame(&self) -> Value {
        let mut payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": self.table }
                ]
            }
        });
        if let Some(token) = &self.access_token {
            payload["access_token"] = json!(token);
        }
        json!({ "topic": self.topic, "event": "phx_join", "payload": payload, "ref": "1" })
    }

    pub fn spawn(
        self,
        triggers: mpsc::Sender<SyncTrigger>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(triggers, shutdown))
    }

    async fn run(self, triggers: mpsc::Sender<SyncTrigger>, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                result = self.listen(&triggers) => match result {
                    Ok(()) => attempt = 0,
                    Err(err) => {
                        warn!(url = %self.url, %err, "realtime connection failed");
                        attempt = attempt.saturating_add(1);
                    }
                },
                _ = shutdown.changed() => break,
            }
            if triggers.is_closed() || *shutdown.borrow() {
                break;
            }

            let backoff = self.backoff_for_attempt(attempt);
            debug!(seconds = backoff.as_secs_f32(), "waiting before reconnecting");
            tokio::select! {
                _ = sleep(backoff) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!("realtime listener stopped");
    }

    async fn listen(&self, triggers: &mpsc::Sender<SyncTrigger>) -> Result<()> {
        info!(url = %self.url, topic = %self.topic, "connecting to realtime channel");
        let (stream, _) = connect_async(self.url.clone())
            .await
            .map_err(|err| SyncError::Realtime(err.to_string()))?;
        let (mut sender, mut receiver) = stream.split();

        sender
            .send(Message::Text(self.join_frame().to_string()))
            .await
            .map_err(|err| SyncError::Realtime(err.to_string()))?;
        if triggers.send(SyncTrigger::Connected).await.is_err() {
            return Ok(());
        }

        let mut heartbeat = interval(HEARTBEAT);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_ref: u64 = 2;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = json!({ "topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": next_ref.to_string() });
                    next_ref += 1;
                    sender
                        .send(Message::Text(beat.to_string()))
                        .await
                        .map_err(|err| SyncError::Realtime(err.to_string()))?;
                }
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let frame: Value = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(err) => {
                                debug!(%err, "ignoring non-JSON frame");
                                continue;
                            }
                        };
                        if is_change_frame(&frame) {
                            debug!("remote row changed");
                            if triggers.send(SyncTrigger::RemoteChange).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        sender
                            .send(Message::Pong(payload))
                            .await
                            .map_err(|err| SyncError::Realtime(err.to_string()))?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(frame = ?frame, "realtime channel closed by server");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(SyncError::Realtime(err.to_string())),
                    None => return Ok(()),
                },
            }
        }
    }

    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(6));
        let delay = self.initial_backoff * factor;
        delay.min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_change_frames() {
        assert!(is_change_frame(&json!({ "event": "postgres_changes", "payload": {} })));
        assert!(is_change_frame(&json!({ "event": "UPDATE" })));
        assert!(!is_change_frame(&json!({ "event": "phx_reply" })));
        assert!(!is_change_frame(&json!({ "topic": "phoenix" })));
    }

    #[test]
    fn join_subscribes_to_table_changes() {
        let listener = RealtimeListener::new("wss://mirror.example/realtime/v1/websocket", "mission_bridge")
            .unwrap()
            .with_access_token("anon");
        let frame = listener.join_frame();

        assert_eq!(frame["topic"], "realtime:public:mission_bridge");
        assert_eq!(frame["event"], "phx_join");
        assert_eq!(frame["payload"]["access_token"], "anon");
        assert_eq!(
            frame["payload"]["config"]["postgres_changes"],
            json!([{ "event": "*", "schema": "public", "table": "mission_bridge" }])
        );
    }

    #[test]
    fn websocket_address_follows_the_rest_endpoint() {
        let url = realtime_url_for("https://abc.mirror.example/", "anon-key").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abc.mirror.example/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
        let local = realtime_url_for("http://localhost:54321", "k").unwrap();
        assert_eq!(local.as_str(), "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0");
        assert!(realtime_url_for("ftp://mirror.example", "k").is_err());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let listener = RealtimeListener::new("wss://mirror.example/realtime/v1/websocket", "mission_bridge").unwrap();
        assert_eq!(listener.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(listener.backoff_for_attempt(3), Duration::from_secs(8));
        assert_eq!(listener.backoff_for_attempt(10), Duration::from_secs(30));
    }
}
