use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::SupabaseClient;
use crate::backend::{BookingFilter, BookingSubscription};
use crate::errors::AppError;
use crate::models::BookingPatch;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug, PartialEq)]
enum Frame {
    Change(BookingPatch),
    Rejected(String),
    Closed,
    Ignored,
}

#[derive(Deserialize)]
struct PhoenixFrame {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

fn postgres_filter(filter: &BookingFilter) -> String {
    match filter {
        BookingFilter::Client(id) => format!("client_id=eq.{id}"),
        BookingFilter::Booking(id) => format!("id=eq.{id}"),
    }
}

fn join_message(topic: &str, filter: &BookingFilter, access_token: &str) -> serde_json::Value {
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "UPDATE",
                    "schema": "public",
                    "table": "bookings",
                    "filter": postgres_filter(filter),
                }]
            },
            "access_token": access_token,
        },
        "ref": "1",
        "join_ref": "1",
    })
}

fn heartbeat_message(msg_ref: u64) -> serde_json::Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

fn parse_frame(text: &str) -> Result<Frame, serde_json::Error> {
    let frame: PhoenixFrame = serde_json::from_str(text)?;
    match frame.event.as_str() {
        "postgres_changes" => {
            let data = &frame.payload["data"];
            if data["type"].as_str() != Some("UPDATE") {
                return Ok(Frame::Ignored);
            }
            let patch: BookingPatch = serde_json::from_value(data["record"].clone())?;
            Ok(Frame::Change(patch))
        }
        "phx_reply" if frame.payload["status"].as_str() == Some("error") => {
            let reason = frame.payload["response"]["reason"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| frame.payload["response"].to_string());
            Ok(Frame::Rejected(reason))
        }
        "phx_error" | "phx_close" => Ok(Frame::Closed),
        _ => Ok(Frame::Ignored),
    }
}

impl SupabaseClient {
    /// Joins a realtime channel for booking row updates. The socket lives in a
    /// spawned task owned by the returned subscription.
    pub(crate) async fn open_change_feed(
        &self,
        filter: BookingFilter,
    ) -> Result<BookingSubscription, AppError> {
        let (ws, _) = connect_async(self.realtime_endpoint())
            .await
            .map_err(|e| AppError::Backend(format!("realtime connection failed: {e}")))?;
        let (mut sink, mut stream) = ws.split();

        let topic = format!("realtime:{}", filter.topic());
        let join = join_message(&topic, &filter, &self.bearer());
        sink.send(Message::Text(join.to_string()))
            .await
            .map_err(|e| AppError::Backend(format!("realtime join failed: {e}")))?;

        tracing::info!(topic = %topic, "subscribed to booking updates");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task_topic = topic.clone();

        let task = tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut msg_ref: u64 = 1;

            loop {
                tokio::select! {
                    _ = heartbeat.tick() => {
                        msg_ref += 1;
                        let beat = heartbeat_message(msg_ref).to_string();
                        if sink.send(Message::Text(beat)).await.is_err() {
                            break;
                        }
                    }
                    frame = stream.next() => {
                        let text = match frame {
                            Some(Ok(Message::Text(text))) => text,
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => {
                                tracing::warn!(topic = %task_topic, error = %e, "realtime socket error");
                                break;
                            }
                        };

                        match parse_frame(&text) {
                            Ok(Frame::Change(patch)) => {
                                if !filter.matches(&patch) {
                                    continue;
                                }
                                if tx.send(patch).await.is_err() {
                                    break;
                                }
                            }
                            Ok(Frame::Rejected(reason)) => {
                                tracing::error!(topic = %task_topic, reason = %reason, "realtime join rejected");
                                break;
                            }
                            Ok(Frame::Closed) => break,
                            Ok(Frame::Ignored) => {}
                            Err(e) => {
                                tracing::warn!(topic = %task_topic, error = %e, "unparseable realtime frame");
                            }
                        }
                    }
                }
            }

            tracing::info!(topic = %task_topic, "realtime channel closed");
        });

        Ok(BookingSubscription::new(topic, rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use tokio::net::TcpListener;

    fn change_frame(record: serde_json::Value) -> String {
        json!({
            "topic": "realtime:booking_updates_user-1",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "schema": "public",
                    "table": "bookings",
                    "type": "UPDATE",
                    "commit_timestamp": "2025-06-16T10:05:00Z",
                    "record": record,
                    "old_record": { "id": "b1" }
                },
                "ids": [1]
            },
            "ref": null
        })
        .to_string()
    }

    #[test]
    fn test_parse_update_frame() {
        let frame = parse_frame(&change_frame(json!({
            "id": "b1",
            "client_id": "user-1",
            "status": "ON_WAY",
            "therapist_latitude": 14.6
        })))
        .unwrap();

        match frame {
            Frame::Change(patch) => {
                assert_eq!(patch.status, Some(BookingStatus::OnWay));
                assert_eq!(patch.therapist_latitude, Some(14.6));
                assert!(patch.therapist_longitude.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_parse_join_rejection() {
        let text = json!({
            "topic": "realtime:booking_updates_user-1",
            "event": "phx_reply",
            "payload": { "status": "error", "response": { "reason": "Invalid JWT" } },
            "ref": "1"
        })
        .to_string();
        assert_eq!(parse_frame(&text).unwrap(), Frame::Rejected("Invalid JWT".to_string()));
    }

    #[test]
    fn test_parse_ignores_acks_and_system_frames() {
        let ok_reply = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"2"}"#;
        assert_eq!(parse_frame(ok_reply).unwrap(), Frame::Ignored);
        let system = r#"{"topic":"realtime:x","event":"system","payload":{"status":"ok"},"ref":null}"#;
        assert_eq!(parse_frame(system).unwrap(), Frame::Ignored);
        assert_eq!(
            parse_frame(r#"{"topic":"realtime:x","event":"phx_close","payload":{}}"#).unwrap(),
            Frame::Closed
        );
    }

    #[test]
    fn test_join_message_scopes_filter() {
        let join = join_message(
            "realtime:therapist_location_b1",
            &BookingFilter::Booking("b1".to_string()),
            "token",
        );
        assert_eq!(join["event"], "phx_join");
        assert_eq!(join["payload"]["config"]["postgres_changes"][0]["filter"], "id=eq.b1");
        assert_eq!(join["payload"]["access_token"], "token");
    }

    #[tokio::test]
    async fn test_change_feed_over_websocket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();

            let join = ws.next().await.unwrap().unwrap();
            let join: serde_json::Value = serde_json::from_str(join.to_text().unwrap()).unwrap();
            assert_eq!(join["payload"]["config"]["postgres_changes"][0]["filter"], "client_id=eq.user-1");

            // A row for another client must be filtered out client-side too.
            ws.send(Message::Text(change_frame(json!({"id": "x", "client_id": "user-2", "status": "ACCEPTED"}))))
                .await
                .unwrap();
            ws.send(Message::Text(change_frame(json!({"id": "b1", "client_id": "user-1", "status": "ACCEPTED"}))))
                .await
                .unwrap();
            // Keep the socket open until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = SupabaseClient::new("http://unused".to_string(), "anon".to_string())
            .with_realtime_url(format!("ws://{addr}/realtime/v1/websocket"));
        let mut sub = client
            .open_change_feed(BookingFilter::Client("user-1".to_string()))
            .await
            .unwrap();

        let patch = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patch.id.as_deref(), Some("b1"));
        assert_eq!(patch.status, Some(BookingStatus::Accepted));
    }
}
