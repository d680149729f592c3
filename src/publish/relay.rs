//! Relay connections
//!
//! `RelaySink` keeps one websocket open across publishes and reconnects
//! lazily after any failure. `query_latest` opens short-lived connections to
//! look an event up.

use super::event::SignedEvent;
use crate::import::ImportError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Destination for signed events
#[async_trait]
pub trait EventSink: Send {
    /// Submit one event and wait for it to be accepted
    async fn submit(&mut self, event: &SignedEvent) -> Result<(), ImportError>;

    /// Sink address for display
    fn address(&self) -> &str;
}

/// Relay acknowledgement for a submitted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub event_id: String,
    pub accepted: bool,
    pub message: String,
}

/// Incoming relay messages this client cares about
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Ok(Ack),
    Event { subscription: String, event: SignedEvent },
    EndOfStoredEvents(String),
    Notice(String),
    Closed { subscription: String, message: String },
    Other,
}

impl RelayMessage {
    /// Parse a relay message, returning `Other` for anything unrecognized
    pub fn parse(text: &str) -> Self {
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) else {
            return RelayMessage::Other;
        };
        let str_at = |i: usize| items.get(i).and_then(Value::as_str).unwrap_or_default().to_string();

        match items.first().and_then(Value::as_str) {
            Some("OK") => RelayMessage::Ok(Ack {
                event_id: str_at(1),
                accepted: items.get(2).and_then(Value::as_bool).unwrap_or(false),
                message: str_at(3),
            }),
            Some("EVENT") => match items.get(2).cloned().map(serde_json::from_value::<SignedEvent>) {
                Some(Ok(event)) => RelayMessage::Event {
                    subscription: str_at(1),
                    event,
                },
                _ => RelayMessage::Other,
            },
            Some("EOSE") => RelayMessage::EndOfStoredEvents(str_at(1)),
            Some("NOTICE") => RelayMessage::Notice(str_at(1)),
            Some("CLOSED") => RelayMessage::Closed {
                subscription: str_at(1),
                message: str_at(2),
            },
            _ => RelayMessage::Other,
        }
    }
}

async fn connect(url: &str, timeout: Duration) -> Result<Socket, ImportError> {
    match tokio::time::timeout(timeout, connect_async(url)).await {
        Ok(Ok((socket, _response))) => Ok(socket),
        Ok(Err(e)) => Err(ImportError::Sink(format!("cannot connect to {}: {}", url, e))),
        Err(_) => Err(ImportError::Sink(format!(
            "connecting to {} timed out after {:?}",
            url, timeout
        ))),
    }
}

/// Read the next text frame; `None` when the relay closed the connection
async fn next_text(socket: &mut Socket) -> Result<Option<String>, ImportError> {
    while let Some(message) = socket.next().await {
        match message.map_err(|e| ImportError::Sink(e.to_string()))? {
            Message::Text(text) => return Ok(Some(text)),
            Message::Close(_) => return Ok(None),
            // Pings are answered by tungstenite itself
            _ => continue,
        }
    }
    Ok(None)
}

/// Event sink backed by a single relay
pub struct RelaySink {
    url: String,
    connect_timeout: Duration,
    ack_timeout: Duration,
    socket: Option<Socket>,
}

impl RelaySink {
    pub fn new(url: impl Into<String>, connect_timeout: Duration, ack_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            ack_timeout,
            socket: None,
        }
    }

    async fn socket(&mut self) -> Result<&mut Socket, ImportError> {
        if self.socket.is_none() {
            info!("Connecting to relay {}", self.url);
            self.socket = Some(connect(&self.url, self.connect_timeout).await?);
        }
        self.socket
            .as_mut()
            .ok_or_else(|| ImportError::Sink("relay connection unavailable".into()))
    }

    async fn send_and_wait(&mut self, event: &SignedEvent) -> Result<Ack, ImportError> {
        let frame = serde_json::to_string(&json!(["EVENT", event]))?;
        let ack_timeout = self.ack_timeout;
        let url = self.url.clone();
        let socket = self.socket().await?;

        socket
            .send(Message::Text(frame))
            .await
            .map_err(|e| ImportError::Sink(format!("send to {} failed: {}", url, e)))?;

        match tokio::time::timeout(ack_timeout, wait_for_ack(socket, &event.id, &url)).await {
            Ok(result) => result,
            Err(_) => Err(ImportError::Sink(format!(
                "no acknowledgement from {} within {:?}",
                url, ack_timeout
            ))),
        }
    }
}

async fn wait_for_ack(socket: &mut Socket, event_id: &str, url: &str) -> Result<Ack, ImportError> {
    loop {
        let Some(text) = next_text(socket).await? else {
            return Err(ImportError::Sink(format!("{} closed the connection", url)));
        };
        match RelayMessage::parse(&text) {
            RelayMessage::Ok(ack) if ack.event_id == event_id => return Ok(ack),
            RelayMessage::Notice(notice) => warn!("Relay notice from {}: {}", url, notice),
            other => debug!("Ignoring relay message {:?}", other),
        }
    }
}

#[async_trait]
impl EventSink for RelaySink {
    async fn submit(&mut self, event: &SignedEvent) -> Result<(), ImportError> {
        let ack = match self.send_and_wait(event).await {
            Ok(ack) => ack,
            Err(e) => {
                // Reconnect on the next submit
                self.socket = None;
                return Err(e);
            }
        };

        if ack.accepted {
            if !ack.message.is_empty() {
                debug!("Relay accepted {}: {}", ack.event_id, ack.message);
            }
            Ok(())
        } else {
            Err(ImportError::Rejected(format!("{}: {}", ack.event_id, ack.message)))
        }
    }

    fn address(&self) -> &str {
        &self.url
    }
}

/// Newest event matching `filter` across `relays`.
///
/// Relays that cannot be reached or time out are skipped; only events with a
/// valid signature are considered.
pub async fn query_latest(
    relays: &[String],
    filter: Value,
    timeout: Duration,
) -> Option<SignedEvent> {
    let mut newest: Option<SignedEvent> = None;

    for url in relays {
        match tokio::time::timeout(timeout, query_relay(url, &filter, timeout)).await {
            Ok(Ok(events)) => {
                for event in events {
                    if let Err(e) = event.verify() {
                        warn!("Discarding event from {}: {}", url, e);
                        continue;
                    }
                    if newest.as_ref().map_or(true, |n| event.created_at > n.created_at) {
                        newest = Some(event);
                    }
                }
            }
            Ok(Err(e)) => warn!("Query to {} failed: {}", url, e),
            Err(_) => warn!("Query to {} timed out", url),
        }
    }

    newest
}

async fn query_relay(url: &str, filter: &Value, timeout: Duration) -> Result<Vec<SignedEvent>, ImportError> {
    const SUBSCRIPTION: &str = "wiki-importer";

    let mut socket = connect(url, timeout).await?;
    let request = serde_json::to_string(&json!(["REQ", SUBSCRIPTION, filter]))?;
    socket
        .send(Message::Text(request))
        .await
        .map_err(|e| ImportError::Sink(e.to_string()))?;

    let mut events = Vec::new();
    while let Some(text) = next_text(&mut socket).await? {
        match RelayMessage::parse(&text) {
            RelayMessage::Event { subscription, event } if subscription == SUBSCRIPTION => {
                events.push(event)
            }
            RelayMessage::EndOfStoredEvents(subscription) if subscription == SUBSCRIPTION => break,
            RelayMessage::Closed { message, .. } => {
                return Err(ImportError::Sink(format!("subscription closed: {}", message)))
            }
            _ => {}
        }
    }

    let close = serde_json::to_string(&json!(["CLOSE", SUBSCRIPTION]))?;
    let _ = socket.send(Message::Text(close)).await;
    let _ = socket.close(None).await;

    Ok(events)
}
