//! Per-stream HTTP exchange
//!
//! One [`HttpExchange`] exists per active request. It accepts inbound
//! semantic events from the multiplexer, drives the application task for
//! its stream, and tracks the outbound framing state the multiplexer
//! consults before sending.

use crate::app::{AppSender, AppSpawner, Scope};
use crate::error::{MuxError, Result};
use crate::events::{StreamEvent, StreamId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Exchange lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Request received, body may still arrive
    Open,
    /// Peer finished its body; only outbound traffic remains
    HalfClosedRemote,
    /// Terminal; the stream table entry is gone
    Closed,
}

/// One logical HTTP request/response cycle bound to one stream
pub struct HttpExchange {
    stream_id: StreamId,
    state: ExchangeState,
    to_app: Option<AppSender>,
    app_task: Option<JoinHandle<()>>,
    headers_sent: bool,
    end_sent: bool,
}

impl HttpExchange {
    pub(crate) fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            state: ExchangeState::Open,
            to_app: None,
            app_task: None,
            headers_sent: false,
            end_sent: false,
        }
    }

    /// Deliver one inbound semantic event to this exchange
    ///
    /// `Request` spawns the application task; `Body`/`EndBody` are
    /// forwarded to it in arrival order. Events for a side that already
    /// finished are dropped as stream-local protocol violations.
    pub async fn handle<S>(&mut self, event: StreamEvent, spawner: &S, outbound: AppSender) -> Result<()>
    where
        S: AppSpawner + ?Sized,
    {
        match event {
            StreamEvent::Request {
                stream_id,
                headers,
                http_version,
                method,
                raw_path,
            } => {
                if self.to_app.is_some() {
                    return Err(MuxError::Protocol(format!(
                        "second request on stream {}",
                        stream_id
                    )));
                }
                let scope = Scope {
                    stream_id,
                    http_version,
                    method,
                    raw_path,
                    headers,
                };
                let (body_tx, body_rx) = mpsc::unbounded_channel();
                let task = spawner.spawn_app(scope, body_rx, outbound).await?;
                self.to_app = Some(body_tx);
                self.app_task = Some(task);
                debug!("Spawned application for stream {}", stream_id);
            }
            StreamEvent::Body { .. } => {
                if self.state == ExchangeState::Open {
                    self.forward(event);
                } else {
                    warn!("Dropping body on finished stream {}", self.stream_id);
                }
            }
            StreamEvent::EndBody { .. } => {
                if self.state == ExchangeState::Open {
                    self.forward(event);
                    self.state = ExchangeState::HalfClosedRemote;
                } else {
                    warn!("Dropping end-of-body on finished stream {}", self.stream_id);
                }
            }
            StreamEvent::StreamClosed { .. } => self.close(),
            StreamEvent::Response { stream_id, .. } => {
                return Err(MuxError::Protocol(format!(
                    "response event received inbound on stream {}",
                    stream_id
                )));
            }
        }
        Ok(())
    }

    fn forward(&mut self, event: StreamEvent) {
        if let Some(to_app) = &self.to_app {
            if to_app.send(event).is_err() {
                debug!("Application for stream {} already finished", self.stream_id);
            }
        }
    }

    /// Terminal close: detach and cancel the application task
    ///
    /// Cancellation is best-effort; the application may already be
    /// mid-response.
    pub fn close(&mut self) {
        self.state = ExchangeState::Closed;
        self.to_app = None;
        if let Some(task) = self.app_task.take() {
            task.abort();
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub(crate) fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub(crate) fn mark_headers_sent(&mut self) {
        self.headers_sent = true;
    }

    pub(crate) fn end_sent(&self) -> bool {
        self.end_sent
    }

    pub(crate) fn mark_end_sent(&mut self) {
        self.end_sent = true;
    }
}

impl Drop for HttpExchange {
    fn drop(&mut self) {
        if let Some(task) = self.app_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::FnSpawner;
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    fn request_event(stream_id: StreamId) -> StreamEvent {
        StreamEvent::Request {
            stream_id,
            headers: vec![],
            http_version: "3".to_string(),
            method: "GET".to_string(),
            raw_path: Bytes::from_static(b"/"),
        }
    }

    fn recording_spawner(
        log: Arc<Mutex<Vec<StreamEvent>>>,
    ) -> impl AppSpawner {
        FnSpawner(move |_scope: Scope, mut receiver: crate::app::AppReceiver, _sender: AppSender| {
            let log = log.clone();
            async move {
                while let Some(event) = receiver.recv().await {
                    log.lock().unwrap().push(event);
                }
            }
        })
    }

    #[tokio::test]
    async fn test_body_forwarded_to_app_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let spawner = recording_spawner(log.clone());
        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
        let id = StreamId::new(0);
        let mut exchange = HttpExchange::new(id);

        exchange
            .handle(request_event(id), &spawner, outbound_tx.clone())
            .await
            .unwrap();
        exchange
            .handle(
                StreamEvent::Body {
                    stream_id: id,
                    data: Bytes::from_static(b"abc"),
                },
                &spawner,
                outbound_tx.clone(),
            )
            .await
            .unwrap();
        exchange
            .handle(StreamEvent::EndBody { stream_id: id }, &spawner, outbound_tx.clone())
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                StreamEvent::Body {
                    stream_id: id,
                    data: Bytes::from_static(b"abc"),
                },
                StreamEvent::EndBody { stream_id: id },
            ]
        );
        assert_eq!(exchange.state(), ExchangeState::HalfClosedRemote);
    }

    #[tokio::test]
    async fn test_body_after_end_is_dropped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let spawner = recording_spawner(log.clone());
        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
        let id = StreamId::new(4);
        let mut exchange = HttpExchange::new(id);

        exchange
            .handle(request_event(id), &spawner, outbound_tx.clone())
            .await
            .unwrap();
        exchange
            .handle(StreamEvent::EndBody { stream_id: id }, &spawner, outbound_tx.clone())
            .await
            .unwrap();
        exchange
            .handle(
                StreamEvent::Body {
                    stream_id: id,
                    data: Bytes::from_static(b"late"),
                },
                &spawner,
                outbound_tx.clone(),
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let events = log.lock().unwrap().clone();
        assert_eq!(events, vec![StreamEvent::EndBody { stream_id: id }]);
    }

    #[tokio::test]
    async fn test_inbound_response_is_protocol_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let spawner = recording_spawner(log.clone());
        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
        let id = StreamId::new(12);
        let mut exchange = HttpExchange::new(id);
        exchange
            .handle(request_event(id), &spawner, outbound_tx.clone())
            .await
            .unwrap();

        // Response is an outbound-only variant.
        let result = exchange
            .handle(
                StreamEvent::Response {
                    stream_id: id,
                    status_code: 200,
                    headers: vec![],
                },
                &spawner,
                outbound_tx.clone(),
            )
            .await;
        match result {
            Err(MuxError::Protocol(_)) => {}
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_request_is_protocol_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let spawner = recording_spawner(log.clone());
        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
        let id = StreamId::new(16);
        let mut exchange = HttpExchange::new(id);
        exchange
            .handle(request_event(id), &spawner, outbound_tx.clone())
            .await
            .unwrap();

        let result = exchange
            .handle(request_event(id), &spawner, outbound_tx.clone())
            .await;
        match result {
            Err(MuxError::Protocol(_)) => {}
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_aborts_app_task() {
        let spawner = FnSpawner(|_scope: Scope, mut receiver: crate::app::AppReceiver, _sender: AppSender| async move {
            // Would run forever without cancellation.
            while receiver.recv().await.is_some() {}
            std::future::pending::<()>().await;
        });
        let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
        let id = StreamId::new(8);
        let mut exchange = HttpExchange::new(id);
        exchange
            .handle(request_event(id), &spawner, outbound_tx.clone())
            .await
            .unwrap();

        exchange.close();
        assert_eq!(exchange.state(), ExchangeState::Closed);
    }
}
