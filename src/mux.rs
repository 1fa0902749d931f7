//! Connection multiplexer
//!
//! One [`Http3Multiplexer`] per QUIC connection. It owns the table of
//! active exchanges keyed by stream ID, translates framing events into
//! semantic events on the way in, and semantic events into wire-level
//! send calls on the way out. It never runs application logic itself.
//!
//! The multiplexer is driven cooperatively: the connection's event loop
//! alternates between `handle_transport_event` for inbound traffic and
//! `send_stream_event` for events the application tasks push through the
//! outbound channel. Each call runs to completion before the next, so
//! the stream table needs no locking.

use crate::app::{AppSender, AppSpawner};
use crate::config::MuxConfig;
use crate::error::{MuxError, Result};
use crate::events::{Header, StreamEvent, StreamId};
use crate::exchange::HttpExchange;
use crate::headers::extract_method_and_path;
use crate::transport::{H3Event, H3Transport};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const HTTP_VERSION: &str = "3";
const PROTOCOL_LABEL: &str = "h3";

/// HTTP/3 request multiplexer for one QUIC connection
pub struct Http3Multiplexer<T: H3Transport, S: AppSpawner> {
    config: Arc<MuxConfig>,
    transport: T,
    spawner: Arc<S>,
    streams: HashMap<StreamId, HttpExchange>,
    outbound_tx: AppSender,
    outbound_rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl<T: H3Transport, S: AppSpawner> Http3Multiplexer<T, S> {
    pub fn new(config: Arc<MuxConfig>, transport: T, spawner: Arc<S>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport,
            spawner,
            streams: HashMap::new(),
            outbound_tx,
            outbound_rx,
        }
    }

    /// Inbound path: interpret one raw transport event
    ///
    /// Events for the same stream reach its exchange in arrival order; a
    /// data event flagged as stream-end yields `Body` then `EndBody`,
    /// even for an empty chunk. Stream-local violations (unknown stream,
    /// malformed request, duplicate request) are logged and contained;
    /// they never tear down the connection.
    pub async fn handle_transport_event(&mut self, event: T::Event) -> Result<()> {
        for framing_event in self.transport.handle_event(event)? {
            match framing_event {
                H3Event::RequestReceived {
                    stream_id,
                    headers,
                    stream_ended,
                } => {
                    self.create_stream(stream_id, headers, stream_ended).await?;
                }
                H3Event::DataReceived {
                    stream_id,
                    data,
                    stream_ended,
                } => {
                    let Some(exchange) = self.streams.get_mut(&stream_id) else {
                        warn!("Dropping data for unknown stream {}", stream_id);
                        continue;
                    };
                    exchange
                        .handle(
                            StreamEvent::Body { stream_id, data },
                            self.spawner.as_ref(),
                            self.outbound_tx.clone(),
                        )
                        .await?;
                    if stream_ended {
                        exchange
                            .handle(
                                StreamEvent::EndBody { stream_id },
                                self.spawner.as_ref(),
                                self.outbound_tx.clone(),
                            )
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn create_stream(
        &mut self,
        stream_id: StreamId,
        headers: Vec<Header>,
        stream_ended: bool,
    ) -> Result<()> {
        if self.streams.contains_key(&stream_id) {
            warn!("Duplicate request on stream {}, keeping first exchange", stream_id);
            return Ok(());
        }

        let (method, raw_path) = match extract_method_and_path(&headers) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!("Refusing malformed request on stream {}: {}", stream_id, error);
                return self.refuse_stream(stream_id).await;
            }
        };

        debug!("New request on stream {}: {} {:?}", stream_id, method, raw_path);
        let mut exchange = HttpExchange::new(stream_id);
        exchange
            .handle(
                StreamEvent::Request {
                    stream_id,
                    headers,
                    http_version: HTTP_VERSION.to_string(),
                    method,
                    raw_path,
                },
                self.spawner.as_ref(),
                self.outbound_tx.clone(),
            )
            .await?;
        if stream_ended {
            exchange
                .handle(
                    StreamEvent::EndBody { stream_id },
                    self.spawner.as_ref(),
                    self.outbound_tx.clone(),
                )
                .await?;
        }
        self.streams.insert(stream_id, exchange);
        Ok(())
    }

    /// Refuse a stream without creating an exchange for it
    async fn refuse_stream(&mut self, stream_id: StreamId) -> Result<()> {
        let mut headers = vec![(
            Bytes::from_static(b":status"),
            Bytes::from_static(b"400"),
        )];
        headers.extend(self.config.response_headers(PROTOCOL_LABEL));
        self.transport.send_headers(stream_id, &headers, true)?;
        self.transport.flush().await
    }

    /// Outbound path: translate one semantic event into send calls
    ///
    /// Each call results in at most one flush. Send rejections and
    /// ordering violations propagate to the caller as recoverable
    /// errors; nothing is considered sent on failure.
    pub async fn send_stream_event(&mut self, event: StreamEvent) -> Result<()> {
        match event {
            StreamEvent::Response {
                stream_id,
                status_code,
                headers,
            } => {
                let exchange = self
                    .streams
                    .get_mut(&stream_id)
                    .ok_or(MuxError::UnknownStream(stream_id))?;
                if exchange.headers_sent() {
                    return Err(MuxError::ResponseAlreadySent(stream_id));
                }
                let mut block = Vec::with_capacity(headers.len() + 4);
                block.push((
                    Bytes::from_static(b":status"),
                    Bytes::from(status_code.to_string()),
                ));
                block.extend(headers);
                block.extend(self.config.response_headers(PROTOCOL_LABEL));
                self.transport.send_headers(stream_id, &block, false)?;
                exchange.mark_headers_sent();
                debug!("Sent response headers for stream {}: {}", stream_id, status_code);
                self.transport.flush().await
            }
            StreamEvent::Body { stream_id, data } => {
                let exchange = self
                    .streams
                    .get_mut(&stream_id)
                    .ok_or(MuxError::UnknownStream(stream_id))?;
                if !exchange.headers_sent() {
                    return Err(MuxError::ResponseNotSent(stream_id));
                }
                if exchange.end_sent() {
                    return Err(MuxError::StreamFinished(stream_id));
                }
                self.transport.send_data(stream_id, data, false)?;
                self.transport.flush().await
            }
            StreamEvent::EndBody { stream_id } => {
                let exchange = self
                    .streams
                    .get_mut(&stream_id)
                    .ok_or(MuxError::UnknownStream(stream_id))?;
                if !exchange.headers_sent() {
                    return Err(MuxError::ResponseNotSent(stream_id));
                }
                if exchange.end_sent() {
                    return Err(MuxError::StreamFinished(stream_id));
                }
                self.transport.send_data(stream_id, Bytes::new(), true)?;
                exchange.mark_end_sent();
                self.transport.flush().await
            }
            StreamEvent::StreamClosed { stream_id } => {
                // Terminal notification only: no transport action, but
                // the table entry goes away and the application task is
                // cancelled if still running.
                if let Some(mut exchange) = self.streams.remove(&stream_id) {
                    exchange.close();
                    debug!("Closed stream {}, {} active", stream_id, self.streams.len());
                }
                Ok(())
            }
            StreamEvent::Request { stream_id, .. } => Err(MuxError::Protocol(format!(
                "request event sent outbound on stream {}",
                stream_id
            ))),
        }
    }

    /// Next outbound event produced by an application task
    ///
    /// Resolves to `None` only when every sender is gone, which cannot
    /// happen while the multiplexer itself is alive.
    pub async fn next_outbound(&mut self) -> Option<StreamEvent> {
        self.outbound_rx.recv().await
    }

    /// Forward one pending application event to the wire
    pub async fn drive_outbound_event(&mut self) -> Result<bool> {
        match self.outbound_rx.try_recv() {
            Ok(event) => {
                self.send_stream_event(event).await?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Sender side of the outbound channel, for embedding drivers
    pub fn outbound_sender(&self) -> AppSender {
        self.outbound_tx.clone()
    }

    /// Number of exchanges currently registered
    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
