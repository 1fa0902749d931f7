//! Framing adapter contract
//!
//! The QUIC transport and its HTTP/3 framing layer are consumed as a
//! black box behind [`H3Transport`]: raw transport events go in, parsed
//! framing events come out, and the two send operations plus `flush`
//! cover the entire egress path. Keeping the seam as a trait lets the
//! multiplexer be driven deterministically by a fake in tests.

use crate::error::Result;
use crate::events::{Header, StreamId};
use async_trait::async_trait;
use bytes::Bytes;

/// HTTP/3 framing-layer events produced by the adapter
#[derive(Debug, Clone, PartialEq)]
pub enum H3Event {
    /// A complete request header block arrived on a stream
    RequestReceived {
        stream_id: StreamId,
        headers: Vec<Header>,
        /// FIN carried on the HEADERS frame (body-less request)
        stream_ended: bool,
    },
    /// Body bytes arrived on a stream
    DataReceived {
        stream_id: StreamId,
        data: Bytes,
        stream_ended: bool,
    },
}

/// The HTTP/3 framing adapter wrapping one QUIC connection
///
/// `handle_event` interprets one raw transport event as zero or more
/// framing events; the returned sequence is finite and consumed exactly
/// once. Send calls buffer protocol bytes; `flush` hands them to the
/// network layer and is the single suspension point of the outbound
/// path. Rejected sends propagate to the caller untouched.
#[async_trait]
pub trait H3Transport: Send {
    /// Raw transport event type emitted by the underlying QUIC layer
    type Event: Send;

    /// Interpret one raw transport event as framing events
    fn handle_event(&mut self, event: Self::Event) -> Result<Vec<H3Event>>;

    /// Buffer a header block for a stream
    fn send_headers(&mut self, stream_id: StreamId, headers: &[Header], end_stream: bool)
        -> Result<()>;

    /// Buffer body bytes for a stream
    fn send_data(&mut self, stream_id: StreamId, data: Bytes, end_stream: bool) -> Result<()>;

    /// Hand buffered egress bytes to the network layer
    async fn flush(&mut self) -> Result<()>;
}

impl H3Event {
    pub fn stream_id(&self) -> StreamId {
        match self {
            H3Event::RequestReceived { stream_id, .. }
            | H3Event::DataReceived { stream_id, .. } => *stream_id,
        }
    }
}
