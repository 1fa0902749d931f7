//! Semantic stream events
//!
//! The vocabulary exchanged between the connection multiplexer and each
//! logical HTTP exchange. These events describe the request/response
//! lifecycle independently of the HTTP/3 wire format: the framing layer
//! below speaks frames, the application layer above speaks scopes, and
//! everything in between speaks `StreamEvent`.

use bytes::Bytes;

/// Stream identifier assigned by the QUIC transport
///
/// Unique for the lifetime of a connection and used as the join key
/// between framing events and exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StreamId(u64);

impl StreamId {
    /// Create a new stream ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered HTTP header field as raw bytes
///
/// Pseudo-header fields carry a leading colon in the name and must be
/// positioned before regular fields when sent.
pub type Header = (Bytes, Bytes);

/// Lifecycle event for one logical HTTP exchange
///
/// For a given stream at most one `Request` is ever produced; `Body` and
/// `EndBody` may only follow it. On the outbound side `Response` must be
/// sent before any `Body`/`EndBody`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A complete request header block arrived (inbound only)
    Request {
        stream_id: StreamId,
        headers: Vec<Header>,
        http_version: String,
        method: String,
        raw_path: Bytes,
    },
    /// A chunk of request or response body
    Body {
        stream_id: StreamId,
        data: Bytes,
    },
    /// The body is complete; no further `Body` events follow
    EndBody {
        stream_id: StreamId,
    },
    /// Response status and header block (outbound only)
    Response {
        stream_id: StreamId,
        status_code: u16,
        headers: Vec<Header>,
    },
    /// The exchange is over; terminal for the stream
    StreamClosed {
        stream_id: StreamId,
    },
}

impl StreamEvent {
    /// The stream this event belongs to
    pub fn stream_id(&self) -> StreamId {
        match self {
            StreamEvent::Request { stream_id, .. }
            | StreamEvent::Body { stream_id, .. }
            | StreamEvent::EndBody { stream_id }
            | StreamEvent::Response { stream_id, .. }
            | StreamEvent::StreamClosed { stream_id } => *stream_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_value_round_trip() {
        let id = StreamId::new(4);
        assert_eq!(id.value(), 4);
        assert_eq!(format!("{}", id), "4");
    }

    #[test]
    fn test_event_stream_id_accessor() {
        let id = StreamId::new(8);
        let events = vec![
            StreamEvent::Body {
                stream_id: id,
                data: Bytes::from_static(b"abc"),
            },
            StreamEvent::EndBody { stream_id: id },
            StreamEvent::Response {
                stream_id: id,
                status_code: 200,
                headers: vec![],
            },
            StreamEvent::StreamClosed { stream_id: id },
        ];
        for event in events {
            assert_eq!(event.stream_id(), id);
        }
    }
}
