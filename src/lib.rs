// Semantic event vocabulary shared across the crate
pub mod events;

// Per-stream request/response state machine
pub mod exchange;

// The connection multiplexer itself
pub mod mux;

// Contracts for the external collaborators
pub mod app;
pub mod transport;

// Pseudo-header wire rules
pub mod headers;

// Configuration and errors
pub mod config;
pub mod error;

// Re-export main types
pub use config::MuxConfig;
pub use error::{MuxError, Result};
pub use events::{Header, StreamEvent, StreamId};
pub use exchange::{ExchangeState, HttpExchange};
pub use mux::Http3Multiplexer;
pub use transport::{H3Event, H3Transport};

pub mod prelude {
    pub use crate::app::{AppReceiver, AppSender, AppSpawner, FnSpawner, Scope};
    pub use crate::config::MuxConfig;
    pub use crate::error::{MuxError, Result};
    pub use crate::events::{Header, StreamEvent, StreamId};
    pub use crate::mux::Http3Multiplexer;
    pub use crate::transport::{H3Event, H3Transport};
}
