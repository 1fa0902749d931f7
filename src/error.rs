//! Multiplexer error types

use crate::events::StreamId;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("Missing pseudo-header: {0}")]
    MissingPseudoHeader(&'static str),

    #[error("No active exchange for stream {0}")]
    UnknownStream(StreamId),

    #[error("Response headers already sent on stream {0}")]
    ResponseAlreadySent(StreamId),

    #[error("Response headers not sent before body on stream {0}")]
    ResponseNotSent(StreamId),

    #[error("Stream {0} already finished")]
    StreamFinished(StreamId),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Application error: {0}")]
    App(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, MuxError>;
