//! Application layer contract
//!
//! The multiplexer never runs application logic itself. Each exchange
//! hands a request descriptor plus a channel pair to an [`AppSpawner`],
//! which starts the application task: body events flow in through the
//! receiver, response events flow out through the sender.

use crate::error::Result;
use crate::events::{Header, StreamEvent, StreamId};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// ASGI-like request descriptor handed to the application layer
#[derive(Debug, Clone)]
pub struct Scope {
    pub stream_id: StreamId,
    pub http_version: String,
    pub method: String,
    /// Path exactly as transmitted, percent-encoding preserved
    pub raw_path: Bytes,
    pub headers: Vec<Header>,
}

/// Inbound side of an application task: `Body`/`EndBody` events
pub type AppReceiver = mpsc::UnboundedReceiver<StreamEvent>;

/// Outbound side of an application task: `Response`/`Body`/`EndBody`/
/// `StreamClosed` events destined for the wire
pub type AppSender = mpsc::UnboundedSender<StreamEvent>;

/// Starts application logic for one exchange
///
/// The returned handle is used for best-effort cancellation when the
/// stream closes before the application finishes.
#[async_trait]
pub trait AppSpawner: Send + Sync {
    async fn spawn_app(
        &self,
        scope: Scope,
        receiver: AppReceiver,
        sender: AppSender,
    ) -> Result<JoinHandle<()>>;
}

/// Adapter turning an async closure into an [`AppSpawner`]
pub struct FnSpawner<F>(pub F);

#[async_trait]
impl<F, Fut> AppSpawner for FnSpawner<F>
where
    F: Fn(Scope, AppReceiver, AppSender) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    async fn spawn_app(
        &self,
        scope: Scope,
        receiver: AppReceiver,
        sender: AppSender,
    ) -> Result<JoinHandle<()>> {
        Ok(tokio::spawn((self.0)(scope, receiver, sender)))
    }
}
