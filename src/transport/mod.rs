//! Transport boundary: how a round reaches the remote API.

pub mod http;
pub mod replay;
pub mod request;
pub mod sse;
pub mod wire;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::RondoError;
use crate::types::Response;

pub use http::HttpTransport;
pub use replay::{ReplayTransport, ScriptedRound};
pub use request::CreateRequest;
pub use sse::{SseDecoder, SseFrame};
pub use wire::WireEvent;

/// Ordered native events of one streaming round.
pub type WireStream = BoxStream<'static, Result<WireEvent, RondoError>>;

/// Issues rounds. Implementations never retry; failures surface as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str {
        "transport"
    }

    /// Non-streaming round: one terminal snapshot.
    async fn create(&self, request: &CreateRequest) -> Result<Response, RondoError>;

    /// Streaming round. Dropping the stream closes the underlying connection.
    async fn stream(&self, request: &CreateRequest) -> Result<WireStream, RondoError>;
}
