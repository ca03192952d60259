//! Event normalization and accumulation for one round.

pub mod accumulate;
pub mod normalize;

pub use accumulate::{collect_response, Accumulator};
pub use normalize::{normalize_stream, normalize_wire_event, snapshot_stream, synthesize, EventStream};

use crate::error::RondoError;
use crate::transport::{CreateRequest, Transport};

/// Issue `request` and return its canonical events, whichever delivery mode
/// the request asks for.
pub async fn open_round(
    transport: &dyn Transport,
    request: &CreateRequest,
) -> Result<EventStream, RondoError> {
    if request.stream {
        Ok(normalize_stream(transport.stream(request).await?))
    } else {
        Ok(snapshot_stream(transport.create(request).await?))
    }
}
