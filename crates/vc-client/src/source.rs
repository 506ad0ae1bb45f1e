//! The seam between a session consumer and whatever produces its events.

use futures::stream::BoxStream;
use vc_protocol::StreamEvent;

use crate::client::ClientError;

/// Events of one generation request, in arrival order.
pub type EventStream = BoxStream<'static, Result<StreamEvent, ClientError>>;

/// Something that turns a prompt into a stream of generation events.
///
/// The request is issued lazily when the stream is first polled; dropping
/// the stream abandons the request.
pub trait EventSource: Send + Sync {
    fn generate(&self, prompt: &str) -> EventStream;
}
