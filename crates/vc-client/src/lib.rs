//! vc-client: Transport for the vibecode server.
//!
//! This crate splits the streamed generation body into records, talks to
//! the server's HTTP endpoints, and provides a mock event source so the
//! session consumer can be tested without a network.

pub mod client;
pub mod mock;
pub mod source;
pub mod sse;

pub use client::{ClientError, CodegenClient, Timeouts, DEFAULT_BASE_URL, GENERIC_FAILURE};
pub use mock::{MockConfig, MockResponse, MockSource};
pub use source::{EventSource, EventStream};
