//! vc-core: Application logic for vibecode.
//!
//! This crate contains the workbench state, the stream consumer that applies
//! generation events to it, local persistence, and configuration.
//! Exposed as a library for integration testing.

pub mod archive;
pub mod config;
pub mod consumer;
pub mod logging;
pub mod store;
pub mod surface;
pub mod workbench;

pub use consumer::{submit, Session, SessionOutcome};
pub use workbench::{SharedWorkbench, ViewMode, Workbench};
