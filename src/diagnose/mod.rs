//! Kubernetes diagnosis engines
//!
//! Each engine walks the resource graph for one scenario, classifies what it
//! visits with the shared health predicates, and returns a [`Report`] holding
//! text sections, findings in discovery order, suggested actions and diagrams.

pub mod types;
pub mod report;
pub mod health;
pub mod selector;
pub mod quantity;
pub mod namespace;
pub mod describe;
pub mod topology;

pub mod request_path;
pub mod service;
pub mod cluster;
pub mod pod;
pub mod workload;
pub mod ingress;
pub mod network_policy;
pub mod resources;
pub mod dns;
pub mod logs;
pub mod connectivity;

pub use report::*;
pub use types::*;

use crate::error::{KdError, Result};

/// Split a sub-lookup result into "abort the run" and "degrade this section".
///
/// Cancellation propagates; every other failure is handed back for the caller
/// to render as an inline note.
pub(crate) fn soft<T>(result: Result<T>) -> Result<std::result::Result<T, KdError>> {
    match result {
        Err(e) if e.is_fatal() => Err(e),
        other => Ok(other),
    }
}
