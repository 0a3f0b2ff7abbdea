//! logflow daemon library.
//!
//! The binary runs exactly one stage per process; these modules are exposed
//! so integration tests can drive a stage without signals or a global
//! tracing subscriber.

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
