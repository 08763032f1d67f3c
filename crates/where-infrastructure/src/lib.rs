//! Infrastructure layer: configuration loading, tracing setup and an
//! in-process backend implementing the collaborator ports.

pub mod config_service;
pub mod local_conductor;
pub mod telemetry;

pub use config_service::ConfigService;
pub use local_conductor::{LocalCell, LocalConductor};
pub use telemetry::{Diagnostic, DiagnosticLayer, init_tracing, init_tracing_with_diagnostics};
