pub mod env;
pub mod telemetry;

pub use env::EnvConfig;
pub use telemetry::{DiagnosticsConfig, TelemetryConfig};
