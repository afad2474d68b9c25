pub mod diagnostics;

pub use diagnostics::{DiagnosticsReport, collect_diagnostics};
