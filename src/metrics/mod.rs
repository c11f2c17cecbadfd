//! Metrics module
//!
//! Records batch results as Prometheus metrics and renders them in the text
//! exposition format.

mod recorder;

pub use recorder::SimulationMetrics;
