//! Simulator
//!
//! Drives one configuration from training to the last tested period, and
//! batches of configurations concurrently.
//!
//! ```text
//!  ┌────────────┐   ┌──────────────┐   ┌───────────────────────────────┐
//!  │  Training  │──▶│ Cooperation  │──▶│ per period:                   │
//!  │ (fit/load) │   │ (cell groups)│   │  serve ─▶ rates ─▶ reassign   │
//!  └────────────┘   └──────────────┘   └───────────────────────────────┘
//! ```

mod batch;
mod period;
mod report;
mod run;

pub use batch::{run_batch, BatchOptions, RunOutcome, RunPlan};
pub use period::{rate, PeriodPhase, PeriodStats};
pub use report::{PeriodSummary, RunReport};
pub use run::{Pretrained, SimulationRun};
