//! Reporting Module
//!
//! - [`ExecutionTimeline`]: Step start/end timing
//! - [`RunReport`]: Console summary and JSON report

pub mod summary;
pub mod timeline;

pub use summary::RunReport;
pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
