mod builder;
mod context;
mod report;

use serde::{Deserialize, Serialize};

pub use builder::{TraceTreeBuilder, Visit, DEFAULT_MAX_DEPTH};
pub use context::TraversalContext;
pub use report::{SkipReason, SkippedBuild, TraceReport, TracedBuild};

/// Which service name a job span is reported under.
///
/// Build spans always use the pipeline slug (`organization/pipeline`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TracerScope {
    /// Job spans share the build's pipeline tracer and are named by job label.
    #[default]
    Pipeline,
    /// Each job gets a tracer named by its label; spans are named `Execute`.
    JobLabel,
}
