//! Provisioning Execution Module
//!
//! Runs the ordered provisioning steps against the environment manager.
//!
//! # Architecture
//!
//! - [`engine`]: The step sequencer and failure policy
//! - [`step`]: Step identities, outcomes and failure classification
//! - [`runner`]: Subprocess invocation behind the [`CommandRunner`] trait

pub mod engine;
pub mod runner;
pub mod step;

pub use engine::{ProvisionRun, Provisioner};
pub use runner::{
    redact_credentials, CommandOutput, CommandRunner, DryRunRunner, Invocation, SpawnError,
    SystemRunner,
};
pub use step::{classify_failure, FailureKind, StepKind, StepOutcome, StepResult};
