//! YWT Core - phased multi-persona analysis orchestrator
//!
//! Given a topic, the orchestrator:
//! - Generates a fixed set of personas (entities) once
//! - Drives every entity through the Y → W → T phases, each phase seeing
//!   only that entity's own earlier results
//! - Summarizes each phase across all entities once the phase is finished,
//!   feeding earlier summaries into later ones
//!
//! Entity generation, analysis and summarization are external capabilities
//! behind the traits in [`capability`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ywt_core::{Capabilities, Orchestrator, RunConfig};
//!
//! # async fn example(capabilities: Capabilities) -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(capabilities, RunConfig::new().with_target_entity_count(3));
//! let outcome = orchestrator.run("improve onboarding").await?;
//!
//! println!("T summary: {}", outcome.t_summary.payload);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod machine;
pub mod orchestrator;
pub mod outcome;
pub mod record;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use capability::{
    Analyzer, Capabilities, CapabilityError, CapabilityKind, EntityGenerator, EntityPhaseResult,
    Summarizer,
};
pub use config::RunConfig;
pub use error::{CancelReason, Location, WorkflowError};
pub use machine::{allowed_transitions, validate_transition, Step, StepBudget};
pub use orchestrator::Orchestrator;
pub use outcome::{RunOutcome, RunStats};
pub use record::{EntityRecord, RecordError};
pub use state::{PhaseSummaries, Progress, WorkflowState};
pub use types::{Entity, EntityId, Phase, PhaseResult, PhaseSlot, PhaseSummary, RunId};

/// Re-export of the cancellation token accepted by [`Orchestrator::with_cancellation`]
pub use tokio_util::sync::CancellationToken;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with YWT Core
    pub use crate::{
        Analyzer, Capabilities, CapabilityError, Entity, EntityGenerator, EntityPhaseResult,
        Orchestrator, Phase, PhaseResult, PhaseSummary, RunConfig, RunOutcome, Summarizer,
        WorkflowError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
