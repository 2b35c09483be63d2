pub mod coordinator;
pub mod normalize;

pub use coordinator::{ExtractionCoordinator, ProcessOutcome};
