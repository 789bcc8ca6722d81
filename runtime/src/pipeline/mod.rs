pub mod error_reporter;
pub mod normalize;
pub mod pipeline;
pub mod status_service;

pub use error_reporter::{ErrorReporter, LoadError, message_for, user_message};
pub use normalize::{normalize_analysis, normalize_graph, normalize_with_analysis};
pub use pipeline::{LoadOutcome, LoadPipeline, PipelineConfig};
pub use status_service::{LoadStage, LoadStatusService};
