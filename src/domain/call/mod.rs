//! Call bounded context - outcome and report of an outbound call

pub mod aggregate;
pub mod repository;
pub mod value_object;

pub use aggregate::CallReport;
pub use repository::{CallOutcomeSink, TracingOutcomeSink};
pub use value_object::{CallOutcome, MediaOutcome};

#[cfg(test)]
pub use repository::MockCallOutcomeSink;
