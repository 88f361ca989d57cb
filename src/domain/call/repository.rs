//! Call outcome sink

use crate::domain::call::aggregate::CallReport;
use async_trait::async_trait;
use tracing::{info, warn};

/// Port through which finished calls leave the dialer.
///
/// The application behind it (call database, API layer) decides what
/// persisting a report means; the dialer only emits.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallOutcomeSink: Send + Sync {
    async fn record(&self, report: &CallReport);
}

/// Sink that only writes the report to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutcomeSink;

#[async_trait]
impl CallOutcomeSink for TracingOutcomeSink {
    async fn record(&self, report: &CallReport) {
        if report.outcome.is_connected() {
            info!(
                call_id = %report.call_id,
                destination = %report.destination,
                media = ?report.media,
                "Call finished: {}",
                report.outcome
            );
        } else {
            warn!(
                call_id = %report.call_id,
                destination = %report.destination,
                error = ?report.error,
                "Call failed: {}",
                report.outcome
            );
        }
    }
}
