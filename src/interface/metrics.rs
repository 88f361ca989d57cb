//! Dialer metrics
//!
//! Recorded through the `metrics` facade only. Installing a recorder or
//! exporter is left to whatever embeds the dialer; without one every call
//! here is a no-op.

use crate::domain::call::{CallOutcome, CallReport};
use metrics::{counter, describe_counter, describe_histogram, histogram};

pub const SIP_CALLS_TOTAL: &str = "sip_calls_total";
pub const SIP_AUTH_CHALLENGES_TOTAL: &str = "sip_auth_challenges_total";
pub const RTP_PACKETS_SENT_TOTAL: &str = "rtp_packets_sent_total";
pub const SIP_CALL_SETUP_SECONDS: &str = "sip_call_setup_duration_seconds";

/// Register descriptions with the installed recorder
pub fn init_metrics() {
    describe_counter!(SIP_CALLS_TOTAL, "Total number of outbound calls by outcome");
    describe_counter!(
        SIP_AUTH_CHALLENGES_TOTAL,
        "Total number of 401/407 challenges answered"
    );
    describe_counter!(RTP_PACKETS_SENT_TOTAL, "Total number of RTP packets sent");
    describe_histogram!(
        SIP_CALL_SETUP_SECONDS,
        "Time from first INVITE to answer, in seconds"
    );
}

pub fn record_call_outcome(outcome: &CallOutcome) {
    counter!(SIP_CALLS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_auth_challenge(status: u16) {
    counter!(SIP_AUTH_CHALLENGES_TOTAL, "status" => status.to_string()).increment(1);
}

pub fn record_rtp_packets(packets: u64) {
    counter!(RTP_PACKETS_SENT_TOTAL).increment(packets);
}

/// Everything a finished report says about the call
pub fn record_report(report: &CallReport) {
    record_call_outcome(&report.outcome);
    if let Some(media) = &report.media {
        record_rtp_packets(media.packets_sent());
    }
    if let Some(setup) = report.setup_duration().and_then(|d| d.to_std().ok()) {
        histogram!(SIP_CALL_SETUP_SECONDS).record(setup.as_secs_f64());
    }
}
