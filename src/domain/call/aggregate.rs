//! Call report aggregate
//!
//! The record one `place_call` hands back to the surrounding application.
//! It is built up while the dialog runs and frozen once an outcome is set.

use crate::domain::call::value_object::{CallOutcome, MediaOutcome};
use crate::domain::shared::error::CallError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallReport {
    /// SIP Call-ID of the dialog
    pub call_id: String,
    /// Request-URI the INVITE was sent to
    pub destination: String,
    /// Final outcome
    pub outcome: CallOutcome,
    /// Status code of the final response, if one arrived
    pub final_status: Option<u16>,
    /// Remote RTP endpoint learned from the SDP answer
    pub remote_rtp: Option<SocketAddr>,
    /// Negotiated codec name (PCMU/PCMA)
    pub codec: Option<String>,
    /// Media result; only present for connected calls
    pub media: Option<MediaOutcome>,
    /// Human readable failure detail
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallReport {
    pub fn new(call_id: String, destination: String) -> Self {
        Self {
            call_id,
            destination,
            outcome: CallOutcome::ProtocolError,
            final_status: None,
            remote_rtp: None,
            codec: None,
            media: None,
            error: None,
            started_at: Utc::now(),
            answered_at: None,
            ended_at: None,
        }
    }

    pub fn mark_answered(&mut self, remote_rtp: SocketAddr, codec: &str) {
        self.answered_at = Some(Utc::now());
        self.remote_rtp = Some(remote_rtp);
        self.codec = Some(codec.to_string());
    }

    /// Close the report as connected, with the media leg's result
    pub fn connected(mut self, media: MediaOutcome) -> Self {
        self.outcome = CallOutcome::Connected;
        self.media = Some(media);
        self.ended_at = Some(Utc::now());
        self
    }

    /// Close the report as failed
    pub fn failed(mut self, err: &CallError) -> Self {
        self.outcome = CallOutcome::from(err);
        if let CallError::RemoteRejection { code, .. } = err {
            self.final_status = Some(*code);
        }
        self.error = Some(err.to_string());
        self.ended_at = Some(Utc::now());
        self
    }

    /// Setup time from INVITE to answer
    pub fn setup_duration(&self) -> Option<chrono::Duration> {
        self.answered_at.map(|t| t - self.started_at)
    }

    /// Talk time from answer to end of dialog
    pub fn call_duration(&self) -> Option<chrono::Duration> {
        match (self.answered_at, self.ended_at) {
            (Some(answered), Some(ended)) => Some(ended - answered),
            _ => None,
        }
    }
}
