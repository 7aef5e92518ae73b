//! Per-request state machine
//!
//! ```text
//! ReceivingRequest -> Fetching -> Validating -> CacheProbing
//!     CacheProbing -> Serving -> Responding
//!     CacheProbing -> Negotiating -> Transforming -> Encoding -> Storing -> Responding
//! ```
//!
//! `NotFound`, `Rejected` and `Failed` are terminal and reachable from any
//! non-terminal state.

use std::fmt;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    ReceivingRequest,
    Fetching,
    Validating,
    CacheProbing,
    Serving,
    Negotiating,
    Transforming,
    /// Encoded output is being packaged into a response entity
    Encoding,
    /// Background store has been scheduled
    Storing,
    Responding,
    NotFound,
    Rejected,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::ReceivingRequest => "receiving_request",
            PipelineState::Fetching => "fetching",
            PipelineState::Validating => "validating",
            PipelineState::CacheProbing => "cache_probing",
            PipelineState::Serving => "serving",
            PipelineState::Negotiating => "negotiating",
            PipelineState::Transforming => "transforming",
            PipelineState::Encoding => "encoding",
            PipelineState::Storing => "storing",
            PipelineState::Responding => "responding",
            PipelineState::NotFound => "not_found",
            PipelineState::Rejected => "rejected",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Responding
                | PipelineState::NotFound
                | PipelineState::Rejected
                | PipelineState::Failed
        )
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, NotFound | Rejected | Failed) {
            return true;
        }
        matches!(
            (self, next),
            (ReceivingRequest, Fetching)
                | (Fetching, Validating)
                | (Validating, CacheProbing)
                | (CacheProbing, Serving)
                | (CacheProbing, Negotiating)
                | (Serving, Responding)
                | (Negotiating, Transforming)
                | (Transforming, Encoding)
                | (Encoding, Storing)
                | (Storing, Responding)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records and logs the states one request passes through
#[derive(Debug)]
pub struct StateTracker {
    request_id: String,
    history: Vec<PipelineState>,
}

impl StateTracker {
    pub fn new(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        debug!(request_id = %request_id, state = "receiving_request", "Pipeline state");
        Self {
            request_id,
            history: vec![PipelineState::ReceivingRequest],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::ReceivingRequest)
    }

    pub fn transition(&mut self, next: PipelineState) {
        let from = self.current();
        if !from.can_transition_to(next) {
            warn!(
                request_id = %self.request_id,
                from = from.as_str(),
                to = next.as_str(),
                "Unexpected pipeline transition"
            );
        }
        debug!(
            request_id = %self.request_id,
            from = from.as_str(),
            state = next.as_str(),
            "Pipeline state"
        );
        self.history.push(next);
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn into_history(self) -> Vec<PipelineState> {
        self.history
    }
}
