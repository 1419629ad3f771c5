// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ingestion cycle state machine.
//!
//! ```text
//! Received ─► Validated ─► Merged ─► Analyzed ─► Completed
//!    │            │           │          │
//!    └──► Rejected ◄┘          └─► Faulted ◄┘
//!                 (Validated ─► Faulted on persistence failure)
//! ```
//!
//! `Completed`, `Rejected` and `Faulted` are terminal. A faulted cycle is
//! retried by the caller from `Received`, never internally.

use crate::error::IngestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// State of one ingestion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IngestState {
    /// Payload accepted for processing.
    Received,
    /// Payload shape checks passed.
    Validated,
    /// Measurement appended to its series.
    Merged,
    /// Baseline computed.
    Analyzed,
    /// Outcome produced.
    Completed,
    /// Payload refused; nothing was appended.
    Rejected,
    /// Persistence or analysis failed.
    Faulted,
}

impl IngestState {
    /// Whether the cycle has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Faulted)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: IngestState) -> bool {
        use IngestState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Rejected)
                | (Validated, Merged)
                | (Validated, Rejected)
                | (Validated, Faulted)
                | (Merged, Analyzed)
                | (Merged, Faulted)
                | (Analyzed, Completed)
                | (Analyzed, Faulted)
        )
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Merged => "merged",
            Self::Analyzed => "analyzed",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// State entered.
    pub state: IngestState,
    /// When it was entered.
    pub at: DateTime<Utc>,
}

/// Bookkeeping for one ingestion cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionCycle {
    /// Cycle identifier (UUID v4).
    pub id: String,
    /// Current state.
    pub state: IngestState,
    /// Every state entered, in order, starting with `Received`.
    pub transitions: Vec<StateTransition>,
    /// Failure reason for rejected or faulted cycles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Default for IngestionCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionCycle {
    /// Start a cycle in `Received`.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: IngestState::Received,
            transitions: vec![StateTransition {
                state: IngestState::Received,
                at: Utc::now(),
            }],
            error_message: None,
        }
    }

    /// Move to `next`, refusing illegal transitions.
    pub fn transition(&mut self, next: IngestState) -> Result<(), IngestError> {
        if !self.state.can_transition_to(next) {
            return Err(IngestError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.transitions.push(StateTransition {
            state: next,
            at: Utc::now(),
        });
        Ok(())
    }

    /// End the cycle in the failure state matching `error`.
    pub fn fail(&mut self, error: &IngestError) {
        let target = error.state();
        if self.state.can_transition_to(target) {
            self.state = target;
            self.transitions.push(StateTransition {
                state: target,
                at: Utc::now(),
            });
        }
        self.error_message = Some(error.to_string());
    }

    /// States visited so far.
    pub fn path(&self) -> Vec<IngestState> {
        self.transitions.iter().map(|t| t.state).collect()
    }
}
