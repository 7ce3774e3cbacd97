//! Per-document and per-field processing state

use papelada_domain::{RejectedPattern, UnresolvedPattern, ValidatedPattern};
use papelada_extractor::PatternTarget;

/// Reason code when a field is missing from the synthesis response
pub const MISSING_CANDIDATE: &str = "MISSING_CANDIDATE";

/// Reason code when the synthesis request itself failed
pub const BACKEND_FAILURE: &str = "BACKEND_FAILURE";

/// Lifecycle of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStage {
    /// Not started
    Pending,
    /// Direct and pattern requests in flight
    Extracting,
    /// Pattern retries in progress
    Validating,
    /// Merging strategy outputs
    Reconciling,
    /// Finished normally
    Done,
    /// Finished with a document-level error
    Failed,
}

impl DocumentStage {
    /// Whether the stage is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStage::Done | DocumentStage::Failed)
    }
}

/// Synthesis state of one (document, field) pair
#[derive(Debug, Clone, PartialEq)]
pub enum PatternState {
    /// No request issued yet
    Pending,
    /// Request for this attempt in flight
    Awaiting {
        /// Attempt number, starting at 1
        attempt: u32,
    },
    /// A pattern passed validation
    Validated(ValidatedPattern),
    /// The last attempt failed and budget remains
    Retry {
        /// Attempts spent so far
        attempt: u32,
        /// Reason code of the failure
        reason: String,
    },
    /// Budget exhausted without a validated pattern
    Unresolved {
        /// Attempts spent
        attempts: u32,
        /// Reason code of the last failure
        reason: String,
    },
}

/// Explicit state record for one field's synthesis loop
#[derive(Debug, Clone)]
pub struct FieldPipeline {
    target: PatternTarget,
    state: PatternState,
    budget: u32,
}

impl FieldPipeline {
    /// Start a pipeline for `target` with `budget` attempts
    pub fn new(target: PatternTarget, budget: u32) -> Self {
        Self {
            target,
            state: PatternState::Pending,
            budget: budget.max(1),
        }
    }

    /// Field name
    pub fn field_name(&self) -> &str {
        &self.target.field_name
    }

    /// Current state
    pub fn state(&self) -> &PatternState {
        &self.state
    }

    /// Target as it should be sent next (with all feedback so far)
    pub fn target(&self) -> &PatternTarget {
        &self.target
    }

    /// Whether another request should be issued
    pub fn wants_request(&self) -> bool {
        matches!(self.state, PatternState::Pending | PatternState::Retry { .. })
    }

    /// Attempts spent (including one in flight)
    pub fn attempts(&self) -> u32 {
        match &self.state {
            PatternState::Pending | PatternState::Validated(_) => 0,
            PatternState::Awaiting { attempt } | PatternState::Retry { attempt, .. } => *attempt,
            PatternState::Unresolved { attempts, .. } => *attempts,
        }
    }

    /// Mark the next request as issued
    pub fn begin_attempt(&mut self) {
        let attempt = match &self.state {
            PatternState::Pending => 1,
            PatternState::Retry { attempt, .. } => attempt + 1,
            _ => return,
        };
        self.state = PatternState::Awaiting { attempt };
    }

    /// The in-flight attempt produced a validated pattern
    pub fn validated(&mut self, pattern: ValidatedPattern) {
        if matches!(self.state, PatternState::Awaiting { .. }) {
            self.state = PatternState::Validated(pattern);
        }
    }

    /// The in-flight attempt produced a pattern the validator rejected
    pub fn rejected(&mut self, rejection: RejectedPattern) {
        let reason = rejection.reason.clone();
        self.target.feedback.push(rejection);
        self.fail(reason);
    }

    /// The in-flight attempt produced no pattern for this field
    pub fn missing(&mut self) {
        self.fail(MISSING_CANDIDATE.to_string());
    }

    /// The in-flight request failed as a whole
    pub fn backend_failed(&mut self) {
        self.fail(BACKEND_FAILURE.to_string());
    }

    fn fail(&mut self, reason: String) {
        let PatternState::Awaiting { attempt } = self.state else {
            return;
        };
        self.state = if attempt >= self.budget {
            PatternState::Unresolved {
                attempts: attempt,
                reason,
            }
        } else {
            PatternState::Retry { attempt, reason }
        };
    }

    /// Validated pattern, if any
    pub fn validated_pattern(&self) -> Option<&ValidatedPattern> {
        match &self.state {
            PatternState::Validated(pattern) => Some(pattern),
            _ => None,
        }
    }

    /// Consume into the validated pattern, if any
    pub fn into_validated(self) -> Option<ValidatedPattern> {
        match self.state {
            PatternState::Validated(pattern) => Some(pattern),
            _ => None,
        }
    }

    /// Unresolved record, if the budget ran out
    pub fn unresolved(&self) -> Option<UnresolvedPattern> {
        match &self.state {
            PatternState::Unresolved { attempts, reason } => Some(UnresolvedPattern {
                field_name: self.target.field_name.clone(),
                reason: reason.clone(),
                attempts: *attempts,
            }),
            _ => None,
        }
    }
}
