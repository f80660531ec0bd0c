//! Per-document pipeline state machine.

use crate::core::errors::PipelineError;
use crate::domain::DocumentStatus;
use std::fmt;
use tracing::debug;

/// The stage a document is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Rasterizing,
    Detecting,
    Reconciling,
    Recognizing,
    Assembling,
    /// Terminal: a result was produced.
    Done(DocumentStatus),
    /// Terminal: the document could not be rasterized.
    Failed,
}

impl PipelineState {
    /// Returns `true` for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done(_) | PipelineState::Failed)
    }

    /// Whether the machine may move from `self` to `next`.
    ///
    /// `Failed` is only reachable from `Rasterizing`: once pages exist the
    /// pipeline always produces a result.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Rasterizing, Detecting)
                | (Rasterizing, Failed)
                | (Detecting, Reconciling)
                | (Reconciling, Recognizing)
                | (Recognizing, Assembling)
                | (Assembling, Done(_))
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Rasterizing => write!(f, "rasterizing"),
            PipelineState::Detecting => write!(f, "detecting"),
            PipelineState::Reconciling => write!(f, "reconciling"),
            PipelineState::Recognizing => write!(f, "recognizing"),
            PipelineState::Assembling => write!(f, "assembling"),
            PipelineState::Done(DocumentStatus::Complete) => write!(f, "done (complete)"),
            PipelineState::Done(DocumentStatus::Partial) => write!(f, "done (partial)"),
            PipelineState::Failed => write!(f, "failed"),
        }
    }
}

/// Tracks the state of one document run.
#[derive(Debug)]
pub struct StateMachine {
    document_id: String,
    state: PipelineState,
}

impl StateMachine {
    /// Starts a run in [`PipelineState::Rasterizing`].
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            state: PipelineState::Rasterizing,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Moves to `next`, or returns an internal error if the move is illegal.
    pub fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::Internal {
                state: self.state,
                message: format!("illegal transition to {}", next),
            });
        }
        debug!(
            document_id = %self.document_id,
            from = %self.state,
            to = %next,
            "pipeline state transition"
        );
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut machine = StateMachine::new("doc");
        for next in [
            PipelineState::Detecting,
            PipelineState::Reconciling,
            PipelineState::Recognizing,
            PipelineState::Assembling,
            PipelineState::Done(DocumentStatus::Partial),
        ] {
            machine.advance(next).unwrap();
        }
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_failed_only_from_rasterizing() {
        let mut machine = StateMachine::new("doc");
        machine.advance(PipelineState::Detecting).unwrap();
        let err = machine.advance(PipelineState::Failed).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Internal {
                state: PipelineState::Detecting,
                ..
            }
        ));
        assert_eq!(machine.state(), PipelineState::Detecting);

        let mut machine = StateMachine::new("doc");
        assert!(machine.advance(PipelineState::Failed).is_ok());
        assert!(machine.advance(PipelineState::Detecting).is_err());
    }

    #[test]
    fn test_cannot_skip_stages() {
        let mut machine = StateMachine::new("doc");
        assert!(machine.advance(PipelineState::Recognizing).is_err());
        assert!(
            machine
                .advance(PipelineState::Done(DocumentStatus::Complete))
                .is_err()
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PipelineState::Recognizing.to_string(), "recognizing");
        assert_eq!(
            PipelineState::Done(DocumentStatus::Complete).to_string(),
            "done (complete)"
        );
    }
}
