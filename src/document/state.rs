use serde::Serialize;
use thiserror::Error;

pub type StateResult<T> = std::result::Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid resolution transition for page {page}: from {from:?} using event {event:?}")]
    InvalidTransition {
        page: String,
        from: ResolutionState,
        event: ResolutionEvent,
    },
}

/// Where a page stands in image resolution. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    #[default]
    Unresolved,
    Resolved,
    Failed,
}

impl ResolutionState {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionEvent {
    ImageMounted,
    CandidatesExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionTransition {
    pub from: ResolutionState,
    pub event: ResolutionEvent,
    pub to: ResolutionState,
}

#[derive(Debug, Default)]
pub struct ResolutionMachine {
    state: ResolutionState,
    transition: Option<ResolutionTransition>,
}

impl ResolutionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    /// The single transition this machine has taken, if any.
    pub fn last_transition(&self) -> Option<ResolutionTransition> {
        self.transition
    }

    pub fn can_transition(&self, event: ResolutionEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: ResolutionEvent) -> Option<ResolutionState> {
        use ResolutionEvent::*;
        match (self.state, event) {
            (ResolutionState::Unresolved, ImageMounted) => Some(ResolutionState::Resolved),
            (ResolutionState::Unresolved, CandidatesExhausted) => Some(ResolutionState::Failed),
            _ => None,
        }
    }

    pub fn transition(&mut self, page: &str, event: ResolutionEvent) -> StateResult<ResolutionState> {
        tracing::debug!(page, from = ?self.state, ?event, "request resolution transition");
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(page, ?from, ?event, "invalid resolution transition requested");
            StateError::InvalidTransition {
                page: page.to_string(),
                from,
                event,
            }
        })?;

        self.transition = Some(ResolutionTransition {
            from: self.state,
            event,
            to: next,
        });
        self.state = next;
        Ok(next)
    }
}

impl std::fmt::Display for ResolutionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResolutionState::{:?}", self.state)
    }
}
