use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::reactor::{CycleOutcome, Reactor};
use super::state::DecisionState;
use super::time::Pacer;
use crate::error::Interrupted;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("a cycle is already in flight")]
    Busy,
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl From<Interrupted> for TriggerError {
    fn from(_: Interrupted) -> Self {
        TriggerError::Interrupted
    }
}

struct Session {
    reactor: Reactor,
    state: DecisionState,
}

/// On-demand cycles for manual-trigger mode.
/// A trigger that arrives while another cycle runs is rejected, never interleaved.
#[derive(Clone)]
pub struct TriggerHandle {
    session: Arc<Mutex<Session>>,
    pacer: Pacer,
}

impl TriggerHandle {
    pub fn new(reactor: Reactor, pacer: Pacer) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session {
                reactor,
                state: DecisionState::default(),
            })),
            pacer,
        }
    }

    pub async fn try_trigger(&self) -> Result<CycleOutcome, TriggerError> {
        let mut session = match self.session.try_lock() {
            Ok(session) => session,
            Err(_) => {
                warn!("Manual trigger rejected, a cycle is already in flight");
                return Err(TriggerError::Busy);
            }
        };

        info!(state = session.state.label(), "Manual cycle triggered");
        let state = std::mem::take(&mut session.state);
        let step = match session.reactor.run_once(state.clone(), &self.pacer).await {
            Ok(step) => step,
            Err(Interrupted) => {
                session.state = state;
                return Err(TriggerError::Interrupted);
            }
        };

        session.state = step.next;
        Ok(step.outcome)
    }

    pub async fn state(&self) -> DecisionState {
        self.session.lock().await.state.clone()
    }

    /// Run `f` against the reactor once no cycle is in flight.
    pub async fn with_reactor<T>(&self, f: impl FnOnce(&Reactor) -> T) -> T {
        let session = self.session.lock().await;
        f(&session.reactor)
    }
}
