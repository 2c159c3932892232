//! Budget Guard
//!
//! Two independent caps per run: loop iterations and backend round-trips.
//! Backend calls can outrun iterations when a turn needs several requests or
//! when transient errors are retried.

use std::fmt;

use crate::models::orchestrator::OrchestratorConfig;

/// Which cap a run hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetExceeded {
    Iterations(u32),
    BackendCalls(u32),
}

impl fmt::Display for BudgetExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetExceeded::Iterations(max) => write!(f, "Maximum iterations ({}) reached", max),
            BudgetExceeded::BackendCalls(max) => {
                write!(f, "Maximum backend calls ({}) reached", max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetGuard {
    max_iterations: u32,
    max_backend_calls: u32,
}

impl BudgetGuard {
    pub fn new(max_iterations: u32, max_backend_calls: u32) -> Self {
        Self {
            max_iterations,
            max_backend_calls,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.max_iterations, config.max_backend_calls)
    }

    /// `Some` once either counter has reached its cap.
    pub fn check(&self, iterations: u32, backend_calls: u32) -> Option<BudgetExceeded> {
        if iterations >= self.max_iterations {
            Some(BudgetExceeded::Iterations(self.max_iterations))
        } else if backend_calls >= self.max_backend_calls {
            Some(BudgetExceeded::BackendCalls(self.max_backend_calls))
        } else {
            None
        }
    }

    /// Backend calls still allowed.
    pub fn remaining_calls(&self, backend_calls: u32) -> u32 {
        self.max_backend_calls.saturating_sub(backend_calls)
    }
}
