//! Per-level lifecycle tracking

use crate::error::{BenchError, BenchResult};

/// Lifecycle of one concurrency level
///
/// `Pending → Running(k of N) → Drained → Aggregated`. Aggregation is only
/// legal once every worker of the level is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelState {
    /// Not started
    #[default]
    Pending,
    /// Workers in flight
    Running {
        /// Workers that reached a terminal state
        terminal: usize,
        /// Workers launched
        total: usize,
    },
    /// All workers terminal
    Drained {
        /// Workers launched
        total: usize,
    },
    /// Statistics computed
    Aggregated,
}

impl LevelState {
    /// Launch `total` workers
    pub fn start(&mut self, total: usize) -> BenchResult<()> {
        match *self {
            LevelState::Pending if total > 0 => {
                *self = LevelState::Running { terminal: 0, total };
                Ok(())
            }
            LevelState::Pending => Err(BenchError::orchestration(
                "cannot start a level with zero workers",
            )),
            other => Err(BenchError::orchestration(format!(
                "cannot start level in state {:?}",
                other
            ))),
        }
    }

    /// Note one more terminal worker, draining the level on the last one
    pub fn record_terminal(&mut self) -> BenchResult<()> {
        match *self {
            LevelState::Running { terminal, total } if terminal + 1 == total => {
                *self = LevelState::Drained { total };
                Ok(())
            }
            LevelState::Running { terminal, total } => {
                *self = LevelState::Running {
                    terminal: terminal + 1,
                    total,
                };
                Ok(())
            }
            other => Err(BenchError::orchestration(format!(
                "worker finished while level is {:?}",
                other
            ))),
        }
    }

    /// Mark the level aggregated
    pub fn aggregate(&mut self) -> BenchResult<()> {
        match *self {
            LevelState::Drained { .. } => {
                *self = LevelState::Aggregated;
                Ok(())
            }
            other => Err(BenchError::orchestration(format!(
                "cannot aggregate level in state {:?}",
                other
            ))),
        }
    }

    /// `(terminal, total)` while running
    pub fn progress(&self) -> Option<(usize, usize)> {
        match *self {
            LevelState::Running { terminal, total } => Some((terminal, total)),
            LevelState::Drained { total } => Some((total, total)),
            _ => None,
        }
    }

    /// Whether every worker is terminal
    pub fn is_drained(&self) -> bool {
        matches!(self, LevelState::Drained { .. })
    }
}
