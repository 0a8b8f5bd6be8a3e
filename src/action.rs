use std::fmt;
use std::ops::Add;

use thiserror::Error;

use crate::model::entity::{Player, Price};
use crate::repository::RepositoryError;

pub type Index = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Upgrade,
    Downgrade,
    Repair,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Upgrade => "upgrade",
            Phase::Downgrade => "downgrade",
            Phase::Repair => "repair",
        };
        f.write_str(name)
    }
}

/// One change to a single squad slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Upgrade(Index),
    Downgrade(Index),
    Replace(Index),
}

impl Adjustment {
    pub fn phase(&self) -> Phase {
        match self {
            Adjustment::Upgrade(_) => Phase::Upgrade,
            Adjustment::Downgrade(_) => Phase::Downgrade,
            Adjustment::Replace(_) => Phase::Repair,
        }
    }

    pub fn index(&self) -> Index {
        match self {
            Adjustment::Upgrade(index) | Adjustment::Downgrade(index) | Adjustment::Replace(index) => {
                *index
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Replaced { previous: Player, price_diff: i64 },
    Unchanged,
    Failed(RepositoryError),
}

impl Outcome {
    pub fn between(previous: Player, next: &Player) -> Outcome {
        if previous.id == next.id {
            return Outcome::Unchanged;
        }
        let price_diff = next.price as i64 - previous.price as i64;
        Outcome::Replaced { previous, price_diff }
    }
}

/// Running count of adjustment outcomes within one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub replaced: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl From<&Outcome> for Tally {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Replaced { .. } => Tally { replaced: 1, ..Tally::default() },
            Outcome::Unchanged => Tally { unchanged: 1, ..Tally::default() },
            Outcome::Failed(_) => Tally { failed: 1, ..Tally::default() },
        }
    }
}

impl Add for Tally {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Tally {
            replaced: self.replaced + rhs.replaced,
            unchanged: self.unchanged + rhs.unchanged,
            failed: self.failed + rhs.failed,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("target value {target} is below the minimum budget {min}")]
    BudgetTooLow { target: Price, min: Price },
    #[error("target value {target} is above the maximum budget {max}")]
    BudgetTooHigh { target: Price, max: Price },
    #[error("draft failed: {0}")]
    Repository(#[from] RepositoryError),
    #[error("squad did not converge after {iterations} iterations (stuck in {phase})")]
    ConvergenceFailed { phase: Phase, iterations: usize },
}
