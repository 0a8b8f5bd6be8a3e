//! Below target: upgrade a random slot. Above the ceiling: downgrade one.
//! In budget with a duplicate: replace the later copy, or upgrade it when
//! nothing cheaper is free. All adjustments share one iteration cap.

use rand::Rng;
use tracing::{debug, warn};

use crate::action::{Adjustment, BuildError, Outcome, Tally};
use crate::model::entity::{Player, Price};
use crate::model::squad::{Squad, SLOTS, SQUAD_SIZE};
use crate::repository::{PlayerRepository, RepositoryError};

pub const DEFAULT_MIN_BUDGET: Price = 750;
pub const DEFAULT_MAX_BUDGET: Price = 1000;
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildParams {
    pub min_budget: Price,
    pub max_budget: Price,
    pub max_iterations: usize,
}

impl Default for BuildParams {
    fn default() -> Self {
        BuildParams {
            min_budget: DEFAULT_MIN_BUDGET,
            max_budget: DEFAULT_MAX_BUDGET,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

struct State {
    squad: Squad,
    n_iterations: usize,
    tally: Tally,
}

pub struct SquadBuilder<'a, R: ?Sized> {
    repo: &'a R,
    params: BuildParams,
}

impl<'a, R: PlayerRepository + ?Sized> SquadBuilder<'a, R> {
    pub fn new(repo: &'a R, params: BuildParams) -> SquadBuilder<'a, R> {
        SquadBuilder { repo, params }
    }

    /// Builds one squad whose total price lands in `[target, max_budget]`.
    pub fn build_squad<G: Rng + ?Sized>(&self, target: Price, rng: &mut G) -> Result<Squad, BuildError> {
        if target < self.params.min_budget {
            return Err(BuildError::BudgetTooLow { target, min: self.params.min_budget });
        }
        if target > self.params.max_budget {
            return Err(BuildError::BudgetTooHigh { target, max: self.params.max_budget });
        }

        let mut state = State {
            squad: self.draft()?,
            n_iterations: 0,
            tally: Tally::default(),
        };

        while let Some(adjustment) = self.next_adjustment(&state.squad, target, rng) {
            if state.n_iterations >= self.params.max_iterations {
                return Err(BuildError::ConvergenceFailed {
                    phase: adjustment.phase(),
                    iterations: state.n_iterations,
                });
            }
            let outcome = self.apply(&mut state.squad, adjustment);
            match &outcome {
                Outcome::Unchanged => {
                    debug!(?adjustment, "no alternative available, slot left as is");
                }
                Outcome::Failed(err) => {
                    warn!(?adjustment, error = %err, "adjustment failed, retrying");
                }
                Outcome::Replaced { .. } => {}
            }
            state.tally = state.tally + Tally::from(&outcome);
            state.n_iterations += 1;
        }

        debug!(
            target,
            total = state.squad.total_price(),
            iterations = state.n_iterations,
            replaced = state.tally.replaced,
            unchanged = state.tally.unchanged,
            failed = state.tally.failed,
            "squad built"
        );
        Ok(state.squad)
    }

    /// One cheap-pool draw per slot, in slot order.
    pub fn draft(&self) -> Result<Squad, BuildError> {
        let players = SLOTS
            .iter()
            .flat_map(|(position, range)| range.clone().map(move |_| *position))
            .map(|position| self.repo.random_player(position))
            .collect::<Result<Vec<Player>, RepositoryError>>()?;
        Squad::from_players(players).map_err(|err| {
            BuildError::Repository(RepositoryError::Backend(format!("drafted squad malformed: {err}")))
        })
    }

    fn next_adjustment<G: Rng + ?Sized>(&self, squad: &Squad, target: Price, rng: &mut G) -> Option<Adjustment> {
        let total = squad.total_price();
        if total < target {
            return Some(Adjustment::Upgrade(rng.gen_range(0..SQUAD_SIZE)));
        }
        if total > self.params.max_budget {
            return Some(Adjustment::Downgrade(rng.gen_range(0..SQUAD_SIZE)));
        }
        squad.first_duplicate().map(|(_, later)| Adjustment::Replace(later))
    }

    fn apply(&self, squad: &mut Squad, adjustment: Adjustment) -> Outcome {
        let index = adjustment.index();
        let current = squad.player(index);
        let expected = current.position;
        let candidate = match adjustment {
            Adjustment::Upgrade(_) => self.repo.upgrade_player(current),
            Adjustment::Downgrade(_) => self.repo.downgrade_player(current),
            Adjustment::Replace(_) => match self.repo.replace_player(current, squad.players()) {
                Err(RepositoryError::NoCandidates { .. }) => self.repo.upgrade_player(current),
                other => other,
            },
        };

        match candidate {
            Ok(next) if next.position != expected => Outcome::Failed(RepositoryError::Backend(
                format!("slot {index} expects {expected} but got {}", next.position),
            )),
            Ok(next) => {
                let previous = squad.replace(index, next);
                Outcome::between(previous, squad.player(index))
            }
            Err(err) => Outcome::Failed(err),
        }
    }
}
