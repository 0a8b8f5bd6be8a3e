use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::model::entity::{GameweekScore, Id, Player, Position, Price};

/// Cheap pool ceiling used for the draft (£5.0m).
pub const DEFAULT_DRAFT_PRICE_CAP: Price = 50;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    #[error("no candidates for position {position}")]
    NoCandidates { position: Position },
    #[error("no gameweek data for player {player_id}")]
    NoData { player_id: Id },
    #[error("repository backend error: {0}")]
    Backend(String),
}

pub trait PlayerRepository: Send + Sync {
    /// A random player from the cheap draft pool.
    fn random_player(&self, position: Position) -> Result<Player, RepositoryError>;

    /// A random strictly costlier player at the same position, or `current` if none.
    fn upgrade_player(&self, current: &Player) -> Result<Player, RepositoryError>;

    /// The costliest strictly cheaper player at the same position, or `current` if none.
    fn downgrade_player(&self, current: &Player) -> Result<Player, RepositoryError>;

    /// The costliest same-position player priced at or below `current` whose
    /// id is neither `current`'s nor in `excluding`.
    fn replace_player(
        &self,
        current: &Player,
        excluding: &[Player],
    ) -> Result<Player, RepositoryError>;

    fn season_scores(&self, player_id: Id) -> Result<Vec<GameweekScore>, RepositoryError>;
}

impl<R: PlayerRepository + ?Sized> PlayerRepository for Box<R> {
    fn random_player(&self, position: Position) -> Result<Player, RepositoryError> {
        (**self).random_player(position)
    }

    fn upgrade_player(&self, current: &Player) -> Result<Player, RepositoryError> {
        (**self).upgrade_player(current)
    }

    fn downgrade_player(&self, current: &Player) -> Result<Player, RepositoryError> {
        (**self).downgrade_player(current)
    }

    fn replace_player(
        &self,
        current: &Player,
        excluding: &[Player],
    ) -> Result<Player, RepositoryError> {
        (**self).replace_player(current, excluding)
    }

    fn season_scores(&self, player_id: Id) -> Result<Vec<GameweekScore>, RepositoryError> {
        (**self).season_scores(player_id)
    }
}

/// Candidate-selection rules shared by every backend once rows are loaded.
pub(crate) mod select {
    use rand::seq::SliceRandom;
    use rand::Rng;

    use crate::model::entity::Player;

    pub fn random<R: Rng + ?Sized>(candidates: &[Player], rng: &mut R) -> Option<Player> {
        candidates.choose(rng).cloned()
    }

    pub fn costliest(candidates: Vec<Player>) -> Option<Player> {
        // max_by_key keeps the last maximum; prefer the first seen among equal prices
        candidates
            .into_iter()
            .rev()
            .max_by_key(|player| player.price)
    }
}

pub struct InMemoryRepository {
    players: Vec<Player>,
    scores: HashMap<Id, Vec<GameweekScore>>,
    draft_price_cap: Price,
    rng: Mutex<SmallRng>,
    calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new(players: Vec<Player>, seed: u64) -> InMemoryRepository {
        InMemoryRepository {
            players,
            scores: HashMap::new(),
            draft_price_cap: DEFAULT_DRAFT_PRICE_CAP,
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_scores(mut self, scores: impl IntoIterator<Item = GameweekScore>) -> InMemoryRepository {
        for score in scores {
            self.scores.entry(score.player_id).or_default().push(score);
        }
        self
    }

    /// Number of trait calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn candidates(&self, position: Position, keep: impl Fn(&Player) -> bool) -> Vec<Player> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.players
            .iter()
            .filter(|player| player.position == position && keep(player))
            .cloned()
            .collect()
    }
}

impl PlayerRepository for InMemoryRepository {
    fn random_player(&self, position: Position) -> Result<Player, RepositoryError> {
        let cap = self.draft_price_cap;
        let pool = self.candidates(position, |player| player.price <= cap);
        select::random(&pool, &mut *self.rng.lock())
            .ok_or(RepositoryError::NoCandidates { position })
    }

    fn upgrade_player(&self, current: &Player) -> Result<Player, RepositoryError> {
        let pool = self.candidates(current.position, |player| player.price > current.price);
        Ok(select::random(&pool, &mut *self.rng.lock()).unwrap_or_else(|| current.clone()))
    }

    fn downgrade_player(&self, current: &Player) -> Result<Player, RepositoryError> {
        let pool = self.candidates(current.position, |player| player.price < current.price);
        Ok(select::costliest(pool).unwrap_or_else(|| current.clone()))
    }

    fn replace_player(
        &self,
        current: &Player,
        excluding: &[Player],
    ) -> Result<Player, RepositoryError> {
        let pool = self.candidates(current.position, |player| {
            player.id != current.id
                && player.price <= current.price
                && !excluding.iter().any(|taken| taken.id == player.id)
        });
        select::costliest(pool).ok_or(RepositoryError::NoCandidates {
            position: current.position,
        })
    }

    fn season_scores(&self, player_id: Id) -> Result<Vec<GameweekScore>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.scores.get(&player_id) {
            Some(scores) if !scores.is_empty() => Ok(scores.clone()),
            _ => Err(RepositoryError::NoData { player_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: Id, position: Position, price: Price) -> Player {
        Player {
            id,
            first_name: "Test".into(),
            last_name: format!("P{id}"),
            position,
            team: "TST".into(),
            price,
        }
    }

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new(
            vec![
                player(1, Position::Defender, 40),
                player(2, Position::Defender, 45),
                player(3, Position::Defender, 55),
                player(4, Position::Defender, 70),
                player(5, Position::Forward, 90),
            ],
            7,
        )
    }

    #[test]
    fn draft_pool_respects_cap() {
        let repo = repo();
        for _ in 0..20 {
            let drafted = repo.random_player(Position::Defender).unwrap();
            assert!(drafted.price <= DEFAULT_DRAFT_PRICE_CAP);
        }
        assert_eq!(
            repo.random_player(Position::Forward),
            Err(RepositoryError::NoCandidates { position: Position::Forward })
        );
    }

    #[test]
    fn upgrade_is_strictly_costlier_or_unchanged() {
        let repo = repo();
        let cheap = player(1, Position::Defender, 40);
        for _ in 0..20 {
            assert!(repo.upgrade_player(&cheap).unwrap().price > 40);
        }
        let top = player(4, Position::Defender, 70);
        assert_eq!(repo.upgrade_player(&top).unwrap(), top);
    }

    #[test]
    fn downgrade_prefers_highest_cheaper() {
        let repo = repo();
        let current = player(4, Position::Defender, 70);
        assert_eq!(repo.downgrade_player(&current).unwrap().id, 3);
        let bottom = player(1, Position::Defender, 40);
        assert_eq!(repo.downgrade_player(&bottom).unwrap(), bottom);
    }

    #[test]
    fn replace_skips_excluded_and_costlier() {
        let repo = repo();
        let current = player(3, Position::Defender, 55);
        let excluding = vec![player(2, Position::Defender, 45)];
        assert_eq!(repo.replace_player(&current, &excluding).unwrap().id, 1);
        let taken = vec![player(1, Position::Defender, 40), player(2, Position::Defender, 45)];
        assert!(repo.replace_player(&current, &taken).is_err());
    }

    #[test]
    fn missing_scores_are_no_data() {
        let repo = repo();
        assert_eq!(repo.season_scores(1), Err(RepositoryError::NoData { player_id: 1 }));
    }
}
