//! One connection per call; concurrent tasks never share one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::model::entity::{GameweekScore, Id, Player, Position, Price};
use crate::repository::{select, PlayerRepository, RepositoryError, DEFAULT_DRAFT_PRICE_CAP};

const PLAYER_COLUMNS: &str = "id, first_name, last_name, position, team, price";

pub struct SqliteRepository {
    db_path: PathBuf,
    draft_price_cap: Price,
    rng: Mutex<SmallRng>,
}

impl SqliteRepository {
    /// Open an existing database, creating the tables if they are missing.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let repo = Self {
            db_path: db_path.as_ref().to_path_buf(),
            draft_price_cap: DEFAULT_DRAFT_PRICE_CAP,
            rng: Mutex::new(SmallRng::from_entropy()),
        };
        repo.init_db()?;
        info!(path = %repo.db_path.display(), "player database ready");
        Ok(repo)
    }

    pub fn with_draft_price_cap(mut self, cap: Price) -> Self {
        self.draft_price_cap = cap;
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = SmallRng::seed_from_u64(seed);
        self
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.connect().context("Failed to open player database")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                position TEXT NOT NULL,
                team TEXT NOT NULL,
                price INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS gameweeks (
                player_id INTEGER NOT NULL,
                gameweek INTEGER NOT NULL,
                opponent_team TEXT NOT NULL,
                total_points INTEGER NOT NULL,
                value INTEGER NOT NULL,
                was_home INTEGER NOT NULL,
                FOREIGN KEY (player_id) REFERENCES players(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_players_position_price ON players(position, price)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_gameweeks_player ON gameweeks(player_id)",
            [],
        )?;

        Ok(())
    }

    pub fn insert_player(&self, player: &Player) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR REPLACE INTO players (id, first_name, last_name, position, team, price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                player.id,
                player.first_name,
                player.last_name,
                player.position.code(),
                player.team,
                player.price,
            ],
        )
        .with_context(|| format!("Failed to insert player {}", player.id))?;
        Ok(())
    }

    pub fn insert_gameweek(&self, score: &GameweekScore) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO gameweeks (player_id, gameweek, opponent_team, total_points, value, was_home)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                score.player_id,
                score.gameweek,
                score.opponent_team,
                score.total_points,
                score.value,
                score.was_home,
            ],
        )
        .with_context(|| format!("Failed to insert gameweek for player {}", score.player_id))?;
        Ok(())
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open(&self.db_path)
    }

    fn query_players<P: rusqlite::Params>(
        &self,
        filter: &str,
        args: P,
    ) -> Result<Vec<Player>, RepositoryError> {
        let conn = self.connect().map_err(backend)?;
        let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE {filter} ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(backend)?;
        let players = stmt
            .query_map(args, player_from_row)
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;
        Ok(players)
    }
}

fn backend(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::Backend(err.to_string())
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    let code: String = row.get(3)?;
    let position = Position::from_code(&code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown position code {code:?}").into(),
        )
    })?;
    Ok(Player {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        position,
        team: row.get(4)?,
        price: row.get(5)?,
    })
}

impl PlayerRepository for SqliteRepository {
    fn random_player(&self, position: Position) -> Result<Player, RepositoryError> {
        let pool = self.query_players(
            "position = ?1 AND price <= ?2",
            params![position.code(), self.draft_price_cap],
        )?;
        select::random(&pool, &mut *self.rng.lock())
            .ok_or(RepositoryError::NoCandidates { position })
    }

    fn upgrade_player(&self, current: &Player) -> Result<Player, RepositoryError> {
        let pool = self.query_players(
            "position = ?1 AND price > ?2",
            params![current.position.code(), current.price],
        )?;
        Ok(select::random(&pool, &mut *self.rng.lock()).unwrap_or_else(|| current.clone()))
    }

    fn downgrade_player(&self, current: &Player) -> Result<Player, RepositoryError> {
        let pool = self.query_players(
            "position = ?1 AND price < ?2",
            params![current.position.code(), current.price],
        )?;
        Ok(select::costliest(pool).unwrap_or_else(|| current.clone()))
    }

    fn replace_player(
        &self,
        current: &Player,
        excluding: &[Player],
    ) -> Result<Player, RepositoryError> {
        let pool = self
            .query_players(
                "id != ?1 AND position = ?2 AND price <= ?3",
                params![current.id, current.position.code(), current.price],
            )?
            .into_iter()
            .filter(|player| !excluding.iter().any(|taken| taken.id == player.id))
            .collect();
        select::costliest(pool).ok_or(RepositoryError::NoCandidates {
            position: current.position,
        })
    }

    fn season_scores(&self, player_id: Id) -> Result<Vec<GameweekScore>, RepositoryError> {
        let conn = self.connect().map_err(backend)?;
        let mut stmt = conn
            .prepare(
                "SELECT player_id, gameweek, opponent_team, total_points, value, was_home
                 FROM gameweeks WHERE player_id = ?1 ORDER BY gameweek",
            )
            .map_err(backend)?;
        let scores = stmt
            .query_map(params![player_id], |row| {
                Ok(GameweekScore {
                    player_id: row.get(0)?,
                    gameweek: row.get(1)?,
                    opponent_team: row.get(2)?,
                    total_points: row.get(3)?,
                    value: row.get(4)?,
                    was_home: row.get(5)?,
                })
            })
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;

        if scores.is_empty() {
            return Err(RepositoryError::NoData { player_id });
        }
        Ok(scores)
    }
}
