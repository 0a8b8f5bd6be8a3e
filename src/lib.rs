//! Monte Carlo sampling of fantasy squads, relating spend to season points.

pub mod action;
pub mod analysis;
pub mod builder;
pub mod cache;
pub mod config;
pub mod harness;
pub mod model;
pub mod repository;
pub mod sink;
pub mod sqlite;

pub use action::{BuildError, Phase};
pub use analysis::{classify, percentiles, summarize, Percentiles, PriceCurve, TierCounts};
pub use builder::{BuildParams, SquadBuilder};
pub use cache::{ExpiringStore, MokaStore, PointsCache};
pub use config::SimulationConfig;
pub use harness::{RunReport, SimulationHarness, TaskError, TaskFailure};
pub use model::entity::{GameweekScore, Id, Player, Points, Position, Price};
pub use model::sample::SimulationSample;
pub use model::squad::Squad;
pub use repository::{InMemoryRepository, PlayerRepository, RepositoryError};
pub use sink::{CsvSink, ResultSink};
pub use sqlite::SqliteRepository;
