//! Rounds run one after another; collecting a round is the barrier that
//! caps in-flight repository calls.

use std::time::Instant;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::BuildError;
use crate::analysis::{self, PriceCurve};
use crate::builder::{BuildParams, SquadBuilder};
use crate::cache::{CacheStats, PointsCache};
use crate::model::entity::{Points, Price};
use crate::model::sample::SimulationSample;
use crate::repository::{PlayerRepository, RepositoryError};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskFailure {
    #[error("squad build failed: {0}")]
    Build(#[from] BuildError),
    #[error("scoring failed: {0}")]
    Score(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskError {
    pub task: usize,
    pub failure: TaskFailure,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("batch_size must be at least 1")]
    EmptyBatch,
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub samples: Vec<SimulationSample>,
    pub errors: Vec<TaskError>,
    pub price_curve: PriceCurve,
    pub rounds: usize,
    pub cache: CacheStats,
}

impl RunReport {
    pub fn attempted(&self) -> usize {
        self.samples.len() + self.errors.len()
    }
}

fn task_rng(seed: u64, task: usize) -> SmallRng {
    SmallRng::seed_from_u64(seed.wrapping_add(task as u64))
}

pub struct SimulationHarness<'a, R: ?Sized> {
    repo: &'a R,
    builder: SquadBuilder<'a, R>,
    cache: PointsCache,
    seed: u64,
}

impl<'a, R: PlayerRepository + ?Sized> SimulationHarness<'a, R> {
    pub fn new(repo: &'a R, params: BuildParams, cache: PointsCache, seed: u64) -> Self {
        SimulationHarness {
            repo,
            builder: SquadBuilder::new(repo, params),
            cache,
            seed,
        }
    }

    /// Runs `total_samples` tasks in rounds of at most `batch_size`.
    ///
    /// `value_sampler` draws each task's target budget from that task's RNG.
    /// Failed tasks are reported, never retried, and never stop the run.
    pub fn run_batches<F>(
        &self,
        total_samples: usize,
        batch_size: usize,
        value_sampler: F,
    ) -> Result<RunReport, HarnessError>
    where
        F: Fn(&mut SmallRng) -> Price + Sync,
    {
        if batch_size == 0 {
            return Err(HarnessError::EmptyBatch);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(batch_size.min(total_samples).max(1))
            .thread_name(|i| format!("squad-sim-{i}"))
            .build()?;

        let started = Instant::now();
        let mut report = RunReport::default();

        for (round, first) in (0..total_samples).step_by(batch_size).enumerate() {
            let tasks = first..(first + batch_size).min(total_samples);
            let round_size = tasks.len();

            let results: Vec<(usize, Result<SimulationSample, TaskFailure>)> = pool.install(|| {
                tasks
                    .into_par_iter()
                    .map(|task| (task, self.run_task(task, &value_sampler)))
                    .collect()
            });

            let mut round_samples = Vec::with_capacity(round_size);
            for (task, result) in results {
                match result {
                    Ok(sample) => round_samples.push(sample),
                    Err(failure) => {
                        warn!(task, error = %failure, "simulation task failed");
                        report.errors.push(TaskError { task, failure });
                    }
                }
            }
            report.price_curve.merge(&round_samples);
            info!(
                round,
                completed = round_samples.len(),
                failed = round_size - round_samples.len(),
                "round finished"
            );
            report.samples.append(&mut round_samples);
            report.rounds += 1;
        }

        report.cache = self.cache.stats();
        info!(
            samples = report.samples.len(),
            errors = report.errors.len(),
            rounds = report.rounds,
            cache_hits = report.cache.hits,
            cache_misses = report.cache.misses,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "simulation run finished"
        );
        Ok(report)
    }

    fn run_task<F>(&self, task: usize, value_sampler: &F) -> Result<SimulationSample, TaskFailure>
    where
        F: Fn(&mut SmallRng) -> Price + Sync,
    {
        let mut rng = task_rng(self.seed, task);
        let target = value_sampler(&mut rng);
        let squad = self.builder.build_squad(target, &mut rng)?;

        let total_points = squad
            .players()
            .iter()
            .map(|player| self.cache.get_or_compute(self.repo, player.id))
            .sum::<Result<Points, RepositoryError>>()?;
        let tiers = analysis::classify(&squad);
        debug!(task, target, total_points, premium = tiers.premium, "task finished");

        Ok(SimulationSample {
            total_price: squad.total_price(),
            total_points,
            tiers,
        })
    }
}
