use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::model::{eval_logp, LogDensity};
use crate::Result;

/// Settings for [`random_search_parallel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomSearchSettings {
    /// Total number of uniform samples over all streams.
    pub num_samples: u64,
    pub seed: u64,
    /// Number of independent random streams the samples are split across.
    /// The result depends on this, but not on the number of threads.
    pub num_streams: u64,
    /// Size of the worker pool. Zero lets rayon decide.
    pub num_threads: usize,
}

impl Default for RandomSearchSettings {
    fn default() -> Self {
        Self {
            num_samples: 2000,
            seed: 0,
            num_streams: 8,
            num_threads: 0,
        }
    }
}

/// Best point found by a random search.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEstimate {
    pub position: Vec<f64>,
    pub logp: f64,
}

impl MapEstimate {
    fn lower_corner(bounds: &[(f64, f64)]) -> Self {
        Self {
            position: bounds.iter().map(|&(low, _)| low).collect(),
            logp: f64::NEG_INFINITY,
        }
    }
}

/// Evaluate `density` at `num_samples` points drawn uniformly from the box
/// `bounds` and return the best one.
///
/// The first of several equally good points wins. Without any sample that
/// beats negative infinity, the lower corner of the box is returned with a
/// log-density of negative infinity.
pub fn random_search<L, R>(
    density: &L,
    bounds: &[(f64, f64)],
    num_samples: u64,
    rng: &mut R,
) -> Result<MapEstimate>
where
    L: LogDensity + ?Sized,
    R: Rng + ?Sized,
{
    let mut best = MapEstimate::lower_corner(bounds);
    let mut point = vec![0f64; bounds.len()];

    for _ in 0..num_samples {
        for (x, &(low, high)) in point.iter_mut().zip(bounds) {
            let u: f64 = rng.random();
            *x = low + (high - low) * u;
        }
        let logp = eval_logp(density, &point)?;
        if logp > best.logp {
            best.position.copy_from_slice(&point);
            best.logp = logp;
        }
    }

    Ok(best)
}

/// [`random_search`] split across independent random streams on a rayon
/// thread pool.
///
/// Stream `i` uses a `ChaCha8Rng` seeded with `settings.seed` on stream `i`
/// and searches its share of the samples. The best result over all streams
/// wins, with ties going to the lower stream.
pub fn random_search_parallel<L>(
    density: &L,
    bounds: &[(f64, f64)],
    settings: &RandomSearchSettings,
) -> Result<MapEstimate>
where
    L: LogDensity + Sync + ?Sized,
{
    let num_streams = settings.num_streams.max(1);
    let base = settings.num_samples / num_streams;
    let remainder = settings.num_samples % num_streams;

    let pool = ThreadPoolBuilder::new()
        .num_threads(settings.num_threads)
        .thread_name(|i| format!("mhfit-search-{}", i))
        .build()?;

    let results: Vec<Result<MapEstimate>> = pool.install(|| {
        (0..num_streams)
            .into_par_iter()
            .map(|stream| {
                let num_samples = base + u64::from(stream < remainder);
                let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
                rng.set_stream(stream);
                random_search(density, bounds, num_samples, &mut rng)
            })
            .collect()
    });

    let mut best = MapEstimate::lower_corner(bounds);
    for result in results {
        let candidate = result?;
        if candidate.logp > best.logp {
            best = candidate;
        }
    }

    log::debug!(
        "random search over {} samples in {} streams, best logp {}",
        settings.num_samples,
        num_streams,
        best.logp
    );

    Ok(best)
}
