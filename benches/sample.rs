use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use faer::Mat;
use mhfit::{
    gaussian_log_likelihood, random_search, sample_metropolis, InferenceProblem,
    MetropolisSettings, NuisanceSystem,
};
use rand::SeedableRng;

fn make_problem(num_obs: usize) -> InferenceProblem<fn(&[f64], &[f64]) -> Vec<f64>> {
    fn line(theta: &[f64], x: &[f64]) -> Vec<f64> {
        x.iter().map(|x| theta[0] + theta[1] * x).collect()
    }

    let x: Vec<f64> = (0..num_obs).map(|i| i as f64 / num_obs as f64).collect();
    let y = x.iter().map(|x| 1. + 2. * x).collect();
    let nuisance = NuisanceSystem::new(
        Mat::from_fn(num_obs, 2, |i, j| if i % 2 == j { 1. } else { 0. }),
        Mat::from_fn(2, 2, |i, j| if i == j { 0.1 } else { 0. }),
    )
    .unwrap();
    InferenceProblem::new(x, y, 0.1, line as fn(&[f64], &[f64]) -> Vec<f64>)
        .unwrap()
        .with_nuisance(nuisance)
        .unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    for n in [10, 100] {
        let residual = vec![0.1; n];
        let cov = Mat::from_fn(n, n, |i, j| if i == j { 1. } else { 0.1 });
        c.bench_function(&format!("likelihood cholesky {}", n), |b| {
            b.iter(|| gaussian_log_likelihood(black_box(&residual), cov.as_ref()).unwrap())
        });

        let singular = Mat::from_fn(n, n, |_, _| 1.);
        c.bench_function(&format!("likelihood pinv {}", n), |b| {
            b.iter(|| gaussian_log_likelihood(black_box(&residual), singular.as_ref()).unwrap())
        });
    }

    let problem = make_problem(50);
    c.bench_function("log posterior nuisance 50", |b| {
        b.iter(|| problem.log_posterior(black_box(&[1., 2.])).unwrap())
    });

    let settings = MetropolisSettings {
        num_steps: 1000,
        proposal_scale: 0.02.into(),
    };
    c.bench_function("metropolis 1000 nuisance 50", |b| {
        b.iter_batched(
            || rand::rngs::StdRng::seed_from_u64(42),
            |mut rng| sample_metropolis(&problem, &[1., 2.], &settings, &mut rng).unwrap(),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("random search 1000 nuisance 50", |b| {
        b.iter_batched(
            || rand::rngs::StdRng::seed_from_u64(42),
            |mut rng| random_search(&problem, &[(0., 2.), (0., 4.)], 1000, &mut rng).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
