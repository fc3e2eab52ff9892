//! Fit a straight line with an unknown calibration offset.
//!
//! The offset is a nuisance parameter and is integrated out analytically,
//! so the sampler only explores the intercept and the slope.

use mhfit::{
    fisher_matrix, information_criteria, laplace_log_evidence, numerical_hessian,
    random_search_parallel, Chain, InferenceProblem, MetropolisChain, NuisanceSystem, Prior,
    PriorSet, RandomSearchSettings, StepScale, SummaryOptions,
};
use rand::SeedableRng;

fn line(theta: &[f64], x: &[f64]) -> Vec<f64> {
    x.iter().map(|x| theta[0] + theta[1] * x).collect()
}

fn main() -> anyhow::Result<()> {
    let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
    // Intercept 1, slope 0.5, with a calibration offset of 0.3 on every point.
    let y: Vec<f64> = x
        .iter()
        .enumerate()
        .map(|(i, x)| 1.3 + 0.5 * x + 0.05 * ((i * 7 % 5) as f64 - 2.))
        .collect();

    let priors = PriorSet::new()
        .with("intercept", Prior::uniform(-10., 10.))
        .with("slope", Prior::gaussian(0., 4.));
    let nuisance = NuisanceSystem::from_rows(&vec![vec![1.]; x.len()], None, &[vec![0.09]])?;

    let problem = InferenceProblem::new(x, y, 0.1, line)?
        .with_parameter_names(["intercept", "slope"])
        .with_priors(priors)
        .with_nuisance(nuisance)?;

    // Crude starting point
    let search = RandomSearchSettings {
        num_samples: 20_000,
        seed: 42,
        ..Default::default()
    };
    let start = random_search_parallel(&problem, &[(-5., 5.), (-2., 2.)], &search)?;
    println!(
        "random search: {:?} with logp {:.3}",
        start.position, start.logp
    );

    let num_steps = 20_000;
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut sampler =
        MetropolisChain::new(&problem, &start.position, &StepScale::Shared(0.05), &mut rng)?;
    let mut chain = Chain::with_capacity(sampler.dim(), num_steps);
    for i in 0..num_steps {
        let progress = sampler.draw()?;
        chain.push(sampler.position(), progress.logp, progress.accepted)?;
        if i % 5000 == 0 {
            println!("draw {}: logp {:.3}", i, progress.logp);
        }
    }
    println!("acceptance rate {:.3}", sampler.acceptance_rate());

    let summary = chain.discard(2000).summarize(&SummaryOptions::default())?;
    for (name, (mean, std)) in problem
        .parameter_names()
        .iter()
        .zip(summary.mean.iter().zip(summary.std()))
    {
        println!("{name}: {mean:.3} +- {std:.3}");
    }

    let trace = chain.to_record_batch(problem.parameter_names())?;
    println!("trace with {} rows and {} columns", trace.num_rows(), trace.num_columns());

    let step = StepScale::Shared(1e-3);
    let fisher = fisher_matrix(&problem, &summary.mean, &step)?;
    // Marginal errors are the diagonal of the inverse, here of a 2x2 matrix.
    let det = fisher[(0, 0)] * fisher[(1, 1)] - fisher[(0, 1)] * fisher[(1, 0)];
    println!(
        "fisher forecast errors: {:.3}, {:.3}",
        (fisher[(1, 1)] / det).sqrt(),
        (fisher[(0, 0)] / det).sqrt()
    );

    let logp_at_mode = problem.log_posterior(&start.position)?;
    let hessian = numerical_hessian(&problem, &start.position, &step)?;
    match laplace_log_evidence(logp_at_mode, hessian.as_ref()) {
        Ok(evidence) => println!("laplace log evidence {evidence:.3}"),
        Err(err) => println!("no evidence estimate: {err}"),
    }

    let max_log_likelihood = problem.log_likelihood(&start.position)?;
    let criteria = information_criteria(max_log_likelihood, 2, problem.num_observations());
    println!("aic {:.3}, bic {:.3}", criteria.aic, criteria.bic);

    Ok(())
}
