use crate::data::{Fitness, Individual, Instance};
use crate::error::ScheduleError;
use crate::solver::archive::{self, ExploredArchive, ParetoArchive};
use crate::solver::crossover::{Crossover, DEFAULT_CHEAP_PRICE_THRESHOLD};
use crate::solver::mutation::Mutation;
use crate::solver::{
  generate_random_schedule, is_acceptable, is_permutation_schedule, nfs, nsga2, similarity,
  tec_reducer, vnd,
};
use log::{debug, info, log_enabled, trace, Level};
use rand::{Rng, SeedableRng};
use rand_chacha;
use std::cmp::{self, Ordering};

#[derive(Debug, Clone)]
pub struct Config {
  pub seed: u64,
  pub population_size: usize,
  pub generations: usize,
  pub crossover_probability: f64,
  pub mutation_probability: f64,
  // Generations without an archive improvement before stopping
  pub stagnation_limit: usize,
  // Share of the initial population built by the insertion heuristic
  pub nfs_share: f64,
  // Share of the population replaced by NSGA-II survivors each generation
  pub survivor_share: f64,
  // Offspring with the highest energy cost refined by local search
  pub vnd_candidates: usize,
  pub reducer_after_vnd_probability: f64,
  pub crossover: Crossover,
  pub mutation: Mutation,
  pub cheap_price_threshold: f64,
  pub vnd: vnd::Config,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      seed: 0,
      population_size: 100,
      generations: 100,
      crossover_probability: 0.8,
      mutation_probability: 0.2,
      stagnation_limit: 20,
      nfs_share: 0.2,
      survivor_share: 0.9,
      vnd_candidates: 10,
      reducer_after_vnd_probability: 0.5,
      crossover: Crossover::TwoPoint,
      mutation: Mutation::Inversion,
      cheap_price_threshold: DEFAULT_CHEAP_PRICE_THRESHOLD,
      vnd: vnd::Config::default(),
    }
  }
}

impl Config {
  pub fn validate(&self) -> Result<(), ScheduleError> {
    if self.population_size == 0 {
      return Err(ScheduleError::InvalidConfig(
        "population size must be positive".to_string(),
      ));
    }

    let probabilities = [
      ("crossover probability", self.crossover_probability),
      ("mutation probability", self.mutation_probability),
      ("nfs share", self.nfs_share),
      ("survivor share", self.survivor_share),
      ("reducer probability", self.reducer_after_vnd_probability),
    ];
    for &(name, value) in probabilities.iter() {
      if !(0.0..=1.0).contains(&value) {
        return Err(ScheduleError::InvalidConfig(format!(
          "{} must be within [0, 1], got {}",
          name, value
        )));
      }
    }

    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct Front {
  // Non-dominated, acceptable, one per fitness value, sorted by makespan
  pub pareto: Vec<Individual>,
  pub explored: Vec<Individual>,
  pub initial: Vec<Individual>,
  pub generations: usize,
}

pub fn find_front(inst: &Instance, config: &Config) -> Result<Front, ScheduleError> {
  let mut rng = rand_chacha::ChaChaRng::seed_from_u64(config.seed);
  return run(inst, config, &mut rng);
}

/// NSGA-II with local search refinement.
///
/// Stops after `config.generations` generations or once `config.stagnation_limit`
/// consecutive generations failed to dominate a member of the Pareto archive.
pub fn run<R: Rng>(inst: &Instance, config: &Config, rng: &mut R) -> Result<Front, ScheduleError> {
  config.validate()?;

  let mut population = init_population(inst, config, rng);
  let scores = evaluate_all(inst, &mut population)?;
  log_diversity(&population);

  let initial_front: Vec<Individual> = nsga2::non_dominated(&scores)
    .into_iter()
    .map(|i| population[i].clone())
    .collect();
  let initial = archive::finalize(inst, &initial_front);

  let mut pareto = ParetoArchive::new();
  pareto.extend(initial_front.iter());
  let mut explored = ExploredArchive::new();
  explored.extend(population.iter());
  info!(
    "Initial front has {} members ({} acceptable)",
    initial_front.len(),
    initial.len()
  );

  let mut generation = 0;
  let mut stagnation = 0;
  while generation < config.generations && stagnation < config.stagnation_limit {
    let offspring = breed(inst, config, &mut population, rng)?;

    let accepted: Vec<Individual> = offspring
      .into_iter()
      .filter(|o| is_acceptable(inst, o.schedule()))
      .collect();
    explored.extend(accepted.iter());
    population = survivors(inst, config, population, accepted)?;

    let scores = evaluate_all(inst, &mut population)?;
    let front = nsga2::non_dominated(&scores);
    if front.iter().any(|&i| pareto.is_improved_by(&scores[i])) {
      stagnation = 0;
    } else {
      stagnation += 1;
      debug!("No archive improvement for {} generations", stagnation);
    }
    pareto.extend(front.iter().map(|&i| &population[i]));

    generation += 1;
    let archived: Vec<Fitness> = pareto.members().iter().filter_map(|m| m.fitness()).collect();
    info!(
      "Generation {}: archive {} / explored {}, best cmax {}, best tec {:.2}",
      generation,
      pareto.len(),
      explored.len(),
      archived.iter().map(|f| f.cmax).min().unwrap_or(0),
      archived.iter().map(|f| f.tec).fold(std::f64::INFINITY, f64::min)
    );
  }

  if stagnation >= config.stagnation_limit {
    info!("Stopping after {} generations without improvement", stagnation);
  }

  return Ok(Front {
    pareto: pareto.finalize(inst),
    explored: explored.finalize(inst),
    initial: initial,
    generations: generation,
  });
}

// Insertion heuristic probabilities spread evenly over [0.1, 1.0], rounded to hundredths
pub fn nfs_probabilities(count: usize) -> Vec<f64> {
  let round = |value: f64| (value * 100.0).round() / 100.0;
  return match count {
    0 => Vec::new(),
    1 => vec![0.1],
    _ => {
      let step = round(0.9 / (count - 1) as f64);
      (0..count)
        .map(|i| round(0.1 + i as f64 * step).min(1.0))
        .collect()
    }
  };
}

fn init_population<R: Rng>(inst: &Instance, config: &Config, rng: &mut R) -> Vec<Individual> {
  let nfs_count = ((config.nfs_share * config.population_size as f64) as usize).min(config.population_size);
  let mut population = Vec::with_capacity(config.population_size);

  for p in nfs_probabilities(nfs_count) {
    population.push(Individual::new(nfs::find_schedule(inst, p, rng)));
  }
  while population.len() < config.population_size {
    population.push(Individual::new(generate_random_schedule(inst, rng)));
  }

  debug!(
    "Initial population: {} insertion heuristic, {} random",
    nfs_count,
    config.population_size - nfs_count
  );
  return population;
}

fn evaluate_all(inst: &Instance, population: &mut [Individual]) -> Result<Vec<Fitness>, ScheduleError> {
  return population.iter_mut().map(|i| i.evaluate(inst)).collect();
}

fn log_diversity(population: &[Individual]) {
  if !log_enabled!(Level::Debug) || population.is_empty() {
    return;
  }
  let reference = population[0].schedule();
  let mean_similarity = population[1..]
    .iter()
    .map(|i| similarity(reference, i.schedule()))
    .sum::<f64>()
    / cmp::max(1, population.len() - 1) as f64;
  let permutations = population
    .iter()
    .filter(|i| is_permutation_schedule(i.schedule()))
    .count();

  debug!(
    "Mean similarity to the first individual {:.1}%, {} permutation schedules",
    mean_similarity, permutations
  );
}

// Selection, crossover, mutation and local search of one generation
fn breed<R: Rng>(
  inst: &Instance,
  config: &Config,
  population: &mut [Individual],
  rng: &mut R,
) -> Result<Vec<Individual>, ScheduleError> {
  let scores = evaluate_all(inst, population)?;
  let selected = nsga2::select(&scores, population.len());
  let mut offspring: Vec<Individual> = selected[..selected.len() / 2]
    .iter()
    .map(|&i| population[i].clone())
    .collect();

  for i in (1..offspring.len()).step_by(2) {
    if !rng.gen_bool(config.crossover_probability) {
      continue;
    }
    let (a, b) = config.crossover.apply(
      inst,
      offspring[i - 1].schedule(),
      offspring[i].schedule(),
      config.cheap_price_threshold,
      rng,
    );
    offspring[i - 1] = Individual::new(a);
    offspring[i] = Individual::new(b);
  }

  for child in offspring.iter_mut() {
    if !rng.gen_bool(config.mutation_probability) {
      continue;
    }
    let mutant = config.mutation.apply(inst, child.schedule(), rng);
    if is_acceptable(inst, &mutant) {
      child.set_schedule(mutant);
    } else {
      trace!("Discarding invalid {:?} mutant", config.mutation);
    }
  }

  let scores = evaluate_all(inst, &mut offspring)?;
  refine(inst, config, &mut offspring, &scores, rng)?;
  return Ok(offspring);
}

// Local search on the offspring with the highest energy cost
fn refine<R: Rng>(
  inst: &Instance,
  config: &Config,
  offspring: &mut [Individual],
  scores: &[Fitness],
  rng: &mut R,
) -> Result<(), ScheduleError> {
  let mut by_tec: Vec<usize> = (0..offspring.len()).collect();
  by_tec.sort_by(|&a, &b| {
    scores[b]
      .tec
      .partial_cmp(&scores[a].tec)
      .unwrap_or(Ordering::Equal)
  });

  for &i in by_tec.iter().take(config.vnd_candidates) {
    let outcome = vnd::improve(inst, offspring[i].schedule(), &config.vnd, rng)?;
    trace!(
      "VND on offspring {} kept ({}, {:.2}) out of {} trade-off candidates",
      i,
      outcome.fitness.cmax,
      outcome.fitness.tec,
      outcome.candidates.len()
    );

    if rng.gen_bool(config.reducer_after_vnd_probability) {
      let reduced = tec_reducer::reduce(inst, &outcome.schedule, rng);
      if is_acceptable(inst, &reduced) {
        offspring[i].set_schedule(reduced);
        offspring[i].evaluate(inst)?;
        continue;
      }
    }
    if is_acceptable(inst, &outcome.schedule) {
      offspring[i] = Individual::evaluated(outcome.schedule, outcome.fitness);
    }
  }

  return Ok(());
}

// Best survivors of population and offspring replace the head of the population
fn survivors(
  inst: &Instance,
  config: &Config,
  population: Vec<Individual>,
  offspring: Vec<Individual>,
) -> Result<Vec<Individual>, ScheduleError> {
  let cutoff = (config.survivor_share * population.len() as f64) as usize;

  let mut combined: Vec<Individual> = population
    .iter()
    .filter(|i| is_acceptable(inst, i.schedule()))
    .cloned()
    .chain(offspring.into_iter())
    .collect();
  let scores = evaluate_all(inst, &mut combined)?;
  let selected = nsga2::select(&scores, cutoff);

  let mut next: Vec<Individual> = selected.iter().map(|&i| combined[i].clone()).collect();
  let head = next.len();
  next.extend(population.into_iter().skip(head));
  return Ok(next);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::data::{Period, Schedule, Tariff};
  use crate::solver::build_start_times;
  use crate::solver::tests::small_instance;
  use ndarray::{arr1, arr2};

  fn quick_config(seed: u64) -> Config {
    return Config {
      seed: seed,
      population_size: 20,
      generations: 4,
      vnd_candidates: 3,
      ..Config::default()
    };
  }

  fn assert_valid_front(inst: &Instance, front: &[Individual]) {
    for (a, b) in front.iter().zip(front.iter().skip(1)) {
      let (fa, fb) = (a.fitness().expect("evaluated"), b.fitness().expect("evaluated"));
      assert!(fa.cmax <= fb.cmax);
      assert!(!fa.dominates(&fb) && !fb.dominates(&fa));
    }
    assert!(front.iter().all(|i| is_acceptable(inst, i.schedule())));
  }

  // Horizon equals the makespan of the only acceptable schedule, energy gets cheaper after it
  fn tight_horizon() -> (Instance, Schedule) {
    let tariff =
      Tariff::new(vec![Period::new(0, 4, 0.3), Period::new(4, 7, 0.05)], 7).expect("valid tariff");
    let inst = Instance::new(arr2(&[[1, 5], [5, 1]]), tariff, arr1(&[1.0, 1.0]))
      .expect("valid instance");
    let schedule = build_start_times(&inst, &[vec![0, 1], vec![0, 1]]);
    return (inst, schedule);
  }

  #[test]
  fn mutants_beyond_the_horizon_are_discarded() {
    let (inst, schedule) = tight_horizon();
    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(4);
    assert!(is_acceptable(&inst, &schedule));
    assert!(!is_acceptable(&inst, &Mutation::Swap.apply(&inst, &schedule, &mut rng)));

    let config = Config {
      crossover_probability: 0.0,
      mutation_probability: 1.0,
      mutation: Mutation::Swap,
      vnd_candidates: 0,
      ..quick_config(4)
    };
    let mut population = vec![Individual::new(schedule.clone()); 6];
    let offspring = breed(&inst, &config, &mut population, &mut rng).expect("evaluable");

    assert_eq!(offspring.len(), 3);
    assert!(offspring.iter().all(|o| o.schedule() == &schedule));
  }

  #[test]
  fn local_search_results_beyond_the_horizon_are_discarded() {
    let (inst, schedule) = tight_horizon();
    for &reducer in &[0.0, 1.0] {
      let config = Config {
        reducer_after_vnd_probability: reducer,
        ..quick_config(9)
      };
      let mut rng = rand_chacha::ChaChaRng::seed_from_u64(9);
      let mut offspring = vec![Individual::new(schedule.clone()); 4];
      let scores = evaluate_all(&inst, &mut offspring).expect("evaluable");

      refine(&inst, &config, &mut offspring, &scores, &mut rng).expect("evaluable");
      assert!(offspring.iter().all(|o| o.schedule() == &schedule));
    }
  }

  #[test]
  fn probabilities_span_the_unit_range() {
    assert_eq!(nfs_probabilities(4), vec![0.1, 0.4, 0.7, 1.0]);
    assert_eq!(nfs_probabilities(1), vec![0.1]);
    assert!(nfs_probabilities(0).is_empty());
    assert!(nfs_probabilities(20).iter().all(|&p| p >= 0.1 && p <= 1.0));
  }

  #[test]
  fn zero_generations_return_the_initial_front() {
    let inst = small_instance();
    let config = Config {
      generations: 0,
      ..quick_config(3)
    };

    let front = find_front(&inst, &config).expect("valid configuration");
    assert_eq!(front.generations, 0);
    assert!(!front.initial.is_empty());
    assert_eq!(front.pareto, front.initial);
  }

  #[test]
  fn short_run_yields_a_sorted_non_dominated_front() {
    let inst = small_instance();
    let front = find_front(&inst, &quick_config(7)).expect("valid configuration");

    assert!(front.generations <= 4);
    assert!(!front.pareto.is_empty());
    assert_valid_front(&inst, &front.pareto);
    assert!(front.explored.iter().all(|i| is_acceptable(&inst, i.schedule())));
  }

  #[test]
  fn archive_front_is_never_worse_than_the_initial_one() {
    let inst = small_instance();
    let front = find_front(&inst, &quick_config(11)).expect("valid configuration");

    for initial in &front.initial {
      let fitness = initial.fitness().expect("evaluated");
      assert!(!front
        .pareto
        .iter()
        .any(|p| fitness.dominates(&p.fitness().expect("evaluated"))));
    }
  }

  #[test]
  fn runs_are_reproducible_for_a_seed() {
    let inst = small_instance();
    let a = find_front(&inst, &quick_config(5)).expect("valid configuration");
    let b = find_front(&inst, &quick_config(5)).expect("valid configuration");
    assert_eq!(a.pareto, b.pareto);
  }

  #[test]
  fn every_operator_combination_runs() {
    let inst = small_instance();
    for &crossover in &[Crossover::TwoPoint, Crossover::PartiallyMapped, Crossover::TariffUniform] {
      for &mutation in &[
        Mutation::Swap,
        Mutation::Inversion,
        Mutation::CostGuidedInsertion(2),
        Mutation::TecReducer,
      ] {
        let config = Config {
          generations: 2,
          crossover: crossover,
          mutation: mutation,
          mutation_probability: 0.8,
          ..quick_config(1)
        };
        let front = find_front(&inst, &config).expect("valid configuration");
        assert_valid_front(&inst, &front.pareto);
      }
    }
  }

  #[test]
  fn rejects_invalid_configuration() {
    let inst = small_instance();
    let config = Config {
      crossover_probability: 1.5,
      ..quick_config(1)
    };
    assert!(matches!(
      find_front(&inst, &config),
      Err(ScheduleError::InvalidConfig(_))
    ));

    let empty = Config {
      population_size: 0,
      ..quick_config(1)
    };
    assert!(find_front(&inst, &empty).is_err());
  }
}
