use crate::data::{Entry, Fitness, Instance, Schedule};
use crate::error::ScheduleError;
use crate::solver::{
  evaluate, is_feasible, job_ids, machine_tec, positions_by_cost, recompute_start_times,
  within_horizon,
};
use itertools::Itertools;
use log::{debug, trace};
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::{self, Ordering};

// Attempts to find two non-overlapping blocks on a machine
const BLOCK_SWAP_ATTEMPTS: usize = 10;

/// Trial counts grow linearly with the number of jobs between two anchors.
#[derive(Debug, Clone)]
pub struct Config {
  pub min_trials: usize,
  pub max_trials: usize,
  pub min_jobs: usize,
  pub max_jobs: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      min_trials: 2,
      max_trials: 10,
      min_jobs: 10,
      max_jobs: 800,
    }
  }
}

impl Config {
  pub fn trials(&self, n_jobs: usize) -> usize {
    if self.max_jobs <= self.min_jobs {
      return cmp::max(1, self.min_trials);
    }
    let slope = (self.max_trials as f64 - self.min_trials as f64)
      / (self.max_jobs as f64 - self.min_jobs as f64);
    let trials = self.min_trials as f64 + (n_jobs as f64 - self.min_jobs as f64) * slope;

    let low = cmp::min(self.min_trials, self.max_trials) as f64;
    let high = cmp::max(self.min_trials, self.max_trials) as f64;
    return cmp::max(1, trials.round().max(low).min(high) as usize);
  }
}

pub type Candidate = (Schedule, Fitness);

#[derive(Debug, Clone, Default)]
pub struct Exploration {
  // Better in one objective and worse in the other
  pub improving: Vec<Candidate>,
  pub dominating: Option<Candidate>,
}

#[derive(Debug, Clone)]
pub struct Outcome {
  pub schedule: Schedule,
  pub fitness: Fitness,
  pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
  BlockRelocation,
  CheapPeriodRelocation,
  BlockSwap,
  CostGuidedSwap,
  MachineSwap,
}

pub const NEIGHBORHOODS: [Neighborhood; 5] = [
  Neighborhood::BlockRelocation,
  Neighborhood::CheapPeriodRelocation,
  Neighborhood::BlockSwap,
  Neighborhood::CostGuidedSwap,
  Neighborhood::MachineSwap,
];

struct Explorer<'a> {
  inst: &'a Instance,
  baseline: Fitness,
  exploration: Exploration,
}

impl<'a> Explorer<'a> {
  // Returns true once a dominating neighbor has been found
  fn offer(&mut self, schedule: Schedule) -> bool {
    if !is_feasible(self.inst, &schedule) {
      return false;
    }
    let fitness = match evaluate(self.inst, &schedule) {
      Ok(fitness) => fitness,
      Err(_) => return false,
    };
    if fitness == self.baseline || !within_horizon(self.inst, &fitness) {
      return false;
    }

    if fitness.dominates(&self.baseline) {
      trace!("Dominating neighbor ({}, {:.2})", fitness.cmax, fitness.tec);
      self.exploration.dominating = Some((schedule, fitness));
      return true;
    }

    let cmax = fitness.cmax.cmp(&self.baseline.cmax);
    let tec = fitness
      .tec
      .partial_cmp(&self.baseline.tec)
      .unwrap_or(Ordering::Equal);
    match (cmax, tec) {
      (Ordering::Less, Ordering::Greater) | (Ordering::Greater, Ordering::Less) => {
        self.exploration.improving.push((schedule, fitness));
      }
      _ => {}
    }
    return false;
  }
}

impl Neighborhood {
  pub fn explore<R: Rng>(
    &self,
    inst: &Instance,
    schedule: &Schedule,
    config: &Config,
    rng: &mut R,
  ) -> Result<Exploration, ScheduleError> {
    let mut explorer = Explorer {
      inst: inst,
      baseline: evaluate(inst, schedule)?,
      exploration: Exploration::default(),
    };
    let trials = config.trials(inst.n_jobs);

    match self {
      Neighborhood::BlockRelocation => block_relocation(&mut explorer, schedule, trials, rng),
      Neighborhood::CheapPeriodRelocation => cheap_period_relocation(&mut explorer, schedule, trials),
      Neighborhood::BlockSwap => block_swap(&mut explorer, schedule, trials, rng),
      Neighborhood::CostGuidedSwap => cost_guided_swap(&mut explorer, schedule, trials),
      Neighborhood::MachineSwap => machine_swap(&mut explorer, schedule),
    }

    return Ok(explorer.exploration);
  }
}

/// Variable neighborhood descent.
///
/// Neighborhoods are explored in fixed order and the first dominating neighbor ends the
/// search. Otherwise one of the collected trade-off neighbors is picked at random, or the
/// input is returned when there is none.
pub fn improve<R: Rng>(
  inst: &Instance,
  schedule: &Schedule,
  config: &Config,
  rng: &mut R,
) -> Result<Outcome, ScheduleError> {
  let fitness = evaluate(inst, schedule)?;
  let mut candidates = Vec::new();

  for neighborhood in NEIGHBORHOODS.iter() {
    let exploration = neighborhood.explore(inst, schedule, config, rng)?;
    if let Some((dominating, dominating_fitness)) = exploration.dominating {
      debug!(
        "{:?} improved ({}, {:.2}) to ({}, {:.2})",
        neighborhood, fitness.cmax, fitness.tec, dominating_fitness.cmax, dominating_fitness.tec
      );
      return Ok(Outcome {
        schedule: dominating,
        fitness: dominating_fitness,
        candidates: candidates,
      });
    }
    candidates.extend(exploration.improving);
  }

  let chosen = candidates.choose(rng).cloned();
  return Ok(match chosen {
    Some((chosen, chosen_fitness)) => Outcome {
      schedule: chosen,
      fitness: chosen_fitness,
      candidates: candidates,
    },
    None => Outcome {
      schedule: schedule.clone(),
      fitness: fitness,
      candidates: candidates,
    },
  });
}

fn block_size<R: Rng>(n_jobs: usize, rng: &mut R) -> usize {
  return rng.gen_range(1, cmp::max(1, n_jobs / 10) + 1);
}

fn without_hints(entries: &[Entry]) -> Vec<Entry> {
  return entries.iter().map(|&(job, _)| (job, 0)).collect();
}

// Moves a random block of consecutive jobs to a random position on each machine
fn block_relocation<R: Rng>(explorer: &mut Explorer, schedule: &Schedule, trials: usize, rng: &mut R) {
  for _ in 0..trials {
    let size = block_size(explorer.inst.n_jobs, rng);

    for (machine, sequence) in schedule.iter().enumerate() {
      if sequence.len() < size {
        continue;
      }
      let from = rng.gen_range(0, sequence.len() - size + 1);
      let block = without_hints(&sequence[from..from + size]);
      let mut remaining: Vec<Entry> = sequence[..from]
        .iter()
        .chain(sequence[from + size..].iter())
        .copied()
        .collect();
      let at = rng.gen_range(0, remaining.len() + 1);
      remaining.splice(at..at, block);

      let mut neighbor = schedule.clone();
      neighbor[machine] = remaining;
      recompute_start_times(explorer.inst, &mut neighbor);
      if explorer.offer(neighbor) {
        return;
      }
    }
  }
}

// Moves the costliest jobs of every machine into the globally cheapest period
fn cheap_period_relocation(explorer: &mut Explorer, schedule: &Schedule, trials: usize) {
  let target = explorer.inst.tariff.cheapest_period().start;

  for machine in 0..schedule.len() {
    let ranked = positions_by_cost(explorer.inst, schedule, machine);
    for &position in ranked.iter().take(trials) {
      let (job, start) = schedule[machine][position];
      if start == target {
        continue;
      }

      let mut sequence: Vec<Entry> = schedule[machine]
        .iter()
        .filter(|&&(other, _)| other != job)
        .copied()
        .collect();
      let at = sequence
        .iter()
        .position(|&(_, other_start)| other_start >= target)
        .unwrap_or(sequence.len());
      sequence.insert(at, (job, target));

      let mut neighbor = schedule.clone();
      neighbor[machine] = sequence;
      recompute_start_times(explorer.inst, &mut neighbor);
      if explorer.offer(neighbor) {
        return;
      }
    }
  }
}

// Exchanges two non-overlapping blocks of equal length on each machine
fn block_swap<R: Rng>(explorer: &mut Explorer, schedule: &Schedule, trials: usize, rng: &mut R) {
  for _ in 0..trials {
    let size = block_size(explorer.inst.n_jobs, rng);

    for (machine, sequence) in schedule.iter().enumerate() {
      if sequence.len() < 2 * size {
        continue;
      }
      let last_start = sequence.len() - size;
      let blocks = (0..BLOCK_SWAP_ATTEMPTS)
        .map(|_| (rng.gen_range(0, last_start + 1), rng.gen_range(0, last_start + 1)))
        .find(|&(a, b)| cmp::max(a, b) - cmp::min(a, b) >= size);
      let (a, b) = match blocks {
        Some(blocks) => blocks,
        None => continue,
      };

      let mut swapped = sequence.clone();
      for offset in 0..size {
        swapped[a + offset] = (sequence[b + offset].0, 0);
        swapped[b + offset] = (sequence[a + offset].0, 0);
      }

      let mut neighbor = schedule.clone();
      neighbor[machine] = swapped;
      recompute_start_times(explorer.inst, &mut neighbor);
      if explorer.offer(neighbor) {
        return;
      }
    }
  }
}

// Swaps jobs that are adjacent in the energy cost ranking, each swap on a fresh copy
fn cost_guided_swap(explorer: &mut Explorer, schedule: &Schedule, trials: usize) {
  for machine in 0..schedule.len() {
    if schedule[machine].len() < 2 {
      continue;
    }
    let ranked = positions_by_cost(explorer.inst, schedule, machine);

    for (&a, &b) in ranked.iter().tuple_windows().take(trials) {
      let mut neighbor = schedule.clone();
      neighbor[machine].swap(a, b);
      neighbor[machine][a].1 = 0;
      neighbor[machine][b].1 = 0;
      recompute_start_times(explorer.inst, &mut neighbor);
      if explorer.offer(neighbor) {
        return;
      }
    }
  }
}

// Exchanges the job orders of the two machines with the highest energy cost
fn machine_swap(explorer: &mut Explorer, schedule: &Schedule) {
  if schedule.len() < 2 {
    return;
  }
  let costliest: Vec<usize> = (0..schedule.len())
    .map(|machine| (machine, machine_tec(explorer.inst, schedule, machine)))
    .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
    .map(|(machine, _)| machine)
    .take(2)
    .collect();
  let (first, second) = (costliest[0], costliest[1]);

  let mut neighbor = schedule.clone();
  let jobs_first = job_ids(&schedule[first]);
  let jobs_second = job_ids(&schedule[second]);
  for (entry, &job) in neighbor[first].iter_mut().zip(jobs_second.iter()) {
    entry.0 = job;
  }
  for (entry, &job) in neighbor[second].iter_mut().zip(jobs_first.iter()) {
    entry.0 = job;
  }
  trace!("machine_swap({}, {})", first, second);

  recompute_start_times(explorer.inst, &mut neighbor);
  explorer.offer(neighbor);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::solver::tests::{small_instance, two_by_two};
  use crate::solver::{build_start_times, generate_random_schedule};
  use rand::SeedableRng;

  #[test]
  fn trial_count_is_linear_and_bounded() {
    let config = Config::default();

    assert_eq!(config.trials(6), 2);
    assert_eq!(config.trials(10), 2);
    assert_eq!(config.trials(405), 6);
    assert_eq!(config.trials(800), 10);
    assert_eq!(config.trials(5000), 10);

    let flat = Config {
      min_trials: 0,
      max_trials: 0,
      min_jobs: 10,
      max_jobs: 800,
    };
    assert_eq!(flat.trials(100), 1);
  }

  #[test]
  fn result_is_never_dominated_by_the_input() {
    let inst = small_instance();
    let config = Config::default();
    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(10);

    for _ in 0..25 {
      let schedule = generate_random_schedule(&inst, &mut rng);
      let before = evaluate(&inst, &schedule).expect("evaluable schedule");
      let outcome = improve(&inst, &schedule, &config, &mut rng).expect("evaluable schedule");

      assert!(!before.dominates(&outcome.fitness));
      assert!(is_feasible(&inst, &outcome.schedule));
      assert_eq!(evaluate(&inst, &outcome.schedule), Ok(outcome.fitness));
    }
  }

  #[test]
  fn collected_candidates_trade_one_objective_for_the_other() {
    let inst = small_instance();
    let config = Config::default();
    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(12);
    let schedule = generate_random_schedule(&inst, &mut rng);
    let baseline = evaluate(&inst, &schedule).expect("evaluable schedule");

    for neighborhood in NEIGHBORHOODS.iter() {
      let exploration = neighborhood
        .explore(&inst, &schedule, &config, &mut rng)
        .expect("evaluable schedule");
      for (candidate, fitness) in &exploration.improving {
        assert!(is_feasible(&inst, candidate));
        assert!(!fitness.dominates(&baseline) && !baseline.dominates(fitness));
        assert!(fitness.cmax <= inst.horizon());
      }
      if let Some((_, fitness)) = exploration.dominating {
        assert!(fitness.dominates(&baseline));
      }
    }
  }

  #[test]
  fn delayed_jobs_are_pulled_back() {
    let inst = two_by_two();
    let mut schedule = build_start_times(&inst, &[vec![0, 1], vec![0, 1]]);
    // An idle gap before the last job only makes things worse
    schedule[1][1].1 = 40;
    recompute_start_times(&inst, &mut schedule);
    let before = evaluate(&inst, &schedule).expect("evaluable schedule");

    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(3);
    let outcome = improve(&inst, &schedule, &Config::default(), &mut rng).expect("evaluable schedule");
    assert!(outcome.fitness.dominates(&before) || outcome.fitness.cmax < before.cmax);
  }

  #[test]
  fn single_machine_has_no_machine_swap() {
    let tariff = crate::data::Tariff::from_periods(vec![crate::data::Period::new(0, 50, 1.0)])
      .expect("valid tariff");
    let inst = Instance::new(ndarray::arr2(&[[2], [3]]), tariff, ndarray::arr1(&[1.0]))
      .expect("valid instance");
    let schedule = build_start_times(&inst, &[vec![0, 1]]);
    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(1);

    let exploration = Neighborhood::MachineSwap
      .explore(&inst, &schedule, &Config::default(), &mut rng)
      .expect("evaluable schedule");
    assert!(exploration.dominating.is_none() && exploration.improving.is_empty());
  }
}
