use crate::data::{Instance, Job, Schedule, Time};
use crate::solver::{build_start_times, job_ids, recompute_start_times, repair};
use log::trace;
use rand::seq::index;
use rand::Rng;
use std::collections::HashMap;

pub const DEFAULT_CHEAP_PRICE_THRESHOLD: f64 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
  TwoPoint,
  PartiallyMapped,
  TariffUniform,
}

impl Crossover {
  pub fn apply<R: Rng>(
    &self,
    inst: &Instance,
    a: &Schedule,
    b: &Schedule,
    cheap_price_threshold: f64,
    rng: &mut R,
  ) -> (Schedule, Schedule) {
    return match self {
      Crossover::TwoPoint => two_point(inst, a, b, rng),
      Crossover::PartiallyMapped => partially_mapped(inst, a, b, rng),
      Crossover::TariffUniform => tariff_uniform(inst, a, b, cheap_price_threshold, rng),
    };
  }
}

pub fn two_point<R: Rng>(inst: &Instance, a: &Schedule, b: &Schedule, rng: &mut R) -> (Schedule, Schedule) {
  // Two distinct cut points in 1..n
  if inst.n_jobs < 3 {
    return (a.clone(), b.clone());
  }
  let mut cuts = index::sample(rng, inst.n_jobs - 1, 2).into_vec();
  cuts.sort();
  let (from, to) = (cuts[0] + 1, cuts[1] + 1);
  trace!("two_point({}, {})", from, to);

  let mut child_a = a.clone();
  let mut child_b = b.clone();
  for (sequence_a, sequence_b) in child_a.iter_mut().zip(child_b.iter_mut()) {
    let to = to.min(sequence_a.len()).min(sequence_b.len());
    for position in from..to {
      let job_a = sequence_a[position].0;
      sequence_a[position].0 = sequence_b[position].0;
      sequence_b[position].0 = job_a;
    }
  }

  repair(inst, &mut child_a);
  repair(inst, &mut child_b);
  return (child_a, child_b);
}

pub fn partially_mapped<R: Rng>(
  inst: &Instance,
  a: &Schedule,
  b: &Schedule,
  rng: &mut R,
) -> (Schedule, Schedule) {
  let n = inst.n_jobs;
  let well_formed = a.len() == b.len() && a.iter().chain(b.iter()).all(|s| s.len() == n);
  if n < 2 || !well_formed {
    return (a.clone(), b.clone());
  }

  let from = rng.gen_range(0, n - 1);
  let to = rng.gen_range(from + 1, n);
  trace!("partially_mapped({}, {})", from, to);

  let mut sequences_a: Vec<Vec<Job>> = Vec::with_capacity(a.len());
  let mut sequences_b: Vec<Vec<Job>> = Vec::with_capacity(b.len());
  for (sequence_a, sequence_b) in a.iter().zip(b.iter()) {
    let jobs_a = job_ids(sequence_a);
    let jobs_b = job_ids(sequence_b);
    let mut child_a = jobs_a.clone();
    let mut child_b = jobs_b.clone();

    let mut a_to_b = HashMap::new();
    let mut b_to_a = HashMap::new();
    for position in from..=to {
      child_a[position] = jobs_b[position];
      child_b[position] = jobs_a[position];
      a_to_b.insert(jobs_a[position], jobs_b[position]);
      b_to_a.insert(jobs_b[position], jobs_a[position]);
    }

    for position in (0..from).chain(to + 1..n) {
      child_a[position] = resolve(jobs_a[position], &b_to_a);
      child_b[position] = resolve(jobs_b[position], &a_to_b);
    }

    sequences_a.push(child_a);
    sequences_b.push(child_b);
  }

  return (
    build_start_times(inst, &sequences_a),
    build_start_times(inst, &sequences_b),
  );
}

// Follows the mapping chain until the job no longer collides with the swapped segment
fn resolve(mut job: Job, mapping: &HashMap<Job, Job>) -> Job {
  let mut steps = 0;
  while let Some(&next) = mapping.get(&job) {
    job = next;
    steps += 1;
    if steps > mapping.len() {
      break;
    }
  }
  return job;
}

pub fn tariff_uniform<R: Rng>(
  inst: &Instance,
  a: &Schedule,
  b: &Schedule,
  cheap_price_threshold: f64,
  rng: &mut R,
) -> (Schedule, Schedule) {
  let mut child_a = a.clone();
  let mut child_b = b.clone();

  for (sequence_a, sequence_b) in child_a.iter_mut().zip(child_b.iter_mut()) {
    for position in 0..sequence_a.len().min(sequence_b.len()) {
      if rng.gen_bool(0.5) {
        std::mem::swap(&mut sequence_a[position], &mut sequence_b[position]);
      }
    }
  }

  for child in vec![&mut child_a, &mut child_b] {
    repair(inst, child);
    move_to_cheap_periods(inst, child, cheap_price_threshold);
    recompute_start_times(inst, child);
  }

  return (child_a, child_b);
}

// Delays every job that is not fully inside a cheap period to its cheapest cheap placement
fn move_to_cheap_periods(inst: &Instance, schedule: &mut Schedule, cheap_price_threshold: f64) {
  let cheap: Vec<_> = inst
    .tariff
    .periods()
    .iter()
    .filter(|p| p.price < cheap_price_threshold)
    .collect();
  if cheap.is_empty() {
    return;
  }

  for (machine, sequence) in schedule.iter_mut().enumerate() {
    for entry in sequence.iter_mut() {
      let (job, start) = *entry;
      let duration = inst.duration(job, machine);
      if cheap.iter().any(|p| p.contains(start, start + duration)) {
        continue;
      }

      let mut cheapest: Option<(f64, Time)> = None;
      for period in &cheap {
        let candidate = start.max(period.start);
        if candidate + duration > period.end {
          continue;
        }
        let cost = period.price * duration as f64;
        if cheapest.map_or(true, |(c, _)| cost < c) {
          cheapest = Some((cost, candidate));
        }
      }

      if let Some((_, candidate)) = cheapest {
        trace!(
          "Moving job {} on machine {} from {} to {}",
          job,
          machine,
          start,
          candidate
        );
        *entry = (job, candidate);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::solver::tests::small_instance;
  use crate::solver::{generate_random_schedule, is_feasible};
  use rand::SeedableRng;

  fn assert_complete(inst: &Instance, schedule: &Schedule) {
    assert!(is_feasible(inst, schedule));
    for sequence in schedule {
      let mut jobs = job_ids(sequence);
      jobs.sort();
      assert_eq!(jobs, (0..inst.n_jobs).collect::<Vec<_>>());
    }
  }

  #[test]
  fn every_crossover_preserves_job_multiplicity() {
    let inst = small_instance();
    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(21);

    for operator in &[
      Crossover::TwoPoint,
      Crossover::PartiallyMapped,
      Crossover::TariffUniform,
    ] {
      for _ in 0..20 {
        let a = generate_random_schedule(&inst, &mut rng);
        let b = generate_random_schedule(&inst, &mut rng);
        let (child_a, child_b) = operator.apply(&inst, &a, &b, DEFAULT_CHEAP_PRICE_THRESHOLD, &mut rng);
        assert_complete(&inst, &child_a);
        assert_complete(&inst, &child_b);
      }
    }
  }

  #[test]
  fn pmx_of_identical_parents_keeps_the_job_orders() {
    let inst = small_instance();
    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(4);
    let a = generate_random_schedule(&inst, &mut rng);

    let (child_a, child_b) = partially_mapped(&inst, &a, &a, &mut rng);
    for machine in 0..inst.n_machines {
      assert_eq!(job_ids(&child_a[machine]), job_ids(&a[machine]));
      assert_eq!(job_ids(&child_b[machine]), job_ids(&a[machine]));
    }
  }

  #[test]
  fn pmx_resolves_mapping_chains() {
    let mut mapping = HashMap::new();
    mapping.insert(1, 4);
    mapping.insert(4, 2);
    assert_eq!(resolve(1, &mapping), 2);
    assert_eq!(resolve(3, &mapping), 3);
  }

  #[test]
  fn degenerate_inputs_are_returned_unchanged() {
    let inst = crate::solver::tests::two_by_two();
    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(4);
    let a = generate_random_schedule(&inst, &mut rng);
    let b = generate_random_schedule(&inst, &mut rng);

    assert_eq!(two_point(&inst, &a, &b, &mut rng), (a.clone(), b.clone()));
    let truncated = vec![vec![(0, 0)]];
    assert_eq!(
      partially_mapped(&inst, &truncated, &b, &mut rng),
      (truncated.clone(), b.clone())
    );
  }

  #[test]
  fn expensive_jobs_are_moved_into_cheap_periods() {
    let inst = small_instance();
    // Job 0 on machine 0 runs in [0, 3) at price 0.2, the cheapest fitting window starts at 70
    let mut schedule = crate::solver::build_start_times(
      &inst,
      &[
        vec![0, 1, 2, 3, 4, 5],
        vec![0, 1, 2, 3, 4, 5],
        vec![0, 1, 2, 3, 4, 5],
      ],
    );
    move_to_cheap_periods(&inst, &mut schedule, DEFAULT_CHEAP_PRICE_THRESHOLD);

    assert_eq!(schedule[0][0], (0, 70));
  }
}
