use crate::data::{Entry, Instance, Schedule};
use crate::solver::{
  job_ids, machine_tec, positions_by_cost, recompute_start_times, recompute_start_times_from,
  tec_reducer,
};
use log::trace;
use rand::seq::index;
use rand::Rng;
use std::cmp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
  Swap,
  Inversion,
  // Number of costliest jobs moved as one block
  CostGuidedInsertion(usize),
  TecReducer,
}

impl Mutation {
  pub fn apply<R: Rng>(&self, inst: &Instance, schedule: &Schedule, rng: &mut R) -> Schedule {
    return match *self {
      Mutation::Swap => swap(inst, schedule, rng),
      Mutation::Inversion => inversion(inst, schedule, rng),
      Mutation::CostGuidedInsertion(jobs) => cost_guided_insertion(inst, schedule, jobs, rng),
      Mutation::TecReducer => tec_reducer::reduce(inst, schedule, rng),
    };
  }
}

pub fn swap<R: Rng>(inst: &Instance, schedule: &Schedule, rng: &mut R) -> Schedule {
  let mut mutant = schedule.clone();
  if mutant.is_empty() {
    return mutant;
  }

  let machine = rng.gen_range(0, mutant.len());
  let sequence = &mut mutant[machine];
  if sequence.len() < 2 {
    return mutant;
  }

  let picked = index::sample(rng, sequence.len(), 2).into_vec();
  let (a, b) = (picked[0], picked[1]);
  let job_a = sequence[a].0;
  sequence[a].0 = sequence[b].0;
  sequence[b].0 = job_a;
  trace!("swap(machine {}, {}, {})", machine, a, b);

  recompute_start_times(inst, &mut mutant);
  return mutant;
}

// Reverses the job order of a random range on one machine, start slots stay in place
pub fn inversion<R: Rng>(inst: &Instance, schedule: &Schedule, rng: &mut R) -> Schedule {
  let mut mutant = schedule.clone();
  if mutant.is_empty() {
    return mutant;
  }

  let machine = rng.gen_range(0, mutant.len());
  let sequence = &mut mutant[machine];
  if sequence.len() < 2 {
    return mutant;
  }

  let mut picked = index::sample(rng, sequence.len(), 2).into_vec();
  picked.sort();
  let (from, to) = (picked[0], picked[1]);

  let mut jobs = job_ids(sequence);
  jobs[from..=to].reverse();
  for (entry, job) in sequence.iter_mut().zip(jobs) {
    entry.0 = job;
  }
  trace!("inversion(machine {}, {}..={})", machine, from, to);

  recompute_start_times_from(inst, &mut mutant, machine);
  return mutant;
}

// Moves the costliest jobs of the most expensive machine as one block to a random position
pub fn cost_guided_insertion<R: Rng>(
  inst: &Instance,
  schedule: &Schedule,
  jobs: usize,
  rng: &mut R,
) -> Schedule {
  let mut mutant = schedule.clone();
  if mutant.is_empty() || jobs == 0 {
    return mutant;
  }

  let machine = (0..mutant.len())
    .map(|m| (m, machine_tec(inst, schedule, m)))
    .fold((0, std::f64::MIN), |best, current| {
      if current.1 > best.1 {
        current
      } else {
        best
      }
    })
    .0;

  let ranked = positions_by_cost(inst, schedule, machine);
  let count = cmp::min(jobs, ranked.len());
  let mut selected = vec![false; ranked.len()];
  for &position in &ranked[..count] {
    selected[position] = true;
  }

  let block: Vec<Entry> = ranked[..count]
    .iter()
    .map(|&position| schedule[machine][position])
    .collect();
  let mut remaining: Vec<Entry> = schedule[machine]
    .iter()
    .enumerate()
    .filter(|(position, _)| !selected[*position])
    .map(|(_, &entry)| entry)
    .collect();

  let at = rng.gen_range(0, remaining.len() + 1);
  trace!(
    "cost_guided_insertion(machine {}, {:?} at {})",
    machine,
    block,
    at
  );
  remaining.splice(at..at, block);
  mutant[machine] = remaining;

  recompute_start_times(inst, &mut mutant);
  return mutant;
}
