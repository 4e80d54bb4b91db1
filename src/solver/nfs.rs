use crate::data::{Instance, Job, Schedule, Time};
use crate::solver::{build_start_times, permutation_makespan, sequences_makespan};
use log::trace;
use rand::seq::SliceRandom;
use rand::Rng;

// Non-permutation insertion heuristic with straight insertion, anticipation and delay.
// The first floor(p * n) jobs of a random order form a permutation base sequence shared by
// all machines, the remaining jobs are inserted machine by machine.
pub fn find_schedule<R: Rng>(inst: &Instance, p: f64, rng: &mut R) -> Schedule {
  let mut job_order: Vec<Job> = (0..inst.n_jobs).collect();
  job_order.shuffle(rng);

  let base_size = ((p * inst.n_jobs as f64).floor() as usize).min(inst.n_jobs);
  let base = build_base_sequence(inst, &job_order[..base_size]);
  trace!("Base sequence {:?} (p={})", base, p);

  let mut sequences = vec![base; inst.n_machines];
  for &job in &job_order[base_size..] {
    sequences = insert_job(inst, &sequences, job, rng);
  }

  return build_start_times(inst, &sequences);
}

fn build_base_sequence(inst: &Instance, selected: &[Job]) -> Vec<Job> {
  let first = match selected.iter().copied().max_by_key(|&j| inst.total_duration(j)) {
    Some(job) => job,
    None => return Vec::new(),
  };

  let mut sequence = vec![first];
  for &job in selected.iter().filter(|&&j| j != first) {
    // Only the leading tenth of the positions is probed
    let mut best_position = 0;
    let mut best_makespan = Time::max_value();
    for position in 0..=(sequence.len() / 10) {
      let mut candidate = sequence.clone();
      candidate.insert(position, job);
      let makespan = permutation_makespan(inst, &candidate);
      if makespan < best_makespan {
        best_makespan = makespan;
        best_position = position;
      }
    }
    sequence.insert(best_position, job);
  }

  return sequence;
}

fn insert_job<R: Rng>(inst: &Instance, sequences: &[Vec<Job>], job: Job, rng: &mut R) -> Vec<Vec<Job>> {
  let len = sequences.first().map_or(0, |jobs| jobs.len());
  let mut best: Option<(Time, Vec<Vec<Job>>)> = None;

  for k in 0..=len {
    // Leading machines always receive the job at k
    let leading = rng.gen_range(0, inst.n_machines / 2 + 1);
    let straight = Some(k);
    let anticipation = k.checked_sub(1);
    let delay = if k < len { Some(k + 1) } else { None };

    for &position in [straight, anticipation, delay].iter().flatten() {
      let candidate: Vec<Vec<Job>> = sequences
        .iter()
        .enumerate()
        .map(|(machine, jobs)| {
          let mut jobs = jobs.clone();
          jobs.insert(if machine < leading { k } else { position }, job);
          jobs
        })
        .collect();

      let makespan = sequences_makespan(inst, &candidate);
      if best.as_ref().map_or(true, |(b, _)| makespan < *b) {
        best = Some((makespan, candidate));
      }
    }
  }

  return match best {
    Some((_, candidate)) => candidate,
    None => sequences.to_vec(),
  };
}
