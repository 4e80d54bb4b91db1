use crate::data::{Duration, Instance, Period, Schedule, Time};
use crate::solver::{calculate_cmax, is_acceptable, is_feasible};
use log::{debug, trace};
use ndarray::Array2;
use rand::Rng;
use std::cmp;

// Start times indexed by [machine][position]
type Starts = Vec<Vec<Time>>;

// Moves the schedule into the cheapest tariff periods able to hold its makespan:
// a backward pass packs every job as late as possible inside the chosen periods, a left shift
// pulls jobs back to the earliest chosen slot and an optional right shift delays jobs into
// cheaper slots. Returns the input when no valid placement exists.
pub fn reduce<R: Rng>(inst: &Instance, schedule: &Schedule, rng: &mut R) -> Schedule {
  return match try_reduce(inst, schedule, rng) {
    Some(reduced) => reduced,
    None => {
      trace!("tec_reducer found no placement, keeping schedule");
      schedule.clone()
    }
  };
}

fn try_reduce<R: Rng>(inst: &Instance, schedule: &Schedule, rng: &mut R) -> Option<Schedule> {
  if !is_feasible(inst, schedule) {
    return None;
  }
  let cmax = calculate_cmax(inst, schedule).ok()?;
  let chosen = choose_periods(inst.tariff.periods(), cmax);
  let positions = job_positions(inst, schedule);

  let mut starts = backward_pass(inst, schedule, &chosen, &positions)?;
  left_shift(inst, schedule, &chosen, &positions, &mut starts);
  if rng.gen_bool(0.5) {
    right_shift(inst, schedule, &positions, &mut starts);
  }

  let reduced: Schedule = schedule
    .iter()
    .zip(starts)
    .map(|(sequence, machine_starts)| {
      sequence
        .iter()
        .zip(machine_starts)
        .map(|(&(job, _), start)| (job, start))
        .collect()
    })
    .collect();

  if !is_acceptable(inst, &reduced) {
    debug!("tec_reducer produced an invalid schedule, discarding it");
    return None;
  }
  return Some(reduced);
}

// Cheapest periods first (ties: next to a cheaper period, then earlier) until the chosen
// periods are at least as long as the makespan. Result is ordered by start.
pub fn choose_periods(periods: &[Period], cmax: Time) -> Vec<Period> {
  let next_to_cheaper = |i: usize| {
    (i > 0 && periods[i - 1].price < periods[i].price)
      || (i + 1 < periods.len() && periods[i + 1].price < periods[i].price)
  };

  let mut ranked: Vec<usize> = (0..periods.len()).collect();
  ranked.sort_by(|&a, &b| {
    periods[a]
      .price
      .partial_cmp(&periods[b].price)
      .unwrap_or(cmp::Ordering::Equal)
      .then_with(|| next_to_cheaper(b).cmp(&next_to_cheaper(a)))
      .then_with(|| periods[a].start.cmp(&periods[b].start))
  });

  let mut chosen = Vec::new();
  let mut covered: Time = 0;
  for index in ranked {
    if covered >= cmax {
      break;
    }
    chosen.push(periods[index]);
    covered += periods[index].length();
  }

  chosen.sort_by_key(|p| p.start);
  return chosen;
}

// Position of every job on every machine
fn job_positions(inst: &Instance, schedule: &Schedule) -> Array2<usize> {
  let mut positions = Array2::<usize>::zeros((inst.n_machines, inst.n_jobs));
  for (machine, sequence) in schedule.iter().enumerate() {
    for (position, &(job, _)) in sequence.iter().enumerate() {
      positions[[machine, job]] = position;
    }
  }
  return positions;
}

fn backward_pass(
  inst: &Instance,
  schedule: &Schedule,
  chosen: &[Period],
  positions: &Array2<usize>,
) -> Option<Starts> {
  let latest = chosen.last()?.end;
  let mut starts: Starts = schedule.iter().map(|s| vec![0; s.len()]).collect();

  for machine in (0..schedule.len()).rev() {
    let len = schedule[machine].len();
    for position in (0..len).rev() {
      let job = schedule[machine][position].0;

      let mut latest_end = latest;
      if position + 1 < len {
        latest_end = cmp::min(latest_end, starts[machine][position + 1]);
      }
      if machine + 1 < schedule.len() {
        let next = positions[[machine + 1, job]];
        latest_end = cmp::min(latest_end, starts[machine + 1][next]);
      }

      starts[machine][position] = latest_placement(chosen, latest_end, inst.duration(job, machine))?;
    }
  }

  return Some(starts);
}

// Latest start ending by `latest_end` inside one chosen period or two contiguous ones
fn latest_placement(chosen: &[Period], latest_end: Time, duration: Duration) -> Option<Time> {
  for (index, period) in chosen.iter().enumerate().rev() {
    let end = cmp::min(period.end, latest_end);
    if end < duration {
      continue;
    }
    let start = end - duration;
    if start >= period.start {
      return Some(start);
    }
    if index > 0 && chosen[index - 1].end == period.start && start >= chosen[index - 1].start {
      return Some(start);
    }
  }
  return None;
}

// Earliest start from `earliest` on inside one chosen period or two contiguous ones
fn earliest_placement(chosen: &[Period], earliest: Time, duration: Duration) -> Option<Time> {
  for (index, period) in chosen.iter().enumerate() {
    let start = cmp::max(earliest, period.start);
    if start + duration <= period.end {
      return Some(start);
    }
    if index + 1 < chosen.len()
      && period.end == chosen[index + 1].start
      && start + duration <= chosen[index + 1].end
    {
      return Some(start);
    }
  }
  return None;
}

fn left_shift(
  inst: &Instance,
  schedule: &Schedule,
  chosen: &[Period],
  positions: &Array2<usize>,
  starts: &mut Starts,
) {
  for machine in 0..schedule.len() {
    for position in 0..schedule[machine].len() {
      let job = schedule[machine][position].0;
      let duration = inst.duration(job, machine);

      let mut earliest = 0;
      if position > 0 {
        let previous = schedule[machine][position - 1].0;
        earliest = starts[machine][position - 1] + inst.duration(previous, machine);
      }
      if machine > 0 {
        let previous = positions[[machine - 1, job]];
        earliest = cmp::max(
          earliest,
          starts[machine - 1][previous] + inst.duration(job, machine - 1),
        );
      }

      if let Some(start) = earliest_placement(chosen, earliest, duration) {
        if start < starts[machine][position] && start + duration <= inst.horizon() {
          starts[machine][position] = start;
        }
      }
    }
  }
}

// Delays a job only when its energy cost strictly drops, bounded by its successors
fn right_shift(inst: &Instance, schedule: &Schedule, positions: &Array2<usize>, starts: &mut Starts) {
  for machine in (0..schedule.len()).rev() {
    let len = schedule[machine].len();
    for position in (0..len).rev() {
      let job = schedule[machine][position].0;
      let duration = inst.duration(job, machine);
      let current = starts[machine][position];

      let mut allowed_end = inst.horizon();
      if position + 1 < len {
        allowed_end = cmp::min(allowed_end, starts[machine][position + 1]);
      }
      if machine + 1 < schedule.len() {
        let next = positions[[machine + 1, job]];
        allowed_end = cmp::min(allowed_end, starts[machine + 1][next]);
      }
      if allowed_end <= current + duration {
        continue;
      }

      let latest = allowed_end - duration;
      let current_cost = inst.tariff.energy(current, duration);
      let mut best: Option<(f64, Time)> = None;
      let anchors = inst
        .tariff
        .periods()
        .iter()
        .map(|p| p.start)
        .filter(|&s| s > current && s <= latest);

      for candidate in anchors.chain(std::iter::once(latest)) {
        let cost = inst.tariff.energy(candidate, duration);
        if cost < current_cost && best.map_or(true, |(c, _)| cost < c) {
          best = Some((cost, candidate));
        }
      }

      if let Some((_, start)) = best {
        trace!(
          "Right shift of job {} on machine {} from {} to {}",
          job,
          machine,
          current,
          start
        );
        starts[machine][position] = start;
      }
    }
  }
}
