pub mod archive;
pub mod crossover;
pub mod evolution;
pub mod mutation;
pub mod nfs;
pub mod nsga2;
pub mod tec_reducer;
pub mod vnd;

use crate::data::{Duration, Fitness, Individual, Instance, Job, Machine, Schedule, Sequence, Time};
use crate::error::{ScheduleError, Violation};
use itertools::Itertools;
use ndarray::Array1;
use rand::seq::SliceRandom;
use std::cmp;

pub fn evaluate(inst: &Instance, schedule: &Schedule) -> Result<Fitness, ScheduleError> {
  let cmax = calculate_cmax(inst, schedule)?;
  let tec = calculate_tec(inst, schedule);
  return Ok(Fitness::new(cmax, tec));
}

// Finish time of the last entry on the last machine.
// Also rejects schedules whose entries cannot be looked up in the instance.
pub fn calculate_cmax(inst: &Instance, schedule: &Schedule) -> Result<Time, ScheduleError> {
  if schedule.is_empty() {
    return Err(ScheduleError::EmptySchedule);
  }
  if schedule.len() != inst.n_machines {
    return Err(ScheduleError::MachineCountMismatch {
      expected: inst.n_machines,
      actual: schedule.len(),
    });
  }

  for (machine, sequence) in schedule.iter().enumerate() {
    if let Some(&(job, _)) = sequence.iter().find(|&&(job, _)| job >= inst.n_jobs) {
      return Err(ScheduleError::UnknownJob {
        machine: machine,
        job: job,
      });
    }
  }

  let machine = inst.n_machines - 1;
  let &(job, start) = schedule[machine]
    .last()
    .ok_or(ScheduleError::EmptySchedule)?;

  return Ok(start + inst.duration(job, machine));
}

pub fn machine_cmax(inst: &Instance, schedule: &Schedule, machine: Machine) -> Time {
  return schedule[machine]
    .iter()
    .map(|&(job, start)| start + inst.duration(job, machine))
    .max()
    .unwrap_or(0);
}

pub fn calculate_tec(inst: &Instance, schedule: &Schedule) -> f64 {
  return (0..schedule.len())
    .map(|machine| machine_tec(inst, schedule, machine))
    .sum();
}

pub fn machine_tec(inst: &Instance, schedule: &Schedule, machine: Machine) -> f64 {
  return schedule[machine]
    .iter()
    .map(|&(job, start)| job_energy_cost(inst, machine, job, start))
    .sum();
}

pub fn job_energy_cost(inst: &Instance, machine: Machine, job: Job, start: Time) -> f64 {
  let duration = inst.duration(job, machine);
  return inst.tariff.energy(start, duration) * inst.rates[machine];
}

// Positions of a machine's jobs ordered by decreasing energy cost
pub fn positions_by_cost(inst: &Instance, schedule: &Schedule, machine: Machine) -> Vec<usize> {
  return schedule[machine]
    .iter()
    .enumerate()
    .map(|(position, &(job, start))| (position, job_energy_cost(inst, machine, job, start)))
    .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(cmp::Ordering::Equal))
    .map(|(position, _)| position)
    .collect();
}

pub fn dominates(a: &Fitness, b: &Fitness) -> bool {
  return a.dominates(b);
}

pub fn within_horizon(inst: &Instance, fitness: &Fitness) -> bool {
  return fitness.cmax <= inst.horizon();
}

// Gate used before a schedule may enter a population or archive
pub fn is_acceptable(inst: &Instance, schedule: &Schedule) -> bool {
  if !is_feasible(inst, schedule) {
    return false;
  }
  return match calculate_cmax(inst, schedule) {
    Ok(cmax) => cmax <= inst.horizon(),
    Err(_) => false,
  };
}

pub fn is_feasible(inst: &Instance, schedule: &Schedule) -> bool {
  return check_schedule(inst, schedule).is_ok();
}

pub fn check_schedule(inst: &Instance, schedule: &Schedule) -> Result<(), Violation> {
  if schedule.len() != inst.n_machines {
    return Err(Violation::MachineCount {
      expected: inst.n_machines,
      actual: schedule.len(),
    });
  }

  // End of each job on the previous machine
  let mut job_end = Array1::<Time>::zeros(inst.n_jobs);

  for (machine, sequence) in schedule.iter().enumerate() {
    if sequence.len() != inst.n_jobs {
      return Err(Violation::JobCount {
        machine: machine,
        expected: inst.n_jobs,
        actual: sequence.len(),
      });
    }

    let mut seen = vec![false; inst.n_jobs];
    let mut previous_end = 0;
    for &(job, start) in sequence {
      if job >= inst.n_jobs {
        return Err(Violation::UnknownJob {
          machine: machine,
          job: job,
        });
      }
      if seen[job] {
        return Err(Violation::DuplicateJob {
          machine: machine,
          job: job,
        });
      }
      seen[job] = true;

      if start < previous_end {
        return Err(Violation::MachineOverlap {
          machine: machine,
          job: job,
          start: start,
          previous_end: previous_end,
        });
      }
      if machine > 0 && start < job_end[job] {
        return Err(Violation::Precedence {
          machine: machine,
          job: job,
          start: start,
          previous_machine_end: job_end[job],
        });
      }

      let end = start + inst.duration(job, machine);
      job_end[job] = end;
      previous_end = end;
    }
  }

  Ok(())
}

pub fn recompute_start_times(inst: &Instance, schedule: &mut Schedule) {
  recompute_start_times_from(inst, schedule, 0);
}

// Stored start times act as lower bounds, so jobs are only ever pushed later.
// Machines before `first_machine` are left untouched.
pub fn recompute_start_times_from(inst: &Instance, schedule: &mut Schedule, first_machine: Machine) {
  let mut previous_finish = Array1::<Time>::zeros(inst.n_jobs);
  if first_machine > 0 {
    if let Some(sequence) = schedule.get(first_machine - 1) {
      for &(job, start) in sequence {
        previous_finish[job] = start + inst.duration(job, first_machine - 1);
      }
    }
  }

  for machine in first_machine..schedule.len() {
    let mut finish = Array1::<Time>::zeros(inst.n_jobs);
    let mut machine_free = 0;

    for entry in schedule[machine].iter_mut() {
      let (job, hint) = *entry;
      let start = cmp::max(hint, cmp::max(machine_free, previous_finish[job]));
      machine_free = start + inst.duration(job, machine);
      finish[job] = machine_free;
      *entry = (job, start);
    }

    previous_finish = finish;
  }
}

// Earliest start times for the given job orders
pub fn build_start_times(inst: &Instance, sequences: &[Vec<Job>]) -> Schedule {
  let mut schedule: Schedule = sequences
    .iter()
    .map(|jobs| jobs.iter().map(|&job| (job, 0)).collect())
    .collect();
  recompute_start_times(inst, &mut schedule);
  return schedule;
}

pub fn repair(inst: &Instance, schedule: &mut Schedule) {
  schedule.resize_with(inst.n_machines, Vec::new);

  for (machine, sequence) in schedule.iter_mut().enumerate() {
    let mut seen = vec![false; inst.n_jobs];
    let mut duplicate = vec![false; sequence.len()];
    for (position, &(job, _)) in sequence.iter().enumerate() {
      if job >= inst.n_jobs || seen[job] {
        duplicate[position] = true;
      } else {
        seen[job] = true;
      }
    }

    if sequence.len() == inst.n_jobs && !duplicate.contains(&true) {
      continue;
    }

    let mut missing = (0..inst.n_jobs).filter(|&job| !seen[job]);
    let mut repaired = Vec::with_capacity(inst.n_jobs);
    for (position, &entry) in sequence.iter().enumerate() {
      if !duplicate[position] {
        repaired.push(entry);
      } else if let Some(job) = missing.next() {
        repaired.push((job, 0));
      }
    }
    repaired.extend(missing.map(|job| (job, 0)));

    log::trace!(
      "Repaired machine {} ({} duplicates)",
      machine,
      duplicate.iter().filter(|&&d| d).count()
    );
    *sequence = repaired;
  }

  recompute_start_times(inst, schedule);
}

pub fn job_ids(sequence: &Sequence) -> Vec<Job> {
  return sequence.iter().map(|&(job, _)| job).collect();
}

pub fn generate_random_schedule<R: rand::Rng>(inst: &Instance, rng: &mut R) -> Schedule {
  let sequences: Vec<Vec<Job>> = (0..inst.n_machines)
    .map(|_| {
      let mut jobs: Vec<Job> = (0..inst.n_jobs).collect();
      jobs.shuffle(rng);
      jobs
    })
    .collect();

  return build_start_times(inst, &sequences);
}

// Makespan of job orders evaluated with earliest start times
pub fn sequences_makespan(inst: &Instance, sequences: &[Vec<Job>]) -> Time {
  let mut previous_finish = Array1::<Time>::zeros(inst.n_jobs);
  let mut makespan = 0;

  for (machine, jobs) in sequences.iter().enumerate() {
    let mut machine_free = 0;
    for &job in jobs {
      let start = cmp::max(machine_free, previous_finish[job]);
      machine_free = start + inst.duration(job, machine);
      previous_finish[job] = machine_free;
    }
    makespan = cmp::max(makespan, machine_free);
  }

  return makespan;
}

pub fn permutation_makespan(inst: &Instance, jobs: &[Job]) -> Time {
  let mut completion = vec![0 as Duration; inst.n_machines];
  for &job in jobs {
    let mut ready = 0;
    for machine in 0..inst.n_machines {
      let start = cmp::max(ready, completion[machine]);
      completion[machine] = start + inst.duration(job, machine);
      ready = completion[machine];
    }
  }
  return completion.into_iter().max().unwrap_or(0);
}

pub fn is_permutation_schedule(schedule: &Schedule) -> bool {
  return schedule
    .iter()
    .map(|sequence| job_ids(sequence))
    .tuple_windows()
    .all(|(a, b)| a == b);
}

// Share of positions (in percent) holding the same job in both schedules
pub fn similarity(a: &Schedule, b: &Schedule) -> f64 {
  let mut total = 0;
  let mut equal = 0;
  for (sequence_a, sequence_b) in a.iter().zip(b.iter()) {
    for (&(job_a, _), &(job_b, _)) in sequence_a.iter().zip(sequence_b.iter()) {
      total += 1;
      if job_a == job_b {
        equal += 1;
      }
    }
  }

  return match total {
    0 => 0.0,
    _ => 100.0 * equal as f64 / total as f64,
  };
}

pub fn print_schedule(schedule: &Schedule) {
  for (machine, sequence) in schedule.iter().enumerate() {
    let line = sequence
      .iter()
      .map(|(job, start)| format!("{}@{}", job, start))
      .join(" ");
    println!("{}: {}", machine, line);
  }
}

pub fn print_front(front: &[Individual]) {
  for individual in front {
    if let Some(fitness) = individual.fitness() {
      println!("{} {:.2}", fitness.cmax, fitness.tec);
    }
  }
}
