use crate::data::{Fitness, FitnessKey, Individual, Instance, Schedule};
use crate::solver::is_acceptable;
use itertools::Itertools;
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
  Rejected,
  Added,
  // Added and removed at least one member it dominates
  AddedDominating,
}

// Schedules and fitness values an archive has already accepted
#[derive(Debug, Clone, Default)]
struct Seen {
  schedules: HashSet<Schedule>,
  fitness: HashSet<FitnessKey>,
}

impl Seen {
  fn is_new(&self, schedule: &Schedule, fitness: &Fitness) -> bool {
    return !self.schedules.contains(schedule) && !self.fitness.contains(&fitness.key());
  }

  fn record(&mut self, schedule: &Schedule, fitness: &Fitness) {
    self.schedules.insert(schedule.clone());
    self.fitness.insert(fitness.key());
  }
}

/// Every distinct feasible solution generated during a run.
#[derive(Debug, Clone, Default)]
pub struct ExploredArchive {
  members: Vec<Individual>,
  seen: Seen,
}

impl ExploredArchive {
  pub fn new() -> Self {
    return Self::default();
  }

  // Unevaluated individuals and already seen schedules or fitness values are skipped
  pub fn insert(&mut self, individual: &Individual) -> bool {
    let fitness = match individual.fitness() {
      Some(fitness) => fitness,
      None => return false,
    };
    if !self.seen.is_new(individual.schedule(), &fitness) {
      return false;
    }

    self.seen.record(individual.schedule(), &fitness);
    self.members.push(individual.clone());
    return true;
  }

  pub fn extend<'a, I: IntoIterator<Item = &'a Individual>>(&mut self, individuals: I) -> usize {
    return individuals
      .into_iter()
      .filter(|individual| self.insert(individual))
      .count();
  }

  pub fn len(&self) -> usize {
    return self.members.len();
  }

  pub fn finalize(&self, inst: &Instance) -> Vec<Individual> {
    return finalize(inst, &self.members);
  }
}

/// Best trade-off front seen so far. Members never dominate each other.
#[derive(Debug, Clone, Default)]
pub struct ParetoArchive {
  members: Vec<Individual>,
  seen: Seen,
}

impl ParetoArchive {
  pub fn new() -> Self {
    return Self::default();
  }

  pub fn insert(&mut self, individual: &Individual) -> Insertion {
    let fitness = match individual.fitness() {
      Some(fitness) => fitness,
      None => return Insertion::Rejected,
    };
    if !self.seen.is_new(individual.schedule(), &fitness) {
      return Insertion::Rejected;
    }
    if self.members.iter().any(|m| member_fitness(m).dominates(&fitness)) {
      return Insertion::Rejected;
    }

    let before = self.members.len();
    self
      .members
      .retain(|m| !fitness.dominates(&member_fitness(m)));
    let pruned = before - self.members.len();

    self.seen.record(individual.schedule(), &fitness);
    self.members.push(individual.clone());
    trace!(
      "Archive accepted ({}, {:.2}), pruned {}",
      fitness.cmax,
      fitness.tec,
      pruned
    );

    return match pruned {
      0 => Insertion::Added,
      _ => Insertion::AddedDominating,
    };
  }

  pub fn extend<'a, I: IntoIterator<Item = &'a Individual>>(&mut self, individuals: I) -> usize {
    let mut added = 0;
    for individual in individuals {
      if self.insert(individual) != Insertion::Rejected {
        added += 1;
      }
    }
    debug!("Pareto archive: {} added, {} members", added, self.members.len());
    return added;
  }

  // True if `fitness` dominates at least one member
  pub fn is_improved_by(&self, fitness: &Fitness) -> bool {
    return self
      .members
      .iter()
      .any(|m| fitness.dominates(&member_fitness(m)));
  }

  pub fn members(&self) -> &[Individual] {
    return &self.members;
  }

  pub fn len(&self) -> usize {
    return self.members.len();
  }

  pub fn finalize(&self, inst: &Instance) -> Vec<Individual> {
    return finalize(inst, &self.members);
  }
}

// Archives only hold evaluated individuals
fn member_fitness(individual: &Individual) -> Fitness {
  return individual
    .fitness()
    .unwrap_or_else(|| Fitness::new(u32::max_value(), std::f64::INFINITY));
}

// Acceptable members, one per fitness value, ordered by makespan then energy
pub fn finalize(inst: &Instance, members: &[Individual]) -> Vec<Individual> {
  return members
    .iter()
    .filter(|m| m.is_evaluated() && is_acceptable(inst, m.schedule()))
    .unique_by(|m| member_fitness(m).key())
    .sorted_by(|a, b| compare_fitness(&member_fitness(a), &member_fitness(b)))
    .cloned()
    .collect();
}

pub fn compare_fitness(a: &Fitness, b: &Fitness) -> Ordering {
  return a
    .cmax
    .cmp(&b.cmax)
    .then_with(|| a.tec.partial_cmp(&b.tec).unwrap_or(Ordering::Equal));
}
