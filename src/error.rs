use crate::data::{Job, Machine, Time};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
  // Cmax is undefined for a schedule without machines or jobs
  EmptySchedule,
  MachineCountMismatch { expected: usize, actual: usize },
  UnknownJob { machine: Machine, job: Job },
  InvalidConfig(String),
}

impl fmt::Display for ScheduleError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScheduleError::EmptySchedule => write!(f, "schedule is structurally empty"),
      ScheduleError::MachineCountMismatch { expected, actual } => write!(
        f,
        "schedule has {} machine sequences, instance has {} machines",
        actual, expected
      ),
      ScheduleError::UnknownJob { machine, job } => {
        write!(f, "machine {} references unknown job {}", machine, job)
      }
      ScheduleError::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
    }
  }
}

impl Error for ScheduleError {}

#[derive(Debug, Clone, PartialEq)]
pub enum InstanceError {
  NoJobs,
  NoMachines,
  RateCountMismatch { machines: usize, rates: usize },
  NegativeRate { machine: Machine },
  NoPeriods,
  EmptyPeriod { index: usize },
  UnorderedPeriods { index: usize },
  NegativePrice { index: usize },
  HorizonBeforeLastPeriod { horizon: Time, last_end: Time },
}

impl fmt::Display for InstanceError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InstanceError::NoJobs => write!(f, "instance has no jobs"),
      InstanceError::NoMachines => write!(f, "instance has no machines"),
      InstanceError::RateCountMismatch { machines, rates } => write!(
        f,
        "{} consumption rates given for {} machines",
        rates, machines
      ),
      InstanceError::NegativeRate { machine } => {
        write!(f, "consumption rate of machine {} is negative or not a number", machine)
      }
      InstanceError::NoPeriods => write!(f, "tariff has no periods"),
      InstanceError::EmptyPeriod { index } => {
        write!(f, "tariff period {} does not end after it starts", index)
      }
      InstanceError::UnorderedPeriods { index } => write!(
        f,
        "tariff period {} starts before the previous period ends",
        index
      ),
      InstanceError::NegativePrice { index } => {
        write!(f, "tariff period {} has a negative or undefined price", index)
      }
      InstanceError::HorizonBeforeLastPeriod { horizon, last_end } => write!(
        f,
        "horizon {} lies before the end of the last period {}",
        horizon, last_end
      ),
    }
  }
}

impl Error for InstanceError {}

// First broken invariant found by the feasibility check
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
  MachineCount {
    expected: usize,
    actual: usize,
  },
  JobCount {
    machine: Machine,
    expected: usize,
    actual: usize,
  },
  UnknownJob {
    machine: Machine,
    job: Job,
  },
  DuplicateJob {
    machine: Machine,
    job: Job,
  },
  MachineOverlap {
    machine: Machine,
    job: Job,
    start: Time,
    previous_end: Time,
  },
  Precedence {
    machine: Machine,
    job: Job,
    start: Time,
    previous_machine_end: Time,
  },
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Violation::MachineCount { expected, actual } => {
        write!(f, "expected {} machines, found {}", expected, actual)
      }
      Violation::JobCount {
        machine,
        expected,
        actual,
      } => write!(
        f,
        "machine {} holds {} jobs, expected {}",
        machine, actual, expected
      ),
      Violation::UnknownJob { machine, job } => {
        write!(f, "machine {} holds unknown job {}", machine, job)
      }
      Violation::DuplicateJob { machine, job } => {
        write!(f, "job {} appears twice on machine {}", job, machine)
      }
      Violation::MachineOverlap {
        machine,
        job,
        start,
        previous_end,
      } => write!(
        f,
        "job {} starts at {} on machine {} before the previous job ends at {}",
        job, start, machine, previous_end
      ),
      Violation::Precedence {
        machine,
        job,
        start,
        previous_machine_end,
      } => write!(
        f,
        "job {} starts at {} on machine {} before it ends at {} on the previous machine",
        job, start, machine, previous_machine_end
      ),
    }
  }
}

impl Error for Violation {}
