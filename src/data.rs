use crate::error::{InstanceError, ScheduleError};
use ndarray::{Array1, Array2};

pub type Machine = usize;
pub type Job = usize;
pub type Duration = u32;
pub type Time = u32;

// A job together with its start time (also the lower bound kept by recomputation)
pub type Entry = (Job, Time);
pub type Sequence = Vec<Entry>;
// One sequence per machine, indexed by machine id
pub type Schedule = Vec<Sequence>;

// Fitness with TEC expressed in hundredths, usable as a hash key
pub type FitnessKey = (Time, i64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Period {
  pub start: Time,
  pub end: Time,
  pub price: f64,
}

impl Period {
  pub fn new(start: Time, end: Time, price: f64) -> Self {
    Self {
      start: start,
      end: end,
      price: price,
    }
  }

  pub fn length(&self) -> Duration {
    return self.end - self.start;
  }

  pub fn contains(&self, start: Time, end: Time) -> bool {
    return self.start <= start && end <= self.end;
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tariff {
  periods: Vec<Period>,
  horizon: Time,
}

impl Tariff {
  pub fn new(periods: Vec<Period>, horizon: Time) -> Result<Self, InstanceError> {
    let last_end = periods.last().ok_or(InstanceError::NoPeriods)?.end;

    for (index, period) in periods.iter().enumerate() {
      if period.end <= period.start {
        return Err(InstanceError::EmptyPeriod { index: index });
      }
      if period.price.is_nan() || period.price < 0.0 {
        return Err(InstanceError::NegativePrice { index: index });
      }
      if index > 0 && period.start < periods[index - 1].end {
        return Err(InstanceError::UnorderedPeriods { index: index });
      }
    }

    if horizon < last_end {
      return Err(InstanceError::HorizonBeforeLastPeriod {
        horizon: horizon,
        last_end: last_end,
      });
    }

    Ok(Self {
      periods: periods,
      horizon: horizon,
    })
  }

  // Horizon coincides with the end of the last period
  pub fn from_periods(periods: Vec<Period>) -> Result<Self, InstanceError> {
    let horizon = periods.last().ok_or(InstanceError::NoPeriods)?.end;
    return Self::new(periods, horizon);
  }

  pub fn periods(&self) -> &[Period] {
    return &self.periods;
  }

  pub fn horizon(&self) -> Time {
    return self.horizon;
  }

  pub fn last_price(&self) -> f64 {
    return self.periods[self.periods.len() - 1].price;
  }

  pub fn cheapest_period(&self) -> &Period {
    let mut cheapest = &self.periods[0];
    for period in &self.periods[1..] {
      if period.price < cheapest.price {
        cheapest = period;
      }
    }
    return cheapest;
  }

  /// Price-weighted length of `[start, start + duration)`.
  ///
  /// Time before the first period is billed at the first price, time inside a gap at the
  /// price of the period that follows it and time after the last period at the last price.
  pub fn energy(&self, start: Time, duration: Duration) -> f64 {
    let end = start + duration;
    let mut current = start;
    let mut total = 0.0;

    for period in self.periods.iter().skip_while(|p| p.end <= start) {
      if current >= end {
        break;
      }
      let until = if end < period.end { end } else { period.end };
      total += (until - current) as f64 * period.price;
      current = until;
    }

    if current < end {
      total += (end - current) as f64 * self.last_price();
    }

    return total;
  }
}

#[derive(Debug, Clone)]
pub struct Instance {
  pub n_jobs: usize,
  pub n_machines: usize,

  // jobs x machines
  pub processing_times: Array2<Duration>,
  pub tariff: Tariff,
  pub rates: Array1<f64>,
}

impl Instance {
  pub fn new(
    processing_times: Array2<Duration>,
    tariff: Tariff,
    rates: Array1<f64>,
  ) -> Result<Self, InstanceError> {
    let (n_jobs, n_machines) = processing_times.dim();
    if n_jobs == 0 {
      return Err(InstanceError::NoJobs);
    }
    if n_machines == 0 {
      return Err(InstanceError::NoMachines);
    }
    if rates.len() != n_machines {
      return Err(InstanceError::RateCountMismatch {
        machines: n_machines,
        rates: rates.len(),
      });
    }
    if let Some(machine) = rates.iter().position(|&r| r.is_nan() || r < 0.0) {
      return Err(InstanceError::NegativeRate { machine: machine });
    }

    Ok(Self {
      n_jobs: n_jobs,
      n_machines: n_machines,
      processing_times: processing_times,
      tariff: tariff,
      rates: rates,
    })
  }

  pub fn duration(&self, job: Job, machine: Machine) -> Duration {
    return self.processing_times[[job, machine]];
  }

  pub fn total_duration(&self, job: Job) -> Duration {
    return self.processing_times.row(job).sum();
  }

  pub fn horizon(&self) -> Time {
    return self.tariff.horizon();
  }

  pub fn shape(&self) -> (usize, usize) {
    return (self.n_jobs, self.n_machines);
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fitness {
  pub cmax: Time,
  pub tec: f64,
}

impl Fitness {
  pub fn new(cmax: Time, tec: f64) -> Self {
    Self {
      cmax: cmax,
      tec: (tec * 100.0).round() / 100.0,
    }
  }

  pub fn dominates(&self, other: &Fitness) -> bool {
    return self.cmax <= other.cmax
      && self.tec <= other.tec
      && (self.cmax < other.cmax || self.tec < other.tec);
  }

  pub fn key(&self) -> FitnessKey {
    return (self.cmax, (self.tec * 100.0).round() as i64);
  }
}

// A schedule with its lazily computed fitness
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
  schedule: Schedule,
  fitness: Option<Fitness>,
}

impl Individual {
  pub fn new(schedule: Schedule) -> Self {
    Self {
      schedule: schedule,
      fitness: None,
    }
  }

  // Fitness already known, e.g. from local search
  pub fn evaluated(schedule: Schedule, fitness: Fitness) -> Self {
    Self {
      schedule: schedule,
      fitness: Some(fitness),
    }
  }

  pub fn schedule(&self) -> &Schedule {
    return &self.schedule;
  }

  // Any write access drops the cached fitness
  pub fn schedule_mut(&mut self) -> &mut Schedule {
    self.fitness = None;
    return &mut self.schedule;
  }

  pub fn set_schedule(&mut self, schedule: Schedule) {
    self.schedule = schedule;
    self.fitness = None;
  }

  pub fn fitness(&self) -> Option<Fitness> {
    return self.fitness;
  }

  pub fn is_evaluated(&self) -> bool {
    return self.fitness.is_some();
  }

  pub fn evaluate(&mut self, inst: &Instance) -> Result<Fitness, ScheduleError> {
    if let Some(fitness) = self.fitness {
      return Ok(fitness);
    }
    let fitness = crate::solver::evaluate(inst, &self.schedule)?;
    self.fitness = Some(fitness);
    return Ok(fitness);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn energy_splits_at_period_boundaries() {
    let tariff = Tariff::from_periods(vec![Period::new(0, 10, 1.0), Period::new(10, 20, 3.0)])
      .expect("valid tariff");

    assert_eq!(tariff.energy(8, 4), 2.0 * 1.0 + 2.0 * 3.0);
    assert_eq!(tariff.energy(0, 10), 10.0);
    // Open-ended tail uses the last price
    assert_eq!(tariff.energy(18, 5), 5.0 * 3.0);
    assert_eq!(tariff.energy(3, 0), 0.0);
  }

  #[test]
  fn energy_bills_gaps_at_the_following_price() {
    let tariff = Tariff::from_periods(vec![Period::new(0, 5, 1.0), Period::new(8, 12, 2.0)])
      .expect("valid tariff");

    assert_eq!(tariff.energy(4, 4), 1.0 + 3.0 * 2.0);
  }

  #[test]
  fn tariff_rejects_overlapping_periods() {
    let result = Tariff::from_periods(vec![Period::new(0, 10, 1.0), Period::new(5, 20, 3.0)]);
    assert_eq!(result, Err(InstanceError::UnorderedPeriods { index: 1 }));
  }

  #[test]
  fn tariff_rejects_short_horizon() {
    let result = Tariff::new(vec![Period::new(0, 10, 1.0)], 9);
    assert_eq!(
      result,
      Err(InstanceError::HorizonBeforeLastPeriod {
        horizon: 9,
        last_end: 10
      })
    );
  }

  #[test]
  fn instance_checks_rate_count() {
    let tariff = Tariff::from_periods(vec![Period::new(0, 10, 1.0)]).expect("valid tariff");
    let result = Instance::new(
      ndarray::arr2(&[[1, 2], [3, 4]]),
      tariff,
      ndarray::arr1(&[1.0]),
    );
    assert_eq!(
      result.err(),
      Some(InstanceError::RateCountMismatch {
        machines: 2,
        rates: 1
      })
    );
  }

  #[test]
  fn nan_prices_and_rates_are_rejected() {
    let result = Tariff::from_periods(vec![
      Period::new(0, 10, 1.0),
      Period::new(10, 20, std::f64::NAN),
    ]);
    assert_eq!(result, Err(InstanceError::NegativePrice { index: 1 }));

    let tariff = Tariff::from_periods(vec![Period::new(0, 10, 1.0)]).expect("valid tariff");
    let result = Instance::new(
      ndarray::arr2(&[[1, 2], [3, 4]]),
      tariff,
      ndarray::arr1(&[1.0, std::f64::NAN]),
    );
    assert_eq!(result.err(), Some(InstanceError::NegativeRate { machine: 1 }));
  }

  #[test]
  fn fitness_rounds_tec_to_cents() {
    let fitness = Fitness::new(4, 1.23456);
    assert_eq!(fitness.tec, 1.23);
    assert_eq!(fitness.key(), (4, 123));
  }

  #[test]
  fn writing_the_schedule_drops_the_fitness() {
    let tariff = Tariff::from_periods(vec![Period::new(0, 100, 1.0)]).expect("valid tariff");
    let inst = Instance::new(
      ndarray::arr2(&[[3, 2], [2, 4]]),
      tariff,
      ndarray::arr1(&[1.0, 1.0]),
    )
    .expect("valid instance");
    let mut individual = Individual::new(vec![vec![(0, 0), (1, 3)], vec![(0, 3), (1, 5)]]);

    assert_eq!(individual.evaluate(&inst), Ok(Fitness::new(9, 11.0)));
    assert!(individual.is_evaluated());

    individual.schedule_mut()[1].swap(0, 1);
    assert!(!individual.is_evaluated());
  }
}
