use crate::data::{Instance, Period, Tariff, Time};
use ndarray::{Array1, Array2};
use std::error::Error;
use std::str::FromStr;

pub fn parse_instance(
  processing_times: &str,
  tariff: &str,
  rates: &str,
) -> Result<Instance, Box<dyn Error>> {
  let instance = Instance::new(
    parse_processing_times(processing_times)?,
    parse_tariff(tariff)?,
    parse_rates(rates)?,
  )?;
  Ok(instance)
}

// Header `n_jobs n_machines`, then one line of `machine duration` pairs per job
pub fn parse_processing_times(contents: &str) -> Result<Array2<u32>, Box<dyn Error>> {
  let mut lines = contents.lines().filter(|l| !l.trim().is_empty());

  let prelude = lines.next().ok_or("Prelude missing")?;
  let prelude_items: Vec<&str> = prelude.split_whitespace().collect();
  let n_jobs: usize = prelude_items.get(0).ok_or("n_jobs missing")?.parse()?;
  let n_machines: usize = prelude_items.get(1).ok_or("n_machines missing")?.parse()?;

  let mut times = Array2::<u32>::zeros((n_jobs, n_machines));
  for job in 0..n_jobs {
    let line = lines.next().ok_or("Job line missing")?;
    let items: Vec<&str> = line.split_whitespace().collect();
    for i in (0..items.len()).step_by(2) {
      let machine: usize = items.get(i).ok_or("Machine missing")?.parse()?;
      let duration: u32 = items.get(i + 1).ok_or("Duration missing")?.parse()?;
      if machine >= n_machines {
        return Err(format!("Machine {} of job {} out of range", machine, job).into());
      }
      times[[job, machine]] = duration;
    }
  }

  Ok(times)
}

// Horizon, period starts, period ends and prices on four lines
pub fn parse_tariff(contents: &str) -> Result<Tariff, Box<dyn Error>> {
  let mut lines = contents.lines().filter(|l| !l.trim().is_empty());

  let horizon: Time = lines.next().ok_or("Horizon missing")?.trim().parse()?;
  let starts: Vec<Time> = parse_row(lines.next().ok_or("Period starts missing")?)?;
  let ends: Vec<Time> = parse_row(lines.next().ok_or("Period ends missing")?)?;
  let prices: Vec<f64> = parse_row(lines.next().ok_or("Prices missing")?)?;
  if starts.len() != ends.len() || starts.len() != prices.len() {
    return Err("Period starts, ends and prices differ in length".into());
  }

  let periods = starts
    .into_iter()
    .zip(ends.into_iter())
    .zip(prices.into_iter())
    .map(|((start, end), price)| Period::new(start, end, price))
    .collect();
  Ok(Tariff::new(periods, horizon)?)
}

// Machine count on the first line (unused), rates on the second
pub fn parse_rates(contents: &str) -> Result<Array1<f64>, Box<dyn Error>> {
  let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
  lines.next().ok_or("Machine count missing")?;
  let rates: Vec<f64> = parse_row(lines.next().ok_or("Rates missing")?)?;
  Ok(Array1::from(rates))
}

fn parse_row<T>(line: &str) -> Result<Vec<T>, Box<dyn Error>>
where
  T: FromStr,
  T::Err: Error + 'static,
{
  let mut row = Vec::new();
  for item in line.split(|c: char| c.is_whitespace() || c == ',') {
    if item.is_empty() {
      continue;
    }
    row.push(item.parse::<T>()?);
  }
  Ok(row)
}
