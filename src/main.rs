#[macro_use]
extern crate log;

use clap::{App, Arg};
use energy_flowshop::parser::parse_instance;
use energy_flowshop::solver::crossover::Crossover;
use energy_flowshop::solver::evolution;
use energy_flowshop::solver::mutation::Mutation;
use energy_flowshop::solver::{check_schedule, machine_cmax, print_front, print_schedule};
use std::fs;

fn main() {
  env_logger::init();

  let matches = App::new("energy-flowshop")
    .version("1.0")
    .about("Bi-objective NSGA-II for the non-permutation flow shop under time-of-use tariffs")
    .arg(
      Arg::with_name("processing-times")
        .long("processing-times")
        .help("Processing time file name")
        .takes_value(true)
        .required(true),
    )
    .arg(
      Arg::with_name("tariff")
        .long("tariff")
        .help("Tariff file name")
        .takes_value(true)
        .required(true),
    )
    .arg(
      Arg::with_name("rates")
        .long("rates")
        .help("Consumption rate file name")
        .takes_value(true)
        .required(true),
    )
    .arg(
      Arg::with_name("seed")
        .long("seed")
        .help("Seed for rng")
        .takes_value(true)
        .required(true),
    )
    .arg(
      Arg::with_name("generations")
        .long("generations")
        .help("Maximum number of generations")
        .takes_value(true)
        .default_value("100"),
    )
    .arg(
      Arg::with_name("population-size")
        .long("population-size")
        .help("Number of individuals per generation")
        .takes_value(true)
        .default_value("100"),
    )
    .arg(
      Arg::with_name("crossover")
        .long("crossover")
        .help("Crossover operator")
        .possible_values(&["two-point", "pmx", "tariff-uniform"])
        .takes_value(true)
        .default_value("two-point"),
    )
    .arg(
      Arg::with_name("mutation")
        .long("mutation")
        .help("Mutation operator")
        .possible_values(&["swap", "inversion", "cost-insertion", "tec-reducer"])
        .takes_value(true)
        .default_value("inversion"),
    )
    .arg(
      Arg::with_name("print-schedules")
        .long("print-schedules")
        .help("Print the schedule of every final front member"),
    )
    .get_matches();

  let read = |name: &str| {
    let file = matches.value_of(name).expect("Missing file name");
    fs::read_to_string(file).expect("Error reading file")
  };
  let instance = parse_instance(&read("processing-times"), &read("tariff"), &read("rates"))
    .expect("Error parsing files");

  let seed: u64 = matches
    .value_of("seed")
    .and_then(|m| m.parse().ok())
    .expect("Invalid seed");
  let generations: usize = matches
    .value_of("generations")
    .and_then(|m| m.parse().ok())
    .expect("Invalid generation count");
  let population_size: usize = matches
    .value_of("population-size")
    .and_then(|m| m.parse().ok())
    .expect("Invalid population size");

  let crossover = match matches.value_of("crossover") {
    Some("pmx") => Crossover::PartiallyMapped,
    Some("tariff-uniform") => Crossover::TariffUniform,
    _ => Crossover::TwoPoint,
  };
  let mutation = match matches.value_of("mutation") {
    Some("swap") => Mutation::Swap,
    Some("cost-insertion") => Mutation::CostGuidedInsertion(1),
    Some("tec-reducer") => Mutation::TecReducer,
    _ => Mutation::Inversion,
  };

  let config = evolution::Config {
    seed: seed,
    generations: generations,
    population_size: population_size,
    crossover: crossover,
    mutation: mutation,
    ..evolution::Config::default()
  };
  info!(
    "{} jobs, {} machines, horizon {}",
    instance.n_jobs,
    instance.n_machines,
    instance.horizon()
  );

  let front = evolution::find_front(&instance, &config).expect("Search failed");
  for individual in &front.pareto {
    check_schedule(&instance, individual.schedule()).expect("Verification failed");
  }

  println!("initial");
  print_front(&front.initial);
  println!("final ({} generations)", front.generations);
  print_front(&front.pareto);

  if matches.is_present("print-schedules") {
    for individual in &front.pareto {
      println!();
      print_schedule(individual.schedule());
      let ends: Vec<String> = (0..instance.n_machines)
        .map(|m| machine_cmax(&instance, individual.schedule(), m).to_string())
        .collect();
      println!("machine ends: {}", ends.join(" "));
    }
  }
}
