use energy_flowshop::data::{Individual, Instance};
use energy_flowshop::parser::parse_instance;
use energy_flowshop::solver::crossover::Crossover;
use energy_flowshop::solver::evolution::{self, Config};
use energy_flowshop::solver::mutation::Mutation;
use energy_flowshop::solver::{
  check_schedule, evaluate, generate_random_schedule, is_acceptable, is_feasible, repair,
};
use rand::{Rng, SeedableRng};

const TIMES: &str = "\
8 3
0 4 1 3 2 6
0 2 1 5 2 1
0 6 1 2 2 3
0 3 1 3 2 3
0 1 1 6 2 4
0 5 1 1 2 2
0 2 1 4 2 5
0 3 1 2 2 1
";

const TARIFF: &str = "\
240
0 30 60 90 150
30 60 90 150 200
0.16 0.11 0.2 0.06 0.14
";

const RATES: &str = "\
3
2.0 1.0 3.5
";

fn instance() -> Instance {
  let _ = env_logger::builder().is_test(true).try_init();
  return parse_instance(TIMES, TARIFF, RATES).expect("valid instance");
}

fn fitness(individual: &Individual) -> (u32, f64) {
  let fitness = individual.fitness().expect("evaluated member");
  return (fitness.cmax, fitness.tec);
}

#[test]
fn repair_restores_feasibility_of_scrambled_schedules() {
  let inst = instance();
  let mut rng = rand_chacha::ChaChaRng::seed_from_u64(99);

  for _ in 0..100 {
    let mut schedule = generate_random_schedule(&inst, &mut rng);
    for sequence in schedule.iter_mut() {
      for entry in sequence.iter_mut() {
        if rng.gen_bool(0.3) {
          entry.0 = rng.gen_range(0, inst.n_jobs + 2);
        }
      }
      if rng.gen_bool(0.2) {
        sequence.pop();
      }
    }

    repair(&inst, &mut schedule);
    assert!(is_feasible(&inst, &schedule));
    assert_eq!(check_schedule(&inst, &schedule), Ok(()));
  }
}

#[test]
fn front_members_match_their_schedules() {
  let inst = instance();
  let config = Config {
    seed: 42,
    population_size: 24,
    generations: 6,
    ..Config::default()
  };

  let front = evolution::find_front(&inst, &config).expect("valid configuration");
  assert!(!front.pareto.is_empty());
  for member in &front.pareto {
    assert!(is_acceptable(&inst, member.schedule()));
    assert_eq!(Some(evaluate(&inst, member.schedule()).expect("evaluable")), member.fitness());
  }

  let values: Vec<(u32, f64)> = front.pareto.iter().map(fitness).collect();
  for window in values.windows(2) {
    assert!(window[0].0 <= window[1].0);
    // Sorted by makespan a front trades energy for time
    assert!(window[0].1 > window[1].1 || window[0].0 == window[1].0);
  }
}

#[test]
fn explored_solutions_are_valid_and_sorted() {
  let inst = instance();
  let config = Config {
    seed: 8,
    population_size: 20,
    generations: 5,
    crossover: Crossover::TariffUniform,
    mutation: Mutation::TecReducer,
    ..Config::default()
  };

  let front = evolution::find_front(&inst, &config).expect("valid configuration");
  assert!(front.explored.len() >= front.pareto.len());
  assert!(front.explored.iter().all(|e| is_acceptable(&inst, e.schedule())));

  let values: Vec<(u32, f64)> = front.explored.iter().map(fitness).collect();
  assert!(values.windows(2).all(|w| w[0].0 <= w[1].0));
  let mut unique = values.clone();
  unique.dedup();
  assert_eq!(unique.len(), values.len());
}

#[test]
fn stagnation_limit_ends_the_run_early() {
  let inst = instance();
  let config = Config {
    seed: 3,
    population_size: 16,
    generations: 50,
    stagnation_limit: 1,
    ..Config::default()
  };

  let front = evolution::find_front(&inst, &config).expect("valid configuration");
  assert!(front.generations >= 1 && front.generations < 50);
}
