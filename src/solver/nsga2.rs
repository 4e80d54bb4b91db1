use crate::data::Fitness;
use std::cmp::Ordering;
use std::f64;

/// Fast non-dominated sort.
///
/// Returns the fronts as index lists into `fitnesses`, best front first. Members of a
/// front keep ascending index order.
pub fn non_dominated_sort(fitnesses: &[Fitness]) -> Vec<Vec<usize>> {
  let n = fitnesses.len();
  let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
  let mut domination_count = vec![0usize; n];
  let mut fronts: Vec<Vec<usize>> = Vec::new();

  let mut current = Vec::new();
  for p in 0..n {
    for q in 0..n {
      if fitnesses[p].dominates(&fitnesses[q]) {
        dominated_by[p].push(q);
      } else if fitnesses[q].dominates(&fitnesses[p]) {
        domination_count[p] += 1;
      }
    }
    if domination_count[p] == 0 {
      current.push(p);
    }
  }

  while !current.is_empty() {
    let mut next = Vec::new();
    for &p in &current {
      for &q in &dominated_by[p] {
        domination_count[q] -= 1;
        if domination_count[q] == 0 {
          next.push(q);
        }
      }
    }
    next.sort();
    fronts.push(current);
    current = next;
  }

  return fronts;
}

// Indices of the members no other member dominates
pub fn non_dominated(fitnesses: &[Fitness]) -> Vec<usize> {
  return (0..fitnesses.len())
    .filter(|&i| !fitnesses.iter().any(|other| other.dominates(&fitnesses[i])))
    .collect();
}

/// Crowding distance of every member of `front`, in the order of `front`.
/// Boundary members of each objective get an infinite distance.
pub fn crowding_distance(fitnesses: &[Fitness], front: &[usize]) -> Vec<f64> {
  let len = front.len();
  let mut distance = vec![0.0; len];
  if len <= 2 {
    return vec![f64::INFINITY; len];
  }

  let objectives: [fn(&Fitness) -> f64; 2] = [|f: &Fitness| f.cmax as f64, |f: &Fitness| f.tec];
  for objective in objectives.iter() {
    let mut order: Vec<usize> = (0..len).collect();
    order.sort_by(|&a, &b| {
      objective(&fitnesses[front[a]])
        .partial_cmp(&objective(&fitnesses[front[b]]))
        .unwrap_or(Ordering::Equal)
    });

    let min = objective(&fitnesses[front[order[0]]]);
    let max = objective(&fitnesses[front[order[len - 1]]]);
    distance[order[0]] = f64::INFINITY;
    distance[order[len - 1]] = f64::INFINITY;
    if max <= min {
      continue;
    }

    for window in 1..len - 1 {
      let previous = objective(&fitnesses[front[order[window - 1]]]);
      let next = objective(&fitnesses[front[order[window + 1]]]);
      distance[order[window]] += (next - previous) / (max - min);
    }
  }

  return distance;
}

/// Picks `k` members by (front rank, crowding distance descending, index).
pub fn select(fitnesses: &[Fitness], k: usize) -> Vec<usize> {
  let mut selected = Vec::with_capacity(k);

  for front in non_dominated_sort(fitnesses) {
    if selected.len() >= k {
      break;
    }
    let distance = crowding_distance(fitnesses, &front);
    let mut ranked: Vec<usize> = (0..front.len()).collect();
    ranked.sort_by(|&a, &b| {
      distance[b]
        .partial_cmp(&distance[a])
        .unwrap_or(Ordering::Equal)
        .then_with(|| front[a].cmp(&front[b]))
    });

    let take = (k - selected.len()).min(front.len());
    selected.extend(ranked[..take].iter().map(|&position| front[position]));
  }

  return selected;
}
