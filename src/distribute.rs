//! Proportional distribution primitives shared by allocation and scheduling.
//!
//! Both callers solve a flavor of the same problem: hand out N indivisible
//! units across M buckets deterministically, with no unit left over. The
//! allocation solver uses a capped largest-remainder division; the scheduler
//! spreads its per-day remainder with a bucket-crossing index selection.

use std::cmp::Ordering;

use crate::error::PlanError;

/// Expand each weighted item into at least one unit, then spend the rest of
/// the budget proportionally to each item's expandable capacity
/// (`weight - 1`), rounding by largest remainder.
///
/// Ties rank by larger fractional remainder, then larger capacity, then
/// original order. Every award is capped at the item's capacity, so the
/// result always satisfies `1 <= out[i] <= weights[i]` and sums to `target`.
pub fn allocate_with_caps(weights: &[usize], target: usize) -> Result<Vec<usize>, PlanError> {
    let sources = weights.len();
    if target < sources {
        return Err(PlanError::Underflow { target, sources });
    }

    let capacities: Vec<usize> = weights.iter().map(|weight| weight.saturating_sub(1)).collect();
    let total_capacity: usize = capacities.iter().sum();
    let budget = target - sources;
    if budget > total_capacity {
        return Err(PlanError::CapacityExceeded {
            target,
            capacity: sources + total_capacity,
        });
    }

    let mut extras = vec![0usize; sources];
    if budget > 0 {
        let raw: Vec<f64> = capacities
            .iter()
            .map(|&capacity| budget as f64 * capacity as f64 / total_capacity as f64)
            .collect();
        for (index, extra) in extras.iter_mut().enumerate() {
            *extra = (raw[index].floor() as usize).min(capacities[index]);
        }
        let mut left = budget - extras.iter().sum::<usize>();

        let mut ranking: Vec<usize> = (0..sources).collect();
        ranking.sort_by(|&a, &b| {
            let remainder_a = raw[a] - raw[a].floor();
            let remainder_b = raw[b] - raw[b].floor();
            remainder_b
                .partial_cmp(&remainder_a)
                .unwrap_or(Ordering::Equal)
                .then(capacities[b].cmp(&capacities[a]))
                .then(a.cmp(&b))
        });

        while left > 0 {
            let mut progressed = false;
            for &index in &ranking {
                if extras[index] < capacities[index] {
                    extras[index] += 1;
                    left -= 1;
                    progressed = true;
                    if left == 0 {
                        break;
                    }
                }
            }
            if !progressed {
                return Err(PlanError::CapacityExceeded {
                    target,
                    capacity: sources + total_capacity,
                });
            }
        }
    }

    Ok(extras.into_iter().map(|extra| 1 + extra).collect())
}

/// Select `pick` of `total` indices so that the picks are spread across the
/// whole range: index `i` is selected when `(i+1)*pick/total` crosses an
/// integer boundary that `i*pick/total` has not reached.
pub fn spread_indices(total: usize, pick: usize) -> Result<Vec<usize>, PlanError> {
    if pick > total {
        return Err(PlanError::BlueprintInconsistent(format!(
            "cannot spread {pick} extra units over {total} days"
        )));
    }
    Ok((0..total)
        .filter(|&index| (index + 1) * pick / total > index * pick / total)
        .collect())
}

/// Split `items` into `groups` ordered, non-empty, contiguous chunks whose
/// sizes differ by at most one; the first `len % groups` chunks get the
/// extra element.
pub fn split_evenly<T: Clone>(items: &[T], groups: usize) -> Result<Vec<Vec<T>>, PlanError> {
    if groups < 1 || groups > items.len() {
        return Err(PlanError::InvalidSplit {
            items: items.len(),
            groups,
        });
    }

    let chunk_size = items.len() / groups;
    let remainder = items.len() % groups;
    let mut chunks = Vec::with_capacity(groups);
    let mut cursor = 0;
    for index in 0..groups {
        let size = chunk_size + usize::from(index < remainder);
        chunks.push(items[cursor..cursor + size].to_vec());
        cursor += size;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_worked_example() {
        // Weights [4,2,1], target 6: capacities [3,1,0], budget 3, exact
        // shares [2.25, 0.75, 0] -> floors [2,0,0]; the leftover unit goes
        // to the largest fractional remainder (0.75 at index 1).
        let allocation = allocate_with_caps(&[4, 2, 1], 6).expect("allocate");
        assert_eq!(allocation, vec![3, 2, 1]);
    }

    #[test]
    fn allocation_respects_bounds_and_sum() {
        let cases: &[(&[usize], usize)] = &[
            (&[4, 2, 1], 6),
            (&[1, 1, 1], 3),
            (&[10], 7),
            (&[3, 3, 3, 3], 9),
            (&[5, 1, 2, 8], 12),
        ];
        for &(weights, target) in cases {
            let allocation = allocate_with_caps(weights, target).expect("allocate");
            assert_eq!(allocation.iter().sum::<usize>(), target);
            for (index, &count) in allocation.iter().enumerate() {
                assert!(count >= 1, "weights={weights:?} target={target}");
                assert!(count <= weights[index], "weights={weights:?} target={target}");
            }
        }
    }

    #[test]
    fn allocation_is_deterministic() {
        let first = allocate_with_caps(&[7, 7, 7, 2], 19).expect("allocate");
        let second = allocate_with_caps(&[7, 7, 7, 2], 19).expect("allocate");
        assert_eq!(first, second);
    }

    #[test]
    fn allocation_underflow() {
        let err = allocate_with_caps(&[3, 3], 1).expect_err("underflow");
        assert_eq!(err, PlanError::Underflow { target: 1, sources: 2 });
    }

    #[test]
    fn allocation_capacity_exceeded() {
        let err = allocate_with_caps(&[2, 1], 4).expect_err("capacity");
        assert_eq!(
            err,
            PlanError::CapacityExceeded {
                target: 4,
                capacity: 3
            }
        );
    }

    #[test]
    fn spread_is_even_over_the_range() {
        assert_eq!(spread_indices(5, 2).expect("spread"), vec![2, 4]);
        assert_eq!(spread_indices(4, 1).expect("spread"), vec![3]);
        assert_eq!(spread_indices(3, 3).expect("spread"), vec![0, 1, 2]);
        assert_eq!(spread_indices(6, 0).expect("spread"), Vec::<usize>::new());
    }

    #[test]
    fn spread_rejects_overfull_pick() {
        assert!(spread_indices(2, 3).is_err());
    }

    #[test]
    fn split_sizes_differ_by_at_most_one() {
        let items: Vec<u32> = (0..7).collect();
        let chunks = split_evenly(&items, 3).expect("split");
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
    }

    #[test]
    fn split_concatenation_reproduces_input() {
        let items: Vec<u32> = (0..11).collect();
        for groups in 1..=items.len() {
            let chunks = split_evenly(&items, groups).expect("split");
            assert_eq!(chunks.len(), groups);
            assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
            let rejoined: Vec<u32> = chunks.into_iter().flatten().collect();
            assert_eq!(rejoined, items);
        }
    }

    #[test]
    fn split_rejects_out_of_range_counts() {
        let items = vec![1, 2, 3];
        assert_eq!(
            split_evenly(&items, 0).expect_err("zero groups"),
            PlanError::InvalidSplit { items: 3, groups: 0 }
        );
        assert_eq!(
            split_evenly(&items, 4).expect_err("too many groups"),
            PlanError::InvalidSplit { items: 3, groups: 4 }
        );
    }
}
