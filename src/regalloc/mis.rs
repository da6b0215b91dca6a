//! Maximum-weight independent set helper shared by the OU builder (spec
//! §4.O, `min_nodes_costs`) and the heuristic solver (spec §4.H, step 2,
//! sizing a qnode's trial set).
//!
//! Both call sites reduce to the same small problem: given a handful of
//! candidate indices, a conflict predicate and per-index weights, find an
//! independent set (no two chosen indices conflict) of maximum total
//! weight. Below a small threshold this is solved exactly by brute force
//! over all `2^n` subsets; above it, a greedy index-order insertion is
//! used instead (spec §4.O: "compute exact MIS of unsafe members by brute
//! force when their count ≤ `MIS_HEUR_TRIGGER` ..., else by greedy
//! index-order insertion").

/// Above this many candidates, fall back from exact brute force to the
/// greedy heuristic.
pub const MIS_HEUR_TRIGGER: usize = 8;

/// Partition `members` into those that conflict with no other member
/// ("safe") and those that conflict with at least one other ("unsafe").
pub fn safe_unsafe_partition(
    members: &[usize],
    conflicts: impl Fn(usize, usize) -> bool,
) -> (Vec<usize>, Vec<usize>) {
    let mut safe = Vec::new();
    let mut unsafe_members = Vec::new();
    for &i in members {
        let is_safe = members
            .iter()
            .all(|&j| j == i || !conflicts(i, j));
        if is_safe {
            safe.push(i);
        } else {
            unsafe_members.push(i);
        }
    }
    (safe, unsafe_members)
}

/// Find a maximum-total-weight subset of `members` with no conflicting
/// pair, per `conflicts`.
pub fn max_weight_independent_set(
    members: &[usize],
    weight: impl Fn(usize) -> u32,
    conflicts: impl Fn(usize, usize) -> bool,
) -> Vec<usize> {
    if members.len() <= MIS_HEUR_TRIGGER {
        exact_mis(members, weight, conflicts)
    } else {
        greedy_mis(members, weight, conflicts)
    }
}

fn exact_mis(
    members: &[usize],
    weight: impl Fn(usize) -> u32,
    conflicts: impl Fn(usize, usize) -> bool,
) -> Vec<usize> {
    let n = members.len();
    debug_assert!(n <= MIS_HEUR_TRIGGER);
    let mut best_mask = 0u32;
    let mut best_weight = 0i64;
    for mask in 0u32..(1 << n) {
        let mut ok = true;
        let mut w = 0i64;
        'outer: for i in 0..n {
            if mask & (1 << i) == 0 {
                continue;
            }
            w += i64::from(weight(members[i]));
            for j in (i + 1)..n {
                if mask & (1 << j) != 0 && conflicts(members[i], members[j]) {
                    ok = false;
                    break 'outer;
                }
            }
        }
        if ok && w > best_weight {
            best_weight = w;
            best_mask = mask;
        }
    }
    (0..n)
        .filter(|i| best_mask & (1 << i) != 0)
        .map(|i| members[i])
        .collect()
}

fn greedy_mis(
    members: &[usize],
    weight: impl Fn(usize) -> u32,
    conflicts: impl Fn(usize, usize) -> bool,
) -> Vec<usize> {
    let mut chosen: Vec<usize> = Vec::new();
    for &m in members {
        let _ = weight(m);
        if chosen.iter().all(|&c| !conflicts(m, c)) {
            chosen.push(m);
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_mis_picks_heavier_conflicting_pair() {
        // 0 -- 1 (conflict), weights 3 and 5: optimal is {1}.
        let members = [0usize, 1];
        let weight = |i: usize| [3u32, 5u32][i];
        let conflicts = |a: usize, b: usize| a != b;
        let mis = max_weight_independent_set(&members, weight, conflicts);
        assert_eq!(mis, vec![1]);
    }

    #[test]
    fn independent_members_all_kept() {
        let members = [0usize, 1, 2];
        let weight = |_: usize| 1u32;
        let conflicts = |_: usize, _: usize| false;
        let mis = max_weight_independent_set(&members, weight, conflicts);
        assert_eq!(mis.len(), 3);
    }
}
