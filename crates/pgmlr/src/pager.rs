//! State merging by Pager's weak compatibility.
//!
//! Two kernels with the same LR(0) core are weakly compatible if, for every
//! pair of distinct items `i` and `j`,
//!
//! ```text
//! (L1i ∩ L2j) ∪ (L2i ∩ L1j)  ⊆  (L1i ∩ L1j) ∪ (L2i ∩ L2j)
//! ```
//!
//! that is, every lookahead the merge would share between two items is
//! already shared by them in one of the kernels. Pager's original test only
//! asks the right-hand side to be non-empty when the left one is, which lets
//! a kernel that conflicts on one terminal pick up a conflict on another.
//!
//! Merging such kernels cannot introduce a conflict on a terminal that
//! neither of them would have led to on its own.

use crate::{
    grammar::SymbolID,
    lr1::{LRItemSet, MergeMode, StateID},
    types::{Map, Queue},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum MergeDecision {
    /// The existing state already carries every lookahead of the new kernel.
    Reuse,
    /// The lookaheads of the new kernel are to be added to the existing state.
    Merge,
    /// The new kernel needs a state of its own.
    Distinct,
}

/// Decide how a new `incoming` kernel relates to an `existing` one with
/// the same LR(0) core.
pub(crate) fn decide(mode: MergeMode, existing: &LRItemSet, incoming: &LRItemSet) -> MergeDecision {
    match mode {
        MergeMode::Canonical if existing == incoming => MergeDecision::Reuse,
        MergeMode::Canonical => MergeDecision::Distinct,
        _ if is_subsumed(existing, incoming) => MergeDecision::Reuse,
        MergeMode::LALR => MergeDecision::Merge,
        MergeMode::PGM if is_weakly_compatible(existing, incoming) => MergeDecision::Merge,
        MergeMode::PGM => MergeDecision::Distinct,
    }
}

/// Check whether every lookahead set of `incoming` is included in the
/// corresponding one of `existing`.
pub fn is_subsumed(existing: &LRItemSet, incoming: &LRItemSet) -> bool {
    existing.len() == incoming.len()
        && existing
            .iter()
            .zip(incoming)
            .all(|((c1, l1), (c2, l2))| c1 == c2 && l1.is_superset(l2))
}

/// Pager's weak compatibility test between two kernels with the same core.
pub fn is_weakly_compatible(left: &LRItemSet, right: &LRItemSet) -> bool {
    if left.len() != right.len() || !left.keys().eq(right.keys()) {
        return false;
    }

    let left: Vec<_> = left.values().collect();
    let right: Vec<_> = right.values().collect();
    for i in 0..left.len() {
        for j in (i + 1)..left.len() {
            let mut crossed = left[i].intersection(right[j]);
            crossed.union_with(&right[i].intersection(left[j]));
            if crossed.is_empty() {
                continue;
            }
            let mut shared = left[i].intersection(left[j]);
            shared.union_with(&right[i].intersection(right[j]));
            if !shared.is_superset(&crossed) {
                return false;
            }
        }
    }
    true
}

/// Add the lookaheads of `from` into `into`, returning whether anything
/// has been added.
pub(crate) fn merge_lookaheads(into: &mut LRItemSet, from: &LRItemSet) -> bool {
    let mut changed = false;
    for (core, lookaheads) in from {
        changed |= into.entry(*core).or_default().union_with(lookaheads);
    }
    changed
}

/// List the states reachable from `start` in breadth-first order.
///
/// States that were superseded while their predecessors were regenerated
/// are left out.
pub(crate) fn reachable_states(edges: &[Map<SymbolID, StateID>], start: StateID) -> Vec<StateID> {
    let mut order = vec![];
    let mut visited = vec![false; edges.len()];
    let mut queue: Queue<StateID> = Some(start).into_iter().collect();
    if let Some(v) = visited.get_mut(start.index()) {
        *v = true;
    }
    while let Some(id) = queue.pop() {
        order.push(id);
        for target in edges.get(id.index()).into_iter().flat_map(|e| e.values()) {
            if let Some(v) = visited.get_mut(target.index()) {
                if !*v {
                    *v = true;
                    queue.push(*target);
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grammar::{Grammar, SymbolID::*, TerminalID},
        lr1::{Config, LRItemCore},
        types::TerminalSet,
    };

    fn la(raw: &[u16]) -> TerminalSet {
        raw.iter().map(|&r| TerminalID::from_raw(r)).collect()
    }

    /// S := a X a | a Y b ; X := c ; Y := c
    fn two_unit_rules() -> Grammar {
        Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let b = g.terminal("b", None)?;
            let c = g.terminal("c", None)?;
            let s = g.nonterminal("S")?;
            let x = g.nonterminal("X")?;
            let y = g.nonterminal("Y")?;
            g.rule(s, [T(a), N(x), T(a)], None)?;
            g.rule(s, [T(a), N(y), T(b)], None)?;
            g.rule(x, [T(c)], None)?;
            g.rule(y, [T(c)], None)?;
            Ok(())
        })
        .unwrap()
    }

    /// The cores `X := c .` and `Y := c .`.
    fn unit_cores(g: &Grammar) -> (LRItemCore, LRItemCore) {
        let automaton = Config::new().use_canonical().generate(g).unwrap();
        let state = automaton
            .states()
            .find(|state| {
                state.kernel().count() == 2 && state.kernel().all(|(core, _)| core.marker() == 1)
                    && state.kernel().all(|(core, _)| g.rules[&core.rule()].right().len() == 1)
            })
            .unwrap();
        let mut cores = state.kernel().map(|(core, _)| *core);
        (cores.next().unwrap(), cores.next().unwrap())
    }

    /// The kernel `{X := c ., Y := c .}` with the given lookaheads.
    fn kernel(g: &Grammar, x: &[u16], y: &[u16]) -> LRItemSet {
        let (c1, c2) = unit_cores(g);
        [(c1, la(x)), (c2, la(y))].into_iter().collect()
    }

    /// Lookaheads on which two items of `kernel` would both be reduced.
    fn reduce_conflicts(kernel: &LRItemSet) -> TerminalSet {
        let sets: Vec<_> = kernel.values().collect();
        let mut conflicts = TerminalSet::default();
        for i in 0..sets.len() {
            for j in (i + 1)..sets.len() {
                for t in sets[i].iter().filter(|t| sets[j].contains(*t)) {
                    conflicts.insert(t);
                }
            }
        }
        conflicts
    }

    #[test]
    fn weak_compatibility() {
        let g = two_unit_rules();
        // merged, both reductions would see `a` and `b`.
        let k1 = kernel(&g, &[1], &[2]);
        let k2 = kernel(&g, &[2], &[1]);
        assert!(!is_weakly_compatible(&k1, &k2));
        assert_eq!(decide(MergeMode::PGM, &k1, &k2), MergeDecision::Distinct);
        assert_eq!(decide(MergeMode::LALR, &k1, &k2), MergeDecision::Merge);

        let k3 = kernel(&g, &[1, 3], &[2]);
        assert!(is_weakly_compatible(&k1, &k3));
        assert_eq!(decide(MergeMode::PGM, &k1, &k3), MergeDecision::Merge);

        // `k4` already conflicts on `b`, merging would add `a`.
        let k4 = kernel(&g, &[2], &[1, 2]);
        assert!(!is_weakly_compatible(&k1, &k4));
        assert_eq!(decide(MergeMode::PGM, &k1, &k4), MergeDecision::Distinct);

        // the only shared lookahead is `b`, on which `k5` conflicts already.
        let k5 = kernel(&g, &[2], &[2, 3]);
        let k6 = kernel(&g, &[1, 2], &[3]);
        assert!(is_weakly_compatible(&k5, &k6));
    }

    #[test]
    fn existing_conflicts_do_not_license_new_ones() {
        let g = two_unit_rules();
        // {X: a c, Y: c} conflicts on `c`; {X: b, Y: a} does not conflict.
        let k1 = kernel(&g, &[1, 3], &[3]);
        let k2 = kernel(&g, &[2], &[1]);
        assert!(!is_weakly_compatible(&k1, &k2));
        assert!(!is_weakly_compatible(&k2, &k1));
        assert_eq!(decide(MergeMode::PGM, &k1, &k2), MergeDecision::Distinct);

        let mut merged = k1.clone();
        merge_lookaheads(&mut merged, &k2);
        assert_eq!(reduce_conflicts(&merged), la(&[1, 3]));
    }

    #[test]
    fn merging_compatible_kernels_adds_no_conflict() {
        let g = two_unit_rules();
        let (c1, c2) = unit_cores(&g);
        let subsets: Vec<Vec<u16>> = (0..8u16)
            .map(|bits| (1..=3).filter(|t| bits & (1 << (t - 1)) != 0).collect())
            .collect();
        let kernels: Vec<LRItemSet> = subsets
            .iter()
            .flat_map(|x| {
                subsets
                    .iter()
                    .map(move |y| [(c1, la(x)), (c2, la(y))].into_iter().collect())
            })
            .collect();

        let mut merges = 0;
        for k1 in &kernels {
            for k2 in &kernels {
                if !is_weakly_compatible(k1, k2) {
                    continue;
                }
                let mut merged = k1.clone();
                merge_lookaheads(&mut merged, k2);
                merges += 1;
                let mut before = reduce_conflicts(k1);
                before.union_with(&reduce_conflicts(k2));
                assert!(
                    before.is_superset(&reduce_conflicts(&merged)),
                    "{:?} + {:?}",
                    k1,
                    k2
                );
            }
        }
        assert!(merges > kernels.len());
    }

    #[test]
    fn subsumed_kernels_are_reused() {
        let g = two_unit_rules();
        let big = kernel(&g, &[1, 2], &[3]);
        let small = kernel(&g, &[1], &[3]);
        assert!(is_subsumed(&big, &small));
        assert!(!is_subsumed(&small, &big));
        assert_eq!(decide(MergeMode::PGM, &big, &small), MergeDecision::Reuse);
        assert_eq!(decide(MergeMode::LALR, &big, &small), MergeDecision::Reuse);
        assert_eq!(decide(MergeMode::Canonical, &big, &small), MergeDecision::Distinct);
        assert_eq!(decide(MergeMode::Canonical, &big, &big), MergeDecision::Reuse);
    }

    #[test]
    fn merging_reports_growth() {
        let g = two_unit_rules();
        let mut target = kernel(&g, &[1], &[2]);
        assert!(merge_lookaheads(&mut target, &kernel(&g, &[3], &[2])));
        assert_eq!(target, kernel(&g, &[1, 3], &[2]));
        assert!(!merge_lookaheads(&mut target, &kernel(&g, &[1], &[])));
    }

    #[test]
    fn unreachable_states_are_dropped() {
        let t = T(TerminalID::from_raw(1));
        let s = |raw: usize| StateID::new(raw).unwrap();
        let edges: Vec<Map<SymbolID, StateID>> = vec![
            [(t, s(2))].into_iter().collect(),
            [(t, s(0))].into_iter().collect(),
            [(t, s(3))].into_iter().collect(),
            Map::default(),
        ];
        assert_eq!(reachable_states(&edges, StateID::START), [s(0), s(2), s(3)]);
    }
}
