//! Parse actions and conflict resolution.

use crate::{
    grammar::{Assoc, Grammar, NonterminalID, Precedence, RuleID, SymbolID, TerminalID},
    lr1::{Automaton, LRItemSet, StateID},
    types::Map,
    util::display_fn,
};
use pgmlr_runtime::definition::{ParseAction, ParseTable};
use std::{cmp::Ordering, fmt};

/// The action that the LR automaton in a state performs on a particular
/// lookahead symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read a lookahead symbol and transition to the specified state.
    Shift(StateID),

    /// Reduce to the specified production rule.
    Reduce(RuleID),

    Accept,

    /// Reject the specified lookahead symbol.
    ///
    /// The behavior of this action is the same as if no action exists
    /// for the given lookahead symbol, but is explicitly inserted by
    /// resolving shift/reduce conflicts with `nonassoc`.
    Fail,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConflictReason {
    /// At least one of the competing actions has no precedence.
    MissingPrecedence,

    /// The precedences favor the shift over some reductions but not others.
    InconsistentShiftResolution,

    /// More than one reduction remains, so the earliest one was chosen.
    MultipleReductions,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The conflict was settled by the declared precedences.
    Precedence,

    /// The conflict was settled by a fixed convention: a shift wins over
    /// reductions, and the earliest declared production over the others.
    Arbitrary(ConflictReason),
}

/// Competing actions on a lookahead symbol in a state, and how they were settled.
///
/// `kind` names the primary conflict: `ShiftReduce` whenever a shift takes part.
/// A `ShiftReduce` conflict with more than one entry in `reduces` is also a
/// reduce/reduce conflict among them; see [`Conflict::is_reduce_reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateID,
    pub terminal: TerminalID,
    pub kind: ConflictKind,
    pub shift: Option<StateID>,
    /// Every reduction competing on `terminal`.
    pub reduces: Vec<RuleID>,
    pub resolution: Resolution,
    /// The action placed in the table.
    pub action: Action,
}

impl Conflict {
    /// Whether the conflict was settled by declared precedences.
    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, Resolution::Precedence)
    }

    /// Whether at least two reductions compete, with or without a shift.
    pub fn is_reduce_reduce(&self) -> bool {
        self.reduces.len() > 1
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            let kind = match self.kind {
                ConflictKind::ShiftReduce if self.is_reduce_reduce() => "shift/reduce/reduce",
                ConflictKind::ShiftReduce => "shift/reduce",
                ConflictKind::ReduceReduce => "reduce/reduce",
            };
            write!(
                f,
                "{} conflict on {} in state {}:",
                kind,
                g.symbol_name(SymbolID::T(self.terminal)),
                self.state
            )?;
            if let Some(next) = self.shift {
                write!(f, " shift({:02})", next)?;
            }
            for reduce in &self.reduces {
                match g.rules.get(reduce) {
                    Some(rule) => write!(f, " reduce({})", rule.display(g))?,
                    None => f.write_str(" reduce(<unknown>)")?,
                }
            }
            match self.resolution {
                Resolution::Precedence => f.write_str(" [resolved by precedence]"),
                Resolution::Arbitrary(reason) => write!(f, " [arbitrary: {:?}]", reason),
            }
        })
    }
}

/// Compute the actions of a state from its closed items and its transitions.
pub(crate) fn build_actions(
    g: &Grammar,
    state: StateID,
    items: &LRItemSet,
    transitions: &Map<SymbolID, StateID>,
) -> (Map<TerminalID, Action>, Vec<Conflict>) {
    #[derive(Default)]
    struct PendingAction {
        shift: Option<StateID>,
        reduces: Vec<RuleID>,
    }
    let mut pending: Map<TerminalID, PendingAction> = Map::default();

    for (symbol, target) in transitions {
        if let SymbolID::T(t) = symbol {
            pending.entry(*t).or_default().shift = Some(*target);
        }
    }
    for (core, lookaheads) in items {
        let Some(rule) = g.rules.get(&core.rule()) else {
            continue;
        };
        if core.marker() < rule.right().len() {
            continue;
        }
        for lookahead in lookaheads.iter() {
            pending.entry(lookahead).or_default().reduces.push(core.rule());
        }
    }
    pending.sort_keys();

    let mut actions = Map::default();
    let mut conflicts = vec![];
    for (terminal, PendingAction { shift, reduces }) in pending {
        let (action, conflict) = resolve_conflict(g, terminal, shift, &reduces);
        if let Some((kind, resolution)) = conflict {
            let conflict = Conflict {
                state,
                terminal,
                kind,
                shift,
                reduces,
                resolution,
                action,
            };
            tracing::debug!("{}", conflict.display(g));
            conflicts.push(conflict);
        }
        actions.insert(terminal, action);
    }

    (actions, conflicts)
}

fn reduce_or_accept(rule: RuleID) -> Action {
    if rule == RuleID::ACCEPT {
        Action::Accept
    } else {
        Action::Reduce(rule)
    }
}

/// The production declared earliest among `reduces`.
fn earliest(g: &Grammar, reduces: &[RuleID]) -> Option<RuleID> {
    reduces
        .iter()
        .copied()
        .min_by_key(|r| g.rules.get(r).map_or(usize::MAX, |rule| rule.order()))
}

/// Choose the action for `terminal` among a shift and some reductions.
///
/// The second value reports the conflict, if any, with its resolution.
fn resolve_conflict(
    g: &Grammar,
    terminal: TerminalID,
    shift: Option<StateID>,
    reduces: &[RuleID],
) -> (Action, Option<(ConflictKind, Resolution)>) {
    use ConflictKind::*;

    let Some(next) = shift else {
        return match reduces {
            [] => (Action::Fail, None),
            [reduce] => (reduce_or_accept(*reduce), None),
            reduces => {
                let action = earliest(g, reduces).map_or(Action::Fail, reduce_or_accept);
                (
                    action,
                    Some((
                        ReduceReduce,
                        Resolution::Arbitrary(ConflictReason::MultipleReductions),
                    )),
                )
            }
        };
    };
    if reduces.is_empty() {
        return (Action::Shift(next), None);
    }

    let shift_prec = g.terminals.get(&terminal).and_then(|t| t.precedence());
    let arbitrary = |reason| {
        (
            Action::Shift(next),
            Some((ShiftReduce, Resolution::Arbitrary(reason))),
        )
    };

    let mut resolved = None;
    for reduce in reduces {
        let reduce_prec = g.rules.get(reduce).and_then(|rule| rule.precedence(g));
        let diff = match compare_precs(shift_prec, reduce_prec) {
            Some(diff) => diff,
            None => return arbitrary(ConflictReason::MissingPrecedence),
        };
        match resolved {
            None => resolved = Some(diff),
            Some(prev) if prev == diff => (),
            Some(..) => return arbitrary(ConflictReason::InconsistentShiftResolution),
        }
    }

    let by_precedence = Some((ShiftReduce, Resolution::Precedence));
    match (resolved, reduces) {
        (Some(PrecDiff::Left), _) => (Action::Shift(next), by_precedence),
        (Some(PrecDiff::Neither), _) => (Action::Fail, by_precedence),
        (Some(PrecDiff::Right), [reduce]) => (reduce_or_accept(*reduce), by_precedence),
        (Some(PrecDiff::Right), reduces) => {
            let action = earliest(g, reduces).map_or(Action::Fail, reduce_or_accept);
            (
                action,
                Some((
                    ShiftReduce,
                    Resolution::Arbitrary(ConflictReason::MultipleReductions),
                )),
            )
        }
        (None, _) => (Action::Shift(next), None),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PrecDiff {
    /// The shift wins.
    Left,
    /// The reduction wins.
    Right,
    Neither,
}

fn compare_precs(
    shift_prec: Option<Precedence>,
    reduce_prec: Option<Precedence>,
) -> Option<PrecDiff> {
    match (shift_prec, reduce_prec) {
        (Some(p1), Some(p2)) => match Ord::cmp(&p1.priority, &p2.priority) {
            Ordering::Greater => Some(PrecDiff::Left),
            Ordering::Less => Some(PrecDiff::Right),
            Ordering::Equal => match p1.assoc {
                Assoc::Left => Some(PrecDiff::Right),
                Assoc::Right => Some(PrecDiff::Left),
                Assoc::Nonassoc => Some(PrecDiff::Neither),
            },
        },
        _ => None,
    }
}

impl ParseTable for Automaton {
    type State = StateID;
    type Terminal = TerminalID;
    type Nonterminal = NonterminalID;
    type Rule = RuleID;

    fn initial_state(&self) -> Self::State {
        StateID::START
    }

    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Terminal>,
    ) -> ParseAction<Self::State, Self::Nonterminal, Self::Rule> {
        let lookahead = lookahead.unwrap_or(TerminalID::EOI);
        let action = self
            .state(current)
            .and_then(|state| state.action(lookahead));
        match action {
            Some(Action::Shift(next)) => ParseAction::Shift(next),
            Some(Action::Reduce(rule)) => match self.reductions.get(&rule) {
                Some(&(left, len)) => ParseAction::Reduce(rule, left, len),
                None => ParseAction::Fail,
            },
            Some(Action::Accept) => ParseAction::Accept,
            Some(Action::Fail) | None => ParseAction::Fail,
        }
    }

    fn goto(&self, current: Self::State, symbol: Self::Nonterminal) -> Option<Self::State> {
        self.state(current)?.goto(symbol)
    }
}

impl pgmlr_runtime::engine::Token<TerminalID> for TerminalID {
    fn to_index(&self) -> TerminalID {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grammar::SymbolID::*, lr1::Config};

    const LOW: Precedence = Precedence::new(0, Assoc::Left);
    const HIGH: Precedence = Precedence::new(1, Assoc::Left);

    fn arith(plus: Option<Precedence>, times: Option<Precedence>) -> Grammar {
        Grammar::define(|g| {
            let plus = g.terminal("PLUS", plus)?;
            let times = g.terminal("TIMES", times)?;
            let int = g.terminal("INT", None)?;
            let e = g.nonterminal("E")?;
            g.rule(e, [N(e), T(plus), N(e)], None)?;
            g.rule(e, [N(e), T(times), N(e)], None)?;
            g.rule(e, [T(int)], None)?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn precedence_resolves_shift_reduce() {
        let grammar = arith(Some(LOW), Some(HIGH));
        let automaton = Automaton::generate(&grammar).unwrap();
        assert!(!automaton.conflicts().is_empty());
        assert!(automaton.conflicts().iter().all(Conflict::is_resolved));

        let plus = grammar.terminal_by_name("PLUS").unwrap();
        let times = grammar.terminal_by_name("TIMES").unwrap();
        let rule_of = |id: RuleID| &grammar.rules[&id];
        for conflict in automaton.conflicts() {
            assert_eq!(conflict.kind, ConflictKind::ShiftReduce);
            let [reduce] = conflict.reduces[..] else {
                panic!("unexpected reductions: {:?}", conflict.reduces);
            };
            let operator = rule_of(reduce).right()[1];
            match (operator, conflict.terminal) {
                // `E TIMES E .` vs `PLUS`: reduce.
                (T(op), t) if op == times && t == plus => {
                    assert_eq!(conflict.action, Action::Reduce(reduce))
                }
                // `E PLUS E .` vs `TIMES`: shift.
                (T(op), t) if op == plus && t == times => {
                    assert!(matches!(conflict.action, Action::Shift(..)))
                }
                // same operator: left associative.
                _ => assert_eq!(conflict.action, Action::Reduce(reduce)),
            }
        }
    }

    #[test]
    fn missing_precedence_favors_shift() {
        let grammar = arith(None, Some(HIGH));
        let automaton = Automaton::generate(&grammar).unwrap();
        let unresolved: Vec<_> = automaton
            .conflicts()
            .iter()
            .filter(|c| !c.is_resolved())
            .collect();
        assert!(!unresolved.is_empty());
        for conflict in unresolved {
            assert_eq!(
                conflict.resolution,
                Resolution::Arbitrary(ConflictReason::MissingPrecedence)
            );
            assert!(matches!(conflict.action, Action::Shift(..)));
        }
    }

    #[test]
    fn nonassoc_fails() {
        let eq = Precedence::new(0, Assoc::Nonassoc);
        let grammar = Grammar::define(|g| {
            let equal = g.terminal("EQ", Some(eq))?;
            let int = g.terminal("INT", None)?;
            let e = g.nonterminal("E")?;
            g.rule(e, [N(e), T(equal), N(e)], None)?;
            g.rule(e, [T(int)], None)?;
            Ok(())
        })
        .unwrap();
        let automaton = Automaton::generate(&grammar).unwrap();
        let [conflict] = automaton.conflicts() else {
            panic!("expected one conflict: {:?}", automaton.conflicts());
        };
        assert!(conflict.is_resolved());
        assert_eq!(conflict.action, Action::Fail);
        let state = automaton.state(conflict.state).unwrap();
        assert_eq!(state.action(conflict.terminal), Some(Action::Fail));
    }

    #[test]
    fn reduce_reduce_prefers_earliest_rule() {
        // S := A x | B x ; B := a ; A := a
        let grammar = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let x = g.terminal("x", None)?;
            let s = g.nonterminal("S")?;
            let aa = g.nonterminal("A")?;
            let bb = g.nonterminal("B")?;
            g.rule(s, [N(aa), T(x)], None)?;
            g.rule(s, [N(bb), T(x)], None)?;
            g.rule(bb, [T(a)], None)?;
            g.rule(aa, [T(a)], None)?;
            Ok(())
        })
        .unwrap();
        let b_rule = grammar
            .rules
            .values()
            .find(|rule| rule.left() == grammar.nonterminal_by_name("B").unwrap())
            .unwrap()
            .id();

        for configure in [Config::use_canonical, Config::use_pgm, Config::use_lalr] {
            let mut config = Config::new();
            configure(&mut config);
            let automaton = config.generate(&grammar).unwrap();
            let [conflict] = automaton.conflicts() else {
                panic!("expected one conflict: {:?}", automaton.conflicts());
            };
            assert_eq!(conflict.kind, ConflictKind::ReduceReduce);
            assert_eq!(conflict.reduces.len(), 2);
            assert_eq!(conflict.action, Action::Reduce(b_rule));
            assert_eq!(
                conflict.resolution,
                Resolution::Arbitrary(ConflictReason::MultipleReductions)
            );
        }
    }

    #[test]
    fn shift_against_several_reductions_reports_both_kinds() {
        // S := A OP | B OP OP | INT OP INT ; A := INT ; B := INT
        let grammar = Grammar::define(|g| {
            let op = g.terminal("OP", Some(LOW))?;
            let int = g.terminal("INT", None)?;
            let s = g.nonterminal("S")?;
            let aa = g.nonterminal("A")?;
            let bb = g.nonterminal("B")?;
            g.rule(s, [N(aa), T(op)], None)?;
            g.rule(s, [N(bb), T(op), T(op)], None)?;
            g.rule(s, [T(int), T(op), T(int)], None)?;
            g.rule(aa, [T(int)], Some(HIGH))?;
            g.rule(bb, [T(int)], Some(HIGH))?;
            Ok(())
        })
        .unwrap();
        let op = grammar.terminal_by_name("OP").unwrap();
        let a = grammar.nonterminal_by_name("A").unwrap();
        let a_rule = grammar
            .rules
            .values()
            .find(|rule| rule.left() == a)
            .unwrap()
            .id();

        let automaton = Automaton::generate(&grammar).unwrap();
        let [conflict] = automaton.conflicts() else {
            panic!("expected one conflict: {:?}", automaton.conflicts());
        };
        assert_eq!(conflict.terminal, op);
        assert_eq!(conflict.kind, ConflictKind::ShiftReduce);
        assert!(conflict.shift.is_some());
        assert_eq!(conflict.reduces.len(), 2);
        assert!(conflict.is_reduce_reduce());
        assert_eq!(conflict.action, Action::Reduce(a_rule));
        assert_eq!(
            conflict.resolution,
            Resolution::Arbitrary(ConflictReason::MultipleReductions)
        );
        let rendered = conflict.display(&grammar).to_string();
        assert!(rendered.starts_with("shift/reduce/reduce conflict on OP"), "{}", rendered);
    }

    #[test]
    fn accept_on_end_of_input() {
        let grammar = arith(Some(LOW), Some(HIGH));
        let automaton = Automaton::generate(&grammar).unwrap();
        let accepting: Vec<_> = automaton
            .states()
            .filter(|state| state.action(TerminalID::EOI) == Some(Action::Accept))
            .collect();
        assert_eq!(accepting.len(), 1);

        let start_goto = automaton
            .state(StateID::START)
            .and_then(|state| state.goto(grammar.start_symbol));
        assert_eq!(start_goto, Some(accepting[0].id()));
    }

    #[test]
    fn runtime_view_of_the_table() {
        let grammar = arith(Some(LOW), Some(HIGH));
        let automaton = Automaton::generate(&grammar).unwrap();
        let int = grammar.terminal_by_name("INT").unwrap();

        let start = automaton.initial_state();
        let ParseAction::Shift(next) = automaton.action(start, Some(int)) else {
            panic!("INT must be shifted first");
        };
        match automaton.action(next, None) {
            ParseAction::Reduce(_, left, 1) => assert_eq!(left, grammar.start_symbol),
            _ => panic!("`E := INT` must be reduced at the end of input"),
        }
        assert!(matches!(automaton.action(start, None), ParseAction::Fail));
        assert!(automaton.goto(start, grammar.start_symbol).is_some());
    }
}
