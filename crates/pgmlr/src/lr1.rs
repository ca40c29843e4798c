//! The implementation of LR(1) automaton.

use crate::{
    first_sets::FirstSets,
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    pager::{self, MergeDecision},
    table::{self, Action, Conflict},
    types::{Map, Queue, Set, TerminalSet},
    util::display_fn,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("the start symbol `{symbol}' has no production rules")]
    EmptyStart { symbol: String },

    #[error("internal error: {msg}")]
    Internal { msg: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MergeMode {
    /// States are merged only if their kernels are identical, as in
    /// Knuth's canonical LR(1) method.
    Canonical,

    /// States are merged if they are weakly compatible in the sense of
    /// Pager's Practical General Method (PGM).
    PGM,

    /// States with the same LR(0) core are always merged, as in
    /// DeRemer's LALR(1) method.
    LALR,
}

#[derive(Debug, Clone)]
pub struct Config {
    merge_mode: MergeMode,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            merge_mode: MergeMode::PGM,
        }
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    /// Set the merge strategy of states to match Knuth's Canonical LR(1) method.
    pub fn use_canonical(&mut self) -> &mut Self {
        self.merge_mode = MergeMode::Canonical;
        self
    }

    /// Set the merge strategy of states to match Pager's Practical General Method (PGM).
    ///
    /// By default, this strategy is selected due to the trade-off between
    /// reducing the number of states and avoiding reduce/reduce conflicts.
    pub fn use_pgm(&mut self) -> &mut Self {
        self.merge_mode = MergeMode::PGM;
        self
    }

    /// Set the merge strategy of states to match DeRemer's LALR(1) method.
    pub fn use_lalr(&mut self) -> &mut Self {
        self.merge_mode = MergeMode::LALR;
        self
    }

    /// Build the LR(1) automaton of `grammar`.
    #[tracing::instrument(skip_all, fields(mode = ?self.merge_mode))]
    pub fn generate(&self, grammar: &Grammar) -> Result<Automaton, BuildError> {
        precheck(grammar)?;
        let mut gen = AutomatonGenerator::new(grammar, self);
        gen.populate_states()?;
        gen.finalize()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: u32,
}

impl StateID {
    pub const START: Self = Self { raw: 0 };

    pub(crate) fn new(index: usize) -> Result<Self, BuildError> {
        let raw = u32::try_from(index).map_err(|_| BuildError::Internal {
            msg: "too many states".into(),
        })?;
        Ok(Self { raw })
    }

    pub const fn into_raw(self) -> u32 {
        self.raw
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// An LR(0) item, that is, a production rule with a marker position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LRItemCore {
    rule: RuleID,
    marker: usize,
}

impl LRItemCore {
    pub fn rule(&self) -> RuleID {
        self.rule
    }

    pub fn marker(&self) -> usize {
        self.marker
    }

    /// Kernel items are those of the augmented rule and those whose marker
    /// has advanced.
    pub fn is_kernel(&self) -> bool {
        self.marker > 0 || self.rule == RuleID::ACCEPT
    }

    // `"(LHS := R1 . R2)"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            let rule = &g.rules[&self.rule];
            write!(f, "({} :=", g.symbol_name(SymbolID::N(rule.left())))?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == self.marker {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if self.marker == rule.right().len() {
                f.write_str(" .")?;
            }
            f.write_str(")")
        })
    }
}

/// A set of LR(1) items, keyed by their cores and ordered so that equal sets
/// compare and hash equal.
pub type LRItemSet = BTreeMap<LRItemCore, TerminalSet>;

type LRItemCores = BTreeSet<LRItemCore>;

#[derive(Debug)]
pub struct State {
    id: StateID,
    items: LRItemSet,
    transitions: Map<SymbolID, StateID>,
    pub(crate) actions: Map<TerminalID, Action>,
    pub(crate) gotos: Map<NonterminalID, StateID>,
}

impl State {
    pub fn id(&self) -> StateID {
        self.id
    }

    /// The closed item set of this state.
    pub fn items(&self) -> impl Iterator<Item = (&LRItemCore, &TerminalSet)> + '_ {
        self.items.iter()
    }

    pub fn kernel(&self) -> impl Iterator<Item = (&LRItemCore, &TerminalSet)> + '_ {
        self.items.iter().filter(|(core, _)| core.is_kernel())
    }

    pub fn transitions(&self) -> impl Iterator<Item = (SymbolID, StateID)> + '_ {
        self.transitions.iter().map(|(symbol, target)| (*symbol, *target))
    }

    pub fn actions(&self) -> impl Iterator<Item = (TerminalID, Action)> + '_ {
        self.actions.iter().map(|(token, action)| (*token, *action))
    }

    pub fn action(&self, token: TerminalID) -> Option<Action> {
        self.actions.get(&token).copied()
    }

    pub fn gotos(&self) -> impl Iterator<Item = (NonterminalID, StateID)> + '_ {
        self.gotos.iter().map(|(symbol, goto)| (*symbol, *goto))
    }

    pub fn goto(&self, symbol: NonterminalID) -> Option<StateID> {
        self.gotos.get(&symbol).copied()
    }
}

#[derive(Debug)]
pub struct Automaton {
    states: Vec<State>,
    conflicts: Vec<Conflict>,
    pub(crate) reductions: Map<RuleID, (NonterminalID, usize)>,
}

impl Automaton {
    /// Build the automaton of `grammar` with the default configuration.
    pub fn generate(grammar: &Grammar) -> Result<Self, BuildError> {
        Config::new().generate(grammar)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> + '_ {
        self.states.iter()
    }

    pub fn state(&self, id: StateID) -> Option<&State> {
        self.states.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// All conflicts found while building the tables, including those
    /// resolved by precedence.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (i, state) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }

                writeln!(f, "#### State {:02}", state.id)?;
                writeln!(f, "## items")?;
                for (core, lookaheads) in &state.items {
                    write!(f, "- {}  [", core.display(g))?;
                    for (i, lookahead) in lookaheads.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" ")?;
                        }
                        write!(f, "{}", g.symbol_name(SymbolID::T(lookahead)))?;
                    }
                    f.write_str("]\n")?;
                }

                writeln!(f, "## actions")?;
                for (token, action) in &state.actions {
                    let token = g.symbol_name(SymbolID::T(*token));
                    match action {
                        Action::Shift(n) => writeln!(f, "- {} => shift({:02})", token, n)?,
                        Action::Reduce(rule) => match g.rules.get(rule) {
                            Some(rule) => writeln!(f, "- {} => reduce({})", token, rule.display(g))?,
                            None => writeln!(f, "- {} => reduce(<unknown>)", token)?,
                        },
                        Action::Accept => writeln!(f, "- {} => accept", token)?,
                        Action::Fail => writeln!(f, "- {} => fail", token)?,
                    }
                }

                writeln!(f, "## gotos")?;
                for (symbol, goto) in &state.gotos {
                    writeln!(f, "- {} => goto({:02})", g.symbol_name(SymbolID::N(*symbol)), goto)?;
                }

                let conflicts = self.conflicts.iter().filter(|c| c.state == state.id);
                for (i, conflict) in conflicts.enumerate() {
                    if i == 0 {
                        writeln!(f, "## conflicts")?;
                    }
                    writeln!(f, "- {}", conflict.display(g))?;
                }
            }
            Ok(())
        })
    }
}

/// Reject grammars that cannot be turned into an automaton.
fn precheck(grammar: &Grammar) -> Result<(), BuildError> {
    let known = |symbol: &SymbolID| match symbol {
        SymbolID::T(t) => grammar.terminals.contains_key(t),
        SymbolID::N(n) => grammar.nonterminals.contains_key(n),
    };
    for rule in grammar.rules.values() {
        if !known(&SymbolID::N(rule.left())) || !rule.right().iter().all(|symbol| known(symbol)) {
            return Err(BuildError::Internal {
                msg: format!("the rule {:?} refers to an unknown symbol", rule.id()),
            });
        }
    }
    if !grammar.rules.contains_key(&RuleID::ACCEPT) {
        return Err(BuildError::Internal {
            msg: "the augmented start rule is missing".into(),
        });
    }

    let start = grammar.start_symbol;
    if !grammar.nonterminals.contains_key(&start) {
        return Err(BuildError::Internal {
            msg: "the start symbol is not declared".into(),
        });
    }
    if grammar.rules_of(start).next().is_none() {
        return Err(BuildError::EmptyStart {
            symbol: grammar.symbol_name(SymbolID::N(start)).to_string(),
        });
    }

    // nonterminals that derive no terminal string.
    let mut productive: Set<NonterminalID> = Set::default();
    let mut changed = true;
    while changed {
        changed = false;
        for rule in grammar.rules.values() {
            if productive.contains(&rule.left()) {
                continue;
            }
            let derives = rule.right().iter().all(|symbol| match symbol {
                SymbolID::T(..) => true,
                SymbolID::N(n) => productive.contains(n),
            });
            if derives {
                productive.insert(rule.left());
                changed = true;
            }
        }
    }
    for id in grammar.nonterminals.keys() {
        if !productive.contains(id) {
            tracing::warn!(
                "the nonterminal `{}' derives no terminal string",
                grammar.symbol_name(SymbolID::N(*id))
            );
        }
    }

    Ok(())
}

/// Closure and goto computation over LR(1) item sets.
#[derive(Debug)]
pub(crate) struct ItemSetExtractor<'g> {
    grammar: &'g Grammar,
    first_sets: FirstSets,
    rules_by_left: Map<NonterminalID, Vec<RuleID>>,
}

impl<'g> ItemSetExtractor<'g> {
    pub(crate) fn new(grammar: &'g Grammar) -> Self {
        let mut rules_by_left: Map<NonterminalID, Vec<RuleID>> = Map::default();
        for rule in grammar.rules.values() {
            rules_by_left.entry(rule.left()).or_default().push(rule.id());
        }
        Self {
            grammar,
            first_sets: FirstSets::new(grammar),
            rules_by_left,
        }
    }

    /// Add the items `[Y -> . gamma, First(beta a)]` for each item
    /// `[X -> alpha . Y beta, a]` until nothing changes.
    pub(crate) fn closure(&self, kernel: &LRItemSet) -> LRItemSet {
        let mut items = kernel.clone();
        let mut changed = true;
        while changed {
            changed = false;

            let mut added: Map<LRItemCore, TerminalSet> = Map::default();
            for (core, lookaheads) in &items {
                let rule = &self.grammar.rules[&core.rule];
                let (y_symbol, beta) = match &rule.right()[core.marker..] {
                    [SymbolID::N(y_symbol), beta @ ..] => (y_symbol, beta),
                    _ => continue,
                };

                let first = self.first_sets.get(beta, lookaheads);
                for &rule in self.rules_by_left.get(y_symbol).into_iter().flatten() {
                    added
                        .entry(LRItemCore { rule, marker: 0 })
                        .or_default()
                        .union_with(&first);
                }
            }

            for (core, lookaheads) in added {
                let entry = items.entry(core).or_insert_with(|| {
                    changed = true;
                    TerminalSet::default()
                });
                changed |= entry.union_with(&lookaheads);
            }
        }
        items
    }

    /// Extract the (unclosed) kernels of the successors of `items`, keyed by
    /// the symbol after the marker.
    pub(crate) fn transitions(&self, items: &LRItemSet) -> Map<SymbolID, LRItemSet> {
        let mut kernels: Map<SymbolID, LRItemSet> = Map::default();
        for (core, lookaheads) in items {
            let rule = &self.grammar.rules[&core.rule];
            let Some(label) = rule.right().get(core.marker) else {
                continue;
            };
            kernels.entry(*label).or_default().insert(
                LRItemCore {
                    marker: core.marker + 1,
                    ..*core
                },
                lookaheads.clone(),
            );
        }
        kernels
    }
}

// === AutomatonGenerator ===

#[derive(Debug)]
struct AutomatonGenerator<'g> {
    extractor: ItemSetExtractor<'g>,
    config: &'g Config,
    kernels: Vec<LRItemSet>,
    edges: Vec<Map<SymbolID, StateID>>,
    by_kernel: Map<LRItemSet, StateID>,
    by_core: Map<LRItemCores, Vec<StateID>>,
    pending: Queue<StateID>,
}

impl<'g> AutomatonGenerator<'g> {
    fn new(grammar: &'g Grammar, config: &'g Config) -> Self {
        Self {
            extractor: ItemSetExtractor::new(grammar),
            config,
            kernels: vec![],
            edges: vec![],
            by_kernel: Map::default(),
            by_core: Map::default(),
            pending: Queue::default(),
        }
    }

    fn populate_states(&mut self) -> Result<(), BuildError> {
        let mut initial = LRItemSet::new();
        initial.insert(
            LRItemCore {
                rule: RuleID::ACCEPT,
                marker: 0,
            },
            Some(TerminalID::EOI).into_iter().collect(),
        );
        self.insert_kernel(initial)?;

        // (Re)generate successors until no state changes.
        while let Some(id) = self.pending.pop() {
            let items = self.extractor.closure(&self.kernels[id.index()]);
            let mut edges = Map::default();
            for (symbol, kernel) in self.extractor.transitions(&items) {
                let target = self.insert_kernel(kernel)?;
                edges.insert(symbol, target);
            }
            tracing::trace!("state {} has {} edges", id, edges.len());
            self.edges[id.index()] = edges;
        }

        tracing::debug!("populated {} states", self.kernels.len());
        Ok(())
    }

    /// Find or create the state for `kernel`.
    fn insert_kernel(&mut self, kernel: LRItemSet) -> Result<StateID, BuildError> {
        if let Some(&id) = self.by_kernel.get(&kernel) {
            return Ok(id);
        }

        let cores: LRItemCores = kernel.keys().copied().collect();
        if self.config.merge_mode != MergeMode::Canonical {
            let candidates = self.by_core.get(&cores).cloned().unwrap_or_default();
            for id in candidates {
                let existing = &self.kernels[id.index()];
                match pager::decide(self.config.merge_mode, existing, &kernel) {
                    MergeDecision::Reuse => return Ok(id),
                    MergeDecision::Merge => {
                        self.merge_into(id, &kernel);
                        return Ok(id);
                    }
                    MergeDecision::Distinct => continue,
                }
            }
        }

        let id = StateID::new(self.kernels.len())?;
        tracing::trace!("new state {}", id);
        self.by_kernel.insert(kernel.clone(), id);
        self.by_core.entry(cores).or_default().push(id);
        self.kernels.push(kernel);
        self.edges.push(Map::default());
        self.pending.push(id);
        Ok(id)
    }

    /// Merge the lookaheads of `incoming` into the state `id`, and schedule
    /// its successors to be regenerated if it has grown.
    ///
    /// Earlier kernels stay mapped to the grown state, which subsumes them.
    fn merge_into(&mut self, id: StateID, incoming: &LRItemSet) {
        let kernel = &mut self.kernels[id.index()];
        if pager::merge_lookaheads(kernel, incoming) {
            tracing::trace!("merged lookaheads into state {}", id);
            self.by_kernel.insert(kernel.clone(), id);
            self.pending.push(id);
        }
    }

    fn finalize(self) -> Result<Automaton, BuildError> {
        let grammar = self.extractor.grammar;

        // Re-processed states may have left some states unreachable.
        let order = pager::reachable_states(&self.edges, StateID::START);
        let mut renumber: Map<StateID, StateID> = Map::default();
        for (index, old) in order.iter().enumerate() {
            renumber.insert(*old, StateID::new(index)?);
        }
        if order.len() < self.kernels.len() {
            tracing::debug!(
                "collected {} unreachable states",
                self.kernels.len() - order.len()
            );
        }

        let mut states = Vec::with_capacity(order.len());
        let mut conflicts = vec![];
        for old in &order {
            let id = renumber[old];
            let items = self.extractor.closure(&self.kernels[old.index()]);

            let mut transitions = Map::default();
            let mut gotos = Map::default();
            for (symbol, target) in &self.edges[old.index()] {
                let target = renumber.get(target).copied().ok_or_else(|| BuildError::Internal {
                    msg: format!("dangling edge from state {}", old),
                })?;
                transitions.insert(*symbol, target);
                if let SymbolID::N(n) = symbol {
                    gotos.insert(*n, target);
                }
            }

            let (actions, found) = table::build_actions(grammar, id, &items, &transitions);
            conflicts.extend(found);

            states.push(State {
                id,
                items,
                transitions,
                actions,
                gotos,
            });
        }

        let reductions = grammar
            .rules
            .values()
            .map(|rule| (rule.id(), (rule.left(), rule.right().len())))
            .collect();

        tracing::debug!(
            "built {} states with {} conflicts",
            states.len(),
            conflicts.len()
        );

        Ok(Automaton {
            states,
            conflicts,
            reductions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grammar::SymbolID::*, table::ConflictKind};

    /// S := C C ; C := c C | d
    fn dragon() -> Grammar {
        Grammar::define(|g| {
            let c = g.terminal("c", None)?;
            let d = g.terminal("d", None)?;
            let s = g.nonterminal("S")?;
            let cc = g.nonterminal("C")?;
            g.rule(s, [N(cc), N(cc)], None)?;
            g.rule(cc, [T(c), N(cc)], None)?;
            g.rule(cc, [T(d)], None)?;
            Ok(())
        })
        .unwrap()
    }

    /// S := a A d | b B d | a B e | b A e ; A := c ; B := c
    fn pager_weak() -> Grammar {
        Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let b = g.terminal("b", None)?;
            let c = g.terminal("c", None)?;
            let d = g.terminal("d", None)?;
            let e = g.terminal("e", None)?;
            let s = g.nonterminal("S")?;
            let x = g.nonterminal("A")?;
            let y = g.nonterminal("B")?;
            g.rule(s, [T(a), N(x), T(d)], None)?;
            g.rule(s, [T(b), N(y), T(d)], None)?;
            g.rule(s, [T(a), N(y), T(e)], None)?;
            g.rule(s, [T(b), N(x), T(e)], None)?;
            g.rule(x, [T(c)], None)?;
            g.rule(y, [T(c)], None)?;
            Ok(())
        })
        .unwrap()
    }

    fn generate(grammar: &Grammar, configure: impl FnOnce(&mut Config) -> &mut Config) -> Automaton {
        let mut config = Config::new();
        configure(&mut config);
        config.generate(grammar).unwrap()
    }

    #[test]
    fn closure_is_idempotent() {
        let grammar = dragon();
        let extractor = ItemSetExtractor::new(&grammar);
        for automaton in [
            generate(&grammar, Config::use_canonical),
            generate(&grammar, Config::use_pgm),
        ] {
            for state in automaton.states() {
                assert_eq!(extractor.closure(&state.items), state.items);
            }
        }
    }

    #[test]
    fn goto_is_deterministic() {
        let grammar = dragon();
        let extractor = ItemSetExtractor::new(&grammar);
        let automaton = generate(&grammar, Config::use_canonical);
        for state in automaton.states() {
            let first = extractor.transitions(&state.items);
            let second = extractor.transitions(&extractor.closure(&state.items));
            assert_eq!(first, second);

            for (symbol, kernel) in first {
                let target = state.transitions[&symbol];
                let target = automaton.state(target).unwrap();
                assert_eq!(extractor.closure(&kernel), target.items);
            }
        }
    }

    #[test]
    fn state_counts() {
        let grammar = dragon();
        assert_eq!(generate(&grammar, Config::use_canonical).len(), 10);
        assert_eq!(generate(&grammar, Config::use_pgm).len(), 7);
        assert_eq!(generate(&grammar, Config::use_lalr).len(), 7);
    }

    #[test]
    fn merged_lookaheads_are_propagated() {
        let grammar = dragon();
        let c = grammar.terminal_by_name("c").unwrap();
        let d = grammar.terminal_by_name("d").unwrap();
        let expected: TerminalSet = [TerminalID::EOI, c, d].into_iter().collect();

        let cc = grammar.nonterminal_by_name("C").unwrap();
        for automaton in [
            generate(&grammar, Config::use_pgm),
            generate(&grammar, Config::use_lalr),
        ] {
            // `C := c C .` and `C := d .` each live in one state seeing all lookaheads.
            let completed: Vec<_> = automaton
                .states()
                .flat_map(|state| state.items())
                .filter(|(core, _)| {
                    let rule = &grammar.rules[&core.rule()];
                    rule.left() == cc && core.marker() == rule.right().len()
                })
                .map(|(_, lookaheads)| lookaheads.clone())
                .collect();
            assert_eq!(completed.len(), 2);
            for lookaheads in completed {
                assert_eq!(lookaheads, expected);
            }
        }
    }

    #[test]
    fn pgm_avoids_lalr_conflicts() {
        let grammar = pager_weak();
        let canonical = generate(&grammar, Config::use_canonical);
        let pgm = generate(&grammar, Config::use_pgm);
        let lalr = generate(&grammar, Config::use_lalr);

        assert!(canonical.conflicts().is_empty());
        assert!(pgm.conflicts().is_empty());
        assert_eq!(pgm.len(), canonical.len());

        assert_eq!(lalr.len(), canonical.len() - 1);
        assert_eq!(lalr.conflicts().len(), 2);
        assert!(lalr
            .conflicts()
            .iter()
            .all(|c| c.kind == ConflictKind::ReduceReduce));
    }

    #[test]
    fn states_are_numbered_breadth_first() {
        let grammar = dragon();
        let automaton = generate(&grammar, Config::use_pgm);
        let mut seen = vec![StateID::START];
        for state in automaton.states() {
            for (_, target) in state.transitions() {
                if !seen.contains(&target) {
                    assert_eq!(target.index(), seen.len());
                    seen.push(target);
                }
            }
        }
        assert_eq!(seen.len(), automaton.len());
    }

    #[test]
    fn empty_start_symbol() {
        let grammar = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let s = g.nonterminal("S")?;
            let x = g.nonterminal("X")?;
            g.rule(x, [T(a)], None)?;
            g.start_symbol(s)?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            Config::new().generate(&grammar),
            Err(BuildError::EmptyStart { symbol }) if symbol == "S"
        ));
    }

    #[test]
    fn display_automaton() {
        let grammar = dragon();
        let automaton = Automaton::generate(&grammar).unwrap();
        let rendered = automaton.display(&grammar).to_string();
        assert!(rendered.starts_with("#### State 00\n## items\n- ($start := . S)  [$eoi]\n"));
        assert!(rendered.contains("- $eoi => accept"));
    }
}
