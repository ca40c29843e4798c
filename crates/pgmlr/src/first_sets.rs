//! FIRST sets and nullability of nonterminals.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID},
    types::{Map, TerminalSet},
};

#[derive(Debug, Default, Clone)]
struct Entry {
    nullable: bool,
    first: TerminalSet,
}

#[derive(Debug)]
pub struct FirstSets {
    entries: Map<NonterminalID, Entry>,
}

impl FirstSets {
    /// Compute nullability and FIRST of every nonterminal by iterating the
    /// productions until nothing changes.
    #[tracing::instrument(skip_all)]
    pub fn new(grammar: &Grammar) -> Self {
        let mut this = Self {
            entries: grammar
                .nonterminals
                .keys()
                .map(|&n| (n, Entry::default()))
                .collect(),
        };

        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for rule in grammar.rules.values() {
                let (first, nullable) = this.scan(rule.right());
                let Some(entry) = this.entries.get_mut(&rule.left()) else {
                    continue;
                };
                changed |= entry.first.union_with(&first);
                if nullable && !entry.nullable {
                    entry.nullable = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        tracing::trace!("first sets converged after {} rounds", rounds);

        this
    }

    pub fn is_nullable(&self, symbol: NonterminalID) -> bool {
        self.entries.get(&symbol).map_or(false, |e| e.nullable)
    }

    /// FIRST of `symbols`, and whether all of them are nullable.
    fn scan(&self, symbols: &[SymbolID]) -> (TerminalSet, bool) {
        let mut first = TerminalSet::default();
        for symbol in symbols {
            match symbol {
                SymbolID::T(t) => {
                    first.insert(*t);
                    return (first, false);
                }
                SymbolID::N(n) => match self.entries.get(n) {
                    Some(entry) => {
                        first.union_with(&entry.first);
                        if !entry.nullable {
                            return (first, false);
                        }
                    }
                    None => return (first, false),
                },
            }
        }
        (first, true)
    }

    /// `FIRST(prefix lookaheads)`, the lookaheads of the items spawned by a closure step.
    pub fn get(&self, prefix: &[SymbolID], lookaheads: &TerminalSet) -> TerminalSet {
        let (mut first, nullable) = self.scan(prefix);
        if nullable {
            first.union_with(lookaheads);
        }
        first
    }
}
