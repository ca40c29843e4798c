//! Context-free grammars with numbered symbols and productions.
//!
//! A `Grammar` is always augmented: terminal `0` is the end of input,
//! nonterminal `0` is the synthetic start symbol and rule `0` is
//! `$start := S`, where `S` is the start symbol of the user grammar.

use crate::{
    types::{Map, Set},
    util::display_fn,
};
use std::fmt;

macro_rules! symbol_ids {
    ($($(#[$m:meta])* $name:ident;)*) => {$(
        $(#[$m])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u16);

        impl $name {
            pub const fn from_raw(raw: u16) -> Self {
                Self(raw)
            }

            pub const fn into_raw(self) -> u16 {
                self.0
            }
        }
    )*};
}

symbol_ids! {
    TerminalID;
    NonterminalID;
    /// Identifies a production, in declaration order.
    RuleID;
}

impl TerminalID {
    /// The end of input.
    pub const EOI: Self = Self(0);
}

impl NonterminalID {
    /// Left-hand side of the augmented rule.
    pub const START: Self = Self(0);
}

impl RuleID {
    /// The augmented rule `$start := S`.
    pub const ACCEPT: Self = Self(0);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: String,
    precedence: Option<Precedence>,
}

impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: String,
}

impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A production `left := right`.
#[derive(Debug)]
pub struct Rule {
    id: RuleID,
    left: NonterminalID,
    right: Vec<SymbolID>,
    precedence: Option<Precedence>,
    order: usize,
}

impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    pub fn left(&self) -> NonterminalID {
        self.left
    }

    pub fn right(&self) -> &[SymbolID] {
        &self.right
    }

    /// Position of this production among the declared ones, starting at 1.
    /// The augmented rule has order 0.
    ///
    /// Reduce/reduce conflicts are resolved in favor of the smallest one.
    pub fn order(&self) -> usize {
        self.order
    }

    /// The precedence used when this production takes part in a conflict.
    ///
    /// An explicit `%prec` wins, otherwise the precedence of the last
    /// terminal on the right-hand side is inherited.
    pub fn precedence(&self, g: &Grammar) -> Option<Precedence> {
        self.precedence.or_else(|| {
            let last = self.right.iter().rev().find_map(|symbol| match symbol {
                SymbolID::T(t) => Some(*t),
                SymbolID::N(..) => None,
            })?;
            g.terminals.get(&last)?.precedence()
        })
    }

    /// Render as `LHS := R1 R2 R3`, or `LHS := @empty`.
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} :=", g.symbol_name(SymbolID::N(self.left)))?;
            match &self.right[..] {
                [] => f.write_str(" @empty"),
                right => right
                    .iter()
                    .try_for_each(|symbol| write!(f, " {}", g.symbol_name(*symbol))),
            }
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub struct Precedence {
    /// Larger binds tighter.
    pub priority: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: u16, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{} {}", self.assoc, self.priority)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Nonassoc => "nonassoc",
        })
    }
}

/// An augmented grammar, ready to be turned into an automaton.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub rules: Map<RuleID, Rule>,
    pub start_symbol: NonterminalID,
    names: Map<String, SymbolID>,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for terminal in self.terminals.values() {
            match terminal.precedence() {
                Some(prec) => writeln!(f, "%token {} {}", terminal, prec)?,
                None => writeln!(f, "%token {}", terminal)?,
            }
        }
        writeln!(f, "%start {}", self.symbol_name(SymbolID::N(self.start_symbol)))?;
        for rule in self.rules.values() {
            write!(f, "{:>3}: {}", rule.order(), rule.display(self))?;
            if let Some(prec) = rule.precedence {
                write!(f, " %prec({})", prec)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Grammar {
    /// Build a grammar by declaring its symbols and productions in `f`.
    ///
    /// The start symbol defaults to the first declared nonterminal.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef::new();
        f(&mut def)?;
        def.finish()
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> impl fmt::Display + '_ {
        let name = match symbol {
            SymbolID::T(t) => self.terminals.get(&t).map(Terminal::name),
            SymbolID::N(n) => self.nonterminals.get(&n).map(Nonterminal::name),
        };
        display_fn(move |f| f.write_str(name.unwrap_or("<unknown>")))
    }

    pub fn terminal_by_name(&self, name: &str) -> Option<TerminalID> {
        match self.names.get(name)? {
            SymbolID::T(t) => Some(*t),
            SymbolID::N(..) => None,
        }
    }

    pub fn nonterminal_by_name(&self, name: &str) -> Option<NonterminalID> {
        match self.names.get(name)? {
            SymbolID::N(n) => Some(*n),
            SymbolID::T(..) => None,
        }
    }

    /// The productions whose left-hand side is `left`, in declaration order.
    pub fn rules_of(&self, left: NonterminalID) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.values().filter(move |rule| rule.left == left)
    }
}

/// Collects the declarations passed to [`Grammar::define`].
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Map<RuleID, Rule>,
    names: Map<String, SymbolID>,
    productions: Set<(NonterminalID, Vec<SymbolID>)>,
    start: Option<NonterminalID>,
}

impl GrammarDef {
    fn new() -> Self {
        let mut terminals = Map::default();
        terminals.insert(
            TerminalID::EOI,
            Terminal {
                id: TerminalID::EOI,
                name: "$eoi".into(),
                precedence: None,
            },
        );
        let mut nonterminals = Map::default();
        nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name: "$start".into(),
            },
        );
        Self {
            terminals,
            nonterminals,
            rules: Map::default(),
            names: Map::default(),
            productions: Set::default(),
            start: None,
        }
    }

    fn claim_name(&mut self, name: &str, symbol: SymbolID) -> Result<(), GrammarDefError> {
        check_name(name)?;
        if self.names.contains_key(name) {
            return Err(GrammarDefError::Redeclared { name: name.into() });
        }
        self.names.insert(name.into(), symbol);
        Ok(())
    }

    /// Declare a terminal, optionally with the precedence used for
    /// resolving shift/reduce conflicts on it.
    pub fn terminal(
        &mut self,
        name: &str,
        precedence: Option<Precedence>,
    ) -> Result<TerminalID, GrammarDefError> {
        let id = next_id(self.terminals.len(), "terminal symbols").map(TerminalID)?;
        self.claim_name(name, SymbolID::T(id))?;
        self.terminals.insert(
            id,
            Terminal {
                id,
                name: name.into(),
                precedence,
            },
        );
        Ok(id)
    }

    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarDefError> {
        let id = next_id(self.nonterminals.len(), "nonterminal symbols").map(NonterminalID)?;
        self.claim_name(name, SymbolID::N(id))?;
        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.into(),
            },
        );
        Ok(id)
    }

    /// Add the production `left := right`.
    ///
    /// The order of the calls decides the order of the productions.
    pub fn rule<I>(
        &mut self,
        left: NonterminalID,
        right: I,
        precedence: Option<Precedence>,
    ) -> Result<RuleID, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        let right: Vec<SymbolID> = right.into_iter().collect();
        if !self.productions.insert((left, right.clone())) {
            let left = self.nonterminals.get(&left).map_or("<unknown>", |n| n.name());
            return Err(GrammarDefError::DuplicateRule { left: left.into() });
        }

        let order = self.rules.len() + 1;
        let id = next_id(order, "production rules").map(RuleID)?;
        self.rules.insert(
            id,
            Rule {
                id,
                left,
                right,
                precedence,
                order,
            },
        );
        Ok(id)
    }

    /// Override the start symbol.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarDefError> {
        if !self.nonterminals.contains_key(&symbol) || symbol == NonterminalID::START {
            return Err(GrammarDefError::InvalidStart);
        }
        self.start = Some(symbol);
        Ok(())
    }

    fn finish(mut self) -> Result<Grammar, GrammarDefError> {
        let start = self
            .start
            .or_else(|| {
                self.nonterminals
                    .keys()
                    .copied()
                    .find(|&n| n != NonterminalID::START)
            })
            .ok_or(GrammarDefError::NoNonterminals)?;

        self.rules.insert(
            RuleID::ACCEPT,
            Rule {
                id: RuleID::ACCEPT,
                left: NonterminalID::START,
                right: vec![SymbolID::N(start)],
                precedence: None,
                order: 0,
            },
        );
        self.rules.sort_keys();

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules: self.rules,
            start_symbol: start,
            names: self.names,
        })
    }
}

/// The raw identifier following `count` allocated ones, reserved `0` included.
fn next_id(count: usize, what: &'static str) -> Result<u16, GrammarDefError> {
    u16::try_from(count).map_err(|_| GrammarDefError::TooMany { what })
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GrammarDefError {
    #[error("invalid symbol name `{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("the symbol `{name}' is declared twice")]
    Redeclared { name: String },

    #[error("a production of `{left}' is declared twice")]
    DuplicateRule { left: String },

    #[error("the start symbol must be a declared nonterminal")]
    InvalidStart,

    #[error("the grammar declares no nonterminal")]
    NoNonterminals,

    #[error("too many {what}")]
    TooMany { what: &'static str },
}

fn check_name(name: &str) -> Result<(), GrammarDefError> {
    let reason = if name.is_empty() {
        "empty"
    } else if name.starts_with('$') {
        "the `$' prefix is reserved"
    } else if name.contains(char::is_whitespace) {
        "contains whitespace"
    } else {
        return Ok(());
    };
    Err(GrammarDefError::InvalidName {
        name: name.into(),
        reason,
    })
}
