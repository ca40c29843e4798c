//! Shared fixtures and helpers for the integration tests and benchmarks.

pub mod grammars;

use pgmlr::{
    grammar::{Grammar, GrammarDef, GrammarDefError, SymbolID, TerminalID},
    Automaton, Config,
};
use pgmlr_runtime::engine::{ParseEngine, ParseError, ParseEvent};
use std::collections::VecDeque;

pub type Fixture = fn(&mut GrammarDef) -> Result<(), GrammarDefError>;

/// The plain grammar fixtures, with their names.
pub const FIXTURES: &[(&str, Fixture)] = &[
    ("g_simple1", grammars::g_simple1),
    ("g_simple2", grammars::g_simple2),
    ("g1", grammars::g1),
    ("g2", grammars::g2),
    ("g4", grammars::g4),
    ("pager_weak", grammars::pager_weak),
    ("pager_conflicted", grammars::pager_conflicted),
    ("arithmetic_prec", grammars::arithmetic_prec),
    ("min_caml", grammars::min_caml),
];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build the automata of `grammar` in the Canonical, PGM and LALR modes.
pub fn generate_all(grammar: &Grammar) -> [Automaton; 3] {
    let generate = |configure: fn(&mut Config) -> &mut Config| {
        let mut config = Config::new();
        configure(&mut config);
        config
            .generate(grammar)
            .unwrap_or_else(|err| panic!("failed to build the automaton: {}", err))
    };
    [
        generate(Config::use_canonical),
        generate(Config::use_pgm),
        generate(Config::use_lalr),
    ]
}

/// Run the automaton on `input` and report whether it has been accepted.
pub fn accepts(automaton: &Automaton, input: &[TerminalID]) -> Result<bool, ParseError> {
    let mut engine = ParseEngine::new(automaton);
    let mut tokens = input.iter().copied();
    loop {
        match engine.resume()? {
            ParseEvent::InputNeeded => match tokens.next() {
                Some(token) => engine.offer_token(token)?,
                None => engine.offer_eoi()?,
            },
            ParseEvent::Accepted => return Ok(true),
            ParseEvent::Rejected => return Ok(false),
            _ => (),
        }
    }
}

/// The terminal symbols of `grammar`, except the end of input.
pub fn alphabet(grammar: &Grammar) -> Vec<TerminalID> {
    grammar
        .terminals
        .keys()
        .copied()
        .filter(|t| *t != TerminalID::EOI)
        .collect()
}

/// Every string over `alphabet` whose length is at most `max_len`.
pub fn all_strings(alphabet: &[TerminalID], max_len: usize) -> Vec<Vec<TerminalID>> {
    let mut strings = vec![vec![]];
    let mut last = vec![vec![]];
    for _ in 0..max_len {
        let mut next = vec![];
        for prefix in &last {
            for t in alphabet {
                let mut s: Vec<TerminalID> = prefix.clone();
                s.push(*t);
                next.push(s);
            }
        }
        strings.extend(next.iter().cloned());
        last = next;
    }
    strings
}

/// Sentences of `grammar` no longer than `max_len`, found by expanding the
/// leftmost nonterminal breadth-first. At most `limit` sentences are returned.
pub fn sentences(grammar: &Grammar, max_len: usize, limit: usize) -> Vec<Vec<TerminalID>> {
    let mut found = vec![];
    let mut queue: VecDeque<Vec<SymbolID>> = VecDeque::new();
    queue.push_back(vec![SymbolID::N(grammar.start_symbol)]);
    let mut steps = 0;
    while let Some(form) = queue.pop_front() {
        steps += 1;
        if found.len() >= limit || steps > limit * 100 {
            break;
        }
        let terminals = form.iter().filter(|s| matches!(s, SymbolID::T(..))).count();
        if terminals > max_len || form.len() > 2 * max_len + 4 {
            continue;
        }
        let Some(pos) = form.iter().position(|s| matches!(s, SymbolID::N(..))) else {
            found.push(
                form.iter()
                    .filter_map(|s| match s {
                        SymbolID::T(t) => Some(*t),
                        SymbolID::N(..) => None,
                    })
                    .collect(),
            );
            continue;
        };
        let SymbolID::N(n) = form[pos] else {
            continue;
        };
        for rule in grammar.rules_of(n) {
            let mut next = form[..pos].to_vec();
            next.extend_from_slice(rule.right());
            next.extend_from_slice(&form[pos + 1..]);
            queue.push_back(next);
        }
    }
    found
}
