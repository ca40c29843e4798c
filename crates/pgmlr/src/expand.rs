//! Instantiation of parameterized rules into a plain grammar.

use crate::{
    grammar::{Grammar, GrammarDefError, Precedence, SymbolID},
    sort_check::Sorts,
    syntax::{self, Parameter},
    types::{Map, Queue, Set},
};

/// Instances nested deeper than this are taken as a sign of divergence.
const MAX_DEPTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("the expansion of `{instance}' does not terminate")]
    Diverging { instance: String },

    #[error("no sort was inferred for the rule `{rule}'")]
    MissingSort { rule: String },

    #[error("unknown precedence level `{name}'")]
    UnknownPrecedence { name: String },

    #[error("internal error at `{symbol}': {msg}")]
    Internal { symbol: String, msg: &'static str },

    #[error(transparent)]
    Grammar(#[from] GrammarDefError),
}

/// Instantiate the rules of `source` reachable from its start symbol.
///
/// Every distinct application `f(a1,...,an)` becomes a nonterminal named
/// after it. Productions are declared ordered by their source rule and
/// branch, then by the discovery order of the instance.
#[tracing::instrument(skip_all)]
pub fn expand(source: &syntax::Grammar, sorts: &Sorts) -> Result<Grammar, ExpandError> {
    let mut expander = Expander::new(source, sorts)?;

    let start = match source.start.as_deref() {
        Some(start) => start,
        None => source
            .rules
            .first()
            .map(|rule| rule.name.as_str())
            .ok_or_else(|| ExpandError::Internal {
                symbol: "$start".into(),
                msg: "no start symbol",
            })?,
    };
    expander.instantiate(Parameter::var(start))?;

    while let Some(index) = expander.queue.pop() {
        expander.process(index)?;
    }

    for (index, rule) in source.rules.iter().enumerate() {
        if !expander.instances.values().any(|inst| inst.rule == index) {
            tracing::warn!("the rule `{}' is never used", rule.name);
        }
    }

    expander.finish()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum Sym {
    T(usize),
    N(usize),
}

#[derive(Debug)]
struct Instance<'g> {
    rule: usize,
    env: Map<&'g str, Parameter>,
}

#[derive(Debug)]
struct PendingRule {
    /// (source rule, branch, instance)
    key: (usize, usize, usize),
    left: usize,
    right: Vec<Sym>,
    precedence: Option<Precedence>,
}

struct Expander<'g> {
    source: &'g syntax::Grammar,
    sorts: &'g Sorts,
    tokens: Map<&'g str, usize>,
    rules: Map<&'g str, usize>,
    precs: Map<&'g str, Precedence>,
    instances: Map<Parameter, Instance<'g>>,
    queue: Queue<usize>,
    pending: Vec<PendingRule>,
    seen: Set<(usize, Vec<Sym>)>,
}

impl<'g> Expander<'g> {
    fn new(source: &'g syntax::Grammar, sorts: &'g Sorts) -> Result<Self, ExpandError> {
        let mut precs = Map::default();
        for (level, desc) in source.precs.iter().enumerate() {
            let priority = u16::try_from(level).map_err(|_| ExpandError::Internal {
                symbol: desc.idents.first().cloned().unwrap_or_default(),
                msg: "too many precedence levels",
            })?;
            for ident in &desc.idents {
                precs
                    .entry(ident.as_str())
                    .or_insert(Precedence::new(priority, desc.assoc));
            }
        }

        Ok(Self {
            source,
            sorts,
            tokens: source
                .tokens
                .iter()
                .enumerate()
                .map(|(i, token)| (token.name.as_str(), i))
                .collect(),
            rules: source
                .rules
                .iter()
                .enumerate()
                .map(|(i, rule)| (rule.name.as_str(), i))
                .collect(),
            precs,
            instances: Map::default(),
            queue: Queue::default(),
            pending: vec![],
            seen: Set::default(),
        })
    }

    /// Return the index of the instance for the closed application `closed`,
    /// registering it if it is new.
    fn instantiate(&mut self, closed: Parameter) -> Result<usize, ExpandError> {
        if let Some(index) = self.instances.get_index_of(&closed) {
            return Ok(index);
        }

        let source = self.source;
        let name = closed.head();
        let (rule_index, rule) = match self.rules.get(name) {
            Some(&index) => (index, &source.rules[index]),
            None => {
                return Err(ExpandError::Internal {
                    symbol: name.to_owned(),
                    msg: "not a rule",
                })
            }
        };
        let sort = self
            .sorts
            .get(name)
            .ok_or_else(|| ExpandError::MissingSort {
                rule: name.to_owned(),
            })?;
        if sort.arity() != closed.args().len() || rule.params.len() != closed.args().len() {
            return Err(ExpandError::Internal {
                symbol: closed.to_string(),
                msg: "wrong number of arguments",
            });
        }
        if closed.depth() > MAX_DEPTH {
            return Err(ExpandError::Diverging {
                instance: closed.to_string(),
            });
        }

        let env = rule
            .params
            .iter()
            .map(String::as_str)
            .zip(closed.args().iter().cloned())
            .collect();
        tracing::trace!("instantiate {}", closed);
        let (index, _) = self.instances.insert_full(
            closed,
            Instance {
                rule: rule_index,
                env,
            },
        );
        self.queue.push(index);
        Ok(index)
    }

    fn process(&mut self, index: usize) -> Result<(), ExpandError> {
        let (rule_index, env) = match self.instances.get_index(index) {
            Some((_, inst)) => (inst.rule, inst.env.clone()),
            None => {
                return Err(ExpandError::Internal {
                    symbol: format!("#{}", index),
                    msg: "unknown instance",
                })
            }
        };
        let source = self.source;
        let rule = &source.rules[rule_index];

        for (branch, production) in rule.productions.iter().enumerate() {
            let mut right = Vec::with_capacity(production.elems.len());
            for elem in &production.elems {
                let closed = subst(elem, &env)?;
                right.push(self.resolve(closed)?);
            }

            let precedence = match &production.prec {
                Some(name) => Some(self.precs.get(name.as_str()).copied().ok_or_else(|| {
                    ExpandError::UnknownPrecedence { name: name.clone() }
                })?),
                None => None,
            };

            if !self.seen.insert((index, right.clone())) {
                tracing::warn!(
                    "dropping a duplicated production of `{}'",
                    self.instance_name(index)
                );
                continue;
            }

            self.pending.push(PendingRule {
                key: (rule_index, branch, index),
                left: index,
                right,
                precedence,
            });
        }

        Ok(())
    }

    fn resolve(&mut self, closed: Parameter) -> Result<Sym, ExpandError> {
        if closed.args().is_empty() {
            if let Some(&index) = self.tokens.get(closed.head()) {
                return Ok(Sym::T(index));
            }
        }
        self.instantiate(closed).map(Sym::N)
    }

    fn instance_name(&self, index: usize) -> String {
        self.instances
            .get_index(index)
            .map(|(p, _)| p.to_string())
            .unwrap_or_default()
    }

    fn finish(self) -> Result<Grammar, ExpandError> {
        let Self {
            source,
            precs,
            instances,
            mut pending,
            ..
        } = self;
        pending.sort_by_key(|rule| rule.key);

        let grammar = Grammar::define(|g| {
            let terminals = source
                .tokens
                .iter()
                .map(|token| g.terminal(&token.name, precs.get(token.name.as_str()).copied()))
                .collect::<Result<Vec<_>, _>>()?;

            let nonterminals = instances
                .keys()
                .map(|p| g.nonterminal(&p.to_string()))
                .collect::<Result<Vec<_>, _>>()?;

            for rule in &pending {
                let right = rule.right.iter().map(|sym| match *sym {
                    Sym::T(i) => SymbolID::T(terminals[i]),
                    Sym::N(i) => SymbolID::N(nonterminals[i]),
                });
                g.rule(nonterminals[rule.left], right, rule.precedence)?;
            }

            if let Some(&start) = nonterminals.first() {
                g.start_symbol(start)?;
            }

            Ok(())
        })?;

        tracing::debug!(
            "expanded into {} nonterminals and {} rules",
            grammar.nonterminals.len() - 1,
            grammar.rules.len() - 1
        );

        Ok(grammar)
    }
}

/// Replace the formal parameters in `param` with their actuals.
///
/// A formal in head position must be bound to a bare name, which then
/// becomes the head of the application.
fn subst(param: &Parameter, env: &Map<&str, Parameter>) -> Result<Parameter, ExpandError> {
    match param {
        Parameter::Var(name) => Ok(env
            .get(name.as_str())
            .cloned()
            .unwrap_or_else(|| param.clone())),
        Parameter::App(name, args) => {
            let args = args
                .iter()
                .map(|arg| subst(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            let head = match env.get(name.as_str()) {
                None => name.clone(),
                Some(Parameter::Var(actual)) => actual.clone(),
                Some(actual) => {
                    return Err(ExpandError::Internal {
                        symbol: actual.to_string(),
                        msg: "applied an argument that is not a symbol",
                    })
                }
            };
            if args.is_empty() {
                Ok(Parameter::Var(head))
            } else {
                Ok(Parameter::App(head, args))
            }
        }
    }
}
