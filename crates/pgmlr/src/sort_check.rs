//! Sort inference for parameterized grammars.

use crate::{
    sort::{ground, GroundSort, Sort, SortUnifier, TooManyVariables, UnifyError, Variable},
    syntax::{Grammar, Parameter, RuleDesc},
    types::Map,
};

#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("undefined symbol `{symbol}'")]
    Undefined { symbol: String },

    #[error("the symbol `{symbol}' is defined more than once")]
    Duplicate { symbol: String },

    #[error("the grammar has no rules to start from")]
    NoStartSymbol,

    #[error(transparent)]
    TooManyVariables(#[from] TooManyVariables),

    #[error("ill-sorted symbol `{symbol}': expected {expected}, found {found}")]
    IllSorted {
        symbol: String,
        expected: Sort,
        found: Sort,
        #[source]
        source: UnifyError,
    },

    #[error("the sort of `{symbol}' would be cyclic ({found} against {expected})")]
    Cyclic {
        symbol: String,
        expected: Sort,
        found: Sort,
        #[source]
        source: UnifyError,
    },
}

/// The inferred sorts of the rules in a grammar.
#[derive(Debug, Default)]
pub struct Sorts {
    map: Map<String, GroundSort>,
}

impl Sorts {
    pub fn get(&self, name: &str) -> Option<&GroundSort> {
        self.map.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroundSort)> + '_ {
        self.map.iter().map(|(name, sort)| (name.as_str(), sort))
    }
}

/// Infer the sort of every rule in `grammar`.
///
/// Tokens have the sort `*`, as does every producer of a production and
/// the start symbol. Formal parameters left unconstrained are grounded to `*`.
#[tracing::instrument(skip_all)]
pub fn check(grammar: &Grammar) -> Result<Sorts, SortError> {
    let mut checker = SortChecker {
        unifier: SortUnifier::new(),
        globals: Map::default(),
    };

    let star = checker.unifier.star();
    for token in &grammar.tokens {
        checker.declare(&token.name, star)?;
    }

    let mut formals = Vec::with_capacity(grammar.rules.len());
    for rule in &grammar.rules {
        let mut locals = Map::default();
        for param in &rule.params {
            let v = checker.unifier.fresh()?;
            if locals.insert(param.as_str(), v).is_some() {
                return Err(SortError::Duplicate {
                    symbol: param.clone(),
                });
            }
        }
        let head = checker.unifier.arrow(locals.values().copied())?;
        checker.declare(&rule.name, head)?;
        formals.push(locals);
    }

    for (rule, locals) in grammar.rules.iter().zip(&formals) {
        checker.check_rule(rule, locals)?;
    }

    let start = match grammar.start.as_deref() {
        Some(start) => start,
        None => grammar
            .rules
            .first()
            .map(|rule| rule.name.as_str())
            .ok_or(SortError::NoStartSymbol)?,
    };
    if !grammar.rules.iter().any(|rule| rule.name == start) {
        return Err(SortError::Undefined {
            symbol: start.to_owned(),
        });
    }
    let v = checker.lookup(&Map::default(), start)?;
    checker.unify_at(start, v, star)?;

    let mut sorts = Sorts::default();
    for rule in &grammar.rules {
        let v = checker.lookup(&Map::default(), &rule.name)?;
        let sort = ground(&checker.unifier.decode(v));
        tracing::debug!(rule = %rule.name, sort = %sort, "inferred sort");
        sorts.map.insert(rule.name.clone(), sort);
    }
    Ok(sorts)
}

struct SortChecker<'g> {
    unifier: SortUnifier,
    globals: Map<&'g str, Variable>,
}

impl<'g> SortChecker<'g> {
    fn declare(&mut self, name: &'g str, v: Variable) -> Result<(), SortError> {
        if self.globals.insert(name, v).is_some() {
            return Err(SortError::Duplicate {
                symbol: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Formal parameters shadow global symbols.
    fn lookup(&self, locals: &Map<&'g str, Variable>, name: &str) -> Result<Variable, SortError> {
        locals
            .get(name)
            .or_else(|| self.globals.get(name))
            .copied()
            .ok_or_else(|| SortError::Undefined {
                symbol: name.to_owned(),
            })
    }

    fn check_rule(
        &mut self,
        rule: &'g RuleDesc,
        locals: &Map<&'g str, Variable>,
    ) -> Result<(), SortError> {
        let star = self.unifier.star();
        for production in &rule.productions {
            for elem in &production.elems {
                self.check_parameter(locals, elem, star)?;
            }
        }
        Ok(())
    }

    fn check_parameter(
        &mut self,
        locals: &Map<&'g str, Variable>,
        param: &Parameter,
        expected: Variable,
    ) -> Result<(), SortError> {
        match param {
            Parameter::Var(name) => {
                let v = self.lookup(locals, name)?;
                self.unify_at(name, v, expected)
            }
            Parameter::App(name, args) => {
                let head = self.lookup(locals, name)?;
                let operands = args
                    .iter()
                    .map(|_| self.unifier.fresh())
                    .collect::<Result<Vec<Variable>, _>>()?;
                let shape = self.unifier.arrow(operands.iter().copied())?;
                self.unify_at(name, head, shape)?;
                for (arg, operand) in args.iter().zip(operands) {
                    self.check_parameter(locals, arg, operand)?;
                }
                let star = self.unifier.star();
                self.unify_at(&param.to_string(), star, expected)
            }
        }
    }

    fn unify_at(&mut self, symbol: &str, found: Variable, expected: Variable) -> Result<(), SortError> {
        self.unifier.unify(found, expected).map_err(|source| {
            let (v1, v2) = match source {
                UnifyError::Unify(v1, v2) | UnifyError::Occurs(v1, v2) => (v1, v2),
            };
            let found = self.unifier.decode(v1);
            let expected = self.unifier.decode(v2);
            let symbol = symbol.to_owned();
            match source {
                UnifyError::Unify(..) => SortError::IllSorted {
                    symbol,
                    expected,
                    found,
                    source,
                },
                UnifyError::Occurs(..) => SortError::Cyclic {
                    symbol,
                    expected,
                    found,
                    source,
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Parameter, Production};

    fn var(name: &str) -> Parameter {
        Parameter::var(name)
    }

    fn app<const N: usize>(name: &str, args: [Parameter; N]) -> Parameter {
        Parameter::app(name, args)
    }

    fn lists() -> Grammar {
        let mut g = Grammar::default();
        g.token("A").token("COMMA");
        g.rule(
            "list",
            &["X"],
            [
                Production::new([]),
                Production::new([var("X"), app("list", [var("X")])]),
            ],
        );
        g.rule(
            "separated_list",
            &["S", "X"],
            [
                Production::new([var("X")]),
                Production::new([var("X"), var("S"), app("separated_list", [var("S"), var("X")])]),
            ],
        );
        g
    }

    #[test]
    fn first_order_rules() {
        let mut g = lists();
        g.rule(
            "main",
            &[],
            [Production::new([
                app("list", [var("A")]),
                app("separated_list", [var("COMMA"), var("A")]),
            ])],
        );
        g.start("main");

        let sorts = check(&g).unwrap();
        assert_eq!(sorts.get("list").unwrap().to_string(), "(*) -> *");
        assert_eq!(sorts.get("separated_list").unwrap().to_string(), "(*, *) -> *");
        assert_eq!(sorts.get("main"), Some(&GroundSort::STAR));
        assert_eq!(sorts.get("A"), None);
    }

    #[test]
    fn higher_order_parameter() {
        let mut g = Grammar::default();
        g.token("A");
        g.rule("main", &[], [Production::new([app("apply", [var("wrap"), var("A")])])]);
        g.rule("apply", &["F", "X"], [Production::new([app("F", [var("X")])])]);
        g.rule("wrap", &["Y"], [Production::new([var("Y")])]);

        let sorts = check(&g).unwrap();
        assert_eq!(sorts.get("apply").unwrap().to_string(), "((*) -> *, *) -> *");
        assert_eq!(sorts.get("wrap").unwrap().arity(), 1);
    }

    #[test]
    fn unused_parameter_is_grounded() {
        let mut g = Grammar::default();
        g.token("A");
        g.rule("main", &[], [Production::new([app("ignore", [var("A")])])]);
        g.rule("ignore", &["X"], [Production::new([var("A")])]);

        let sorts = check(&g).unwrap();
        assert_eq!(sorts.get("ignore").unwrap().to_string(), "(*) -> *");
    }

    #[test]
    fn wrong_number_of_arguments() {
        let mut g = lists();
        g.rule("main", &[], [Production::new([app("list", [var("A"), var("A")])])]);
        g.start("main");

        match check(&g) {
            Err(SortError::IllSorted {
                symbol,
                expected,
                found,
                source: UnifyError::Unify(..),
            }) => {
                assert_eq!(symbol, "list");
                assert_eq!(found.arity(), Some(1));
                assert_eq!(expected.arity(), Some(2));
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn parameterized_rule_as_producer() {
        let mut g = lists();
        g.rule("main", &[], [Production::new([var("list")])]);
        g.start("main");
        assert!(matches!(
            check(&g),
            Err(SortError::IllSorted { symbol, .. }) if symbol == "list"
        ));
    }

    #[test]
    fn applying_a_token() {
        let mut g = Grammar::default();
        g.token("A");
        g.rule("main", &[], [Production::new([app("A", [var("A")])])]);
        assert!(matches!(
            check(&g),
            Err(SortError::IllSorted { symbol, .. }) if symbol == "A"
        ));
    }

    #[test]
    fn parameterized_start_symbol() {
        let mut g = lists();
        g.start("list");
        assert!(matches!(
            check(&g),
            Err(SortError::IllSorted { symbol, .. }) if symbol == "list"
        ));
    }

    #[test]
    fn self_application_is_cyclic() {
        let mut g = Grammar::default();
        g.token("A");
        g.rule("main", &[], [Production::new([var("A")])]);
        g.rule("twice", &["X"], [Production::new([app("X", [var("X")])])]);
        assert!(matches!(
            check(&g),
            Err(SortError::Cyclic {
                source: UnifyError::Occurs(..),
                ..
            })
        ));
    }

    #[test]
    fn undefined_symbols() {
        let mut g = Grammar::default();
        g.token("A");
        g.rule("main", &[], [Production::new([var("B")])]);
        assert!(matches!(
            check(&g),
            Err(SortError::Undefined { symbol }) if symbol == "B"
        ));

        let mut g = Grammar::default();
        g.token("A");
        g.rule("main", &[], [Production::new([var("A")])]);
        g.start("A");
        assert!(matches!(check(&g), Err(SortError::Undefined { .. })));

        assert!(matches!(
            check(&Grammar::default()),
            Err(SortError::NoStartSymbol)
        ));
    }

    #[test]
    fn duplicate_symbols() {
        let mut g = Grammar::default();
        g.token("A");
        g.rule("A", &[], [Production::new([])]);
        assert!(matches!(
            check(&g),
            Err(SortError::Duplicate { symbol }) if symbol == "A"
        ));

        let mut g = Grammar::default();
        g.rule("pair", &["X", "X"], [Production::new([var("X")])]);
        assert!(matches!(
            check(&g),
            Err(SortError::Duplicate { symbol }) if symbol == "X"
        ));
    }

    #[test]
    fn formal_parameters_shadow_globals() {
        let mut g = Grammar::default();
        g.token("A").token("X");
        g.rule("main", &[], [Production::new([var("X"), app("apply", [var("wrap")])])]);
        g.rule("apply", &["X"], [Production::new([app("X", [var("A")])])]);
        g.rule("wrap", &["Y"], [Production::new([var("Y")])]);

        let sorts = check(&g).unwrap();
        assert_eq!(sorts.get("apply").unwrap().to_string(), "((*) -> *) -> *");
    }
}
