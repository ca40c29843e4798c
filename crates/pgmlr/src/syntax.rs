//! Parameterized grammar descriptions.
//!
//! This is the shape in which a grammar front end hands rules over, before
//! their sorts are checked and parameterized rules are instantiated.

use crate::{grammar::Assoc, util::write_separated};
use std::fmt;

#[derive(Debug, Default)]
pub struct Grammar {
    pub tokens: Vec<TokenDesc>,
    /// Precedence levels, from the lowest priority to the highest.
    pub precs: Vec<PrecDesc>,
    pub rules: Vec<RuleDesc>,
    /// The start symbol. When omitted, the first rule is used.
    pub start: Option<String>,
}

#[derive(Debug)]
pub struct TokenDesc {
    pub name: String,
}

/// One precedence level, shared by tokens and `%prec` pseudo-tokens.
#[derive(Debug)]
pub struct PrecDesc {
    pub assoc: Assoc,
    pub idents: Vec<String>,
}

#[derive(Debug)]
pub struct RuleDesc {
    pub name: String,
    pub params: Vec<String>,
    pub productions: Vec<Production>,
}

#[derive(Debug, Default)]
pub struct Production {
    pub elems: Vec<Parameter>,
    /// The name of a precedence level overriding that of the production.
    pub prec: Option<String>,
}

/// A symbol reference, possibly applied to actual parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Parameter {
    Var(String),
    App(String, Vec<Parameter>),
}

impl Parameter {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn app<I>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = Parameter>,
    {
        Self::App(name.into(), args.into_iter().collect())
    }

    /// The name in head position.
    pub fn head(&self) -> &str {
        match self {
            Self::Var(name) | Self::App(name, _) => name,
        }
    }

    pub fn args(&self) -> &[Parameter] {
        match self {
            Self::Var(..) => &[],
            Self::App(_, args) => args,
        }
    }

    /// The nesting depth of applications in this parameter.
    pub fn depth(&self) -> usize {
        match self {
            Self::Var(..) => 0,
            Self::App(_, args) => 1 + args.iter().map(Self::depth).max().unwrap_or(0),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => f.write_str(name),
            Self::App(name, args) if args.is_empty() => f.write_str(name),
            Self::App(name, args) => {
                write!(f, "{}(", name)?;
                write_separated(f, ",", args)?;
                f.write_str(")")
            }
        }
    }
}

impl Production {
    pub fn new<I>(elems: I) -> Self
    where
        I: IntoIterator<Item = Parameter>,
    {
        Self {
            elems: elems.into_iter().collect(),
            prec: None,
        }
    }

    pub fn with_prec(mut self, prec: impl Into<String>) -> Self {
        self.prec = Some(prec.into());
        self
    }
}

impl Grammar {
    pub fn token(&mut self, name: impl Into<String>) -> &mut Self {
        self.tokens.push(TokenDesc { name: name.into() });
        self
    }

    /// Declare a precedence level above all previously declared ones.
    pub fn prec<I, S>(&mut self, assoc: Assoc, idents: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precs.push(PrecDesc {
            assoc,
            idents: idents.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn rule<I>(&mut self, name: impl Into<String>, params: &[&str], productions: I) -> &mut Self
    where
        I: IntoIterator<Item = Production>,
    {
        self.rules.push(RuleDesc {
            name: name.into(),
            params: params.iter().map(|&p| p.to_owned()).collect(),
            productions: productions.into_iter().collect(),
        });
        self
    }

    pub fn start(&mut self, name: impl Into<String>) -> &mut Self {
        self.start = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parameters() {
        let p = Parameter::app(
            "separated_list",
            [Parameter::var("COMMA"), Parameter::app("option", [Parameter::var("expr")])],
        );
        assert_eq!(p.to_string(), "separated_list(COMMA,option(expr))");
        assert_eq!(p.depth(), 2);
        assert_eq!(p.head(), "separated_list");
        assert_eq!(p.args().len(), 2);
        assert_eq!(Parameter::app("x", []).to_string(), "x");
    }
}
