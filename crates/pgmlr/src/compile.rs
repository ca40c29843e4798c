//! The pipeline from a parameterized grammar to an LR(1) automaton.

use crate::{
    expand::{self, ExpandError},
    grammar::Grammar,
    lr1::{Automaton, BuildError, Config},
    sort_check::{self, SortError},
    syntax,
};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("sort error: {0}")]
    Sort(#[from] SortError),

    #[error("expansion error: {0}")]
    Expand(#[from] ExpandError),

    #[error("construction error: {0}")]
    Build(#[from] BuildError),
}

/// Check the sorts of `source`, instantiate its rules and build the automaton.
#[tracing::instrument(skip_all)]
pub fn compile(
    source: &syntax::Grammar,
    config: &Config,
) -> Result<(Grammar, Automaton), CompileError> {
    let sorts = sort_check::check(source)?;
    let grammar = expand::expand(source, &sorts)?;
    let automaton = config.generate(&grammar)?;
    Ok((grammar, automaton))
}
