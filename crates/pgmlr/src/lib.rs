//! An LR(1) parser table generator that merges states by Pager's
//! Practical General Method, with sort-checked parameterized rules.

pub mod compile;
pub mod expand;
pub mod first_sets;
pub mod grammar;
pub mod lr1;
pub mod pager;
pub mod sort;
pub mod sort_check;
pub mod syntax;
pub mod table;
pub mod types;
pub mod util;

pub use crate::{
    compile::{compile, CompileError},
    grammar::Grammar,
    lr1::{Automaton, Config, MergeMode},
};
