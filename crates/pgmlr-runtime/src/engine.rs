//! An incremental LR(1) driver over a [`ParseTable`].
//!
//! The engine never pulls tokens by itself. Each call to
//! [`ParseEngine::resume`] performs at most one shift or reduction and
//! reports it, so that the caller can build values alongside.

use crate::definition::{ParseAction, ParseTable};
use std::fmt;

/// Maps a token to the terminal symbol used to index the parse table.
pub trait Token<TIdx> {
    fn to_index(&self) -> TIdx;
}

#[derive(Debug)]
enum Lookahead<TTok> {
    Absent,
    Token(TTok),
    End,
}

/// What the next call to `resume` has to do first.
#[derive(Debug, Clone, Copy)]
enum Phase<TState, TNonterminal> {
    Ready,
    AwaitingInput,
    Shift(TState),
    Reduce(TNonterminal, usize),
    Error,
    Done,
}

pub struct ParseEngine<TDef, TTok>
where
    TDef: ParseTable,
    TTok: Token<TDef::Terminal>,
{
    table: TDef,
    phase: Phase<TDef::State, TDef::Nonterminal>,
    states: Vec<TDef::State>,
    symbols: Vec<Symbol<TTok, TDef::Nonterminal>>,
    lookahead: Lookahead<TTok>,
}

impl<TDef, TTok> fmt::Debug for ParseEngine<TDef, TTok>
where
    TDef: ParseTable,
    TDef::State: fmt::Debug,
    TDef::Nonterminal: fmt::Debug,
    TTok: Token<TDef::Terminal> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseEngine")
            .field("phase", &self.phase)
            .field("states", &self.states)
            .field("symbols", &self.symbols)
            .field("lookahead", &self.lookahead)
            .finish_non_exhaustive()
    }
}

impl<TDef, TTok> ParseEngine<TDef, TTok>
where
    TDef: ParseTable,
    TTok: Token<TDef::Terminal>,
{
    pub fn new(table: TDef) -> Self {
        let initial = table.initial_state();
        Self {
            table,
            phase: Phase::Ready,
            states: vec![initial],
            symbols: vec![],
            lookahead: Lookahead::Absent,
        }
    }

    /// Answer [`ParseEvent::InputNeeded`] with the next token.
    pub fn offer_token(&mut self, token: TTok) -> Result<(), ParseError> {
        self.offer(Lookahead::Token(token))
    }

    /// Answer [`ParseEvent::InputNeeded`] with the end of input.
    pub fn offer_eoi(&mut self) -> Result<(), ParseError> {
        self.offer(Lookahead::End)
    }

    fn offer(&mut self, input: Lookahead<TTok>) -> Result<(), ParseError> {
        if !matches!(self.phase, Phase::AwaitingInput) {
            return Err(ParseError::UnexpectedInput);
        }
        self.lookahead = input;
        self.phase = Phase::Ready;
        Ok(())
    }

    /// Run the automaton until the caller has something to observe or supply.
    pub fn resume(&mut self) -> Result<ParseEvent<'_, TDef, TTok>, ParseError> {
        match self.phase {
            Phase::Ready => (),
            Phase::AwaitingInput => return Err(ParseError::InputNotOffered),
            Phase::Shift(next) => self.shift(next)?,
            Phase::Reduce(lhs, n) => self.reduce(lhs, n)?,
            Phase::Error => return Ok(ParseEvent::Rejected),
            Phase::Done => return Err(ParseError::Finished),
        }
        self.phase = Phase::Ready;
        self.step()
    }

    fn shift(&mut self, next: TDef::State) -> Result<(), ParseError> {
        let token = match std::mem::replace(&mut self.lookahead, Lookahead::Absent) {
            Lookahead::Token(token) => token,
            Lookahead::End => return Err(ParseError::UnexpectedEndOfInput),
            Lookahead::Absent => return Err(ParseError::InputNotOffered),
        };
        self.symbols.push(Symbol::T(token));
        self.states.push(next);
        Ok(())
    }

    fn reduce(&mut self, lhs: TDef::Nonterminal, n: usize) -> Result<(), ParseError> {
        // the initial state stays at the bottom.
        if n >= self.states.len() || n > self.symbols.len() {
            return Err(ParseError::StackUnderflow);
        }
        self.states.truncate(self.states.len() - n);
        self.symbols.truncate(self.symbols.len() - n);

        let next = self
            .table
            .goto(self.current_state()?, lhs)
            .ok_or(ParseError::MissingGoto)?;
        self.symbols.push(Symbol::N(lhs));
        self.states.push(next);
        Ok(())
    }

    fn step(&mut self) -> Result<ParseEvent<'_, TDef, TTok>, ParseError> {
        let current = self.current_state()?;
        let lookahead = match &self.lookahead {
            Lookahead::Absent => {
                self.phase = Phase::AwaitingInput;
                return Ok(ParseEvent::InputNeeded);
            }
            Lookahead::Token(token) => Some(token),
            Lookahead::End => None,
        };

        match self.table.action(current, lookahead.map(|t| t.to_index())) {
            ParseAction::Shift(next) => {
                let token = lookahead.ok_or(ParseError::UnexpectedEndOfInput)?;
                self.phase = Phase::Shift(next);
                Ok(ParseEvent::Shifting(token))
            }
            ParseAction::Reduce(rule, lhs, n) => {
                let start = self
                    .symbols
                    .len()
                    .checked_sub(n)
                    .ok_or(ParseError::StackUnderflow)?;
                self.phase = Phase::Reduce(lhs, n);
                Ok(ParseEvent::AboutToReduce(rule, &self.symbols[start..]))
            }
            ParseAction::Accept => {
                self.phase = Phase::Done;
                Ok(ParseEvent::Accepted)
            }
            ParseAction::Fail => {
                self.phase = Phase::Error;
                Ok(ParseEvent::HandlingError {
                    state: current,
                    lookahead,
                })
            }
        }
    }

    /// The symbols shifted or reduced so far, bottom first.
    pub fn symbols(&self) -> &[Symbol<TTok, TDef::Nonterminal>] {
        &self.symbols
    }

    fn current_state(&self) -> Result<TDef::State, ParseError> {
        self.states.last().copied().ok_or(ParseError::StackUnderflow)
    }
}

#[derive(Debug)]
pub enum ParseEvent<'p, TDef, TTok>
where
    TDef: ParseTable,
    TTok: Token<TDef::Terminal>,
{
    /// Supply a token or the end of input before resuming.
    InputNeeded,

    Shifting(&'p TTok),

    /// `rule` is about to replace these symbols with its left-hand side.
    AboutToReduce(TDef::Rule, &'p [Symbol<TTok, TDef::Nonterminal>]),

    /// No action exists for the lookahead. The next `resume` rejects the input.
    HandlingError {
        state: TDef::State,
        lookahead: Option<&'p TTok>,
    },

    Accepted,
    Rejected,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Symbol<TTok, TSym> {
    T(TTok),
    N(TSym),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("resumed without offering the requested input")]
    InputNotOffered,

    #[error("input offered while the engine was not waiting for it")]
    UnexpectedInput,

    #[error("shift requested at the end of input")]
    UnexpectedEndOfInput,

    #[error("the parse stack is shorter than the production")]
    StackUnderflow,

    #[error("no transition after the reduction")]
    MissingGoto,

    #[error("the input has already been accepted")]
    Finished,
}
