//! Parse table definition.

/// The trait for abstracting the generated LR(1) parse table.
pub trait ParseTable {
    /// The number to identify the state of LR(1) automaton.
    type State: Copy;

    /// The number to identify the terminal symbols.
    type Terminal: Copy;

    /// The number to identify the nonterminal symbols.
    type Nonterminal: Copy;

    /// The number to identify the production rules.
    type Rule: Copy;

    /// Return the initial state number.
    fn initial_state(&self) -> Self::State;

    /// Return the action corresponding to the specified state number and
    /// lookahead symbol.
    ///
    /// If there is no lookahead symbol, a `None` is passsed as the end of input.
    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Terminal>,
    ) -> ParseAction<Self::State, Self::Nonterminal, Self::Rule>;

    /// Return the state to transition to after reducing to `symbol` in
    /// the state `current`.
    fn goto(&self, current: Self::State, symbol: Self::Nonterminal) -> Option<Self::State>;
}

macro_rules! impl_parse_table_for_pointer {
    ($($ptr:ty),*) => {$(
        impl<T: ?Sized> ParseTable for $ptr
        where
            T: ParseTable,
        {
            type State = T::State;
            type Terminal = T::Terminal;
            type Nonterminal = T::Nonterminal;
            type Rule = T::Rule;

            fn initial_state(&self) -> Self::State {
                (**self).initial_state()
            }

            fn action(
                &self,
                current: Self::State,
                lookahead: Option<Self::Terminal>,
            ) -> ParseAction<Self::State, Self::Nonterminal, Self::Rule> {
                (**self).action(current, lookahead)
            }

            fn goto(&self, current: Self::State, symbol: Self::Nonterminal) -> Option<Self::State> {
                (**self).goto(current, symbol)
            }
        }
    )*};
}

impl_parse_table_for_pointer!(&T, std::rc::Rc<T>, std::sync::Arc<T>);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseAction<TState, TNonterminal, TRule> {
    /// Push the lookahead symbol and move to the specified state.
    Shift(TState),

    /// Pop the given number of symbols and push the nonterminal symbol
    /// produced by the rule.
    Reduce(TRule, TNonterminal, usize),

    Accept,

    /// The lookahead symbol is not acceptable in the current state.
    Fail,
}
