//! Grammar definition for integration tests.

use pgmlr::{
    grammar::{Assoc, GrammarDef, GrammarDefError, Precedence, SymbolID::*},
    syntax::{self, Parameter, Production},
};

type Result = std::result::Result<(), GrammarDefError>;

pub fn g_simple1(g: &mut GrammarDef) -> Result {
    let equal = g.terminal("EQUAL", None)?;
    let plus = g.terminal("PLUS", None)?;
    let ident = g.terminal("ID", None)?;
    let num = g.terminal("NUM", None)?;

    let a = g.nonterminal("A")?;
    let e = g.nonterminal("E")?;
    let t = g.nonterminal("T")?;

    g.start_symbol(a)?;

    g.rule(a, [N(e), T(equal), N(e)], None)?;
    g.rule(a, [T(ident)], None)?;
    g.rule(e, [N(e), T(plus), N(t)], None)?;
    g.rule(e, [N(t)], None)?;
    g.rule(t, [T(num)], None)?;
    g.rule(t, [T(ident)], None)?;
    Ok(())
}

pub fn g_simple2(g: &mut GrammarDef) -> Result {
    // declare terminal symbols.
    let lparen = g.terminal("LPAREN", None)?;
    let rparen = g.terminal("RPAREN", None)?;
    let plus = g.terminal("PLUS", None)?;
    let minus = g.terminal("MINUS", None)?;
    let star = g.terminal("STAR", None)?;
    let slash = g.terminal("SLASH", None)?;
    let num = g.terminal("NUM", None)?;

    // declare nonterminal symbols.
    let expr = g.nonterminal("EXPR")?;
    let factor = g.nonterminal("FACTOR")?;
    let term = g.nonterminal("TERM")?;

    g.start_symbol(expr)?;

    // declare syntax rules.
    g.rule(expr, [N(expr), T(plus), N(factor)], None)?; // expr '+' factor
    g.rule(expr, [N(expr), T(minus), N(factor)], None)?; // expr '-' factor
    g.rule(expr, [N(factor)], None)?;
    g.rule(factor, [N(factor), T(star), N(term)], None)?; // factor '*' term
    g.rule(factor, [N(factor), T(slash), N(term)], None)?; // factor '/' term
    g.rule(factor, [N(term)], None)?;
    g.rule(term, [T(num)], None)?;
    g.rule(term, [T(lparen), N(expr), T(rparen)], None)?; // '(' expr ')'
    Ok(())
}

pub fn g1(g: &mut GrammarDef) -> Result {
    let plus = g.terminal("PLUS", None)?;
    let star = g.terminal("STAR", None)?;
    let a = g.terminal("A", None)?;

    let e = g.nonterminal("E")?;
    let t = g.nonterminal("T")?;

    g.start_symbol(e)?;

    g.rule(e, [N(e), T(plus), N(t)], None)?;
    g.rule(e, [N(t)], None)?;
    g.rule(t, [N(t), T(star), T(a)], None)?;
    g.rule(t, [T(a)], None)?;
    Ok(())
}

/// LR(1), but not LALR(1).
pub fn g2(g: &mut GrammarDef) -> Result {
    let comma = g.terminal("COMMA", None)?;
    let colon = g.terminal("COLON", None)?;
    let ident = g.terminal("ID", None)?;

    let def = g.nonterminal("DEF")?;
    let param_spec = g.nonterminal("PARAM_SPEC")?;
    let return_spec = g.nonterminal("RETURN_SPEC")?;
    let type_ = g.nonterminal("TYPE")?;
    let name = g.nonterminal("NAME")?;
    let name_list = g.nonterminal("NAME_LIST")?;

    g.rule(def, [N(param_spec), N(return_spec), T(comma)], None)?;
    g.rule(param_spec, [N(type_)], None)?;
    g.rule(param_spec, [N(name_list), T(colon), N(type_)], None)?;
    g.rule(return_spec, [N(type_)], None)?;
    g.rule(return_spec, [N(name), T(colon), N(type_)], None)?;
    g.rule(type_, [T(ident)], None)?;
    g.rule(name, [T(ident)], None)?;
    g.rule(name_list, [N(name)], None)?;
    g.rule(name_list, [N(name), T(comma), N(name_list)], None)?;
    Ok(())
}

pub fn g4(g: &mut GrammarDef) -> Result {
    let plus = g.terminal("PLUS", None)?;
    let lparen = g.terminal("LPAREN", None)?;
    let rparen = g.terminal("RPAREN", None)?;
    let num = g.terminal("NUM", None)?;

    let e = g.nonterminal("E")?;
    let t = g.nonterminal("T")?;
    // E → E + T | T
    // T → ( E ) | n

    g.rule(e, [N(e), T(plus), N(t)], None)?;
    g.rule(e, [N(t)], None)?;
    g.rule(t, [T(lparen), N(e), T(rparen)], None)?;
    g.rule(t, [T(num)], None)?;
    Ok(())
}

/// Pager's example whose LALR(1) automaton has reduce/reduce conflicts.
///
/// S := a A d | b B d | a B e | b A e ; A := c ; B := c
pub fn pager_weak(g: &mut GrammarDef) -> Result {
    let a = g.terminal("a", None)?;
    let b = g.terminal("b", None)?;
    let c = g.terminal("c", None)?;
    let d = g.terminal("d", None)?;
    let e = g.terminal("e", None)?;

    let s = g.nonterminal("S")?;
    let x = g.nonterminal("A")?;
    let y = g.nonterminal("B")?;

    g.rule(s, [T(a), N(x), T(d)], None)?;
    g.rule(s, [T(b), N(y), T(d)], None)?;
    g.rule(s, [T(a), N(y), T(e)], None)?;
    g.rule(s, [T(b), N(x), T(e)], None)?;
    g.rule(x, [T(c)], None)?;
    g.rule(y, [T(c)], None)?;
    Ok(())
}

/// Two states sharing a core, one of which already has a reduce/reduce
/// conflict on `d`. Merging them would add another one on `a`.
///
/// S := p X a | p X d | p Y d | q X b | q Y a ; X := c ; Y := c
pub fn pager_conflicted(g: &mut GrammarDef) -> Result {
    let a = g.terminal("a", None)?;
    let b = g.terminal("b", None)?;
    let c = g.terminal("c", None)?;
    let d = g.terminal("d", None)?;
    let p = g.terminal("p", None)?;
    let q = g.terminal("q", None)?;

    let s = g.nonterminal("S")?;
    let x = g.nonterminal("X")?;
    let y = g.nonterminal("Y")?;

    g.rule(s, [T(p), N(x), T(a)], None)?;
    g.rule(s, [T(p), N(x), T(d)], None)?;
    g.rule(s, [T(p), N(y), T(d)], None)?;
    g.rule(s, [T(q), N(x), T(b)], None)?;
    g.rule(s, [T(q), N(y), T(a)], None)?;
    g.rule(x, [T(c)], None)?;
    g.rule(y, [T(c)], None)?;
    Ok(())
}

/// Ambiguous arithmetic expressions disambiguated by precedences.
pub fn arithmetic_prec(g: &mut GrammarDef) -> Result {
    let additive = Precedence::new(0, Assoc::Left);
    let multiplicative = Precedence::new(1, Assoc::Left);
    let power = Precedence::new(2, Assoc::Right);
    let unary = Precedence::new(3, Assoc::Nonassoc);

    let plus = g.terminal("PLUS", Some(additive))?;
    let minus = g.terminal("MINUS", Some(additive))?;
    let star = g.terminal("STAR", Some(multiplicative))?;
    let slash = g.terminal("SLASH", Some(multiplicative))?;
    let caret = g.terminal("CARET", Some(power))?;
    let lparen = g.terminal("LPAREN", None)?;
    let rparen = g.terminal("RPAREN", None)?;
    let num = g.terminal("NUM", None)?;

    let expr = g.nonterminal("EXPR")?;

    g.rule(expr, [N(expr), T(plus), N(expr)], None)?;
    g.rule(expr, [N(expr), T(minus), N(expr)], None)?;
    g.rule(expr, [N(expr), T(star), N(expr)], None)?;
    g.rule(expr, [N(expr), T(slash), N(expr)], None)?;
    g.rule(expr, [N(expr), T(caret), N(expr)], None)?;
    g.rule(expr, [T(minus), N(expr)], Some(unary))?;
    g.rule(expr, [T(lparen), N(expr), T(rparen)], None)?;
    g.rule(expr, [T(num)], None)?;
    Ok(())
}

pub fn min_caml(g: &mut GrammarDef) -> Result {
    let l_paren = g.terminal("LPAREN", None)?;
    let r_paren = g.terminal("RPAREN", None)?;
    let t_true = g.terminal("TRUE", None)?;
    let t_false = g.terminal("FALSE", None)?;
    let integer = g.terminal("INTEGER", None)?;
    let float = g.terminal("FLOAT", None)?;
    let ident = g.terminal("IDENT", None)?;
    let t_not = g.terminal("NOT", None)?;
    let plus = g.terminal("PLUS", None)?;
    let plus_dot = g.terminal("PLUS_DOT", None)?;
    let minus = g.terminal("MINUS", None)?;
    let minus_dot = g.terminal("MINUS_DOT", None)?;
    let star_dot = g.terminal("STAR_DOT", None)?;
    let slash_dot = g.terminal("SLASH_DOT", None)?;
    let equal = g.terminal("EQUAL", None)?;
    let less_greater = g.terminal("LESS_GREATER", None)?;
    let less = g.terminal("LESS", None)?;
    let greater = g.terminal("GREATER", None)?;
    let less_equal = g.terminal("LESS_EQUAL", None)?;
    let greater_equal = g.terminal("GREATER_EQUAL", None)?;
    let less_minus = g.terminal("LESS_MINUS", None)?;
    let comma = g.terminal("COMMA", None)?;
    let semicolon = g.terminal("SEMICOLON", None)?;
    let t_if = g.terminal("IF", None)?;
    let t_then = g.terminal("THEN", None)?;
    let t_else = g.terminal("ELSE", None)?;
    let t_let = g.terminal("LET", None)?;
    let t_rec = g.terminal("REC", None)?;
    let t_in = g.terminal("IN", None)?;
    let array_make = g.terminal("ARRAY_MAKE", None)?;
    let dot = g.terminal("DOT", None)?;

    let exp = g.nonterminal("EXPR")?;
    let simple_exp = g.nonterminal("SIMPLE_EXP")?;
    let app_exp = g.nonterminal("APP_EXP")?;
    let neg_exp = g.nonterminal("NEG_EXP")?;
    let mult_exp = g.nonterminal("MULT_EXP")?;
    let add_exp = g.nonterminal("ADD_EXP")?;
    let rel_exp = g.nonterminal("REL_EXP")?;
    let tuple_exp = g.nonterminal("TUPLE_EXP")?;
    let tuple_exp_rest = g.nonterminal("TUPLE_EXP_REST")?;
    let put_exp = g.nonterminal("PUT_EXP")?;
    let if_exp = g.nonterminal("IF_EXP")?;
    let let_exp = g.nonterminal("LET_EXP")?;
    let fundef = g.nonterminal("FUNDEF")?;
    let formal_args = g.nonterminal("FORMAL_ARGS")?;
    let actual_args = g.nonterminal("ACTUAL_ARGS")?;
    let pat = g.nonterminal("PAT")?;

    g.start_symbol(exp)?;

    g.rule(simple_exp, [T(l_paren), N(exp), T(r_paren)], None)?;
    g.rule(simple_exp, [T(l_paren), T(r_paren)], None)?;
    g.rule(simple_exp, [T(t_true)], None)?;
    g.rule(simple_exp, [T(t_false)], None)?;
    g.rule(simple_exp, [T(integer)], None)?;
    g.rule(simple_exp, [T(float)], None)?;
    g.rule(simple_exp, [T(ident)], None)?;
    g.rule(
        simple_exp,
        [N(simple_exp), T(dot), T(l_paren), N(exp), T(r_paren)],
        None,
    )?;

    g.rule(app_exp, [N(simple_exp)], None)?;
    g.rule(app_exp, [N(simple_exp), N(actual_args)], None)?;
    g.rule(app_exp, [T(array_make), N(simple_exp), N(simple_exp)], None)?;
    g.rule(app_exp, [T(t_not), N(app_exp)], None)?;

    g.rule(neg_exp, [N(app_exp)], None)?;
    g.rule(neg_exp, [T(minus), N(neg_exp)], None)?;
    g.rule(neg_exp, [T(minus_dot), N(neg_exp)], None)?;

    g.rule(mult_exp, [N(neg_exp)], None)?;
    for op in [star_dot, slash_dot] {
        g.rule(mult_exp, [N(mult_exp), T(op), N(neg_exp)], None)?;
    }

    g.rule(add_exp, [N(mult_exp)], None)?;
    for op in [plus, minus, plus_dot, minus_dot] {
        g.rule(add_exp, [N(add_exp), T(op), N(mult_exp)], None)?;
    }

    g.rule(rel_exp, [N(add_exp)], None)?;
    for op in [equal, less_greater, less, greater, less_equal, greater_equal] {
        g.rule(rel_exp, [N(rel_exp), T(op), N(add_exp)], None)?;
    }

    g.rule(tuple_exp, [N(rel_exp)], None)?;
    g.rule(tuple_exp, [N(rel_exp), T(comma), N(tuple_exp_rest)], None)?;
    g.rule(tuple_exp_rest, [N(rel_exp)], None)?;
    g.rule(tuple_exp_rest, [N(rel_exp), T(comma), N(tuple_exp_rest)], None)?;

    g.rule(put_exp, [N(tuple_exp)], None)?;
    g.rule(
        put_exp,
        [
            N(simple_exp),
            T(dot),
            T(l_paren),
            N(exp),
            T(r_paren),
            T(less_minus),
            N(exp),
        ],
        None,
    )?;

    g.rule(if_exp, [N(put_exp)], None)?;
    g.rule(
        if_exp,
        [T(t_if), N(exp), T(t_then), N(exp), T(t_else), N(exp)],
        None,
    )?;

    g.rule(
        let_exp,
        [T(t_let), T(ident), T(equal), N(exp), T(t_in), N(exp)],
        None,
    )?;
    g.rule(let_exp, [T(t_let), T(t_rec), N(fundef), T(t_in), N(exp)], None)?;
    g.rule(
        let_exp,
        [
            T(t_let),
            T(l_paren),
            N(pat),
            T(r_paren),
            T(equal),
            N(exp),
            T(t_in),
            N(exp),
        ],
        None,
    )?;

    g.rule(fundef, [T(ident), N(formal_args), T(equal), N(exp)], None)?;
    g.rule(formal_args, [T(ident), N(formal_args)], None)?;
    g.rule(formal_args, [T(ident)], None)?;
    g.rule(actual_args, [N(actual_args), N(simple_exp)], None)?;
    g.rule(actual_args, [N(simple_exp)], None)?;
    g.rule(pat, [N(pat), T(comma), T(ident)], None)?;
    g.rule(pat, [T(ident), T(comma), T(ident)], None)?;

    g.rule(exp, [N(if_exp)], None)?;
    g.rule(exp, [N(if_exp), T(semicolon), N(exp)], None)?;
    g.rule(exp, [N(let_exp)], None)?;
    Ok(())
}

// ==== parameterized grammars ====

fn var(name: &str) -> Parameter {
    Parameter::var(name)
}

fn app<const N: usize>(name: &str, args: [Parameter; N]) -> Parameter {
    Parameter::app(name, args)
}

/// The usual library of parameterized rules.
fn standard_rules(g: &mut syntax::Grammar) {
    g.rule(
        "option",
        &["X"],
        [Production::new([]), Production::new([var("X")])],
    );
    g.rule(
        "list",
        &["X"],
        [
            Production::new([]),
            Production::new([var("X"), app("list", [var("X")])]),
        ],
    );
    g.rule(
        "nonempty_list",
        &["X"],
        [
            Production::new([var("X")]),
            Production::new([var("X"), app("nonempty_list", [var("X")])]),
        ],
    );
    g.rule(
        "separated_nonempty_list",
        &["S", "X"],
        [
            Production::new([var("X")]),
            Production::new([
                var("X"),
                var("S"),
                app("separated_nonempty_list", [var("S"), var("X")]),
            ]),
        ],
    );
    g.rule(
        "delimited",
        &["L", "X", "R"],
        [Production::new([var("L"), var("X"), var("R")])],
    );
}

/// A tiny S-expression language written with `list` and `delimited`.
pub fn sexp() -> syntax::Grammar {
    let mut g = syntax::Grammar::default();
    g.token("LPAREN").token("RPAREN").token("ATOM").token("QUOTE");
    g.rule("program", &[], [Production::new([app("list", [var("sexp")])])]);
    g.rule(
        "sexp",
        &[],
        [
            Production::new([var("ATOM")]),
            Production::new([var("QUOTE"), var("sexp")]),
            Production::new([app(
                "delimited",
                [var("LPAREN"), app("list", [var("sexp")]), var("RPAREN")],
            )]),
        ],
    );
    standard_rules(&mut g);
    g.start("program");
    g
}

/// Comma separated arguments of calls, with an optional trailing block.
pub fn calls() -> syntax::Grammar {
    let mut g = syntax::Grammar::default();
    g.token("IDENT")
        .token("LPAREN")
        .token("RPAREN")
        .token("COMMA")
        .token("LBRACE")
        .token("RBRACE")
        .token("SEMI");
    g.rule(
        "stmts",
        &[],
        [Production::new([app("nonempty_list", [var("stmt")])])],
    );
    g.rule("stmt", &[], [Production::new([var("call"), var("SEMI")])]);
    g.rule(
        "call",
        &[],
        [Production::new([
            var("IDENT"),
            app(
                "delimited",
                [
                    var("LPAREN"),
                    app(
                        "option",
                        [app("separated_nonempty_list", [var("COMMA"), var("arg")])],
                    ),
                    var("RPAREN"),
                ],
            ),
            app("option", [var("block")]),
        ])],
    );
    g.rule(
        "arg",
        &[],
        [Production::new([var("IDENT")]), Production::new([var("call")])],
    );
    g.rule(
        "block",
        &[],
        [Production::new([app(
            "delimited",
            [var("LBRACE"), app("list", [var("stmt")]), var("RBRACE")],
        )])],
    );
    standard_rules(&mut g);
    g
}

/// Arithmetic with `%prec` and a higher-order rule that builds binary operators.
pub fn operators() -> syntax::Grammar {
    let mut g = syntax::Grammar::default();
    g.token("INT")
        .token("PLUS")
        .token("MINUS")
        .token("TIMES")
        .token("LPAREN")
        .token("RPAREN");
    g.prec(Assoc::Left, ["PLUS", "MINUS"]);
    g.prec(Assoc::Left, ["TIMES"]);
    g.prec(Assoc::Nonassoc, ["UMINUS"]);
    g.rule(
        "expr",
        &[],
        [
            Production::new([app("binary", [var("PLUS")])]),
            Production::new([app("binary", [var("MINUS")])]),
            Production::new([app("binary", [var("TIMES")])]),
            Production::new([var("MINUS"), var("expr")]).with_prec("UMINUS"),
            Production::new([app(
                "delimited",
                [var("LPAREN"), var("expr"), var("RPAREN")],
            )]),
            Production::new([var("INT")]),
        ],
    );
    g.rule(
        "binary",
        &["OP"],
        [Production::new([var("expr"), var("OP"), var("expr")])],
    );
    standard_rules(&mut g);
    g.start("expr");
    g
}
