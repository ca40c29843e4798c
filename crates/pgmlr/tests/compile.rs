use pgmlr::{
    grammar::{Assoc, Grammar, SymbolID},
    sort_check::SortError,
    syntax::{self, Parameter, Production},
    Automaton, CompileError, Config,
};
use pgmlr_runtime::engine::{ParseEngine, ParseEvent};

fn arithmetic() -> syntax::Grammar {
    let mut g = syntax::Grammar::default();
    g.token("INT").token("PLUS").token("TIMES");
    g.prec(Assoc::Left, ["PLUS"]);
    g.prec(Assoc::Left, ["TIMES"]);
    g.rule(
        "expr",
        &[],
        [
            Production::new([
                Parameter::var("expr"),
                Parameter::var("PLUS"),
                Parameter::var("expr"),
            ]),
            Production::new([
                Parameter::var("expr"),
                Parameter::var("TIMES"),
                Parameter::var("expr"),
            ]),
            Production::new([Parameter::var("INT")]),
        ],
    );
    g
}

/// Parse `input` and render the parse tree with parentheses.
fn parse(grammar: &Grammar, automaton: &Automaton, input: &[&str]) -> Option<String> {
    let mut tokens = input.iter().map(|name| grammar.terminal_by_name(name).unwrap());
    let mut engine = ParseEngine::new(automaton);
    let mut nodes: Vec<String> = vec![];
    loop {
        match engine.resume().unwrap() {
            ParseEvent::InputNeeded => match tokens.next() {
                Some(token) => engine.offer_token(token).unwrap(),
                None => engine.offer_eoi().unwrap(),
            },
            ParseEvent::Shifting(token) => {
                nodes.push(grammar.symbol_name(SymbolID::T(*token)).to_string());
            }
            ParseEvent::AboutToReduce(_, args) => {
                let args = nodes.split_off(nodes.len() - args.len());
                let node = match &args[..] {
                    [lhs, op, rhs] => {
                        let op = match op.as_str() {
                            "PLUS" => "+",
                            "TIMES" => "*",
                            op => panic!("unexpected operator: {}", op),
                        };
                        format!("({}{}{})", lhs, op, rhs)
                    }
                    [single] => single.clone(),
                    args => panic!("unexpected arguments: {:?}", args),
                };
                nodes.push(node);
            }
            ParseEvent::HandlingError { .. } => (),
            ParseEvent::Accepted => return nodes.pop(),
            ParseEvent::Rejected => return None,
        }
    }
}

#[test]
fn precedence_shapes_the_parse_tree() {
    for configure in [Config::use_canonical, Config::use_pgm, Config::use_lalr] {
        let mut config = Config::new();
        configure(&mut config);
        let (grammar, automaton) = pgmlr::compile(&arithmetic(), &config).unwrap();
        assert!(automaton.conflicts().iter().all(|c| c.is_resolved()));

        let parse = |input: &[&str]| parse(&grammar, &automaton, input);
        assert_eq!(
            parse(&["INT", "TIMES", "INT", "PLUS", "INT"]).as_deref(),
            Some("((INT*INT)+INT)")
        );
        assert_eq!(
            parse(&["INT", "PLUS", "INT", "TIMES", "INT"]).as_deref(),
            Some("(INT+(INT*INT))")
        );
        assert_eq!(
            parse(&["INT", "PLUS", "INT", "PLUS", "INT"]).as_deref(),
            Some("((INT+INT)+INT)")
        );
        assert_eq!(parse(&["INT", "PLUS"]), None);
        assert_eq!(parse(&["PLUS", "INT"]), None);
    }
}

#[test]
fn ill_sorted_application_is_rejected() {
    let mut source = arithmetic();
    source.rule(
        "pair",
        &["X", "Y"],
        [Production::new([Parameter::var("X"), Parameter::var("Y")])],
    );
    source.rule(
        "pairs",
        &[],
        [Production::new([Parameter::app("pair", [Parameter::var("INT")])])],
    );

    match pgmlr::compile(&source, &Config::new()) {
        Err(CompileError::Sort(SortError::IllSorted {
            symbol,
            expected,
            found,
            ..
        })) => {
            assert_eq!(symbol, "pair");
            assert_eq!(found.arity(), Some(2));
            assert_eq!(expected.arity(), Some(1));
        }
        res => panic!("unexpected result: {:?}", res.map(|_| ())),
    }
}

#[test]
fn automaton_is_rendered() {
    let (grammar, automaton) = pgmlr::compile(&arithmetic(), &Config::new()).unwrap();
    let rendered = automaton.display(&grammar).to_string();
    assert!(rendered.starts_with("#### State 00\n"));
    assert!(rendered.contains("## conflicts"));
    assert!(rendered.contains("[resolved by precedence]"));
}
