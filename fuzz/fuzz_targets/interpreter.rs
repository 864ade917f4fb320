#![no_main]

use core::fmt;

use itertools::Itertools;
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};

// Primitives, literals and names
#[derive(Arbitrary, Debug)]
enum SchemeAtom {
    Add, Sub, Mul, Div, Modulo, Expt,
    True, False, Null,
    Greater, GreaterEq,
    Less, LessEq, Eq,

    Cons, Car, Cdr, List, SetCar, SetCdr,
    IsEq, IsList, IsNull, IsPair, Not, Void,

    Identifier(String),
    Integer(i64),
    Rational(i64, u32),
}

impl fmt::Display for SchemeAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self {
            SchemeAtom::Add => "+",
            SchemeAtom::Sub => "-",
            SchemeAtom::Mul => "*",
            SchemeAtom::Div => "/",
            SchemeAtom::Modulo => "modulo",
            SchemeAtom::Expt => "expt",
            SchemeAtom::True => "#t",
            SchemeAtom::False => "#f",
            SchemeAtom::Null => "'()",
            SchemeAtom::Greater => ">",
            SchemeAtom::GreaterEq => ">=",
            SchemeAtom::Less => "<",
            SchemeAtom::LessEq => "<=",
            SchemeAtom::Eq => "=",
            SchemeAtom::Cons => "cons",
            SchemeAtom::Car => "car",
            SchemeAtom::Cdr => "cdr",
            SchemeAtom::List => "list",
            SchemeAtom::SetCar => "set-car!",
            SchemeAtom::SetCdr => "set-cdr!",
            SchemeAtom::IsEq => "eq?",
            SchemeAtom::IsList => "list?",
            SchemeAtom::IsNull => "null?",
            SchemeAtom::IsPair => "pair?",
            SchemeAtom::Not => "not",
            SchemeAtom::Void => "void",
            SchemeAtom::Identifier(identifier) => identifier,
            SchemeAtom::Integer(value) => return write!(f, "{}", value),
            SchemeAtom::Rational(numerator, denominator) => return write!(f, "{}/{}", numerator, denominator),
        })
    }
}

#[derive(Arbitrary, Debug)]
enum SchemeCommand {
    Lambda(Vec<SchemeCommand>),
    Define(Vec<SchemeCommand>),
    If(Vec<SchemeCommand>),
    Cond(Vec<SchemeCommand>),
    And(Vec<SchemeCommand>),
    Or(Vec<SchemeCommand>),
    Begin(Vec<SchemeCommand>),
    Let(Vec<SchemeCommand>),
    Letrec(Vec<SchemeCommand>),
    Set(Vec<SchemeCommand>),
    Quote(Vec<SchemeCommand>),
    Apply(Vec<SchemeCommand>),

    Atom(SchemeAtom),
}

fn stringify_arguments(values: &[SchemeCommand]) -> String {
    values.iter()
        .map(SchemeCommand::to_string)
        .join(" ")
}

impl fmt::Display for SchemeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (keyword, args) = match self {
            SchemeCommand::Atom(atom) => return atom.fmt(f),
            SchemeCommand::Apply(args) => return write!(f, "({})", stringify_arguments(args)),
            SchemeCommand::Lambda(args) => ("lambda", args),
            SchemeCommand::Define(args) => ("define", args),
            SchemeCommand::If(args) => ("if", args),
            SchemeCommand::Cond(args) => ("cond", args),
            SchemeCommand::And(args) => ("and", args),
            SchemeCommand::Or(args) => ("or", args),
            SchemeCommand::Begin(args) => ("begin", args),
            SchemeCommand::Let(args) => ("let", args),
            SchemeCommand::Letrec(args) => ("letrec", args),
            SchemeCommand::Set(args) => ("set!", args),
            SchemeCommand::Quote(args) => ("quote", args),
        };

        write!(f, "({} {})", keyword, stringify_arguments(args))
    }
}

fuzz_target!(|commands: Vec<SchemeCommand>| {
    let mut interpreter = schemer::Interpreter::new();

    for command in commands {
        // Generated programs may fail, but never with an internal error
        if let Err(error) = interpreter.evaluate_str(&command.to_string()) {
            assert!(!error.is_internal(), "{}: {}", command, error);
        }
    }
    if let Err(error) = interpreter.flush() {
        assert!(!error.is_internal(), "{}", error);
    }
});
