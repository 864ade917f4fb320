//! The fixed tables of primitive procedures and reserved words, and the
//! semantic functions behind every primitive node.
//!
//! Primitives come in three arity classes. The analyzer picks the class
//! from the number of arguments it sees, so evaluation never branches on
//! argument count. When a primitive or special form is named outside of
//! operator position the evaluator synthesizes a procedure for it from
//! [primitive_lambda] or [reserved_word_lambda].

use std::{collections::HashMap, io::Write, rc::Rc, sync::LazyLock};

use itertools::Itertools;

use crate::{
    error::{SchemeError, SchemeResult},
    expr::{Expr, Lambda},
    number,
    value::{Pair, Value},
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Add, Sub, Mul, Div, Modulo, Expt,
    Less, LessEq, Equal, GreaterEq, Greater,
    And, Or, Not,
    Cons, Car, Cdr, List, SetCar, SetCdr,
    Void, Exit, Display,
    IsEq, IsList, IsBoolean, IsNumber, IsInteger, IsNull,
    IsPair, IsProcedure, IsSymbol, IsString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedWord {
    Quote, Begin, If, Cond, Lambda, Define, Let, Letrec, Set,
}

const PRIMITIVE_NAMES: [(&str, Primitive); 33] = [
    ("+", Primitive::Add),
    ("-", Primitive::Sub),
    ("*", Primitive::Mul),
    ("/", Primitive::Div),
    ("modulo", Primitive::Modulo),
    ("expt", Primitive::Expt),
    ("<", Primitive::Less),
    ("<=", Primitive::LessEq),
    ("=", Primitive::Equal),
    (">=", Primitive::GreaterEq),
    (">", Primitive::Greater),
    ("and", Primitive::And),
    ("or", Primitive::Or),
    ("not", Primitive::Not),
    ("cons", Primitive::Cons),
    ("car", Primitive::Car),
    ("cdr", Primitive::Cdr),
    ("list", Primitive::List),
    ("set-car!", Primitive::SetCar),
    ("set-cdr!", Primitive::SetCdr),
    ("void", Primitive::Void),
    ("exit", Primitive::Exit),
    ("display", Primitive::Display),
    ("eq?", Primitive::IsEq),
    ("list?", Primitive::IsList),
    ("boolean?", Primitive::IsBoolean),
    ("number?", Primitive::IsNumber),
    ("integer?", Primitive::IsInteger),
    ("null?", Primitive::IsNull),
    ("pair?", Primitive::IsPair),
    ("procedure?", Primitive::IsProcedure),
    ("symbol?", Primitive::IsSymbol),
    ("string?", Primitive::IsString),
];

const RESERVED_WORD_NAMES: [(&str, ReservedWord); 9] = [
    ("quote", ReservedWord::Quote),
    ("begin", ReservedWord::Begin),
    ("if", ReservedWord::If),
    ("cond", ReservedWord::Cond),
    ("lambda", ReservedWord::Lambda),
    ("define", ReservedWord::Define),
    ("let", ReservedWord::Let),
    ("letrec", ReservedWord::Letrec),
    ("set!", ReservedWord::Set),
];

static PRIMITIVES: LazyLock<HashMap<&'static str, Primitive>> =
    LazyLock::new(|| PRIMITIVE_NAMES.into_iter().collect());

static RESERVED_WORDS: LazyLock<HashMap<&'static str, ReservedWord>> =
    LazyLock::new(|| RESERVED_WORD_NAMES.into_iter().collect());

pub fn find_primitive(name: &str) -> Option<Primitive> {
    PRIMITIVES.get(name).copied()
}

pub fn find_reserved_word(name: &str) -> Option<ReservedWord> {
    RESERVED_WORDS.get(name).copied()
}

impl Primitive {
    pub fn name(self) -> &'static str {
        PRIMITIVE_NAMES.iter()
            .find(|(_, primitive)| *primitive == self)
            .map(|(name, _)| *name)
            .unwrap_or("<primitive>")
    }
}

impl ReservedWord {
    pub fn name(self) -> &'static str {
        RESERVED_WORD_NAMES.iter()
            .find(|(_, word)| *word == self)
            .map(|(name, _)| *name)
            .unwrap_or("<reserved word>")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not, Car, Cdr, Display,
    IsList, IsBoolean, IsNumber, IsInteger, IsNull,
    IsPair, IsProcedure, IsSymbol, IsString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add, Sub, Mul, Div, Modulo, Expt,
    Less, LessEq, Equal, GreaterEq, Greater,
    Cons, SetCar, SetCdr, IsEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariadicOp {
    Add, Sub, Mul, Div,
    Less, LessEq, Equal, GreaterEq, Greater,
    List, And, Or,
    /// Only reachable through the procedure form of `begin`.
    Begin,
}

fn pair(value: &Value, operation: &str) -> SchemeResult<Rc<Pair>> {
    match value {
        Value::Pair(pair) => Ok(pair.clone()),
        other => Err(SchemeError::operand_type(format!("{}: expected a pair, got {}", operation, other))),
    }
}

impl UnaryOp {
    pub fn apply(self, operand: Value) -> SchemeResult<Value> {
        Ok(match self {
            Self::Not => Value::Boolean(!operand.is_truthy()),
            Self::Car => pair(&operand, "car")?.car(),
            Self::Cdr => pair(&operand, "cdr")?.cdr(),
            Self::Display => {
                let mut stdout = std::io::stdout();
                // A closed stdout is ignored
                let _ = write!(stdout, "{}", operand.display());
                let _ = stdout.flush();
                Value::Void
            }
            Self::IsList => Value::Boolean(operand.is_list()),
            Self::IsBoolean => Value::Boolean(matches!(operand, Value::Boolean(_))),
            Self::IsNumber => Value::Boolean(number::is_number(&operand)),
            Self::IsInteger => Value::Boolean(matches!(operand, Value::Integer(_))),
            Self::IsNull => Value::Boolean(matches!(operand, Value::Null)),
            Self::IsPair => Value::Boolean(matches!(operand, Value::Pair(_))),
            Self::IsProcedure => Value::Boolean(matches!(operand, Value::Procedure(_))),
            Self::IsSymbol => Value::Boolean(matches!(operand, Value::Symbol(_))),
            Self::IsString => Value::Boolean(matches!(operand, Value::String(_))),
        })
    }
}

impl BinaryOp {
    pub fn apply(self, left: Value, right: Value) -> SchemeResult<Value> {
        use std::cmp::Ordering;

        Ok(match self {
            Self::Add => number::add(&left, &right)?,
            Self::Sub => number::sub(&left, &right)?,
            Self::Mul => number::mul(&left, &right)?,
            Self::Div => number::div(&left, &right)?,
            Self::Modulo => number::modulo(&left, &right)?,
            Self::Expt => number::expt(&left, &right)?,
            Self::Less => Value::Boolean(number::compare(&left, &right)? == Ordering::Less),
            Self::LessEq => Value::Boolean(number::compare(&left, &right)? != Ordering::Greater),
            Self::Equal => Value::Boolean(number::compare(&left, &right)? == Ordering::Equal),
            Self::GreaterEq => Value::Boolean(number::compare(&left, &right)? != Ordering::Less),
            Self::Greater => Value::Boolean(number::compare(&left, &right)? == Ordering::Greater),
            Self::Cons => Value::cons(left, right),
            Self::SetCar => {
                pair(&left, "set-car!")?.set_car(right);
                Value::Void
            }
            Self::SetCdr => {
                pair(&left, "set-cdr!")?.set_cdr(right);
                Value::Void
            }
            Self::IsEq => Value::Boolean(left.is_eq(&right)),
        })
    }

    fn comparison(op: VariadicOp) -> Option<Self> {
        match op {
            VariadicOp::Less => Some(Self::Less),
            VariadicOp::LessEq => Some(Self::LessEq),
            VariadicOp::Equal => Some(Self::Equal),
            VariadicOp::GreaterEq => Some(Self::GreaterEq),
            VariadicOp::Greater => Some(Self::Greater),
            _ => None,
        }
    }
}

type NumericOp = fn(&Value, &Value) -> SchemeResult<Value>;

fn fold_from(start: Value, operands: impl IntoIterator<Item = Value>, f: NumericOp) -> SchemeResult<Value> {
    operands.into_iter().try_fold(start, |acc, value| f(&acc, &value))
}

/// `-` and `/` need one operand. A lone operand is combined with `unit`,
/// which negates or takes the reciprocal.
fn fold_inverse(operands: Vec<Value>, unit: i64, name: &str, f: NumericOp) -> SchemeResult<Value> {
    let mut operands = operands.into_iter();
    let first = operands.next()
        .ok_or_else(|| SchemeError::arity(format!("{} expects at least one argument", name)))?;

    if operands.len() == 0 { return f(&Value::Integer(unit), &first); }
    fold_from(first, operands, f)
}

impl VariadicOp {
    pub fn apply(self, operands: Vec<Value>) -> SchemeResult<Value> {
        match self {
            Self::Add => fold_from(Value::Integer(0), operands, number::add),
            Self::Mul => fold_from(Value::Integer(1), operands, number::mul),
            Self::Sub => fold_inverse(operands, 0, "-", number::sub),
            Self::Div => fold_inverse(operands, 1, "/", number::div),
            Self::Less | Self::LessEq | Self::Equal | Self::GreaterEq | Self::Greater => {
                if operands.is_empty() {
                    return Err(SchemeError::arity("comparison expects at least one argument"));
                }
                if let Some(other) = operands.iter().find(|value| !number::is_number(value)) {
                    return Err(SchemeError::operand_type(format!("comparison: expected a number, got {}", other)));
                }

                let Some(op) = BinaryOp::comparison(self) else {
                    return Err(SchemeError::internal("comparison operator without a binary form"));
                };
                for (left, right) in operands.into_iter().tuple_windows() {
                    if !op.apply(left, right)?.is_truthy() { return Ok(Value::Boolean(false)); }
                }
                Ok(Value::Boolean(true))
            }
            Self::List => Ok(Value::list(operands)),
            Self::And => {
                let mut last = Value::Boolean(true);
                for value in operands {
                    if !value.is_truthy() { return Ok(value); }
                    last = value;
                }
                Ok(last)
            }
            Self::Or => Ok(operands.into_iter()
                .find(Value::is_truthy)
                .unwrap_or(Value::Boolean(false))),
            Self::Begin => Ok(operands.into_iter().last().unwrap_or(Value::Void)),
        }
    }
}

/// Parameter list and body of the procedure that stands in for `primitive`
/// when it is used as a value. Variadic primitives take no declared
/// parameters, so every call reaches them through arity dispatch.
pub fn primitive_lambda(primitive: Primitive) -> Lambda {
    use Primitive as P;

    let unary = |op| Lambda {
        parameters: vec!["operand".to_owned()],
        body: Expr::unary(op, Expr::var("operand")),
    };
    let binary = |op| Lambda {
        parameters: vec!["left".to_owned(), "right".to_owned()],
        body: Expr::binary(op, Expr::var("left"), Expr::var("right")),
    };
    let variadic = |op| Lambda { parameters: vec![], body: Expr::Variadic(op, vec![]) };

    match primitive {
        P::Add => variadic(VariadicOp::Add),
        P::Sub => variadic(VariadicOp::Sub),
        P::Mul => variadic(VariadicOp::Mul),
        P::Div => variadic(VariadicOp::Div),
        P::Less => variadic(VariadicOp::Less),
        P::LessEq => variadic(VariadicOp::LessEq),
        P::Equal => variadic(VariadicOp::Equal),
        P::GreaterEq => variadic(VariadicOp::GreaterEq),
        P::Greater => variadic(VariadicOp::Greater),
        P::And => variadic(VariadicOp::And),
        P::Or => variadic(VariadicOp::Or),
        P::List => variadic(VariadicOp::List),

        P::Modulo => binary(BinaryOp::Modulo),
        P::Expt => binary(BinaryOp::Expt),
        P::Cons => binary(BinaryOp::Cons),
        P::SetCar => binary(BinaryOp::SetCar),
        P::SetCdr => binary(BinaryOp::SetCdr),
        P::IsEq => binary(BinaryOp::IsEq),

        P::Not => unary(UnaryOp::Not),
        P::Car => unary(UnaryOp::Car),
        P::Cdr => unary(UnaryOp::Cdr),
        P::Display => unary(UnaryOp::Display),
        P::IsList => unary(UnaryOp::IsList),
        P::IsBoolean => unary(UnaryOp::IsBoolean),
        P::IsNumber => unary(UnaryOp::IsNumber),
        P::IsInteger => unary(UnaryOp::IsInteger),
        P::IsNull => unary(UnaryOp::IsNull),
        P::IsPair => unary(UnaryOp::IsPair),
        P::IsProcedure => unary(UnaryOp::IsProcedure),
        P::IsSymbol => unary(UnaryOp::IsSymbol),
        P::IsString => unary(UnaryOp::IsString),

        P::Void => Lambda { parameters: vec![], body: Expr::MakeVoid },
        P::Exit => Lambda { parameters: vec![], body: Expr::Exit },
    }
}

/// Procedure form of a special form, for the few whose meaning survives
/// having their operands evaluated first.
pub fn reserved_word_lambda(word: ReservedWord) -> Option<Lambda> {
    match word {
        ReservedWord::Begin => Some(Lambda { parameters: vec![], body: Expr::Variadic(VariadicOp::Begin, vec![]) }),
        ReservedWord::Quote => Some(Lambda { parameters: vec!["datum".to_owned()], body: Expr::var("datum") }),
        ReservedWord::If => Some(Lambda {
            parameters: vec!["test".to_owned(), "consequent".to_owned(), "alternative".to_owned()],
            body: Expr::If(
                Box::new(Expr::var("test")),
                Box::new(Expr::var("consequent")),
                Box::new(Expr::var("alternative")),
            ),
        }),
        ReservedWord::Cond | ReservedWord::Lambda | ReservedWord::Define
            | ReservedWord::Let | ReservedWord::Letrec | ReservedWord::Set => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, number::rational};

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Integer).collect()
    }

    #[test]
    fn tables_resolve_names() {
        assert_eq!(find_primitive("+"), Some(Primitive::Add));
        assert_eq!(find_primitive("set-cdr!"), Some(Primitive::SetCdr));
        assert_eq!(find_primitive("lambda"), None);
        assert_eq!(find_reserved_word("letrec"), Some(ReservedWord::Letrec));
        assert_eq!(find_reserved_word("car"), None);
        assert_eq!(Primitive::IsEq.name(), "eq?");
        assert_eq!(ReservedWord::Set.name(), "set!");
    }

    #[test]
    fn tables_do_not_overlap() {
        for (name, _) in PRIMITIVE_NAMES {
            assert!(find_reserved_word(name).is_none(), "{} is in both tables", name);
        }
    }

    #[test]
    fn variadic_arithmetic() -> anyhow::Result<()> {
        assert_eq!(VariadicOp::Add.apply(vec![])?, Value::Integer(0));
        assert_eq!(VariadicOp::Mul.apply(vec![])?, Value::Integer(1));
        assert_eq!(VariadicOp::Add.apply(ints(&[1, 2, 3, 4]))?, Value::Integer(10));
        assert_eq!(VariadicOp::Sub.apply(ints(&[5]))?, Value::Integer(-5));
        assert_eq!(VariadicOp::Sub.apply(ints(&[5, 2, 1]))?, Value::Integer(2));
        assert_eq!(VariadicOp::Div.apply(ints(&[4]))?, rational(1, 4)?);
        assert_eq!(VariadicOp::Div.apply(ints(&[12, 2, 3]))?, Value::Integer(2));
        assert_eq!(VariadicOp::Sub.apply(vec![]).unwrap_err().kind(), Some(ErrorKind::WrongArgumentCount));
        assert_eq!(VariadicOp::Div.apply(ints(&[1, 2, 0])).unwrap_err().kind(), Some(ErrorKind::DivisionByZero));
        Ok(())
    }

    #[test]
    fn variadic_comparisons_chain() -> anyhow::Result<()> {
        assert_eq!(VariadicOp::Less.apply(ints(&[1, 2, 3]))?, Value::Boolean(true));
        assert_eq!(VariadicOp::Less.apply(ints(&[1, 3, 2]))?, Value::Boolean(false));
        assert_eq!(VariadicOp::Equal.apply(ints(&[7]))?, Value::Boolean(true));
        assert_eq!(VariadicOp::GreaterEq.apply(ints(&[3, 3, 1]))?, Value::Boolean(true));

        let mixed = vec![Value::Integer(3), Value::Integer(1), Value::Boolean(true)];
        assert_eq!(VariadicOp::Greater.apply(mixed).unwrap_err().kind(), Some(ErrorKind::WrongOperandType));
        Ok(())
    }

    #[test]
    fn logical_operators_follow_scheme_truthiness() -> anyhow::Result<()> {
        assert_eq!(VariadicOp::And.apply(vec![])?, Value::Boolean(true));
        assert_eq!(VariadicOp::And.apply(ints(&[1, 2]))?, Value::Integer(2));
        assert_eq!(VariadicOp::And.apply(vec![Value::Integer(1), Value::Boolean(false)])?, Value::Boolean(false));
        assert_eq!(VariadicOp::Or.apply(vec![])?, Value::Boolean(false));
        assert_eq!(VariadicOp::Or.apply(vec![Value::Boolean(false), Value::Integer(3)])?, Value::Integer(3));
        assert_eq!(UnaryOp::Not.apply(Value::Integer(0))?, Value::Boolean(false));
        assert_eq!(UnaryOp::Not.apply(Value::Boolean(false))?, Value::Boolean(true));
        Ok(())
    }

    #[test]
    fn pair_operations() -> anyhow::Result<()> {
        let cell = BinaryOp::Cons.apply(Value::Integer(1), Value::Integer(2))?;
        assert_eq!(UnaryOp::Car.apply(cell.clone())?, Value::Integer(1));
        assert_eq!(BinaryOp::SetCdr.apply(cell.clone(), Value::Null)?, Value::Void);
        assert_eq!(cell.to_string(), "(1)");
        assert_eq!(UnaryOp::Cdr.apply(Value::Null).unwrap_err().kind(), Some(ErrorKind::WrongOperandType));
        Ok(())
    }

    #[test]
    fn type_predicates_accept_anything() -> anyhow::Result<()> {
        let samples = [Value::Integer(1), rational(1, 2)?, Value::Null, Value::string("s"), Value::symbol("s"), Value::Void];
        for sample in samples {
            for op in [UnaryOp::IsList, UnaryOp::IsBoolean, UnaryOp::IsNumber, UnaryOp::IsNull, UnaryOp::IsPair, UnaryOp::IsSymbol] {
                assert!(matches!(op.apply(sample.clone())?, Value::Boolean(_)));
            }
        }
        assert_eq!(UnaryOp::IsNumber.apply(rational(1, 2)?)?, Value::Boolean(true));
        assert_eq!(UnaryOp::IsInteger.apply(rational(1, 2)?)?, Value::Boolean(false));
        Ok(())
    }

    #[test]
    fn every_primitive_has_a_procedure_form() {
        for (_, primitive) in PRIMITIVE_NAMES {
            let lambda = primitive_lambda(primitive);
            let expected = match lambda.body {
                Expr::Unary(..) => 1,
                Expr::Binary(..) => 2,
                _ => 0,
            };
            assert_eq!(lambda.parameters.len(), expected, "{}", primitive.name());
        }
    }
}
