use std::rc::Rc;

use tracing::trace;

use crate::{
    env::Env,
    error::{SchemeError, SchemeResult},
    expr::{Binding, Clause, Expr},
    parser::Syntax,
    primitives::{find_primitive, find_reserved_word, BinaryOp, Primitive, ReservedWord, UnaryOp, VariadicOp},
    value::Value,
};


/// Turns one syntax tree into an expression tree.
///
/// `env` tracks which names are bound at this point of the program, so a
/// user binding can shadow a primitive or a special form. Only the names
/// matter; analysis binds placeholders and never reads their values.
/// A `define` extends `env` in place so later forms see the name.
pub fn analyze(syntax: &Syntax, env: &mut Env) -> SchemeResult<Expr> {
    match syntax {
        Syntax::Number(n) => Ok(Expr::Fixnum(*n)),
        Syntax::Rational(numerator, denominator) => Ok(Expr::RationalNum(*numerator, *denominator)),
        Syntax::String(s) => Ok(Expr::StringExpr(Rc::from(s.as_str()))),
        Syntax::True => Ok(Expr::True),
        Syntax::False => Ok(Expr::False),
        Syntax::Symbol(name) => Ok(Expr::Var(name.clone())),
        Syntax::List(items) => analyze_list(items, env),
    }
}

fn analyze_list(items: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    // The operator name is resolved in three tiers: a name bound in the
    // environment is always a user procedure, then the primitive table, then
    // the reserved words. Anything else is an ordinary application

    let Some((operator, operands)) = items.split_first() else {
        return Ok(Expr::Quote(Syntax::List(vec![])));
    };

    if let Some(name) = operator.as_symbol() {
        if !env.contains(name) {
            if let Some(primitive) = find_primitive(name) {
                let operands = analyze_all(operands, env)?;
                return specialize(primitive, operands);
            }
            if let Some(word) = find_reserved_word(name) {
                return analyze_special_form(word, operands, env);
            }
        }
    }

    analyze_application(operator, operands, env)
}

fn analyze_all(items: &[Syntax], env: &mut Env) -> SchemeResult<Vec<Expr>> {
    items.iter().map(|item| analyze(item, env)).collect()
}

fn analyze_application(operator: &Syntax, operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    let operator = analyze(operator, env)?;
    let operands = analyze_all(operands, env)?;
    Ok(Expr::Apply(Box::new(operator), operands))
}

fn exactly<const N: usize>(name: &str, operands: Vec<Expr>) -> SchemeResult<[Expr; N]> {
    let count = operands.len();
    operands.try_into().map_err(|_| {
        SchemeError::arity(format!("{} expects {} argument(s), got {}", name, N, count))
    })
}

/// Picks the node for a primitive application from the number of operands.
fn specialize(primitive: Primitive, operands: Vec<Expr>) -> SchemeResult<Expr> {
    use Primitive as P;

    let name = primitive.name();
    let count = operands.len();
    let unary = |op: UnaryOp, operands: Vec<Expr>| -> SchemeResult<Expr> {
        let [operand] = exactly(name, operands)?;
        Ok(Expr::unary(op, operand))
    };
    let binary = |op: BinaryOp, operands: Vec<Expr>| -> SchemeResult<Expr> {
        let [left, right] = exactly(name, operands)?;
        Ok(Expr::binary(op, left, right))
    };
    let at_least_one = || SchemeError::arity(format!("{} expects at least one argument", name));

    trace!(primitive = name, count, "specializing primitive application");

    match primitive {
        // `+` and `*` fold an identity in on the left of short applications
        P::Add | P::Mul => {
            let (binary_op, variadic_op, identity) = match primitive {
                P::Add => (BinaryOp::Add, VariadicOp::Add, 0),
                _ => (BinaryOp::Mul, VariadicOp::Mul, 1),
            };
            match count {
                0 => Ok(Expr::binary(binary_op, Expr::Fixnum(identity), Expr::Fixnum(identity))),
                1 => {
                    let [operand] = exactly(name, operands)?;
                    Ok(Expr::binary(binary_op, Expr::Fixnum(identity), operand))
                }
                2 => binary(binary_op, operands),
                _ => Ok(Expr::Variadic(variadic_op, operands)),
            }
        }
        P::Sub => match count {
            0 => Err(at_least_one()),
            1 => {
                let [operand] = exactly(name, operands)?;
                Ok(Expr::binary(BinaryOp::Mul, Expr::Fixnum(-1), operand))
            }
            2 => binary(BinaryOp::Sub, operands),
            _ => Ok(Expr::Variadic(VariadicOp::Sub, operands)),
        },
        P::Div => match count {
            0 => Err(at_least_one()),
            1 => {
                let [operand] = exactly(name, operands)?;
                Ok(Expr::binary(BinaryOp::Div, Expr::Fixnum(1), operand))
            }
            2 => binary(BinaryOp::Div, operands),
            _ => Ok(Expr::Variadic(VariadicOp::Div, operands)),
        },
        P::Less | P::LessEq | P::Equal | P::GreaterEq | P::Greater => {
            let (binary_op, variadic_op) = match primitive {
                P::Less => (BinaryOp::Less, VariadicOp::Less),
                P::LessEq => (BinaryOp::LessEq, VariadicOp::LessEq),
                P::Equal => (BinaryOp::Equal, VariadicOp::Equal),
                P::GreaterEq => (BinaryOp::GreaterEq, VariadicOp::GreaterEq),
                _ => (BinaryOp::Greater, VariadicOp::Greater),
            };
            match count {
                0 => Err(at_least_one()),
                2 => binary(binary_op, operands),
                _ => Ok(Expr::Variadic(variadic_op, operands)),
            }
        }

        P::And => Ok(Expr::Variadic(VariadicOp::And, operands)),
        P::Or => Ok(Expr::Variadic(VariadicOp::Or, operands)),
        P::List => Ok(Expr::Variadic(VariadicOp::List, operands)),

        P::Modulo => binary(BinaryOp::Modulo, operands),
        P::Expt => binary(BinaryOp::Expt, operands),
        P::Cons => binary(BinaryOp::Cons, operands),
        P::SetCar => binary(BinaryOp::SetCar, operands),
        P::SetCdr => binary(BinaryOp::SetCdr, operands),
        P::IsEq => binary(BinaryOp::IsEq, operands),

        P::Not => unary(UnaryOp::Not, operands),
        P::Car => unary(UnaryOp::Car, operands),
        P::Cdr => unary(UnaryOp::Cdr, operands),
        P::Display => unary(UnaryOp::Display, operands),
        P::IsList => unary(UnaryOp::IsList, operands),
        P::IsBoolean => unary(UnaryOp::IsBoolean, operands),
        P::IsNumber => unary(UnaryOp::IsNumber, operands),
        P::IsInteger => unary(UnaryOp::IsInteger, operands),
        P::IsNull => unary(UnaryOp::IsNull, operands),
        P::IsPair => unary(UnaryOp::IsPair, operands),
        P::IsProcedure => unary(UnaryOp::IsProcedure, operands),
        P::IsSymbol => unary(UnaryOp::IsSymbol, operands),
        P::IsString => unary(UnaryOp::IsString, operands),

        P::Void => {
            let [] = exactly(name, operands)?;
            Ok(Expr::MakeVoid)
        }
        P::Exit => {
            let [] = exactly(name, operands)?;
            Ok(Expr::Exit)
        }
    }
}

fn analyze_special_form(word: ReservedWord, operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    match word {
        ReservedWord::Quote => analyze_quote(operands),
        ReservedWord::Begin => Ok(Expr::Begin(analyze_all(operands, env)?)),
        ReservedWord::If => analyze_if(operands, env),
        ReservedWord::Cond => analyze_cond(operands, env),
        ReservedWord::Lambda => analyze_lambda(operands, env),
        ReservedWord::Define => analyze_define(operands, env),
        ReservedWord::Let => analyze_let(operands, env),
        ReservedWord::Letrec => analyze_letrec(operands, env),
        ReservedWord::Set => analyze_set(operands, env),
    }
}

fn analyze_quote(operands: &[Syntax]) -> SchemeResult<Expr> {
    match operands {
        [datum] => Ok(Expr::Quote(datum.clone())),
        _ => Err(SchemeError::malformed("quote", "expected exactly one datum")),
    }
}

fn analyze_if(operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    let [test, consequent, alternative] = operands else {
        return Err(SchemeError::malformed("if", "expected a test, a consequent and an alternative"));
    };

    Ok(Expr::If(
        Box::new(analyze(test, env)?),
        Box::new(analyze(consequent, env)?),
        Box::new(analyze(alternative, env)?),
    ))
}

fn analyze_cond(operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    // Every clause is a non-empty list: a test followed by any number of body
    // forms. The test `else` always succeeds

    if operands.is_empty() { return Err(SchemeError::malformed("cond", "expected at least one clause")); }

    let clauses = operands.iter().map(|clause| -> SchemeResult<Clause> {
        let Syntax::List(items) = clause else {
            return Err(SchemeError::malformed("cond", "clauses must be lists"));
        };
        let Some((test, body)) = items.split_first() else {
            return Err(SchemeError::malformed("cond", "empty clause"));
        };

        let test = match test.as_symbol() {
            Some("else") => Expr::True,
            _ => analyze(test, env)?,
        };
        Ok(Clause { test, body: analyze_all(body, env)? })
    }).collect::<SchemeResult<Vec<_>>>()?;

    Ok(Expr::Cond(clauses))
}

fn parameter_names(form: &str, parameters: &[Syntax]) -> SchemeResult<Vec<String>> {
    parameters.iter()
        .map(|parameter| match parameter {
            Syntax::Symbol(name) if name != "." => Ok(name.clone()),
            _ => Err(SchemeError::malformed(form, "parameters must be identifiers")),
        })
        .collect()
}

fn placeholders(env: &Env, names: impl IntoIterator<Item = impl AsRef<str>>) -> Env {
    names.into_iter().fold(env.clone(), |env, name| env.extend(name.as_ref(), Value::Void))
}

/// A body of several forms runs them in order, like `begin`.
fn analyze_body(body: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    match body {
        [single] => analyze(single, env),
        body => Ok(Expr::Begin(analyze_all(body, env)?)),
    }
}

fn analyze_lambda(operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    let [Syntax::List(parameters), body @ ..] = operands else {
        return Err(SchemeError::malformed("lambda", "expected a parameter list"));
    };
    if body.is_empty() { return Err(SchemeError::malformed("lambda", "expected a body")); }

    let parameters = parameter_names("lambda", parameters)?;
    let mut body_env = placeholders(env, &parameters);
    let body = analyze_body(body, &mut body_env)?;

    Ok(Expr::lambda(parameters, body))
}

fn analyze_define(operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    // Either `(define name value)` or the procedure shorthand
    // `(define (name parameter...) body...)`. The name is bound before the
    // value is analyzed so recursive references resolve to it

    match operands {
        [Syntax::Symbol(name), value] => {
            *env = env.extend(name, Value::Void);
            let value = analyze(value, env)?;
            Ok(Expr::Define(name.clone(), Box::new(value)))
        }
        [Syntax::Symbol(_), ..] => Err(SchemeError::malformed("define", "expected a name and one value")),
        [Syntax::List(signature), body @ ..] if !body.is_empty() => {
            let mut names = parameter_names("define", signature)?;
            if names.is_empty() { return Err(SchemeError::malformed("define", "expected a procedure name")); }
            let name = names.remove(0);

            *env = env.extend(&name, Value::Void);
            let mut body_env = placeholders(env, &names);
            let body = analyze_body(body, &mut body_env)?;

            Ok(Expr::Define(name, Box::new(Expr::lambda(names, body))))
        }
        _ => Err(SchemeError::malformed("define", "expected a name or a signature followed by a body")),
    }
}

fn analyze_bindings(form: &str, bindings: &Syntax) -> SchemeResult<Vec<(String, Syntax)>> {
    let Syntax::List(bindings) = bindings else {
        return Err(SchemeError::malformed(form, "expected a binding list"));
    };

    bindings.iter().map(|binding| match binding {
        Syntax::List(pair) => match pair.as_slice() {
            [Syntax::Symbol(name), value] if name != "." => Ok((name.clone(), value.clone())),
            _ => Err(SchemeError::malformed(form, "bindings must be (name value)")),
        },
        _ => Err(SchemeError::malformed(form, "bindings must be (name value)")),
    }).collect()
}

fn analyze_let(operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    // Binding values are analyzed outside the new scope, the body inside it

    let [bindings, body @ ..] = operands else {
        return Err(SchemeError::malformed("let", "expected bindings and a body"));
    };
    if body.is_empty() { return Err(SchemeError::malformed("let", "expected a body")); }

    let bindings = analyze_bindings("let", bindings)?.into_iter()
        .map(|(name, value)| -> SchemeResult<Binding> { Ok(Binding { value: analyze(&value, env)?, name }) })
        .collect::<SchemeResult<Vec<_>>>()?;

    let mut body_env = placeholders(env, bindings.iter().map(|binding| &binding.name));
    let body = analyze_body(body, &mut body_env)?;

    Ok(Expr::Let(bindings, Box::new(body)))
}

fn analyze_letrec(operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    // Every name is in scope for every binding value and for the body

    let [bindings, body @ ..] = operands else {
        return Err(SchemeError::malformed("letrec", "expected bindings and a body"));
    };
    if body.is_empty() { return Err(SchemeError::malformed("letrec", "expected a body")); }

    let bindings = analyze_bindings("letrec", bindings)?;
    let mut body_env = placeholders(env, bindings.iter().map(|(name, _)| name));

    let bindings = bindings.into_iter()
        .map(|(name, value)| -> SchemeResult<Binding> { Ok(Binding { value: analyze(&value, &mut body_env)?, name }) })
        .collect::<SchemeResult<Vec<_>>>()?;
    let body = analyze_body(body, &mut body_env)?;

    Ok(Expr::Letrec(bindings, Box::new(body)))
}

fn analyze_set(operands: &[Syntax], env: &mut Env) -> SchemeResult<Expr> {
    let [Syntax::Symbol(name), value] = operands else {
        return Err(SchemeError::malformed("set!", "expected a name and a value"));
    };
    if !env.contains(name) { return Err(SchemeError::unbound(name)); }

    let value = analyze(value, env)?;
    Ok(Expr::Set(name.clone(), Box::new(value)))
}
