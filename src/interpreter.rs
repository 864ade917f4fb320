use std::rc::Rc;

use tracing::trace;

use crate::{
    env::Env,
    error::{ErrorKind, SchemeError, SchemeResult},
    expr::{Binding, Clause, Expr, Lambda},
    number,
    parser::{is_integer_literal, Syntax},
    primitives::{find_primitive, find_reserved_word, primitive_lambda, reserved_word_lambda, VariadicOp},
    value::{Procedure, ProcedureKind, Value},
};


/// Evaluates an analyzed expression. `env` is mutable because a `define`
/// reached during evaluation extends the chain it runs in.
pub fn evaluate(expr: &Expr, env: &mut Env) -> SchemeResult<Value> {
    match expr {
        Expr::Fixnum(n) => Ok(Value::Integer(*n)),
        Expr::RationalNum(numerator, denominator) => number::rational(*numerator, *denominator),
        Expr::StringExpr(s) => Ok(Value::String(s.clone())),
        Expr::True => Ok(Value::Boolean(true)),
        Expr::False => Ok(Value::Boolean(false)),
        Expr::MakeVoid => Ok(Value::Void),
        Expr::Exit => Ok(Value::Terminate),

        Expr::Var(name) => evaluate_var(name, env),

        Expr::Unary(op, operand) => op.apply(evaluate(operand, env)?),
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, env)?;
            let right = evaluate(right, env)?;
            op.apply(left, right)
        }
        Expr::Variadic(VariadicOp::And, operands) => evaluate_and(operands, env),
        Expr::Variadic(VariadicOp::Or, operands) => evaluate_or(operands, env),
        Expr::Variadic(op, operands) => op.apply(evaluate_list(operands, env)?),

        Expr::Begin(forms) => evaluate_sequence(forms, env),
        Expr::If(test, consequent, alternative) => {
            if evaluate(test, env)?.is_truthy() {
                evaluate(consequent, env)
            } else {
                evaluate(alternative, env)
            }
        }
        Expr::Cond(clauses) => evaluate_cond(clauses, env),
        Expr::Lambda(lambda) => Ok(Value::procedure(lambda.clone(), env.clone(), ProcedureKind::Closure)),
        Expr::Define(name, value) => evaluate_define(name, value, env),
        Expr::Let(bindings, body) => evaluate_let(bindings, body, env),
        Expr::Letrec(bindings, body) => evaluate_letrec(bindings, body, env),
        Expr::Set(name, value) => {
            let value = evaluate(value, env)?;
            // Analysis saw a binding, but an inner define may not have run
            if !env.contains(name) { return Err(SchemeError::unbound(name)); }
            env.modify(name, value)?;
            Ok(Value::Void)
        }
        Expr::Apply(operator, operands) => evaluate_apply(operator, operands, env),
        Expr::Quote(datum) => quote(datum),
    }
}

fn evaluate_list(exprs: &[Expr], env: &mut Env) -> SchemeResult<Vec<Value>> {
    exprs.iter().map(|expr| evaluate(expr, env)).collect()
}

fn evaluate_sequence(forms: &[Expr], env: &mut Env) -> SchemeResult<Value> {
    // Runs every form in order and returns the last value, void when empty

    let mut result = Value::Void;
    for form in forms {
        result = evaluate(form, env)?;
    }
    Ok(result)
}

fn evaluate_and(operands: &[Expr], env: &mut Env) -> SchemeResult<Value> {
    let mut result = Value::Boolean(true);
    for operand in operands {
        result = evaluate(operand, env)?;
        if !result.is_truthy() { break; }
    }
    Ok(result)
}

fn evaluate_or(operands: &[Expr], env: &mut Env) -> SchemeResult<Value> {
    for operand in operands {
        let value = evaluate(operand, env)?;
        if value.is_truthy() { return Ok(value); }
    }
    Ok(Value::Boolean(false))
}

fn evaluate_cond(clauses: &[Clause], env: &mut Env) -> SchemeResult<Value> {
    // The first clause whose test is not #f wins. A clause without a body
    // yields the test value itself

    for clause in clauses {
        let test = evaluate(&clause.test, env)?;
        if !test.is_truthy() { continue; }

        if clause.body.is_empty() { return Ok(test); }
        return evaluate_sequence(&clause.body, env);
    }

    Err(SchemeError::new(ErrorKind::NoMatchingClause, "cond: no clause matched"))
}

fn is_identifier(name: &str) -> bool {
    let Some(first) = name.chars().next() else { return false };
    !matches!(first, '.' | '@') && !first.is_ascii_digit()
        && !name.contains(['#', '\'', '"', '`'])
}

fn evaluate_var(name: &str, env: &Env) -> SchemeResult<Value> {
    // Digit strings the reader could not fit in a fixnum arrive here as names

    if is_integer_literal(name) {
        return name.parse().map(Value::Integer).map_err(|_| SchemeError::overflow());
    }
    if !is_identifier(name) {
        return Err(SchemeError::new(ErrorKind::UnboundVariable, format!("`{}` is not a valid identifier", name)));
    }

    if let Some(value) = env.find(name) {
        return Ok(value);
    }

    if let Some(primitive) = find_primitive(name) {
        return Ok(synthesized(primitive_lambda(primitive)));
    }
    if let Some(word) = find_reserved_word(name) {
        return match reserved_word_lambda(word) {
            Some(lambda) => Ok(synthesized(lambda)),
            None => Err(SchemeError::malformed(word.name(), "special form cannot be used as a value")),
        };
    }

    Err(SchemeError::unbound(name))
}

fn synthesized(lambda: Lambda) -> Value {
    Value::procedure(Rc::new(lambda), Env::empty(), ProcedureKind::Primitive)
}

fn evaluate_define(name: &str, value: &Expr, env: &mut Env) -> SchemeResult<Value> {
    // A procedure is bound before it is built so its body can see itself:
    // the closure captures the chain holding the placeholder, which is then
    // overwritten in place

    if let Expr::Lambda(_) = value {
        *env = env.extend(name, Value::Null);
        let procedure = evaluate(value, env)?;
        env.modify(name, procedure)?;
    } else {
        let value = evaluate(value, env)?;
        *env = env.extend(name, value);
    }

    Ok(Value::Void)
}

fn evaluate_let(bindings: &[Binding], body: &Expr, env: &mut Env) -> SchemeResult<Value> {
    // Every value is computed in the outer chain before any name is bound

    let values = bindings.iter()
        .map(|binding| evaluate(&binding.value, env))
        .collect::<SchemeResult<Vec<_>>>()?;

    let mut scope = bindings.iter()
        .zip(values)
        .fold(env.clone(), |scope, (binding, value)| scope.extend(&binding.name, value));

    evaluate(body, &mut scope)
}

fn evaluate_letrec(bindings: &[Binding], body: &Expr, env: &mut Env) -> SchemeResult<Value> {
    // Bind every name to a placeholder, then fill the cells in order. A
    // value that reads a later binding early sees the placeholder

    let mut scope = bindings.iter()
        .fold(env.clone(), |scope, binding| scope.extend(&binding.name, Value::Null));

    for binding in bindings {
        let value = evaluate(&binding.value, &mut scope)?;
        scope.modify(&binding.name, value)?;
    }

    evaluate(body, &mut scope)
}

fn evaluate_apply(operator: &Expr, operands: &[Expr], env: &mut Env) -> SchemeResult<Value> {
    // The operator is evaluated and checked before any argument

    let procedure = match evaluate(operator, env)? {
        Value::Procedure(procedure) => procedure,
        other => return Err(SchemeError::not_a_procedure(other)),
    };
    let arguments = evaluate_list(operands, env)?;

    apply(&procedure, arguments)
}

/// Calls `procedure` with already evaluated arguments.
pub fn apply(procedure: &Procedure, arguments: Vec<Value>) -> SchemeResult<Value> {
    let parameters = procedure.parameters();

    if arguments.len() != parameters.len() {
        return match procedure.kind() {
            ProcedureKind::Primitive => dispatch_by_arity(procedure, arguments),
            ProcedureKind::Closure => Err(SchemeError::arity(format!(
                "procedure expects {} argument(s), got {}", parameters.len(), arguments.len()
            ))),
        };
    }

    let mut frame = parameters.iter()
        .zip(arguments)
        .fold(procedure.env.clone(), |frame, (name, value)| frame.extend(name, value));

    evaluate(&procedure.lambda.body, &mut frame)
}

fn dispatch_by_arity(procedure: &Procedure, arguments: Vec<Value>) -> SchemeResult<Value> {
    // Variadic primitives declare no parameters, so any non-empty call lands
    // here and goes straight to the operator

    match &procedure.lambda.body {
        Expr::Variadic(op, _) => {
            trace!(?op, count = arguments.len(), "dispatching variadic primitive");
            op.apply(arguments)
        }
        _ => Err(SchemeError::arity(format!(
            "primitive expects {} argument(s), got {}", procedure.parameters().len(), arguments.len()
        ))),
    }
}

/// Turns quoted syntax into data. Lists become proper lists unless the
/// second to last element is a lone `.`, which makes the last element the
/// final tail.
pub fn quote(datum: &Syntax) -> SchemeResult<Value> {
    match datum {
        Syntax::Number(n) => Ok(Value::Integer(*n)),
        Syntax::Rational(numerator, denominator) => number::rational(*numerator, *denominator),
        Syntax::String(s) => Ok(Value::string(s)),
        Syntax::True => Ok(Value::Boolean(true)),
        Syntax::False => Ok(Value::Boolean(false)),
        Syntax::Symbol(name) => Ok(Value::symbol(name)),
        Syntax::List(items) => {
            let (items, tail) = match items.as_slice() {
                [init @ .., dot, last] if dot.is_dot() => {
                    if init.is_empty() { return Err(SchemeError::malformed("quote", "nothing before `.`")); }
                    (init, quote(last)?)
                }
                items => (items, Value::Null),
            };
            if items.iter().any(Syntax::is_dot) {
                return Err(SchemeError::malformed("quote", "misplaced `.`"));
            }

            let values = items.iter().map(quote).collect::<SchemeResult<Vec<_>>>()?;
            Ok(Value::list_with_tail(values, tail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyzer::analyze, parser::{parse, parse_all}};

    /// Runs `program` in a fresh environment and returns the last value.
    fn run(program: &str) -> SchemeResult<Value> {
        let mut env = Env::empty();
        let mut result = Value::Void;
        for form in parse_all(program)? {
            let expr = analyze(&form, &mut env)?;
            result = evaluate(&expr, &mut env)?;
        }
        Ok(result)
    }

    fn error_kind(program: &str) -> Option<ErrorKind> {
        run(program).err().and_then(|e| e.kind())
    }

    #[test]
    fn literals() -> anyhow::Result<()> {
        assert_eq!(run("42")?, Value::Integer(42));
        assert_eq!(run("6/4")?, number::rational(3, 2)?);
        assert_eq!(run("4/2")?, Value::Integer(2));
        assert_eq!(run("\"hi\"")?, Value::string("hi"));
        assert_eq!(run("#f")?, Value::Boolean(false));
        Ok(())
    }

    #[test]
    fn arithmetic_is_exact() -> anyhow::Result<()> {
        assert_eq!(run("(+ 1/2 1/3)")?.to_string(), "5/6");
        assert_eq!(run("(* 2/3 3/2)")?, Value::Integer(1));
        assert_eq!(run("(- 1/2)")?.to_string(), "-1/2");
        assert_eq!(run("(/ 3)")?.to_string(), "1/3");
        assert_eq!(run("(+ 1 2 3 4 5)")?, Value::Integer(15));
        assert_eq!(run("(expt 2 10)")?, Value::Integer(1024));
        assert_eq!(run("(modulo 7 3)")?, Value::Integer(1));
        assert_eq!(error_kind("(/ 1 0)"), Some(ErrorKind::DivisionByZero));
        assert_eq!(error_kind("(* 9223372036854775807 2)"), Some(ErrorKind::IntegerOverflow));
        Ok(())
    }

    #[test]
    fn closures_capture_their_environment() -> anyhow::Result<()> {
        let program = "
            (define (make-adder n) (lambda (x) (+ x n)))
            (define add5 (make-adder 5))
            (add5 10)";
        assert_eq!(run(program)?, Value::Integer(15));
        Ok(())
    }

    #[test]
    fn recursive_define() -> anyhow::Result<()> {
        let program = "
            (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))
            (fact 20)";
        assert_eq!(run(program)?, Value::Integer(2432902008176640000));
        Ok(())
    }

    #[test]
    fn letrec_supports_mutual_recursion() -> anyhow::Result<()> {
        let program = "
            (letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
                     (odd? (lambda (n) (if (= n 0) #f (even? (- n 1))))))
              (even? 100))";
        assert_eq!(run(program)?, Value::Boolean(true));
        Ok(())
    }

    #[test]
    fn let_values_do_not_see_each_other() {
        assert_eq!(error_kind("(let ((x 1) (y x)) y)"), Some(ErrorKind::UnboundVariable));
    }

    #[test]
    fn set_mutates_the_captured_binding() -> anyhow::Result<()> {
        let program = "
            (define counter
              (let ((count 0))
                (lambda () (set! count (+ count 1)) count)))
            (counter)
            (counter)";
        assert_eq!(run(program)?, Value::Integer(2));
        Ok(())
    }

    #[test]
    fn cond_clauses() -> anyhow::Result<()> {
        assert_eq!(run("(cond (#f 1) ((+ 1 1)) (else 3))")?, Value::Integer(2));
        assert_eq!(run("(cond ((< 2 1) 'a) (else 'b 'c))")?, Value::symbol("c"));
        assert_eq!(error_kind("(cond (#f 1))"), Some(ErrorKind::NoMatchingClause));
        Ok(())
    }

    #[test]
    fn cond_tests_run_once() -> anyhow::Result<()> {
        let counted = "(define n 0) (list (cond ((begin (set! n (+ n 1)) #t) 1 2 3)) n)";
        assert_eq!(run(counted)?.to_string(), "(3 1)");

        // A failing test, then a test with no body whose value is the result
        let fallthrough = "(define n 0) (cond ((begin (set! n (+ n 1)) #f) 'no) ((begin (set! n (+ n 10)) n)))";
        assert_eq!(run(fallthrough)?, Value::Integer(11));
        Ok(())
    }

    #[test]
    fn and_or_short_circuit() -> anyhow::Result<()> {
        assert_eq!(run("(and 1 #f (car '()))")?, Value::Boolean(false));
        assert_eq!(run("(or #f 2 (car '()))")?, Value::Integer(2));
        assert_eq!(run("(and)")?, Value::Boolean(true));
        assert_eq!(run("(or)")?, Value::Boolean(false));
        Ok(())
    }

    #[test]
    fn quote_builds_data() -> anyhow::Result<()> {
        assert_eq!(run("'(1 (2 3) . 4)")?.to_string(), "(1 (2 3) . 4)");
        assert_eq!(run("'(a (b c))")?.to_string(), "(a (b c))");
        assert_eq!(run("'()")?, Value::Null);
        assert_eq!(run("()")?, Value::Null);
        assert_eq!(run("'sym")?, Value::symbol("sym"));
        assert_eq!(error_kind("'(1 . 2 3)"), Some(ErrorKind::MalformedForm));
        assert_eq!(error_kind("'(. 2)"), Some(ErrorKind::MalformedForm));
        Ok(())
    }

    #[test]
    fn quote_gives_equal_data_every_time() -> anyhow::Result<()> {
        let mut env = Env::empty();
        let expr = analyze(&parse("'(1 (2 . 3) \"s\" sym 1/2)")?, &mut env)?;

        let first = evaluate(&expr, &mut env)?;
        let second = evaluate(&expr, &mut env)?;
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "(1 (2 . 3) \"s\" sym 1/2)");
        Ok(())
    }

    #[test]
    fn primitives_are_first_class() -> anyhow::Result<()> {
        assert_eq!(run("(define (fold f acc xs) (if (null? xs) acc (fold f (f acc (car xs)) (cdr xs)))) (fold + 0 '(1 2 3))")?, Value::Integer(6));
        assert_eq!(run("(define plus +) (plus)")?, Value::Integer(0));
        assert_eq!(run("(define plus +) (plus 7)")?, Value::Integer(7));
        assert_eq!(run("(define minus -) (minus 7)")?, Value::Integer(-7));
        assert_eq!(run("(define lt <) (lt 1 2 3)")?, Value::Boolean(true));
        assert_eq!(run("((lambda (f) (f 1 2)) cons)")?.to_string(), "(1 . 2)");
        assert_eq!(run("(procedure? car)")?, Value::Boolean(true));
        assert_eq!(error_kind("(define first car) (first 1 2)"), Some(ErrorKind::WrongArgumentCount));
        Ok(())
    }

    #[test]
    fn special_forms_as_values() -> anyhow::Result<()> {
        assert_eq!(run("((lambda (f) (f 1 2 3)) begin)")?, Value::Integer(3));
        assert_eq!(run("((lambda (f) (f)) begin)")?, Value::Void);
        assert_eq!(run("((lambda (f) (f #f 1 2)) if)")?, Value::Integer(2));
        assert_eq!(run("((lambda (q) (q 5)) quote)")?, Value::Integer(5));
        assert_eq!(error_kind("((lambda (f) f) lambda)"), Some(ErrorKind::MalformedForm));
        Ok(())
    }

    #[test]
    fn user_bindings_shadow_primitives() -> anyhow::Result<()> {
        assert_eq!(run("(define (car x) 'mine) (car '(1 2))")?, Value::symbol("mine"));
        assert_eq!(run("(let ((if (lambda (a b c) c))) (if #t 1 2))")?, Value::Integer(2));
        assert_eq!(error_kind("(let ((+ 10)) (+ 1 2))"), Some(ErrorKind::NotAProcedure));
        Ok(())
    }

    #[test]
    fn closures_check_argument_count() {
        assert_eq!(error_kind("((lambda (x) x))"), Some(ErrorKind::WrongArgumentCount));
        assert_eq!(error_kind("((lambda () 1) 2)"), Some(ErrorKind::WrongArgumentCount));
    }

    #[test]
    fn application_errors() {
        assert_eq!(error_kind("(1 2)"), Some(ErrorKind::NotAProcedure));
        assert_eq!(error_kind("(undefined-thing 1)"), Some(ErrorKind::UnboundVariable));
        assert_eq!(error_kind("(car 1)"), Some(ErrorKind::WrongOperandType));
        assert_eq!(error_kind("(+ 1 #t)"), Some(ErrorKind::WrongOperandType));
    }

    #[test]
    fn oversized_literals_overflow() {
        assert_eq!(error_kind("99999999999999999999"), Some(ErrorKind::IntegerOverflow));
    }

    #[test]
    fn pairs_are_shared_and_mutable() -> anyhow::Result<()> {
        let program = "
            (define p (cons 1 2))
            (define q p)
            (set-car! q 10)
            (car p)";
        assert_eq!(run(program)?, Value::Integer(10));
        assert_eq!(run("(define p (list 1 2)) (eq? p p)")?, Value::Boolean(true));
        assert_eq!(run("(eq? (list 1) (list 1))")?, Value::Boolean(false));
        Ok(())
    }

    #[test]
    fn set_of_a_define_that_never_ran() {
        let program = "((lambda () (if #f (define y 1) 0) (set! y 2)))";
        assert_eq!(error_kind(program), Some(ErrorKind::UnboundVariable));
    }

    #[test]
    fn empty_begin_is_void() -> anyhow::Result<()> {
        assert_eq!(run("(begin)")?, Value::Void);
        assert_eq!(run("(begin 1 2)")?, Value::Integer(2));
        Ok(())
    }
}
