use core::fmt;
use std::{cell::RefCell, collections::HashSet, rc::Rc};

use crate::{env::Env, expr::Lambda, number::Rational};


/// Runtime values. Everything except pair cells is immutable once built,
/// and cloning a value only bumps reference counts.
#[derive(Clone)]
pub enum Value {
    Integer(i64),
    Rational(Rational),
    Boolean(bool),
    String(Rc<str>),
    Symbol(Rc<str>),
    Pair(Rc<Pair>),
    Null,
    Void,
    /// Returned by `(exit)`; tells the driver to stop.
    Terminate,
    Procedure(Rc<Procedure>),
}

/// A cons cell. Both slots can be replaced in place, which is how
/// `set-car!`/`set-cdr!` build shared and cyclic structure.
pub struct Pair {
    car: RefCell<Value>,
    cdr: RefCell<Value>,
}

impl Pair {
    pub fn car(&self) -> Value {
        self.car.borrow().clone()
    }

    pub fn cdr(&self) -> Value {
        self.cdr.borrow().clone()
    }

    pub fn set_car(&self, value: Value) {
        *self.car.borrow_mut() = value;
    }

    pub fn set_cdr(&self, value: Value) {
        *self.cdr.borrow_mut() = value;
    }
}

/// Whether a procedure came from a `lambda` or was synthesized for a
/// primitive or special form named in operator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Closure,
    Primitive,
}

pub struct Procedure {
    pub(crate) lambda: Rc<Lambda>,
    pub(crate) env: Env,
    pub(crate) kind: ProcedureKind,
}

impl Procedure {
    pub fn parameters(&self) -> &[String] {
        &self.lambda.parameters
    }

    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Self {
        Self::Pair(Rc::new(Pair { car: RefCell::new(car), cdr: RefCell::new(cdr) }))
    }

    pub fn string(s: &str) -> Self {
        Self::String(Rc::from(s))
    }

    pub fn symbol(s: &str) -> Self {
        Self::Symbol(Rc::from(s))
    }

    pub(crate) fn procedure(lambda: Rc<Lambda>, env: Env, kind: ProcedureKind) -> Self {
        Self::Procedure(Rc::new(Procedure { lambda, env, kind }))
    }

    /// Builds a proper list ending in `tail`.
    pub fn list_with_tail<I>(values: I, tail: Value) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        values.into_iter().rev().fold(tail, |cdr, car| Value::cons(car, cdr))
    }

    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        Self::list_with_tail(values, Value::Null)
    }

    /// Everything but `#f` counts as true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// A proper, finite list: a chain of pairs ending in `()`.
    pub fn is_list(&self) -> bool {
        // Floyd's cycle check, a cyclic chain is not a list
        let (mut slow, mut fast) = (self.clone(), self.clone());
        loop {
            for _ in 0..2 {
                fast = match fast {
                    Value::Null => return true,
                    Value::Pair(pair) => pair.cdr(),
                    _ => return false,
                };
            }
            slow = match slow {
                Value::Pair(pair) => pair.cdr(),
                _ => return false,
            };
            if let (Value::Pair(a), Value::Pair(b)) = (&slow, &fast) {
                if Rc::ptr_eq(a, b) { return false; }
            }
        }
    }

    /// `eq?`: small immediates compare by value, everything else by identity.
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Writes the value the way `display` shows it: strings without quotes.
    pub fn display(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

/// Structural equality. Procedures are only equal to themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equal(self, other, &mut HashSet::new())
    }
}

/// Walks both structures in step. A pair of cells met a second time is
/// taken as equal, so cyclic structures compare in finite time.
fn equal(left: &Value, right: &Value, seen: &mut HashSet<(*const Pair, *const Pair)>) -> bool {
    let (mut left, mut right) = (left.clone(), right.clone());
    loop {
        let (next_left, next_right) = match (&left, &right) {
            (Value::Pair(a), Value::Pair(b)) => {
                if Rc::ptr_eq(a, b) || !seen.insert((Rc::as_ptr(a), Rc::as_ptr(b))) { return true; }
                if !equal(&a.car(), &b.car(), seen) { return false; }
                (a.cdr(), b.cdr())
            }
            (Value::Integer(a), Value::Integer(b)) => return a == b,
            (Value::Rational(a), Value::Rational(b)) => return a == b,
            (Value::Boolean(a), Value::Boolean(b)) => return a == b,
            (Value::String(a), Value::String(b)) => return a == b,
            (Value::Symbol(a), Value::Symbol(b)) => return a == b,
            (Value::Null, Value::Null) | (Value::Void, Value::Void) | (Value::Terminate, Value::Terminate) => return true,
            (Value::Procedure(a), Value::Procedure(b)) => return Rc::ptr_eq(a, b),
            _ => return false,
        };
        left = next_left;
        right = next_right;
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            ch => write!(f, "{}", ch)?,
        }
    }
    f.write_str("\"")
}

/// `active` holds the cells of every list still being written. Reaching
/// one of them again means the structure is cyclic, and `...` stands in
/// for the repeat.
fn write_pair(f: &mut fmt::Formatter<'_>, pair: &Rc<Pair>, active: &mut HashSet<*const Pair>) -> fmt::Result {
    let mut chain = vec![Rc::as_ptr(pair)];
    active.insert(Rc::as_ptr(pair));

    f.write_str("(")?;
    write_element(f, &pair.car(), active)?;
    let mut rest = pair.cdr();
    loop {
        rest = match rest {
            Value::Null => break,
            Value::Pair(next) if active.contains(&Rc::as_ptr(&next)) => {
                f.write_str(" ...")?;
                break;
            }
            Value::Pair(next) => {
                chain.push(Rc::as_ptr(&next));
                active.insert(Rc::as_ptr(&next));
                f.write_str(" ")?;
                write_element(f, &next.car(), active)?;
                next.cdr()
            }
            tail => {
                write!(f, " . {}", tail)?;
                break;
            }
        };
    }

    for cell in chain {
        active.remove(&cell);
    }
    f.write_str(")")
}

fn write_element(f: &mut fmt::Formatter<'_>, value: &Value, active: &mut HashSet<*const Pair>) -> fmt::Result {
    match value {
        Value::Pair(pair) if active.contains(&Rc::as_ptr(pair)) => f.write_str("..."),
        Value::Pair(pair) => write_pair(f, pair, active),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Rational(r) => write!(f, "{}/{}", r.numerator(), r.denominator()),
            Self::Boolean(true) => f.write_str("#t"),
            Self::Boolean(false) => f.write_str("#f"),
            Self::String(s) => write_string(f, s),
            Self::Symbol(s) => f.write_str(s),
            Self::Pair(pair) => write_pair(f, pair, &mut HashSet::new()),
            Self::Null => f.write_str("()"),
            Self::Void => f.write_str("#<void>"),
            Self::Terminate => Ok(()),
            Self::Procedure(_) => f.write_str("#<procedure>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Procedure({:?}, {:?})", self.lambda.parameters, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::rational;

    #[test]
    fn renders_atoms() -> anyhow::Result<()> {
        assert_eq!(Value::Integer(-42).to_string(), "-42");
        assert_eq!(rational(3, 6)?.to_string(), "1/2");
        assert_eq!(Value::Boolean(true).to_string(), "#t");
        assert_eq!(Value::string("a \"b\"").to_string(), "\"a \\\"b\\\"\"");
        assert_eq!(Value::string("a \"b\"").display(), "a \"b\"");
        assert_eq!(Value::symbol("spam").to_string(), "spam");
        assert_eq!(Value::Null.to_string(), "()");
        Ok(())
    }

    #[test]
    fn renders_lists() {
        let proper = Value::list([Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(proper.to_string(), "(1 2 3)");

        let dotted = Value::list_with_tail([Value::Integer(1), Value::Integer(2)], Value::Integer(3));
        assert_eq!(dotted.to_string(), "(1 2 . 3)");

        let nested = Value::list([Value::list([Value::symbol("a")]), Value::Null]);
        assert_eq!(nested.to_string(), "((a) ())");
    }

    #[test]
    fn list_predicate_rejects_improper_and_cyclic_chains() {
        assert!(Value::Null.is_list());
        assert!(Value::list([Value::Integer(1), Value::Integer(2)]).is_list());
        assert!(!Value::cons(Value::Integer(1), Value::Integer(2)).is_list());
        assert!(!Value::Integer(1).is_list());

        let cell = Value::cons(Value::Integer(1), Value::Null);
        if let Value::Pair(pair) = &cell {
            pair.set_cdr(cell.clone());
        }
        assert!(!cell.is_list());
    }

    #[test]
    fn eq_compares_identity_for_structures() {
        let a = Value::list([Value::Integer(1)]);
        let b = Value::list([Value::Integer(1)]);
        assert!(a.is_eq(&a.clone()));
        assert!(!a.is_eq(&b));
        assert_eq!(a, b);
        assert!(Value::symbol("x").is_eq(&Value::symbol("x")));
        assert!(Value::Null.is_eq(&Value::Null));
        assert!(!Value::Integer(1).is_eq(&Value::Boolean(true)));
    }

    #[test]
    fn cyclic_structures_render_and_compare_in_finite_time() {
        let tail_loop = Value::cons(Value::Integer(1), Value::Integer(2));
        if let Value::Pair(pair) = &tail_loop {
            pair.set_cdr(tail_loop.clone());
        }
        assert_eq!(tail_loop.to_string(), "(1 ...)");

        let car_loop = Value::cons(Value::Integer(1), Value::Integer(2));
        if let Value::Pair(pair) = &car_loop {
            pair.set_car(car_loop.clone());
        }
        assert_eq!(car_loop.to_string(), "(... . 2)");

        let other_loop = Value::cons(Value::Integer(1), Value::Null);
        if let Value::Pair(pair) = &other_loop {
            pair.set_cdr(other_loop.clone());
        }
        assert_eq!(tail_loop, other_loop);
        assert_ne!(tail_loop, car_loop);
    }

    #[test]
    fn shared_structure_is_not_mistaken_for_a_cycle() {
        let shared = Value::list([Value::Integer(1)]);
        let twice = Value::list([shared.clone(), shared]);
        assert_eq!(twice.to_string(), "((1) (1))");
    }

    #[test]
    fn only_false_is_falsy() {
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Null.is_truthy());
        assert!(Value::Integer(0).is_truthy());
    }
}
