use core::cmp::Ordering;

use crate::{error::{SchemeError, SchemeResult}, value::Value};


/// An exact rational that is never an integer in disguise: the denominator
/// is at least 2 and shares no factor with the numerator. Instances only
/// come out of [normalize], so the invariant holds everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    numerator: i64,
    denominator: i64,
}

impl Rational {
    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> i64 {
        self.denominator
    }
}

// Numbers are widened to 128 bits while they are being combined, and
// narrowed again by `normalize`.
#[derive(Debug, Clone, Copy)]
struct Fraction {
    numerator: i128,
    denominator: i128,
}

fn fraction(value: &Value, operation: &str) -> SchemeResult<Fraction> {
    match value {
        Value::Integer(n) => Ok(Fraction { numerator: *n as i128, denominator: 1 }),
        Value::Rational(r) => Ok(Fraction {
            numerator: r.numerator as i128,
            denominator: r.denominator as i128,
        }),
        other => Err(SchemeError::operand_type(format!("{}: expected a number, got {}", operation, other))),
    }
}

fn integer(value: &Value, operation: &str) -> SchemeResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(SchemeError::operand_type(format!("{}: expected an integer, got {}", operation, other))),
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn checked(value: Option<i128>) -> SchemeResult<i128> {
    value.ok_or_else(SchemeError::overflow)
}

/// The one reduction step every arithmetic result goes through: divide out
/// the gcd, move the sign onto the numerator, demote `n/1` to an integer.
pub(crate) fn normalize(numerator: i128, denominator: i128) -> SchemeResult<Value> {
    if denominator == 0 {
        return Err(SchemeError::internal("rational with a zero denominator"));
    }

    let divisor = gcd(numerator.unsigned_abs(), denominator.unsigned_abs()) as i128;
    let (mut numerator, mut denominator) = (numerator / divisor, denominator / divisor);
    if denominator < 0 {
        numerator = checked(numerator.checked_neg())?;
        denominator = checked(denominator.checked_neg())?;
    }

    let numerator = i64::try_from(numerator).map_err(|_| SchemeError::overflow())?;
    let denominator = i64::try_from(denominator).map_err(|_| SchemeError::overflow())?;

    if denominator == 1 {
        Ok(Value::Integer(numerator))
    } else {
        Ok(Value::Rational(Rational { numerator, denominator }))
    }
}

/// Builds the value for a `n/d` literal.
pub fn rational(numerator: i64, denominator: i64) -> SchemeResult<Value> {
    if denominator == 0 { return Err(SchemeError::division_by_zero()); }
    normalize(numerator as i128, denominator as i128)
}

pub fn add(a: &Value, b: &Value) -> SchemeResult<Value> {
    let (a, b) = (fraction(a, "+")?, fraction(b, "+")?);
    let left = checked(a.numerator.checked_mul(b.denominator))?;
    let right = checked(b.numerator.checked_mul(a.denominator))?;
    normalize(checked(left.checked_add(right))?, checked(a.denominator.checked_mul(b.denominator))?)
}

pub fn sub(a: &Value, b: &Value) -> SchemeResult<Value> {
    let (a, b) = (fraction(a, "-")?, fraction(b, "-")?);
    let left = checked(a.numerator.checked_mul(b.denominator))?;
    let right = checked(b.numerator.checked_mul(a.denominator))?;
    normalize(checked(left.checked_sub(right))?, checked(a.denominator.checked_mul(b.denominator))?)
}

pub fn mul(a: &Value, b: &Value) -> SchemeResult<Value> {
    let (a, b) = (fraction(a, "*")?, fraction(b, "*")?);
    normalize(
        checked(a.numerator.checked_mul(b.numerator))?,
        checked(a.denominator.checked_mul(b.denominator))?,
    )
}

pub fn div(a: &Value, b: &Value) -> SchemeResult<Value> {
    let (a, b) = (fraction(a, "/")?, fraction(b, "/")?);
    if b.numerator == 0 { return Err(SchemeError::division_by_zero()); }
    normalize(
        checked(a.numerator.checked_mul(b.denominator))?,
        checked(a.denominator.checked_mul(b.numerator))?,
    )
}

/// Exact comparison by cross-multiplication. Denominators are positive, so
/// the products order the same way the numbers do.
pub fn compare(a: &Value, b: &Value) -> SchemeResult<Ordering> {
    let (a, b) = (fraction(a, "compare")?, fraction(b, "compare")?);
    Ok((a.numerator * b.denominator).cmp(&(b.numerator * a.denominator)))
}

/// Truncated remainder: the result takes the sign of the dividend.
pub fn modulo(a: &Value, b: &Value) -> SchemeResult<Value> {
    let (dividend, divisor) = (integer(a, "modulo")?, integer(b, "modulo")?);
    if divisor == 0 { return Err(SchemeError::division_by_zero()); }
    dividend.checked_rem(divisor)
        .map(Value::Integer)
        .ok_or_else(SchemeError::overflow)
}

pub fn expt(a: &Value, b: &Value) -> SchemeResult<Value> {
    let (base, exponent) = (integer(a, "expt")?, integer(b, "expt")?);
    if exponent < 0 {
        return Err(SchemeError::operand_type("expt: negative exponents are not supported"));
    }
    if base == 0 && exponent == 0 {
        return Err(SchemeError::operand_type("expt: 0^0 is undefined"));
    }

    let (mut result, mut base, mut exponent) = (1i64, base, exponent);
    while exponent > 0 {
        if exponent % 2 == 1 {
            result = result.checked_mul(base).ok_or_else(SchemeError::overflow)?;
        }
        exponent /= 2;
        // The last squaring is never used, so it is allowed to overflow
        if exponent > 0 {
            base = base.checked_mul(base).ok_or_else(SchemeError::overflow)?;
        }
    }

    Ok(Value::Integer(result))
}

pub fn is_number(value: &Value) -> bool {
    matches!(value, Value::Integer(_) | Value::Rational(_))
}
