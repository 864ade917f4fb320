mod analyzer;
mod context;
mod env;
mod error;
mod expr;
mod interpreter;
mod number;
mod parser;
mod primitives;
mod value;

#[cfg(test)]
mod test_utils;

pub use analyzer::analyze;
pub use context::{Interpreter, Reply};
pub use env::Env;
pub use error::{ErrorKind, SchemeError, SchemeResult};
pub use expr::{Binding, Clause, Expr, Lambda};
pub use interpreter::{apply, evaluate, quote};
pub use number::Rational;
pub use parser::{is_complete, parse, parse_all, Syntax};
pub use primitives::{BinaryOp, Primitive, ReservedWord, UnaryOp, VariadicOp};
pub use value::{Pair, Procedure, ProcedureKind, Value};
