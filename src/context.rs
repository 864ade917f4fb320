use tracing::debug;

use crate::{
    analyzer::analyze,
    env::Env,
    error::SchemeResult,
    expr::Expr,
    interpreter::evaluate,
    parser::{parse, parse_all, Syntax},
    primitives::UnaryOp,
    value::Value,
};


/// What a top-level form produced, as far as a driver is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A top-level `define`, queued until the next non-define form.
    Deferred,
    /// `echo` is whether a REPL prints `value`.
    Value { value: Value, echo: bool },
    /// A top-level `display` already wrote its output; the driver ends the line.
    Displayed,
    Exit,
}

impl Reply {
    /// The line a REPL prints for this reply, if any.
    pub fn output(&self) -> Option<String> {
        match self {
            Reply::Value { value, echo: true } => Some(value.to_string()),
            _ => None,
        }
    }
}

/// An interpreter session: one global environment, shared by analysis and
/// evaluation, plus the top-level defines waiting to be evaluated.
///
/// Consecutive top-level defines are evaluated together when the next
/// other form arrives, which lets them refer to each other in any order.
pub struct Interpreter {
    env: Env,
    pending: Vec<(String, Expr)>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self { env: Env::empty(), pending: vec![] }
    }

    pub fn pending_defines(&self) -> usize {
        self.pending.len()
    }

    pub fn evaluate(&mut self, syntax: &Syntax) -> SchemeResult<Reply> {
        let expr = analyze(syntax, &mut self.env)?;
        debug!(?expr, "analyzed top-level form");

        if let Expr::Define(name, value) = expr {
            debug!(%name, queued = self.pending.len() + 1, "deferring top-level define");
            self.pending.push((name, *value));
            return Ok(Reply::Deferred);
        }

        self.flush()?;
        let value = evaluate(&expr, &mut self.env)?;

        Ok(match value {
            Value::Terminate => Reply::Exit,
            _ if matches!(expr, Expr::Unary(UnaryOp::Display, _)) => Reply::Displayed,
            value => {
                let echo = echoes(&expr, &value);
                Reply::Value { value, echo }
            }
        })
    }

    pub fn evaluate_str(&mut self, input: &str) -> SchemeResult<Reply> {
        let syntax = parse(input)?;
        self.evaluate(&syntax)
    }

    /// Evaluates every form of `input` in order, carrying on past failed
    /// forms, and flushes trailing defines at the end. Stops early on `(exit)`.
    pub fn run_program(&mut self, input: &str) -> Vec<SchemeResult<Reply>> {
        let forms = match parse_all(input) {
            Ok(forms) => forms,
            Err(error) => return vec![Err(error)],
        };

        let mut replies = vec![];
        for form in &forms {
            let reply = self.evaluate(form);
            let exit = matches!(reply, Ok(Reply::Exit));
            replies.push(reply);
            if exit { return replies; }
        }

        if let Err(error) = self.flush() {
            replies.push(Err(error));
        }
        replies
    }

    /// Evaluates the queued defines. Every queued name is bound first so
    /// the right-hand sides can refer to each other. A failure discards
    /// the rest of the queue, leaving the failing name and those after it
    /// bound to `()`.
    pub fn flush(&mut self) -> SchemeResult<()> {
        if self.pending.is_empty() { return Ok(()); }

        let pending = std::mem::take(&mut self.pending);
        debug!(count = pending.len(), "flushing deferred defines");

        for (name, _) in &pending {
            self.env = self.env.extend(name, Value::Null);
        }
        for (name, value) in &pending {
            let value = evaluate(value, &mut self.env)?;
            self.env.modify(name, value)?;
        }

        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn echoes(expr: &Expr, value: &Value) -> bool {
    matches!(expr, Expr::MakeVoid | Expr::Begin(_) | Expr::If(..) | Expr::Cond(_) | Expr::Apply(..))
        || !value.is_void()
}
