use core::fmt;
use std::{cell::RefCell, rc::Rc};

use crate::{error::{SchemeError, SchemeResult}, value::Value};


/// A chain of single-binding frames, innermost first.
///
/// `extend` never touches existing frames: it returns a new head that
/// shares the old chain as its tail, so sibling extensions never see each
/// other's bindings. `modify` writes into the cell of an existing frame, and
/// every chain that shares that frame observes the write. Recursive
/// bindings rely on exactly this: a placeholder is bound first, a closure
/// captures the chain, then the placeholder cell is overwritten.
#[derive(Clone, Default)]
pub struct Env(Option<Rc<Frame>>);

struct Frame {
    name: String,
    value: RefCell<Value>,
    parent: Env,
}

impl Env {
    /// The zero-frame chain.
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn extend(&self, name: &str, value: Value) -> Self {
        Self(Some(Rc::new(Frame {
            name: name.to_owned(),
            value: RefCell::new(value),
            parent: self.clone(),
        })))
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        core::iter::successors(self.0.as_deref(), |frame| frame.parent.0.as_deref())
    }

    pub fn find(&self, name: &str) -> Option<Value> {
        self.frames()
            .find(|frame| frame.name == name)
            .map(|frame| frame.value.borrow().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames().any(|frame| frame.name == name)
    }

    /// Overwrites the innermost binding of `name`. Callers bind the name
    /// first, so a miss here is an interpreter bug.
    pub fn modify(&self, name: &str, value: Value) -> SchemeResult<()> {
        let frame = self.frames()
            .find(|frame| frame.name == name)
            .ok_or_else(|| SchemeError::internal(format!("modify of unbound name `{}`", name)))?;
        *frame.value.borrow_mut() = value;
        Ok(())
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        // Unlink uniquely owned frames one at a time so a long chain doesn't
        // drop recursively
        let mut next = self.0.take();
        while let Some(frame) = next {
            next = match Rc::try_unwrap(frame) {
                Ok(mut frame) => frame.parent.0.take(),
                Err(_) => None,
            };
        }
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.frames().map(|frame| &frame.name))
            .finish()
    }
}
