//! Named value stacks used for loop variables.

use std::collections::HashMap;

use crate::value::ValueWrapper;

/// A map from variable name to a stack of values.
///
/// Nested loops over the same variable push a new binding; the outer binding
/// is visible again once the inner loop pops.
#[derive(Debug, Default)]
pub struct Multistack {
    stacks: HashMap<String, Vec<ValueWrapper>>,
}

impl Multistack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: ValueWrapper) {
        self.stacks.entry(name.to_string()).or_default().push(value);
    }

    /// Remove and return the top binding of `name`.
    pub fn pop(&mut self, name: &str) -> Option<ValueWrapper> {
        let stack = self.stacks.get_mut(name)?;
        let value = stack.pop();
        if stack.is_empty() {
            self.stacks.remove(name);
        }
        value
    }

    pub fn peek(&self, name: &str) -> Option<&ValueWrapper> {
        self.stacks.get(name).and_then(|stack| stack.last())
    }

    pub fn peek_mut(&mut self, name: &str) -> Option<&mut ValueWrapper> {
        self.stacks.get_mut(name).and_then(|stack| stack.last_mut())
    }

    pub fn is_empty(&self, name: &str) -> bool {
        self.peek(name).is_none()
    }
}
