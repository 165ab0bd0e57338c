//! Runtime scope chain.
//!
//! An [`Environment`] is one lexical scope: a growable slot array holding the
//! values declared in it, a name→slot index used for name-keyed (global)
//! lookup, and an optional link to the enclosing scope. Chains are strictly
//! acyclic and terminate at the global environment. Scopes are shared
//! (`Rc<RefCell<_>>`) because closures capture the environment of their
//! definition site by reference, and a write through any holder must be
//! visible to all.
//!
//! A slot holding `None` is the *unassigned sentinel*: the declaration
//! exists but no assignment has executed yet. Reading it is a distinct
//! runtime error ([`RuntimeErrorKind::UnboundVariable`]) from reading a name
//! no scope defines ([`RuntimeErrorKind::UndefinedVariable`]).
//!
//! Resolved references index slots directly via [`Environment::get_at`] /
//! [`Environment::assign_at`], jumping the chain with
//! [`Environment::ancestor`] — O(1) in program nesting depth. The name-keyed
//! [`Environment::get`] / [`Environment::assign`] chain walk serves only
//! references the resolver left unresolved, i.e. globals.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::token::Token;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Slot-indexed storage; index order matches the resolver's
    /// declaration-order slot assignment for this scope.
    slots: Vec<Option<Value>>,

    /// Name → slot index, for chain lookups and re-definition.
    names: HashMap<String, usize>,

    enclosing: Option<Rc<RefCell<Environment>>>,

    /// Receiver propagated by the call protocol when the closure carries a
    /// `this` binding. Lives outside the slot array: the resolver cannot see
    /// which call scopes acquire a receiver, so it must not disturb slot
    /// numbering.
    receiver: Option<Value>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            enclosing: Some(enclosing),
            ..Environment::default()
        }
    }

    /// Define `name` in this scope, overwriting any previous definition of
    /// the same name (re-declaration is legal at global scope).
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("define '{}' = {}", name, value);

        self.put(name, Some(value));
    }

    /// Declare `name` without assigning it: the slot holds the unassigned
    /// sentinel until the first assignment.
    pub fn declare(&mut self, name: &str) {
        debug!("declare '{}' (unassigned)", name);

        self.put(name, None);
    }

    fn put(&mut self, name: &str, value: Option<Value>) {
        match self.names.get(name) {
            Some(&slot) => self.slots[slot] = value,

            None => {
                self.names.insert(name.to_string(), self.slots.len());
                self.slots.push(value);
            }
        }
    }

    /// Install the propagated receiver for this call scope.
    pub fn set_receiver(&mut self, instance: Value) {
        self.receiver = Some(instance);
    }

    /// The receiver visible at depth 0 of this scope: an ordinary `this`
    /// binding (a bound method's closure) or a propagated receiver (a call
    /// scope inside a method).
    pub fn this_binding(&self) -> Option<Value> {
        if let Some(&slot) = self.names.get("this") {
            if let Some(Some(value)) = self.slots.get(slot) {
                return Some(value.clone());
            }
        }

        self.receiver.clone()
    }

    /// Name-keyed lookup in this scope only. `Ok(None)` means absent.
    fn lookup(&self, name: &Token) -> Result<Option<Value>, RuntimeError> {
        match self.names.get(&name.lexeme) {
            None => Ok(None),

            Some(&slot) => match &self.slots[slot] {
                Some(value) => Ok(Some(value.clone())),

                None => Err(RuntimeError::new(
                    RuntimeErrorKind::UnboundVariable,
                    name.line,
                    format!("Uninitialized variable '{}'", name.lexeme),
                )),
            },
        }
    }

    /// Chain search by name: this scope, then each enclosing scope in order.
    /// Used only for references the resolver left unresolved (globals).
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.lookup(name)? {
            return Ok(value);
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),

            None => Err(RuntimeError::new(
                RuntimeErrorKind::UndefinedVariable,
                name.line,
                format!("Undefined variable '{}'", name.lexeme),
            )),
        }
    }

    /// Chain search and in-place mutation. Assignment never implicitly
    /// declares: a name absent from every scope is an error.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(&slot) = self.names.get(&name.lexeme) {
            self.slots[slot] = Some(value);

            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),

            None => Err(RuntimeError::new(
                RuntimeErrorKind::UndefinedVariable,
                name.line,
                format!("Undefined variable '{}'", name.lexeme),
            )),
        }
    }

    /// Walk `distance` enclosing links. The resolver guarantees the chain is
    /// long enough; a short chain is an interpreter bug.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Rc<RefCell<Environment>> {
        let mut current: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..distance {
            let next = current
                .borrow()
                .enclosing
                .as_ref()
                .expect("environment chain shorter than resolved depth")
                .clone();

            current = next;
        }

        current
    }

    /// Fast path for resolved reads: jump `depth` scopes, index the slot.
    /// A slot that is out of range or still the sentinel means the
    /// declaration's assignment has not executed.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        slot: usize,
        name: &Token,
    ) -> Result<Value, RuntimeError> {
        let scope = Environment::ancestor(env, depth);
        let scope = scope.borrow();

        match scope.slots.get(slot) {
            Some(Some(value)) => Ok(value.clone()),

            _ => Err(RuntimeError::new(
                RuntimeErrorKind::UnboundVariable,
                name.line,
                format!("Uninitialized variable '{}'", name.lexeme),
            )),
        }
    }

    /// Fast path for resolved writes.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        slot: usize,
        name: &Token,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let scope = Environment::ancestor(env, depth);
        let mut scope = scope.borrow_mut();

        match scope.slots.get_mut(slot) {
            Some(entry) => {
                *entry = Some(value);

                Ok(())
            }

            // Writing through a declaration whose `var` statement has not
            // completed yet.
            None => Err(RuntimeError::new(
                RuntimeErrorKind::UnboundVariable,
                name.line,
                format!("Uninitialized variable '{}'", name.lexeme),
            )),
        }
    }

    /// Name-keyed read at a fixed depth. Serves the interpreter's internal
    /// `this`/`super` plumbing, where the frame shape is known.
    pub fn get_name_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        name: &str,
    ) -> Option<Value> {
        let scope = Environment::ancestor(env, depth);
        let scope = scope.borrow();

        if let Some(&slot) = scope.names.get(name) {
            if let Some(Some(value)) = scope.slots.get(slot) {
                return Some(value.clone());
            }
        }

        if name == "this" {
            return scope.receiver.clone();
        }

        None
    }
}
