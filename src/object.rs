//! Runtime object model: functions, natives, classes, instances, and the
//! ancestor-to-descendant method chain.
//!
//! Method resolution here is deliberately unconventional. Looking a method up
//! against a class collects *every* declaring level along the inheritance
//! chain, ordered root ancestor first. A single declarer behaves like
//! ordinary dispatch; multiple declarers produce a [`MethodChain`] composite
//! that runs each override root-to-leaf against the same instance and
//! arguments, yielding the last result. `super` is the exception: it uses
//! conventional most-derived lookup from the statically recorded superclass.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

/// A host-provided callable, e.g. `clock`.
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, String>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// A user-declared function, method, or lambda: the shared declaration plus
/// the environment captured at the definition site.
#[derive(Debug)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// Getters take no arguments regardless of how they are invoked.
    pub fn arity(&self) -> usize {
        if self.declaration.is_getter {
            0
        } else {
            self.declaration.params.len()
        }
    }

    /// Produce an instance-specific copy: same declaration and flags, closure
    /// replaced by a fresh child scope defining `this`. The shared
    /// declaration is never mutated.
    pub fn bind(&self, instance: Value) -> LoxFunction {
        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));
        env.define("this", instance);

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(env)),
            is_initializer: self.is_initializer,
        }
    }

    /// The call protocol.
    ///
    /// A new scope is opened as a child of the closure. When the closure
    /// carries a receiver at depth 0 (bound methods, and call scopes nested
    /// inside them), the receiver is propagated into the new scope. Parameters
    /// bind positionally; a missing trailing argument (possible when chained
    /// overrides disagree on arity) leaves the unassigned sentinel. The body
    /// runs as a block; a `Return` signal yields its value, except that
    /// initializers always yield the bound instance.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        debug!("calling fn '{}'", self.declaration.name_str());

        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));

        if let Some(instance) = self.closure.borrow().this_binding() {
            env.set_receiver(instance);
        }

        if !self.declaration.is_getter {
            for (i, param) in self.declaration.params.iter().enumerate() {
                match args.get(i) {
                    Some(value) => env.define(&param.lexeme, value.clone()),
                    None => env.declare(&param.lexeme),
                }
            }
        }

        let flow = interpreter.execute_block(&self.declaration.body, Rc::new(RefCell::new(env)))?;

        match flow {
            Flow::Return(value) => {
                if self.is_initializer {
                    self.bound_instance()
                } else {
                    Ok(value)
                }
            }

            Flow::Normal => {
                if self.is_initializer {
                    self.bound_instance()
                } else {
                    Ok(Value::Nil)
                }
            }

            Flow::Break => Err(RuntimeError::new(
                RuntimeErrorKind::Internal,
                self.line(),
                "'break' signal escaped a function body",
            )),
        }
    }

    /// The instance an initializer is bound to; initializers are only ever
    /// called bound.
    fn bound_instance(&self) -> Result<Value, RuntimeError> {
        self.closure.borrow().this_binding().ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::Internal,
                self.line(),
                "initializer invoked without a bound instance",
            )
        })
    }

    fn line(&self) -> usize {
        self.declaration.name.as_ref().map(|t| t.line).unwrap_or(0)
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaration.name {
            None => write!(f, "<lambda fn>"),

            Some(name) => {
                let prefix = if self.declaration.is_static {
                    "static "
                } else if self.declaration.is_getter {
                    "getter "
                } else {
                    ""
                };

                write!(f, "<{}fn {}>", prefix, name.lexeme)
            }
        }
    }
}

/// A class: name, statically recorded superclass, and separate instance and
/// static method tables.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
    pub statics: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Every declaration of `name` along the inheritance chain, root
    /// ancestor first. Each class contributes at most its own table entry.
    pub fn method_chain(&self, name: &str) -> Vec<Rc<LoxFunction>> {
        let mut chain: Vec<Rc<LoxFunction>> = match &self.superclass {
            Some(superclass) => superclass.method_chain(name),
            None => Vec::new(),
        };

        if let Some(method) = self.methods.get(name) {
            chain.push(Rc::clone(method));
        }

        chain
    }

    /// Root-first chain over the static tables.
    pub fn static_chain(&self, name: &str) -> Vec<Rc<LoxFunction>> {
        let mut chain: Vec<Rc<LoxFunction>> = match &self.superclass {
            Some(superclass) => superclass.static_chain(name),
            None => Vec::new(),
        };

        if let Some(method) = self.statics.get(name) {
            chain.push(Rc::clone(method));
        }

        chain
    }

    /// Conventional most-derived lookup. Serves `super` resolution only; all
    /// other dispatch goes through the root-first chains.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    /// Constructor arity: the root-most initializer's arity, or 0.
    pub fn arity(&self) -> usize {
        self.method_chain("init")
            .first()
            .map(|init| init.arity())
            .unwrap_or(0)
    }
}

/// An instance: a non-owning view of its class plus lazily created fields.
#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// `set` always writes the field map, creating the field if absent.
    /// Fields shadow methods permanently once set.
    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

/// Composite callable produced when more than one level of the inheritance
/// chain declares a method. Invocation runs every member root-to-leaf against
/// the same receiver and arguments; the overall result is the last member's
/// result; the arity is the root-most member's.
#[derive(Debug)]
pub struct MethodChain {
    pub name: String,
    pub methods: Vec<Rc<LoxFunction>>,
    /// `None` for static chains, which bind no instance.
    pub receiver: Option<Value>,
}

impl MethodChain {
    pub fn arity(&self) -> usize {
        self.methods.first().map(|m| m.arity()).unwrap_or(0)
    }

    /// The chain counts as a getter iff its root-most member is one (the
    /// same member that defines its arity).
    pub fn is_getter(&self) -> bool {
        self.methods
            .first()
            .map(|m| m.declaration.is_getter)
            .unwrap_or(false)
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        debug!(
            "invoking method chain '{}' ({} levels)",
            self.name,
            self.methods.len()
        );

        let mut result = Value::Nil;

        for method in &self.methods {
            result = match &self.receiver {
                Some(instance) => method.bind(instance.clone()).call(interpreter, args.clone())?,

                // Static chains bind no instance.
                None => method.call(interpreter, args.clone())?,
            };
        }

        Ok(result)
    }
}
