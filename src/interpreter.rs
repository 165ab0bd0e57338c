//! Tree-walking evaluator.
//!
//! Executes statements and expressions by exhaustive case analysis over the
//! closed syntax-tree sums, consuming the resolver's binding table for O(1)
//! variable access and instantiating the object model at class/call sites.
//!
//! Nonlocal control (`return`, `break`) travels as an explicit [`Flow`]
//! result, not through the error channel: every loop and call site must
//! intercept the signals it owns, and one escaping to the top of
//! [`Interpreter::interpret`] is an internal-error condition (a resolver
//! defect), never a user-facing diagnostic.
//!
//! The current-environment pointer is saved before entering any nested
//! execution context and unconditionally restored on every exit path,
//! including error propagation — see [`Interpreter::execute_block`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::environment::Environment;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::object::{LoxClass, LoxFunction, LoxInstance, MethodChain, NativeFunction};
use crate::resolver::{Binding, Bindings};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Result of executing a statement: either it completed, or a nonlocal
/// control signal is travelling toward its handler.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    bindings: Bindings,
    output: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter printing to stdout, with the native globals pre-defined.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter printing to an arbitrary sink; tests pass a capture
    /// buffer.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Native(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            bindings: Bindings::default(),
            output,
        }
    }

    /// Absorb a resolve pass's binding table. REPL inputs share one
    /// interpreter, so tables accumulate.
    pub fn add_bindings(&mut self, bindings: Bindings) {
        debug!("Merging {} binding(s)", bindings.len());

        self.bindings.merge(bindings);
    }

    /// Execute top-level statements in order. Must only be called after a
    /// resolve pass reported no errors.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        debug!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}

                // A signal the resolver should have rejected statically.
                flow => {
                    let signal = match flow {
                        Flow::Break => "break",
                        _ => "return",
                    };

                    return Err(RuntimeError::new(
                        RuntimeErrorKind::Internal,
                        0,
                        format!("'{}' signal escaped to top level", signal),
                    ));
                }
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                self.write_line(&value)?;

                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                match initializer {
                    Some(expr) => {
                        let value = self.evaluate(expr)?;
                        debug!("var '{}' = {}", name.lexeme, value);

                        self.environment.borrow_mut().define(&name.lexeme, value);
                    }

                    // Declared but not assigned: the slot holds the sentinel
                    // until the first assignment.
                    None => self.environment.borrow_mut().declare(&name.lexeme),
                }

                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment));

                self.execute_block(statements, Rc::new(RefCell::new(env)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}

                        // `break` is intercepted by the nearest loop.
                        Flow::Break => break,

                        // `return` keeps travelling to the call frame.
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Function(decl) => {
                let function = LoxFunction::new(
                    Rc::clone(decl),
                    Rc::clone(&self.environment),
                    false,
                );

                let name = decl.name_str().to_string();
                self.environment
                    .borrow_mut()
                    .define(&name, Value::Function(Rc::new(function)));

                Ok(Flow::Normal)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run `statements` in `env`, restoring the previous environment on
    /// every exit path — normal completion, control signals, and errors
    /// alike. Also the body executor for function calls.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<Flow, RuntimeError> {
        let previous = Rc::clone(&self.environment);
        self.environment = env;

        let mut flow = Flow::Normal;

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}

                Ok(signal) => {
                    flow = signal;
                    break;
                }

                Err(e) => {
                    self.environment = Rc::clone(&previous);

                    return Err(e);
                }
            }
        }

        self.environment = previous;

        Ok(flow)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Flow, RuntimeError> {
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => {
                let line = match expr {
                    Expr::Variable { name, .. } => name.line,
                    _ => name.line,
                };

                match self.evaluate(expr)? {
                    Value::Class(class) => Some(class),

                    other => {
                        return Err(RuntimeError::new(
                            RuntimeErrorKind::InvalidSuperclass,
                            line,
                            format!("Superclass must be a class, got {}", other.type_name()),
                        ));
                    }
                }
            }

            None => None,
        };

        // The class name is visible (as unassigned) while the body
        // evaluates; the finished class value is assigned below.
        self.environment.borrow_mut().declare(&name.lexeme);

        // Method closures hang off an extra scope defining `super` when the
        // class inherits; otherwise off the declaring scope directly.
        let defining_env: Rc<RefCell<Environment>> = match &superclass_value {
            Some(class) => {
                let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                env.define("super", Value::Class(Rc::clone(class)));

                Rc::new(RefCell::new(env))
            }

            None => Rc::clone(&self.environment),
        };

        let mut instance_methods: HashMap<String, Rc<LoxFunction>> = HashMap::new();
        let mut static_methods: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for decl in methods {
            let method_name = decl.name_str().to_string();
            let is_initializer = !decl.is_static && method_name == "init";

            let function = Rc::new(LoxFunction::new(
                Rc::clone(decl),
                Rc::clone(&defining_env),
                is_initializer,
            ));

            if decl.is_static {
                static_methods.insert(method_name, function);
            } else {
                instance_methods.insert(method_name, function);
            }
        }

        let class = LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: instance_methods,
            statics: static_methods,
        };

        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(class)))?;

        info!("class '{}' defined", name.lexeme);

        Ok(Flow::Normal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::Str(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left)?;

                // Short circuit: the operator yields an operand value, not a
                // boolean.
                match operator.token_type {
                    TokenType::OR if left_value.is_truthy() => Ok(left_value),
                    TokenType::AND if !left_value.is_truthy() => Ok(left_value),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { id, name } => self.lookup_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.bindings.get(*id) {
                    Some(Binding { depth, slot }) => Environment::assign_at(
                        &self.environment,
                        depth,
                        slot,
                        name,
                        value.clone(),
                    )?,

                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(callee_value, args, paren)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;

                self.get_property(object, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object_value = self.evaluate(object)?;

                match object_value {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.set_field(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    other => Err(RuntimeError::new(
                        RuntimeErrorKind::NotAnInstance,
                        name.line,
                        format!("Only instances have fields, got {}", other.type_name()),
                    )),
                }
            }

            Expr::This { id, keyword } => match self.bindings.get(*id) {
                Some(Binding { depth, slot }) => {
                    Environment::get_at(&self.environment, depth, slot, keyword)
                }

                None => Err(RuntimeError::new(
                    RuntimeErrorKind::Internal,
                    keyword.line,
                    "'this' was not resolved to a method scope",
                )),
            },

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::Lambda(decl) => {
                let function = LoxFunction::new(
                    Rc::clone(decl),
                    Rc::clone(&self.environment),
                    false,
                );

                Ok(Value::Function(Rc::new(function)))
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_value {
                Value::Number(n) => Ok(Value::Number(-n)),

                other => Err(RuntimeError::new(
                    RuntimeErrorKind::TypeMismatch,
                    operator.line,
                    format!("Operand must be a number, got {}", other.type_name()),
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right_value.is_truthy())),

            _ => Err(RuntimeError::new(
                RuntimeErrorKind::Internal,
                operator.line,
                format!("invalid unary operator '{}'", operator.lexeme),
            )),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, RuntimeError> {
        let left_value = self.evaluate(left)?;
        let right_value = self.evaluate(right)?;

        let numbers = |l: &Value, r: &Value| -> Result<(f64, f64), RuntimeError> {
            match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),

                _ => Err(RuntimeError::new(
                    RuntimeErrorKind::TypeMismatch,
                    operator.line,
                    "Operands must be numbers",
                )),
            }
        };

        match operator.token_type {
            TokenType::PLUS => match (&left_value, &right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                // Either side being a string stringifies the other; integral
                // numbers render without a trailing ".0".
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::Str(format!("{}{}", left_value, right_value)))
                }

                _ => Err(RuntimeError::new(
                    RuntimeErrorKind::TypeMismatch,
                    operator.line,
                    "Operands must be numbers or strings",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = numbers(&left_value, &right_value)?;

                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = numbers(&left_value, &right_value)?;

                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = numbers(&left_value, &right_value)?;

                if b == 0.0 {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::DivisionByZero,
                        operator.line,
                        "Division by zero",
                    ));
                }

                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = numbers(&left_value, &right_value)?;

                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = numbers(&left_value, &right_value)?;

                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = numbers(&left_value, &right_value)?;

                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = numbers(&left_value, &right_value)?;

                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value == right_value)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_value != right_value)),

            _ => Err(RuntimeError::new(
                RuntimeErrorKind::Internal,
                operator.line,
                format!("invalid binary operator '{}'", operator.lexeme),
            )),
        }
    }

    /// Resolved reads jump straight to their depth/slot; unresolved names
    /// are globals.
    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.bindings.get(id) {
            Some(Binding { depth, slot }) => {
                Environment::get_at(&self.environment, depth, slot, name)
            }

            None => self.globals.borrow().get(name),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls and properties
    // ─────────────────────────────────────────────────────────────────────────

    /// Arity is pre-validated here, once, for every callable kind.
    fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        let arity = match &callee {
            Value::Native(native) => native.arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),
            Value::Chain(chain) => chain.arity(),

            other => {
                return Err(RuntimeError::new(
                    RuntimeErrorKind::NotCallable,
                    paren.line,
                    format!(
                        "Can only call functions and classes, got {}",
                        other.type_name()
                    ),
                ));
            }
        };

        if args.len() != arity {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ArityMismatch,
                paren.line,
                format!("Expected {} arguments but got {}", arity, args.len()),
            ));
        }

        match callee {
            Value::Native(native) => {
                debug!("calling native '{}'", native.name);

                (native.func)(&args).map_err(|msg| {
                    RuntimeError::new(RuntimeErrorKind::Internal, paren.line, msg)
                })
            }

            Value::Function(function) => function.call(self, args),

            Value::Chain(chain) => chain.call(self, args),

            Value::Class(class) => self.instantiate(class, args),

            _ => unreachable!("arity was computed for a callable"),
        }
    }

    /// Construction: make the instance, then run the initializer chain (root
    /// ancestor first) for side effect only. The constructor always yields
    /// the new instance, whatever the initializers return.
    fn instantiate(
        &mut self,
        class: Rc<LoxClass>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        debug!("instantiating class '{}'", class.name);

        let instance = Value::Instance(Rc::new(LoxInstance::new(Rc::clone(&class))));

        let chain = class.method_chain("init");

        match chain.len() {
            0 => {}

            1 => {
                chain[0].bind(instance.clone()).call(self, args)?;
            }

            _ => {
                let composite = MethodChain {
                    name: "init".to_string(),
                    methods: chain,
                    receiver: Some(instance.clone()),
                };

                composite.call(self, args)?;
            }
        }

        Ok(instance)
    }

    /// Property access. Fields shadow methods; method lookup follows the
    /// root-first chain rule; getters run immediately; class values expose
    /// the static table only.
    fn get_property(&mut self, object: Value, name: &Token) -> Result<Value, RuntimeError> {
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.field(&name.lexeme) {
                    return Ok(value);
                }

                let chain = instance.class.method_chain(&name.lexeme);
                let receiver = Value::Instance(Rc::clone(&instance));

                match chain.len() {
                    0 => Err(RuntimeError::new(
                        RuntimeErrorKind::UndefinedProperty,
                        name.line,
                        format!("Undefined property '{}'", name.lexeme),
                    )),

                    1 => {
                        let bound = chain[0].bind(receiver);

                        if bound.declaration.is_getter {
                            bound.call(self, Vec::new())
                        } else {
                            Ok(Value::Function(Rc::new(bound)))
                        }
                    }

                    _ => {
                        let composite = MethodChain {
                            name: name.lexeme.clone(),
                            methods: chain,
                            receiver: Some(receiver),
                        };

                        if composite.is_getter() {
                            composite.call(self, Vec::new())
                        } else {
                            Ok(Value::Chain(Rc::new(composite)))
                        }
                    }
                }
            }

            Value::Class(class) => {
                let chain = class.static_chain(&name.lexeme);

                match chain.len() {
                    0 => Err(RuntimeError::new(
                        RuntimeErrorKind::UndefinedProperty,
                        name.line,
                        format!("Undefined static method '{}'", name.lexeme),
                    )),

                    1 => {
                        // Statics bind no instance.
                        if chain[0].declaration.is_getter {
                            chain[0].call(self, Vec::new())
                        } else {
                            Ok(Value::Function(Rc::clone(&chain[0])))
                        }
                    }

                    _ => {
                        let composite = MethodChain {
                            name: name.lexeme.clone(),
                            methods: chain,
                            receiver: None,
                        };

                        if composite.is_getter() {
                            composite.call(self, Vec::new())
                        } else {
                            Ok(Value::Chain(Rc::new(composite)))
                        }
                    }
                }
            }

            other => Err(RuntimeError::new(
                RuntimeErrorKind::NotAnInstance,
                name.line,
                format!(
                    "Only instances and classes have properties, got {}",
                    other.type_name()
                ),
            )),
        }
    }

    /// `super.method`: conventional most-derived lookup starting at the
    /// statically recorded superclass, bound to the current instance (one
    /// environment level inside the `super` frame).
    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
    ) -> Result<Value, RuntimeError> {
        let internal = |msg: &str| {
            RuntimeError::new(RuntimeErrorKind::Internal, keyword.line, msg.to_string())
        };

        let Binding { depth, .. } = self
            .bindings
            .get(id)
            .ok_or_else(|| internal("'super' was not resolved"))?;

        let superclass = Environment::get_name_at(&self.environment, depth, "super")
            .ok_or_else(|| internal("no 'super' scope at resolved depth"))?;

        let Value::Class(superclass) = superclass else {
            return Err(internal("'super' scope holds a non-class value"));
        };

        let this_depth = depth
            .checked_sub(1)
            .ok_or_else(|| internal("malformed 'super' depth"))?;

        let instance = Environment::get_name_at(&self.environment, this_depth, "this")
            .ok_or_else(|| internal("no receiver inside 'super' scope"))?;

        let method_fn = superclass.find_method(&method.lexeme).ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::UndefinedProperty,
                method.line,
                format!("Undefined property '{}'", method.lexeme),
            )
        })?;

        Ok(Value::Function(Rc::new(method_fn.bind(instance))))
    }

    fn write_line(&mut self, value: &Value) -> Result<(), RuntimeError> {
        writeln!(self.output, "{}", value).map_err(|e| {
            RuntimeError::new(
                RuntimeErrorKind::Internal,
                0,
                format!("failed to write output: {}", e),
            )
        })
    }
}

/// The one native global: wall-clock seconds as a float.
fn clock_native(_args: &[Value]) -> Result<Value, String> {
    let micros = chrono::Utc::now().timestamp_micros();

    Ok(Value::Number(micros as f64 / 1_000_000.0))
}
