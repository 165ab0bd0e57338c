//! Static resolver pass.
//!
//! One forward walk over the parsed program that does three things:
//!
//! 1. Builds lexical scopes (a stack of frames tracking, per name: slot
//!    index, initialized?, used?).
//! 2. Reports static errors — redeclaration in a local frame, reading a
//!    variable in its own initializer (outside the outer-shadow carve-out),
//!    `return` outside a function, `break` outside a loop, `this`/`super`
//!    misuse, a class inheriting from itself. Errors are *collected*, not
//!    raised: the walk continues so one pass surfaces every diagnostic.
//! 3. Produces the binding table: for each resolvable node, how many
//!    environments to hop and which slot to index there. Nodes without an
//!    entry resolve through the global environment by name at runtime.
//!
//! Frame 0 is a pseudo-frame for top-level names. It exists so the
//! carve-out can see global declarations (`var a = 1; { var a = a + 1; }`
//! reads the outer `a`), but it never yields bindings, never rejects
//! redeclaration, and never warns about unused names.
//!
//! Slot indices are assigned at `declare` time in declaration order, which
//! is exactly the order the evaluator populates each scope in — parameters
//! first, then `var` statements as they execute.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::token::Token;

/// Resolved location of one variable occurrence: `depth` enclosing-scope
/// hops, then `slot` within that scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub depth: usize,
    pub slot: usize,
}

/// The resolver's output table, keyed by node identity. Immutable once a
/// pass completes; the evaluator merges tables across REPL inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    locals: HashMap<ExprId, Binding>,
}

impl Bindings {
    pub fn get(&self, id: ExprId) -> Option<Binding> {
        self.locals.get(&id).copied()
    }

    fn insert(&mut self, id: ExprId, binding: Binding) {
        self.locals.insert(id, binding);
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    /// Absorb a newer table (REPL inputs share one evaluator).
    pub fn merge(&mut self, other: Bindings) {
        self.locals.extend(other.locals);
    }
}

/// Non-fatal diagnostic. Never upgraded to an error, never blocks execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Warning: {}", self.line, self.message)
    }
}

/// Everything one resolve pass produced.
#[derive(Debug)]
pub struct Resolution {
    pub bindings: Bindings,
    pub errors: Vec<LoxError>,
    pub warnings: Vec<Warning>,
}

/// What kind of function body is being resolved; validates `return` and
/// receiver usage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
    Static,
}

/// Whether a class body (and which kind) encloses the current node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// Per-name state in its declaring frame.
#[derive(Debug)]
struct VarState {
    slot: usize,
    initialized: bool,
    used: bool,
    line: usize,
}

pub struct Resolver {
    /// `scopes[0]` is the global pseudo-frame; real frames stack above it.
    scopes: Vec<HashMap<String, VarState>>,
    bindings: Bindings,
    errors: Vec<LoxError>,
    warnings: Vec<Warning>,
    current_function: FunctionKind,
    current_class: ClassKind,
    /// Loops entered in the *current* function body; `break` must not cross
    /// a function boundary.
    loop_depth: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: vec![HashMap::new()],
            bindings: Bindings::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            current_function: FunctionKind::None,
            current_class: ClassKind::None,
            loop_depth: 0,
        }
    }

    /// Walk all top-level statements and return the binding table together
    /// with every error and warning found.
    pub fn resolve(mut self, statements: &[Stmt]) -> Resolution {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        self.warnings.sort_by_key(|w| w.line);

        Resolution {
            bindings: self.bindings,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn error<S: Into<String>>(&mut self, line: usize, msg: S) {
        self.errors.push(LoxError::resolve(line, msg));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so a read of the
                // name inside its own initializer is detectable.
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(&name.lexeme);
            }

            Stmt::Function(decl) => {
                // The name is defined before the body resolves, enabling
                // recursion through the enclosing frame.
                if let Some(name) = &decl.name {
                    self.declare(name);
                    self.define(&name.lexeme);
                }

                self.resolve_function(decl, FunctionKind::Function);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);

                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }

            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    self.error(keyword.line, "'break' used outside of a loop");
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.error(keyword.line, "'return' used outside of a function");
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[std::rc::Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = if superclass.is_some() {
            ClassKind::Subclass
        } else {
            ClassKind::Class
        };

        self.declare(name);
        self.define(&name.lexeme);

        if let Some(super_expr) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = super_expr
            {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name.line, "A class cannot inherit from itself");
                }
            }

            self.resolve_expr(super_expr);

            self.begin_scope();
            self.declare_internal("super", name.line);
        }

        // Static methods resolve before the `this` frame opens, with class
        // context suppressed: their closures never carry a receiver, so
        // `this`/`super` inside them are errors and outer-capture depths
        // must not count a frame that has no runtime counterpart.
        let saved_class = self.current_class;
        self.current_class = ClassKind::None;

        for method in methods.iter().filter(|m| m.is_static) {
            self.resolve_function(method, FunctionKind::Static);
        }

        self.current_class = saved_class;

        self.begin_scope();
        self.declare_internal("this", name.line);

        for method in methods.iter().filter(|m| !m.is_static) {
            let kind = if method.name.as_ref().map(|t| t.lexeme.as_str()) == Some("init") {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };

            self.resolve_function(method, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => self.resolve_read(*id, name),

            Expr::Assign { id, name, value } => {
                // RHS first, then bind the target.
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassKind::None {
                    self.error(keyword.line, "Cannot use 'this' outside of a class");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassKind::None => {
                        self.error(keyword.line, "Cannot use 'super' outside of a class");
                        return;
                    }

                    ClassKind::Class => {
                        self.error(
                            keyword.line,
                            "Cannot use 'super' in a class with no superclass",
                        );
                        return;
                    }

                    ClassKind::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Lambda(decl) => self.resolve_function(decl, FunctionKind::Function),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh frame for a function's parameters + body. Loop depth
    /// resets: `break` may not cross a function boundary.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionKind) {
        let enclosing = self.current_function;
        let enclosing_loops = self.loop_depth;
        self.current_function = kind;
        self.loop_depth = 0;

        self.begin_scope();

        for param in &decl.params {
            self.declare(param);
            self.define(&param.lexeme);
        }

        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.loop_depth = enclosing_loops;
        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the frame, warning about anything declared but never used.
    fn end_scope(&mut self) {
        let scope = self
            .scopes
            .pop()
            .expect("attempted to pop the global pseudo-frame");

        let mut unused: Vec<(&String, &VarState)> =
            scope.iter().filter(|(_, state)| !state.used).collect();
        unused.sort_by_key(|(_, state)| (state.line, state.slot));

        for (name, state) in unused {
            self.warnings.push(Warning {
                message: format!("Local variable '{}' is declared but never used", name),
                line: state.line,
            });
        }
    }

    fn declare(&mut self, name: &Token) {
        let global = self.scopes.len() == 1;
        let scope = self.scopes.last_mut().expect("scope stack is never empty");

        if scope.contains_key(&name.lexeme) {
            // Top-level names may be re-declared freely (REPL relies on it);
            // within a local frame it is an error, and the original entry is
            // kept so its slot stays valid.
            if !global {
                self.error(
                    name.line,
                    format!("Variable '{}' is already declared in this scope", name.lexeme),
                );
                return;
            }

            let state = self
                .scopes
                .last_mut()
                .expect("scope stack is never empty")
                .get_mut(&name.lexeme)
                .expect("checked above");
            state.initialized = false;
            return;
        }

        let slot = scope.len();
        scope.insert(
            name.lexeme.clone(),
            VarState {
                slot,
                initialized: false,
                used: false,
                line: name.line,
            },
        );
    }

    fn define(&mut self, name: &str) {
        if let Some(state) = self
            .scopes
            .last_mut()
            .expect("scope stack is never empty")
            .get_mut(name)
        {
            state.initialized = true;
        }
    }

    /// Insert an interpreter-managed name (`this`, `super`) into the current
    /// frame: always slot 0 of a dedicated frame, never warned about.
    fn declare_internal(&mut self, name: &str, line: usize) {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        let slot = scope.len();

        scope.insert(
            name.to_string(),
            VarState {
                slot,
                initialized: true,
                used: true,
                line,
            },
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a variable *read*, enforcing the self-initializer rule with
    /// its outer-shadow carve-out.
    fn resolve_read(&mut self, id: ExprId, name: &Token) {
        if self.scopes.len() > 1 {
            let in_flight = self
                .scopes
                .last()
                .expect("scope stack is never empty")
                .get(&name.lexeme)
                .map(|state| !state.initialized)
                .unwrap_or(false);

            if in_flight {
                // The innermost declaration of this name has not finished
                // initializing. An already-initialized declaration in a
                // strictly enclosing frame (the global pseudo-frame counts)
                // is what the initializer means; otherwise it is an error.
                for i in (0..self.scopes.len() - 1).rev() {
                    let found = match self.scopes[i].get_mut(&name.lexeme) {
                        Some(outer) if outer.initialized => {
                            outer.used = true;
                            let slot = outer.slot;

                            if i > 0 {
                                let depth = self.scopes.len() - 1 - i;
                                debug!(
                                    "carve-out: '{}' bound to outer frame at depth {}",
                                    name.lexeme, depth
                                );
                                self.bindings.insert(id, Binding { depth, slot });
                            }

                            true
                        }

                        _ => false,
                    };

                    if found {
                        return;
                    }
                }

                self.error(
                    name.line,
                    "Cannot read local variable in its own initializer",
                );
                return;
            }
        }

        self.resolve_local(id, name);
    }

    /// Record this occurrence as a local at some depth/slot, or leave it
    /// unresolved (global by name) when no real frame declares it.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        let scope_count = self.scopes.len();
        for i in (0..scope_count).rev() {
            if let Some(state) = self.scopes[i].get_mut(&name.lexeme) {
                state.used = true;

                if i > 0 {
                    let depth = scope_count - 1 - i;
                    debug!("Resolved '{}' at depth {} slot {}", name.lexeme, depth, state.slot);

                    let slot = state.slot;
                    self.bindings.insert(id, Binding { depth, slot });
                } else {
                    debug!("Resolved '{}' as global", name.lexeme);
                }

                return;
            }
        }

        debug!("'{}' not declared anywhere; deferring to globals", name.lexeme);
    }
}
