//! Shared harness for the integration tests: run a full program through
//! scanner → parser → resolver → interpreter against a capture buffer and
//! hand back whatever it printed.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use betalox::ast::Stmt;
use betalox::error::RuntimeError;
use betalox::interpreter::Interpreter;
use betalox::parser::Parser;
use betalox::resolver::{Resolution, Resolver};
use betalox::scanner::Scanner;
use betalox::token::Token;

/// Cloneable in-memory sink the interpreter prints into.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn scan(source: &str) -> Vec<Token> {
    Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("unexpected lex error")
}

pub fn parse(source: &str) -> Vec<Stmt> {
    let mut parser = Parser::new(scan(source), 0);
    let (statements, errors) = parser.parse();

    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(messages.is_empty(), "unexpected parse errors: {:?}", messages);

    statements
}

pub fn resolve(source: &str) -> (Vec<Stmt>, Resolution) {
    let statements = parse(source);
    let resolution = Resolver::new().resolve(&statements);

    (statements, resolution)
}

/// Run a program and return everything it printed.
pub fn run(source: &str) -> Result<String, RuntimeError> {
    let (statements, resolution) = resolve(source);

    let messages: Vec<String> = resolution.errors.iter().map(|e| e.to_string()).collect();
    assert!(
        messages.is_empty(),
        "unexpected resolve errors: {:?}",
        messages
    );

    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::with_output(Box::new(buffer.clone()));
    interpreter.add_bindings(resolution.bindings);

    interpreter.interpret(&statements)?;

    Ok(buffer.contents())
}

/// Run a program that must print successfully.
pub fn run_ok(source: &str) -> String {
    run(source).expect("program was expected to succeed")
}

/// Run a program that must fail at runtime; returns the error.
pub fn run_err(source: &str) -> RuntimeError {
    run(source).expect_err("program was expected to fail at runtime")
}

/// Resolve a program that must fail statically; returns the error messages.
pub fn resolve_errors(source: &str) -> Vec<String> {
    let (_, resolution) = resolve(source);

    assert!(
        !resolution.errors.is_empty(),
        "program was expected to fail resolution"
    );

    resolution.errors.iter().map(|e| e.to_string()).collect()
}
