mod common;

use betalox::error::RuntimeErrorKind;
use betalox::interpreter::Interpreter;
use betalox::parser::Parser;
use betalox::resolver::Resolver;
use common::{run_err, run_ok, scan, SharedBuffer};

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
    assert_eq!(run_ok("print (1 + 2) * 3;"), "9\n");
    assert_eq!(run_ok("print 10 - 4 / 2;"), "8\n");
    assert_eq!(run_ok("print -3 + 5;"), "2\n");
}

#[test]
fn integral_numbers_print_without_a_fraction() {
    assert_eq!(run_ok("print 4 / 2;"), "2\n");
    assert_eq!(run_ok("print 2.5 + 0.25;"), "2.75\n");
}

#[test]
fn string_concatenation_stringifies_either_operand() {
    assert_eq!(run_ok("print \"a\" + 1;"), "a1\n");
    assert_eq!(run_ok("print 2 + \"b\";"), "2b\n");
    assert_eq!(run_ok("print \"x\" + \"y\";"), "xy\n");
    assert_eq!(run_ok("print \"n=\" + 1.5;"), "n=1.5\n");
}

#[test]
fn division_by_zero_is_its_own_error_kind() {
    let error = run_err("print 1 / 0;");

    assert_eq!(error.kind, RuntimeErrorKind::DivisionByZero);
}

#[test]
fn arithmetic_type_mismatches_are_reported() {
    let error = run_err("print 1 + nil;");
    assert_eq!(error.kind, RuntimeErrorKind::TypeMismatch);

    let error = run_err("print -\"s\";");
    assert_eq!(error.kind, RuntimeErrorKind::TypeMismatch);

    let error = run_err("print 1 < \"2\";");
    assert_eq!(error.kind, RuntimeErrorKind::TypeMismatch);
}

#[test]
fn equality_never_crosses_types() {
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(run_ok("print nil == 0;"), "false\n");
    assert_eq!(run_ok("print \"1\" == 1;"), "false\n");
    assert_eq!(run_ok("print true == 1;"), "false\n");
    assert_eq!(run_ok("print 2 == 2;"), "true\n");
    assert_eq!(run_ok("print \"a\" != \"b\";"), "true\n");
}

#[test]
fn only_nil_and_false_are_falsy() {
    assert_eq!(run_ok("if (0) print \"yes\"; else print \"no\";"), "yes\n");
    assert_eq!(run_ok("if (\"\") print \"yes\"; else print \"no\";"), "yes\n");
    assert_eq!(run_ok("if (nil) print \"yes\"; else print \"no\";"), "no\n");
    assert_eq!(run_ok("if (false) print \"yes\"; else print \"no\";"), "no\n");
}

#[test]
fn logical_operators_yield_operand_values() {
    assert_eq!(run_ok("print \"a\" or \"b\";"), "a\n");
    assert_eq!(run_ok("print nil or \"b\";"), "b\n");
    assert_eq!(run_ok("print nil and \"b\";"), "nil\n");
    assert_eq!(run_ok("print \"a\" and \"b\";"), "b\n");
}

#[test]
fn block_shadowing_reads_the_outer_initializer() {
    let output = run_ok("var a = 1; { var a = a + 1; print a; } print a;");

    assert_eq!(output, "2\n1\n");
}

#[test]
fn variable_scoping_across_nested_blocks() {
    let source = "\
        var a = \"global a\";\n\
        var b = \"global b\";\n\
        {\n\
            var a = \"outer a\";\n\
            {\n\
                var a = \"inner a\";\n\
                print a;\n\
                print b;\n\
            }\n\
            print a;\n\
        }\n\
        print a;";

    assert_eq!(
        run_ok(source),
        "inner a\nglobal b\nouter a\nglobal a\n"
    );
}

#[test]
fn reading_a_declared_but_unassigned_variable_is_unbound() {
    let error = run_err("var b; print b;");

    assert_eq!(error.kind, RuntimeErrorKind::UnboundVariable);
}

#[test]
fn reading_an_undeclared_name_is_undefined() {
    let error = run_err("print nowhere;");

    assert_eq!(error.kind, RuntimeErrorKind::UndefinedVariable);
}

#[test]
fn the_two_unknown_variable_kinds_are_distinguishable() {
    let unbound = run_err("var b; print b;");
    let undefined = run_err("print nowhere;");

    assert_ne!(unbound.kind, undefined.kind);
}

#[test]
fn assignment_never_implicitly_declares() {
    let error = run_err("ghost = 1;");

    assert_eq!(error.kind, RuntimeErrorKind::UndefinedVariable);
}

#[test]
fn assignment_is_an_expression_yielding_the_value() {
    assert_eq!(run_ok("var a = 1; print a = 2;"), "2\n");
}

#[test]
fn unassigned_variables_accept_their_first_assignment() {
    assert_eq!(run_ok("var b; b = 5; print b;"), "5\n");
}

#[test]
fn closures_capture_environments_by_reference() {
    let source = "\
        fun makeCounter() {\n\
            var count = 0;\n\
            return fun () {\n\
                count = count + 1;\n\
                return count;\n\
            };\n\
        }\n\
        var c1 = makeCounter();\n\
        var c2 = makeCounter();\n\
        print c1();\n\
        print c1();\n\
        print c2();\n\
        print c1();";

    assert_eq!(run_ok(source), "1\n2\n1\n3\n");
}

#[test]
fn sibling_closures_share_one_environment() {
    let source = "\
        fun pair() {\n\
            var n = 0;\n\
            fun get() { return n; }\n\
            fun bump() { n = n + 1; }\n\
            bump();\n\
            bump();\n\
            return get();\n\
        }\n\
        print pair();";

    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn recursion_reaches_the_function_through_its_enclosing_scope() {
    let source = "\
        fun fib(n) {\n\
            if (n < 2) return n;\n\
            return fib(n - 1) + fib(n - 2);\n\
        }\n\
        print fib(10);";

    assert_eq!(run_ok(source), "55\n");
}

#[test]
fn functions_return_nil_without_an_explicit_return() {
    assert_eq!(run_ok("fun noop() {} print noop();"), "nil\n");
}

#[test]
fn calling_a_non_callable_is_an_error() {
    let error = run_err("var x = 1; x();");

    assert_eq!(error.kind, RuntimeErrorKind::NotCallable);
}

#[test]
fn wrong_argument_count_is_an_arity_error() {
    let error = run_err("fun f(a, b) { return a; } f(1);");

    assert_eq!(error.kind, RuntimeErrorKind::ArityMismatch);
}

#[test]
fn clock_is_predefined_and_returns_a_number() {
    assert_eq!(run_ok("print clock() >= 0;"), "true\n");
}

#[test]
fn runtime_errors_carry_the_offending_line() {
    let error = run_err("var a = 1;\nprint a + nil;");

    assert_eq!(error.line, 2);
}

#[test]
fn definitions_persist_across_inputs_sharing_one_interpreter() {
    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::with_output(Box::new(buffer.clone()));

    // First input defines; second input uses. Node ids carry over so the
    // merged binding table never collides.
    let mut parser = Parser::new(scan("var a = 10; fun double(x) { return x * 2; }"), 0);
    let (first, errors) = parser.parse();
    assert!(errors.is_empty());

    let resolution = Resolver::new().resolve(&first);
    assert!(resolution.errors.is_empty());
    interpreter.add_bindings(resolution.bindings);
    interpreter.interpret(&first).unwrap();

    let mut parser = Parser::new(scan("print double(a);"), parser.next_id());
    let (second, errors) = parser.parse();
    assert!(errors.is_empty());

    let resolution = Resolver::new().resolve(&second);
    assert!(resolution.errors.is_empty());
    interpreter.add_bindings(resolution.bindings);
    interpreter.interpret(&second).unwrap();

    assert_eq!(buffer.contents(), "20\n");
}

#[test]
fn a_runtime_error_leaves_the_interpreter_reusable() {
    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::with_output(Box::new(buffer.clone()));

    let mut parser = Parser::new(scan("var a = 1; { var b = a + nil; }"), 0);
    let (first, _) = parser.parse();
    let resolution = Resolver::new().resolve(&first);
    interpreter.add_bindings(resolution.bindings);
    assert!(interpreter.interpret(&first).is_err());

    // The environment pointer was restored on the error path: globals still
    // resolve.
    let mut parser = Parser::new(scan("print a;"), parser.next_id());
    let (second, _) = parser.parse();
    let resolution = Resolver::new().resolve(&second);
    interpreter.add_bindings(resolution.bindings);
    interpreter.interpret(&second).unwrap();

    assert_eq!(buffer.contents(), "1\n");
}
