mod common;

use betalox::error::RuntimeErrorKind;
use common::{run_err, run_ok};

#[test]
fn instances_hold_fields_set_lazily() {
    let source = "\
        class Bag {}\n\
        var bag = Bag();\n\
        bag.item = \"apple\";\n\
        print bag.item;";

    assert_eq!(run_ok(source), "apple\n");
}

#[test]
fn methods_bind_their_receiver() {
    let source = "\
        class Greeter {\n\
            init(name) { this.name = name; }\n\
            greet() { return \"hi \" + this.name; }\n\
        }\n\
        print Greeter(\"ada\").greet();";

    assert_eq!(run_ok(source), "hi ada\n");
}

#[test]
fn a_detached_method_remembers_its_receiver() {
    let source = "\
        class Cake {\n\
            flavor() { return this.kind; }\n\
        }\n\
        var cake = Cake();\n\
        cake.kind = \"chocolate\";\n\
        var f = cake.flavor;\n\
        print f();";

    assert_eq!(run_ok(source), "chocolate\n");
}

#[test]
fn construction_always_returns_the_instance() {
    let source = "\
        class C {\n\
            init(x) {\n\
                this.x = x;\n\
                return 42;\n\
            }\n\
        }\n\
        print C(3).x;";

    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn ancestor_to_descendant_dispatch_runs_every_override() {
    let source = "\
        class Base {\n\
            m() {\n\
                print \"base\";\n\
                return \"base result\";\n\
            }\n\
        }\n\
        class Sub < Base {\n\
            m() {\n\
                print \"sub\";\n\
                return \"sub result\";\n\
            }\n\
        }\n\
        print Sub().m();";

    // Root ancestor first, and the call's value is the leaf-most result.
    assert_eq!(run_ok(source), "base\nsub\nsub result\n");
}

#[test]
fn a_method_declared_only_on_the_base_runs_once() {
    let source = "\
        class Base {\n\
            only() { print \"once\"; }\n\
        }\n\
        class Sub < Base {}\n\
        Sub().only();";

    assert_eq!(run_ok(source), "once\n");
}

#[test]
fn dispatch_chains_span_three_levels() {
    let source = "\
        class A { m() { print \"A\"; } }\n\
        class B < A { m() { print \"B\"; } }\n\
        class C < B { m() { print \"C\"; } }\n\
        C().m();";

    assert_eq!(run_ok(source), "A\nB\nC\n");
}

#[test]
fn initializer_chains_run_root_first() {
    let source = "\
        class Animal {\n\
            init(name) {\n\
                this.name = name;\n\
                this.tagged = \"animal\";\n\
            }\n\
        }\n\
        class Dog < Animal {\n\
            init(name) {\n\
                this.loud = this.tagged + \"!\";\n\
            }\n\
        }\n\
        var d = Dog(\"rex\");\n\
        print d.name;\n\
        print d.loud;";

    // The base initializer ran first (with the same arguments), so the
    // derived one observes its field writes.
    assert_eq!(run_ok(source), "rex\nanimal!\n");
}

#[test]
fn chain_arity_comes_from_the_root_most_override() {
    let source = "\
        class A { f(x) { print \"A\" + x; } }\n\
        class B < A { f(x, y) { print \"B\" + x; } }\n\
        B().f(7);";

    assert_eq!(run_ok(source), "A7\nB7\n");
}

#[test]
fn fields_shadow_methods_once_set() {
    let source = "\
        class C {\n\
            m() { return \"method\"; }\n\
        }\n\
        var c = C();\n\
        print c.m();\n\
        c.m = \"field\";\n\
        print c.m;";

    assert_eq!(run_ok(source), "method\nfield\n");
}

#[test]
fn getters_run_on_access_without_call_syntax() {
    let source = "\
        class Circle {\n\
            init(r) { this.r = r; }\n\
            area { return this.r * this.r * 3; }\n\
        }\n\
        print Circle(2).area;";

    assert_eq!(run_ok(source), "12\n");
}

#[test]
fn getter_chains_follow_the_dispatch_rule() {
    let source = "\
        class A { size { return 1; } }\n\
        class B < A { size { return 2; } }\n\
        print B().size;";

    // Both getters run; the access yields the leaf-most result.
    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn static_methods_are_reachable_through_the_class() {
    let source = "\
        class Math {\n\
            class square(n) { return n * n; }\n\
        }\n\
        print Math.square(3);";

    assert_eq!(run_ok(source), "9\n");
}

#[test]
fn static_methods_are_not_reachable_through_instances() {
    let source = "\
        class Math {\n\
            class square(n) { return n * n; }\n\
        }\n\
        Math().square(3);";

    let error = run_err(source);

    assert_eq!(error.kind, RuntimeErrorKind::UndefinedProperty);
}

#[test]
fn static_chains_also_run_root_first() {
    let source = "\
        class A { class hello() { print \"A\"; } }\n\
        class B < A { class hello() { print \"B\"; } }\n\
        B.hello();";

    assert_eq!(run_ok(source), "A\nB\n");
}

#[test]
fn super_uses_conventional_single_lookup() {
    let source = "\
        class A {\n\
            m() { return \"A\"; }\n\
        }\n\
        class B < A {\n\
            probe() { return super.m(); }\n\
        }\n\
        print B().probe();";

    assert_eq!(run_ok(source), "A\n");
}

#[test]
fn super_binds_the_current_instance() {
    let source = "\
        class A {\n\
            who() { return this.tag; }\n\
        }\n\
        class B < A {\n\
            init() { this.tag = \"b-instance\"; }\n\
            probe() { return super.who(); }\n\
        }\n\
        print B().probe();";

    assert_eq!(run_ok(source), "b-instance\n");
}

#[test]
fn methods_close_over_their_receiver_in_nested_functions() {
    let source = "\
        class C {\n\
            init() { this.v = 7; }\n\
            get() {\n\
                fun inner() { return this.v; }\n\
                return inner();\n\
            }\n\
        }\n\
        print C().get();";

    assert_eq!(run_ok(source), "7\n");
}

#[test]
fn property_access_on_non_instances_is_an_error() {
    let error = run_err("var x = 1; print x.field;");

    assert_eq!(error.kind, RuntimeErrorKind::NotAnInstance);
}

#[test]
fn undefined_properties_are_reported() {
    let error = run_err("class C {} print C().missing;");

    assert_eq!(error.kind, RuntimeErrorKind::UndefinedProperty);
}

#[test]
fn a_superclass_must_be_a_class() {
    let error = run_err("var NotAClass = 1; class C < NotAClass {}");

    assert_eq!(error.kind, RuntimeErrorKind::InvalidSuperclass);
}

#[test]
fn class_values_and_instances_print_readably() {
    let source = "\
        class Point {}\n\
        print Point;\n\
        print Point();";

    assert_eq!(run_ok(source), "<class Point>\n<Point instance>\n");
}
