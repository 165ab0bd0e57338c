mod common;

use common::run_ok;

#[test]
fn if_else_branches() {
    let source = "\
        var a = \"cond2\";\n\
        if (a == \"cond1\") {\n\
            print \"first\";\n\
        } else if (a == \"cond2\") {\n\
            print \"second\";\n\
        }";

    assert_eq!(run_ok(source), "second\n");
}

#[test]
fn while_loops_iterate() {
    let source = "\
        var i = 0;\n\
        while (i < 3) {\n\
            print i;\n\
            i = i + 1;\n\
        }";

    assert_eq!(run_ok(source), "0\n1\n2\n");
}

#[test]
fn break_exits_the_nearest_loop() {
    let source = "\
        var i = 0;\n\
        while (true) {\n\
            i = i + 1;\n\
            if (i == 3) break;\n\
        }\n\
        print i;";

    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn break_only_exits_the_inner_loop() {
    let source = "\
        var rows = 0;\n\
        var steps = 0;\n\
        while (rows < 2) {\n\
            rows = rows + 1;\n\
            while (true) {\n\
                steps = steps + 1;\n\
                break;\n\
            }\n\
        }\n\
        print rows;\n\
        print steps;";

    assert_eq!(run_ok(source), "2\n2\n");
}

#[test]
fn for_loops_desugar_to_while() {
    let source = "\
        var sum = 0;\n\
        for (var i = 1; i <= 4; i = i + 1) {\n\
            sum = sum + i;\n\
        }\n\
        print sum;";

    assert_eq!(run_ok(source), "10\n");
}

#[test]
fn break_works_inside_for_loops() {
    let source = "\
        var last = 0;\n\
        for (var i = 0; i < 100; i = i + 1) {\n\
            if (i == 5) break;\n\
            last = i;\n\
        }\n\
        print last;";

    assert_eq!(run_ok(source), "4\n");
}

#[test]
fn for_loop_clauses_are_optional() {
    let source = "\
        var i = 0;\n\
        for (;;) {\n\
            i = i + 1;\n\
            if (i == 2) break;\n\
        }\n\
        print i;";

    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn return_crosses_loops_to_the_call_frame() {
    let source = "\
        fun firstOver(limit) {\n\
            var n = 0;\n\
            while (true) {\n\
                n = n + 1;\n\
                if (n > limit) return n;\n\
            }\n\
        }\n\
        print firstOver(3);";

    assert_eq!(run_ok(source), "4\n");
}

#[test]
fn lambdas_are_first_class_values() {
    let source = "\
        var add = fun (a, b) { return a + b; };\n\
        print add(1, 2);";

    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn lambdas_can_be_invoked_immediately() {
    assert_eq!(run_ok("print (fun (x) { return x * 2; })(21);"), "42\n");
}

#[test]
fn lambdas_are_legal_in_statement_position() {
    // `fun` not followed by an identifier parses as an expression.
    assert_eq!(run_ok("fun (x) { return x; }(1); print \"ok\";"), "ok\n");
}

#[test]
fn lambdas_close_over_their_environment() {
    let source = "\
        fun adder(n) {\n\
            return fun (x) { return x + n; };\n\
        }\n\
        var addTwo = adder(2);\n\
        print addTwo(40);";

    assert_eq!(run_ok(source), "42\n");
}

#[test]
fn lambdas_pass_as_arguments() {
    let source = "\
        fun twice(f, v) {\n\
            return f(f(v));\n\
        }\n\
        print twice(fun (n) { return n * 3; }, 2);";

    assert_eq!(run_ok(source), "18\n");
}
