#[cfg(test)]
mod interpreter_tests {
    use treelox as lox;

    use lox::ast::{IdGen, Stmt};
    use lox::error::{LoxError, RuntimeError};
    use lox::interpreter::Interpreter;
    use lox::output::BufferOutput;
    use lox::parser::Parser;
    use lox::resolver::{Locals, Resolver};
    use lox::scanner::Scanner;
    use lox::value::Value;
    use lox::{run_source, Session};

    fn run(source: &str) -> (BufferOutput, Result<(), LoxError>) {
        let out = BufferOutput::new();
        let mut sink = out.clone();
        let result = run_source(source, &mut sink);
        (out, result)
    }

    fn run_ok(source: &str) -> Vec<String> {
        let (out, result) = run(source);
        if let Err(e) = result {
            panic!("program failed: {}", e);
        }
        assert!(out.errors().is_empty());
        out.lines()
    }

    fn runtime_error(source: &str) -> (Vec<String>, RuntimeError) {
        let (out, result) = run(source);
        match result {
            Err(LoxError::Runtime(e)) => {
                assert_eq!(out.errors(), vec![e.to_string()]);
                (out.lines(), e)
            }
            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    fn front_end(source: &str) -> (Vec<Stmt>, Locals) {
        let (tokens, errors) = Scanner::new(source).scan_all();
        assert!(errors.is_empty());

        let mut ids = IdGen::new();
        let statements = match Parser::new(&tokens, &mut ids).parse() {
            Ok(s) => s,
            Err(e) => panic!("parse failed: {}", e),
        };
        let locals = match Resolver::new().resolve(&statements) {
            Ok(l) => l,
            Err(e) => panic!("resolve failed: {}", e),
        };
        (statements, locals)
    }

    #[test]
    fn test_arithmetic_and_number_display() {
        assert_eq!(
            run_ok("print 1 + 2 * 3; print 10 / 4; print -(2 - 5); print +7; print 1 / 0;"),
            vec!["7", "2.5", "3", "7", "inf"]
        );
    }

    #[test]
    fn test_comparison_and_equality() {
        assert_eq!(
            run_ok(
                "print 1 < 2; print 2 <= 1; print nil == nil; print 1 == \"1\"; \
                 print \"a\" == \"a\"; print true != false;"
            ),
            vec!["true", "false", "true", "false", "true", "true"]
        );
    }

    #[test]
    fn test_truthiness() {
        let source = r#"
            if (0) print "zero"; else print "no";
            if ("") print "empty"; else print "no";
            if (nil) print "no"; else print "nil";
            if (false) print "no"; else print "false";
            print !nil;
        "#;
        assert_eq!(run_ok(source), vec!["zero", "empty", "nil", "false", "true"]);
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let source = r#"
            print nil or "x";
            print false and 1;
            print 1 and 2;
            print "left" or undefined_name;
        "#;
        assert_eq!(run_ok(source), vec!["x", "false", "2", "left"]);
    }

    #[test]
    fn test_huge_integral_numbers_print_every_digit() {
        let (out, result) = run("print 123456789012345678901234567890;\nprint -0;");
        assert!(result.is_ok());
        assert_eq!(out.text(), "123456789012345677877719597056\n-0");
    }

    #[test]
    fn test_global_redeclaration_reads_previous_value() {
        assert_eq!(run_ok("var a = 1; var a = a; print a;"), vec!["1"]);
        assert_eq!(run_ok("var a = 1; var a = a + 1; print a;"), vec!["2"]);
    }

    #[test]
    fn test_block_shadowing() {
        assert_eq!(
            run_ok("var a = 1; { var a = 2; print a; } print a;"),
            vec!["2", "1"]
        );
    }

    #[test]
    fn test_assignment_is_an_expression() {
        assert_eq!(
            run_ok("var a; var b; a = b = 3; print a; print b;"),
            vec!["3", "3"]
        );
    }

    #[test]
    fn test_closure_counter() {
        let source = "
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    print i;
                }
                return count;
            }

            var counter = makeCounter();
            counter();
            counter();
        ";
        assert_eq!(run_ok(source), vec!["1", "2"]);
    }

    #[test]
    fn test_closure_binds_at_declaration() {
        let source = r#"
            var a = "global";
            {
                fun showA() { print a; }
                showA();
                var a = "block";
                showA();
            }
        "#;
        assert_eq!(run_ok(source), vec!["global", "global"]);
    }

    #[test]
    fn test_for_matches_desugared_while() {
        let for_loop = run_ok("for (var i = 0; i < 5; i = i + 1) print i;");
        let while_loop = run_ok("{ var i = 0; while (i < 5) { print i; i = i + 1; } }");

        assert_eq!(for_loop, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(for_loop, while_loop);
    }

    #[test]
    fn test_recursion_and_early_return() {
        let source = "
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(10);

            fun firstOver(limit) {
                var i = 0;
                while (true) {
                    if (i > limit) return i;
                    i = i + 1;
                }
            }
            print firstOver(3);

            fun nothing() {}
            print nothing();
        ";
        assert_eq!(run_ok(source), vec!["55", "4", "nil"]);
    }

    #[test]
    fn test_function_display() {
        assert_eq!(
            run_ok("fun f() {} print f; print clock;"),
            vec!["<fn f>", "<native fn clock>"]
        );
    }

    #[test]
    fn test_arity_mismatch_runs_nothing() {
        let (lines, err) = runtime_error("fun f(a) { print a; }\nf(1, 2);");

        assert!(lines.is_empty());
        assert_eq!(
            err,
            RuntimeError::ArityMismatch {
                expected: 1,
                got: 2,
                line: 2
            }
        );
        assert_eq!(
            err.to_string(),
            "[line 2] Error at ')': Expected 1 arguments but got 2."
        );
    }

    #[test]
    fn test_not_callable() {
        let (_, err) = runtime_error("\"text\"();");
        assert_eq!(
            err.to_string(),
            "[line 1] Error at ')': Can only call functions and classes."
        );
    }

    #[test]
    fn test_uninitialized_access() {
        let (_, err) = runtime_error("var a;\nprint a;");
        assert_eq!(
            err,
            RuntimeError::UninitializedAccess {
                name: "a".to_string(),
                line: 2
            }
        );

        assert_eq!(run_ok("var a; a = 3; print a;"), vec!["3"]);
    }

    #[test]
    fn test_type_mismatch() {
        let (_, err) = runtime_error("print \"a\" + 1;");
        assert_eq!(
            err.to_string(),
            "[line 1] Error at '+': Operands must be numbers."
        );

        let (_, err) = runtime_error("print -\"x\";");
        assert_eq!(
            err.to_string(),
            "[line 1] Error at '-': Operand must be a number."
        );
    }

    #[test]
    fn test_undefined_names() {
        let (_, err) = runtime_error("print missing;");
        assert!(matches!(err, RuntimeError::UnboundName { ref name, .. } if name == "missing"));

        let (_, err) = runtime_error("missing = 1;");
        assert!(matches!(err, RuntimeError::UndefinedTarget { .. }));
    }

    #[test]
    fn test_output_before_error_is_kept() {
        let (lines, err) = runtime_error("print 1;\nprint nope;\nprint 2;");

        assert_eq!(lines, vec!["1"]);
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_static_errors_run_nothing() {
        let (out, result) = run("print 1;\nprint (;\nvar = 2;");
        let err = result.unwrap_err();

        assert!(err.is_static());
        assert!(out.lines().is_empty());
        assert_eq!(out.errors().len(), 2);

        let (out, result) = run("print 1;\nreturn 2;");
        assert!(result.unwrap_err().is_static());
        assert!(out.lines().is_empty());
        assert_eq!(
            out.errors(),
            vec!["[line 2] Error at 'return': Can't return from top-level code."]
        );
    }

    #[test]
    fn test_lex_errors_are_reported() {
        let (out, result) = run("print 1;\n@");

        assert!(result.unwrap_err().is_static());
        assert_eq!(
            out.errors(),
            vec!["[line 2] Error: Unexpected character: @"]
        );
    }

    #[test]
    fn test_clock_is_a_nonnegative_number() {
        assert_eq!(
            run_ok("var t = clock(); print t >= 0; print clock() >= t;"),
            vec!["true", "true"]
        );

        let (_, err) = runtime_error("clock(1);");
        assert!(matches!(err, RuntimeError::ArityMismatch { expected: 0, got: 1, .. }));
    }

    fn halve(args: &[Value]) -> Result<Value, String> {
        match args {
            [Value::Number(n)] => Ok(Value::Number(n / 2.0)),
            _ => Err("Argument must be a number.".to_string()),
        }
    }

    #[test]
    fn test_host_native() {
        let (statements, locals) = front_end("print halve(9); halve(\"x\");");
        let out = BufferOutput::new();
        let mut sink = out.clone();

        let mut interpreter = Interpreter::new(&locals, &mut sink);
        interpreter.define_native("halve", 1, halve);
        let err = interpreter.interpret(&statements).unwrap_err();

        assert_eq!(out.lines(), vec!["4.5"]);
        assert_eq!(
            err.to_string(),
            "[line 1] Error at 'halve': Argument must be a number."
        );
    }

    #[test]
    fn test_one_resolution_many_runs() {
        let source = "
            var total = 0;
            fun add(n) { var step = n; total = total + step; return total; }
            { var x = 2; print add(x); print add(x); }
        ";
        let (statements, locals) = front_end(source);

        let first = BufferOutput::new();
        let second = BufferOutput::new();
        let mut first_sink = first.clone();
        let mut second_sink = second.clone();

        Interpreter::new(&locals, &mut first_sink)
            .interpret(&statements)
            .unwrap();
        Interpreter::new(&locals, &mut second_sink)
            .interpret(&statements)
            .unwrap();

        assert_eq!(first.lines(), vec!["2", "4"]);
        assert_eq!(first.lines(), second.lines());
    }

    #[test]
    fn test_session_keeps_globals_and_closures() {
        let out = BufferOutput::new();
        let mut sink = out.clone();
        let mut session = Session::new();

        session
            .run(
                "fun make() { var c = 0; fun f() { c = c + 1; print c; } return f; } var g = make();",
                &mut sink,
            )
            .unwrap();
        session.run("g(); g();", &mut sink).unwrap();

        // A failed line leaves earlier state alone.
        assert!(session.run("print nope;", &mut sink).is_err());
        session.run("g();", &mut sink).unwrap();

        assert_eq!(out.lines(), vec!["1", "2", "3"]);
        assert_eq!(out.errors().len(), 1);
        assert!(session.globals().borrow().get(&lox::ast::Ident::new("g", 1)).is_ok());
    }
}
