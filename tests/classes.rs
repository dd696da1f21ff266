#[cfg(test)]
mod class_tests {
    use treelox as lox;

    use lox::error::{LoxError, RuntimeError};
    use lox::output::BufferOutput;
    use lox::run_source;

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
        out.lines()
    }

    fn runtime_error(source: &str) -> RuntimeError {
        match run(source).1 {
            Err(LoxError::Runtime(e)) => e,
            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_class_and_instance_display() {
        assert_eq!(
            run_ok("class Bagel {} print Bagel; print Bagel();"),
            vec!["Bagel", "Bagel instance"]
        );
    }

    #[test]
    fn test_fields() {
        let source = "
            class Box {}
            var b = Box();
            b.content = 1;
            b.content = b.content + 1;
            print b.content;
            print b.other = \"set\";
        ";
        assert_eq!(run_ok(source), vec!["2", "set"]);
    }

    #[test]
    fn test_initializer_and_this() {
        let source = "
            class Point {
                init(x, y) {
                    this.x = x;
                    this.y = y;
                }
                sum() { return this.x + this.y; }
            }
            var p = Point(1, 2);
            print p.sum();
        ";
        assert_eq!(run_ok(source), vec!["3"]);
    }

    #[test]
    fn test_init_returns_this() {
        let source = "
            class Foo {
                init() {
                    this.n = 1;
                    return;
                }
            }
            var foo = Foo();
            var again = foo.init();
            print again == foo;
            print again.n;
        ";
        assert_eq!(run_ok(source), vec!["true", "1"]);
    }

    #[test]
    fn test_class_arity_comes_from_init() {
        let err = runtime_error("class P { init(a) {} }\nP();");
        assert_eq!(
            err,
            RuntimeError::ArityMismatch {
                expected: 1,
                got: 0,
                line: 2
            }
        );

        let err = runtime_error("class Q {}\nQ(1);");
        assert!(matches!(err, RuntimeError::ArityMismatch { expected: 0, got: 1, .. }));
    }

    #[test]
    fn test_bound_methods_remember_their_receiver() {
        let source = r#"
            class Person {
                init(name) { this.name = name; }
                greet() { print this.name; }
            }
            var jane = Person("jane");
            var greet = jane.greet;
            jane.name = "janet";
            greet();
            print greet == jane.greet;
        "#;
        assert_eq!(run_ok(source), vec!["janet", "false"]);
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = "
            class A { m() { return \"method\"; } }
            var a = A();
            print a.m();
            fun replacement() { return \"field\"; }
            a.m = replacement;
            print a.m();
        ";
        assert_eq!(run_ok(source), vec!["method", "field"]);
    }

    #[test]
    fn test_inheritance_and_override() {
        let source = r#"
            class Animal {
                speak() { return "..."; }
                kind() { return "animal"; }
            }
            class Dog < Animal {
                speak() { return "woof"; }
            }
            var d = Dog();
            print d.speak();
            print d.kind();
        "#;
        assert_eq!(run_ok(source), vec!["woof", "animal"]);
    }

    #[test]
    fn test_super_binds_this_to_the_receiver() {
        let source = r#"
            class A {
                method() { print "A method"; }
                who() { print this.name; }
            }
            class B < A {
                method() { print "B method"; }
                test() { super.method(); super.who(); }
            }
            class C < B {
                init() { this.name = "c"; }
            }
            C().test();
        "#;
        assert_eq!(run_ok(source), vec!["A method", "c"]);
    }

    #[test]
    fn test_super_is_static_to_the_declaring_class() {
        let source = r#"
            class A { m() { return "A"; } }
            class B < A { m() { return "B" ; } up() { return super.m(); } }
            class C < B { m() { return "C"; } }
            print C().up();
        "#;
        assert_eq!(run_ok(source), vec!["A"]);
    }

    #[test]
    fn test_inherited_initializer() {
        let source = "
            class Base { init(v) { this.v = v; } }
            class Derived < Base {}
            print Derived(7).v;
        ";
        assert_eq!(run_ok(source), vec!["7"]);
    }

    #[test]
    fn test_unknown_property() {
        let err = runtime_error("class A {}\nprint A().missing;");
        assert_eq!(
            err.to_string(),
            "[line 2] Error at 'missing': Undefined property 'missing'."
        );

        let err = runtime_error("class A {} class B < A { m() { return super.nope; } }\nB().m();");
        assert!(matches!(err, RuntimeError::UnknownProperty { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_properties_need_an_instance() {
        let err = runtime_error("var n = 3;\nprint n.field;");
        assert_eq!(
            err.to_string(),
            "[line 2] Error at 'field': Only instances have properties."
        );

        let err = runtime_error("class A {}\nA.field = 1;");
        assert_eq!(
            err.to_string(),
            "[line 2] Error at 'field': Only instances have fields."
        );
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let err = runtime_error("var NotAClass = \"nope\";\nclass Sub < NotAClass {}");
        assert_eq!(
            err.to_string(),
            "[line 2] Error at 'NotAClass': Superclass must be a class."
        );
    }

    #[test]
    fn test_methods_can_refer_to_their_class() {
        let source = "
            class Node {
                make() { return Node(); }
            }
            print Node().make();
        ";
        assert_eq!(run_ok(source), vec!["Node instance"]);
    }
}
