mod common;

use common::{run_capture, run_diagnostics, run_error, try_run};
use php_core::ast::builder::AstBuilder;
use php_core::ast::{BinaryOp, CastKind, ClassModifiers, ClassRef, ExprId, StmtId};
use php_core::core::value::Visibility;

fn tf<'a>(b: &AstBuilder<'a>, cond: ExprId<'a>) -> ExprId<'a> {
    b.ternary(cond, Some(b.string("T")), b.string("F"))
}

/// `class Point { public $x = 0; public $y = 0; __construct($x, $y) ...; sum() }`
fn point_class<'a>(b: &AstBuilder<'a>) -> StmtId<'a> {
    b.class(
        "Point",
        None,
        &[
            b.property("x", Some(b.int(0)), Visibility::Public),
            b.property("y", Some(b.int(0)), Visibility::Public),
            b.method(
                "__construct",
                &[b.param("x"), b.param("y")],
                &[
                    b.expr_stmt(b.assign(b.prop(b.var("this"), "x"), b.var("x"))),
                    b.expr_stmt(b.assign(b.prop(b.var("this"), "y"), b.var("y"))),
                ],
                Visibility::Public,
            ),
            b.method(
                "sum",
                &[],
                &[b.ret(Some(b.binary(
                    b.prop(b.var("this"), "x"),
                    BinaryOp::Plus,
                    b.prop(b.var("this"), "y"),
                )))],
                Visibility::Public,
            ),
        ],
    )
}

fn new_point<'a>(b: &AstBuilder<'a>, x: i64, y: i64) -> ExprId<'a> {
    b.new_object(b.class_named("Point"), &[b.int(x), b.int(y)])
}

/// `class A { function hello() { return "A"; } }` and a `B` overriding it
fn a_and_b<'a>(b: &AstBuilder<'a>) -> [StmtId<'a>; 2] {
    [
        b.class(
            "A",
            None,
            &[b.method("hello", &[], &[b.ret(Some(b.string("A")))], Visibility::Public)],
        ),
        b.class(
            "B",
            Some("A"),
            &[b.method(
                "hello",
                &[],
                &[b.ret(Some(b.binary(
                    b.string("B"),
                    BinaryOp::Concat,
                    b.static_call(ClassRef::Parent, "hello", &[]),
                )))],
                Visibility::Public,
            )],
        ),
    ]
}

#[test]
fn test_constructor_properties_and_methods() {
    let out = run_capture(|b| {
        vec![
            point_class(b),
            b.expr_stmt(b.assign(b.var("p"), new_point(b, 2, 3))),
            b.echo(&[
                b.method_call(b.var("p"), "sum", &[]),
                b.string(","),
                b.prop(b.var("p"), "x"),
            ]),
        ]
    });
    assert_eq!(out, "5,2");
}

#[test]
fn test_class_used_before_its_declaration() {
    let out = run_capture(|b| {
        vec![
            b.echo(&[b.method_call(new_point(b, 1, 1), "sum", &[])]),
            point_class(b),
        ]
    });
    assert_eq!(out, "2");
}

#[test]
fn test_parent_method_call() {
    let out = run_capture(|b| {
        let [a, b_class] = a_and_b(b);
        vec![
            a,
            b_class,
            b.echo(&[b.method_call(b.new_object(b.class_named("B"), &[]), "hello", &[])]),
        ]
    });
    assert_eq!(out, "BA");
}

#[test]
fn test_late_static_binding() {
    let out = run_capture(|b| {
        vec![
            b.class(
                "Model",
                None,
                &[
                    b.static_method(
                        "create",
                        &[],
                        &[b.ret(Some(b.static_call(ClassRef::Static, "name", &[])))],
                        Visibility::Public,
                    ),
                    b.static_method(
                        "selfName",
                        &[],
                        &[b.ret(Some(b.static_call(ClassRef::SelfRef, "name", &[])))],
                        Visibility::Public,
                    ),
                    b.static_method(
                        "name",
                        &[],
                        &[b.ret(Some(b.string("model")))],
                        Visibility::Public,
                    ),
                ],
            ),
            b.class(
                "User",
                Some("Model"),
                &[b.static_method(
                    "name",
                    &[],
                    &[b.ret(Some(b.string("user")))],
                    Visibility::Public,
                )],
            ),
            b.echo(&[
                b.static_call(b.class_named("User"), "create", &[]),
                b.string(" "),
                b.static_call(b.class_named("Model"), "create", &[]),
                b.string(" "),
                b.static_call(b.class_named("User"), "selfName", &[]),
            ]),
        ]
    });
    assert_eq!(out, "user model model");
}

#[test]
fn test_static_properties_are_shared_with_subclasses() {
    let out = run_capture(|b| {
        let count = || b.static_prop(ClassRef::SelfRef, "count");
        vec![
            b.class(
                "Counter",
                None,
                &[
                    b.static_property("count", Some(b.int(0)), Visibility::Public),
                    b.static_method(
                        "bump",
                        &[],
                        &[
                            b.expr_stmt(b.post_inc(count())),
                            b.ret(Some(count())),
                        ],
                        Visibility::Public,
                    ),
                ],
            ),
            b.class("Sub", Some("Counter"), &[]),
            b.expr_stmt(b.static_call(b.class_named("Counter"), "bump", &[])),
            b.expr_stmt(b.static_call(b.class_named("Counter"), "bump", &[])),
            b.echo(&[
                b.static_prop(b.class_named("Counter"), "count"),
                b.static_call(b.class_named("Sub"), "bump", &[]),
                b.static_prop(b.class_named("Counter"), "count"),
            ]),
        ]
    });
    assert_eq!(out, "233");
}

#[test]
fn test_undeclared_static_property() {
    let err = run_error(|b| {
        vec![
            b.class("Plain", None, &[]),
            b.echo(&[b.static_prop(b.class_named("Plain"), "nope")]),
        ]
    });
    assert_eq!(err.to_string(), "Access to undeclared static property Plain::$nope");
}

#[test]
fn test_class_constants() {
    let out = run_capture(|b| {
        vec![
            b.class(
                "C",
                None,
                &[
                    b.class_constant("A", b.int(2)),
                    b.class_constant(
                        "B",
                        b.binary(b.class_const(ClassRef::SelfRef, "A"), BinaryOp::Mul, b.int(3)),
                    ),
                ],
            ),
            b.class("D", Some("C"), &[]),
            b.echo(&[
                b.class_const(b.class_named("C"), "B"),
                b.class_const(b.class_named("C"), "class"),
                b.class_const(b.class_named("D"), "A"),
            ]),
        ]
    });
    assert_eq!(out, "6C2");
}

#[test]
fn test_undefined_class_constant() {
    let err = run_error(|b| {
        vec![
            b.class("C", None, &[]),
            b.echo(&[b.class_const(b.class_named("C"), "MISSING")]),
        ]
    });
    assert_eq!(err.to_string(), "Undefined constant \"C::MISSING\"");
}

#[test]
fn test_instanceof_follows_inheritance() {
    let out = run_capture(|b| {
        let [a, b_class] = a_and_b(b);
        vec![
            a,
            b_class,
            b.expr_stmt(b.assign(b.var("o"), b.new_object(b.class_named("B"), &[]))),
            b.echo(&[
                tf(b, b.instance_of(b.var("o"), b.class_named("A"))),
                tf(b, b.instance_of(b.var("o"), b.class_named("b"))),
                tf(b, b.instance_of(b.new_object(b.class_named("A"), &[]), b.class_named("B"))),
                tf(b, b.instance_of(b.int(1), b.class_named("A"))),
            ]),
        ]
    });
    assert_eq!(out, "TTFF");
}

#[test]
fn test_objects_are_handles_and_clone_copies() {
    let out = run_capture(|b| {
        vec![
            b.class(
                "Box",
                None,
                &[
                    b.property("items", Some(b.array_list(&[])), Visibility::Public),
                    b.property("tag", Some(b.string("orig")), Visibility::Public),
                    b.method(
                        "__clone",
                        &[],
                        &[b.expr_stmt(b.assign(b.prop(b.var("this"), "tag"), b.string("copy")))],
                        Visibility::Public,
                    ),
                ],
            ),
            b.expr_stmt(b.assign(b.var("a"), b.new_object(b.class_named("Box"), &[]))),
            b.expr_stmt(b.assign(b.append(b.prop(b.var("a"), "items")), b.int(1))),
            b.expr_stmt(b.assign(b.var("b"), b.clone_object(b.var("a")))),
            b.expr_stmt(b.assign(b.append(b.prop(b.var("b"), "items")), b.int(2))),
            b.expr_stmt(b.assign(b.var("alias"), b.var("a"))),
            b.expr_stmt(b.assign(b.prop(b.var("alias"), "seen"), b.bool(true))),
            b.echo(&[
                b.call("count", &[b.prop(b.var("a"), "items")]),
                b.call("count", &[b.prop(b.var("b"), "items")]),
                b.prop(b.var("a"), "tag"),
                b.prop(b.var("b"), "tag"),
                b.prop(b.var("a"), "seen"),
                tf(b, b.binary(b.var("a"), BinaryOp::EqEqEq, b.var("alias"))),
                tf(b, b.binary(b.var("a"), BinaryOp::EqEqEq, b.var("b"))),
            ]),
        ]
    });
    assert_eq!(out, "12origcopy1TF");
}

#[test]
fn test_object_equality() {
    let out = run_capture(|b| {
        vec![
            point_class(b),
            b.echo(&[
                tf(b, b.binary(new_point(b, 1, 2), BinaryOp::EqEq, new_point(b, 1, 2))),
                tf(b, b.binary(new_point(b, 1, 2), BinaryOp::EqEqEq, new_point(b, 1, 2))),
                tf(b, b.binary(new_point(b, 1, 2), BinaryOp::EqEq, new_point(b, 1, 3))),
                tf(b, b.binary(new_point(b, 1, 2), BinaryOp::Lt, new_point(b, 1, 3))),
            ]),
        ]
    });
    assert_eq!(out, "TFFT");
}

#[test]
fn test_to_string_hook() {
    let out = run_capture(|b| {
        vec![
            b.class(
                "Name",
                None,
                &[b.method("__toString", &[], &[b.ret(Some(b.string("Ann")))], Visibility::Public)],
            ),
            b.expr_stmt(b.assign(b.var("n"), b.new_object(b.class_named("Name"), &[]))),
            b.echo(&[
                b.binary(b.string("Hi "), BinaryOp::Concat, b.var("n")),
                b.string(" "),
                b.cast(CastKind::String, b.var("n")),
                b.string(" "),
                tf(b, b.binary(b.var("n"), BinaryOp::EqEq, b.string("Ann"))),
            ]),
        ]
    });
    assert_eq!(out, "Hi Ann Ann T");
}

#[test]
fn test_object_without_to_string_in_string_context() {
    let (out, diagnostics) = run_diagnostics(|b| {
        vec![
            b.class("Plain", None, &[]),
            b.echo(&[b.binary(
                b.string("["),
                BinaryOp::Concat,
                b.new_object(b.class_named("Plain"), &[]),
            )]),
        ]
    });
    assert_eq!(out, "[");
    assert_eq!(
        diagnostics,
        vec!["Recoverable fatal error: Object of class Plain could not be converted to string"]
    );
}

/// `class Id { public readonly $id; __construct($id) { $this->id = $id; } }`
fn id_class<'a>(b: &AstBuilder<'a>) -> StmtId<'a> {
    b.class(
        "Id",
        None,
        &[
            b.readonly_property("id"),
            b.method(
                "__construct",
                &[b.param("id")],
                &[b.expr_stmt(b.assign(b.prop(b.var("this"), "id"), b.var("id")))],
                Visibility::Public,
            ),
        ],
    )
}

#[test]
fn test_readonly_property_is_write_once() {
    let out = run_capture(|b| {
        vec![
            id_class(b),
            b.echo(&[b.prop(b.new_object(b.class_named("Id"), &[b.int(5)]), "id")]),
        ]
    });
    assert_eq!(out, "5");

    let err = run_error(|b| {
        vec![
            id_class(b),
            b.expr_stmt(b.assign(b.var("r"), b.new_object(b.class_named("Id"), &[b.int(5)]))),
            b.expr_stmt(b.assign(b.prop(b.var("r"), "id"), b.int(6))),
        ]
    });
    assert_eq!(err.to_string(), "Cannot modify readonly property Id::$id");

    let err = run_error(|b| {
        vec![
            id_class(b),
            b.expr_stmt(b.assign(b.var("r"), b.new_object(b.class_named("Id"), &[b.int(5)]))),
            b.unset(&[b.prop(b.var("r"), "id")]),
        ]
    });
    assert_eq!(err.to_string(), "Cannot unset readonly property Id::$id");
}

#[test]
fn test_readonly_property_rejects_indirect_writes() {
    let attempts: [for<'a> fn(&AstBuilder<'a>) -> StmtId<'a>; 5] = [
        |b| b.expr_stmt(b.assign_ref(b.prop(b.var("r"), "id"), b.var("x"))),
        |b| b.expr_stmt(b.assign_ref(b.var("x"), b.prop(b.var("r"), "id"))),
        |b| b.expr_stmt(b.assign(b.append(b.prop(b.var("r"), "id")), b.int(1))),
        |b| b.expr_stmt(b.pre_inc(b.prop(b.var("r"), "id"))),
        |b| b.expr_stmt(b.post_dec(b.prop(b.var("r"), "id"))),
    ];

    for attempt in attempts {
        let result = try_run(|b| {
            vec![
                id_class(b),
                b.expr_stmt(b.assign(b.var("r"), b.new_object(b.class_named("Id"), &[b.int(5)]))),
                b.expr_stmt(b.assign(b.var("x"), b.int(99))),
                attempt(b),
                b.echo(&[b.prop(b.var("r"), "id")]),
            ]
        });
        match result {
            Err(err) => assert_eq!(err.to_string(), "Cannot modify readonly property Id::$id"),
            Ok(result) => panic!("readonly property changed, printed {:?}", result.stdout),
        }
    }
}

#[test]
fn test_readonly_property_read_before_initialization() {
    let err = run_error(|b| {
        vec![
            b.class("Lazy", None, &[b.readonly_property("value")]),
            b.echo(&[b.prop(b.new_object(b.class_named("Lazy"), &[]), "value")]),
        ]
    });
    assert_eq!(
        err.to_string(),
        "Typed property Lazy::$value must not be accessed before initialization"
    );
}

#[test]
fn test_undefined_property_warns() {
    let (out, diagnostics) = run_diagnostics(|b| {
        vec![
            point_class(b),
            b.echo(&[tf(b, b.call("is_null", &[b.prop(new_point(b, 1, 2), "z")]))]),
        ]
    });
    assert_eq!(out, "T");
    assert_eq!(diagnostics, vec!["Warning: Undefined property: Point::$z"]);
}

#[test]
fn test_property_read_on_non_object_warns() {
    let (out, diagnostics) = run_diagnostics(|b| {
        vec![
            b.expr_stmt(b.assign(b.var("n"), b.int(3))),
            b.echo(&[tf(b, b.call("is_null", &[b.prop(b.var("n"), "p")]))]),
        ]
    });
    assert_eq!(out, "T");
    assert_eq!(diagnostics, vec!["Warning: Attempt to read property \"p\" on int"]);
}

#[test]
fn test_dynamic_properties_and_object_cast() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(
                b.var("o"),
                b.cast(CastKind::Object, b.array_map(&[(b.string("a"), b.int(1))])),
            )),
            b.expr_stmt(b.assign(b.prop(b.var("o"), "b"), b.int(2))),
            b.expr_stmt(b.assign(b.var("s"), b.cast(CastKind::Object, b.string("x")))),
            b.echo(&[
                b.prop(b.var("o"), "a"),
                b.prop(b.var("o"), "b"),
                b.prop(b.var("s"), "scalar"),
                tf(b, b.instance_of(b.var("o"), b.class_named("stdClass"))),
                b.call("count", &[b.cast(CastKind::Array, b.var("o"))]),
            ]),
        ]
    });
    assert_eq!(out, "12xT2");
}

#[test]
fn test_spl_object_id_is_distinct_per_object() {
    let out = run_capture(|b| {
        vec![
            b.class("Plain", None, &[]),
            b.expr_stmt(b.assign(b.var("a"), b.new_object(b.class_named("Plain"), &[]))),
            b.expr_stmt(b.assign(b.var("b"), b.new_object(b.class_named("Plain"), &[]))),
            b.echo(&[
                tf(b, b.binary(
                    b.call("spl_object_id", &[b.var("a")]),
                    BinaryOp::NotEqEq,
                    b.call("spl_object_id", &[b.var("b")]),
                )),
                tf(b, b.binary(
                    b.call("spl_object_id", &[b.var("a")]),
                    BinaryOp::EqEqEq,
                    b.call("spl_object_id", &[b.var("a")]),
                )),
            ]),
        ]
    });
    assert_eq!(out, "TT");
}

#[test]
fn test_instantiation_errors() {
    let interface = ClassModifiers {
        is_interface: true,
        ..ClassModifiers::default()
    };
    let err = run_error(|b| {
        vec![
            b.class_with("Shape", None, interface, &[]),
            b.expr_stmt(b.new_object(b.class_named("Shape"), &[])),
        ]
    });
    assert_eq!(err.to_string(), "Cannot instantiate interface Shape");

    let abstract_class = ClassModifiers {
        is_abstract: true,
        ..ClassModifiers::default()
    };
    let err = run_error(|b| {
        vec![
            b.class_with("Base", None, abstract_class, &[]),
            b.expr_stmt(b.new_object(b.class_named("Base"), &[])),
        ]
    });
    assert_eq!(err.to_string(), "Cannot instantiate abstract class Base");

    let err = run_error(|b| vec![b.expr_stmt(b.new_object(b.class_named("Missing"), &[]))]);
    assert_eq!(err.to_string(), "Class \"Missing\" not found");
}

#[test]
fn test_final_class_cannot_be_extended() {
    let final_class = ClassModifiers {
        is_final: true,
        ..ClassModifiers::default()
    };
    let err = run_error(|b| {
        vec![
            b.class_with("Sealed", None, final_class, &[]),
            b.class("Child", Some("Sealed"), &[]),
        ]
    });
    assert_eq!(err.to_string(), "Class Child cannot extend final class Sealed");
}

#[test]
fn test_method_call_errors() {
    let err = run_error(|b| {
        vec![
            point_class(b),
            b.expr_stmt(b.method_call(new_point(b, 1, 2), "nope", &[])),
        ]
    });
    assert_eq!(err.to_string(), "Call to undefined method Point::nope()");

    let err = run_error(|b| {
        let [a, b_class] = a_and_b(b);
        vec![a, b_class, b.expr_stmt(b.static_call(b.class_named("A"), "hello", &[]))]
    });
    assert_eq!(err.to_string(), "Non-static method A::hello() cannot be called statically");

    let err = run_error(|b| vec![b.expr_stmt(b.method_call(b.null(), "go", &[]))]);
    assert_eq!(err.to_string(), "Call to a member function go() on null");
}
