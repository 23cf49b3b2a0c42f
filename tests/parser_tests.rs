// tests/parser_tests.rs

use mac_lang::ast::{Node, NodeKind, NodeValue};
use mac_lang::compile::compile_source;
use mac_lang::{CompileError, Program};

fn compile(src: &str) -> Program {
    compile_source(src).unwrap()
}

fn syntax_error(src: &str) -> mac_lang::SyntaxError {
    match compile_source(src).unwrap_err() {
        CompileError::Syntax(e) => e,
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

fn str_value(node: &Node) -> &str {
    match node.value.as_ref() {
        Some(NodeValue::Str(s)) => s,
        other => panic!("expected a str literal, got {:?}", other),
    }
}

// ============================================================================
// Function Calls
// ============================================================================

#[test]
fn test_nested_call_with_float_and_bare_value() {
    let program = compile("foo(bar(f0.9) baz);");

    let entry = &program.entry;
    assert_eq!(entry.kind, NodeKind::Root);
    assert_eq!(entry.children.len(), 1);

    let foo = &entry.children[0];
    assert_eq!(foo.kind, NodeKind::Func);
    assert_eq!(str_value(foo), "foo");
    assert_eq!(foo.children.len(), 2);

    let bar = &foo.children[0];
    assert_eq!(bar.kind, NodeKind::Func);
    assert_eq!(str_value(bar), "bar");
    assert_eq!(bar.children.len(), 1);
    assert_eq!(bar.children[0].kind, NodeKind::Value);
    assert_eq!(bar.children[0].value, Some(NodeValue::Flt(0.9)));

    let baz = &foo.children[1];
    assert_eq!(baz.kind, NodeKind::Value);
    assert_eq!(baz.value, Some(NodeValue::Str("baz".to_string())));

    assert_eq!(program.func_calls.get("foo"), Some(&1));
    assert_eq!(program.func_calls.get("bar"), Some(&1));
}

#[test]
fn test_call_between_bare_values() {
    let program = compile("one(two three(four) five);");

    let one = &program.entry.children[0];
    assert_eq!(one.children.len(), 3);
    assert_eq!(one.children[0].value, Some(NodeValue::Str("two".to_string())));
    assert_eq!(one.children[1].kind, NodeKind::Func);
    assert_eq!(str_value(&one.children[1]), "three");
    assert_eq!(one.children[2].value, Some(NodeValue::Str("five".to_string())));
}

#[test]
fn test_deeply_nested_calls_without_terminator() {
    // The final line needs no `;` -- only a following line enforces it.
    let program = compile("one(two three(four() five six(seven)))");

    let one = &program.entry.children[0];
    assert_eq!(str_value(one), "one");

    let three = &one.children[1];
    assert_eq!(three.children.len(), 3);
    assert_eq!(three.children[0].kind, NodeKind::Func);
    assert_eq!(str_value(&three.children[0]), "four");
    assert!(three.children[0].children.is_empty());

    let six = &three.children[2];
    assert_eq!(str_value(six), "six");
    assert_eq!(six.children.len(), 1);
}

#[test]
fn test_boolean_literals() {
    let program = compile("enable(autoscale web true);");

    let enable = &program.entry.children[0];
    assert_eq!(enable.children[2].value, Some(NodeValue::Bool(true)));

    let program = compile("enable(autoscale web false);");
    let enable = &program.entry.children[0];
    assert_eq!(enable.children[2].value, Some(NodeValue::Bool(false)));
}

#[test]
fn test_call_census_counts_sites() {
    let program = compile("ping(a);\nping(b);\npong(ping(c));");

    assert_eq!(program.func_calls.get("ping"), Some(&3));
    assert_eq!(program.func_calls.get("pong"), Some(&1));
}

// ============================================================================
// Float Literals
// ============================================================================

#[test]
fn test_float_literal_rule() {
    let program = compile("setf(f10.25);");

    let setf = &program.entry.children[0];
    assert_eq!(setf.children[0].value, Some(NodeValue::Flt(10.25)));
}

#[test]
fn test_float_requires_f_prefix() {
    let err = syntax_error("set(x.9);");

    assert!(err.message.contains("Unable to determine the value"));
}

#[test]
fn test_float_rejects_bad_digits() {
    let err = syntax_error("setf(f1.2x3);");

    assert!(err.message.contains("Invalid float value"));
}

// ============================================================================
// Groups, Pipes, Chains
// ============================================================================

#[test]
fn test_group_with_pipe_and_chain() {
    let program = compile("(alert(response-time GTE 600)|recover(LT 500)).page();");

    let group = &program.entry.children[0];
    assert_eq!(group.kind, NodeKind::Group);
    assert_eq!(group.children.len(), 2);

    assert_eq!(str_value(&group.children[0]), "alert");
    assert_eq!(group.children[0].children.len(), 3);
    assert_eq!(str_value(&group.children[1]), "recover");

    let page = group.chained.as_deref().unwrap();
    assert_eq!(page.kind, NodeKind::Func);
    assert_eq!(str_value(page), "page");
    assert!(page.children.is_empty());

    assert_eq!(program.func_calls.get("alert"), Some(&1));
    assert_eq!(program.func_calls.get("recover"), Some(&1));
    assert_eq!(program.func_calls.get("page"), Some(&1));
}

#[test]
fn test_chain_from_func() {
    let program = compile("alert(cpu GTE 90).page();");

    let alert = &program.entry.children[0];
    assert_eq!(alert.kind, NodeKind::Func);

    let page = alert.chained.as_deref().unwrap();
    assert_eq!(str_value(page), "page");
    assert!(page.chained.is_none());
}

#[test]
fn test_chain_requires_a_call_shape() {
    let err = syntax_error("alert(cpu).page;");

    assert!(err
        .message
        .contains("The next call doesn't appear to be a function or group"));
}

#[test]
fn test_chain_needs_something_to_chain_from() {
    let err = syntax_error(".page();");

    assert!(err.message.contains("no children to chain from"));
}

#[test]
fn test_pipe_outside_group() {
    let err = syntax_error("alert(cpu)|recover(LT 500);");

    assert!(err.message.contains("You can't pipe outside of a group"));
}

#[test]
fn test_pipe_must_lead_into_a_call() {
    let err = syntax_error("(alert(cpu)|500);");

    assert!(err
        .message
        .contains("The next call doesn't appear to be a function"));
}

// ============================================================================
// Assignment
// ============================================================================

#[test]
fn test_const_assignment_structure() {
    let program = compile("const region = env(AWS_REGION);");

    let assign = &program.entry.children[0];
    assert_eq!(assign.kind, NodeKind::Assign);
    assert_eq!(assign.sub_type, "const");
    assert_eq!(str_value(assign), "region");
    assert!(assign.children.is_empty());

    let rhs = assign.chained.as_deref().unwrap();
    assert_eq!(rhs.kind, NodeKind::Func);
    assert_eq!(str_value(rhs), "env");
}

#[test]
fn test_assignment_requires_const_keyword() {
    let err = syntax_error("let region = env(AWS_REGION);");

    assert!(err.message.contains("not a valid type"));
}

#[test]
fn test_assignment_requires_leading_tokens() {
    let err = syntax_error("= env(AWS_REGION);");

    assert!(err
        .message
        .contains("Expected a value and definition before"));
}

#[test]
fn test_assignment_requires_rhs() {
    let err = syntax_error("const region =");

    assert!(err.message.contains("Nothing to assign"));
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_var_inside_call() {
    let program = compile("slack(ops $region);");

    let slack = &program.entry.children[0];
    assert_eq!(slack.children.len(), 2);
    assert_eq!(slack.children[1].kind, NodeKind::Var);
    assert_eq!(str_value(&slack.children[1]), "region");
}

#[test]
fn test_var_outside_call() {
    let err = syntax_error("$region;");

    assert!(err
        .message
        .contains("Attempting to use a variable outside a function call"));
}

// ============================================================================
// Native Calls
// ============================================================================

#[test]
fn test_delete_parses_as_native() {
    let program = compile("_delete(region);");

    let delete = &program.entry.children[0];
    assert_eq!(delete.kind, NodeKind::Nat);
    assert_eq!(str_value(delete), "_delete");
    assert_eq!(delete.children.len(), 1);

    // Native calls never enter the census.
    assert!(program.func_calls.is_empty());
}

#[test]
fn test_nested_call_inside_delete_is_rejected() {
    let err = syntax_error("_delete(env(name));");

    assert!(err.message.contains("not in a valid context"));
}

#[test]
fn test_var_inside_delete_is_rejected() {
    let err = syntax_error("_delete($region);");

    assert!(err
        .message
        .contains("Attempting to use a variable outside a function call"));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_syntax_error_format() {
    let err = syntax_error("alert(cpu)|recover(LT 500);");

    let rendered = err.to_string();
    assert!(rendered.starts_with("Syntax Error (Ln 1, Col 11, <ROOT>):"));
}

#[test]
fn test_close_outside_any_expression() {
    let err = syntax_error(");");

    assert!(err.message.contains("can't be closed"));
}
