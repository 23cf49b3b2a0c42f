// tests/integration_tests.rs
//
// End-to-end flows: compile -> canonicalize -> recompile, compile -> IR ->
// machine, and the host-facing surfaces wired together.

use mac_lang::compile::compile_source;
use mac_lang::machine::{run, Machine};
use mac_lang::registry::{Handler, ParamKind, Registry};
use mac_lang::{CompileError, Error, Program, Value};

// ============================================================================
// Source Round Trip
// ============================================================================

#[test]
fn test_recompiling_canonical_source_is_structurally_equal() {
    let sources = [
        "foo(bar(f0.9) baz);",
        "one(two three(four) five);",
        "(alert(response-time GTE 600)|recover(LT 500)).page();",
        "const app = env(app-id);\nslack(ops $app);",
        "; leading comment\n\tpage( now );\n\n_delete(app);",
        "enable(autoscale web true);\nsetf(f10.25);",
    ];

    for src in sources {
        let first = compile_source(src).unwrap();
        let second = compile_source(&first.source).unwrap();

        assert!(
            first.structurally_equal(&second),
            "round trip changed the tree for: {}",
            src
        );
        // Canonical source is a fixed point.
        assert_eq!(first.source, second.source, "for source: {}", src);
    }
}

// ============================================================================
// IR Round Trip Into A Machine
// ============================================================================

#[test]
fn test_serialized_program_executes() {
    let mut registry = Registry::new();
    registry
        .register(
            "record",
            Handler::query(&[ParamKind::Str], ParamKind::Str, |_, args| args[0].clone()),
        )
        .unwrap();

    let program = compile_source("const a = record(persisted);").unwrap();
    let bytes = program.to_bytes().unwrap();

    // A different process would only hold the bytes.
    let restored = Program::from_bytes(&bytes).unwrap();

    let machine = Machine::new(&registry);
    machine.execute(&restored).unwrap();

    let state = machine.state().unwrap();
    assert_eq!(
        state.constant("a"),
        Some(&Value::Str("persisted".to_string()))
    );
}

#[test]
fn test_decoded_program_still_resolves_names_first() {
    let program = compile_source("ghost();").unwrap();
    let restored = Program::from_bytes(&program.to_bytes().unwrap()).unwrap();

    let machine = Machine::new(&Registry::new());
    let err = machine.execute(&restored).unwrap_err();

    assert_eq!(err.code, mac_lang::RuntimeErrorCode::FuncNotFound);
}

// ============================================================================
// Host Surface
// ============================================================================

#[test]
fn test_run_shorthand() {
    let mut registry = Registry::new();
    registry
        .register("page", Handler::action(&[], |_, _| {}))
        .unwrap();

    run(&registry, "page();").unwrap();
}

#[test]
fn test_run_surfaces_compile_errors() {
    let err = run(&Registry::new(), "page()\nwarn();").unwrap_err();

    match err {
        Error::Compile(CompileError::Source(e)) => {
            assert_eq!(e.line, 1);
        }
        other => panic!("expected a source error, got {:?}", other),
    }
}

#[test]
fn test_machines_are_independent() {
    let registry = Registry::new();

    let a = Machine::new(&registry);
    let b = Machine::new(&registry);

    a.setenv("who", "first");
    b.setenv("who", "second");

    let program = compile_source("const who = env(who);").unwrap();

    a.execute(&program).unwrap();
    b.execute(&program).unwrap();

    assert_eq!(
        a.state().unwrap().constant("who"),
        Some(&Value::Str("first".to_string()))
    );
    assert_eq!(
        b.state().unwrap().constant("who"),
        Some(&Value::Str("second".to_string()))
    );
}

#[test]
fn test_function_listing_documents_the_registry() {
    let mut registry = Registry::new();
    registry
        .register(
            "scale-up",
            Handler::fallible_action(
                &[ParamKind::Str, ParamKind::Str, ParamKind::Str, ParamKind::Flt],
                |_, _| Ok(()),
            ),
        )
        .unwrap();

    let functions = registry.functions();

    assert!(functions.contains(&"scale-up(str str str flt);".to_string()));
    assert!(functions.contains(&"env(str) str;".to_string()));
    assert!(functions.contains(&"fatal(str);".to_string()));

    // The listing is sorted for stable documentation output.
    let mut sorted = functions.clone();
    sorted.sort();
    assert_eq!(functions, sorted);
}

#[test]
fn test_registration_after_machine_construction_is_invisible() {
    let mut registry = Registry::new();

    let machine = Machine::new(&registry);

    registry
        .register("late", Handler::action(&[], |_, _| {}))
        .unwrap();

    let program = compile_source("late();").unwrap();
    let err = machine.execute(&program).unwrap_err();

    assert_eq!(err.code, mac_lang::RuntimeErrorCode::FuncNotFound);
}
