use std::collections::BTreeMap;

use super::CliError;
use crate::compile::compile_source;
use crate::machine::Machine;
use crate::registry::Registry;

/// What `mac check` learned about a compiled program.
#[derive(Debug)]
pub struct CheckReport {
    /// Canonicalized source, regenerated from the token stream.
    pub source: String,
    /// Number of top-level statements.
    pub statements: usize,
    /// Call-site count per referenced function name.
    pub func_calls: BTreeMap<String, u64>,
}

/// Compiles the source and reports its shape without executing anything.
pub fn check_source(src: &str) -> Result<CheckReport, CliError> {
    let program = compile_source(src)?;

    Ok(CheckReport {
        source: program.source,
        statements: program.entry.children.len(),
        func_calls: program.func_calls,
    })
}

/// Compiles and executes the source on a throwaway machine.
///
/// The machine carries only the standard library; programs calling
/// host-registered functions belong inside an embedding host, not the CLI.
pub fn run_source(src: &str, env: &[(String, String)]) -> Result<(), CliError> {
    let program = compile_source(src)?;

    let registry = Registry::new();
    let machine = Machine::new(&registry);

    for (name, value) in env {
        machine.setenv(name.clone(), value.clone());
    }

    let result = machine.execute(&program);
    machine.shutdown();

    Ok(result?)
}

/// Compiles the source and returns its portable IR bytes.
pub fn emit_ir(src: &str) -> Result<Vec<u8>, CliError> {
    let program = compile_source(src)?;

    Ok(program.to_bytes()?)
}
