use std::collections::HashMap;
use std::fmt;

use crate::ast::{Node, NodeKind, NodeValue};
use crate::registry::{HostCtx, Registry};
use crate::value::Value;

/// The maximum depth of the frame stack.
pub const MAX_STACK_DEPTH: usize = 2000;

/// Error codes a running program can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorCode {
    Fatal,
    FuncNotFound,
    ArgumentError,
    ResultError,
    StackLevelTooDeep,
    UnknownInstruction,
    UnknownNativeFunction,
    NativeFunctionErr,
    ChainingToFunc,
    MissingReturnValue,
    AssignmentError,
    VarErr,
}

impl fmt::Display for RuntimeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeErrorCode::Fatal => "Fatal",
            RuntimeErrorCode::FuncNotFound => "FuncNotFound",
            RuntimeErrorCode::ArgumentError => "ArgumentError",
            RuntimeErrorCode::ResultError => "ResultError",
            RuntimeErrorCode::StackLevelTooDeep => "StackLevelTooDeep",
            RuntimeErrorCode::UnknownInstruction => "UnknownInstruction",
            RuntimeErrorCode::UnknownNativeFunction => "UnknownNativeFunction",
            RuntimeErrorCode::NativeFunctionErr => "NativeFunctionErr",
            RuntimeErrorCode::ChainingToFunc => "ChainingToFunc",
            RuntimeErrorCode::MissingReturnValue => "MissingReturnValue",
            RuntimeErrorCode::AssignmentError => "AssignmentError",
            RuntimeErrorCode::VarErr => "VarErr",
        };
        f.write_str(name)
    }
}

/// Raised when the machine encounters something it doesn't expect while
/// running a program. Host handlers also fail with this type; their errors
/// pass through to the caller verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub code: RuntimeErrorCode,
    pub message: String,
    /// The execution pointer at the failure site, when one was live.
    pub loc: Option<u64>,
}

impl RuntimeError {
    pub fn new(code: RuntimeErrorCode, message: impl Into<String>) -> Self {
        RuntimeError {
            code,
            message: message.into(),
            loc: None,
        }
    }

    pub fn at(code: RuntimeErrorCode, message: impl Into<String>, loc: u64) -> Self {
        RuntimeError {
            code,
            message: message.into(),
            loc: Some(loc),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Runtime Error: <{}> {}", self.code, self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// A single stack frame. One is pushed on every node entry and popped on
/// exit; the departing frame carries the node's return value back to the
/// caller.
#[derive(Debug)]
pub(crate) struct Frame {
    #[allow(dead_code)]
    node_id: Vec<u8>,
    ret: Option<Value>,
}

impl Frame {
    fn new(node_id: Vec<u8>) -> Self {
        Frame { node_id, ret: None }
    }
}

/// A single program evaluation: a recursive walk over the tree with a frame
/// stack, a heap for constants, and a names table pointing into the heap.
/// State never outlives the run; the machine snapshots what it wants to
/// keep afterwards.
pub(crate) struct Evaluator<'a> {
    registry: &'a Registry,
    env: HashMap<String, String>,
    /// Heap key generator. Bumped on every node entry.
    ptr: u64,
    stack: Vec<Frame>,
    heap: HashMap<u64, Value>,
    names: HashMap<String, u64>,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a Registry, env: HashMap<String, String>) -> Self {
        Evaluator {
            registry,
            env,
            ptr: 0x1000_0000,
            stack: Vec::new(),
            heap: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Walks the entry node. The walk is synchronous and runs to completion
    /// or the first error; errors unwind every frame on the way out.
    pub fn run(&mut self, entry: &Node) -> Result<(), RuntimeError> {
        self.call(entry, &Value::Unit).map(|_| ())
    }

    /// Tears the evaluator down into the pieces the machine keeps as the
    /// run's final state.
    pub fn into_state(self) -> (HashMap<String, String>, HashMap<String, u64>, HashMap<u64, Value>) {
        (self.env, self.names, self.heap)
    }

    /// Evaluates one node: pushes a frame, dispatches on kind, pops and
    /// returns the departing frame. `last` is the previous expression's
    /// value, threaded to grouped calls, chains, and the `ret()` handler.
    fn call(&mut self, node: &Node, last: &Value) -> Result<Frame, RuntimeError> {
        self.stack.push(Frame::new(node.id.clone()));

        if self.stack.len() > MAX_STACK_DEPTH {
            self.pop();
            return Err(RuntimeError::at(
                RuntimeErrorCode::StackLevelTooDeep,
                "maximum stack size exceeded",
                self.ptr,
            ));
        }

        self.ptr += 1;

        let result = self.eval(node, last);
        let frame = self.pop();

        result.map(|_| frame)
    }

    fn pop(&mut self) -> Frame {
        // One frame is pushed on every entry; the pair cannot unbalance.
        self.stack.pop().expect("frame stack underflow")
    }

    fn set_return(&mut self, value: Value) {
        if let Some(top) = self.stack.last_mut() {
            top.ret = Some(value);
        }
    }

    fn eval(&mut self, node: &Node, last: &Value) -> Result<(), RuntimeError> {
        match node.kind {
            NodeKind::Root => {
                for child in &node.children {
                    self.call(child, last)?;
                }
                Ok(())
            }
            NodeKind::Value => {
                if let Some(value) = &node.value {
                    let value = runtime_value(value);
                    self.set_return(value);
                }
                Ok(())
            }
            NodeKind::Nat => self.eval_native(node, last),
            NodeKind::Func => self.eval_func(node, last),
            NodeKind::Group => self.eval_group(node),
            NodeKind::Assign => self.eval_assign(node, last),
            NodeKind::Var => self.eval_var(node),
        }
    }

    fn eval_native(&mut self, node: &Node, last: &Value) -> Result<(), RuntimeError> {
        match node.name() {
            "_delete" => {
                if node.children.len() != 1 {
                    return Err(RuntimeError::new(
                        RuntimeErrorCode::NativeFunctionErr,
                        "Func _delete expects 1 argument",
                    ));
                }

                let frame = self.call(&node.children[0], last)?;

                // Only a string names a binding; anything else deletes
                // nothing. The heap entry stays behind, unreachable.
                if let Some(Value::Str(name)) = frame.ret {
                    self.names.remove(&name);
                }

                Ok(())
            }
            other => Err(RuntimeError::new(
                RuntimeErrorCode::UnknownNativeFunction,
                format!("no native function named {}", other),
            )),
        }
    }

    fn eval_func(&mut self, node: &Node, last: &Value) -> Result<(), RuntimeError> {
        // Make sure the function exists before doing more work.
        let registry = self.registry;
        let handler = registry.lookup(node.name())?;

        // Each child's return value becomes one positional argument.
        let mut args = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let frame = self.call(child, last)?;

            match frame.ret {
                Some(value) => args.push(value),
                None => {
                    return Err(RuntimeError::new(
                        RuntimeErrorCode::MissingReturnValue,
                        format!("no return value found for {} node", child.kind),
                    ))
                }
            }
        }

        let ctx = HostCtx::new(&self.env, last);
        let returned = handler.call(&ctx, &args)?;

        match returned {
            Some(value) => {
                self.set_return(value.clone());

                if let Some(chained) = node.chained.as_deref() {
                    let frame = self.call(chained, &value)?;

                    // The chain's return, when there is one, overrides the
                    // handler's.
                    if let Some(ret) = frame.ret {
                        self.set_return(ret);
                    }
                }

                Ok(())
            }
            None if node.chained.is_some() => Err(RuntimeError::new(
                RuntimeErrorCode::ChainingToFunc,
                format!(
                    "Attempting to chain from '{}' but there is no return value",
                    node.name()
                ),
            )),
            None => Ok(()),
        }
    }

    fn eval_group(&mut self, node: &Node) -> Result<(), RuntimeError> {
        // Each child sees the previous child's return value; the collected
        // returns feed the chain as one ordered list.
        let mut last = Value::Unit;
        let mut grouped = Vec::new();

        for child in &node.children {
            let frame = self.call(child, &last)?;

            match frame.ret {
                Some(value) => {
                    grouped.push(value.clone());
                    last = value;
                }
                None => last = Value::Unit,
            }
        }

        if let Some(chained) = node.chained.as_deref() {
            let frame = self.call(chained, &Value::List(grouped))?;

            // Groups return nothing unless the chain does.
            if let Some(ret) = frame.ret {
                self.set_return(ret);
            }
        }

        Ok(())
    }

    fn eval_assign(&mut self, node: &Node, last: &Value) -> Result<(), RuntimeError> {
        let name = node.name().to_string();
        if name.is_empty() {
            return Err(RuntimeError::new(
                RuntimeErrorCode::AssignmentError,
                "Attempting to assign to a variable without a name.",
            ));
        }
        if node.sub_type != "const" {
            return Err(RuntimeError::new(
                RuntimeErrorCode::AssignmentError,
                "Attempting to assign to a non-constant",
            ));
        }

        let chained = match node.chained.as_deref() {
            Some(chained) => chained,
            None => {
                return Err(RuntimeError::new(
                    RuntimeErrorCode::AssignmentError,
                    "Attempting to assign without something to get the value from.",
                ))
            }
        };

        if self.names.contains_key(&name) {
            return Err(RuntimeError::new(
                RuntimeErrorCode::AssignmentError,
                "Attempting to reassign a value to a constant.",
            ));
        }

        let frame = self.call(chained, last)?;

        let value = match frame.ret {
            Some(value) => value,
            None => {
                return Err(RuntimeError::new(
                    RuntimeErrorCode::AssignmentError,
                    "Attempting to assign but the expression did not return a value.",
                ))
            }
        };

        self.names.insert(name, self.ptr);
        self.heap.insert(self.ptr, value);

        Ok(())
    }

    fn eval_var(&mut self, node: &Node) -> Result<(), RuntimeError> {
        let name = node.name();
        if name.is_empty() {
            return Err(RuntimeError::new(
                RuntimeErrorCode::VarErr,
                "Attempting to fetch a named variable without a name",
            ));
        }

        let missing = || {
            RuntimeError::new(
                RuntimeErrorCode::VarErr,
                format!("no variable named '{}'", name),
            )
        };

        let ptr = self.names.get(name).ok_or_else(missing)?;
        let value = self.heap.get(ptr).ok_or_else(missing)?.clone();

        self.set_return(value);

        Ok(())
    }
}

fn runtime_value(value: &NodeValue) -> Value {
    match value {
        NodeValue::Str(s) => Value::Str(s.clone()),
        NodeValue::Flt(n) => Value::Flt(*n),
        NodeValue::Bool(b) => Value::Bool(*b),
    }
}
