use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::evaluator::{RuntimeError, RuntimeErrorCode};
use crate::value::Value;

/// The declared kind of a handler parameter (or return value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Flt,
    Bool,
    /// Accepts any runtime value, including lists and unit.
    Any,
}

impl ParamKind {
    fn name(self) -> &'static str {
        match self {
            ParamKind::Str => "str",
            ParamKind::Flt => "flt",
            ParamKind::Bool => "bool",
            ParamKind::Any => "any",
        }
    }

    /// Whether a runtime value satisfies this declared kind. There is no
    /// coercion: a `Flt` parameter admits only a `Flt` value.
    fn admits(self, value: &Value) -> bool {
        match self {
            ParamKind::Str => matches!(value, Value::Str(_)),
            ParamKind::Flt => matches!(value, Value::Flt(_)),
            ParamKind::Bool => matches!(value, Value::Bool(_)),
            ParamKind::Any => true,
        }
    }
}

/// How a handler reports back to the machine. Exactly these four shapes
/// exist; the constructors on [`Handler`] make any other shape
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// No value, no error.
    Nothing,
    /// No value; may fail.
    ErrorOnly,
    /// Always a value.
    ValueOnly,
    /// A value, or a failure.
    ValueOrError,
}

impl ReturnShape {
    pub fn returns_value(self) -> bool {
        matches!(self, ReturnShape::ValueOnly | ReturnShape::ValueOrError)
    }

    pub fn returns_error(self) -> bool {
        matches!(self, ReturnShape::ErrorOnly | ReturnShape::ValueOrError)
    }
}

/// The ambient context handed to every handler: the environment snapshot
/// the program runs against, and the value produced by the previous
/// expression in a group or chain.
pub struct HostCtx<'a> {
    env: &'a HashMap<String, String>,
    last_return: &'a Value,
}

impl<'a> HostCtx<'a> {
    pub fn new(env: &'a HashMap<String, String>, last_return: &'a Value) -> Self {
        HostCtx { env, last_return }
    }

    /// The environment variable with the given name, or empty.
    pub fn getenv(&self, name: &str) -> String {
        self.env.get(name).cloned().unwrap_or_default()
    }

    /// The previous expression's return value. `Unit` before anything has
    /// produced one.
    pub fn last_return(&self) -> &Value {
        self.last_return
    }
}

type HandlerFn =
    dyn Fn(&HostCtx<'_>, &[Value]) -> Result<Option<Value>, RuntimeError> + Send + Sync;

/// A host-provided function the machine can dispatch to.
///
/// A handler declares its positional parameter kinds and one of the four
/// [`ReturnShape`]s; the machine checks arity and argument kinds before
/// invoking and normalizes whatever comes back. Handlers may block; the
/// machine's worker is blocked for the duration of each call.
#[derive(Clone)]
pub struct Handler {
    name: String,
    params: Vec<ParamKind>,
    returns: ReturnShape,
    ret_kind: Option<ParamKind>,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// A handler that performs an effect and returns nothing.
    pub fn action<F>(params: &[ParamKind], f: F) -> Handler
    where
        F: Fn(&HostCtx<'_>, &[Value]) + Send + Sync + 'static,
    {
        Handler {
            name: String::new(),
            params: params.to_vec(),
            returns: ReturnShape::Nothing,
            ret_kind: None,
            func: Arc::new(move |ctx, args| {
                f(ctx, args);
                Ok(None)
            }),
        }
    }

    /// A handler that performs an effect and may fail.
    pub fn fallible_action<F>(params: &[ParamKind], f: F) -> Handler
    where
        F: Fn(&HostCtx<'_>, &[Value]) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        Handler {
            name: String::new(),
            params: params.to_vec(),
            returns: ReturnShape::ErrorOnly,
            ret_kind: None,
            func: Arc::new(move |ctx, args| f(ctx, args).map(|_| None)),
        }
    }

    /// A handler that always produces a value.
    pub fn query<F>(params: &[ParamKind], ret: ParamKind, f: F) -> Handler
    where
        F: Fn(&HostCtx<'_>, &[Value]) -> Value + Send + Sync + 'static,
    {
        Handler {
            name: String::new(),
            params: params.to_vec(),
            returns: ReturnShape::ValueOnly,
            ret_kind: Some(ret),
            func: Arc::new(move |ctx, args| Ok(Some(f(ctx, args)))),
        }
    }

    /// A handler that produces a value or fails.
    pub fn function<F>(params: &[ParamKind], ret: ParamKind, f: F) -> Handler
    where
        F: Fn(&HostCtx<'_>, &[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Handler {
            name: String::new(),
            params: params.to_vec(),
            returns: ReturnShape::ValueOrError,
            ret_kind: Some(ret),
            func: Arc::new(move |ctx, args| f(ctx, args).map(Some)),
        }
    }

    /// Number of positional value parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn returns(&self) -> ReturnShape {
        self.returns
    }

    /// A printable signature for documentation: `name(str flt) str;`
    pub fn syntax(&self) -> String {
        let mut out = String::new();

        out.push_str(&self.name);
        out.push('(');
        for (i, p) in self.params.iter().enumerate() {
            out.push_str(p.name());
            if i != self.params.len() - 1 {
                out.push(' ');
            }
        }
        out.push(')');

        if let Some(ret) = self.ret_kind {
            out.push(' ');
            out.push_str(ret.name());
        }

        out.push(';');

        out
    }

    /// Checks arity and argument kinds, invokes the handler, and
    /// normalizes the result to an optional value.
    pub(crate) fn call(
        &self,
        ctx: &HostCtx<'_>,
        args: &[Value],
    ) -> Result<Option<Value>, RuntimeError> {
        if args.len() != self.params.len() {
            return Err(RuntimeError::new(
                RuntimeErrorCode::ArgumentError,
                format!(
                    "Attempting to call '{}' with {} arguments. Expected {}",
                    self.name,
                    args.len(),
                    self.params.len()
                ),
            ));
        }

        for (i, (param, arg)) in self.params.iter().zip(args).enumerate() {
            if !param.admits(arg) {
                return Err(RuntimeError::new(
                    RuntimeErrorCode::ArgumentError,
                    format!(
                        "Attempting to call '{}' with a {} argument at position {}. Expected {}",
                        self.name,
                        arg.kind_name(),
                        i + 1,
                        param.name()
                    ),
                ));
            }
        }

        (self.func)(ctx, args)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish()
    }
}

/// Errors raised at registration time. These are programmer errors in the
/// embedding host, not program errors.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// The registry has been frozen; no further modification is allowed.
    Frozen,
    /// A handler with this name is already registered.
    Duplicate(String),
    /// The name belongs to the standard library and cannot be overridden.
    StdlibOverride(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Frozen => write!(f, "registry is frozen, unable to modify"),
            RegistryError::Duplicate(name) => {
                write!(f, "attempting to redefine a function with name '{}'", name)
            }
            RegistryError::StdlibOverride(name) => write!(
                f,
                "attempting to override a stdlib function is not allowed '{}'",
                name
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

/// The table of callable functions a machine resolves names against.
///
/// Hosts register handlers, then hand the registry to [`Machine::new`],
/// which takes a frozen snapshot. Later host-side mutation cannot affect a
/// running machine.
///
/// [`Machine::new`]: crate::machine::Machine::new
#[derive(Debug, Clone, Default)]
pub struct Registry {
    funcs: HashMap<String, Handler>,
    frozen: bool,
    std_injected: bool,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Adds a handler under the given name. Standard-library names cannot
    /// be taken or overridden.
    pub fn register(&mut self, name: &str, handler: Handler) -> Result<(), RegistryError> {
        if stdlib().funcs.contains_key(name) {
            return Err(RegistryError::StdlibOverride(name.to_string()));
        }

        self.add(name, handler)
    }

    fn add(&mut self, name: &str, mut handler: Handler) -> Result<(), RegistryError> {
        if self.frozen {
            return Err(RegistryError::Frozen);
        }
        if self.funcs.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        handler.name = name.to_string();
        self.funcs.insert(name.to_string(), handler);

        Ok(())
    }

    /// Resolves a name to its handler.
    pub fn lookup(&self, name: &str) -> Result<&Handler, RuntimeError> {
        self.funcs.get(name).ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorCode::FuncNotFound,
                format!("function with name '{}' not found", name),
            )
        })
    }

    /// Sorted printable signatures of every callable function, standard
    /// library included.
    pub fn functions(&self) -> Vec<String> {
        let mut out: Vec<String> = self.funcs.values().map(Handler::syntax).collect();

        if !self.std_injected {
            out.extend(stdlib().funcs.values().map(Handler::syntax));
        }

        out.sort();

        out
    }

    /// Copies the standard library into this registry. Idempotent.
    pub fn merge_stdlib(&mut self) {
        if self.std_injected {
            return;
        }

        for (name, handler) in &stdlib().funcs {
            self.funcs.insert(name.clone(), handler.clone());
        }

        self.std_injected = true;
    }

    /// Disables further modification.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// A frozen deep copy with the standard library merged, suitable for
    /// handing to a machine. Handler closures are shared, never cloned.
    pub fn snapshot(&self) -> Registry {
        let mut copy = self.clone();
        copy.merge_stdlib();
        copy.frozen = true;
        copy
    }
}

lazy_static! {
    static ref STDLIB: Registry = build_stdlib();
}

/// The process-wide standard library: constructed once, frozen forever.
pub fn stdlib() -> &'static Registry {
    &STDLIB
}

/// Whether a name belongs to the standard library.
pub fn stdlib_has(name: &str) -> bool {
    stdlib().funcs.contains_key(name)
}

fn build_stdlib() -> Registry {
    let mut funcs = HashMap::new();

    std_insert(
        &mut funcs,
        "set",
        // returns the passed in value
        Handler::query(&[ParamKind::Str], ParamKind::Str, |_, args| args[0].clone()),
    );

    std_insert(
        &mut funcs,
        "setf",
        // returns the passed in value
        Handler::query(&[ParamKind::Flt], ParamKind::Flt, |_, args| args[0].clone()),
    );

    std_insert(
        &mut funcs,
        "fatal",
        // throws a runtime error with message as the first argument
        Handler::fallible_action(&[ParamKind::Str], |_, args| {
            Err(RuntimeError::new(
                RuntimeErrorCode::Fatal,
                args[0].as_str().unwrap_or_default(),
            ))
        }),
    );

    std_insert(
        &mut funcs,
        "env",
        // returns the environment variable with the given name
        Handler::query(&[ParamKind::Str], ParamKind::Str, |ctx, args| {
            Value::Str(ctx.getenv(args[0].as_str().unwrap_or_default()))
        }),
    );

    std_insert(
        &mut funcs,
        "ret",
        // returns the previous expression's value, or a group's collected values
        Handler::query(&[], ParamKind::Any, |ctx, _| ctx.last_return().clone()),
    );

    Registry {
        funcs,
        frozen: true,
        std_injected: true,
    }
}

fn std_insert(funcs: &mut HashMap<String, Handler>, name: &str, mut handler: Handler) {
    handler.name = name.to_string();
    funcs.insert(name.to_string(), handler);
}
