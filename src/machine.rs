use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use log::debug;

use crate::ast::Program;
use crate::compile::compile_source;
use crate::evaluator::{Evaluator, RuntimeError, RuntimeErrorCode};
use crate::registry::Registry;
use crate::value::Value;
use crate::Error;

/// A virtual machine instance.
///
/// Each machine owns one worker thread serving programs from a queue:
/// callers block until the worker finishes their program, so all executions
/// against the same machine are serialized and no two tree walks ever share
/// state. Independent machines are fully independent.
///
/// # Examples
///
/// ```
/// use mac_lang::{compile_source, Machine, Registry};
///
/// let registry = Registry::new();
///
/// let machine = Machine::new(&registry);
/// machine.setenv("app-id", "payments");
///
/// let program = compile_source("const app = env(app-id);").unwrap();
/// machine.execute(&program).unwrap();
///
/// machine.shutdown();
/// ```
pub struct Machine {
    shared: Arc<Shared>,
    sender: mpsc::Sender<Job>,
    worker: Option<thread::JoinHandle<()>>,
}

struct Shared {
    /// Frozen snapshot taken at construction; name resolution is stable for
    /// the machine's lifetime.
    registry: Registry,
    state: RwLock<MachineInner>,
}

struct MachineInner {
    env: HashMap<String, String>,
    count: u64,
    last_state: Option<MachineState>,
}

enum Job {
    Run(Program, mpsc::Sender<Result<(), RuntimeError>>),
    Shutdown,
}

/// The final evaluator state of a machine's most recent run: the
/// environment snapshot the program saw, and the constants it left bound.
#[derive(Debug, Clone)]
pub struct MachineState {
    env: HashMap<String, String>,
    names: HashMap<String, u64>,
    heap: HashMap<u64, Value>,
}

impl MachineState {
    /// The environment variable with the given name, or empty.
    pub fn getenv(&self, name: &str) -> String {
        self.env.get(name).cloned().unwrap_or_default()
    }

    /// The value a constant was left bound to, if the name survived the run.
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.names.get(name).and_then(|ptr| self.heap.get(ptr))
    }
}

impl Machine {
    /// Builds a machine around a frozen snapshot of the given registry
    /// (standard library included) and starts its worker.
    pub fn new(registry: &Registry) -> Machine {
        let shared = Arc::new(Shared {
            registry: registry.snapshot(),
            state: RwLock::new(MachineInner {
                env: HashMap::new(),
                count: 0,
                last_state: None,
            }),
        });

        let worker_shared = Arc::clone(&shared);
        let (sender, receiver) = mpsc::channel();

        // The evaluator recurses once per frame; size the worker for a
        // walk that reaches the full frame bound.
        let worker = thread::Builder::new()
            .name("machine-worker".to_string())
            .stack_size(8 * 1024 * 1024)
            .spawn(move || worker_loop(worker_shared, receiver))
            .expect("failed to spawn machine worker");

        Machine {
            shared,
            sender,
            worker: Some(worker),
        }
    }

    /// Sets an environment variable. Programs already in flight keep the
    /// snapshot they started with.
    pub fn setenv(&self, name: impl Into<String>, value: impl Into<String>) {
        self.shared.write().env.insert(name.into(), value.into());
    }

    /// Returns the environment variable, or empty.
    pub fn getenv(&self, name: &str) -> String {
        self.shared.read().env.get(name).cloned().unwrap_or_default()
    }

    /// Runs the program on this machine's worker and blocks until it
    /// finishes.
    ///
    /// Every function name the program calls is resolved against the
    /// registry first; an unknown name fails here, before any handler or
    /// binding side effect can run.
    pub fn execute(&self, program: &Program) -> Result<(), RuntimeError> {
        for name in program.func_calls.keys() {
            self.shared.registry.lookup(name)?;
        }

        let (done, outcome) = mpsc::channel();

        self.sender
            .send(Job::Run(program.clone(), done))
            .map_err(|_| {
                RuntimeError::new(RuntimeErrorCode::Fatal, "machine is not accepting programs")
            })?;

        match outcome.recv() {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::new(
                RuntimeErrorCode::Fatal,
                "machine stopped before the program finished",
            )),
        }
    }

    /// The final state of the most recent run, if any run has completed.
    pub fn state(&self) -> Option<MachineState> {
        self.shared.read().last_state.clone()
    }

    /// How many programs this machine has executed, failures included.
    pub fn executions(&self) -> u64 {
        self.shared.read().count
    }

    /// Stops the worker. Programs submitted afterwards fail; the call
    /// itself is idempotent.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Job::Shutdown);
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.shutdown();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, MachineInner> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MachineInner> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn worker_loop(shared: Arc<Shared>, receiver: mpsc::Receiver<Job>) {
    for job in receiver {
        match job {
            Job::Run(program, done) => {
                let result = execute(&shared, &program);
                let _ = done.send(result);
            }
            Job::Shutdown => break,
        }
    }
}

fn execute(shared: &Shared, program: &Program) -> Result<(), RuntimeError> {
    // Reset the last state and snapshot the environment under the lock;
    // host-side mutation during the run cannot reach this program.
    let env = {
        let mut inner = shared.write();
        inner.last_state = None;
        inner.env.clone()
    };

    debug!("executing program with {} call sites", program.func_calls.len());

    let mut evaluator = Evaluator::new(&shared.registry, env);
    let result = evaluator.run(&program.entry);

    // Even a failed run counts as executed and leaves its state behind.
    let (env, names, heap) = evaluator.into_state();
    let mut inner = shared.write();
    inner.count += 1;
    inner.last_state = Some(MachineState { env, names, heap });

    result
}

/// Compiles the source and runs it on a throwaway machine built from the
/// given registry.
pub fn run(registry: &Registry, src: &str) -> Result<(), Error> {
    let program = compile_source(src)?;

    let machine = Machine::new(registry);
    let result = machine.execute(&program);
    machine.shutdown();

    result.map_err(Error::from)
}
