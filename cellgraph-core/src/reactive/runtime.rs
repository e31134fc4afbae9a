//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects modules, cells and
//! observers. It owns the dependency graph and the generation clock, and it
//! drives a recompute pass after every structural change.
//!
//! # How It Works
//!
//! 1. `define`/`redefine`/`remove` update the graph and hand the affected
//!    cells to [`Runtime::recompute`].
//!
//! 2. The pass visits every downstream cell once, dependencies first. Each
//!    visit stamps the cell with a fresh generation, marks it pending and
//!    invokes its body with the current values of its dependencies.
//!
//! 3. Immediate results commit during the pass. Futures, generators and
//!    streams are driven by Tokio tasks; each of their commits starts a new
//!    pass over the committing cell's dependents.
//!
//! 4. A commit is applied only when its generation is still the cell's
//!    current one. Anything else is stale and silently dropped.
//!
//! # Threading
//!
//! All graph state sits behind a single mutex that is never held while a
//! body or an observer runs. Asynchronous outputs need an ambient Tokio
//! runtime; the current-thread flavour keeps every cell on one execution
//! context.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::cell::Cell;
use super::module::Module;
use super::observer::Observer;
use super::output::{Args, Body, CellOutput, Generator};
use super::value::{Generation, GenerationClock, Value};
use crate::config::RuntimeConfig;
use crate::error::CellError;
use crate::graph::{CellId, ModuleId, Step, UpdateScheduler};

/// Where a commit comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Inside a recompute pass; the pass itself visits the dependents.
    Pass,
    /// From a background task; the commit starts its own pass.
    Background,
}

pub(crate) struct RuntimeInner {
    scheduler: Mutex<UpdateScheduler>,
    clock: GenerationClock,
    builtins: Mutex<Option<ModuleId>>,
    config: RuntimeConfig,
}

/// Owner of the modules and the generation clock of one notebook session.
///
/// Cloning is cheap and yields another handle to the same session.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                scheduler: Mutex::new(UpdateScheduler::new()),
                clock: GenerationClock::new(),
                builtins: Mutex::new(None),
                config,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Create an empty module. It falls back to the builtins registered at
    /// this moment, if any.
    pub fn new_module(&self) -> Module {
        let builtins = *self.inner.builtins.lock();
        let id = self.inner.scheduler.lock().add_module(builtins);
        debug!(module = id.raw(), builtins = ?builtins.map(|b| b.raw()), "new module");
        Module::new(self.clone(), id)
    }

    /// Install `module` as the fallback for every module created afterwards.
    ///
    /// Modules created earlier keep their fallback.
    pub fn register_builtins(&self, module: &Module) {
        if !module.runtime().same_as(self) {
            warn!(module = module.id().raw(), "ignoring builtins from another runtime");
            return;
        }
        *self.inner.builtins.lock() = Some(module.id());
        debug!(module = module.id().raw(), "registered builtins");
    }

    /// The currently registered builtins module.
    pub fn builtins(&self) -> Option<Module> {
        let id = (*self.inner.builtins.lock())?;
        Some(Module::new(self.clone(), id))
    }

    pub fn module_count(&self) -> usize {
        self.inner.scheduler.lock().module_count()
    }

    /// Whether both handles refer to the same session.
    pub fn same_as(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn with_scheduler<R>(&self, f: impl FnOnce(&mut UpdateScheduler) -> R) -> R {
        f(&mut self.inner.scheduler.lock())
    }

    fn downgrade(&self) -> Weak<RuntimeInner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<RuntimeInner>) -> Option<Runtime> {
        weak.upgrade().map(|inner| Runtime { inner })
    }

    /// Recompute `roots` and everything downstream of them, each cell once,
    /// dependencies first.
    pub(crate) fn recompute(&self, roots: Vec<CellId>) {
        if roots.is_empty() {
            return;
        }
        let order = self.inner.scheduler.lock().schedule(roots);
        debug!(cells = order.len(), "recompute pass");
        for id in order {
            self.evaluate(id);
        }
    }

    /// Wake a lazy or dormant cell and compute it.
    pub(crate) fn activate(&self, id: CellId) {
        if self.wake(id) {
            self.evaluate(id);
        }
    }

    /// Mark a cell active. Returns `false` if it already was, or is gone.
    fn wake(&self, id: CellId) -> bool {
        let woke = self.with_scheduler(|scheduler| match scheduler.get_node_mut(id) {
            Some(node) if !node.is_active() => {
                node.activate();
                true
            }
            _ => false,
        });
        if woke {
            debug!(cell = id.raw(), "activated");
        }
        woke
    }

    fn evaluate(&self, id: CellId) {
        // Sleeping inputs are pushed on top of the cell that needs them, woken
        // when they reach the top and computed first; the cell is then looked
        // at again. An input already woken by another path is skipped.
        let mut stack = vec![(id, false)];
        while let Some((current, needs_wake)) = stack.last_mut() {
            let current = *current;
            if std::mem::take(needs_wake) && !self.wake(current) {
                stack.pop();
                continue;
            }
            let step = self.inner.scheduler.lock().begin(current, &self.inner.clock);
            match step {
                Step::Activate(inputs) => {
                    stack.extend(inputs.into_iter().rev().map(|input| (input, true)));
                    continue;
                }
                Step::Skip => {}
                Step::Wait { observers } => {
                    trace!(cell = current.raw(), "waiting on a pending input");
                    notify_pending(&observers);
                }
                Step::Missing {
                    generation,
                    name,
                    observers,
                } => {
                    notify_pending(&observers);
                    self.commit(current, generation, Err(CellError::missing(name)), Origin::Pass);
                }
                Step::Run {
                    generation,
                    body,
                    args,
                    observers,
                } => {
                    notify_pending(&observers);
                    self.run(current, generation, &body, &args);
                }
            }
            stack.pop();
        }
    }

    fn run(&self, id: CellId, generation: Generation, body: &Body, args: &Args) {
        let output = guarded(|| body.call(args));
        trace!(
            cell = id.raw(),
            generation = generation.raw(),
            kind = output.as_ref().map(CellOutput::kind).unwrap_or("thrown"),
            "body returned"
        );

        match output {
            Ok(CellOutput::Immediate(value)) => {
                self.commit(id, generation, Ok(value), Origin::Pass);
            }
            Ok(CellOutput::Deferred(future)) => {
                let weak = self.downgrade();
                self.spawn_or_reject(id, generation, async move {
                    let outcome = future.await;
                    if let Some(runtime) = Runtime::upgrade(&weak) {
                        runtime.commit(id, generation, outcome, Origin::Background);
                    }
                });
            }
            Ok(CellOutput::Generator(mut generator)) => {
                match guarded(|| generator.next().transpose()) {
                    Ok(Some(value)) => {
                        if self.commit(id, generation, Ok(value), Origin::Pass) {
                            self.pull_in_background(id, generation, generator);
                        }
                    }
                    Ok(None) => {
                        self.commit(id, generation, Ok(Value::Null), Origin::Pass);
                    }
                    Err(error) => {
                        self.commit(id, generation, Err(error), Origin::Pass);
                    }
                }
            }
            Ok(CellOutput::Stream(mut stream)) => {
                let weak = self.downgrade();
                let Some(mut stamps) = self.watch_generation(id) else {
                    return;
                };
                self.spawn_or_reject(id, generation, async move {
                    loop {
                        let next = tokio::select! {
                            biased;
                            _ = superseded(&mut stamps, generation) => {
                                trace!(cell = id.raw(), generation = generation.raw(), "stream superseded");
                                break;
                            }
                            next = stream.next() => next,
                        };
                        let Some(outcome) = next else {
                            break;
                        };
                        let Some(runtime) = Runtime::upgrade(&weak) else {
                            break;
                        };
                        let failed = outcome.is_err();
                        if !runtime.commit(id, generation, outcome, Origin::Background) || failed {
                            break;
                        }
                    }
                });
            }
            Err(error) => {
                self.commit(id, generation, Err(error), Origin::Pass);
            }
        }
    }

    /// Keep pulling a generator until it ends, fails, or is superseded.
    fn pull_in_background(&self, id: CellId, generation: Generation, mut generator: Generator) {
        let weak = self.downgrade();
        let interval = self.inner.config.generator_interval();
        let Some(mut stamps) = self.watch_generation(id) else {
            return;
        };
        let task = async move {
            loop {
                let pause = async {
                    match interval {
                        Some(interval) => tokio::time::sleep(interval).await,
                        None => tokio::task::yield_now().await,
                    }
                };
                tokio::select! {
                    biased;
                    _ = superseded(&mut stamps, generation) => {
                        trace!(cell = id.raw(), generation = generation.raw(), "generator superseded");
                        break;
                    }
                    _ = pause => {}
                }
                let Some(runtime) = Runtime::upgrade(&weak) else {
                    break;
                };
                if !runtime.is_current(id, generation) {
                    break;
                }
                let outcome = match guarded(|| generator.next().transpose()) {
                    Ok(Some(value)) => Ok(value),
                    Ok(None) => break,
                    Err(error) => Err(error),
                };
                let failed = outcome.is_err();
                if !runtime.commit(id, generation, outcome, Origin::Background) || failed {
                    break;
                }
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => {
                warn!(cell = id.raw(), "no tokio runtime; generator stops after its first value");
            }
        }
    }

    fn watch_generation(&self, id: CellId) -> Option<watch::Receiver<Generation>> {
        self.inner
            .scheduler
            .lock()
            .get_node(id)
            .map(|node| node.watch_generation())
    }

    fn spawn_or_reject<F>(&self, id: CellId, generation: Generation, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => {
                warn!(cell = id.raw(), "no tokio runtime to drive an asynchronous cell");
                self.commit(
                    id,
                    generation,
                    Err(CellError::rejection("no async executor available")),
                    Origin::Pass,
                );
            }
        }
    }

    fn is_current(&self, id: CellId, generation: Generation) -> bool {
        self.inner
            .scheduler
            .lock()
            .get_node(id)
            .is_some_and(|node| node.value().is_current(generation))
    }

    /// Apply a generation-stamped outcome.
    ///
    /// Returns `false` when the cell is gone or the stamp is stale, in which
    /// case nothing changes and nobody is notified.
    pub(crate) fn commit(
        &self,
        id: CellId,
        generation: Generation,
        outcome: Result<Value, CellError>,
        origin: Origin,
    ) -> bool {
        let applied = self.with_scheduler(|scheduler| {
            let node = scheduler.get_node_mut(id)?;
            if !node.value_mut().settle(generation, outcome.clone()) {
                return None;
            }
            let mut dependents: Vec<CellId> = node.dependents().iter().copied().collect();
            dependents.sort_unstable();
            Some((node.observers(), dependents))
        });

        let Some((observers, dependents)) = applied else {
            trace!(cell = id.raw(), generation = generation.raw(), "dropping stale result");
            return false;
        };
        trace!(
            cell = id.raw(),
            generation = generation.raw(),
            fulfilled = outcome.is_ok(),
            "commit"
        );

        let cell = Cell::new(self.clone(), id);
        notify_settled(&cell, &observers, &outcome);

        if origin == Origin::Background {
            self.recompute(dependents);
        }
        true
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheduler = self.inner.scheduler.lock();
        f.debug_struct("Runtime")
            .field("modules", &scheduler.module_count())
            .field("cells", &scheduler.node_count())
            .field("generation", &self.inner.clock.current().raw())
            .finish()
    }
}

pub(crate) fn notify_pending(observers: &[Arc<dyn Observer>]) {
    for observer in observers {
        observer.pending();
    }
}

pub(crate) fn notify_settled(
    cell: &Cell,
    observers: &[Arc<dyn Observer>],
    outcome: &Result<Value, CellError>,
) {
    for observer in observers {
        match outcome {
            Ok(value) => observer.fulfilled(cell, value),
            Err(error) => observer.rejected(cell, error),
        }
    }
}

/// Resolves once the cell moves past `generation` or is removed.
async fn superseded(stamps: &mut watch::Receiver<Generation>, generation: Generation) {
    let open = stamps.wait_for(|current| *current != generation).await.is_ok();
    if !open {
        trace!(generation = generation.raw(), "cell removed");
    }
}

/// Run user code, turning a panic into a thrown error.
fn guarded<T>(f: impl FnOnce() -> Result<T, CellError>) -> Result<T, CellError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "cell body panicked".to_string());
        Err(CellError::thrown(message))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Policy;
    use serde_json::json;

    #[test]
    fn modules_get_registered_builtins() {
        let runtime = Runtime::new();
        let early = runtime.new_module();
        let builtins = runtime.new_module();
        runtime.register_builtins(&builtins);
        let late = runtime.new_module();

        assert_eq!(early.builtins(), None);
        assert_eq!(late.builtins(), Some(builtins.clone()));
        assert_eq!(runtime.builtins(), Some(builtins));
        assert_eq!(runtime.module_count(), 3);
    }

    #[test]
    fn foreign_builtins_are_ignored() {
        let runtime = Runtime::new();
        let other = Runtime::new();
        runtime.register_builtins(&other.new_module());
        assert_eq!(runtime.builtins(), None);
    }

    #[test]
    fn runtimes_are_independent() {
        let first = Runtime::new();
        let second = Runtime::new();
        first.new_module().cell("a", Policy::Eager).define_constant(json!(1)).unwrap();
        assert_eq!(second.module_count(), 0);
        assert!(!first.same_as(&second));
        assert!(first.same_as(&first.clone()));
    }

    #[test]
    fn stale_commit_changes_nothing() {
        let runtime = Runtime::new();
        let cell = runtime.new_module().cell("a", Policy::Eager);
        cell.define_constant(json!(1)).unwrap();
        let current = cell.generation().unwrap();

        let stale = Generation::default();
        assert_ne!(stale, current);
        assert!(!runtime.commit(cell.id(), stale, Ok(json!(2)), Origin::Pass));
        assert_eq!(cell.value(), Some(json!(1)));
    }

    #[test]
    fn panicking_body_is_contained() {
        let runtime = Runtime::new();
        let module = runtime.new_module();
        let boom = module.cell("boom", Policy::Eager);
        boom.define(Vec::<String>::new(), |_| panic!("kaboom")).unwrap();
        let sibling = module.cell("sibling", Policy::Eager);
        sibling.define_constant(json!("fine")).unwrap();

        assert_eq!(boom.error(), Some(CellError::thrown("kaboom")));
        assert_eq!(sibling.value(), Some(json!("fine")));
    }

    #[test]
    fn deferred_without_executor_is_rejected() {
        let runtime = Runtime::new();
        let cell = runtime.new_module().cell("later", Policy::Eager);
        cell.define(Vec::<String>::new(), |_| {
            Ok(CellOutput::deferred(async { Ok(json!(1)) }))
        })
        .unwrap();

        assert!(matches!(cell.error(), Some(CellError::AsyncRejection { .. })));
    }

    #[test]
    fn generator_without_executor_keeps_first_value() {
        let runtime = Runtime::new();
        let cell = runtime.new_module().cell("ticks", Policy::Eager);
        cell.define(Vec::<String>::new(), |_| {
            Ok(CellOutput::values(vec![json!(1), json!(2)]))
        })
        .unwrap();

        assert_eq!(cell.value(), Some(json!(1)));
    }

    #[test]
    fn long_lazy_chain_wakes_without_recursion() {
        let runtime = Runtime::new();
        let module = runtime.new_module();
        let depth = 20_000;

        module.cell("l0", Policy::Lazy).define_constant(json!(0)).unwrap();
        for i in 1..depth {
            let previous = format!("l{}", i - 1);
            module
                .cell(&format!("l{i}"), Policy::Lazy)
                .define([previous], |args| Ok(CellOutput::value(args.i64(0)? + 1)))
                .unwrap();
        }
        assert_eq!(module.lookup("l0").and_then(|cell| cell.value()), None);

        let end = module.cell("end", Policy::Eager);
        end.define([format!("l{}", depth - 1)], |args| Ok(args.get(0)?.clone().into()))
            .unwrap();
        assert_eq!(end.value(), Some(json!(depth - 1)));
    }

    #[test]
    fn shared_lazy_input_runs_once() {
        let runtime = Runtime::new();
        let module = runtime.new_module();
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counted = runs.clone();

        module
            .cell("base", Policy::Lazy)
            .define(Vec::<String>::new(), move |_| {
                counted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(json!(1).into())
            })
            .unwrap();
        module
            .cell("middle", Policy::Lazy)
            .define(["base"], |args| Ok(CellOutput::value(args.i64(0)? + 1)))
            .unwrap();
        let top = module.cell("top", Policy::Eager);
        top.define(["middle", "base"], |args| Ok(CellOutput::value(args.i64(0)? + args.i64(1)?)))
            .unwrap();

        assert_eq!(top.value(), Some(json!(3)));
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
