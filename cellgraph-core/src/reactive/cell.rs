//! Cell Handles
//!
//! A [`Cell`] is a handle to one named or anonymous computation inside a
//! module. Handles are cheap to clone; the cell itself lives in the runtime's
//! graph until [`Cell::remove`] is called.
//!
//! # Defining
//!
//! `define` and `redefine` are validated before anything changes: a cycle or
//! a name clash is reported to the caller and leaves the graph untouched.
//! A successful definition immediately recomputes the cell (subject to its
//! policy) and everything downstream of it.

use std::sync::Arc;

use tracing::debug;

use super::observer::{Observer, ObserverId};
use super::output::{Args, Body, CellOutput};
use super::policy::Policy;
use super::runtime::{notify_settled, Runtime};
use super::value::{Generation, Status, Value};
use crate::error::{CellError, DefineError};
use crate::graph::{CellId, Dependencies};

/// Handle to a cell.
#[derive(Clone)]
pub struct Cell {
    runtime: Runtime,
    id: CellId,
}

impl Cell {
    pub(crate) fn new(runtime: Runtime, id: CellId) -> Self {
        Self { runtime, id }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// `None` for anonymous or removed cells.
    pub fn name(&self) -> Option<String> {
        self.runtime.with_scheduler(|scheduler| {
            scheduler
                .get_node(self.id)
                .and_then(|node| node.name().map(str::to_owned))
        })
    }

    /// `None` once removed.
    pub fn policy(&self) -> Option<Policy> {
        self.runtime
            .with_scheduler(|scheduler| scheduler.get_node(self.id).map(|node| node.policy()))
    }

    /// Current status; `None` once removed.
    pub fn status(&self) -> Option<Status> {
        self.runtime.with_scheduler(|scheduler| {
            scheduler
                .get_node(self.id)
                .map(|node| node.value().status().clone())
        })
    }

    /// The fulfilled value, if the cell currently holds one.
    pub fn value(&self) -> Option<Value> {
        self.status().and_then(|status| status.value().cloned())
    }

    /// The rejection, if the cell currently holds one.
    pub fn error(&self) -> Option<CellError> {
        self.status().and_then(|status| status.error().cloned())
    }

    /// Generation of the latest computation attempt; `None` once removed.
    pub fn generation(&self) -> Option<Generation> {
        self.runtime
            .with_scheduler(|scheduler| scheduler.get_node(self.id).map(|node| node.generation()))
    }

    pub fn dependencies(&self) -> Vec<String> {
        self.runtime.with_scheduler(|scheduler| {
            scheduler
                .get_node(self.id)
                .map(|node| node.dependencies().to_vec())
                .unwrap_or_default()
        })
    }

    pub fn is_removed(&self) -> bool {
        self.runtime
            .with_scheduler(|scheduler| scheduler.get_node(self.id).is_none())
    }

    /// Assign dependencies and body, keeping the current name.
    ///
    /// # Errors
    ///
    /// [`DefineError::CyclicDependency`] when the dependencies would make this
    /// cell reachable from itself, [`DefineError::Removed`] on a removed cell.
    pub fn define<I, S, F>(&self, dependencies: I, body: F) -> Result<(), DefineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Args) -> Result<CellOutput, CellError> + Send + Sync + 'static,
    {
        self.define_body(dependencies.into_iter().map(Into::into).collect(), Body::new(body))
    }

    /// Define the cell as a constant.
    pub fn define_constant(&self, value: impl Into<Value>) -> Result<(), DefineError> {
        self.define_body(Dependencies::new(), Body::constant(value.into()))
    }

    /// Like [`define`](Cell::define) with a prebuilt [`Body`].
    pub fn define_body(&self, dependencies: Dependencies, body: Body) -> Result<(), DefineError> {
        let name = self.name();
        self.install(name, dependencies, body)
    }

    /// Assign name, dependencies and body. `None` makes the cell anonymous.
    ///
    /// # Errors
    ///
    /// [`DefineError::DuplicateName`] when another cell of the module owns
    /// `name`, plus everything [`define`](Cell::define) reports.
    pub fn redefine<I, S, F>(&self, name: Option<&str>, dependencies: I, body: F) -> Result<(), DefineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Args) -> Result<CellOutput, CellError> + Send + Sync + 'static,
    {
        self.redefine_body(
            name,
            dependencies.into_iter().map(Into::into).collect(),
            Body::new(body),
        )
    }

    /// Like [`redefine`](Cell::redefine) with a prebuilt [`Body`].
    pub fn redefine_body(
        &self,
        name: Option<&str>,
        dependencies: Dependencies,
        body: Body,
    ) -> Result<(), DefineError> {
        self.install(name.map(str::to_owned), dependencies, body)
    }

    fn install(
        &self,
        name: Option<String>,
        dependencies: Dependencies,
        body: Body,
    ) -> Result<(), DefineError> {
        let roots = self.runtime.with_scheduler(|scheduler| {
            scheduler.check_definition(self.id, name.as_deref(), &dependencies)?;
            Ok::<_, DefineError>(scheduler.apply_definition(self.id, name, dependencies, body))
        })?;
        debug!(cell = self.id.raw(), name = ?self.name(), "defined");
        self.runtime.recompute(roots);
        Ok(())
    }

    /// Detach the cell from its module and forget its observers.
    ///
    /// Dependents stay in place and are recomputed, failing with
    /// [`CellError::MissingDependency`] unless the name resolves elsewhere.
    /// Returns `false` when the cell was already removed.
    pub fn remove(&self) -> bool {
        let dependents = self
            .runtime
            .with_scheduler(|scheduler| scheduler.remove_node(self.id));
        let Some(dependents) = dependents else {
            return false;
        };
        debug!(cell = self.id.raw(), dependents = dependents.len(), "removed");
        self.runtime.recompute(dependents);
        true
    }

    /// Register an observer.
    ///
    /// A settled cell reports its current status to the new observer right
    /// away. Observing a lazy cell wakes it.
    pub fn include_observer(&self, observer: Arc<dyn Observer>) -> Result<ObserverId, DefineError> {
        let id = ObserverId::new();
        let (current, wake) = self.runtime.with_scheduler(|scheduler| {
            let node = scheduler.get_node_mut(self.id).ok_or(DefineError::Removed)?;
            node.add_observer(id, Arc::clone(&observer));
            let wake = !node.is_active() && node.policy().wakes_on_observe();
            Ok::<_, DefineError>((node.value().status().settled(), wake))
        })?;

        if let Some(outcome) = current {
            notify_settled(self, &[observer], &outcome);
        }
        if wake {
            self.runtime.activate(self.id);
        }
        Ok(id)
    }

    /// Detach an observer. Returns `false` when it was not attached here.
    pub fn remove_observer(&self, observer: ObserverId) -> bool {
        self.runtime.with_scheduler(|scheduler| {
            scheduler
                .get_node_mut(self.id)
                .is_some_and(|node| node.remove_observer(observer))
        })
    }

    pub fn observer_count(&self) -> usize {
        self.runtime.with_scheduler(|scheduler| {
            scheduler
                .get_node(self.id)
                .map_or(0, |node| node.observer_count())
        })
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.runtime.same_as(&other.runtime)
    }
}

impl Eq for Cell {}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell").field("id", &self.id.raw()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::FnObserver;
    use serde_json::json;

    #[test]
    fn define_keeps_name() {
        let runtime = Runtime::new();
        let cell = runtime.new_module().cell("a", Policy::Eager);
        cell.define(["x"], |_| Ok(json!(0).into())).unwrap();
        assert_eq!(cell.name().as_deref(), Some("a"));
        assert_eq!(cell.dependencies(), vec!["x".to_string()]);
    }

    #[test]
    fn redefine_can_rename_and_anonymize() {
        let runtime = Runtime::new();
        let module = runtime.new_module();
        let cell = module.cell("a", Policy::Eager);
        cell.define_constant(json!(1)).unwrap();

        cell.redefine(Some("b"), Vec::<String>::new(), |_| Ok(json!(2).into()))
            .unwrap();
        assert_eq!(module.lookup("a"), None);
        assert_eq!(module.lookup("b"), Some(cell.clone()));

        cell.redefine(None, Vec::<String>::new(), |_| Ok(json!(3).into()))
            .unwrap();
        assert_eq!(cell.name(), None);
        assert_eq!(module.lookup("b"), None);
        assert_eq!(cell.value(), Some(json!(3)));
    }

    #[test]
    fn removed_cell_refuses_everything() {
        let runtime = Runtime::new();
        let cell = runtime.new_module().cell("a", Policy::Eager);
        assert!(cell.remove());
        assert!(!cell.remove());
        assert!(cell.is_removed());
        assert_eq!(cell.status(), None);
        assert_eq!(cell.define_constant(json!(1)), Err(DefineError::Removed));
        assert!(cell
            .include_observer(Arc::new(FnObserver::new(|_| {})))
            .is_err());
    }

    #[test]
    fn observers_detach_independently() {
        let runtime = Runtime::new();
        let cell = runtime.new_module().cell("a", Policy::Eager);
        let first = cell
            .include_observer(Arc::new(FnObserver::new(|_| {})))
            .unwrap();
        let _second = cell
            .include_observer(Arc::new(FnObserver::new(|_| {})))
            .unwrap();

        assert_eq!(cell.observer_count(), 2);
        assert!(cell.remove_observer(first));
        assert!(!cell.remove_observer(first));
        assert_eq!(cell.observer_count(), 1);
    }

    #[test]
    fn generation_advances_per_attempt() {
        let runtime = Runtime::new();
        let cell = runtime.new_module().cell("a", Policy::Eager);
        cell.define_constant(json!(1)).unwrap();
        let first = cell.generation().unwrap();
        cell.define_constant(json!(2)).unwrap();
        assert!(cell.generation().unwrap() > first);
    }
}
