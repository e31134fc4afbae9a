//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph: one
//! [`CellNode`] per cell and one [`ModuleNode`] per module.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tokio::sync::watch;

use crate::reactive::{Body, Generation, Observer, ObserverId, Policy, ValueBox};

/// Unique identifier for a cell within one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CellId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a module within one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u64);

impl ModuleId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ModuleId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Declared dependency names, in argument order.
pub type Dependencies = SmallVec<[String; 4]>;

/// A module's namespace.
#[derive(Debug, Default)]
pub struct ModuleNode {
    /// Named cells, in creation order.
    pub(crate) cells: IndexMap<String, CellId>,

    /// Fallback module consulted for names missing here. Never chained further.
    pub(crate) builtins: Option<ModuleId>,
}

impl ModuleNode {
    pub fn new(builtins: Option<ModuleId>) -> Self {
        Self {
            cells: IndexMap::new(),
            builtins,
        }
    }
}

/// A cell in the dependency graph.
pub struct CellNode {
    id: CellId,

    /// Owning module.
    module: ModuleId,

    name: Option<String>,

    policy: Policy,

    /// Whether the cell wants to compute. Eager cells start active; lazy and
    /// dormant cells are activated on demand and stay active afterwards.
    active: bool,

    dependencies: Dependencies,

    /// Resolution of `dependencies`, position for position. `None` marks a
    /// missing name. Patched by the scheduler whenever a name it reads changes.
    inputs: Vec<Option<CellId>>,

    /// Cells whose `inputs` contain this cell.
    dependents: HashSet<CellId>,

    /// `None` until the cell is first defined.
    body: Option<Body>,

    value: ValueBox,

    /// Whether the body has been invoked since the last definition.
    invoked: bool,

    /// Publishes every new generation so background tasks notice they were
    /// superseded without polling.
    stamps: watch::Sender<Generation>,

    observers: Vec<(ObserverId, Arc<dyn Observer>)>,
}

impl CellNode {
    /// Create an undefined cell.
    pub fn new(id: CellId, module: ModuleId, name: Option<String>, policy: Policy) -> Self {
        Self {
            id,
            module,
            name,
            policy,
            active: policy.starts_active(),
            dependencies: Dependencies::new(),
            inputs: Vec::new(),
            dependents: HashSet::new(),
            body: None,
            value: ValueBox::new(),
            invoked: false,
            stamps: watch::Sender::new(Generation::default()),
            observers: Vec::new(),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for messages; anonymous cells render as `#<id>`.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.id.raw()),
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn inputs(&self) -> &[Option<CellId>] {
        &self.inputs
    }

    pub fn dependents(&self) -> &HashSet<CellId> {
        &self.dependents
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn value(&self) -> &ValueBox {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut ValueBox {
        &mut self.value
    }

    pub fn generation(&self) -> Generation {
        self.value.generation()
    }

    /// Start a new computation attempt: mark the value pending under
    /// `generation` and tell any task still working on an older one.
    pub fn stamp(&mut self, generation: Generation) {
        self.value.set_pending(generation);
        self.stamps.send_replace(generation);
    }

    /// Follow this cell's generations. The receiver closes once the cell is
    /// removed.
    pub fn watch_generation(&self) -> watch::Receiver<Generation> {
        self.stamps.subscribe()
    }

    pub fn has_invoked(&self) -> bool {
        self.invoked
    }

    pub(crate) fn mark_invoked(&mut self) {
        self.invoked = true;
    }

    /// Replace name, dependencies and body in one step.
    pub fn set_definition(&mut self, name: Option<String>, dependencies: Dependencies, body: Body) {
        self.name = name;
        self.dependencies = dependencies;
        self.body = Some(body);
        self.invoked = false;
    }

    pub(crate) fn set_inputs(&mut self, inputs: Vec<Option<CellId>>) {
        self.inputs = inputs;
    }

    pub(crate) fn add_dependent(&mut self, cell: CellId) {
        self.dependents.insert(cell);
    }

    pub(crate) fn remove_dependent(&mut self, cell: CellId) {
        self.dependents.remove(&cell);
    }

    pub fn observers(&self) -> Vec<Arc<dyn Observer>> {
        self.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
    }

    pub fn add_observer(&mut self, id: ObserverId, observer: Arc<dyn Observer>) {
        self.observers.push((id, observer));
    }

    /// Returns `false` when `id` was not registered here.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl std::fmt::Debug for CellNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("active", &self.active)
            .field("dependencies", &self.dependencies)
            .field("status", self.value.status())
            .finish()
    }
}
