//! Update Scheduler
//!
//! The scheduler owns every module and cell of one runtime and determines the
//! order in which cells are recomputed. It ensures that dependencies are
//! always visited before their dependents.
//!
//! # Algorithm
//!
//! 1. A batch of edited cells becomes the roots of a recompute pass.
//! 2. Breadth-first search over dependent edges collects every cell reachable
//!    from a root, each exactly once.
//! 3. The collected cells are sorted topologically (Kahn's algorithm) so that
//!    in-batch dependencies come first.
//! 4. The runtime then takes one [`Step`] per cell: run it, let it wait on a
//!    pending input, fail it with a missing dependency, or wake a dormant
//!    input first.
//!
//! Edges are derived from dependency *names*, resolved in the cell's module
//! first and then in its builtins. The scheduler indexes which cells read
//! each name, so a structural change re-resolves only the cells whose names
//! it affects.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::node::{CellId, CellNode, Dependencies, ModuleId, ModuleNode};
use crate::error::{CellError, DefineError};
use crate::reactive::{Args, Body, Generation, GenerationClock, Observer, Policy};

/// What the runtime should do next for one cell.
pub(crate) enum Step {
    /// Undefined, inactive or removed: nothing to do.
    Skip,

    /// These inputs have never been woken; activate and compute them first.
    Activate(Vec<CellId>),

    /// An input has no committed value yet. The cell was re-stamped pending
    /// and will run when that input commits.
    Wait {
        observers: Vec<Arc<dyn Observer>>,
    },

    /// A dependency name did not resolve.
    Missing {
        generation: Generation,
        name: String,
        observers: Vec<Arc<dyn Observer>>,
    },

    /// Invoke the body.
    Run {
        generation: Generation,
        body: Body,
        args: Args,
        observers: Vec<Arc<dyn Observer>>,
    },
}

/// A definition under consideration, layered over the current graph when
/// checking it for cycles.
struct Overlay<'a> {
    cell: CellId,
    module: ModuleId,
    name: Option<&'a str>,
    dependencies: &'a [String],
}

/// The update scheduler manages the dependency graph and coordinates updates.
#[derive(Default)]
pub struct UpdateScheduler {
    modules: HashMap<ModuleId, ModuleNode>,

    /// All cells in the graph, indexed by ID.
    nodes: HashMap<CellId, CellNode>,

    /// Cells declaring a dependency on each name.
    readers: HashMap<String, HashSet<CellId>>,

    next_module: u64,
    next_cell: u64,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a module falling back to `builtins` for unknown names.
    pub fn add_module(&mut self, builtins: Option<ModuleId>) -> ModuleId {
        let id = ModuleId::from(self.next_module);
        self.next_module += 1;
        self.modules.insert(id, ModuleNode::new(builtins));
        id
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleNode> {
        self.modules.get(&id)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Return the named cell of `module`, creating it when absent.
    ///
    /// Anonymous requests always create a new cell.
    pub fn add_cell(&mut self, module: ModuleId, name: Option<&str>, policy: Policy) -> CellId {
        let entry = self.modules.entry(module).or_default();
        if let Some(existing) = name.and_then(|n| entry.cells.get(n)) {
            return *existing;
        }

        let id = CellId::from(self.next_cell);
        self.next_cell += 1;
        if let Some(name) = name {
            entry.cells.insert(name.to_owned(), id);
        }
        self.nodes
            .insert(id, CellNode::new(id, module, name.map(str::to_owned), policy));
        if let Some(name) = name {
            // Cells reading this name may now resolve to, or be shadowed by,
            // the new cell.
            let readers = self.readers.get(name).map(sorted).unwrap_or_default();
            for reader in readers {
                self.relink_cell(reader);
            }
        }
        id
    }

    /// Get a reference to a node.
    pub fn get_node(&self, id: CellId) -> Option<&CellNode> {
        self.nodes.get(&id)
    }

    /// Get a mutable reference to a node.
    pub fn get_node_mut(&mut self, id: CellId) -> Option<&mut CellNode> {
        self.nodes.get_mut(&id)
    }

    /// Get the total number of cells in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve `name` as a dependency of a cell living in `module`.
    pub fn resolve(&self, module: ModuleId, name: &str) -> Option<CellId> {
        self.resolve_with(module, name, None)
    }

    fn resolve_with(&self, module: ModuleId, name: &str, overlay: Option<&Overlay>) -> Option<CellId> {
        if let Some(found) = self.lookup_local(module, name, overlay) {
            return Some(found);
        }
        let builtins = self.modules.get(&module)?.builtins?;
        self.lookup_local(builtins, name, overlay)
    }

    fn lookup_local(&self, module: ModuleId, name: &str, overlay: Option<&Overlay>) -> Option<CellId> {
        let entry = self.modules.get(&module)?;
        let found = entry.cells.get(name).copied();
        match overlay {
            Some(o) if o.module == module && o.name == Some(name) => Some(o.cell),
            // The cell under definition is giving this name up.
            Some(o) if found == Some(o.cell) => None,
            _ => found,
        }
    }

    fn inputs_with(&self, id: CellId, overlay: &Overlay) -> Vec<CellId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let dependencies: &[String] = if id == overlay.cell {
            overlay.dependencies
        } else {
            node.dependencies()
        };
        dependencies
            .iter()
            .filter_map(|d| self.resolve_with(node.module(), d, Some(overlay)))
            .collect()
    }

    /// Validate a prospective definition without touching the graph.
    pub fn check_definition(
        &self,
        id: CellId,
        name: Option<&str>,
        dependencies: &[String],
    ) -> Result<(), DefineError> {
        let node = self.nodes.get(&id).ok_or(DefineError::Removed)?;

        if let Some(name) = name {
            let owner = self
                .modules
                .get(&node.module())
                .and_then(|m| m.cells.get(name));
            if owner.is_some_and(|owner| *owner != id) {
                return Err(DefineError::DuplicateName {
                    name: name.to_owned(),
                });
            }
        }

        let overlay = Overlay {
            cell: id,
            module: node.module(),
            name,
            dependencies,
        };
        if let Some(path) = self.find_cycle(&overlay) {
            let names = path
                .iter()
                .map(|cell| {
                    if *cell == id {
                        name.map(str::to_owned).unwrap_or_else(|| node.display_name())
                    } else {
                        self.nodes
                            .get(cell)
                            .map(CellNode::display_name)
                            .unwrap_or_default()
                    }
                })
                .collect::<Vec<_>>();
            return Err(DefineError::CyclicDependency {
                cell: names.first().cloned().unwrap_or_default(),
                path: names,
            });
        }
        Ok(())
    }

    /// Depth-first search for a path from the overlay cell back to itself.
    fn find_cycle(&self, overlay: &Overlay) -> Option<Vec<CellId>> {
        let mut visited = HashSet::new();

        // One frame per cell on the current path, holding its unexplored
        // inputs reversed so they are popped in declaration order.
        let mut stack = vec![(overlay.cell, self.unexplored(overlay.cell, overlay))];
        while let Some((_, unexplored)) = stack.last_mut() {
            let Some(next) = unexplored.pop() else {
                stack.pop();
                continue;
            };
            if next == overlay.cell {
                let mut path: Vec<CellId> = stack.iter().map(|(cell, _)| *cell).collect();
                path.push(next);
                return Some(path);
            }
            if visited.insert(next) {
                let inputs = self.unexplored(next, overlay);
                stack.push((next, inputs));
            }
        }
        None
    }

    fn unexplored(&self, id: CellId, overlay: &Overlay) -> Vec<CellId> {
        let mut inputs = self.inputs_with(id, overlay);
        inputs.reverse();
        inputs
    }

    /// Install a definition already validated by [`check_definition`].
    ///
    /// Returns the roots of the recompute pass: the cell itself plus every
    /// cell that depended on it before the change.
    ///
    /// [`check_definition`]: UpdateScheduler::check_definition
    pub fn apply_definition(
        &mut self,
        id: CellId,
        name: Option<String>,
        dependencies: Dependencies,
        body: Body,
    ) -> Vec<CellId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let module = node.module();
        let old_name = node.name().map(str::to_owned);
        let old_dependencies = node.dependencies().clone();
        let mut roots = vec![id];
        roots.extend(sorted(node.dependents()));

        let renamed = old_name != name;
        if renamed {
            if let Some(entry) = self.modules.get_mut(&module) {
                if let Some(old) = &old_name {
                    entry.cells.shift_remove(old);
                }
                if let Some(new) = &name {
                    entry.cells.insert(new.clone(), id);
                }
            }
        }

        for dependency in &old_dependencies {
            if let Some(readers) = self.readers.get_mut(dependency) {
                readers.remove(&id);
            }
        }
        for dependency in &dependencies {
            self.readers.entry(dependency.clone()).or_default().insert(id);
        }

        // Readers of the old and new name resolve differently after a rename.
        let mut affected = vec![id];
        if renamed {
            for changed in old_name.iter().chain(name.iter()) {
                if let Some(readers) = self.readers.get(changed) {
                    affected.extend(sorted(readers));
                }
            }
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_definition(name, dependencies, body);
        }
        for cell in affected {
            self.relink_cell(cell);
        }
        roots
    }

    /// Remove a cell and all edges involving it.
    ///
    /// Returns the cells that depended on it, which must now be recomputed.
    pub fn remove_node(&mut self, id: CellId) -> Option<Vec<CellId>> {
        let node = self.nodes.remove(&id)?;
        if let (Some(name), Some(entry)) = (node.name(), self.modules.get_mut(&node.module())) {
            if entry.cells.get(name) == Some(&id) {
                entry.cells.shift_remove(name);
            }
        }
        for dependency in node.dependencies() {
            if let Some(readers) = self.readers.get_mut(dependency) {
                readers.remove(&id);
            }
        }
        for input in node.inputs().iter().flatten() {
            if let Some(dependency) = self.nodes.get_mut(input) {
                dependency.remove_dependent(id);
            }
        }

        let dependents = sorted(node.dependents());
        for dependent in &dependents {
            self.relink_cell(*dependent);
        }
        Some(dependents)
    }

    /// Re-resolve one cell's dependency names and patch the affected
    /// dependent sets.
    fn relink_cell(&mut self, id: CellId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let previous: Vec<CellId> = node.inputs().iter().flatten().copied().collect();
        let inputs: Vec<Option<CellId>> = node
            .dependencies()
            .iter()
            .map(|d| self.resolve(node.module(), d))
            .collect();

        for input in previous {
            if let Some(dependency) = self.nodes.get_mut(&input) {
                dependency.remove_dependent(id);
            }
        }
        for input in inputs.iter().flatten() {
            if let Some(dependency) = self.nodes.get_mut(input) {
                dependency.add_dependent(id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_inputs(inputs);
        }
    }

    /// Collect `roots` and everything downstream of them, in update order.
    pub fn schedule(&self, roots: impl IntoIterator<Item = CellId>) -> Vec<CellId> {
        let mut to_process = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<CellId> = roots.into_iter().collect();

        // BFS over dependent edges
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                to_process.push(id);
                queue.extend(sorted(node.dependents()));
            }
        }

        // Sort topologically so dependencies are processed first
        self.topological_sort(to_process)
    }

    /// Perform a topological sort of the given cells.
    ///
    /// Returns cells in order such that dependencies come before dependents.
    fn topological_sort(&self, cells: Vec<CellId>) -> Vec<CellId> {
        let cell_set: HashSet<_> = cells.iter().copied().collect();
        let mut in_degree: HashMap<CellId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(cells.len());
        let mut queue = VecDeque::new();

        // Calculate in-degrees (only counting edges within the cell set)
        for &id in &cells {
            if let Some(node) = self.nodes.get(&id) {
                let distinct: HashSet<_> = node
                    .inputs()
                    .iter()
                    .flatten()
                    .filter(|d| cell_set.contains(d))
                    .collect();
                in_degree.insert(id, distinct.len());
                if distinct.is_empty() {
                    queue.push_back(id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(id) = queue.pop_front() {
            result.push(id);

            if let Some(node) = self.nodes.get(&id) {
                for dependent in sorted(node.dependents()) {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        result
    }

    /// Decide the next step for `id` and, when it computes, stamp it with a
    /// fresh generation and mark it pending.
    pub(crate) fn begin(&mut self, id: CellId, clock: &GenerationClock) -> Step {
        let Some(node) = self.nodes.get(&id) else {
            return Step::Skip;
        };
        if !node.is_defined() || !node.is_active() {
            return Step::Skip;
        }

        let missing = node
            .dependencies()
            .iter()
            .zip(node.inputs())
            .find(|(_, input)| input.is_none())
            .map(|(name, _)| name.clone());

        if missing.is_none() {
            let asleep: Vec<CellId> = node
                .inputs()
                .iter()
                .flatten()
                .filter(|input| self.nodes.get(input).is_some_and(|n| !n.is_active()))
                .copied()
                .collect();
            if !asleep.is_empty() {
                return Step::Activate(asleep);
            }
        }

        let settled: Option<Vec<Result<_, CellError>>> = node
            .inputs()
            .iter()
            .flatten()
            .map(|input| {
                self.nodes
                    .get(input)
                    .and_then(|n| n.value().status().settled())
            })
            .collect();

        // A re-pended input leaves an earlier invocation of this definition
        // alone; the input's own commit recomputes the cell.
        if missing.is_none() && settled.is_none() && node.has_invoked() {
            return Step::Wait {
                observers: Vec::new(),
            };
        }
        let body = node.body().cloned();

        let Some(node) = self.nodes.get_mut(&id) else {
            return Step::Skip;
        };
        let was_pending = node.value().status().is_pending();
        let generation = clock.tick();
        node.stamp(generation);

        if let Some(name) = missing {
            node.mark_invoked();
            return Step::Missing {
                generation,
                name,
                observers: node.observers(),
            };
        }
        match (settled, body) {
            (Some(inputs), Some(body)) => {
                node.mark_invoked();
                Step::Run {
                    generation,
                    body,
                    args: Args::new(inputs),
                    observers: node.observers(),
                }
            }
            _ => Step::Wait {
                observers: if was_pending {
                    Vec::new()
                } else {
                    node.observers()
                },
            },
        }
    }
}

fn sorted(cells: &HashSet<CellId>) -> Vec<CellId> {
    let mut cells: Vec<CellId> = cells.iter().copied().collect();
    cells.sort_unstable();
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deps(names: &[&str]) -> Dependencies {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn define(scheduler: &mut UpdateScheduler, id: CellId, names: &[&str]) {
        let name = scheduler.get_node(id).and_then(|n| n.name().map(str::to_owned));
        scheduler.apply_definition(id, name, deps(names), Body::constant(json!(null)));
    }

    #[test]
    fn add_and_remove_nodes() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);

        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        assert_eq!(scheduler.node_count(), 2);

        scheduler.remove_node(a);
        assert_eq!(scheduler.node_count(), 1);
        assert!(scheduler.get_node(a).is_none());
        assert!(scheduler.get_node(b).is_some());
        assert_eq!(scheduler.resolve(module, "a"), None);
    }

    #[test]
    fn named_cells_are_idempotent() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);

        let first = scheduler.add_cell(module, Some("a"), Policy::Lazy);
        let second = scheduler.add_cell(module, Some("a"), Policy::Eager);
        assert_eq!(first, second);
        assert_eq!(scheduler.get_node(first).unwrap().policy(), Policy::Lazy);

        let anon1 = scheduler.add_cell(module, None, Policy::Eager);
        let anon2 = scheduler.add_cell(module, None, Policy::Eager);
        assert_ne!(anon1, anon2);
    }

    #[test]
    fn edges_follow_names() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);

        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        define(&mut scheduler, b, &["a"]);
        assert_eq!(scheduler.get_node(b).unwrap().inputs(), &[None]);

        // Creating `a` later links the waiting dependent.
        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);
        assert_eq!(scheduler.get_node(b).unwrap().inputs(), &[Some(a)]);
        assert!(scheduler.get_node(a).unwrap().dependents().contains(&b));
    }

    #[test]
    fn builtins_resolve_one_hop() {
        let mut scheduler = UpdateScheduler::new();
        let base = scheduler.add_module(None);
        let builtins = scheduler.add_module(Some(base));
        let user = scheduler.add_module(Some(builtins));

        let deep = scheduler.add_cell(base, Some("deep"), Policy::Eager);
        let helper = scheduler.add_cell(builtins, Some("helper"), Policy::Dormant);
        let local = scheduler.add_cell(user, Some("helper"), Policy::Eager);

        assert_eq!(scheduler.resolve(user, "helper"), Some(local));
        assert_eq!(scheduler.resolve(builtins, "helper"), Some(helper));
        assert_eq!(scheduler.resolve(builtins, "deep"), Some(deep));
        assert_eq!(scheduler.resolve(user, "deep"), None);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);
        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);

        let error = scheduler
            .check_definition(a, Some("a"), &["a".to_string()])
            .unwrap_err();
        assert!(matches!(error, DefineError::CyclicDependency { .. }));
    }

    #[test]
    fn transitive_cycle_reports_path() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);
        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        let c = scheduler.add_cell(module, Some("c"), Policy::Eager);
        define(&mut scheduler, b, &["a"]);
        define(&mut scheduler, c, &["b"]);

        let error = scheduler
            .check_definition(a, Some("a"), &["c".to_string()])
            .unwrap_err();
        assert_eq!(
            error,
            DefineError::CyclicDependency {
                cell: "a".into(),
                path: vec!["a".into(), "c".into(), "b".into(), "a".into()],
            }
        );
    }

    #[test]
    fn rename_into_cycle_is_detected() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);
        let c = scheduler.add_cell(module, Some("c"), Policy::Eager);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        define(&mut scheduler, c, &["x"]);
        define(&mut scheduler, b, &["c"]);

        // Renaming `b` to `x` would make `c` depend on it.
        assert!(scheduler
            .check_definition(b, Some("x"), &["c".to_string()])
            .is_err());
        assert!(scheduler.check_definition(b, Some("y"), &["c".to_string()]).is_ok());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);
        scheduler.add_cell(module, Some("a"), Policy::Eager);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);

        assert_eq!(
            scheduler.check_definition(b, Some("a"), &[]),
            Err(DefineError::DuplicateName { name: "a".into() })
        );
        assert_eq!(scheduler.check_definition(b, Some("b"), &[]), Ok(()));
    }

    #[test]
    fn schedule_orders_diamond_once() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);
        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        let c = scheduler.add_cell(module, Some("c"), Policy::Eager);
        let d = scheduler.add_cell(module, Some("d"), Policy::Eager);
        define(&mut scheduler, a, &[]);
        define(&mut scheduler, b, &["a"]);
        define(&mut scheduler, c, &["a"]);
        define(&mut scheduler, d, &["b", "c"]);

        let order = scheduler.schedule([a, b]);
        assert_eq!(order.len(), 4);
        let pos = |id| order.iter().position(|&x| x == id);
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn remove_returns_dependents() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);
        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        define(&mut scheduler, b, &["a"]);

        assert_eq!(scheduler.remove_node(a), Some(vec![b]));
        assert_eq!(scheduler.get_node(b).unwrap().inputs(), &[None]);
        assert_eq!(scheduler.remove_node(a), None);
    }

    #[test]
    fn begin_reports_missing_dependency() {
        let mut scheduler = UpdateScheduler::new();
        let clock = GenerationClock::new();
        let module = scheduler.add_module(None);
        let x = scheduler.add_cell(module, Some("x"), Policy::Eager);
        define(&mut scheduler, x, &["missing"]);

        match scheduler.begin(x, &clock) {
            Step::Missing { name, generation, .. } => {
                assert_eq!(name, "missing");
                assert_eq!(scheduler.get_node(x).unwrap().generation(), generation);
            }
            _ => panic!("expected a missing dependency"),
        }
    }

    #[test]
    fn begin_wakes_sleeping_inputs_first() {
        let mut scheduler = UpdateScheduler::new();
        let clock = GenerationClock::new();
        let module = scheduler.add_module(None);
        let a = scheduler.add_cell(module, Some("a"), Policy::Dormant);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        define(&mut scheduler, a, &[]);
        define(&mut scheduler, b, &["a"]);

        assert!(matches!(scheduler.begin(a, &clock), Step::Skip));
        match scheduler.begin(b, &clock) {
            Step::Activate(cells) => assert_eq!(cells, vec![a]),
            _ => panic!("expected activation"),
        }
    }

    #[test]
    fn begin_waits_on_pending_input() {
        let mut scheduler = UpdateScheduler::new();
        let clock = GenerationClock::new();
        let module = scheduler.add_module(None);
        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        define(&mut scheduler, a, &[]);
        define(&mut scheduler, b, &["a"]);

        assert!(matches!(scheduler.begin(b, &clock), Step::Wait { .. }));
        assert!(matches!(scheduler.begin(a, &clock), Step::Run { .. }));
    }

    #[test]
    fn repended_input_leaves_running_dependent_alone() {
        let mut scheduler = UpdateScheduler::new();
        let clock = GenerationClock::new();
        let module = scheduler.add_module(None);
        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);
        let b = scheduler.add_cell(module, Some("b"), Policy::Eager);
        define(&mut scheduler, a, &[]);
        define(&mut scheduler, b, &["a"]);

        let Step::Run { generation, .. } = scheduler.begin(a, &clock) else {
            panic!("expected a to run");
        };
        scheduler
            .get_node_mut(a)
            .unwrap()
            .value_mut()
            .settle(generation, Ok(json!(1)));
        let Step::Run { generation: running, .. } = scheduler.begin(b, &clock) else {
            panic!("expected b to run");
        };

        // `a` goes pending again while `b`'s invocation is still out.
        assert!(matches!(scheduler.begin(a, &clock), Step::Run { .. }));
        match scheduler.begin(b, &clock) {
            Step::Wait { observers } => assert!(observers.is_empty()),
            _ => panic!("expected b to wait"),
        }
        assert_eq!(scheduler.get_node(b).unwrap().generation(), running);
    }

    #[test]
    fn long_chain_cycle_is_found() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);
        let cells: Vec<CellId> = (0..100_000)
            .map(|i| scheduler.add_cell(module, Some(format!("c{i}").as_str()), Policy::Eager))
            .collect();
        for i in 1..cells.len() {
            let previous = format!("c{}", i - 1);
            define(&mut scheduler, cells[i], &[previous.as_str()]);
        }

        let last = format!("c{}", cells.len() - 1);
        match scheduler.check_definition(cells[0], Some("c0"), &[last]) {
            Err(DefineError::CyclicDependency { path, .. }) => {
                assert_eq!(path.len(), cells.len() + 1);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn local_cell_shadows_builtin_for_existing_readers() {
        let mut scheduler = UpdateScheduler::new();
        let builtins = scheduler.add_module(None);
        let user = scheduler.add_module(Some(builtins));
        let shared = scheduler.add_cell(builtins, Some("html"), Policy::Dormant);
        let page = scheduler.add_cell(user, Some("page"), Policy::Eager);
        define(&mut scheduler, page, &["html"]);
        assert_eq!(scheduler.get_node(page).unwrap().inputs(), &[Some(shared)]);

        let local = scheduler.add_cell(user, Some("html"), Policy::Eager);
        assert_eq!(scheduler.get_node(page).unwrap().inputs(), &[Some(local)]);
        assert!(scheduler.get_node(local).unwrap().dependents().contains(&page));
        assert!(!scheduler.get_node(shared).unwrap().dependents().contains(&page));
    }

    #[test]
    fn rename_moves_readers() {
        let mut scheduler = UpdateScheduler::new();
        let module = scheduler.add_module(None);
        let a = scheduler.add_cell(module, Some("a"), Policy::Eager);
        let old_reader = scheduler.add_cell(module, Some("old_reader"), Policy::Eager);
        let new_reader = scheduler.add_cell(module, Some("new_reader"), Policy::Eager);
        define(&mut scheduler, old_reader, &["a"]);
        define(&mut scheduler, new_reader, &["z"]);

        scheduler.apply_definition(a, Some("z".into()), Dependencies::new(), Body::constant(json!(1)));

        assert_eq!(scheduler.get_node(old_reader).unwrap().inputs(), &[None]);
        assert_eq!(scheduler.get_node(new_reader).unwrap().inputs(), &[Some(a)]);
        let dependents = scheduler.get_node(a).unwrap().dependents();
        assert!(dependents.contains(&new_reader));
        assert!(!dependents.contains(&old_reader));
    }
}
