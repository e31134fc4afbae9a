//! Modules
//!
//! A module is a namespace of cells with an optional builtins module that is
//! consulted, one hop only, for names the module does not define itself.

use super::cell::Cell;
use super::policy::Policy;
use super::runtime::Runtime;
use crate::graph::ModuleId;

/// Handle to a module of a [`Runtime`].
#[derive(Clone)]
pub struct Module {
    runtime: Runtime,
    id: ModuleId,
}

impl Module {
    pub(crate) fn new(runtime: Runtime, id: ModuleId) -> Self {
        Self { runtime, id }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Return the cell called `name`, creating an undefined one when absent.
    ///
    /// Idempotent: a second call returns the same cell and ignores `policy`.
    pub fn cell(&self, name: &str, policy: Policy) -> Cell {
        let id = self
            .runtime
            .with_scheduler(|scheduler| scheduler.add_cell(self.id, Some(name), policy));
        Cell::new(self.runtime.clone(), id)
    }

    /// [`cell`](Module::cell) with the runtime's configured default policy.
    pub fn default_cell(&self, name: &str) -> Cell {
        self.cell(name, self.runtime.config().default_policy)
    }

    /// Create a cell that no other cell can refer to.
    pub fn anonymous_cell(&self, policy: Policy) -> Cell {
        let id = self
            .runtime
            .with_scheduler(|scheduler| scheduler.add_cell(self.id, None, policy));
        Cell::new(self.runtime.clone(), id)
    }

    /// Resolve `name` the way a dependency of this module would be resolved.
    pub fn lookup(&self, name: &str) -> Option<Cell> {
        let id = self
            .runtime
            .with_scheduler(|scheduler| scheduler.resolve(self.id, name))?;
        Some(Cell::new(self.runtime.clone(), id))
    }

    /// Names defined directly in this module, in creation order.
    pub fn cell_names(&self) -> Vec<String> {
        self.runtime.with_scheduler(|scheduler| {
            scheduler
                .module(self.id)
                .map(|module| module.cells.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// The fallback module fixed when this module was created.
    pub fn builtins(&self) -> Option<Module> {
        let id = self
            .runtime
            .with_scheduler(|scheduler| scheduler.module(self.id).and_then(|m| m.builtins))?;
        Some(Module::new(self.runtime.clone(), id))
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.runtime.same_as(&other.runtime)
    }
}

impl Eq for Module {}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module").field("id", &self.id.raw()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use serde_json::json;

    #[test]
    fn cell_is_idempotent_and_first_policy_wins() {
        let runtime = Runtime::new();
        let module = runtime.new_module();
        let first = module.cell("a", Policy::Dormant);
        let second = module.cell("a", Policy::Eager);
        assert_eq!(first, second);
        assert_eq!(second.policy(), Some(Policy::Dormant));
    }

    #[test]
    fn names_are_listed_in_creation_order() {
        let runtime = Runtime::new();
        let module = runtime.new_module();
        module.cell("z", Policy::Eager);
        module.anonymous_cell(Policy::Eager);
        module.cell("a", Policy::Eager);
        assert_eq!(module.cell_names(), vec!["z".to_string(), "a".to_string()]);
    }

    #[test]
    fn lookup_falls_back_to_builtins() {
        let runtime = Runtime::new();
        let builtins = runtime.new_module();
        builtins.cell("scale", Policy::Dormant).define_constant(json!(2.5)).unwrap();
        runtime.register_builtins(&builtins);

        let module = runtime.new_module();
        assert_eq!(module.lookup("scale"), builtins.lookup("scale"));
        assert!(module.lookup("tau").is_none());

        let local = module.cell("scale", Policy::Eager);
        assert_eq!(module.lookup("scale"), Some(local));
    }

    #[test]
    fn default_cell_uses_configured_policy() {
        let config = RuntimeConfig {
            default_policy: Policy::Lazy,
            ..RuntimeConfig::default()
        };
        let runtime = Runtime::with_config(config);
        let cell = runtime.new_module().default_cell("a");
        assert_eq!(cell.policy(), Some(Policy::Lazy));
    }
}
