//! The controller's module-instance list (`iop`, spec §4.F) and the
//! duplication/reorder/removal rules that operate on it.

use dev_graph::{ModuleFlags, OperatorRegistry};

/// One instantiated module on the stack. Several instances of the same
/// `operator` distinguish themselves by `multi_priority`/`multi_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInstance {
    pub operator: String,
    pub multi_priority: i32,
    pub multi_name: String,
    pub iop_order: f64,
    pub enabled: bool,
}

/// The ordered set of instantiated modules, kept sorted by `iop_order`.
/// Touched only from the controller's foreground thread (spec §5
/// "all other work is synchronous on the controller thread"), so it needs
/// no internal locking.
#[derive(Debug, Default)]
pub struct ModuleStack {
    instances: Vec<ModuleInstance>,
}

impl ModuleStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instances(&self) -> &[ModuleInstance] {
        &self.instances
    }

    /// Populates one disabled default instance per registered operator
    /// (spec §4.F `load_image` step "instantiate module instances from the
    /// registry"), ordered alphabetically by name as a stable default
    /// `iop_order` seed.
    pub fn instantiate_from_registry(&mut self, registry: &OperatorRegistry) {
        self.instances.clear();
        let mut names: Vec<&str> = registry.names().collect();
        names.sort_unstable();
        for (i, name) in names.into_iter().enumerate() {
            self.instances.push(ModuleInstance {
                operator: name.to_string(),
                multi_priority: 0,
                multi_name: String::new(),
                iop_order: i as f64,
                enabled: false,
            });
        }
    }

    /// Duplicates `operator`: finds the existing instance group's maximum
    /// `multi_priority`, assigns `max + 1`, picks a collision-free
    /// `multi_name`, and inserts the new instance keeping the list sorted
    /// by `iop_order` (spec §4.F "Module duplication").
    pub fn duplicate(&mut self, operator: &str, base_iop_order: f64) -> ModuleInstance {
        let max_priority = self
            .instances
            .iter()
            .filter(|m| m.operator == operator)
            .map(|m| m.multi_priority)
            .max()
            .unwrap_or(0);
        let next_priority = max_priority + 1;

        let mut candidate = format!("{operator}_{next_priority}");
        while self.instances.iter().any(|m| m.operator == operator && m.multi_name == candidate) {
            candidate.push('_');
        }

        let instance = ModuleInstance {
            operator: operator.to_string(),
            multi_priority: next_priority,
            multi_name: candidate,
            iop_order: base_iop_order,
            enabled: true,
        };
        self.instances.push(instance.clone());
        self.instances.sort_by(|a, b| a.iop_order.partial_cmp(&b.iop_order).unwrap());
        instance
    }

    /// True only when neither instance is a distinct instance of the same
    /// `ONE_INSTANCE`-flagged operator (which can never have more than one
    /// member to reorder against) and they aren't the same instance (spec
    /// §4.F "reorder predicate").
    pub fn can_move_before(&self, registry: &OperatorRegistry, a: &ModuleInstance, b: &ModuleInstance) -> bool {
        if a.operator == b.operator && a.multi_name == b.multi_name {
            return false;
        }
        if a.operator == b.operator {
            if let Some(op) = registry.get(&a.operator) {
                if op.flags().contains(ModuleFlags::ONE_INSTANCE) {
                    return false;
                }
            }
        }
        true
    }

    pub fn can_move_after(&self, registry: &OperatorRegistry, a: &ModuleInstance, b: &ModuleInstance) -> bool {
        self.can_move_before(registry, b, a)
    }

    /// Removes every instance of `operator` from the stack (spec §4.F
    /// "Module removal").
    pub fn remove_operator(&mut self, operator: &str) {
        self.instances.retain(|m| m.operator != operator);
    }
}
