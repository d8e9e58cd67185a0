//! The controller's proxy hooks: callbacks UI collaborators register to be
//! told about module-group visibility, mask list changes, and snapshot
//! requests (spec §4.F "a bag of proxy hooks").

use crate::modules::ModuleInstance;

pub type VisibilityHook = Box<dyn Fn(&str) -> bool + Send + Sync>;
pub type MaskListChangedHook = Box<dyn Fn() + Send + Sync>;
pub type SnapshotRequestHook = Box<dyn Fn(dev_types::ImageId) + Send + Sync>;
pub type InstanceInsertedHook = Box<dyn Fn(&ModuleInstance) + Send + Sync>;

/// Defaults to "no collaborator attached": visibility checks pass
/// unconditionally, change notifications are dropped.
#[derive(Default)]
pub struct ProxyHooks {
    module_group_visible: Option<VisibilityHook>,
    on_mask_list_changed: Option<MaskListChangedHook>,
    on_snapshot_requested: Option<SnapshotRequestHook>,
    on_instance_inserted: Option<InstanceInsertedHook>,
}

impl ProxyHooks {
    pub fn set_module_group_visible(&mut self, hook: VisibilityHook) {
        self.module_group_visible = Some(hook);
    }

    pub fn set_on_mask_list_changed(&mut self, hook: MaskListChangedHook) {
        self.on_mask_list_changed = Some(hook);
    }

    pub fn set_on_snapshot_requested(&mut self, hook: SnapshotRequestHook) {
        self.on_snapshot_requested = Some(hook);
    }

    pub fn set_on_instance_inserted(&mut self, hook: InstanceInsertedHook) {
        self.on_instance_inserted = Some(hook);
    }

    pub fn module_group_visible(&self, group: &str) -> bool {
        self.module_group_visible.as_ref().is_none_or(|hook| hook(group))
    }

    pub fn notify_mask_list_changed(&self) {
        if let Some(hook) = &self.on_mask_list_changed {
            hook();
        }
    }

    pub fn request_snapshot(&self, id: dev_types::ImageId) {
        if let Some(hook) = &self.on_snapshot_requested {
            hook(id);
        }
    }

    pub fn notify_instance_inserted(&self, instance: &ModuleInstance) {
        if let Some(hook) = &self.on_instance_inserted {
            hook(instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn unset_visibility_hook_defaults_to_visible() {
        let hooks = ProxyHooks::default();
        assert!(hooks.module_group_visible("color"));
    }

    #[test]
    fn mask_list_changed_hook_fires() {
        let mut hooks = ProxyHooks::default();
        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        hooks.set_on_mask_list_changed(Box::new(move || f.store(true, Ordering::SeqCst)));
        hooks.notify_mask_list_changed();
        assert!(fired.load(Ordering::SeqCst));
    }
}
