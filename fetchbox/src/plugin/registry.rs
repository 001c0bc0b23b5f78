use std::fmt;
use std::sync::Arc;

use super::{HookKind, Plugin};

/// Plugins of a strategy indexed by the hooks they implement.
///
/// Built once when the strategy is constructed.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
    by_hook: [Vec<usize>; HookKind::ALL.len()],
}

impl PluginRegistry {
    /// Indexes `plugins`, keeping their order.
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let mut by_hook: [Vec<usize>; HookKind::ALL.len()] = Default::default();
        for (index, plugin) in plugins.iter().enumerate() {
            for hook in plugin.hooks().iter() {
                by_hook[hook.index()].push(index);
            }
        }
        Self { plugins, by_hook }
    }

    /// All plugins in registration order.
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Number of plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether there are no plugins.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Whether any plugin implements `hook`.
    pub fn has(&self, hook: HookKind) -> bool {
        !self.by_hook[hook.index()].is_empty()
    }

    /// Registration indices of the plugins implementing `hook`.
    pub fn indices(&self, hook: HookKind) -> &[usize] {
        &self.by_hook[hook.index()]
    }

    /// Plugins implementing `hook` with their registration index.
    pub fn for_hook(&self, hook: HookKind) -> impl Iterator<Item = (usize, &Arc<dyn Plugin>)> {
        self.by_hook[hook.index()]
            .iter()
            .map(|&index| (index, &self.plugins[index]))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|plugin| plugin.name()))
            .finish()
    }
}
