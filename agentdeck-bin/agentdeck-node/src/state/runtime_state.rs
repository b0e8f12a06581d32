use dashmap::DashMap;

/// Request-scoped store. Each canvas node's in-flight flag is tracked
/// independently, so concurrent requests from different nodes share no
/// mutable state here beyond their own entries.
#[derive(Debug, Default)]
pub struct RuntimeState {
    executing: DashMap<String, bool>,
}

impl RuntimeState {
    pub fn new() -> Self {
        RuntimeState {
            executing: DashMap::new(),
        }
    }

    /// Marks a node as executing. Returns false when a request is already in
    /// flight for it, in which case the caller must not start another.
    pub fn begin_request(&self, node_id: &str) -> bool {
        let mut entry = self.executing.entry(node_id.to_string()).or_insert(false);
        if *entry {
            false
        } else {
            *entry = true;
            true
        }
    }

    pub fn finish_request(&self, node_id: &str) {
        self.executing.remove(node_id);
    }

    pub fn is_executing(&self, node_id: &str) -> bool {
        self.executing.get(node_id).map(|flag| *flag).unwrap_or(false)
    }

    pub fn clear(&self) {
        self.executing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_tracked_per_node() {
        let runtime = RuntimeState::new();
        assert!(runtime.begin_request("node-1"));
        assert!(runtime.begin_request("node-2"));
        assert!(!runtime.begin_request("node-1"));

        assert!(runtime.is_executing("node-1"));
        runtime.finish_request("node-1");
        assert!(!runtime.is_executing("node-1"));
        assert!(runtime.is_executing("node-2"));
    }

    #[test]
    fn test_clear_resets_everything() {
        let runtime = RuntimeState::new();
        runtime.begin_request("node-1");
        runtime.clear();
        assert!(!runtime.is_executing("node-1"));
        assert!(runtime.begin_request("node-1"));
    }
}
