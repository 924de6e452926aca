use serde::{Deserialize, Serialize};

/// Knobs of one compile pass. Loaded from JSON by the CLI; every field has a
/// default so partial files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerConfig {
    /// Slots in the global store.
    pub global_capacity: u32,
    /// Slots in each actor's store.
    pub actor_capacity: u32,
    /// Live instances across all classes; `new` aborts the unit past this.
    pub class_capacity: u32,
    /// Return slots of closed scopes to the pool.
    pub reuse_slots: bool,
    /// Hand out handles of deleted instances again.
    pub reuse_handles: bool,
    /// Element capacity of the target; exceeding it is a warning.
    pub element_ceiling: usize,
}

impl Default for LowerConfig {
    fn default() -> Self {
        LowerConfig {
            global_capacity: 1000,
            actor_capacity: 1000,
            class_capacity: 1000,
            reuse_slots: false,
            reuse_handles: true,
            element_ceiling: 32_768,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LowerConfig = serde_json::from_str(r#"{ "global_capacity": 8 }"#).unwrap();
        assert_eq!(config.global_capacity, 8);
        assert_eq!(config.actor_capacity, 1000);
        assert!(config.reuse_handles);
    }
}
