//! Tool registry and the leasing assistant's tools.

pub mod leads;
pub mod properties;
pub mod registry;

pub use leads::{InMemoryLeadSink, SaveLeadTool};
pub use properties::{
    CheckAvailabilityTool, ListPropertiesTool, Property, PropertyInfoTool, PropertyStore,
    CATALOG_UNAVAILABLE,
};
pub use registry::ToolRegistry;

use std::sync::Arc;

/// Registry with the full leasing tool set.
pub fn create_default_registry(store: Arc<PropertyStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ListPropertiesTool::new(Arc::clone(&store)));
    registry.register(PropertyInfoTool::new(Arc::clone(&store)));
    registry.register(CheckAvailabilityTool::new(store));
    registry.register(SaveLeadTool);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_tools() {
        let registry = create_default_registry(Arc::new(PropertyStore::seeded()));
        assert_eq!(registry.len(), 4);
        assert!(registry.has("list_available_properties"));
        assert!(registry.has("get_property_info"));
        assert!(registry.has("check_property_availability"));
        assert!(registry.has("save_lead"));
    }
}
