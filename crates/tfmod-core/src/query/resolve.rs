//! Module resolution by name, alias or search phrase.

use super::QueryEngine;
use crate::models::Module;
use crate::{Result, TfmodError};
use tracing::debug;

impl QueryEngine {
    /// Resolve user input to one module.
    ///
    /// Tries, in order: exact name, best exact alias, best alias prefix and
    /// the top full-text hit. Alias ties prefer top-level modules, then the
    /// smallest name.
    pub fn resolve(&self, name_or_alias: &str) -> Result<Module> {
        let needle = name_or_alias.trim();
        if needle.is_empty() {
            return Err(TfmodError::invalid_input("module_name", "must not be empty"));
        }

        if let Some(module) = self.store.get_module(needle)? {
            return Ok(module);
        }
        if let Some(module) = self.store.resolve_alias(needle)? {
            debug!("Resolved '{}' to {} by alias", needle, module.name);
            return Ok(module);
        }
        if let Some(module) = self.store.resolve_alias_prefix(needle)? {
            debug!("Resolved '{}' to {} by alias prefix", needle, module.name);
            return Ok(module);
        }
        if let Some(module) = self.store.search_modules(needle, 1)?.into_iter().next() {
            debug!("Resolved '{}' to {} by search", needle, module.name);
            return Ok(module);
        }

        Err(TfmodError::not_found("Module", needle))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{create_test_engine, seed_module};
    use super::*;

    #[test]
    fn test_resolution_order() {
        let (engine, _temp) = create_test_engine();
        seed_module(&engine, "terraform-azure-redis", &[]);
        seed_module(&engine, "terraform-azure-vnet", &[]);
        seed_module(&engine, "terraform-azure-storage-account", &[]);

        assert_eq!(
            engine.resolve("terraform-azure-vnet").unwrap().name,
            "terraform-azure-vnet"
        );
        assert_eq!(engine.resolve("redis").unwrap().name, "terraform-azure-redis");
        assert_eq!(engine.resolve("REDIS").unwrap().name, "terraform-azure-redis");
        // initialism of storage-account
        assert_eq!(engine.resolve("sa").unwrap().name, "terraform-azure-storage-account");
        // alias prefix
        assert_eq!(engine.resolve("stor").unwrap().name, "terraform-azure-storage-account");
    }

    #[test]
    fn test_alias_tie_prefers_top_level_then_name() {
        let (engine, _temp) = create_test_engine();
        // "subnet" has weight 2 for both
        seed_module(&engine, "terraform-azure-app//modules/subnet", &[]);
        seed_module(&engine, "terraform-azure-vnet-subnet", &[]);
        assert_eq!(engine.resolve("subnet").unwrap().name, "terraform-azure-vnet-subnet");

        // weight 3 for both, smallest name wins
        seed_module(&engine, "terraform-azure-subnet-b", &[]);
        seed_module(&engine, "terraform-azure-subnet", &[]);
        assert_eq!(engine.resolve("subnet").unwrap().name, "terraform-azure-subnet");
    }

    #[test]
    fn test_full_text_fallback_and_miss() {
        let (engine, _temp) = create_test_engine();
        let id = seed_module(&engine, "terraform-azure-kv", &[]);
        engine.store().update_readme(id, "Secrets vault for applications").unwrap();

        assert_eq!(engine.resolve("secrets vault").unwrap().name, "terraform-azure-kv");

        let err = engine.resolve("cosmosdb").unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            engine.resolve("  ").unwrap_err(),
            TfmodError::InvalidInput { .. }
        ));
    }
}
