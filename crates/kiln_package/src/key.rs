//! Cache key derivation for target nodes.

use std::collections::BTreeMap;

use kiln_cache::{CacheError, CacheKey, Keyed, SourceHasher};

use crate::model::ModuleKind;
use crate::targets::TargetNode;

impl Keyed for TargetNode {
    fn identity(&self) -> String {
        self.id.to_string()
    }

    fn cache_key(&self, dependencies: &BTreeMap<String, String>) -> Result<CacheKey, CacheError> {
        let inputs = self.target.module.inputs(&self.target.name);
        let mut key = CacheKey::new(self.identity(), self.target.module.name());
        key.inputs = SourceHasher::hash_inputs(&self.package_root, &inputs)?;
        key.dependencies = dependencies.clone();

        let context = &self.context;
        key = key
            .with_attribute("package.location", &self.id.package.location)
            .with_attribute("role", self.target.role.as_str())
            .with_attribute("platform", context.platform.as_str())
            .with_attribute("configuration", &context.configuration)
            .with_attribute("toolchain", &context.toolchain);
        if let Some(version) = &self.package_version {
            key = key.with_attribute("package.version", version);
        }
        if let ModuleKind::Foreign { language, .. } = &self.target.module {
            key = key.with_attribute("language", language);
        }
        for (name, value) in &context.settings {
            key = key.with_attribute(format!("setting.{name}"), value);
        }
        Ok(key)
    }
}
