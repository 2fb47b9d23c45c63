//! Configured target sites, looked up by logical id
//!
//! The registry is built once from configuration and is read-only afterwards.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use charon_api::TargetDescriptor;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Known targets in configuration order
///
/// # Example
///
/// ```
/// use charon::registry::TargetRegistry;
/// use charon_api::TargetDescriptor;
///
/// let registry = TargetRegistry::new(vec![
///     TargetDescriptor::new("500", "vista-500.example.org", 18500, "605"),
/// ]);
///
/// assert!(registry.resolve(&["500".to_string()]).is_ok());
/// assert!(registry.resolve(&["999".to_string()]).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Vec<TargetDescriptor>,
    index: HashMap<String, usize>,
}

impl TargetRegistry {
    /// Build a registry; a later duplicate id replaces the earlier descriptor
    pub fn new(targets: Vec<TargetDescriptor>) -> Self {
        let mut registry = Self::default();
        for target in targets {
            registry.insert(target);
        }
        registry
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.descriptors())
    }

    fn insert(&mut self, target: TargetDescriptor) {
        match self.index.get(&target.target_id) {
            Some(&slot) => self.targets[slot] = target,
            None => {
                self.index.insert(target.target_id.clone(), self.targets.len());
                self.targets.push(target);
            }
        }
    }

    pub fn get(&self, target_id: &str) -> Option<&TargetDescriptor> {
        self.index.get(target_id).map(|&slot| &self.targets[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetDescriptor> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Look up every requested id, in request order
    ///
    /// Repeated ids are kept once, at their first position, so a request can
    /// never yield two results for one target.
    ///
    /// # Errors
    ///
    /// `UnknownTarget` listing every id that is not configured. Nothing is
    /// resolved in that case.
    pub fn resolve(&self, include: &[String]) -> Result<Vec<TargetDescriptor>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(include.len());
        let mut unknown = Vec::new();

        for id in include {
            if !seen.insert(id.as_str()) {
                debug!("Ignoring repeated target {}", id);
                continue;
            }
            match self.get(id) {
                Some(target) => resolved.push(target.clone()),
                None => unknown.push(id.clone()),
            }
        }

        if unknown.is_empty() {
            Ok(resolved)
        } else {
            Err(GatewayError::UnknownTarget(unknown))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TargetRegistry {
        TargetRegistry::new(vec![
            TargetDescriptor::new("500", "vista-500", 18500, "605"),
            TargetDescriptor::new("600", "vista-600", 18600, "605"),
            TargetDescriptor::new("700", "vista-700", 18700, "605"),
        ])
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_resolve_keeps_request_order() {
        let resolved = registry().resolve(&ids(&["700", "500"])).unwrap();
        let got: Vec<&str> = resolved.iter().map(|t| t.target_id.as_str()).collect();
        assert_eq!(got, vec!["700", "500"]);
    }

    #[test]
    fn test_resolve_drops_repeats() {
        let resolved = registry().resolve(&ids(&["500", "600", "500"])).unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_unknown_ids_are_all_reported() {
        let err = registry().resolve(&ids(&["500", "998", "999"])).unwrap_err();
        match err {
            GatewayError::UnknownTarget(unknown) => assert_eq!(unknown, ids(&["998", "999"])),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_include() {
        assert!(registry().resolve(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_later_duplicate_replaces_earlier() {
        let registry = TargetRegistry::new(vec![
            TargetDescriptor::new("500", "old-host", 1, "605"),
            TargetDescriptor::new("500", "new-host", 2, "605"),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("500").map(|t| t.host.as_str()),
            Some("new-host")
        );
    }
}
