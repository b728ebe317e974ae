//! Values handling with deep merge support

use chartcheck_core::RenderIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::path::Path;

use crate::error::Result;

/// Host path prefixes the platform injects for every app
pub const APPDATA_ROOT: &str = "/olares/rootfs/userspace/appdata";
pub const APPCACHE_ROOT: &str = "/olares/rootfs/userspace/appcache";
pub const USERDATA_ROOT: &str = "/olares/rootfs/userspace/userdata";

/// Values container with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string; an empty document gives empty values
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            return Ok(Self::new());
        }
        Ok(Self(value))
    }

    /// Values every manifest is rendered with
    pub fn for_manifest(identity: &RenderIdentity) -> Self {
        Self(json!({
            "admin": identity.admin,
            "bfl": { "username": identity.owner },
        }))
    }

    /// Values the platform injects when rendering workload templates
    pub fn platform(identity: &RenderIdentity) -> Self {
        let mut values = Self::for_manifest(identity);
        values.merge(&Values(json!({
            "userspace": {
                "appdata": APPDATA_ROOT,
                "appcache": APPCACHE_ROOT,
                "userdata": format!("{}/{}", USERDATA_ROOT, identity.owner),
            },
        })));
        values
    }

    /// Deep merge another Values into this one
    ///
    /// Rules:
    /// - Scalars: overlay replaces base
    /// - Objects: recursive merge
    /// - Arrays: overlay replaces base (not appended)
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .try_fold(&self.0, |current, key| current.as_object()?.get(key))
    }

    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    pub fn into_inner(self) -> JsonValue {
        self.0
    }
}

/// Deep merge two JSON values
fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}
