//! Application manifest (`OlaresManifest.yaml`) model

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// File name of the manifest inside a bundle
pub const MANIFEST_FILE: &str = "OlaresManifest.yaml";

/// The parsed application manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    #[serde(rename = "olaresManifest.version")]
    pub config_version: String,

    #[serde(rename = "olaresManifest.type")]
    pub config_type: String,

    pub metadata: AppMetadata,

    pub entrances: Vec<Entrance>,

    pub ports: Vec<ServicePort>,

    pub spec: AppSpec,

    pub permission: Permission,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub middleware: Option<Middleware>,

    pub options: Options,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provider: Vec<Provider>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<AppEnvVar>,
}

impl Manifest {
    /// Parse an already-rendered manifest
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            CoreError::format(format!("failed to parse {}: {}", MANIFEST_FILE, e))
        })
    }

    /// Read and parse a manifest file without rendering placeholders
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// JSON view used by the field schema walker
    pub fn to_json(&self) -> Result<JsonValue> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::format(format!("failed to encode manifest: {}", e)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    pub name: String,
    pub icon: String,
    pub description: String,
    pub appid: String,
    pub title: String,
    pub version: String,
    pub categories: Vec<String>,
    pub target: String,
}

/// An externally reachable endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Entrance {
    pub name: String,
    pub host: String,
    pub port: i32,
    pub icon: String,
    pub title: String,
    pub auth_level: String,
    pub invisible: bool,
    pub open_method: String,
    pub window_push_state: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServicePort {
    pub name: String,
    pub host: String,
    pub port: i32,
    pub expose_port: i32,
    pub protocol: String,
    pub add_to_tailscale_acl: bool,
}

/// Resource budget and store presentation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSpec {
    pub version_name: String,
    pub full_description: String,
    pub upgrade_description: String,
    pub promote_image: Vec<String>,
    pub promote_video: String,
    pub sub_category: String,
    pub developer: String,
    pub required_memory: String,
    pub required_disk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_client: Option<SupportClient>,
    pub support_arch: Vec<String>,
    #[serde(rename = "requiredGpu")]
    pub required_gpu: String,
    #[serde(rename = "requiredCpu")]
    pub required_cpu: String,
    pub limited_memory: String,
    #[serde(rename = "limitedCpu")]
    pub limited_cpu: String,
    pub run_as_user: bool,
    pub language: Vec<String>,
    pub submitter: String,
    pub doc: String,
    pub website: String,
    #[serde(rename = "featuredImage")]
    pub featured_image: String,
    pub source_code: String,
    pub license: Vec<TextAndUrl>,
    pub legal: Vec<TextAndUrl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextAndUrl {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportClient {
    pub edge: String,
    pub android: String,
    pub ios: String,
    pub windows: String,
    pub mac: String,
    pub linux: String,
}

/// Shared data access grants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Permission {
    pub app_data: bool,
    pub app_cache: bool,
    pub user_data: Vec<String>,
    pub provider: Vec<ProviderPermission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    /// Pre-provider permission shape, still accepted on input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_data: Option<Vec<SysDataPermission>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderPermission {
    pub app_name: String,
    pub namespace: String,
    pub provider_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SysDataPermission {
    pub group: String,
    pub data_type: String,
    pub version: String,
    pub ops: Vec<String>,
}

/// Middleware backends requested by the application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Middleware {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<DatabaseConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mongodb: Option<DatabaseConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mysql: Option<DatabaseConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mariadb: Option<DatabaseConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minio: Option<NamedBackendConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rabbitmq: Option<NamedBackendConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<NamedBackendConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argo: Option<ArgoConfig>,
}

/// Postgres, MongoDB, MySQL and MariaDB share this shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub databases: Vec<Database>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub name: String,
    pub distributed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub namespace: String,
}

/// Minio buckets, RabbitMQ vhosts, Elasticsearch indexes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedBackendConfig {
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(alias = "buckets", alias = "vhosts", alias = "indexes")]
    pub items: Vec<NamedItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedItem {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgoConfig {
    pub required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub mobile_supported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<Policy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Toggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_cookie: Option<Toggle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Dependency>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_scope: Option<AppScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_config: Option<WsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<Upload>,
    pub oidc: Oidc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_timeout: Option<i64>,
    pub allowed_outbound_ports: Vec<u16>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Policy {
    pub description: String,
    pub uri_regex: String,
    pub level: String,
    pub one_time: bool,
    #[serde(rename = "validDuration")]
    pub duration: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    pub enabled: bool,
}

/// Another application or system component this one depends on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    /// `system` or `application`
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppScope {
    pub cluster_scoped: bool,
    pub app_ref: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    pub port: i32,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Upload {
    pub file_type: Vec<String>,
    pub dest: String,
    pub limited_size: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Oidc {
    pub enabled: bool,
    pub redirect_uri: String,
    pub entrance_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub name: String,
    pub entrance: String,
    pub paths: Vec<String>,
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppEnvVar {
    pub env_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default: String,
    pub editable: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX: &str = r#"
olaresManifest.version: '0.8.0'
olaresManifest.type: app
metadata:
  name: firefox
  icon: https://example.com/firefox.png
  description: Web browser
  appid: firefox
  title: Firefox
  version: '1.0.10'
  categories:
  - Utilities
entrances:
- name: firefox
  port: 3000
  host: firefox
  title: Firefox
  authLevel: private
spec:
  requiredMemory: 256Mi
  limitedMemory: 1Gi
  requiredDisk: 50Mi
  requiredCpu: 100m
  limitedCpu: '1'
  supportArch:
  - amd64
  - arm64
permission:
  appData: true
options:
  upload:
    dest: /data
    limitedSize: 1024
"#;

    #[test]
    fn test_manifest_deserialize() {
        let manifest = Manifest::from_yaml(FIREFOX).unwrap();
        assert_eq!(manifest.config_version, "0.8.0");
        assert_eq!(manifest.metadata.name, "firefox");
        assert_eq!(manifest.entrances.len(), 1);
        assert_eq!(manifest.entrances[0].auth_level, "private");
        assert_eq!(manifest.spec.required_cpu, "100m");
        assert_eq!(manifest.spec.support_arch, vec!["amd64", "arm64"]);
        assert!(manifest.permission.app_data);
        assert_eq!(manifest.options.upload.as_ref().unwrap().dest, "/data");
        assert!(manifest.middleware.is_none());
    }

    #[test]
    fn test_manifest_defaults_for_missing_fields() {
        let manifest = Manifest::from_yaml("metadata:\n  name: x\n").unwrap();
        assert!(manifest.config_version.is_empty());
        assert!(manifest.entrances.is_empty());
        assert!(!manifest.permission.app_data);
        assert!(manifest.options.dependencies.is_none());
    }

    #[test]
    fn test_manifest_json_view_skips_absent_sections() {
        let manifest = Manifest::from_yaml(FIREFOX).unwrap();
        let json = manifest.to_json().unwrap();
        assert_eq!(json["olaresManifest.version"], "0.8.0");
        assert_eq!(json["spec"]["requiredCpu"], "100m");
        assert!(json.get("middleware").is_none());
        assert!(json["options"].get("policies").is_none());
    }

    #[test]
    fn test_middleware_named_items_aliases() {
        let yaml = r#"
middleware:
  minio:
    username: u
    buckets:
    - name: photos
  postgres:
    username: pg
    databases:
    - name: app
"#;
        let manifest = Manifest::from_yaml(yaml).unwrap();
        let middleware = manifest.middleware.unwrap();
        assert_eq!(middleware.minio.unwrap().items[0].name, "photos");
        assert_eq!(middleware.postgres.unwrap().databases[0].name, "app");
    }

    #[test]
    fn test_manifest_parse_error_is_format_error() {
        let err = Manifest::from_yaml("entrances: {not: [a list").unwrap_err();
        assert!(matches!(err, CoreError::Format { .. }));
    }
}
