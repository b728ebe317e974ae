//! Reduce rendered YAML documents to the resource model the checks consume

use chartcheck_core::{AccessRule, Container, Quantity, RenderedResource};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Container as PodContainer, PodTemplateSpec};
use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule, Role};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{EngineError, Result};

/// Split one rendered template into objects
///
/// Objects without a namespace land in `default_namespace`.
pub fn parse_documents(
    template: &str,
    rendered: &str,
    default_namespace: &str,
) -> Result<Vec<RenderedResource>> {
    let mut resources = Vec::new();

    for document in serde_yaml::Deserializer::from_str(rendered) {
        let mut doc = JsonValue::deserialize(document)?;
        if doc.is_null() {
            continue;
        }

        stringify_quantities(&mut doc);
        let kind = doc.get("kind").and_then(JsonValue::as_str).unwrap_or_default();
        if kind.is_empty() {
            tracing::debug!(template, "skipping document without kind");
            continue;
        }

        let metadata = doc.get("metadata");
        let field = |key: &str| {
            metadata
                .and_then(|m| m.get(key))
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let namespace = match field("namespace") {
            ns if ns.is_empty() => default_namespace.to_string(),
            ns => ns,
        };

        let mut resource = RenderedResource::new(kind, field("name")).with_namespace(namespace);
        let invalid = |e: serde_json::Error| EngineError::InvalidObject {
            template: template.to_string(),
            kind: kind.to_string(),
            message: e.to_string(),
        };

        match kind {
            "Deployment" => {
                let obj: Deployment = serde_json::from_value(doc.clone()).map_err(invalid)?;
                let pod = obj.spec.map(|s| s.template);
                resource.containers = containers(template, kind, pod.as_ref())?;
            }
            "StatefulSet" => {
                let obj: StatefulSet = serde_json::from_value(doc.clone()).map_err(invalid)?;
                let pod = obj.spec.map(|s| s.template);
                resource.containers = containers(template, kind, pod.as_ref())?;
            }
            "DaemonSet" => {
                let obj: DaemonSet = serde_json::from_value(doc.clone()).map_err(invalid)?;
                let pod = obj.spec.map(|s| s.template);
                resource.containers = containers(template, kind, pod.as_ref())?;
            }
            "Role" => {
                let obj: Role = serde_json::from_value(doc.clone()).map_err(invalid)?;
                resource.rules = access_rules(obj.rules);
            }
            "ClusterRole" => {
                let obj: ClusterRole = serde_json::from_value(doc.clone()).map_err(invalid)?;
                resource.rules = access_rules(obj.rules);
            }
            _ => {}
        }

        resources.push(resource);
    }

    Ok(resources)
}

/// Quantities written as bare YAML numbers (`cpu: 1`) become strings
fn stringify_quantities(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            for key in ["requests", "limits"] {
                if let Some(JsonValue::Object(quantities)) = map.get_mut(key) {
                    for q in quantities.values_mut() {
                        if q.is_number() {
                            *q = JsonValue::String(q.to_string());
                        }
                    }
                }
            }
            map.values_mut().for_each(stringify_quantities);
        }
        JsonValue::Array(items) => items.iter_mut().for_each(stringify_quantities),
        _ => {}
    }
}

fn containers(
    template: &str,
    kind: &str,
    pod: Option<&PodTemplateSpec>,
) -> Result<Vec<Container>> {
    let Some(spec) = pod.and_then(|p| p.spec.as_ref()) else {
        return Ok(Vec::new());
    };
    spec.containers
        .iter()
        .map(|c| container(template, kind, c))
        .collect()
}

fn container(template: &str, kind: &str, c: &PodContainer) -> Result<Container> {
    let mut out = Container::new(c.name.clone());

    if let Some(resources) = &c.resources {
        for (target, source) in [
            (&mut out.requests, &resources.requests),
            (&mut out.limits, &resources.limits),
        ] {
            for (name, quantity) in source.iter().flatten() {
                let parsed = Quantity::parse(&quantity.0).map_err(|e| EngineError::InvalidObject {
                    template: template.to_string(),
                    kind: kind.to_string(),
                    message: format!("container {}: {}", c.name, e),
                })?;
                target.insert(name.clone(), parsed);
            }
        }
    }

    out.volume_mounts = c
        .volume_mounts
        .iter()
        .flatten()
        .map(|m| m.mount_path.clone())
        .collect();

    Ok(out)
}

fn access_rules(rules: Option<Vec<PolicyRule>>) -> Vec<AccessRule> {
    rules
        .unwrap_or_default()
        .into_iter()
        .map(|r| AccessRule {
            api_groups: r.api_groups.unwrap_or_default(),
            resources: r.resources.unwrap_or_default(),
            verbs: r.verbs,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartcheck_core::RELEASE_NAMESPACE;

    const WORKLOADS: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: firefox
spec:
  selector:
    matchLabels:
      app: firefox
  template:
    metadata:
      labels:
        app: firefox
    spec:
      containers:
      - name: firefox
        image: linuxserver/firefox:1.0
        resources:
          requests:
            cpu: 500m
            memory: 256Mi
          limits:
            cpu: "1"
            memory: 1Gi
        volumeMounts:
        - name: data
          mountPath: /data
---
# comment only
---
apiVersion: v1
kind: Service
metadata:
  name: firefox-svc
  namespace: user-system-alice
spec:
  ports:
  - port: 3000
"#;

    #[test]
    fn test_parse_workloads() {
        let resources = parse_documents("deployment.yaml", WORKLOADS, RELEASE_NAMESPACE).unwrap();
        assert_eq!(resources.len(), 2);

        let deployment = &resources[0];
        assert_eq!(deployment.kind, "Deployment");
        assert_eq!(deployment.namespace, RELEASE_NAMESPACE);
        assert_eq!(deployment.containers.len(), 1);

        let c = &deployment.containers[0];
        assert_eq!(c.requests["cpu"].value(), 0.5);
        assert_eq!(c.limits["memory"].as_str(), "1Gi");
        assert_eq!(c.volume_mounts, vec!["/data"]);

        assert_eq!(resources[1].kind, "Service");
        assert_eq!(resources[1].namespace, "user-system-alice");
        assert!(resources[1].containers.is_empty());
    }

    #[test]
    fn test_parse_roles() {
        let yaml = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: firefox-nodes
rules:
- apiGroups: [""]
  resources: ["nodes"]
  verbs: ["get", "patch"]
"#;
        let resources = parse_documents("rbac.yaml", yaml, RELEASE_NAMESPACE).unwrap();
        assert_eq!(resources[0].rules.len(), 1);
        assert_eq!(resources[0].rules[0].verbs, vec!["get", "patch"]);
        assert_eq!(resources[0].rules[0].resources, vec!["nodes"]);
    }

    #[test]
    fn test_bad_quantity_is_reported() {
        let yaml = r#"
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: db
spec:
  serviceName: db
  selector:
    matchLabels:
      app: db
  template:
    spec:
      containers:
      - name: pg
        resources:
          requests:
            cpu: lots
"#;
        let err = parse_documents("sts.yaml", yaml, RELEASE_NAMESPACE).unwrap_err();
        assert!(err.to_string().starts_with("invalid StatefulSet in sts.yaml: container pg"));
    }

    #[test]
    fn test_numeric_quantities() {
        let yaml = WORKLOADS.replace("cpu: \"1\"", "cpu: 2");
        let resources = parse_documents("deployment.yaml", &yaml, RELEASE_NAMESPACE).unwrap();
        assert_eq!(resources[0].containers[0].limits["cpu"].value(), 2.0);
    }

    #[test]
    fn test_documents_without_kind_are_skipped() {
        let resources = parse_documents("x.yaml", "foo: bar\n---\n", RELEASE_NAMESPACE).unwrap();
        assert!(resources.is_empty());
    }
}
