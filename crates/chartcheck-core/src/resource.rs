//! Rendered workload model and resource budget checks
//!
//! Every check here is exhaustive: all violations are collected into a
//! [`ViolationList`] instead of stopping at the first one.

use std::collections::BTreeMap;

use crate::error::ViolationList;
use crate::manifest::AppSpec;
use crate::quantity::Quantity;

/// Namespace the release is rendered into
pub const RELEASE_NAMESPACE: &str = "app-namespace";

/// Prefix of per-user system namespaces allowed for non-workload objects
pub const SYSTEM_NAMESPACE_PREFIX: &str = "user-system-";

pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";

const FORBIDDEN_RESOURCES: &[&str] = &["nodes", "networkpolicies"];
const FORBIDDEN_VERBS: &[&str] = &["create", "update", "patch", "delete", "deletecollection"];

/// One object produced by rendering the bundle templates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedResource {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub containers: Vec<Container>,
    /// RBAC rules, for Role and ClusterRole
    pub rules: Vec<AccessRule>,
}

impl RenderedResource {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: RELEASE_NAMESPACE.to_string(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Deployment or StatefulSet, the kinds counted against the budget
    pub fn is_budgeted(&self) -> bool {
        matches!(self.kind.as_str(), "Deployment" | "StatefulSet")
    }

    pub fn is_workload(&self) -> bool {
        self.is_budgeted() || self.kind == "DaemonSet"
    }

    pub fn is_role(&self) -> bool {
        matches!(self.kind.as_str(), "Role" | "ClusterRole")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    pub name: String,
    pub requests: BTreeMap<String, Quantity>,
    pub limits: BTreeMap<String, Quantity>,
    /// Mount paths of the container's volume mounts
    pub volume_mounts: Vec<String>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn request(mut self, resource: &str, quantity: Quantity) -> Self {
        self.requests.insert(resource.to_string(), quantity);
        self
    }

    pub fn limit(mut self, resource: &str, quantity: Quantity) -> Self {
        self.limits.insert(resource.to_string(), quantity);
        self
    }

    pub fn mount(mut self, path: impl Into<String>) -> Self {
        self.volume_mounts.push(path.into());
        self
    }

    fn requested(&self, resource: &str) -> f64 {
        self.requests.get(resource).map(Quantity::value).unwrap_or(0.0)
    }

    fn limited(&self, resource: &str) -> f64 {
        self.limits.get(resource).map(Quantity::value).unwrap_or(0.0)
    }
}

/// A single RBAC policy rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRule {
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

#[derive(Default)]
struct Totals {
    requests_cpu: f64,
    requests_memory: f64,
    limits_cpu: f64,
    limits_memory: f64,
}

fn parse_budget(field: &str, raw: &str, violations: &mut ViolationList) -> Option<f64> {
    match Quantity::parse(raw) {
        Ok(q) => Some(q.value()),
        Err(_) => {
            violations.push(format!("spec.{} is not a valid quantity: '{}'", field, raw));
            None
        }
    }
}

/// Compare declared budgets with the containers of rendered workloads
pub fn check_budget(
    spec: &AppSpec,
    resources: &[RenderedResource],
) -> Result<(), ViolationList> {
    let mut violations = ViolationList::new();

    let required_cpu = parse_budget("requiredCpu", &spec.required_cpu, &mut violations);
    let required_memory = parse_budget("requiredMemory", &spec.required_memory, &mut violations);
    let limited_cpu = parse_budget("limitedCpu", &spec.limited_cpu, &mut violations);
    let limited_memory = parse_budget("limitedMemory", &spec.limited_memory, &mut violations);

    if let (Some(required), Some(limited)) = (required_cpu, limited_cpu) {
        if required > limited {
            violations.push("spec.requiredCpu should less than spec.limitedCpu");
        }
    }
    if let (Some(required), Some(limited)) = (required_memory, limited_memory) {
        if required > limited {
            violations.push("spec.requiredMemory should less than spec.limitedMemory");
        }
    }

    let mut totals = Totals::default();

    for resource in resources.iter().filter(|r| r.is_budgeted()) {
        let workload = resource.kind.to_lowercase();
        for c in &resource.containers {
            let at = format!("{}: {}, container: {}", workload, resource.name, c.name);

            for dim in [CPU, MEMORY] {
                let (request, limit) = (c.requested(dim), c.limited(dim));
                if request != 0.0 && limit != 0.0 && request > limit {
                    violations.push(format!(
                        "{} requests.{} must small than limits.{}",
                        at, dim, dim
                    ));
                }
            }

            let checks = [
                (c.requested(MEMORY), "memory request", &mut totals.requests_memory),
                (c.requested(CPU), "cpu request", &mut totals.requests_cpu),
                (c.limited(MEMORY), "memory limit", &mut totals.limits_memory),
                (c.limited(CPU), "cpu limit", &mut totals.limits_cpu),
            ];
            for (value, what, total) in checks {
                if value == 0.0 {
                    violations.push(format!("{} must set {}", at, what));
                } else {
                    *total += value;
                }
            }
        }
    }

    let sums = [
        (totals.limits_cpu, limited_cpu, "limits cpu", "limitedCpu"),
        (totals.limits_memory, limited_memory, "limits memory", "limitedMemory"),
        (totals.requests_cpu, required_cpu, "requests cpu", "requiredCpu"),
        (totals.requests_memory, required_memory, "requests memory", "requiredMemory"),
    ];
    for (sum, declared, what, field) in sums {
        if let Some(declared) = declared {
            if sum > declared {
                violations.push(format!(
                    "sum of all containers resources {} should less than OlaresManifest.yaml spec.{}",
                    what, field
                ));
            }
        }
    }

    violations.into_result()
}

/// Workloads must live in the release namespace, other objects may also use
/// a per-user system namespace
pub fn check_namespaces(resources: &[RenderedResource]) -> Result<(), ViolationList> {
    let mut violations = ViolationList::new();

    for r in resources {
        let allowed = if r.is_workload() {
            r.namespace == RELEASE_NAMESPACE
        } else {
            r.namespace == RELEASE_NAMESPACE || r.namespace.starts_with(SYSTEM_NAMESPACE_PREFIX)
        };
        if !allowed {
            violations.push(format!(
                "illegal namespace: {} for {}, name {}",
                r.namespace, r.kind, r.name
            ));
        }
    }

    violations.into_result()
}

/// Entries of `forbidden` covered by `granted`, where `*` covers everything
fn grants(granted: &[String], forbidden: &[&'static str]) -> Vec<&'static str> {
    if granted.iter().any(|g| g == "*") {
        return forbidden.to_vec();
    }
    forbidden
        .iter()
        .copied()
        .filter(|f| granted.iter().any(|g| g == f))
        .collect()
}

/// Roles must not be able to modify nodes or network policies
pub fn check_rbac(resources: &[RenderedResource]) -> Result<(), ViolationList> {
    let mut violations = ViolationList::new();

    for r in resources.iter().filter(|r| r.is_role()) {
        for rule in &r.rules {
            let targets = grants(&rule.resources, FORBIDDEN_RESOURCES);
            let verbs = grants(&rule.verbs, FORBIDDEN_VERBS);
            if !targets.is_empty() && !verbs.is_empty() {
                violations.push(format!(
                    "{}: {} must not grant [{}] on [{}]",
                    r.kind.to_lowercase(),
                    r.name,
                    verbs.join(", "),
                    targets.join(", ")
                ));
            }
        }
    }

    violations.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    fn spec(required_cpu: &str, limited_cpu: &str) -> AppSpec {
        AppSpec {
            required_cpu: required_cpu.into(),
            limited_cpu: limited_cpu.into(),
            required_memory: "1Gi".into(),
            limited_memory: "2Gi".into(),
            ..Default::default()
        }
    }

    fn container(name: &str, cpu: &str) -> Container {
        Container::new(name)
            .request(CPU, q(cpu))
            .limit(CPU, q(cpu))
            .request(MEMORY, q("128Mi"))
            .limit(MEMORY, q("256Mi"))
    }

    #[test]
    fn test_required_above_limited() {
        let err = check_budget(&spec("500m", "250m"), &[]).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.to_string(), "spec.requiredCpu should less than spec.limitedCpu");

        assert!(check_budget(&spec("250m", "500m"), &[]).is_ok());
    }

    #[test]
    fn test_sum_of_requests_exceeds_budget() {
        let deployment = RenderedResource::new("Deployment", "firefox")
            .with_container(container("app", "1"))
            .with_container(container("sidecar", "1"));

        let err = check_budget(&spec("1", "4"), std::slice::from_ref(&deployment)).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"sum of all containers resources requests cpu should less than OlaresManifest.yaml spec.requiredCpu");

        assert!(check_budget(&spec("3", "4"), &[deployment]).is_ok());
    }

    #[test]
    fn test_missing_values_are_all_reported() {
        let sts = RenderedResource::new("StatefulSet", "db").with_container(Container::new("pg"));
        let err = check_budget(&spec("1", "2"), &[sts]).unwrap_err();
        let messages: Vec<&str> = err.iter().collect();
        assert_eq!(
            messages,
            vec![
                "statefulset: db, container: pg must set memory request",
                "statefulset: db, container: pg must set cpu request",
                "statefulset: db, container: pg must set memory limit",
                "statefulset: db, container: pg must set cpu limit",
            ]
        );
    }

    #[test]
    fn test_request_above_limit() {
        let deployment = RenderedResource::new("Deployment", "web").with_container(
            Container::new("app")
                .request(CPU, q("2"))
                .limit(CPU, q("1"))
                .request(MEMORY, q("128Mi"))
                .limit(MEMORY, q("256Mi")),
        );
        let err = check_budget(&spec("2", "4"), &[deployment]).unwrap_err();
        assert!(
            err.iter()
                .any(|m| m == "deployment: web, container: app requests.cpu must small than limits.cpu")
        );
    }

    #[test]
    fn test_other_kinds_are_not_budgeted() {
        let ds = RenderedResource::new("DaemonSet", "agent").with_container(Container::new("x"));
        assert!(check_budget(&spec("1", "2"), &[ds]).is_ok());
    }

    #[test]
    fn test_unparsable_budget() {
        let err = check_budget(&spec("lots", "2"), &[]).unwrap_err();
        assert_eq!(err.to_string(), "spec.requiredCpu is not a valid quantity: 'lots'");
    }

    #[test]
    fn test_namespaces() {
        let ok = vec![
            RenderedResource::new("Deployment", "web"),
            RenderedResource::new("ConfigMap", "cfg").with_namespace("user-system-alice"),
        ];
        assert!(check_namespaces(&ok).is_ok());

        let bad = vec![
            RenderedResource::new("Deployment", "web").with_namespace("user-system-alice"),
            RenderedResource::new("Service", "svc").with_namespace("default"),
        ];
        let err = check_namespaces(&bad).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"[illegal namespace: user-system-alice for Deployment, name web, illegal namespace: default for Service, name svc]");
    }

    #[test]
    fn test_rbac() {
        let read_only = RenderedResource::new("ClusterRole", "viewer").with_rule(AccessRule {
            api_groups: vec!["".into()],
            resources: vec!["nodes".into()],
            verbs: vec!["get".into(), "list".into()],
        });
        assert!(check_rbac(&[read_only]).is_ok());

        let writer = RenderedResource::new("Role", "netadmin").with_rule(AccessRule {
            api_groups: vec!["networking.k8s.io".into()],
            resources: vec!["networkpolicies".into(), "pods".into()],
            verbs: vec!["get".into(), "delete".into()],
        });
        let err = check_rbac(&[writer]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "role: netadmin must not grant [delete] on [networkpolicies]"
        );

        let wildcard = RenderedResource::new("ClusterRole", "admin").with_rule(AccessRule {
            api_groups: vec!["*".into()],
            resources: vec!["*".into()],
            verbs: vec!["*".into()],
        });
        assert!(check_rbac(&[wildcard]).is_err());
    }
}
