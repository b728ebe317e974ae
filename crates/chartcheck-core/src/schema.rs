//! Field constraint validation for manifests
//!
//! Constraints are an explicit schema: each [`FieldRule`] names a field path
//! and an ordered list of [`Check`]s. Paths use `.` between keys, `[*]` to
//! visit every element of a list, and single quotes around keys that contain
//! dots (`'olaresManifest.version'`).
//!
//! Validation is fail-fast. Rules run in declaration order, list elements in
//! index order, and the first failing check is reported with its concrete
//! path (e.g. `entrances[1].host`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::{FieldViolation, Result};
use crate::manifest::Manifest;
use crate::quantity::QUANTITY_PATTERN;

static QUANTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(QUANTITY_PATTERN).expect("quantity pattern is valid"));
static ENTRANCE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9A-Z-]*)$").expect("entrance name pattern is valid"));
static ENTRANCE_HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]([-a-z0-9]*[a-z0-9]))$").expect("entrance host pattern is valid")
});
static ENTRANCE_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z0-9A-Z-\s]*)$").expect("entrance title pattern is valid"));
static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:[-+]?\d+(?:\.\d+)?([smhdwy]|us|ns|ms))+)$").expect("duration pattern is valid")
});

/// Manifest types accepted by the marketplace
pub const MANIFEST_TYPES: &[&str] = &["app", "recommend", "middleware", "model"];

/// Dependency kinds accepted in `options.dependencies`
pub const DEPENDENCY_TYPES: &[&str] = &["system", "application"];

/// A single predicate applied to a field value
#[derive(Debug, Clone)]
pub enum Check {
    /// `len($)>0`
    NonEmpty,
    /// `len($)>=min && len($)<=max`
    Len { min: usize, max: usize },
    /// `len($)<=max`
    MaxLen(usize),
    /// `$>0`
    Positive,
    /// `regexp(pattern)`
    Pattern(Regex),
    /// Kubernetes quantity grammar
    Quantity,
    /// `$=='a' || $=='b'`
    OneOf(&'static [&'static str]),
    /// Passes on an empty value, otherwise defers to the inner check
    Optional(Box<Check>),
}

impl Check {
    pub fn optional(inner: Check) -> Self {
        Check::Optional(Box::new(inner))
    }

    fn passes(&self, value: &JsonValue) -> bool {
        match self {
            Check::NonEmpty => value_len(value).is_some_and(|len| len > 0),
            Check::Len { min, max } => {
                value_len(value).is_some_and(|len| len >= *min && len <= *max)
            }
            Check::MaxLen(max) => value_len(value).is_some_and(|len| len <= *max),
            Check::Positive => value.as_f64().is_some_and(|n| n > 0.0),
            Check::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Check::Quantity => value.as_str().is_some_and(|s| QUANTITY_RE.is_match(s)),
            Check::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
            Check::Optional(inner) => value_len(value) == Some(0) || inner.passes(value),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::NonEmpty => write!(f, "len($)>0"),
            Check::Len { min: 1, max } => write!(f, "len($)>0 && len($)<={}", max),
            Check::Len { min, max } => write!(f, "len($)>={} && len($)<={}", min, max),
            Check::MaxLen(max) => write!(f, "len($)<={}", max),
            Check::Positive => write!(f, "$>0"),
            Check::Pattern(re) => write!(f, "regexp({})", re.as_str()),
            Check::Quantity => write!(f, "regexp({})", QUANTITY_PATTERN),
            Check::OneOf(allowed) => {
                let alternatives: Vec<String> =
                    allowed.iter().map(|a| format!("$=={}", a)).collect();
                write!(f, "{}", alternatives.join(" || "))
            }
            Check::Optional(inner) => write!(f, "len($)==0 || {}", inner),
        }
    }
}

/// Length in the sense of the constraint language: bytes, items or keys
fn value_len(value: &JsonValue) -> Option<usize> {
    match value {
        JsonValue::String(s) => Some(s.len()),
        JsonValue::Array(a) => Some(a.len()),
        JsonValue::Object(o) => Some(o.len()),
        JsonValue::Null => Some(0),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Each,
}

/// Constraints attached to one field path
#[derive(Debug, Clone)]
pub struct FieldRule {
    path: String,
    segments: Vec<Segment>,
    checks: Vec<Check>,
}

impl FieldRule {
    pub fn new(path: &str, checks: impl IntoIterator<Item = Check>) -> Self {
        Self {
            path: path.to_string(),
            segments: parse_path(path),
            checks: checks.into_iter().collect(),
        }
    }

    /// The declared (wildcard) path
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }
}

fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = path;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("[*]") {
            segments.push(Segment::Each);
            rest = after;
        } else if let Some(after) = rest.strip_prefix('.') {
            rest = after;
        } else if let Some(after) = rest.strip_prefix('\'') {
            let end = after.find('\'').unwrap_or(after.len());
            segments.push(Segment::Key(after[..end].to_string()));
            rest = after.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            segments.push(Segment::Key(rest[..end].to_string()));
            rest = &rest[end..];
        }
    }

    segments
}

/// Collect every concrete `(path, value)` a rule applies to
///
/// Missing keys and null values end the walk: absent optional sections are
/// not validated.
fn resolve<'a>(
    value: &'a JsonValue,
    segments: &[Segment],
    prefix: String,
    out: &mut Vec<(String, &'a JsonValue)>,
) {
    let Some((head, tail)) = segments.split_first() else {
        out.push((prefix, value));
        return;
    };

    match head {
        Segment::Key(key) => {
            let Some(next) = value.get(key.as_str()) else {
                return;
            };
            if next.is_null() {
                return;
            }
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            resolve(next, tail, path, out);
        }
        Segment::Each => {
            let Some(items) = value.as_array() else {
                return;
            };
            for (idx, item) in items.iter().enumerate() {
                resolve(item, tail, format!("{}[{}]", prefix, idx), out);
            }
        }
    }
}

/// Builds the human-readable message for a failed check
pub trait MessageFormatter: Send + Sync {
    fn format(&self, path: &str, value: &JsonValue, check: &Check) -> String;
}

/// `invalid parameter: <value>;<field> must satisfy the expr: <expr>`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl MessageFormatter for DefaultFormatter {
    fn format(&self, path: &str, value: &JsonValue, check: &Check) -> String {
        let field = path
            .rsplit('.')
            .next()
            .unwrap_or(path)
            .trim_end_matches(|c: char| c == ']' || c.is_ascii_digit() || c == '[');
        format!(
            "invalid parameter: {};{} must satisfy the expr: {}",
            display_value(value),
            if field.is_empty() { path } else { field },
            check
        )
    }
}

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Schema-driven, fail-fast field validator
pub struct FieldValidator {
    rules: Vec<FieldRule>,
    formatter: Box<dyn MessageFormatter>,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldValidator {
    /// Validator for the manifest schema with the default message format
    pub fn new() -> Self {
        Self::with_formatter(DefaultFormatter)
    }

    /// Validator for the manifest schema with a caller-supplied message format
    pub fn with_formatter(formatter: impl MessageFormatter + 'static) -> Self {
        Self::from_rules(manifest_rules(), formatter)
    }

    pub fn from_rules(rules: Vec<FieldRule>, formatter: impl MessageFormatter + 'static) -> Self {
        Self {
            rules,
            formatter: Box::new(formatter),
        }
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Validate a parsed manifest
    pub fn validate(&self, manifest: &Manifest) -> Result<()> {
        let json = manifest.to_json()?;
        self.validate_value(&json)?;
        Ok(())
    }

    /// Validate an arbitrary JSON document against the rules
    pub fn validate_value(&self, document: &JsonValue) -> std::result::Result<(), FieldViolation> {
        for rule in &self.rules {
            let mut targets = Vec::new();
            resolve(document, &rule.segments, String::new(), &mut targets);

            for (path, value) in targets {
                if let Some(check) = rule.checks.iter().find(|c| !c.passes(value)) {
                    return Err(FieldViolation {
                        message: self.formatter.format(&path, value, check),
                        path,
                    });
                }
            }
        }
        Ok(())
    }
}

/// The manifest schema, in evaluation order
pub fn manifest_rules() -> Vec<FieldRule> {
    use Check::*;

    let name_len = || Len { min: 1, max: 30 };

    vec![
        FieldRule::new("'olaresManifest.version'", [NonEmpty]),
        FieldRule::new("'olaresManifest.type'", [Check::optional(OneOf(MANIFEST_TYPES))]),
        FieldRule::new("metadata.name", [name_len()]),
        FieldRule::new("metadata.icon", [NonEmpty]),
        FieldRule::new("metadata.description", [NonEmpty]),
        FieldRule::new("metadata.title", [name_len()]),
        FieldRule::new("metadata.version", [NonEmpty]),
        FieldRule::new("entrances", [Len { min: 1, max: 10 }]),
        FieldRule::new(
            "entrances[*].name",
            [Pattern(ENTRANCE_NAME_RE.clone()), MaxLen(63)],
        ),
        FieldRule::new(
            "entrances[*].host",
            [Pattern(ENTRANCE_HOST_RE.clone()), MaxLen(63)],
        ),
        FieldRule::new("entrances[*].port", [Positive]),
        FieldRule::new(
            "entrances[*].title",
            [name_len(), Pattern(ENTRANCE_TITLE_RE.clone())],
        ),
        FieldRule::new("spec.requiredMemory", [Quantity]),
        FieldRule::new("spec.requiredDisk", [Quantity]),
        FieldRule::new("spec.requiredGpu", [Check::optional(Quantity)]),
        FieldRule::new("spec.requiredCpu", [Quantity]),
        FieldRule::new("spec.limitedMemory", [Quantity]),
        FieldRule::new("spec.limitedCpu", [Quantity]),
        FieldRule::new("middleware.postgres.username", [NonEmpty]),
        FieldRule::new("middleware.postgres.databases", [NonEmpty]),
        FieldRule::new("middleware.postgres.databases[*].name", [NonEmpty]),
        FieldRule::new("middleware.redis.namespace", [NonEmpty]),
        FieldRule::new("middleware.mongodb.username", [NonEmpty]),
        FieldRule::new("middleware.mongodb.databases", [NonEmpty]),
        FieldRule::new("middleware.mongodb.databases[*].name", [NonEmpty]),
        FieldRule::new("middleware.mysql.databases[*].name", [NonEmpty]),
        FieldRule::new("middleware.mariadb.databases[*].name", [NonEmpty]),
        FieldRule::new("permission.sysData[*].group", [NonEmpty]),
        FieldRule::new("permission.sysData[*].dataType", [NonEmpty]),
        FieldRule::new("permission.sysData[*].version", [NonEmpty]),
        FieldRule::new("permission.sysData[*].ops", [NonEmpty]),
        FieldRule::new("options.policies[*].uriRegex", [NonEmpty]),
        FieldRule::new("options.policies[*].level", [NonEmpty]),
        FieldRule::new(
            "options.policies[*].validDuration",
            [Check::optional(Pattern(DURATION_RE.clone()))],
        ),
        FieldRule::new("options.dependencies[*].name", [NonEmpty]),
        FieldRule::new("options.dependencies[*].version", [NonEmpty]),
        FieldRule::new("options.dependencies[*].type", [OneOf(DEPENDENCY_TYPES)]),
    ]
}
