//! Extraction of `x-permit-*` annotations into typed per-path instructions.
//!
//! Extraction never fails: malformed annotations are dropped and reported as
//! warnings so the rest of the document can still be reconciled.

use crate::document::{HttpMethod, OpenApiDocument, Operation, PathItem};
use serde_json::{Map, Value};

pub const X_PERMIT_RESOURCE: &str = "x-permit-resource";
pub const X_PERMIT_ACTION: &str = "x-permit-action";
pub const X_PERMIT_ROLE: &str = "x-permit-role";
pub const X_PERMIT_RESOURCE_ROLE: &str = "x-permit-resource-role";
pub const X_PERMIT_RELATION: &str = "x-permit-relation";
pub const X_PERMIT_DERIVED_ROLE: &str = "x-permit-derived-role";

/// Turn a display name into a Permit key.
///
/// ASCII alphanumerics are lowercased, `-` and `_` are kept and every other
/// character becomes `_`. The output only contains characters that map to
/// themselves, so applying it twice changes nothing.
pub fn sanitize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
            '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// A role named by `x-permit-role` or `x-permit-resource-role`
#[derive(Debug, Clone, PartialEq)]
pub struct RoleSpec {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

/// A relation named by `x-permit-relation`
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSpec {
    pub key: String,
    pub name: String,
    pub subject_resource: String,
    pub object_resource: String,
}

/// A derived role named by `x-permit-derived-role`
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRoleSpec {
    pub base_role: String,
    pub derived_role: String,
    pub relation: String,
    /// Resource the base role is held on; defaults to the relation's subject
    pub base_resource: Option<String>,
    /// Resource the derived role is granted on
    pub resource: String,
}

/// Everything the processors need from one annotated operation
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedOperation {
    pub method: HttpMethod,
    /// `x-permit-action`, else the lowercase method
    pub action: String,
    pub description: String,
    pub role: Option<RoleSpec>,
    pub resource_role: Option<RoleSpec>,
    pub relation: Option<RelationSpec>,
    pub derived_role: Option<DerivedRoleSpec>,
}

/// A path item carrying `x-permit-resource`
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedPath {
    pub path: String,
    pub resource_name: String,
    pub resource_key: String,
    pub operations: Vec<AnnotatedOperation>,
}

/// Result of walking a whole document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub paths: Vec<AnnotatedPath>,
    pub warnings: Vec<String>,
}

/// Walk the document and collect every annotated path, in document order
pub fn extract(document: &OpenApiDocument) -> Extraction {
    let mut extraction = Extraction::default();

    for item in &document.paths {
        if let Some(path) = extract_path(item, &mut extraction.warnings) {
            extraction.paths.push(path);
        }
    }

    extraction
}

fn extract_path(item: &PathItem, warnings: &mut Vec<String>) -> Option<AnnotatedPath> {
    let raw = item.extension(X_PERMIT_RESOURCE)?;

    let resource_name = match raw.as_str().map(str::trim) {
        Some(name) if !sanitize_key(name).is_empty() => name.to_string(),
        _ => {
            warnings.push(format!(
                "Ignoring {} on {}: expected a non-empty string",
                X_PERMIT_RESOURCE, item.path
            ));
            return None;
        }
    };
    let resource_key = sanitize_key(&resource_name);

    let operations = item
        .operations
        .iter()
        .map(|operation| extract_operation(item, operation, &resource_key, warnings))
        .collect();

    Some(AnnotatedPath {
        path: item.path.clone(),
        resource_name,
        resource_key,
        operations,
    })
}

fn extract_operation(
    item: &PathItem,
    operation: &Operation,
    resource_key: &str,
    warnings: &mut Vec<String>,
) -> AnnotatedOperation {
    let location = format!("{} {}", operation.method, item.path);

    let action = match operation.extension(X_PERMIT_ACTION) {
        None => operation.method.as_str().to_string(),
        Some(Value::String(action)) if !action.trim().is_empty() => action.trim().to_string(),
        Some(_) => {
            warnings.push(format!(
                "Ignoring {} on {}: expected a non-empty string, using '{}'",
                X_PERMIT_ACTION,
                location,
                operation.method.as_str()
            ));
            operation.method.as_str().to_string()
        }
    };

    let description = operation
        .summary
        .clone()
        .or_else(|| operation.description.clone())
        .unwrap_or_else(|| location.clone());

    // Operation-level annotations win over the path-level ones
    let lookup = |name: &str| operation.extension(name).or_else(|| item.extension(name));

    let role = lookup(X_PERMIT_ROLE)
        .and_then(|value| parse_role(value, X_PERMIT_ROLE, &location, warnings));
    let resource_role = lookup(X_PERMIT_RESOURCE_ROLE)
        .and_then(|value| parse_role(value, X_PERMIT_RESOURCE_ROLE, &location, warnings));
    let relation = lookup(X_PERMIT_RELATION)
        .and_then(|value| parse_relation(value, resource_key, &location, warnings));
    let derived_role = lookup(X_PERMIT_DERIVED_ROLE)
        .and_then(|value| parse_derived_role(value, resource_key, &location, warnings));

    AnnotatedOperation {
        method: operation.method,
        action,
        description,
        role,
        resource_role,
        relation,
        derived_role,
    }
}

fn parse_role(
    value: &Value,
    extension: &str,
    location: &str,
    warnings: &mut Vec<String>,
) -> Option<RoleSpec> {
    let spec = match value {
        Value::String(name) => Some(RoleSpec {
            key: sanitize_key(name),
            name: name.trim().to_string(),
            description: None,
        }),
        Value::Object(object) => {
            let name = text(object, "name").or_else(|| text(object, "key"));
            name.map(|name| RoleSpec {
                key: sanitize_key(&text(object, "key").unwrap_or_else(|| name.clone())),
                name,
                description: text(object, "description"),
            })
        }
        _ => None,
    };

    match spec {
        Some(spec) if !spec.key.is_empty() => Some(spec),
        _ => {
            warnings.push(format!(
                "Ignoring {} on {}: expected a role name or an object with a name",
                extension, location
            ));
            None
        }
    }
}

fn parse_relation(
    value: &Value,
    resource_key: &str,
    location: &str,
    warnings: &mut Vec<String>,
) -> Option<RelationSpec> {
    let subject = value
        .as_object()
        .and_then(|object| text(object, "subject_resource").map(|s| (object, sanitize_key(&s))))
        .filter(|(_, subject)| !subject.is_empty());

    let Some((object, subject_resource)) = subject else {
        warnings.push(format!(
            "Ignoring {} on {}: expected an object with a subject_resource",
            X_PERMIT_RELATION, location
        ));
        return None;
    };

    let object_resource = text(object, "object_resource")
        .map(|s| sanitize_key(&s))
        .unwrap_or_else(|| resource_key.to_string());

    let key = text(object, "key")
        .or_else(|| text(object, "name"))
        .map(|s| sanitize_key(&s))
        .unwrap_or_else(|| format!("{}_{}", subject_resource, object_resource));

    let name = text(object, "name").unwrap_or_else(|| key.clone());

    Some(RelationSpec {
        key,
        name,
        subject_resource,
        object_resource,
    })
}

fn parse_derived_role(
    value: &Value,
    resource_key: &str,
    location: &str,
    warnings: &mut Vec<String>,
) -> Option<DerivedRoleSpec> {
    let fields = value.as_object().and_then(|object| {
        let base_role = text(object, "base_role")?;
        let derived_role = text(object, "derived_role")?;
        let relation = text(object, "relation")?;
        Some((object, base_role, derived_role, relation))
    });

    let Some((object, base_role, derived_role, relation)) = fields else {
        warnings.push(format!(
            "Ignoring {} on {}: expected an object with base_role, derived_role and relation",
            X_PERMIT_DERIVED_ROLE, location
        ));
        return None;
    };

    Some(DerivedRoleSpec {
        base_role: sanitize_key(&base_role),
        derived_role: sanitize_key(&derived_role),
        relation: sanitize_key(&relation),
        base_resource: text(object, "base_resource").map(|s| sanitize_key(&s)),
        resource: text(object, "resource")
            .map(|s| sanitize_key(&s))
            .unwrap_or_else(|| resource_key.to_string()),
    })
}

fn text(object: &Map<String, Value>, field: &str) -> Option<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
