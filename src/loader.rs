//! Registry loading from files, strings, and HTTP URLs.
//!
//! A registry document lists named types:
//!
//! ```json
//! {
//!   "types": {
//!     "User": { "fields": { "id": "uuid", "name": "string" } },
//!     "Task": {
//!       "fields": {
//!         "id": "uuid",
//!         "assignee": { "kind": "relation", "type": "User" },
//!         "summary": {
//!           "kind": "computed",
//!           "type": "string",
//!           "arguments": { "verbosity": { "type": "string", "required": true } }
//!         }
//!       }
//!     },
//!     "Content": { "tag": "type", "variants": { "text": "TextBlock" } }
//!   }
//! }
//! ```
//!
//! Type expressions are a primitive or registered name (`"string"`, `"User"`),
//! an array (`"User[]"` or `{"array": <expr>}`), an inline record
//! (`{"fields": {...}}`) or an inline union (`{"variants": {...}}`).

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::RegistryError;
use crate::schema::{
    ArgumentSpec, Constraints, FieldDescriptor, FieldKind, Primitive, RecordType, Registry,
    TypeDescriptor, UnionType,
};
use crate::types::{json_type_name, Visibility};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Field definition keys accepted in registry documents.
pub const FIELD_KEYS: &[&str] = &[
    "type",
    "kind",
    "visibility",
    "alias",
    "arguments",
    "function",
    "passthrough",
    "string_encoded",
];

/// Keys that mark an object as an inline type expression.
const TYPE_EXPR_KEYS: &[&str] = &["array", "fields", "variants"];

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `RegistryError::FileNotFound` if the file doesn't exist,
/// or `RegistryError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, RegistryError> {
    if !path.exists() {
        return Err(RegistryError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| RegistryError::InvalidJson { source })
}

/// Load a registry from a file path.
pub fn load_registry(path: &Path) -> Result<Registry, RegistryError> {
    parse_registry(&load_json(path)?)
}

/// Load a registry from a JSON string.
///
/// # Errors
///
/// Returns `RegistryError::InvalidJson` if the string isn't valid JSON, or a
/// schema error if the document is malformed.
pub fn load_registry_str(content: &str) -> Result<Registry, RegistryError> {
    let doc: Value =
        serde_json::from_str(content).map_err(|source| RegistryError::InvalidJson { source })?;
    parse_registry(&doc)
}

/// Load a registry from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `RegistryError::NetworkError` if the request fails or the
/// response isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_registry_url(url: &str) -> Result<Registry, RegistryError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| RegistryError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .map_err(|source| RegistryError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    // Check for HTTP errors before parsing
    let response = response
        .error_for_status()
        .map_err(|source| RegistryError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let doc: Value = response
        .json()
        .map_err(|source| RegistryError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    parse_registry(&doc)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a registry from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_registry_auto(source: &str) -> Result<Registry, RegistryError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_registry_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(RegistryError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_registry(Path::new(source))
    }
}

/// Build a registry from a parsed document.
pub fn parse_registry(doc: &Value) -> Result<Registry, RegistryError> {
    let types = parse_type_definitions(doc)?;
    let registry = Registry::new(types)?;
    tracing::debug!(types = registry.len(), "loaded type registry");
    Ok(registry)
}

/// Parse the `types` section without checking cross references.
pub fn parse_type_definitions(
    doc: &Value,
) -> Result<IndexMap<String, TypeDescriptor>, RegistryError> {
    let types = doc
        .get("types")
        .and_then(Value::as_object)
        .ok_or_else(|| RegistryError::InvalidType {
            path: "/types".into(),
            message: "document must contain a \"types\" object".into(),
        })?;

    let mut result = IndexMap::new();
    for (name, def) in types {
        let path = format!("/types/{}", name);
        result.insert(name.clone(), parse_definition(name, def, &path)?);
    }
    Ok(result)
}

/// Parse one named type definition.
pub fn parse_definition(name: &str, def: &Value, path: &str) -> Result<TypeDescriptor, RegistryError> {
    if Primitive::parse(name).is_some() {
        return Err(invalid(path, format!("\"{}\" is a reserved primitive name", name)));
    }
    match def {
        Value::Object(map) if map.contains_key("fields") => Ok(TypeDescriptor::Record(Arc::new(
            parse_record(Some(name), map, path)?,
        ))),
        Value::Object(map) if map.contains_key("variants") => Ok(TypeDescriptor::Union(Arc::new(
            parse_union(Some(name), map, path)?,
        ))),
        other => parse_type_expr(other, path),
    }
}

/// Parse a type expression.
pub fn parse_type_expr(expr: &Value, path: &str) -> Result<TypeDescriptor, RegistryError> {
    match expr {
        Value::String(s) => Ok(parse_type_name(s)),
        Value::Object(map) => {
            if let Some(inner) = map.get("array") {
                let element = parse_type_expr(inner, &format!("{}/array", path))?;
                Ok(TypeDescriptor::array_of(element))
            } else if map.contains_key("fields") {
                Ok(TypeDescriptor::Record(Arc::new(parse_record(None, map, path)?)))
            } else if map.contains_key("variants") {
                Ok(TypeDescriptor::Union(Arc::new(parse_union(None, map, path)?)))
            } else {
                Err(invalid(
                    path,
                    "type object must contain \"array\", \"fields\", or \"variants\"",
                ))
            }
        }
        other => Err(invalid(
            path,
            format!(
                "expected type name or object, got {}",
                json_type_name(other)
            ),
        )),
    }
}

fn parse_type_name(s: &str) -> TypeDescriptor {
    if let Some(element) = s.strip_suffix("[]") {
        return TypeDescriptor::array_of(parse_type_name(element));
    }
    match Primitive::parse(s) {
        Some(p) => TypeDescriptor::Primitive(p),
        None => TypeDescriptor::Named(s.to_string()),
    }
}

fn parse_record(
    name: Option<&str>,
    map: &Map<String, Value>,
    path: &str,
) -> Result<RecordType, RegistryError> {
    let fields_path = format!("{}/fields", path);
    let fields = map
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(&fields_path, "\"fields\" must be an object"))?;

    let mut record = RecordType::new(name.map(String::from));
    for (field_name, def) in fields {
        let field_path = format!("{}/{}", fields_path, field_name);
        record = record.with_field(parse_field(field_name, def, &field_path)?);
    }
    Ok(record)
}

fn parse_union(
    name: Option<&str>,
    map: &Map<String, Value>,
    path: &str,
) -> Result<UnionType, RegistryError> {
    let variants_path = format!("{}/variants", path);
    let variants = map
        .get("variants")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(&variants_path, "\"variants\" must be an object"))?;

    if variants.is_empty() {
        return Err(invalid(&variants_path, "union must declare at least one variant"));
    }

    let tag = match map.get("tag") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(invalid(
                &format!("{}/tag", path),
                format!("expected string, got {}", json_type_name(other)),
            ))
        }
    };

    let mut parsed = IndexMap::new();
    for (variant, expr) in variants {
        let variant_path = format!("{}/{}", variants_path, variant);
        parsed.insert(variant.clone(), parse_type_expr(expr, &variant_path)?);
    }

    Ok(UnionType {
        name: name.map(String::from),
        tag,
        variants: parsed,
    })
}

fn parse_field(name: &str, def: &Value, path: &str) -> Result<FieldDescriptor, RegistryError> {
    // Shorthand: "id": "uuid"
    // Inline types without field options: "address": { "fields": {...} }
    let map = match def {
        Value::Object(map) if map.contains_key("type") => map,
        Value::Object(map) if !TYPE_EXPR_KEYS.iter().any(|k| map.contains_key(*k)) => {
            return Err(invalid(path, "field definition is missing \"type\""))
        }
        other => return Ok(FieldDescriptor::attribute(name, parse_type_expr(other, path)?)),
    };

    if let Some(unknown) = map.keys().find(|k| !FIELD_KEYS.contains(&k.as_str())) {
        return Err(invalid(path, format!("unknown field key \"{}\"", unknown)));
    }

    let ty = parse_type_expr(&map["type"], &format!("{}/type", path))?;

    let kind = match optional_str(map, "kind", path)? {
        None | Some("attribute") => FieldKind::Attribute,
        Some("relation") => FieldKind::Relation,
        Some("computed") => FieldKind::Computed {
            arguments: parse_arguments(map.get("arguments"), &format!("{}/arguments", path))?,
        },
        Some("aggregate") => FieldKind::Aggregate {
            function: optional_str(map, "function", path)?.map(String::from),
        },
        Some(other) => {
            return Err(invalid(
                &format!("{}/kind", path),
                format!(
                    "unknown field kind \"{}\": expected attribute, relation, computed, or aggregate",
                    other
                ),
            ))
        }
    };

    if map.contains_key("arguments") && !matches!(kind, FieldKind::Computed { .. }) {
        return Err(invalid(path, "only computed fields take arguments"));
    }

    let visibility = match optional_str(map, "visibility", path)? {
        None => Visibility::Public,
        Some(s) => Visibility::parse(s).ok_or_else(|| {
            invalid(
                &format!("{}/visibility", path),
                format!("unknown visibility \"{}\": expected public or private", s),
            )
        })?,
    };

    let constraints = Constraints {
        passthrough: optional_bool(map, "passthrough", path)?,
        string_encoded: optional_bool(map, "string_encoded", path)?,
    };

    let mut field = FieldDescriptor::attribute(name, ty)
        .with_kind(kind)
        .with_visibility(visibility)
        .with_constraints(constraints);
    if let Some(alias) = optional_str(map, "alias", path)? {
        field = field.with_alias(alias);
    }
    Ok(field)
}

fn parse_arguments(
    value: Option<&Value>,
    path: &str,
) -> Result<IndexMap<String, ArgumentSpec>, RegistryError> {
    let Some(value) = value else {
        return Ok(IndexMap::new());
    };
    let args = value
        .as_object()
        .ok_or_else(|| invalid(path, "\"arguments\" must be an object"))?;

    let mut result = IndexMap::new();
    for (name, def) in args {
        let arg_path = format!("{}/{}", path, name);
        let spec = match def {
            Value::Object(map) => {
                let ty_expr = map
                    .get("type")
                    .ok_or_else(|| invalid(&arg_path, "argument definition is missing \"type\""))?;
                ArgumentSpec {
                    name: name.clone(),
                    ty: parse_type_expr(ty_expr, &format!("{}/type", arg_path))?,
                    required: optional_bool(map, "required", &arg_path)?,
                    default: map.get("default").cloned(),
                }
            }
            other => ArgumentSpec {
                name: name.clone(),
                ty: parse_type_expr(other, &arg_path)?,
                required: false,
                default: None,
            },
        };
        if spec.required && spec.default.is_some() {
            return Err(invalid(&arg_path, "a required argument cannot have a default"));
        }
        result.insert(name.clone(), spec);
    }
    Ok(result)
}

fn optional_str<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a str>, RegistryError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(invalid(
            &format!("{}/{}", path, key),
            format!("expected string, got {}", json_type_name(other)),
        )),
    }
}

fn optional_bool(map: &Map<String, Value>, key: &str, path: &str) -> Result<bool, RegistryError> {
    match map.get(key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(invalid(
            &format!("{}/{}", path, key),
            format!("expected boolean, got {}", json_type_name(other)),
        )),
    }
}

fn invalid(path: &str, message: impl Into<String>) -> RegistryError {
    RegistryError::InvalidType {
        path: path.to_string(),
        message: message.into(),
    }
}
