//! Argument validation for computed fields.
//!
//! Each argument type is compiled into a JSON Schema and the normalized
//! argument value is checked against it.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::PlanError;
use crate::formatter::Formatter;
use crate::naming::NamingConvention;
use crate::schema::{ArgumentSpec, Constraints, Primitive, Registry, TypeDescriptor};
use crate::types::{Direction, FormatOptions};

/// Named types are expanded this many levels deep; below that any value is accepted.
const MAX_SCHEMA_DEPTH: usize = 8;

/// Normalize and validate the arguments a client sent for a computed field.
///
/// Argument keys are matched under the inbound naming convention and values
/// are formatted inbound before validation. Omitted optional arguments with a
/// default receive it.
///
/// # Errors
///
/// `ArgumentTypeMismatch` for unknown arguments or values of the wrong
/// shape, `MissingRequiredArgument` for absent (or null) required ones.
pub fn validate_arguments(
    signature: &IndexMap<String, ArgumentSpec>,
    given: &Map<String, Value>,
    registry: &Registry,
    naming: &FormatOptions,
    path: &[String],
) -> Result<Map<String, Value>, PlanError> {
    let convention = naming.input;
    let formatter = Formatter::new(registry, naming, Direction::Input);
    let mut normalized = Map::new();

    for (key, value) in given {
        let spec = find_argument(signature, key, convention).ok_or_else(|| {
            PlanError::ArgumentTypeMismatch {
                path: path.to_vec(),
                argument: key.clone(),
                message: format!(
                    "unknown argument, expected one of: {}",
                    signature
                        .values()
                        .map(|a| convention.apply(&a.name))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }
        })?;

        if value.is_null() {
            if spec.required {
                return Err(PlanError::MissingRequiredArgument {
                    path: path.to_vec(),
                    argument: key.clone(),
                });
            }
            normalized.insert(spec.name.clone(), Value::Null);
            continue;
        }

        let formatted = formatter.format(value, &spec.ty, &Constraints::default());
        check_value(&formatted, &spec.ty, registry).map_err(|message| {
            PlanError::ArgumentTypeMismatch {
                path: path.to_vec(),
                argument: key.clone(),
                message,
            }
        })?;
        normalized.insert(spec.name.clone(), formatted);
    }

    for spec in signature.values() {
        if normalized.contains_key(&spec.name) {
            continue;
        }
        if spec.required {
            return Err(PlanError::MissingRequiredArgument {
                path: path.to_vec(),
                argument: convention.apply(&spec.name),
            });
        }
        if let Some(default) = &spec.default {
            normalized.insert(spec.name.clone(), default.clone());
        }
    }

    Ok(normalized)
}

/// First required argument of a signature, if any.
pub fn first_required(signature: &IndexMap<String, ArgumentSpec>) -> Option<&ArgumentSpec> {
    signature.values().find(|a| a.required)
}

fn find_argument<'a>(
    signature: &'a IndexMap<String, ArgumentSpec>,
    key: &str,
    convention: NamingConvention,
) -> Option<&'a ArgumentSpec> {
    signature
        .values()
        .find(|a| convention.apply(&a.name) == key)
        .or_else(|| signature.get(key))
}

/// Validate an internal value against the JSON Schema of its type.
///
/// Returns the first validation failure as a message.
pub fn check_value(value: &Value, ty: &TypeDescriptor, registry: &Registry) -> Result<(), String> {
    let schema = type_schema(ty, registry);
    let validator = jsonschema::options()
        .should_validate_formats(true)
        .build(&schema)
        .map_err(|e| e.to_string())?;

    let first_error = validator.iter_errors(value).next().map(|e| {
        let location = e.instance_path.to_string();
        if location.is_empty() {
            e.to_string()
        } else {
            format!("{}: {}", location, e)
        }
    });
    match first_error {
        None => Ok(()),
        Some(message) => Err(message),
    }
}

/// Compile a type descriptor into a JSON Schema for internal values.
pub fn type_schema(ty: &TypeDescriptor, registry: &Registry) -> Value {
    type_schema_inner(ty, registry, 0)
}

fn type_schema_inner(ty: &TypeDescriptor, registry: &Registry, depth: usize) -> Value {
    if depth > MAX_SCHEMA_DEPTH {
        return json!({});
    }
    match ty {
        TypeDescriptor::Primitive(p) => primitive_schema(*p),
        TypeDescriptor::Named(name) => match registry.lookup(name) {
            Some(target) => type_schema_inner(target, registry, depth + 1),
            None => json!({}),
        },
        TypeDescriptor::Array(element) => json!({
            "type": "array",
            "items": type_schema_inner(element, registry, depth + 1)
        }),
        TypeDescriptor::Record(record) => {
            let mut properties = Map::new();
            for field in record.public_fields() {
                let schema = if field.constraints.passthrough {
                    json!({})
                } else {
                    type_schema_inner(&field.ty, registry, depth + 1)
                };
                properties.insert(field.name.clone(), schema);
            }
            json!({ "type": "object", "properties": properties })
        }
        TypeDescriptor::Union(union) => match &union.tag {
            Some(tag) => json!({ "type": "object", "required": [tag] }),
            None => json!({ "type": "object", "minProperties": 1, "maxProperties": 1 }),
        },
    }
}

fn primitive_schema(primitive: Primitive) -> Value {
    match primitive {
        Primitive::String | Primitive::Decimal => json!({ "type": "string" }),
        Primitive::Uuid => json!({ "type": "string", "format": "uuid" }),
        Primitive::Date | Primitive::DateTime | Primitive::Time => json!({ "type": "string" }),
        Primitive::Integer => json!({ "type": "integer" }),
        Primitive::Float => json!({ "type": "number" }),
        Primitive::Boolean => json!({ "type": "boolean" }),
        Primitive::Json => json!({}),
    }
}
