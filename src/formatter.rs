//! Value formatting - renames keys and re-encodes leaves by type.
//!
//! Formatting is driven only by the type descriptor and field constraints,
//! never by an enclosing entity, so the same recursion handles top-level
//! records, embedded records, computed results and union payloads.

use serde_json::{Map, Number, Value};

use crate::schema::{tag_string, Constraints, Primitive, RecordType, Registry, TypeDescriptor, UnionType};
use crate::types::{Direction, FormatOptions};

/// Format `value` of type `ty` for `direction`.
///
/// Never fails: values that do not match their type are returned unchanged.
pub fn format_value(
    value: &Value,
    ty: &TypeDescriptor,
    constraints: &Constraints,
    registry: &Registry,
    naming: &FormatOptions,
    direction: Direction,
) -> Value {
    Formatter::new(registry, naming, direction).format(value, ty, constraints)
}

/// A formatter bound to one registry, naming configuration and direction.
#[derive(Debug, Clone, Copy)]
pub struct Formatter<'a> {
    registry: &'a Registry,
    naming: &'a FormatOptions,
    direction: Direction,
}

impl<'a> Formatter<'a> {
    pub fn new(registry: &'a Registry, naming: &'a FormatOptions, direction: Direction) -> Self {
        Self {
            registry,
            naming,
            direction,
        }
    }

    pub fn format(&self, value: &Value, ty: &TypeDescriptor, constraints: &Constraints) -> Value {
        if constraints.passthrough {
            return value.clone();
        }
        match ty {
            TypeDescriptor::Primitive(p) => self.format_leaf(value, *p, constraints),
            TypeDescriptor::Named(name) => match self.registry.lookup(name) {
                Some(target) => self.format(value, target, constraints),
                None => value.clone(),
            },
            TypeDescriptor::Record(record) => self.format_record(value, record),
            TypeDescriptor::Union(union) => self.format_union(value, union),
            TypeDescriptor::Array(element) => match value {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| self.format(item, element, constraints))
                        .collect(),
                ),
                other => other.clone(),
            },
        }
    }

    /// Rename every known public field and recurse by field type.
    ///
    /// Keys that are not public fields of the record are dropped.
    pub fn format_record(&self, value: &Value, record: &RecordType) -> Value {
        let Some(map) = value.as_object() else {
            return value.clone();
        };

        let convention = self.naming.convention(self.direction);
        let mut result = Map::new();

        for field in record.public_fields() {
            let client_key = field.client_name(convention);
            match self.direction {
                Direction::Input => {
                    let Some(v) = map.get(&client_key).or_else(|| map.get(&field.name)) else {
                        continue;
                    };
                    result.insert(field.name.clone(), self.format(v, &field.ty, &field.constraints));
                }
                Direction::Output => {
                    let Some(v) = map.get(&field.name) else {
                        continue;
                    };
                    result.insert(client_key, self.format(v, &field.ty, &field.constraints));
                }
            }
        }

        Value::Object(result)
    }

    /// Format a union value through its active variant.
    pub fn format_union(&self, value: &Value, union: &UnionType) -> Value {
        let Some(map) = value.as_object() else {
            return value.clone();
        };

        match &union.tag {
            Some(tag_field) => {
                let convention = self.naming.convention(self.direction);
                let client_tag_key = convention.apply(tag_field);
                let (read_key, write_key) = match self.direction {
                    Direction::Input => (client_tag_key.as_str(), tag_field.as_str()),
                    Direction::Output => (tag_field.as_str(), client_tag_key.as_str()),
                };
                let Some((raw_tag, tag)) = map
                    .get(read_key)
                    .or_else(|| map.get(tag_field))
                    .and_then(|raw| Some((raw, tag_string(raw)?)))
                else {
                    return value.clone();
                };
                let Some(variant) = union.variant(&tag) else {
                    return value.clone();
                };

                let mut formatted = match self.format(value, variant, &Constraints::default()) {
                    Value::Object(m) => m,
                    _ => Map::new(),
                };
                // The discriminator survives even when the variant record does not declare it.
                let tag_value = if raw_tag.is_string() {
                    raw_tag.clone()
                } else {
                    Value::String(tag)
                };
                formatted.insert(write_key.to_string(), tag_value);
                Value::Object(formatted)
            }
            None => {
                let Some((tag, payload)) = union.active_variant(value) else {
                    return value.clone();
                };
                let Some(variant) = union.variant(&tag) else {
                    return value.clone();
                };
                let mut result = Map::new();
                result.insert(tag, self.format(payload, variant, &Constraints::default()));
                Value::Object(result)
            }
        }
    }

    fn format_leaf(&self, value: &Value, primitive: Primitive, constraints: &Constraints) -> Value {
        if primitive.is_opaque() {
            return value.clone();
        }
        match (primitive, self.direction) {
            (Primitive::Decimal, _) => match value {
                Value::Number(n) => Value::String(n.to_string()),
                other => other.clone(),
            },
            (Primitive::Integer, Direction::Input) if constraints.string_encoded => match value {
                Value::String(s) => parse_integer(s).unwrap_or_else(|| value.clone()),
                other => other.clone(),
            },
            (Primitive::Integer, Direction::Output) if constraints.string_encoded => match value {
                Value::Number(n) => Value::String(n.to_string()),
                other => other.clone(),
            },
            _ => value.clone(),
        }
    }
}

fn parse_integer(s: &str) -> Option<Value> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(Value::Number(Number::from(n)));
    }
    s.parse::<u64>().ok().map(|n| Value::Number(Number::from(n)))
}
