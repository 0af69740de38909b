//! Request normalization: the selection wire shape into [`SelectionNode`]s.
//!
//! A selection is a JSON array whose items are either a field name or a
//! single-key object mapping a field name to a nested selection list or to an
//! `{"arguments": {...}, "fields": [...]}` object.

use serde_json::{Map, Value};

use crate::error::PlanError;
use crate::types::{json_type_name, SELECTION_OBJECT_KEYS};

/// One client-requested field.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionNode {
    /// `"title"`
    Field { name: String },
    /// `{"assignee": ["id", "name"]}`
    Nested {
        name: String,
        fields: Vec<SelectionNode>,
    },
    /// `{"summary": {"arguments": {...}, "fields": [...]}}`
    Arguments {
        name: String,
        arguments: Map<String, Value>,
        fields: Vec<SelectionNode>,
    },
}

impl SelectionNode {
    pub fn field(name: impl Into<String>) -> Self {
        SelectionNode::Field { name: name.into() }
    }

    pub fn nested(name: impl Into<String>, fields: Vec<SelectionNode>) -> Self {
        SelectionNode::Nested {
            name: name.into(),
            fields,
        }
    }

    /// Name as sent by the client.
    pub fn name(&self) -> &str {
        match self {
            SelectionNode::Field { name }
            | SelectionNode::Nested { name, .. }
            | SelectionNode::Arguments { name, .. } => name,
        }
    }

    /// Nested selection, empty for bare names.
    pub fn fields(&self) -> &[SelectionNode] {
        match self {
            SelectionNode::Field { .. } => &[],
            SelectionNode::Nested { fields, .. } | SelectionNode::Arguments { fields, .. } => {
                fields
            }
        }
    }

    /// Deepest nesting level below and including this node.
    pub fn depth(&self) -> usize {
        1 + self.fields().iter().map(SelectionNode::depth).max().unwrap_or(0)
    }
}

/// Parse a selection list, rejecting malformed items and requests nested
/// deeper than `max_depth`.
///
/// # Errors
///
/// Returns `PlanError::InvalidNestedSelectionShape` for malformed items and
/// `PlanError::DepthExceeded` when nesting exceeds `max_depth`.
pub fn parse_selection(value: &Value, max_depth: usize) -> Result<Vec<SelectionNode>, PlanError> {
    let mut path = Vec::new();
    parse_list(value, max_depth, 1, &mut path)
}

fn parse_list(
    value: &Value,
    max_depth: usize,
    depth: usize,
    path: &mut Vec<String>,
) -> Result<Vec<SelectionNode>, PlanError> {
    let items = value.as_array().ok_or_else(|| shape_error(
        path,
        format!("expected a list of fields, got {}", json_type_name(value)),
    ))?;

    // An empty list adds no nesting.
    if depth > max_depth && !items.is_empty() {
        return Err(PlanError::DepthExceeded {
            path: path.clone(),
            max: max_depth,
        });
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_item(item, index, max_depth, depth, path))
        .collect()
}

fn parse_item(
    item: &Value,
    index: usize,
    max_depth: usize,
    depth: usize,
    path: &mut Vec<String>,
) -> Result<SelectionNode, PlanError> {
    match item {
        Value::String(name) if !name.is_empty() => Ok(SelectionNode::field(name.clone())),
        Value::String(_) => Err(shape_error(path, format!("item {} is an empty field name", index))),
        Value::Object(map) => {
            let mut entries = map.iter();
            let (Some((name, nested)), None) = (entries.next(), entries.next()) else {
                return Err(shape_error(
                    path,
                    format!(
                        "item {} must be a single-key object, got {} keys",
                        index,
                        map.len()
                    ),
                ));
            };
            if name.is_empty() {
                return Err(shape_error(path, format!("item {} has an empty field name", index)));
            }

            path.push(name.clone());
            let node = parse_nested(name, nested, max_depth, depth, path)?;
            path.pop();
            Ok(node)
        }
        other => Err(shape_error(
            path,
            format!(
                "item {} must be a field name or single-key object, got {}",
                index,
                json_type_name(other)
            ),
        )),
    }
}

fn parse_nested(
    name: &str,
    nested: &Value,
    max_depth: usize,
    depth: usize,
    path: &mut Vec<String>,
) -> Result<SelectionNode, PlanError> {
    match nested {
        Value::Array(_) => Ok(SelectionNode::Nested {
            name: name.to_string(),
            fields: parse_list(nested, max_depth, depth + 1, path)?,
        }),
        Value::Object(map) => {
            if let Some(unknown) = map
                .keys()
                .find(|k| !SELECTION_OBJECT_KEYS.contains(&k.as_str()))
            {
                return Err(shape_error(
                    path,
                    format!(
                        "unexpected key \"{}\": a selection object takes \"arguments\" and \"fields\"",
                        unknown
                    ),
                ));
            }

            let arguments = match map.get("arguments") {
                None => Map::new(),
                Some(Value::Object(args)) => args.clone(),
                Some(other) => {
                    return Err(shape_error(
                        path,
                        format!("\"arguments\" must be an object, got {}", json_type_name(other)),
                    ))
                }
            };

            let fields = match map.get("fields") {
                None => Vec::new(),
                Some(fields) => parse_list(fields, max_depth, depth + 1, path)?,
            };

            Ok(SelectionNode::Arguments {
                name: name.to_string(),
                arguments,
                fields,
            })
        }
        other => Err(shape_error(
            path,
            format!(
                "nested selection must be a list or an arguments object, got {}",
                json_type_name(other)
            ),
        )),
    }
}

fn shape_error(path: &[String], message: String) -> PlanError {
    PlanError::InvalidNestedSelectionShape {
        path: path.to_vec(),
        message,
    }
}
