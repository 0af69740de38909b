//! Result projection - applies a [`ProjectionTemplate`] to raw provider data.
//!
//! The output contains exactly the requested fields under their client
//! names. Denied fields are present as `null`; requested fields missing from
//! the raw data are left out.

use serde_json::{Map, Value};

use crate::formatter::Formatter;
use crate::naming::NamingConvention;
use crate::pagination;
use crate::schema::Registry;
use crate::template::{NodeKind, ProjectionTemplate, SubTemplate, TemplateNode, UnionTemplate, VariantTemplate};
use crate::types::{Direction, FormatOptions};

/// Project `raw` through `template`, formatting values for output.
///
/// `raw` may be a single record, a list of records, or a pagination
/// envelope around a list.
pub fn project(
    raw: &Value,
    template: &ProjectionTemplate,
    registry: &Registry,
    naming: &FormatOptions,
) -> Value {
    Projector::new(registry, naming).project_records(raw, template)
}

/// Projector bound to one registry and naming configuration.
pub struct Projector<'a> {
    formatter: Formatter<'a>,
    output: NamingConvention,
}

impl<'a> Projector<'a> {
    pub fn new(registry: &'a Registry, naming: &'a FormatOptions) -> Self {
        Self {
            formatter: Formatter::new(registry, naming, Direction::Output),
            output: naming.output,
        }
    }

    /// Project one record, a list of records, or a page of records.
    pub fn project_records(&self, raw: &Value, template: &ProjectionTemplate) -> Value {
        match raw {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.project_record(item, template))
                    .collect(),
            ),
            Value::Object(_) => match pagination::detect(raw, template) {
                Some(envelope) => {
                    let mut page = envelope.metadata.clone();
                    let items = envelope
                        .items
                        .iter()
                        .map(|item| self.project_record(item, template))
                        .collect();
                    page.insert(envelope.items_key.to_string(), Value::Array(items));
                    Value::Object(page)
                }
                None => self.project_record(raw, template),
            },
            other => other.clone(),
        }
    }

    /// Project the requested fields of a single record.
    pub fn project_record(&self, raw: &Value, template: &ProjectionTemplate) -> Value {
        let Some(map) = raw.as_object() else {
            return raw.clone();
        };

        let mut result = Map::with_capacity(template.len());
        for node in &template.fields {
            let key = node.descriptor.client_name(self.output);
            if matches!(node.kind, NodeKind::Denied) {
                result.insert(key, Value::Null);
                continue;
            }
            let Some(value) = map.get(&node.name) else {
                continue;
            };
            result.insert(key, self.project_node(value, node));
        }
        Value::Object(result)
    }

    fn project_node(&self, value: &Value, node: &TemplateNode) -> Value {
        let field = &node.descriptor;
        match &node.kind {
            NodeKind::Direct | NodeKind::Aggregate | NodeKind::Computed { template: None } => {
                self.formatter.format(value, &field.ty, &field.constraints)
            }
            NodeKind::Embedded { template } | NodeKind::Relation { template, .. } => {
                self.project_records(value, template)
            }
            NodeKind::Dual { template }
            | NodeKind::Computed {
                template: Some(template),
            } => self.project_sub(value, template),
            NodeKind::Union { template } => self.project_unions(value, template),
            NodeKind::Denied => Value::Null,
        }
    }

    fn project_sub(&self, value: &Value, template: &SubTemplate) -> Value {
        match template {
            SubTemplate::Record(template) => self.project_records(value, template),
            SubTemplate::Union(template) => self.project_unions(value, template),
        }
    }

    fn project_unions(&self, value: &Value, template: &UnionTemplate) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.project_union(item, template))
                    .collect(),
            ),
            other => self.project_union(other, template),
        }
    }

    /// Emit the active variant if it was requested, otherwise `null`.
    fn project_union(&self, value: &Value, template: &UnionTemplate) -> Value {
        let union = &template.union;
        let Some((tag, payload)) = union.active_variant(value) else {
            return Value::Null;
        };

        match template.variants.get(&tag) {
            None => {
                tracing::trace!(variant = %tag, "union variant not selected");
                Value::Null
            }
            Some(VariantTemplate::Full) => self.formatter.format_union(value, union),
            Some(VariantTemplate::Fields(fields)) => {
                let projected = self.project_record(payload, fields);
                let mut result = match projected {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                match &union.tag {
                    Some(tag_field) => {
                        let tag_value = match payload.get(tag_field) {
                            Some(raw) if raw.is_string() => raw.clone(),
                            _ => Value::String(tag),
                        };
                        result.insert(self.output.apply(tag_field), tag_value);
                        Value::Object(result)
                    }
                    None => {
                        let mut wrapper = Map::new();
                        wrapper.insert(tag, Value::Object(result));
                        Value::Object(wrapper)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_registry;
    use crate::planner::{plan, plan_with_policy};
    use crate::policy::{AccessPolicy, AllowAll, DenyList};
    use crate::selection::parse_selection;
    use crate::types::PlanOptions;
    use serde_json::json;

    fn registry() -> Registry {
        parse_registry(&json!({
            "types": {
                "User": { "fields": { "id": "integer", "display_name": "string", "email": "string" } },
                "Task": {
                    "fields": {
                        "id": "integer",
                        "title": "string",
                        "budget": "decimal",
                        "items": "string[]",
                        "assignee": { "kind": "relation", "type": "User" },
                        "watchers": { "kind": "relation", "type": "User[]" },
                        "body": "Content",
                        "payload": "Payload"
                    }
                },
                "Text": { "fields": { "kind": "string", "text_body": "string" } },
                "Image": { "fields": { "kind": "string", "image_url": "string", "alt_text": "string" } },
                "Content": { "tag": "kind", "variants": { "text": "Text", "image": "Image" } },
                "Payload": { "variants": { "count": "integer", "image": "Image" } }
            }
        }))
        .unwrap()
    }

    fn run(fields: Value, raw: Value) -> Value {
        run_with(fields, raw, &AllowAll)
    }

    fn run_with(fields: Value, raw: Value, policy: &dyn AccessPolicy) -> Value {
        let registry = registry();
        let options = PlanOptions::default();
        let selection = parse_selection(&fields, options.max_depth).unwrap();
        let (_, template) =
            plan_with_policy(&registry, "Task", &selection, &options, policy).unwrap();
        project(&raw, &template, &registry, &options.naming)
    }

    #[test]
    fn exact_shape() {
        let raw = json!({
            "id": 1,
            "title": "Ship",
            "budget": 12.5,
            "assignee": { "id": 7, "display_name": "Ada", "email": "ada@example.com" },
            "extra": true
        });
        let out = run(json!(["id", "budget", { "assignee": ["displayName"] }]), raw);
        assert_eq!(
            out,
            json!({ "id": 1, "budget": "12.5", "assignee": { "displayName": "Ada" } })
        );
    }

    #[test]
    fn absent_fields_are_omitted() {
        let out = run(json!(["id", "title"]), json!({ "id": 1 }));
        assert_eq!(out, json!({ "id": 1 }));
    }

    #[test]
    fn null_relation_stays_null() {
        let out = run(json!([{ "assignee": ["id"] }]), json!({ "assignee": null }));
        assert_eq!(out, json!({ "assignee": null }));
    }

    #[test]
    fn denied_field_is_null() {
        let policy = DenyList::new().deny("User", "email");
        let out = run_with(
            json!([{ "assignee": ["id", "email"] }]),
            json!({ "assignee": { "id": 7, "email": "secret" } }),
            &policy,
        );
        assert_eq!(out, json!({ "assignee": { "id": 7, "email": null } }));
    }

    #[test]
    fn list_relation() {
        let out = run(
            json!([{ "watchers": ["displayName"] }]),
            json!({ "watchers": [{ "display_name": "A" }, { "display_name": "B" }] }),
        );
        assert_eq!(
            out,
            json!({ "watchers": [{ "displayName": "A" }, { "displayName": "B" }] })
        );
    }

    #[test]
    fn nested_envelope_in_relation() {
        let out = run(
            json!([{ "watchers": ["id"] }]),
            json!({ "watchers": { "items": [{ "id": 1, "email": "x" }], "total": 1, "hasMore": false } }),
        );
        assert_eq!(
            out,
            json!({ "watchers": { "items": [{ "id": 1 }], "total": 1, "hasMore": false } })
        );
    }

    #[test]
    fn requested_items_field_is_not_an_envelope() {
        let out = run(
            json!(["items"]),
            json!({ "items": ["a"], "total": 3 }),
        );
        assert_eq!(out, json!({ "items": ["a"] }));
    }

    #[test]
    fn declared_items_field_is_not_an_envelope() {
        let out = run(
            json!(["id"]),
            json!({ "id": 1, "items": ["a"], "total": 3 }),
        );
        assert_eq!(out, json!({ "id": 1 }));

        let out = run(json!(["budget"]), json!({ "items": ["a"], "total": 3 }));
        assert_eq!(out, json!({}));
    }

    #[test]
    fn internally_tagged_union() {
        let fields = json!([{ "body": ["text", { "image": ["imageUrl"] }] }]);
        let image = run(
            fields.clone(),
            json!({ "body": { "kind": "image", "image_url": "u", "alt_text": "a" } }),
        );
        assert_eq!(image, json!({ "body": { "kind": "image", "imageUrl": "u" } }));

        let text = run(fields, json!({ "body": { "kind": "text", "text_body": "hi" } }));
        assert_eq!(text, json!({ "body": { "kind": "text", "textBody": "hi" } }));
    }

    #[test]
    fn unselected_variant_is_null() {
        let out = run(
            json!([{ "body": ["text"] }]),
            json!({ "body": { "kind": "image", "image_url": "u" } }),
        );
        assert_eq!(out, json!({ "body": null }));
    }

    #[test]
    fn externally_tagged_union() {
        let fields = json!([{ "payload": ["count", { "image": ["altText"] }] }]);
        let out = run(
            fields.clone(),
            json!({ "payload": { "image": { "kind": "image", "image_url": "u", "alt_text": "a" } } }),
        );
        assert_eq!(out, json!({ "payload": { "image": { "altText": "a" } } }));

        let out = run(fields, json!({ "payload": { "count": 3 } }));
        assert_eq!(out, json!({ "payload": { "count": 3 } }));
    }

    #[test]
    fn top_level_list() {
        let registry = registry();
        let options = PlanOptions::default();
        let selection = parse_selection(&json!(["id"]), options.max_depth).unwrap();
        let (_, template) = plan(&registry, "Task", &selection, &options).unwrap();
        let out = project(
            &json!([{ "id": 1, "title": "a" }, { "id": 2 }]),
            &template,
            &registry,
            &options.naming,
        );
        assert_eq!(out, json!([{ "id": 1 }, { "id": 2 }]));
    }
}
