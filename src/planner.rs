//! Field classification and planning.
//!
//! Walks a selection against a record type and produces, in one pass, the
//! [`FetchPlan`] handed to the data provider and the [`ProjectionTemplate`]
//! applied to whatever it returns. The first invalid node aborts planning.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::PlanError;
use crate::policy::{AccessPolicy, AllowAll};
use crate::schema::{
    ArgumentSpec, Cardinality, FieldDescriptor, FieldKind, RecordType, Registry, TypeDescriptor,
    UnionType,
};
use crate::selection::SelectionNode;
use crate::template::{NodeKind, ProjectionTemplate, SubTemplate, TemplateNode, UnionTemplate, VariantTemplate};
use crate::types::PlanOptions;
use crate::validator::{first_required, validate_arguments};

/// Data-retrieval instructions for one record level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchPlan {
    /// Registered type name; absent for inline records.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Attributes fetchable without further instruction.
    pub select: Vec<String>,
    /// Relations, computed fields, aggregates and embedded derived fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load: Vec<LoadDirective>,
    /// Requested fields refused by the access policy. Not to be fetched.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub denied: Vec<String>,
}

impl FetchPlan {
    pub fn new(type_name: Option<String>) -> Self {
        Self {
            type_name,
            ..Self::default()
        }
    }

    /// True when this level or any nested level needs derived loading.
    pub fn has_loads(&self) -> bool {
        !self.load.is_empty()
    }

    /// Number of requested fields at this level.
    pub fn len(&self) -> usize {
        let dual = self
            .load
            .iter()
            .filter(|d| matches!(d, LoadDirective::Embedded { .. }))
            .count();
        self.select.len() + self.load.len() + self.denied.len() - dual
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the load directive for a field.
    pub fn directive(&self, field: &str) -> Option<&LoadDirective> {
        self.load.iter().find(|d| d.field() == field)
    }
}

/// Instruction to load a derived field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadDirective {
    Relation {
        field: String,
        cardinality: Cardinality,
        plan: FetchPlan,
    },
    Computed {
        field: String,
        #[serde(skip_serializing_if = "Map::is_empty")]
        arguments: Map<String, Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        plan: Option<SubPlan>,
    },
    Aggregate { field: String },
    /// Derived sub-fields inside a directly fetched composite attribute.
    Embedded { field: String, plan: SubPlan },
}

impl LoadDirective {
    pub fn field(&self) -> &str {
        match self {
            LoadDirective::Relation { field, .. }
            | LoadDirective::Computed { field, .. }
            | LoadDirective::Aggregate { field }
            | LoadDirective::Embedded { field, .. } => field,
        }
    }
}

/// Nested plan for a composite value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubPlan {
    Record(FetchPlan),
    /// Plans for the structured variants that were requested.
    Union(IndexMap<String, FetchPlan>),
}

impl SubPlan {
    pub fn has_loads(&self) -> bool {
        match self {
            SubPlan::Record(plan) => plan.has_loads(),
            SubPlan::Union(variants) => variants.values().any(FetchPlan::has_loads),
        }
    }
}

/// Plan a selection against the registered record type `type_name`.
///
/// # Errors
///
/// Returns the first `PlanError` found; no partial plan is produced.
pub fn plan(
    registry: &Registry,
    type_name: &str,
    selection: &[SelectionNode],
    options: &PlanOptions,
) -> Result<(FetchPlan, ProjectionTemplate), PlanError> {
    Planner::new(registry, options, &AllowAll).plan(type_name, selection)
}

/// Like [`plan`], consulting `policy` for every requested field.
pub fn plan_with_policy(
    registry: &Registry,
    type_name: &str,
    selection: &[SelectionNode],
    options: &PlanOptions,
    policy: &dyn AccessPolicy,
) -> Result<(FetchPlan, ProjectionTemplate), PlanError> {
    Planner::new(registry, options, policy).plan(type_name, selection)
}

/// Planner bound to one registry, option set and access policy.
pub struct Planner<'a> {
    registry: &'a Registry,
    options: &'a PlanOptions,
    policy: &'a dyn AccessPolicy,
}

impl<'a> Planner<'a> {
    pub fn new(registry: &'a Registry, options: &'a PlanOptions, policy: &'a dyn AccessPolicy) -> Self {
        Self {
            registry,
            options,
            policy,
        }
    }

    /// Plan `selection` against the registered record `type_name`.
    pub fn plan(
        &self,
        type_name: &str,
        selection: &[SelectionNode],
    ) -> Result<(FetchPlan, ProjectionTemplate), PlanError> {
        let record = self
            .registry
            .record(type_name)
            .ok_or_else(|| PlanError::UnresolvedType {
                path: Vec::new(),
                name: type_name.to_string(),
            })?;

        let mut path = Vec::new();
        let result = self.plan_record(record, selection, &mut path)?;
        tracing::debug!(
            type_name,
            select = result.0.select.len(),
            load = result.0.load.len(),
            denied = result.0.denied.len(),
            "planned selection"
        );
        Ok(result)
    }

    fn plan_record(
        &self,
        record: &Arc<RecordType>,
        selection: &[SelectionNode],
        path: &mut Vec<String>,
    ) -> Result<(FetchPlan, ProjectionTemplate), PlanError> {
        if path.len() >= self.options.max_depth {
            return Err(PlanError::DepthExceeded {
                path: path.clone(),
                max: self.options.max_depth,
            });
        }

        let mut plan = FetchPlan::new(record.name.clone());
        let mut template = ProjectionTemplate::for_record(Arc::clone(record));
        let mut seen = HashSet::new();

        for node in selection {
            path.push(node.name().to_string());

            let field = record
                .field_by_client_name(node.name(), self.options.naming.input)
                .ok_or_else(|| PlanError::UnknownField {
                    path: path.clone(),
                    field: node.name().to_string(),
                })?;

            if !seen.insert(field.name.as_str()) {
                return Err(shape_error(path, "field is selected more than once"));
            }

            if !self.policy.can_load(record.name.as_deref(), field) {
                if self.options.strict_access {
                    return Err(PlanError::FieldAccessDenied { path: path.clone() });
                }
                tracing::debug!(field = %field.name, path = ?path, "field denied by access policy");
                plan.denied.push(field.name.clone());
                template.fields.push(TemplateNode {
                    name: field.name.clone(),
                    descriptor: field.clone(),
                    kind: NodeKind::Denied,
                });
                path.pop();
                continue;
            }

            let kind = self.classify(field, node, path, &mut plan)?;
            tracing::trace!(field = %field.name, kind = field.kind.as_str(), "classified field");
            template.fields.push(TemplateNode {
                name: field.name.clone(),
                descriptor: field.clone(),
                kind,
            });
            path.pop();
        }

        Ok((plan, template))
    }

    /// Classify one field, appending its fetch instructions to `plan`.
    fn classify(
        &self,
        field: &FieldDescriptor,
        node: &SelectionNode,
        path: &mut Vec<String>,
        plan: &mut FetchPlan,
    ) -> Result<NodeKind, PlanError> {
        match &field.kind {
            FieldKind::Attribute => self.classify_attribute(field, node, path, plan),
            FieldKind::Relation => self.classify_relation(field, node, path, plan),
            FieldKind::Computed { arguments } => {
                self.classify_computed(field, arguments, node, path, plan)
            }
            FieldKind::Aggregate { .. } => {
                if !matches!(node, SelectionNode::Field { .. }) {
                    return Err(shape_error(path, "aggregate fields take no nested selection"));
                }
                plan.load.push(LoadDirective::Aggregate {
                    field: field.name.clone(),
                });
                Ok(NodeKind::Aggregate)
            }
        }
    }

    /// Attributes: plain, embedded record (possibly dual-nature) or union.
    fn classify_attribute(
        &self,
        field: &FieldDescriptor,
        node: &SelectionNode,
        path: &mut Vec<String>,
        plan: &mut FetchPlan,
    ) -> Result<NodeKind, PlanError> {
        let element = self.element(&field.ty, path)?;

        if field.constraints.passthrough || matches!(element, TypeDescriptor::Primitive(_)) {
            if !matches!(node, SelectionNode::Field { .. }) {
                return Err(shape_error(path, "field has no sub-fields to select"));
            }
            plan.select.push(field.name.clone());
            return Ok(NodeKind::Direct);
        }

        let fields = match node {
            SelectionNode::Nested { fields, .. } if !fields.is_empty() => fields,
            SelectionNode::Arguments { .. } => {
                return Err(shape_error(path, "field does not take arguments"))
            }
            _ => return Err(shape_error(path, "composite field requires a nested field selection")),
        };

        let (sub_plan, sub_template) = match element {
            TypeDescriptor::Record(record) => {
                let (p, t) = self.plan_record(record, fields, path)?;
                (SubPlan::Record(p), SubTemplate::Record(t))
            }
            TypeDescriptor::Union(union) => {
                let (p, t) = self.plan_union(union, fields, path)?;
                (SubPlan::Union(p), SubTemplate::Union(t))
            }
            other => {
                return Err(PlanError::UnresolvedType {
                    path: path.clone(),
                    name: other.describe(),
                })
            }
        };

        plan.select.push(field.name.clone());
        if sub_plan.has_loads() {
            plan.load.push(LoadDirective::Embedded {
                field: field.name.clone(),
                plan: sub_plan,
            });
            return Ok(NodeKind::Dual {
                template: sub_template,
            });
        }

        Ok(match sub_template {
            SubTemplate::Record(template) => NodeKind::Embedded { template },
            SubTemplate::Union(template) => NodeKind::Union { template },
        })
    }

    fn classify_relation(
        &self,
        field: &FieldDescriptor,
        node: &SelectionNode,
        path: &mut Vec<String>,
        plan: &mut FetchPlan,
    ) -> Result<NodeKind, PlanError> {
        let fields = match node {
            SelectionNode::Nested { fields, .. } if !fields.is_empty() => fields,
            SelectionNode::Arguments { .. } => {
                return Err(shape_error(path, "relation does not take arguments"))
            }
            _ => return Err(shape_error(path, "relation requires a nested field selection")),
        };

        let (element, cardinality) = self.registry.element(&field.ty).ok_or_else(|| {
            PlanError::UnresolvedType {
                path: path.clone(),
                name: field.ty.describe(),
            }
        })?;
        let TypeDescriptor::Record(target) = element else {
            return Err(PlanError::UnresolvedType {
                path: path.clone(),
                name: field.ty.describe(),
            });
        };

        let (sub_plan, template) = self.plan_record(target, fields, path)?;
        plan.load.push(LoadDirective::Relation {
            field: field.name.clone(),
            cardinality,
            plan: sub_plan,
        });
        Ok(NodeKind::Relation {
            cardinality,
            template,
        })
    }

    fn classify_computed(
        &self,
        field: &FieldDescriptor,
        signature: &IndexMap<String, ArgumentSpec>,
        node: &SelectionNode,
        path: &mut Vec<String>,
        plan: &mut FetchPlan,
    ) -> Result<NodeKind, PlanError> {
        let (arguments, fields) = if signature.is_empty() {
            match node {
                SelectionNode::Field { .. } => (Map::new(), &[][..]),
                SelectionNode::Nested { fields, .. } => {
                    let element = self.element(&field.ty, path)?;
                    if field.constraints.passthrough
                        || matches!(element, TypeDescriptor::Primitive(_))
                    {
                        return Err(shape_error(path, "field has no sub-fields to select"));
                    }
                    (Map::new(), fields.as_slice())
                }
                SelectionNode::Arguments { .. } => {
                    return Err(shape_error(path, "computed field takes no arguments"))
                }
            }
        } else {
            match node {
                SelectionNode::Arguments {
                    arguments, fields, ..
                } => {
                    let args = validate_arguments(
                        signature,
                        arguments,
                        self.registry,
                        &self.options.naming,
                        path,
                    )?;
                    (args, fields.as_slice())
                }
                _ => {
                    if let (SelectionNode::Field { .. }, Some(required)) =
                        (node, first_required(signature))
                    {
                        return Err(PlanError::MissingRequiredArgument {
                            path: path.clone(),
                            argument: self.options.naming.input.apply(&required.name),
                        });
                    }
                    return Err(shape_error(
                        path,
                        "computed field with arguments must be selected as {\"arguments\": {...}, \"fields\": [...]}",
                    ));
                }
            }
        };

        let sub = self.plan_return(field, fields, path)?;
        let (sub_plan, template) = match sub {
            Some((p, t)) => (Some(p), Some(t)),
            None => (None, None),
        };
        plan.load.push(LoadDirective::Computed {
            field: field.name.clone(),
            arguments,
            plan: sub_plan,
        });
        Ok(NodeKind::Computed { template })
    }

    /// Plan the nested selection of a computed field's return value.
    ///
    /// An empty selection means the value is emitted in full.
    fn plan_return(
        &self,
        field: &FieldDescriptor,
        fields: &[SelectionNode],
        path: &mut Vec<String>,
    ) -> Result<Option<(SubPlan, SubTemplate)>, PlanError> {
        let element = self.element(&field.ty, path)?;
        if fields.is_empty() {
            return Ok(None);
        }
        if field.constraints.passthrough {
            return Err(shape_error(path, "field has no sub-fields to select"));
        }
        match element {
            TypeDescriptor::Record(record) => {
                let (p, t) = self.plan_record(record, fields, path)?;
                Ok(Some((SubPlan::Record(p), SubTemplate::Record(t))))
            }
            TypeDescriptor::Union(union) => {
                let (p, t) = self.plan_union(union, fields, path)?;
                Ok(Some((SubPlan::Union(p), SubTemplate::Union(t))))
            }
            _ => Err(shape_error(
                path,
                "computed field returns a primitive and takes no nested selection",
            )),
        }
    }

    fn plan_union(
        &self,
        union: &Arc<UnionType>,
        selection: &[SelectionNode],
        path: &mut Vec<String>,
    ) -> Result<(IndexMap<String, FetchPlan>, UnionTemplate), PlanError> {
        let mut plans = IndexMap::new();
        let mut variants = IndexMap::new();

        for node in selection {
            let tag = node.name();
            path.push(tag.to_string());

            let variant_ty = union.variant(tag).ok_or_else(|| PlanError::InvalidUnionVariant {
                path: path.clone(),
                variant: tag.to_string(),
                expected: union.variant_names(),
            })?;

            if variants.contains_key(tag) {
                return Err(shape_error(path, "variant is selected more than once"));
            }

            let variant = match node {
                SelectionNode::Field { .. } => VariantTemplate::Full,
                SelectionNode::Nested { fields, .. } if !fields.is_empty() => {
                    let element = self.element(variant_ty, path)?;
                    let TypeDescriptor::Record(record) = element else {
                        return Err(shape_error(
                            path,
                            "only record variants take a nested selection",
                        ));
                    };
                    let (p, t) = self.plan_record(record, fields, path)?;
                    plans.insert(tag.to_string(), p);
                    VariantTemplate::Fields(t)
                }
                SelectionNode::Nested { .. } => {
                    return Err(shape_error(path, "variant selection must not be empty"))
                }
                SelectionNode::Arguments { .. } => {
                    return Err(shape_error(path, "union variants do not take arguments"))
                }
            };
            variants.insert(tag.to_string(), variant);
            path.pop();
        }

        Ok((
            plans,
            UnionTemplate {
                union: Arc::clone(union),
                variants,
            },
        ))
    }

    /// Resolve a field type down to its element type.
    fn element<'t>(
        &'t self,
        ty: &'t TypeDescriptor,
        path: &[String],
    ) -> Result<&'t TypeDescriptor, PlanError> {
        self.registry
            .element(ty)
            .map(|(element, _)| element)
            .ok_or_else(|| PlanError::UnresolvedType {
                path: path.to_vec(),
                name: ty.describe(),
            })
    }
}

fn shape_error(path: &[String], message: &str) -> PlanError {
    PlanError::InvalidNestedSelectionShape {
        path: path.to_vec(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_registry;
    use crate::policy::DenyList;
    use crate::selection::parse_selection;
    use serde_json::json;

    fn registry() -> Registry {
        parse_registry(&json!({
            "types": {
                "User": {
                    "fields": {
                        "id": "uuid",
                        "display_name": "string",
                        "email": "string",
                        "password_hash": { "type": "string", "visibility": "private" },
                        "open_tasks": { "kind": "aggregate", "type": "integer", "function": "count" }
                    }
                },
                "Address": {
                    "fields": {
                        "street_name": "string",
                        "city": "string",
                        "distance": {
                            "kind": "computed",
                            "type": "float",
                            "arguments": { "unit": { "type": "string", "default": "km" } }
                        }
                    }
                },
                "Task": {
                    "fields": {
                        "id": "uuid",
                        "title": "string",
                        "location": "Address",
                        "assignee": { "kind": "relation", "type": "User" },
                        "watchers": { "kind": "relation", "type": "User[]" },
                        "summary": {
                            "kind": "computed",
                            "type": "string",
                            "arguments": {
                                "verbosity": { "type": "string", "required": true },
                                "max_words": "integer"
                            }
                        },
                        "preview": {
                            "kind": "computed",
                            "type": "string",
                            "arguments": { "length": "integer" }
                        },
                        "word_count": { "kind": "computed", "type": "integer" },
                        "owner": { "kind": "computed", "type": "User" },
                        "comment_count": { "kind": "aggregate", "type": "integer", "function": "count" },
                        "body": "Content"
                    }
                },
                "Text": { "fields": { "kind": "string", "text": "string" } },
                "Image": { "fields": { "kind": "string", "url": "string", "alt": "string" } },
                "Content": { "tag": "kind", "variants": { "text": "Text", "image": "Image" } }
            }
        }))
        .unwrap()
    }

    fn plan_json(fields: Value) -> Result<(FetchPlan, ProjectionTemplate), PlanError> {
        let options = PlanOptions::default();
        let selection = parse_selection(&fields, options.max_depth)?;
        plan(&registry(), "Task", &selection, &options)
    }

    #[test]
    fn partitions_select_and_load() {
        let (plan, template) =
            plan_json(json!(["id", "title", { "assignee": ["displayName"] }, "commentCount"]))
                .unwrap();
        assert_eq!(plan.type_name.as_deref(), Some("Task"));
        assert_eq!(plan.select, vec!["id", "title"]);
        assert_eq!(plan.load.len(), 2);
        assert_eq!(plan.len(), template.len());

        match plan.directive("assignee") {
            Some(LoadDirective::Relation {
                cardinality, plan, ..
            }) => {
                assert_eq!(*cardinality, Cardinality::One);
                assert_eq!(plan.select, vec!["display_name"]);
            }
            other => panic!("expected relation directive, got {other:?}"),
        }
        assert!(matches!(
            plan.directive("comment_count"),
            Some(LoadDirective::Aggregate { .. })
        ));
    }

    #[test]
    fn many_relation_keeps_cardinality() {
        let (_, template) = plan_json(json!([{ "watchers": ["id"] }])).unwrap();
        assert!(matches!(
            template.node("watchers").map(|n| &n.kind),
            Some(NodeKind::Relation {
                cardinality: Cardinality::Many,
                ..
            })
        ));
    }

    #[test]
    fn unknown_field_carries_path() {
        let err = plan_json(json!(["id", { "assignee": ["nickname"] }])).unwrap_err();
        assert_eq!(
            err,
            PlanError::UnknownField {
                path: vec!["assignee".into(), "nickname".into()],
                field: "nickname".into(),
            }
        );
    }

    #[test]
    fn private_field_is_unknown() {
        let err = plan_json(json!([{ "assignee": ["passwordHash"] }])).unwrap_err();
        assert_eq!(err.kind(), "UnknownField");
    }

    #[test]
    fn relation_requires_nested_list() {
        let err = plan_json(json!(["assignee"])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
        assert_eq!(err.path(), ["assignee"]);

        let err = plan_json(json!([{ "assignee": [] }])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
    }

    #[test]
    fn primitive_rejects_nested_list() {
        let err = plan_json(json!([{ "title": ["x"] }])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
    }

    #[test]
    fn computed_with_arguments() {
        let (plan, template) = plan_json(json!([
            { "summary": { "arguments": { "verbosity": "short", "maxWords": 20 }, "fields": [] } }
        ]))
        .unwrap();
        match plan.directive("summary") {
            Some(LoadDirective::Computed {
                arguments, plan, ..
            }) => {
                assert_eq!(
                    Value::Object(arguments.clone()),
                    json!({ "verbosity": "short", "max_words": 20 })
                );
                assert!(plan.is_none());
            }
            other => panic!("expected computed directive, got {other:?}"),
        }
        assert!(matches!(
            template.node("summary").map(|n| &n.kind),
            Some(NodeKind::Computed { template: None })
        ));
    }

    #[test]
    fn computed_bare_name_with_required_argument() {
        let err = plan_json(json!(["summary"])).unwrap_err();
        assert_eq!(
            err,
            PlanError::MissingRequiredArgument {
                path: vec!["summary".into()],
                argument: "verbosity".into(),
            }
        );
    }

    #[test]
    fn computed_bare_name_with_optional_arguments() {
        let err = plan_json(json!(["preview"])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
    }

    #[test]
    fn computed_nested_list_instead_of_arguments() {
        let err = plan_json(json!([{ "summary": ["x"] }])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
    }

    #[test]
    fn computed_argument_type_mismatch() {
        let err = plan_json(json!([
            { "summary": { "arguments": { "verbosity": "short", "maxWords": "ten" } } }
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), "ArgumentTypeMismatch");
        assert_eq!(err.path(), ["summary"]);
    }

    #[test]
    fn computed_without_arguments() {
        let (plan, _) = plan_json(json!(["wordCount"])).unwrap();
        assert!(matches!(
            plan.directive("word_count"),
            Some(LoadDirective::Computed { .. })
        ));

        let err = plan_json(json!([{ "wordCount": ["x"] }])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
    }

    #[test]
    fn computed_primitive_rejects_empty_nested_list() {
        let err = plan_json(json!([{ "wordCount": [] }])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
        assert_eq!(err.path(), ["wordCount"]);

        let (plan, _) = plan_json(json!([{ "owner": [] }])).unwrap();
        assert!(matches!(
            plan.directive("owner"),
            Some(LoadDirective::Computed { plan: None, .. })
        ));
    }

    #[test]
    fn template_knows_its_record() {
        let (_, template) = plan_json(json!([{ "assignee": ["id"] }])).unwrap();
        assert!(template.declares("watchers"));
        let Some(NodeKind::Relation { template, .. }) = template.node("assignee").map(|n| &n.kind)
        else {
            panic!("expected relation node");
        };
        assert!(template.declares("email"));
        assert!(!template.declares("title"));
    }

    #[test]
    fn computed_composite_return() {
        let (_, template) = plan_json(json!(["owner"])).unwrap();
        assert!(matches!(
            template.node("owner").map(|n| &n.kind),
            Some(NodeKind::Computed { template: None })
        ));

        let (plan, template) = plan_json(json!([{ "owner": ["displayName"] }])).unwrap();
        assert!(matches!(
            template.node("owner").map(|n| &n.kind),
            Some(NodeKind::Computed {
                template: Some(SubTemplate::Record(_))
            })
        ));
        assert!(matches!(
            plan.directive("owner"),
            Some(LoadDirective::Computed {
                plan: Some(SubPlan::Record(_)),
                ..
            })
        ));
    }

    #[test]
    fn aggregate_is_bare_only() {
        let err = plan_json(json!([{ "commentCount": ["x"] }])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
    }

    #[test]
    fn embedded_record_with_plain_fields() {
        let (plan, template) = plan_json(json!([{ "location": ["city"] }])).unwrap();
        assert_eq!(plan.select, vec!["location"]);
        assert!(plan.load.is_empty());
        assert!(matches!(
            template.node("location").map(|n| &n.kind),
            Some(NodeKind::Embedded { .. })
        ));
    }

    #[test]
    fn dual_nature_field() {
        let (plan, template) = plan_json(json!([
            { "location": ["city", { "distance": { "arguments": { "unit": "mi" } } }] }
        ]))
        .unwrap();
        assert_eq!(plan.select, vec!["location"]);
        match plan.directive("location") {
            Some(LoadDirective::Embedded {
                plan: SubPlan::Record(sub),
                ..
            }) => {
                assert_eq!(sub.select, vec!["city"]);
                assert!(sub.directive("distance").is_some());
            }
            other => panic!("expected embedded directive, got {other:?}"),
        }
        assert!(matches!(
            template.node("location").map(|n| &n.kind),
            Some(NodeKind::Dual { .. })
        ));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn argument_defaults_are_applied() {
        let (plan, _) = plan_json(json!([
            { "location": [{ "distance": { "arguments": {} } }] }
        ]))
        .unwrap();
        let Some(LoadDirective::Embedded {
            plan: SubPlan::Record(sub),
            ..
        }) = plan.directive("location")
        else {
            panic!("expected embedded directive");
        };
        match sub.directive("distance") {
            Some(LoadDirective::Computed { arguments, .. }) => {
                assert_eq!(arguments.get("unit"), Some(&json!("km")));
            }
            other => panic!("expected computed directive, got {other:?}"),
        }
    }

    #[test]
    fn union_variants() {
        let (plan, template) =
            plan_json(json!([{ "body": ["text", { "image": ["url"] }] }])).unwrap();
        assert_eq!(plan.select, vec!["body"]);
        let Some(NodeKind::Union { template }) = template.node("body").map(|n| &n.kind) else {
            panic!("expected union node");
        };
        assert_eq!(template.variants.get("text"), Some(&VariantTemplate::Full));
        assert!(matches!(
            template.variants.get("image"),
            Some(VariantTemplate::Fields(_))
        ));
    }

    #[test]
    fn unknown_union_variant() {
        let err = plan_json(json!([{ "body": ["video"] }])).unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidUnionVariant {
                path: vec!["body".into(), "video".into()],
                variant: "video".into(),
                expected: vec!["text".into(), "image".into()],
            }
        );
    }

    #[test]
    fn duplicate_selection_is_rejected() {
        let err = plan_json(json!(["title", "title"])).unwrap_err();
        assert_eq!(err.kind(), "InvalidNestedSelectionShape");
        assert_eq!(err.path(), ["title"]);
    }

    #[test]
    fn denied_fields_are_listed() {
        let registry = registry();
        let options = PlanOptions::default();
        let policy = DenyList::new().deny("User", "email");
        let selection =
            parse_selection(&json!([{ "assignee": ["id", "email"] }]), options.max_depth).unwrap();
        let (plan, template) =
            plan_with_policy(&registry, "Task", &selection, &options, &policy).unwrap();

        let Some(LoadDirective::Relation { plan: sub, .. }) = plan.directive("assignee") else {
            panic!("expected relation directive");
        };
        assert_eq!(sub.select, vec!["id"]);
        assert_eq!(sub.denied, vec!["email"]);

        let Some(NodeKind::Relation { template, .. }) = template.node("assignee").map(|n| &n.kind)
        else {
            panic!("expected relation node");
        };
        assert_eq!(template.node("email").map(|n| &n.kind), Some(&NodeKind::Denied));
    }

    #[test]
    fn strict_access_fails() {
        let registry = registry();
        let options = PlanOptions::default().strict_access(true);
        let policy = DenyList::new().deny("Task", "title");
        let selection = parse_selection(&json!(["id", "title"]), options.max_depth).unwrap();
        let err = plan_with_policy(&registry, "Task", &selection, &options, &policy).unwrap_err();
        assert_eq!(
            err,
            PlanError::FieldAccessDenied {
                path: vec!["title".into()]
            }
        );
    }

    #[test]
    fn unknown_root_type() {
        let err = plan(&registry(), "Nope", &[], &PlanOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "UnresolvedType");
    }

    #[test]
    fn depth_guard_for_built_selections() {
        let options = PlanOptions::default().max_depth(1);
        let selection = vec![SelectionNode::nested(
            "assignee",
            vec![SelectionNode::field("id")],
        )];
        let err = plan(&registry(), "Task", &selection, &options).unwrap_err();
        assert_eq!(err.kind(), "DepthExceeded");
    }

    #[test]
    fn plan_serializes() {
        let (plan, _) = plan_json(json!(["id", { "assignee": ["id"] }])).unwrap();
        assert_eq!(
            serde_json::to_value(&plan).unwrap(),
            json!({
                "type": "Task",
                "select": ["id"],
                "load": [{
                    "kind": "relation",
                    "field": "assignee",
                    "cardinality": "one",
                    "plan": { "type": "User", "select": ["id"] }
                }]
            })
        );
    }
}
