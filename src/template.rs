//! Projection templates - how to extract and format what was requested.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::schema::{Cardinality, FieldDescriptor, RecordType, UnionType};

/// Ordered extraction instructions for one record level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectionTemplate {
    /// Record type the template was planned against.
    #[serde(skip)]
    pub record: Option<Arc<RecordType>>,
    pub fields: Vec<TemplateNode>,
}

impl ProjectionTemplate {
    pub fn for_record(record: Arc<RecordType>) -> Self {
        Self {
            record: Some(record),
            fields: Vec::new(),
        }
    }

    /// True when the record type declares a field with this internal name,
    /// whether or not it was requested.
    pub fn declares(&self, name: &str) -> bool {
        self.record
            .as_ref()
            .is_some_and(|record| record.field(name).is_some())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find the node for an internal field name.
    pub fn node(&self, name: &str) -> Option<&TemplateNode> {
        self.fields.iter().find(|n| n.name == name)
    }
}

/// One requested field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateNode {
    /// Internal field name, the key read from raw results.
    pub name: String,
    #[serde(skip)]
    pub descriptor: FieldDescriptor,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Classification of a requested field and its sub-template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Primitive or opaque attribute, copied through the formatter.
    Direct,
    /// Record-typed attribute with only plain sub-attributes requested.
    Embedded { template: ProjectionTemplate },
    /// Composite attribute that is fetched directly and also carries
    /// requested derived sub-fields.
    Dual { template: SubTemplate },
    Relation {
        cardinality: Cardinality,
        template: ProjectionTemplate,
    },
    /// Computed value; without a template it is emitted in full.
    Computed {
        #[serde(skip_serializing_if = "Option::is_none")]
        template: Option<SubTemplate>,
    },
    Aggregate,
    /// Union-typed attribute.
    Union { template: UnionTemplate },
    /// Refused by the access policy; emitted as null.
    Denied,
}

/// Template applied to a composite value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTemplate {
    Record(ProjectionTemplate),
    Union(UnionTemplate),
}

/// Requested variants of a union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionTemplate {
    #[serde(skip)]
    pub union: Arc<UnionType>,
    pub variants: IndexMap<String, VariantTemplate>,
}

/// How one selected variant is emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantTemplate {
    /// Bare tag: the variant payload is emitted in full.
    Full,
    Fields(ProjectionTemplate),
}
