//! Type descriptors and the schema registry.
//!
//! A [`Registry`] maps type names to [`TypeDescriptor`]s. It is built once,
//! never mutated afterwards, and passed by reference into every planning,
//! formatting and projection call.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::RegistryError;
use crate::naming::NamingConvention;
use crate::types::Visibility;

/// Maximum number of alias hops followed when resolving a named type.
const MAX_ALIAS_HOPS: usize = 32;

/// Leaf value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    String,
    Integer,
    Float,
    /// Arbitrary precision number, carried as a string on the wire.
    Decimal,
    Boolean,
    Uuid,
    Date,
    DateTime,
    Time,
    /// Free-form payload, never inspected.
    Json,
}

impl Primitive {
    /// Parse a primitive type name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Primitive::String),
            "integer" => Some(Primitive::Integer),
            "float" => Some(Primitive::Float),
            "decimal" => Some(Primitive::Decimal),
            "boolean" => Some(Primitive::Boolean),
            "uuid" => Some(Primitive::Uuid),
            "date" => Some(Primitive::Date),
            "datetime" => Some(Primitive::DateTime),
            "time" => Some(Primitive::Time),
            "json" => Some(Primitive::Json),
            _ => None,
        }
    }

    /// Name used in registry documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Float => "float",
            Primitive::Decimal => "decimal",
            Primitive::Boolean => "boolean",
            Primitive::Uuid => "uuid",
            Primitive::Date => "date",
            Primitive::DateTime => "datetime",
            Primitive::Time => "time",
            Primitive::Json => "json",
        }
    }

    /// Opaque values pass through the formatter untouched, even when they
    /// happen to look like objects.
    pub fn is_opaque(&self) -> bool {
        matches!(
            self,
            Primitive::Date | Primitive::DateTime | Primitive::Time | Primitive::Json
        )
    }
}

/// Shape of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    /// Reference to a type registered under this name.
    Named(String),
    Record(Arc<RecordType>),
    Union(Arc<UnionType>),
    Array(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Build an array of `element`.
    pub fn array_of(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    /// Build a reference to a registered type.
    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named(name.into())
    }

    /// Human-readable type expression (`Task[]`, `string`, `{record}`).
    pub fn describe(&self) -> String {
        match self {
            TypeDescriptor::Primitive(p) => p.as_str().to_string(),
            TypeDescriptor::Named(name) => name.clone(),
            TypeDescriptor::Record(r) => r.name.clone().unwrap_or_else(|| "{record}".into()),
            TypeDescriptor::Union(u) => u.name.clone().unwrap_or_else(|| "{union}".into()),
            TypeDescriptor::Array(inner) => format!("{}[]", inner.describe()),
        }
    }
}

/// Number of related records a relation yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

/// Per-field encoding constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Constraints {
    /// The value is free-form; never renamed or re-encoded.
    pub passthrough: bool,
    /// Integers travel as strings on the wire (large identifiers).
    pub string_encoded: bool,
}

/// One argument of a computed field.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    pub name: String,
    pub ty: TypeDescriptor,
    pub required: bool,
    /// Applied when the client omits an optional argument.
    pub default: Option<Value>,
}

/// How a field is obtained.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldKind {
    /// Stored value, fetched directly.
    #[default]
    Attribute,
    /// Another record (or records) reached through a relationship.
    Relation,
    /// Value derived on load, optionally from arguments.
    Computed {
        arguments: IndexMap<String, ArgumentSpec>,
    },
    /// Summary over related records (count, sum, list...).
    Aggregate { function: Option<String> },
}

impl FieldKind {
    /// Stable name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Attribute => "attribute",
            FieldKind::Relation => "relation",
            FieldKind::Computed { .. } => "computed",
            FieldKind::Aggregate { .. } => "aggregate",
        }
    }

    /// True for relations, computed fields and aggregates.
    pub fn is_derived(&self) -> bool {
        !matches!(self, FieldKind::Attribute)
    }
}

/// Schema-level description of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Internal name, as stored in raw results.
    pub name: String,
    pub ty: TypeDescriptor,
    pub kind: FieldKind,
    pub visibility: Visibility,
    /// Client-facing name overriding the naming convention.
    pub alias: Option<String>,
    pub constraints: Constraints,
}

impl FieldDescriptor {
    /// Public attribute of the given type.
    pub fn attribute(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: FieldKind::Attribute,
            visibility: Visibility::Public,
            alias: None,
            constraints: Constraints::default(),
        }
    }

    /// Set the field kind.
    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the client-facing alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the encoding constraints.
    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Name the client uses for this field under `convention`.
    pub fn client_name(&self, convention: NamingConvention) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => convention.apply(&self.name),
        }
    }

    /// Argument signature for computed fields, empty otherwise.
    pub fn arguments(&self) -> Option<&IndexMap<String, ArgumentSpec>> {
        match &self.kind {
            FieldKind::Computed { arguments } => Some(arguments),
            _ => None,
        }
    }
}

/// A record type: an ordered map of fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordType {
    /// Registered name; `None` for inline records.
    pub name: Option<String>,
    pub fields: IndexMap<String, FieldDescriptor>,
}

impl RecordType {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            fields: IndexMap::new(),
        }
    }

    /// Add a field, keyed by its internal name.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Look up a field by internal name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Look up a public field by the name a client sent.
    ///
    /// Matches the alias, the name converted by `convention`, or the
    /// internal name itself, in that order.
    pub fn field_by_client_name(
        &self,
        name: &str,
        convention: NamingConvention,
    ) -> Option<&FieldDescriptor> {
        let public = || self.public_fields();
        public()
            .find(|f| f.alias.as_deref() == Some(name))
            .or_else(|| public().find(|f| f.alias.is_none() && convention.apply(&f.name) == name))
            .or_else(|| public().find(|f| f.name == name))
    }

    pub fn public_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values().filter(|f| f.is_public())
    }

    /// Stored attributes.
    pub fn direct_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .values()
            .filter(|f| matches!(f.kind, FieldKind::Attribute))
    }

    pub fn relations(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .values()
            .filter(|f| matches!(f.kind, FieldKind::Relation))
    }

    pub fn computed(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .values()
            .filter(|f| matches!(f.kind, FieldKind::Computed { .. }))
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .values()
            .filter(|f| matches!(f.kind, FieldKind::Aggregate { .. }))
    }

    /// True when the record exposes relations, computed fields or aggregates.
    pub fn has_derived_fields(&self) -> bool {
        self.fields.values().any(|f| f.kind.is_derived())
    }
}

/// A tagged union of variant types.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnionType {
    /// Registered name; `None` for inline unions.
    pub name: Option<String>,
    /// Discriminator field inside each variant payload. When absent the
    /// union is externally tagged: `{"<tag>": payload}`.
    pub tag: Option<String>,
    pub variants: IndexMap<String, TypeDescriptor>,
}

impl UnionType {
    pub fn variant(&self, tag: &str) -> Option<&TypeDescriptor> {
        self.variants.get(tag)
    }

    pub fn variant_names(&self) -> Vec<String> {
        self.variants.keys().cloned().collect()
    }

    /// Identify the active variant of an internal value.
    ///
    /// Returns the tag (stringified when the discriminator is not a string)
    /// and the variant payload.
    pub fn active_variant<'v>(&self, value: &'v Value) -> Option<(String, &'v Value)> {
        let map = value.as_object()?;
        match &self.tag {
            Some(tag_field) => {
                let tag = tag_string(map.get(tag_field)?)?;
                Some((tag, value))
            }
            None => {
                if map.len() != 1 {
                    return None;
                }
                let (tag, payload) = map.iter().next()?;
                Some((tag.clone(), payload))
            }
        }
    }
}

/// Stringify a discriminator value. Objects, arrays and null are not tags.
pub fn tag_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Immutable catalog of named types.
///
/// Built once and shared by reference; safe for concurrent reads.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: IndexMap<String, TypeDescriptor>,
}

impl Registry {
    /// Build a registry, checking that every named reference resolves and
    /// that relations and aggregates have the right shape.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` on dangling references, alias cycles or
    /// misshaped fields.
    pub fn new(types: IndexMap<String, TypeDescriptor>) -> Result<Self, RegistryError> {
        let registry = Self { types };
        for (name, ty) in &registry.types {
            registry.check_type(ty, &format!("/types/{}", name))?;
            if registry.resolve(ty).is_none() {
                return Err(RegistryError::AliasCycle { name: name.clone() });
            }
        }
        Ok(registry)
    }

    /// Look up a type by name.
    pub fn lookup(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    /// Look up a registered record type.
    pub fn record(&self, name: &str) -> Option<&Arc<RecordType>> {
        match self.resolve(self.lookup(name)?)? {
            TypeDescriptor::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Follow `Named` references until a structural type is reached.
    ///
    /// Returns `None` for unregistered names or alias cycles.
    pub fn resolve<'a>(&'a self, ty: &'a TypeDescriptor) -> Option<&'a TypeDescriptor> {
        let mut current = ty;
        for _ in 0..MAX_ALIAS_HOPS {
            match current {
                TypeDescriptor::Named(name) => current = self.types.get(name)?,
                other => return Some(other),
            }
        }
        None
    }

    /// Resolve `ty` and strip any number of array layers.
    ///
    /// Returns the element type and whether an array was stripped.
    pub fn element<'a>(&'a self, ty: &'a TypeDescriptor) -> Option<(&'a TypeDescriptor, Cardinality)> {
        let mut cardinality = Cardinality::One;
        let mut current = self.resolve(ty)?;
        while let TypeDescriptor::Array(inner) = current {
            cardinality = Cardinality::Many;
            current = self.resolve(inner)?;
        }
        Some((current, cardinality))
    }

    fn check_type(&self, ty: &TypeDescriptor, path: &str) -> Result<(), RegistryError> {
        match ty {
            TypeDescriptor::Primitive(_) => Ok(()),
            TypeDescriptor::Named(name) => {
                if self.types.contains_key(name) {
                    Ok(())
                } else {
                    Err(RegistryError::UnresolvedType {
                        path: path.to_string(),
                        name: name.clone(),
                    })
                }
            }
            TypeDescriptor::Array(inner) => self.check_type(inner, path),
            TypeDescriptor::Union(union) => {
                for (tag, variant) in &union.variants {
                    let variant_path = format!("{}/variants/{}", path, tag);
                    self.check_type(variant, &variant_path)?;
                    if union.tag.is_some() && !self.is_record_like(variant) {
                        return Err(RegistryError::InvalidType {
                            path: variant_path,
                            message: "variants of a tagged union must be records".into(),
                        });
                    }
                }
                Ok(())
            }
            TypeDescriptor::Record(record) => {
                for field in record.fields.values() {
                    let field_path = format!("{}/fields/{}", path, field.name);
                    self.check_type(&field.ty, &field_path)?;
                    if let FieldKind::Computed { arguments } = &field.kind {
                        for arg in arguments.values() {
                            let arg_path = format!("{}/arguments/{}", field_path, arg.name);
                            self.check_type(&arg.ty, &arg_path)?;
                        }
                    }
                    self.check_field_shape(field, &field_path)?;
                }
                Ok(())
            }
        }
    }

    fn check_field_shape(&self, field: &FieldDescriptor, path: &str) -> Result<(), RegistryError> {
        // Named references are checked before this runs, so a failed lookup
        // here can only be an alias cycle, reported by the caller.
        let Some((element, _)) = self.element(&field.ty) else {
            return Ok(());
        };
        match &field.kind {
            FieldKind::Relation if !matches!(element, TypeDescriptor::Record(_)) => {
                Err(RegistryError::InvalidType {
                    path: path.to_string(),
                    message: format!(
                        "relation must target a record type, got {}",
                        field.ty.describe()
                    ),
                })
            }
            FieldKind::Aggregate { .. } if !matches!(element, TypeDescriptor::Primitive(_)) => {
                Err(RegistryError::InvalidType {
                    path: path.to_string(),
                    message: format!(
                        "aggregate must return a primitive or array of primitives, got {}",
                        field.ty.describe()
                    ),
                })
            }
            _ => Ok(()),
        }
    }

    fn is_record_like(&self, ty: &TypeDescriptor) -> bool {
        matches!(self.resolve(ty), Some(TypeDescriptor::Record(_)) | None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> RecordType {
        RecordType::new(Some("User".into()))
            .with_field(FieldDescriptor::attribute(
                "id",
                TypeDescriptor::Primitive(Primitive::Uuid),
            ))
            .with_field(
                FieldDescriptor::attribute("tasks", TypeDescriptor::array_of(TypeDescriptor::named("Task")))
                    .with_kind(FieldKind::Relation),
            )
            .with_field(
                FieldDescriptor::attribute("password_hash", TypeDescriptor::Primitive(Primitive::String))
                    .with_visibility(Visibility::Private),
            )
            .with_field(
                FieldDescriptor::attribute("is_active?", TypeDescriptor::Primitive(Primitive::Boolean))
                    .with_alias("active"),
            )
    }

    fn task() -> RecordType {
        RecordType::new(Some("Task".into())).with_field(FieldDescriptor::attribute(
            "title",
            TypeDescriptor::Primitive(Primitive::String),
        ))
    }

    fn registry() -> Registry {
        let mut types = IndexMap::new();
        types.insert("User".to_string(), TypeDescriptor::Record(Arc::new(user())));
        types.insert("Task".to_string(), TypeDescriptor::Record(Arc::new(task())));
        types.insert("Tasks".to_string(), TypeDescriptor::named("Task"));
        Registry::new(types).unwrap()
    }

    #[test]
    fn resolve_follows_aliases() {
        let registry = registry();
        let alias = TypeDescriptor::named("Tasks");
        let resolved = registry.resolve(&alias).unwrap();
        assert!(matches!(resolved, TypeDescriptor::Record(r) if r.name.as_deref() == Some("Task")));
    }

    #[test]
    fn element_strips_arrays() {
        let registry = registry();
        let ty = TypeDescriptor::array_of(TypeDescriptor::named("Task"));
        let (element, cardinality) = registry.element(&ty).unwrap();
        assert_eq!(cardinality, Cardinality::Many);
        assert!(matches!(element, TypeDescriptor::Record(_)));
    }

    #[test]
    fn dangling_reference_rejected() {
        let mut types = IndexMap::new();
        let record = RecordType::new(Some("A".into()))
            .with_field(FieldDescriptor::attribute("b", TypeDescriptor::named("B")));
        types.insert("A".to_string(), TypeDescriptor::Record(Arc::new(record)));
        let err = Registry::new(types).unwrap_err();
        assert!(matches!(err, RegistryError::UnresolvedType { name, .. } if name == "B"));
    }

    #[test]
    fn alias_cycle_rejected() {
        let mut types = IndexMap::new();
        types.insert("A".to_string(), TypeDescriptor::named("B"));
        types.insert("B".to_string(), TypeDescriptor::named("A"));
        let err = Registry::new(types).unwrap_err();
        assert!(matches!(err, RegistryError::AliasCycle { .. }));
    }

    #[test]
    fn relation_to_primitive_rejected() {
        let mut types = IndexMap::new();
        let record = RecordType::new(Some("A".into())).with_field(
            FieldDescriptor::attribute("b", TypeDescriptor::Primitive(Primitive::String))
                .with_kind(FieldKind::Relation),
        );
        types.insert("A".to_string(), TypeDescriptor::Record(Arc::new(record)));
        let err = Registry::new(types).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidType { .. }));
    }

    #[test]
    fn client_name_lookup() {
        let user = user();
        let convention = NamingConvention::CamelCase;
        assert_eq!(user.field_by_client_name("id", convention).unwrap().name, "id");
        assert_eq!(user.field_by_client_name("active", convention).unwrap().name, "is_active?");
        assert!(user.field_by_client_name("passwordHash", convention).is_none());
        assert!(user.field_by_client_name("isActive", convention).is_none());
    }

    #[test]
    fn fields_partitioned_by_kind() {
        let user = user();
        assert_eq!(user.direct_fields().count(), 3);
        assert_eq!(user.relations().count(), 1);
        assert_eq!(user.computed().count(), 0);
        assert!(user.has_derived_fields());
    }

    #[test]
    fn active_variant_internal_tag() {
        let union = UnionType {
            name: None,
            tag: Some("kind".into()),
            variants: IndexMap::new(),
        };
        let value = json!({"kind": 2, "body": "x"});
        let (tag, payload) = union.active_variant(&value).unwrap();
        assert_eq!(tag, "2");
        assert_eq!(payload, &value);
    }

    #[test]
    fn active_variant_external_tag() {
        let union = UnionType::default();
        let value = json!({"text": {"body": "x"}});
        let (tag, payload) = union.active_variant(&value).unwrap();
        assert_eq!(tag, "text");
        assert_eq!(payload, &json!({"body": "x"}));

        assert!(union.active_variant(&json!({"a": 1, "b": 2})).is_none());
        assert!(union.active_variant(&json!("text")).is_none());
    }
}
