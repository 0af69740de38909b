//! Field access policies consulted while planning.

use std::collections::HashSet;

use crate::schema::FieldDescriptor;

/// Decides whether a requested field may be loaded.
///
/// A denied field is not an invalid request: it resolves to `null` in the
/// response unless strict access mode is on.
pub trait AccessPolicy {
    /// `type_name` is `None` for inline records.
    fn can_load(&self, type_name: Option<&str>, field: &FieldDescriptor) -> bool;
}

/// Allows every public field.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn can_load(&self, _type_name: Option<&str>, _field: &FieldDescriptor) -> bool {
        true
    }
}

/// Denies listed `(type, field)` pairs. A type of `*` matches every type.
#[derive(Debug, Clone, Default)]
pub struct DenyList {
    entries: HashSet<(String, String)>,
}

impl DenyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny `field` on `type_name`.
    pub fn deny(mut self, type_name: impl Into<String>, field: impl Into<String>) -> Self {
        self.entries.insert((type_name.into(), field.into()));
        self
    }

    /// Parse `Type.field` entries as given on the command line.
    pub fn parse(entries: &[String]) -> Result<Self, String> {
        entries.iter().try_fold(Self::new(), |list, entry| {
            match entry.split_once('.') {
                Some((ty, field)) if !ty.is_empty() && !field.is_empty() => {
                    Ok(list.deny(ty, field))
                }
                _ => Err(format!("invalid deny entry \"{}\": expected Type.field", entry)),
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AccessPolicy for DenyList {
    fn can_load(&self, type_name: Option<&str>, field: &FieldDescriptor) -> bool {
        let denied = |ty: &str| self.entries.contains(&(ty.to_string(), field.name.clone()));
        !(denied("*") || type_name.is_some_and(denied))
    }
}

impl<F> AccessPolicy for F
where
    F: Fn(Option<&str>, &FieldDescriptor) -> bool,
{
    fn can_load(&self, type_name: Option<&str>, field: &FieldDescriptor) -> bool {
        self(type_name, field)
    }
}
