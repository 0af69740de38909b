//! Pagination envelope detection.
//!
//! Providers may wrap a list result as
//! `{"items": [...], "total": 10, "hasMore": true}` (offset style) or
//! `{"items": [...], "nextCursor": "abc", "hasMore": true}` (cursor style).
//! Only the items are projected; the metadata is passed through unchanged.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::template::ProjectionTemplate;

/// Keys that hold the page items.
pub const ITEM_KEYS: &[&str] = &["items", "results"];

/// Keys that flag whether more pages exist.
pub const HAS_MORE_KEYS: &[&str] = &["hasMore", "has_more"];

/// Offset-style metadata keys.
pub const OFFSET_KEYS: &[&str] = &["total", "count", "limit", "offset"];

/// Cursor-style metadata keys.
pub const CURSOR_KEYS: &[&str] = &[
    "nextCursor",
    "next_cursor",
    "previousCursor",
    "previous_cursor",
    "after",
    "before",
];

/// Pagination style of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStyle {
    Offset,
    Cursor,
}

/// A detected envelope: the items and where they live.
#[derive(Debug)]
pub struct Envelope<'v> {
    pub style: PageStyle,
    pub items_key: &'v str,
    pub items: &'v [Value],
    pub metadata: &'v Map<String, Value>,
}

/// Detect a pagination envelope around a record list.
///
/// Every key must belong to the envelope vocabulary. A value is never a page
/// when the template's record type declares a field named like the items key,
/// requested or not, or when the template requests that key.
pub fn detect<'v>(value: &'v Value, template: &ProjectionTemplate) -> Option<Envelope<'v>> {
    let map = value.as_object()?;

    let (items_key, items) = map
        .iter()
        .find(|(k, _)| ITEM_KEYS.contains(&k.as_str()))
        .and_then(|(k, v)| Some((k.as_str(), v.as_array()?)))?;

    if template.declares(items_key) || template.node(items_key).is_some() {
        return None;
    }

    let mut style = None;
    let mut has_more = false;
    for key in map.keys().filter(|k| k.as_str() != items_key) {
        let key = key.as_str();
        if CURSOR_KEYS.contains(&key) {
            style = Some(PageStyle::Cursor);
        } else if OFFSET_KEYS.contains(&key) {
            style.get_or_insert(PageStyle::Offset);
        } else if HAS_MORE_KEYS.contains(&key) {
            has_more = true;
        } else {
            return None;
        }
    }

    let style = match (style, has_more) {
        (Some(style), _) => style,
        (None, true) => PageStyle::Offset,
        (None, false) => return None,
    };

    tracing::trace!(?style, items = items.len(), "detected pagination envelope");
    Some(Envelope {
        style,
        items_key,
        items,
        metadata: map,
    })
}
