//! Field-level edit events and the paths they address.
//!
//! Edits arrive as `(path, operation, previous value, new value)` tuples,
//! one per leaf, using ietf-system instance paths such as
//! `/ietf-system:system/ntp/server[name='ntp1']/udp/port`. This module parses
//! those paths into an entity key plus a field, and generates the same
//! events from two collections so a whole document can be applied as edits.

use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Created,
    Modified,
    Deleted,
    /// Reordering; carries no content change for unordered collections
    Moved,
}

/// One edit to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ChangeEvent {
    pub fn created(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: Operation::Created,
            previous_value: None,
            value: Some(value.into()),
        }
    }

    pub fn modified(
        path: impl Into<String>,
        previous_value: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            operation: Operation::Modified,
            previous_value: Some(previous_value.into()),
            value: Some(value.into()),
        }
    }

    pub fn deleted(path: impl Into<String>, previous_value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: Operation::Deleted,
            previous_value: Some(previous_value.into()),
            value: None,
        }
    }

    /// Whether this event addresses a node of `T`'s list.
    pub fn belongs_to<T: Changeable>(&self) -> bool {
        parse_path(&self.path)
            .map(|segments| list_matches::<T>(&segments))
            .unwrap_or(false)
    }

    /// Resolve the entity key and field this event addresses.
    ///
    /// Returns `None` when the event belongs to another list.
    pub fn target<T: Changeable>(&self) -> Result<Option<EventTarget>> {
        let segments = parse_path(&self.path)?;
        if !list_matches::<T>(&segments) {
            return Ok(None);
        }
        let depth = list_depth::<T>();
        let list = &segments[depth - 1];

        let key = match list.predicate(T::KEY_LEAF) {
            Some(key) => key.to_string(),
            // Leaf-list entries are sometimes addressed by value alone.
            None if T::KEY_LEAF == "." && segments.len() == depth => self
                .value
                .clone()
                .or_else(|| self.previous_value.clone())
                .ok_or_else(|| self.invalid_path("leaf-list entry without a value"))?,
            None => return Err(self.invalid_path("list entry without its key")),
        };

        let rest = &segments[depth..];
        let field = if rest.is_empty() {
            FieldPath::leaf(T::KEY_LEAF)
        } else {
            let mut leaf = rest
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join("/");
            let nested_key = rest
                .iter()
                .find_map(|s| s.predicates.first().map(|(_, v)| v.clone()));
            // A nested list entry node stands for its key leaf.
            if let Some((key_leaf, _)) = rest.last().and_then(|s| s.predicates.first()) {
                leaf = format!("{leaf}/{key_leaf}");
            }
            FieldPath { leaf, nested_key }
        };

        Ok(Some(EventTarget { key, field }))
    }

    fn invalid_path(&self, message: &str) -> Error {
        Error::InvalidPath {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

/// The entity and field an event resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTarget {
    pub key: String,
    pub field: FieldPath,
}

/// A field of an entity, relative to its list entry.
///
/// `leaf` is a schema path such as `udp/port`. Fields inside a nested list
/// (authorized keys of a user) also carry the nested entry's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub leaf: String,
    pub nested_key: Option<String>,
}

impl FieldPath {
    pub fn leaf(leaf: impl Into<String>) -> Self {
        Self {
            leaf: leaf.into(),
            nested_key: None,
        }
    }

    pub fn nested(leaf: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            leaf: leaf.into(),
            nested_key: Some(key.into()),
        }
    }

    /// Processing rank within `T`; unknown fields sort last.
    pub fn rank<T: Changeable>(&self) -> usize {
        T::FIELDS
            .iter()
            .position(|f| *f == self.leaf)
            .unwrap_or(T::FIELDS.len())
    }

    pub fn is_known<T: Changeable>(&self) -> bool {
        self.rank::<T>() < T::FIELDS.len()
    }

    pub(crate) fn unknown<T: Changeable>(&self) -> Error {
        Error::InvalidPath {
            path: format!("{}/{self}", T::LIST_PATH),
            message: format!("{} has no field '{}'", T::KIND, self.leaf),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.nested_key, self.leaf.split_once('/')) {
            (Some(key), Some((list, rest))) => write!(f, "{list}[name={}]/{rest}", quote(key)),
            _ => f.write_str(&self.leaf),
        }
    }
}

/// A list entity that can be edited field by field.
pub trait Changeable: Entity {
    /// Schema path of the list, e.g. `/ietf-system:system/ntp/server`
    const LIST_PATH: &'static str;
    /// Key leaf name; `.` for leaf-lists
    const KEY_LEAF: &'static str;
    /// Field leaves in processing order. The key leaf comes first.
    const FIELDS: &'static [&'static str];

    /// A fresh entity holding only its key.
    fn with_key(key: &str) -> Self;

    /// Set a non-key field; `None` clears it.
    fn set_field(&mut self, field: &FieldPath, value: Option<&str>) -> Result<()>;

    /// Every set field with its textual value, key first.
    fn field_values(&self) -> Vec<(FieldPath, String)>;
}

/// Instance path of one field of the entity `key`.
pub fn field_path<T: Changeable>(key: &str, field: &FieldPath) -> String {
    let entry = format!("{}[{}={}]", T::LIST_PATH, T::KEY_LEAF, quote(key));
    if field.leaf == "." {
        entry
    } else {
        format!("{entry}/{field}")
    }
}

/// Events that turn `old` into `new`.
///
/// Removed entities get a single delete of their key leaf; the batch drops
/// the whole entity on that event.
pub fn diff_collections<T: Changeable>(old: &Collection<T>, new: &Collection<T>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    let key_field = FieldPath::leaf(T::KEY_LEAF);

    for item in old {
        if new.find(item.key()).is_none() {
            events.push(ChangeEvent::deleted(
                field_path::<T>(item.key(), &key_field),
                item.key(),
            ));
        }
    }

    for item in new {
        let after = item.field_values();
        let Some(previous) = old.find(item.key()) else {
            for (field, value) in after {
                events.push(ChangeEvent::created(field_path::<T>(item.key(), &field), value));
            }
            continue;
        };

        let before = previous.field_values();
        for (field, value) in &before {
            if !after.iter().any(|(f, _)| f == field) {
                events.push(ChangeEvent::deleted(
                    field_path::<T>(item.key(), field),
                    value.clone(),
                ));
            }
        }
        for (field, value) in after {
            match before.iter().find(|(f, _)| *f == field) {
                Some((_, old_value)) if *old_value == value => {}
                Some((_, old_value)) => events.push(ChangeEvent::modified(
                    field_path::<T>(item.key(), &field),
                    old_value.clone(),
                    value,
                )),
                None => events.push(ChangeEvent::created(
                    field_path::<T>(item.key(), &field),
                    value,
                )),
            }
        }
    }

    events
}

pub(crate) fn parse_bool(field: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::invalid_value(
            field,
            format!("'{other}' is not a boolean"),
        )),
    }
}

pub(crate) fn parse_port(field: &str, value: &str) -> Result<u16> {
    value
        .parse()
        .map_err(|_| Error::invalid_value(field, format!("'{value}' is not a port number")))
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

// ============================================================================
// Path parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    predicates: Vec<(String, String)>,
}

impl Segment {
    fn predicate(&self, key: &str) -> Option<&str> {
        self.predicates
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn list_depth<T: Changeable>() -> usize {
    T::LIST_PATH.split('/').filter(|s| !s.is_empty()).count()
}

fn list_matches<T: Changeable>(segments: &[Segment]) -> bool {
    let names: Vec<&str> = T::LIST_PATH.split('/').filter(|s| !s.is_empty()).collect();
    segments.len() >= names.len()
        && segments
            .iter()
            .zip(&names)
            .all(|(segment, name)| segment.name == *name)
}

/// Split an instance path into segments, honoring quoted predicate values.
fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let invalid = |message: &str| Error::InvalidPath {
        path: path.to_string(),
        message: message.to_string(),
    };

    let Some(body) = path.strip_prefix('/') else {
        return Err(invalid("path must be absolute"));
    };

    let mut segments = Vec::new();
    let mut name = String::new();
    let mut predicates = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' => {
                if name.is_empty() {
                    return Err(invalid("empty path segment"));
                }
                segments.push(Segment {
                    name: std::mem::take(&mut name),
                    predicates: std::mem::take(&mut predicates),
                });
            }
            '[' => {
                let mut inner = String::new();
                let mut quote: Option<char> = None;
                loop {
                    let Some(c) = chars.next() else {
                        return Err(invalid("unterminated predicate"));
                    };
                    match (quote, c) {
                        (None, ']') => break,
                        (None, '\'' | '"') => quote = Some(c),
                        (Some(q), c) if c == q => quote = None,
                        _ => {}
                    }
                    inner.push(c);
                }
                let Some((key, value)) = inner.split_once('=') else {
                    return Err(invalid("predicate without '='"));
                };
                let value = value.trim();
                let unquoted = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                    .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                    .ok_or_else(|| invalid("predicate value must be quoted"))?;
                predicates.push((key.trim().to_string(), unquoted.to_string()));
            }
            c => name.push(c),
        }
    }

    if name.is_empty() {
        return Err(invalid("path ends with '/'"));
    }
    segments.push(Segment { name, predicates });
    Ok(segments)
}
