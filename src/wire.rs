//! Plaintext wire format: a JSON array of bookmark and folder records.
//!
//! Incoming data is untrusted. [`validate`] walks the whole value before
//! anything is handed to the tree builder and rejects any record that does
//! not match the schema exactly, including records carrying fields we do not
//! know about.

use crate::error::{SyncResult, ValidationError};
use serde::Serialize;
use serde_json::{Map, Value};

/// Deepest nesting the tree accepts, counting top-level records as 1. Keeps
/// every tree we write well inside the JSON decoder's recursion limit.
pub const MAX_DEPTH: usize = 32;

const BOOKMARK_FIELDS: &[&str] = &["id", "title", "description", "url", "tags"];
const FOLDER_FIELDS: &[&str] = &["id", "title", "children"];

/// A validated record. Bookmark iff the source carried `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Item {
    Bookmark(BookmarkRecord),
    Folder(FolderRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    // always emitted, a folder without `children` would read back as nothing
    pub children: Vec<Item>,
}

impl Item {
    pub fn id(&self) -> i64 {
        match self {
            Item::Bookmark(b) => b.id,
            Item::Folder(f) => f.id,
        }
    }

    /// Number of records in this subtree, itself included.
    pub fn count(&self) -> usize {
        match self {
            Item::Bookmark(_) => 1,
            Item::Folder(f) => 1 + f.children.iter().map(Item::count).sum::<usize>(),
        }
    }
}

/// Validate and normalize an untrusted top-level value.
///
/// Absent `title`/`description` become `None`, absent `tags` an empty list.
/// An explicit empty string stays `Some("")`.
pub fn validate(value: &Value) -> Result<Vec<Item>, ValidationError> {
    validate_items(value, "$", 1)
}

/// Decode decrypted bytes and validate them in one step.
pub fn parse(bytes: &[u8]) -> SyncResult<Vec<Item>> {
    let value: Value = serde_json::from_slice(bytes)?;
    Ok(validate(&value)?)
}

/// Encode records as compact JSON (the plaintext that gets encrypted).
pub fn to_json(items: &[Item]) -> Result<String, serde_json::Error> {
    serde_json::to_string(items)
}

// recursion is bounded by MAX_DEPTH
fn validate_items(value: &Value, path: &str, depth: usize) -> Result<Vec<Item>, ValidationError> {
    let arr = value
        .as_array()
        .ok_or_else(|| ValidationError::new(path, format!("expected array, got {}", kind(value))))?;
    arr.iter()
        .enumerate()
        .map(|(i, v)| validate_item(v, &format!("{}[{}]", path, i), depth))
        .collect()
}

fn validate_item(value: &Value, path: &str, depth: usize) -> Result<Item, ValidationError> {
    if depth > MAX_DEPTH {
        return Err(ValidationError::new(path, format!("nested deeper than {} levels", MAX_DEPTH)));
    }
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::new(path, format!("expected object, got {}", kind(value))))?;

    if obj.contains_key("url") {
        reject_unknown(obj, BOOKMARK_FIELDS, path)?;
        Ok(Item::Bookmark(BookmarkRecord {
            id: required_id(obj, path)?,
            title: optional_string(obj, "title", path)?,
            description: optional_string(obj, "description", path)?,
            url: required_string(obj, "url", path)?,
            tags: optional_tags(obj, path)?,
        }))
    } else if let Some(children) = obj.get("children") {
        reject_unknown(obj, FOLDER_FIELDS, path)?;
        Ok(Item::Folder(FolderRecord {
            id: required_id(obj, path)?,
            title: optional_string(obj, "title", path)?,
            children: validate_items(children, &format!("{}.children", path), depth + 1)?,
        }))
    } else {
        Err(ValidationError::new(path, "record has neither `url` nor `children`"))
    }
}

fn reject_unknown(obj: &Map<String, Value>, allowed: &[&str], path: &str) -> Result<(), ValidationError> {
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(ValidationError::new(&format!("{}.{}", path, key), "unknown field")),
        None => Ok(()),
    }
}

fn required_id(obj: &Map<String, Value>, path: &str) -> Result<i64, ValidationError> {
    let field = format!("{}.id", path);
    match obj.get("id") {
        None => Err(ValidationError::new(&field, "missing")),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| ValidationError::new(&field, format!("expected integer, got {}", kind(v)))),
    }
}

fn required_string(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, ValidationError> {
    optional_string(obj, key, path)?
        .ok_or_else(|| ValidationError::new(&format!("{}.{}", path, key), "missing"))
}

fn optional_string(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<String>, ValidationError> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ValidationError::new(
            &format!("{}.{}", path, key),
            format!("expected string, got {}", kind(other)),
        )),
    }
}

fn optional_tags(obj: &Map<String, Value>, path: &str) -> Result<Vec<String>, ValidationError> {
    let field = format!("{}.tags", path);
    let Some(value) = obj.get("tags") else {
        return Ok(Vec::new());
    };
    let arr = value
        .as_array()
        .ok_or_else(|| ValidationError::new(&field, format!("expected array, got {}", kind(value))))?;
    arr.iter()
        .enumerate()
        .map(|(i, tag)| match tag {
            Value::String(s) => Ok(s.clone()),
            other => Err(ValidationError::new(
                &format!("{}[{}]", field, i),
                format!("expected string, got {}", kind(other)),
            )),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
