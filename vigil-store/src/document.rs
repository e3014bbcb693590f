//! The in-memory document and its YAML form.

use std::collections::{BTreeMap, BTreeSet};

use serde_yaml::Value;

/// String keys to arbitrary YAML values, kept sorted so repeated saves
/// produce identical text.
pub type Document = BTreeMap<String, Value>;

/// One key whose value differs between two documents. `None` means absent.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub key: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Parse document text. Empty input and a bare `null` are empty documents.
///
/// A key whose value is null has no value, so it is dropped.
pub fn parse(text: &str) -> Result<Document, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Document::new());
    }
    let doc: Option<Document> = serde_yaml::from_str(text)?;
    let mut doc = doc.unwrap_or_default();
    doc.retain(|_, value| !value.is_null());
    Ok(doc)
}

pub fn to_yaml(doc: &Document) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(doc)
}

/// Keys present in either document whose values are not structurally equal.
pub fn diff(old: &Document, new: &Document) -> Vec<KeyChange> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let before = old.get(key);
            let after = new.get(key);
            (before != after).then(|| KeyChange {
                key: key.clone(),
                old: before.cloned(),
                new: after.cloned(),
            })
        })
        .collect()
}
