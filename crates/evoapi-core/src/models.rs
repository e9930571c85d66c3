//! Wire models for contact and chat listings.
//!
//! Unknown upstream fields are kept in `extra` so listings round-trip
//! to callers intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::validate::{self, NormalizedIdentifier};

/// A contact as returned by `findContacts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    #[serde(default)]
    pub remote_jid: String,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContactRecord {
    /// Groups are flagged upstream or recognizable by their jid suffix.
    pub fn is_group(&self) -> bool {
        self.is_group.unwrap_or(false) || validate::is_group_jid(&self.remote_jid)
    }

    /// Normalized identifier behind the contact jid.
    pub fn identifier(&self) -> Result<NormalizedIdentifier> {
        validate::identifier_from_jid(&self.remote_jid)
    }

    /// Display name, with empty/blank names treated as absent.
    pub fn display_name(&self) -> Option<&str> {
        non_blank(self.push_name.as_deref())
    }

    /// Parse a `findContacts` response.
    ///
    /// The API answers with a bare list. Anything else is logged and yields
    /// no contacts; malformed entries are skipped.
    pub fn list_from_value(value: Value) -> Vec<ContactRecord> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value(item) {
                    Ok(contact) => Some(contact),
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping malformed contact record");
                        None
                    }
                })
                .collect(),
            other => {
                tracing::warn!(
                    kind = json_kind(&other),
                    "unexpected findContacts response format"
                );
                Vec::new()
            }
        }
    }
}

/// One conversation from `findChats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    #[serde(default)]
    pub remote_jid: Option<String>,
    #[serde(default)]
    pub push_name: Option<String>,
    /// Set when the name was filled from the contact cache
    #[serde(rename = "_enriched", default, skip_serializing_if = "is_false")]
    pub enriched: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatSummary {
    pub fn new(remote_jid: impl Into<String>, push_name: Option<&str>) -> Self {
        Self {
            remote_jid: Some(remote_jid.into()),
            push_name: push_name.map(String::from),
            enriched: false,
            extra: Map::new(),
        }
    }

    /// True when the chat carries no usable name.
    pub fn needs_name(&self) -> bool {
        non_blank(self.push_name.as_deref()).is_none()
    }

    pub fn is_group(&self) -> bool {
        self.remote_jid
            .as_deref()
            .map(validate::is_group_jid)
            .unwrap_or(false)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
