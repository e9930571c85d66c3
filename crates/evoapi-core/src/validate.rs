//! Identifier and input validation.
//!
//! Everything here runs before a request is dispatched, so a rejected input
//! never causes network traffic.
//!
//! CHANGELOG:
//! - 10/18/2026 - Added media type and presence enums
//! - 10/18/2026 - Initial implementation

use crate::error::{EvolutionError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Suffix of an individual chat jid.
pub const INDIVIDUAL_SUFFIX: &str = "@s.whatsapp.net";

/// Suffix of a group chat jid.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Maximum text message length (characters).
pub const MAX_TEXT_LENGTH: usize = 65_536;

/// Maximum media caption length (characters).
pub const MAX_CAPTION_LENGTH: usize = 1024;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10,15}$").expect("identifier regex is valid"));

/// A validated phone identifier: 10-15 ASCII digits, no separators, no `+`.
///
/// Only [`normalize`] can build one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedIdentifier(String);

impl NormalizedIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw phone number.
///
/// Strips every non-digit character and requires 10-15 digits to remain.
/// Idempotent on its own output.
pub fn normalize(raw: &str) -> Result<NormalizedIdentifier> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if !IDENTIFIER_RE.is_match(&digits) {
        return Err(EvolutionError::invalid(format!(
            "Invalid number: '{}'. Use international format without '+' (e.g. 5511999999999)",
            raw
        )));
    }

    Ok(NormalizedIdentifier(digits))
}

/// Chat jid for an individual contact.
pub fn to_chat_identifier(id: &NormalizedIdentifier) -> String {
    format!("{}{}", id.0, INDIVIDUAL_SUFFIX)
}

/// Check if a jid names a group chat.
pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// Derive the identifier behind an individual chat jid.
///
/// Anything after `@` is the server part and never part of the number.
pub fn identifier_from_jid(jid: &str) -> Result<NormalizedIdentifier> {
    if is_group_jid(jid) {
        return Err(EvolutionError::invalid(format!(
            "'{}' is a group jid, not a contact",
            jid
        )));
    }

    let user = jid.split('@').next().unwrap_or(jid);
    // Multi-device jids carry a ":device" part after the number
    let user = user.split(':').next().unwrap_or(user);
    normalize(user)
}

/// Validate a media URL.
pub fn validate_url(url: &str, param_name: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(EvolutionError::invalid(format!(
            "{} must not be empty",
            param_name
        )));
    }

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(EvolutionError::invalid(format!(
            "Invalid {}: '{}'. URL must start with http:// or https://",
            param_name, url
        )));
    }

    Ok(())
}

/// Validate text length in characters.
pub fn validate_text_length(text: &str, max_length: usize, param_name: &str) -> Result<()> {
    let length = text.chars().count();
    if length > max_length {
        return Err(EvolutionError::invalid(format!(
            "{} too long: {} characters. Maximum allowed: {} characters",
            param_name, length, max_length
        )));
    }
    Ok(())
}

/// Media kinds accepted by the sendMedia endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Document,
    Image,
    Video,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Audio,
        MediaType::Document,
        MediaType::Image,
        MediaType::Video,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Audio => "audio",
            MediaType::Document => "document",
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self> {
        MediaType::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                EvolutionError::invalid(format!(
                    "Invalid media_type: '{}'. Valid values: {}",
                    s,
                    join_values(MediaType::ALL.iter().map(|m| m.as_str()))
                ))
            })
    }
}

/// Presence states accepted by the presenceUpdate endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Available,
    Composing,
    Recording,
    Unavailable,
}

impl PresenceStatus {
    pub const ALL: [PresenceStatus; 4] = [
        PresenceStatus::Available,
        PresenceStatus::Composing,
        PresenceStatus::Recording,
        PresenceStatus::Unavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Available => "available",
            PresenceStatus::Composing => "composing",
            PresenceStatus::Recording => "recording",
            PresenceStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceStatus {
    type Err = EvolutionError;

    fn from_str(s: &str) -> Result<Self> {
        PresenceStatus::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                EvolutionError::invalid(format!(
                    "Invalid presence: '{}'. Valid values: {}",
                    s,
                    join_values(PresenceStatus::ALL.iter().map(|p| p.as_str()))
                ))
            })
    }
}

fn join_values<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(", ")
}
