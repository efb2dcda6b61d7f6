//! Storage module: the persistent data model and its backends
//!
//! Records live in a flat key-value namespace keyed by type-prefixed content
//! hashes (see [`crate::hash`]). Every write is a field-level merge: an
//! update only touches the fields it supplies. The module owns the record
//! types, the header allow-list, and the two backend implementations.

mod memory;
mod redis;
mod traits;

pub use memory::MemoryStorage;
pub use redis::RedisStorage;
pub use traits::{Storage, StorageError, StorageResult};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

/// Re-check cadence for a group of URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
    Monthly,
}

impl Frequency {
    pub const ALL: [Frequency; 3] = [Frequency::Hourly, Frequency::Daily, Frequency::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }

    /// Storage key of the list of group keys due at this cadence.
    pub fn list_key(&self) -> &'static str {
        self.as_str()
    }

    /// Wall-clock period between sweeps of this cadence.
    pub fn interval(&self) -> Duration {
        match self {
            Self::Hourly => Duration::from_secs(60 * 60),
            Self::Daily => Duration::from_secs(60 * 60 * 24),
            Self::Monthly => Duration::from_secs(60 * 60 * 24 * 30),
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!(
                "unknown frequency '{}' (expected hourly, daily or monthly)",
                other
            )),
        }
    }
}

/// Response headers persisted on a URL record
pub const STORED_HEADERS: &[&str] = &[
    "etag",
    "expires",
    "last-modified",
    "content-type",
    "content-length",
    "content-disposition",
    "content-md5",
    "content-encoding",
    "content-location",
];

/// First hop of a redirect chain observed during a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    /// The URL that answered with a redirect
    pub url: String,
    /// Its 3xx status code
    pub status: u16,
}

/// Outcome of one HTTP probe
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Status code of the final response
    pub status: u16,
    /// Response headers of the final response, names lower-cased
    pub headers: HashMap<String, String>,
    /// Destination after following redirects
    pub final_url: String,
    /// First redirect hop, if the probe saw any
    pub redirect: Option<RedirectHop>,
}

impl ProbeResult {
    /// The result recorded when the target could not be reached at all:
    /// a bare 503 with no headers and no redirect history.
    pub fn synthetic_failure(url: &str) -> Self {
        Self {
            status: 503,
            headers: HashMap::new(),
            final_url: url.to_string(),
            redirect: None,
        }
    }
}

/// A URL record as persisted in storage
///
/// Field names mirror the stored hash fields; the same names appear in the
/// webhook JSON payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    #[serde(rename = "checked-url")]
    pub checked_url: String,

    /// Back-reference to the owning group's record key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,

    #[serde(rename = "final-url", skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    #[serde(rename = "final-status-code", skip_serializing_if = "Option::is_none")]
    pub final_status_code: Option<u16>,

    #[serde(rename = "redirect-url", skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,

    #[serde(
        rename = "redirect-status-code",
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_status_code: Option<u16>,

    /// RFC 3339 timestamp of the last probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,

    /// Captured response headers (and the split-off `charset` field)
    #[serde(flatten)]
    pub headers: BTreeMap<String, String>,
}

impl UrlRecord {
    /// Rebuilds a record from the flat field map a backend hash holds.
    /// Unknown fields are treated as captured headers.
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        let mut record = UrlRecord::default();
        for (field, value) in fields {
            match field.as_str() {
                "checked-url" => record.checked_url = value,
                "group" => record.group = Some(value),
                "frequency" => record.frequency = value.parse().ok(),
                "final-url" => record.final_url = Some(value),
                "final-status-code" => record.final_status_code = value.parse().ok(),
                "redirect-url" => record.redirect_url = Some(value),
                "redirect-status-code" => record.redirect_status_code = value.parse().ok(),
                "updated" => record.updated = Some(value),
                _ => {
                    record.headers.insert(field, value);
                }
            }
        }
        record
    }
}

/// A group record: display name plus member mappings (URL record key → URL)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupRecord {
    pub name: String,

    #[serde(flatten)]
    pub members: BTreeMap<String, String>,
}

impl GroupRecord {
    pub fn from_fields(mut fields: HashMap<String, String>) -> Self {
        let name = fields.remove("name").unwrap_or_default();
        Self {
            name,
            members: fields.into_iter().collect(),
        }
    }

    /// Member URLs in key order.
    pub fn member_urls(&self) -> impl Iterator<Item = &String> {
        self.members.values()
    }
}

/// Flattens a probe outcome into the field writes merged into a URL record.
///
/// When the probe produced headers, every allow-listed field is written —
/// absent ones as empty strings — so values from an earlier probe cannot
/// linger. A probe with no headers (synthetic 503) writes none.
pub(crate) fn metadata_fields(probe: &ProbeResult, updated: String) -> Vec<(String, String)> {
    let mut fields = vec![
        ("final-url".to_string(), probe.final_url.clone()),
        ("final-status-code".to_string(), probe.status.to_string()),
        ("updated".to_string(), updated),
    ];

    if let Some(hop) = &probe.redirect {
        fields.push(("redirect-url".to_string(), hop.url.clone()));
        fields.push(("redirect-status-code".to_string(), hop.status.to_string()));
    }

    if !probe.headers.is_empty() {
        for name in STORED_HEADERS {
            let value = probe.headers.get(*name).cloned().unwrap_or_default();
            if *name == "content-type" {
                let (content_type, charset) = split_content_type(&value);
                fields.push(("content-type".to_string(), content_type));
                if let Some(charset) = charset {
                    fields.push(("charset".to_string(), charset));
                }
            } else {
                fields.push((name.to_string(), value));
            }
        }
    }

    fields
}

/// Splits a `content-type` value carrying a `;charset=` suffix into the bare
/// media type and its charset, both lower-cased and trimmed. Values without
/// a charset parameter pass through verbatim.
pub fn split_content_type(value: &str) -> (String, Option<String>) {
    if let Some((media_type, params)) = value.split_once(';') {
        let params = params.trim().to_ascii_lowercase();
        if let Some(charset) = params.strip_prefix("charset=") {
            return (
                media_type.trim().to_ascii_lowercase(),
                Some(charset.trim().to_string()),
            );
        }
    }
    (value.to_string(), None)
}
