use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Status label the authority reports for a store once it is serving traffic.
pub const ACTIVE_STATUS: &str = "Active";

/// A remotely provisioned store as reported by the authority.
///
/// `name` is the natural key. `status` is kept as the raw label the authority
/// sends (`Active`, `Provisioning`, ...) since the set of values is owned by
/// the server. `created` is display data only: a missing, null or unreadable
/// value becomes `None` rather than failing the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub name: String,
    pub status: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created: Option<DateTime<Utc>>,
}

impl Store {
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// Accepts RFC 3339, or a naive ISO 8601 datetime read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawTimestamp>::deserialize(deserializer)? {
        Some(RawTimestamp::Text(raw)) => parse_timestamp(&raw),
        Some(RawTimestamp::Other(_)) | None => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    WooCommerce,
}
