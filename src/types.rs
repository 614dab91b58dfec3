//! Core identifier and value types shared across the engine.
//!
//! Follows the teacher's newtype-with-`Display`-and-raw-accessor pattern
//! (see the former `CollectiveId`/`ExperienceId`), adapted to the data
//! model this crate actually stores: workspaces are opaque strings, and
//! every ConPort entity has an auto-increment `u64` row id rather than a
//! UUID.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a workspace.
///
/// Opaque from the engine's point of view — conventionally a filesystem
/// path chosen by the caller, but never parsed or interpreted as one
/// inside the engine. Two `WorkspaceId`s are equal iff their underlying
/// strings are equal; no normalization (case-folding, path canonicalization)
/// is performed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Creates a new workspace id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self, returning the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkspaceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkspaceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An auto-increment row identifier, unique within one entity table of
/// one workspace.
///
/// Distinct from the teacher's UUIDv7 entity ids: ConPort's entities
/// (`Decision`, `ProgressEntry`, `SystemPattern`, `CustomData`,
/// `ContextLink`, history rows) are keyed by small sequential integers,
/// matching the relational model in `original_source/.../db/models.py`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl RowId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Big-endian bytes, used as a redb table key so lexicographic byte
    /// order matches numeric order.
    #[inline]
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    #[inline]
    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Millisecond-precision UTC timestamp, stored as an `i64` offset from
/// the Unix epoch — kept from the teacher's `Timestamp` representation
/// verbatim, since it already has the big-endian-key-ordering property
/// the relational store's secondary indexes rely on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Returns the current time.
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self(millis)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    #[inline]
    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(i64::from_be_bytes(bytes))
    }

    /// Renders as RFC 3339 / ISO 8601, e.g. `2026-07-28T12:34:56.789Z`.
    ///
    /// Used at the markdown-export and JSON-response boundary only; the
    /// engine's internal representation stays millis-since-epoch.
    pub fn to_rfc3339(self) -> String {
        use chrono::TimeZone;
        chrono::Utc
            .timestamp_millis_opt(self.0)
            .single()
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .unwrap_or_else(|| "1970-01-01T00:00:00.000Z".to_string())
    }

    /// Subtracts a duration given in hours, saturating at `i64::MIN`.
    pub fn minus_hours(self, hours: i64) -> Self {
        Self(self.0.saturating_sub(hours.saturating_mul(3_600_000)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

/// Dynamic JSON content, used for `content`/`value` columns whose shape
/// is caller-defined (`ProductContext.content`, `CustomData.value`, ...).
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// A dense vector representation of text, produced by an
/// [`crate::embedding::EmbeddingService`].
pub type Embedding = Vec<f32>;

/// The set of entity kinds addressable through the vector store's stable
/// id scheme (`"<type>_<row_id>"`), per spec §4.3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Decision,
    ProgressEntry,
    SystemPattern,
    CustomData,
}

impl ItemType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ItemType::Decision => "decision",
            ItemType::ProgressEntry => "progress_entry",
            ItemType::SystemPattern => "system_pattern",
            ItemType::CustomData => "custom_data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(ItemType::Decision),
            "progress_entry" => Some(ItemType::ProgressEntry),
            "system_pattern" => Some(ItemType::SystemPattern),
            "custom_data" => Some(ItemType::CustomData),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builds the stable vector-store id `"<type>_<row_id>"` for an entity.
pub fn item_key(item_type: ItemType, row_id: RowId) -> String {
    format!("{}_{}", item_type.as_str(), row_id.get())
}

/// Parses a stable vector-store id back into its `(ItemType, RowId)` parts.
pub fn parse_item_key(key: &str) -> Option<(ItemType, RowId)> {
    let (type_part, id_part) = key.rsplit_once('_')?;
    let item_type = ItemType::parse(type_part)?;
    let row_id = id_part.parse::<u64>().ok()?;
    Some((item_type, RowId::new(row_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_id_roundtrips_display() {
        let id = WorkspaceId::new("/home/user/project");
        assert_eq!(id.as_str(), "/home/user/project");
        assert_eq!(id.to_string(), "/home/user/project");
    }

    #[test]
    fn workspace_id_equality_is_exact_string_match() {
        assert_ne!(WorkspaceId::new("Foo"), WorkspaceId::new("foo"));
    }

    #[test]
    fn row_id_be_bytes_preserve_ordering() {
        let a = RowId::new(1);
        let b = RowId::new(2);
        assert!(a.to_be_bytes() < b.to_be_bytes());
    }

    #[test]
    fn row_id_be_bytes_roundtrip() {
        let id = RowId::new(123_456);
        assert_eq!(RowId::from_be_bytes(id.to_be_bytes()), id);
    }

    #[test]
    fn timestamp_be_bytes_preserve_ordering() {
        let t1 = Timestamp::from_millis(1000);
        let t2 = Timestamp::from_millis(2000);
        assert!(t1.to_be_bytes() < t2.to_be_bytes());
    }

    #[test]
    fn timestamp_rfc3339_has_expected_shape() {
        let ts = Timestamp::from_millis(0);
        assert_eq!(ts.to_rfc3339(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn timestamp_minus_hours() {
        let ts = Timestamp::from_millis(10 * 3_600_000);
        let earlier = ts.minus_hours(5);
        assert_eq!(earlier.as_millis(), 5 * 3_600_000);
    }

    #[test]
    fn item_type_parse_roundtrip() {
        for ty in [
            ItemType::Decision,
            ItemType::ProgressEntry,
            ItemType::SystemPattern,
            ItemType::CustomData,
        ] {
            assert_eq!(ItemType::parse(ty.as_str()), Some(ty));
        }
    }

    #[test]
    fn item_type_parse_rejects_unknown() {
        assert_eq!(ItemType::parse("not_a_type"), None);
    }

    #[test]
    fn item_key_roundtrip() {
        let key = item_key(ItemType::ProgressEntry, RowId::new(42));
        assert_eq!(key, "progress_entry_42");
        assert_eq!(
            parse_item_key(&key),
            Some((ItemType::ProgressEntry, RowId::new(42)))
        );
    }
}
