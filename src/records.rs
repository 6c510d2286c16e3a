// Asset record data model
// Raw sheet rows are normalized into AssetRecord values; everything downstream
// of the normalizer works on these and never mutates them in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw string identifier for a network connection point. By convention the
/// first 4 characters are a site prefix and the 5th (if a digit) encodes the
/// voltage class.
pub type NodeToken = String;

// ============================================================================
// ASSET KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetKind {
    Circuit,
    Transformer,
    ReactiveDevice,
}

impl AssetKind {
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Circuit => "Circuit",
            AssetKind::Transformer => "Transformer",
            AssetKind::ReactiveDevice => "Reactive Compensation",
        }
    }

    /// Column the partitioner splits this kind's records by.
    pub fn subtype_column(&self) -> &'static str {
        match self {
            AssetKind::Circuit => "Circuit Type",
            AssetKind::Transformer => "Transformer Type",
            AssetKind::ReactiveDevice => "Compensation Type",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// Closed status vocabulary driving the temporal filter.
///
/// The source data carries two spellings of the removal tag; `"Remove"` and
/// `"Removed"` both normalize to [`Status::Removed`]. Anything unrecognized
/// (including a blank cell) becomes [`Status::Unspecified`], which the filter
/// always admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Existing,
    Addition,
    Removed,
    Change,
    Unspecified,
}

impl Status {
    pub fn parse(raw: Option<&str>) -> Status {
        match raw.map(str::trim) {
            Some("Existing") => Status::Existing,
            Some("Addition") => Status::Addition,
            Some("Removed") | Some("Remove") => Status::Removed,
            Some("Change") => Status::Change,
            _ => Status::Unspecified,
        }
    }

    /// Canonical spelling for export; Unspecified round-trips to a blank cell.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Existing => "Existing",
            Status::Addition => "Addition",
            Status::Removed => "Removed",
            Status::Change => "Change",
            Status::Unspecified => "",
        }
    }
}

// ============================================================================
// ENDPOINTS AND RECORD KEY
// ============================================================================

/// Connection endpoints of an asset. Two-endpoint tuples are order-sensitive:
/// (A, B) and (B, A) are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoints {
    One(NodeToken),
    Two(NodeToken, NodeToken),
}

impl Endpoints {
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            Endpoints::One(node) => vec![node.as_str()],
            Endpoints::Two(a, b) => vec![a.as_str(), b.as_str()],
        }
    }
}

impl fmt::Display for Endpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoints::One(node) => f.write_str(node),
            Endpoints::Two(a, b) => write!(f, "{a} - {b}"),
        }
    }
}

/// Identity key of a record within one reconciled snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: AssetKind,
    pub endpoints: Endpoints,
}

// ============================================================================
// ASSET RECORD
// ============================================================================

/// One normalized asset row. Created by the normalizer, consumed read-only by
/// the temporal filter; Change/Removed operate by key replacement, never by
/// editing an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub kind: AssetKind,
    pub endpoints: Endpoints,
    pub status: Status,
    pub effective_year: Option<i32>,
    /// Sheet/group the row came from.
    pub source_group: String,
    /// Remaining columns (ratings, impedances, subtype markers).
    pub attributes: BTreeMap<String, String>,
}

impl AssetRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            kind: self.kind,
            endpoints: self.endpoints.clone(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

// ============================================================================
// RAW SHEETS
// ============================================================================

/// One sheet of the source workbook as delivered by the ingestion
/// collaborator: a name, a header, and string-valued rows in original order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl RawSheet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// VALUE COERCION
// ============================================================================

/// Parse an effective year, coercing anything malformed to `None`. Spreadsheet
/// exports sometimes deliver years as floats ("2028.0"), so those are accepted.
pub fn parse_year(raw: Option<&str>) -> Option<i32> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i32>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().map(|year| year as i32))
}

/// First `n` characters of a token (the whole token when shorter).
pub fn prefix(token: &str, n: usize) -> &str {
    match token.char_indices().nth(n) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}

// ============================================================================
// TESTS
// ============================================================================
