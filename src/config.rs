// Network collation configuration
// All lookup tables the pipeline depends on live here as explicit immutable
// values, so the same logic can run against a different regional dataset
// without touching component code.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::records::AssetKind;

/// Authority label used when a sheet tag has no mapping.
pub const UNKNOWN_AUTHORITY: &str = "Unknown";

// ============================================================================
// NETWORK CONFIG
// ============================================================================

/// Immutable configuration for one collation run.
///
/// The defaults in [`NetworkConfig::gb_default`] describe the GB transmission
/// dataset (ETYS Appendix B): sheet groups named `B-<category>-<sub><tag>`,
/// where the trailing tag character identifies the owning authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Target year for the as-of snapshot.
    pub target_year: i32,

    /// Authorities whose sheets are retained; everything else is dropped.
    pub selected_authorities: BTreeSet<String>,

    /// Trailing sheet-name character → owning authority.
    pub authority_tags: BTreeMap<char, String>,

    /// 5th-character voltage digit → kV class.
    pub voltage_map: BTreeMap<char, String>,

    /// Column-name synonyms unified before concatenation.
    pub column_synonyms: BTreeMap<String, String>,

    /// Index sheets carrying Site Code / Voltage (kV) / Site Name triples.
    pub index_sheets: Vec<String>,

    /// Circuit sheets, in concatenation order.
    pub circuit_sheets: Vec<String>,

    /// Transformer sheets, in concatenation order.
    pub transformer_sheets: Vec<String>,

    /// Reactive-compensation sheets, in concatenation order.
    pub reactive_sheets: Vec<String>,

    /// Capacity (MW) above which an entity is expected to connect at a
    /// 275/400 kV node. Drives the 4-character-prefix tie-break.
    pub high_capacity_mw: f64,
}

impl NetworkConfig {
    /// The GB transmission configuration.
    pub fn gb_default(target_year: i32) -> Self {
        let authority_tags: BTreeMap<char, String> = [
            ('a', "SHET"),
            ('b', "SPT"),
            ('c', "NGET"),
            ('d', "OFTO"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();

        let voltage_map: BTreeMap<char, String> = [
            ('1', "132"),
            ('2', "275"),
            ('3', "33"),
            ('4', "400"),
            ('5', "11"),
            ('6', "66"),
            ('7', "25"),
            ('8', "22"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();

        let column_synonyms: BTreeMap<String, String> = [
            ("Node1", "Node 1"),
            ("Node2", "Node 2"),
            ("OHL Length(km)", "OHL Length (km)"),
            ("Cable Length(km)", "Cable Length (km)"),
            ("Rating (MVA)", "Winter Rating (MVA)"),
            ("R (% on 100 MVA)", "R (% on 100MVA)"),
            ("X (% on 100 MVA)", "X (% on 100MVA)"),
            ("B (% on 100 MVA)", "B (% on 100MVA)"),
            ("Mvar Generation", "MVAr Generation"),
            ("Mvar Absorption", "MVAr Absorption"),
            ("MVar Generation", "MVAr Generation"),
            ("MVar Absorption", "MVAr Absorption"),
            ("Planned from year", "Year"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        NetworkConfig {
            target_year,
            selected_authorities: ["SHET", "SPT", "NGET"]
                .into_iter()
                .map(String::from)
                .collect(),
            authority_tags,
            voltage_map,
            column_synonyms,
            index_sheets: sheet_series("B-1", &["1"]),
            circuit_sheets: sheet_series("B-2", &["1", "2"]),
            transformer_sheets: sheet_series("B-3", &["1", "2"]),
            reactive_sheets: sheet_series("B-4", &["1", "2"]),
            high_capacity_mw: 100.0,
        }
    }

    /// Replace the authority allow-set.
    pub fn with_authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_authorities = authorities.into_iter().map(Into::into).collect();
        self
    }

    /// Map a sheet/group name to its owning authority via the trailing tag
    /// character. Unmapped tags yield `None`.
    pub fn authority_for_sheet(&self, sheet_name: &str) -> Option<&str> {
        let tag = sheet_name.chars().last()?;
        self.authority_tags.get(&tag).map(String::as_str)
    }

    /// Whether a sheet belongs to one of the selected authorities.
    pub fn sheet_is_selected(&self, sheet_name: &str) -> bool {
        self.authority_for_sheet(sheet_name)
            .is_some_and(|authority| self.selected_authorities.contains(authority))
    }

    /// Sheets configured for the given asset kind, in concatenation order.
    pub fn sheets_for(&self, kind: AssetKind) -> &[String] {
        match kind {
            AssetKind::Circuit => &self.circuit_sheets,
            AssetKind::Transformer => &self.transformer_sheets,
            AssetKind::ReactiveDevice => &self.reactive_sheets,
        }
    }

    /// Canonical name for a raw column header: trimmed, then passed through
    /// the synonym table.
    pub fn canonical_column(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        self.column_synonyms
            .get(trimmed)
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }
}

/// Expand `<prefix>-<sub><tag>` sheet names over every configured subcategory
/// and authority tag, e.g. `B-2` → `B-2-1a ... B-2-2d`.
fn sheet_series(prefix: &str, subcategories: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    for sub in subcategories {
        for tag in ['a', 'b', 'c', 'd'] {
            names.push(format!("{prefix}-{sub}{tag}"));
        }
    }
    names
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gb_default_sheet_series() {
        let config = NetworkConfig::gb_default(2028);

        assert_eq!(config.index_sheets.len(), 4);
        assert_eq!(config.circuit_sheets.len(), 8);
        assert_eq!(config.circuit_sheets[0], "B-2-1a");
        assert_eq!(config.circuit_sheets[7], "B-2-2d");
        assert_eq!(config.reactive_sheets[4], "B-4-2a");
    }

    #[test]
    fn test_authority_for_sheet() {
        let config = NetworkConfig::gb_default(2028);

        assert_eq!(config.authority_for_sheet("B-2-1a"), Some("SHET"));
        assert_eq!(config.authority_for_sheet("B-3-2c"), Some("NGET"));
        assert_eq!(config.authority_for_sheet("B-2-1z"), None);
        assert_eq!(config.authority_for_sheet(""), None);
    }

    #[test]
    fn test_sheet_is_selected() {
        let config = NetworkConfig::gb_default(2028);

        assert!(config.sheet_is_selected("B-2-1c")); // NGET
        assert!(!config.sheet_is_selected("B-2-1d")); // OFTO not selected by default

        let with_ofto = config.with_authorities(["NGET", "OFTO"]);
        assert!(with_ofto.sheet_is_selected("B-2-1d"));
        assert!(!with_ofto.sheet_is_selected("B-2-1a"));
    }

    #[test]
    fn test_canonical_column_synonyms() {
        let config = NetworkConfig::gb_default(2028);

        assert_eq!(config.canonical_column("Node1"), "Node 1");
        assert_eq!(config.canonical_column(" Node 2 "), "Node 2");
        assert_eq!(config.canonical_column("MVar Generation"), "MVAr Generation");
        assert_eq!(config.canonical_column("Planned from year"), "Year");
        assert_eq!(config.canonical_column("Circuit Type"), "Circuit Type");
    }
}
