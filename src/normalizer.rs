// Record Normalizer
// Turns raw workbook sheets into uniform per-kind record lists: sheets are
// kept only when their trailing authority tag is in the allow-set, column
// synonyms are unified, and every record is stamped with its origin sheet.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::NetworkConfig;
use crate::diagnostics::{CollateError, DiagnosticKind, Diagnostics};
use crate::records::{parse_year, AssetKind, AssetRecord, Endpoints, RawSheet, Status};

/// Normalized output, one list per asset kind, each in stable input order
/// (configured sheet order, then original row order).
#[derive(Debug, Clone, Default)]
pub struct NormalizedRecords {
    pub circuits: Vec<AssetRecord>,
    pub transformers: Vec<AssetRecord>,
    pub reactive_devices: Vec<AssetRecord>,
}

// ============================================================================
// RECORD NORMALIZER
// ============================================================================

pub struct RecordNormalizer<'a> {
    config: &'a NetworkConfig,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(config: &'a NetworkConfig) -> Self {
        RecordNormalizer { config }
    }

    /// Normalize all provided sheets into per-kind record lists.
    ///
    /// Sheets whose authority is not selected are silently dropped. Selected
    /// sheets that are absent or empty produce a `MissingSource` diagnostic
    /// and are skipped. If nothing at all survives selection, the run aborts.
    pub fn normalize(
        &self,
        sheets: &[RawSheet],
        diags: &mut Diagnostics,
    ) -> Result<NormalizedRecords, CollateError> {
        let selected: BTreeMap<&str, &RawSheet> = sheets
            .iter()
            .filter(|sheet| self.config.sheet_is_selected(&sheet.name))
            .map(|sheet| (sheet.name.as_str(), sheet))
            .collect();

        if selected.is_empty() {
            return Err(CollateError::NoRelevantSheets);
        }
        info!(selected = selected.len(), "sheets retained after authority filtering");

        let normalized = NormalizedRecords {
            circuits: self.concatenate_kind(AssetKind::Circuit, &selected, diags),
            transformers: self.concatenate_kind(AssetKind::Transformer, &selected, diags),
            reactive_devices: self.concatenate_kind(AssetKind::ReactiveDevice, &selected, diags),
        };

        info!(
            circuits = normalized.circuits.len(),
            transformers = normalized.transformers.len(),
            reactive = normalized.reactive_devices.len(),
            "sheets concatenated"
        );
        Ok(normalized)
    }

    /// Concatenate every selected sheet of one kind, in configured order.
    fn concatenate_kind(
        &self,
        kind: AssetKind,
        selected: &BTreeMap<&str, &RawSheet>,
        diags: &mut Diagnostics,
    ) -> Vec<AssetRecord> {
        let mut records = Vec::new();
        for sheet_name in self.config.sheets_for(kind) {
            if !self.config.sheet_is_selected(sheet_name) {
                continue;
            }
            let Some(sheet) = selected.get(sheet_name.as_str()) else {
                diags.push(
                    DiagnosticKind::MissingSource,
                    sheet_name.clone(),
                    format!("{kind} sheet '{sheet_name}' is missing"),
                );
                continue;
            };
            if sheet.is_empty() {
                diags.push(
                    DiagnosticKind::MissingSource,
                    sheet_name.clone(),
                    format!("{kind} sheet '{sheet_name}' is empty"),
                );
                continue;
            }
            let before = records.len();
            for row in &sheet.rows {
                if let Some(record) = self.record_from_row(kind, sheet_name, row) {
                    records.push(record);
                }
            }
            debug!(sheet = %sheet_name, rows = records.len() - before, "sheet normalized");
        }
        records
    }

    /// Build one record from a raw row, unifying column synonyms first.
    /// Rows without usable endpoint tokens cannot carry an identity key and
    /// are dropped.
    fn record_from_row(
        &self,
        kind: AssetKind,
        sheet_name: &str,
        row: &BTreeMap<String, String>,
    ) -> Option<AssetRecord> {
        let mut columns: BTreeMap<String, String> = BTreeMap::new();
        for (raw_name, value) in row {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            columns.insert(self.config.canonical_column(raw_name), value.to_string());
        }

        let endpoints = match kind {
            AssetKind::ReactiveDevice => columns
                .remove("Node")
                .map(|node| Endpoints::One(node.trim().to_string())),
            _ => match (columns.remove("Node 1"), columns.remove("Node 2")) {
                (Some(a), Some(b)) => {
                    Some(Endpoints::Two(a.trim().to_string(), b.trim().to_string()))
                }
                _ => None,
            },
        };
        let Some(endpoints) = endpoints else {
            debug!(sheet = %sheet_name, "row dropped: no endpoint tokens");
            return None;
        };
        let status = Status::parse(columns.remove("Status").as_deref());
        let effective_year = parse_year(columns.remove("Year").as_deref());

        let mut attributes = columns;
        if kind == AssetKind::Transformer {
            attributes
                .entry("Transformer Type".to_string())
                .or_insert_with(|| "Transformer".to_string());
        }

        Some(AssetRecord {
            kind,
            endpoints,
            status,
            effective_year,
            source_group: sheet_name.to_string(),
            attributes,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
