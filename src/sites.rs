// Site/Geo Merger
// Attaches site names and coordinates to canonical nodes. The primary join is
// on a composite merge key (4-char prefix + voltage class); unmatched nodes
// fall back to a prefix-only join, then to a name synthesized from the token
// prefix with an explicit marker.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::records::{prefix, RawSheet};
use crate::resolver::NodeRegistry;
use crate::config::NetworkConfig;

/// Marker appended to synthesized site names so downstream consumers can tell
/// them apart from authoritative ones.
const SYNTHESIZED_MARKER: &str = "(Node Name used)";

// ============================================================================
// REFERENCE TABLES
// ============================================================================

/// One Site Code / Site Name / Voltage triple from the index sheets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_code: String,
    pub site_name: String,
    pub voltage_kv: i32,
}

impl SiteRecord {
    /// Reference-side merge key: 4-char site-code prefix + voltage as an
    /// integer string.
    pub fn merge_key(&self) -> String {
        format!("{}-{}", prefix(&self.site_code, 4), self.voltage_kv)
    }

    /// Collect site records from the configured index sheets. Sheets that are
    /// absent, empty, or missing the required columns are skipped with a
    /// diagnostic; rows with unusable values are dropped.
    pub fn from_index_sheets(
        sheets: &[RawSheet],
        config: &NetworkConfig,
        diags: &mut Diagnostics,
    ) -> Vec<SiteRecord> {
        const REQUIRED: [&str; 3] = ["Site Code", "Voltage (kV)", "Site Name"];

        let mut records = Vec::new();
        for sheet_name in &config.index_sheets {
            let Some(sheet) = sheets.iter().find(|s| &s.name == sheet_name) else {
                diags.push(
                    DiagnosticKind::MissingSource,
                    sheet_name.clone(),
                    format!("index sheet '{sheet_name}' is missing"),
                );
                continue;
            };
            if !REQUIRED.iter().all(|col| sheet.columns.iter().any(|c| c == col)) {
                diags.push(
                    DiagnosticKind::MissingSource,
                    sheet_name.clone(),
                    format!("index sheet '{sheet_name}' lacks the Site Code / Voltage (kV) / Site Name columns"),
                );
                continue;
            }
            for row in &sheet.rows {
                let code = row.get("Site Code").map(|v| v.trim()).unwrap_or_default();
                let name = row.get("Site Name").map(|v| v.trim()).unwrap_or_default();
                let voltage = row
                    .get("Voltage (kV)")
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .map(|kv| kv as i32);
                let Some(voltage) = voltage else { continue };
                if code.is_empty() || name.is_empty() {
                    continue;
                }
                records.push(SiteRecord {
                    site_code: code.to_string(),
                    site_name: name.to_string(),
                    voltage_kv: voltage,
                });
            }
        }
        info!(sites = records.len(), "site reference table compiled");
        records
    }
}

/// One coordinate row from the substation coordinates table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteCoordinates {
    pub site_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

// ============================================================================
// SITE MERGER
// ============================================================================

pub struct SiteMerger {
    sites: Vec<SiteRecord>,
    /// Deduplicated by full site code, first occurrence wins.
    coordinates: Vec<SiteCoordinates>,
}

impl SiteMerger {
    pub fn new(sites: Vec<SiteRecord>, coordinates: Vec<SiteCoordinates>) -> Self {
        let mut seen: Vec<&str> = Vec::new();
        let mut deduped = Vec::new();
        for coord in &coordinates {
            let code = coord.site_code.trim();
            if code.is_empty() || seen.contains(&code) {
                continue;
            }
            seen.push(code);
            deduped.push(SiteCoordinates {
                site_code: code.to_string(),
                latitude: coord.latitude,
                longitude: coord.longitude,
            });
        }
        SiteMerger {
            sites,
            coordinates: deduped,
        }
    }

    /// Enrich every node in the registry with a site name, display name, and
    /// coordinates.
    pub fn enrich(&self, registry: &mut NodeRegistry, diags: &mut Diagnostics) {
        let mut synthesized = 0usize;
        for node in registry.nodes_mut() {
            let node_prefix = prefix(&node.token, 4).to_string();

            // Primary: exact merge-key join.
            let merge_key = format!("{node_prefix}-{}", node.voltage_class);
            let mut site_name = self
                .sites
                .iter()
                .find(|site| site.merge_key() == merge_key)
                .map(|site| site.site_name.clone());

            // Secondary: prefix-only join, ignoring voltage.
            if site_name.is_none() {
                site_name = self
                    .sites
                    .iter()
                    .find(|site| prefix(&site.site_code, 4) == node_prefix)
                    .map(|site| site.site_name.clone());
            }

            // Tertiary: synthesize from the token prefix, marked as such.
            let site_name = site_name.unwrap_or_else(|| {
                synthesized += 1;
                diags.push(
                    DiagnosticKind::UnresolvedIdentity,
                    node.token.clone(),
                    format!("no site record matched '{}'; name synthesized from the token", node.token),
                );
                format!("{node_prefix} {SYNTHESIZED_MARKER}")
            });

            node.full_name = Some(format!("{site_name} {}kV", node.voltage_class));
            node.site_name = Some(site_name);

            // Coordinates are a separate prefix-only join.
            match self
                .coordinates
                .iter()
                .find(|coord| prefix(&coord.site_code, 4) == node_prefix)
            {
                Some(coord) => {
                    node.latitude = Some(coord.latitude);
                    node.longitude = Some(coord.longitude);
                }
                None => diags.push(
                    DiagnosticKind::UnresolvedIdentity,
                    node.token.clone(),
                    format!("no coordinates found for site prefix '{node_prefix}'"),
                ),
            }
        }
        info!(synthesized, "site and coordinate enrichment complete");
    }
}

// ============================================================================
// TESTS
// ============================================================================
