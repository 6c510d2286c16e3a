// Node Identity Resolver
// Builds one canonical node per distinct endpoint token in the reconciled
// records, derives the voltage class from the token's 5th character, and
// resolves raw tokens against a reference table through an ordered list of
// progressively looser match strategies.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::config::{NetworkConfig, UNKNOWN_AUTHORITY};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::records::{prefix, AssetRecord, NodeToken};

/// Voltage class used when the token does not encode one.
pub const UNKNOWN_VOLTAGE: &str = "Unknown";

/// Derive the kV class from the 5th character of a node token. Pure function
/// of the token and the configured digit table; asset attributes never
/// participate.
pub fn derive_voltage(token: &str, config: &NetworkConfig) -> String {
    match token.chars().nth(4) {
        Some(digit) if digit.is_ascii_digit() => config
            .voltage_map
            .get(&digit)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_VOLTAGE.to_string()),
        _ => UNKNOWN_VOLTAGE.to_string(),
    }
}

/// Whether a token's voltage digit encodes a transmission-level (275/400 kV)
/// connection.
pub fn is_transmission_coded(token: &str) -> bool {
    matches!(token.chars().nth(4), Some('2') | Some('4'))
}

// ============================================================================
// CANONICAL NODE
// ============================================================================

/// One resolved connection point. Created here, enriched by the site/geo
/// merger, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNode {
    pub token: NodeToken,
    /// Derived kV class, or "Unknown".
    pub voltage_class: String,
    /// Sheets the token was observed in, sorted.
    pub sheets: Vec<String>,
    /// Owning authorities mapped from those sheets, sorted and deduplicated.
    pub authorities: Vec<String>,
    pub site_name: Option<String>,
    /// Display name, e.g. "Lister Drive 275kV". Set by the merger.
    pub full_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// ============================================================================
// NODE REGISTRY
// ============================================================================

/// Canonical node per distinct endpoint token, keyed and iterated in token
/// order.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeToken, CanonicalNode>,
}

impl NodeRegistry {
    /// Compile the registry from reconciled record lists. Every endpoint
    /// token of every record gets exactly one node, annotated with the union
    /// of sheets and authorities it was observed under.
    pub fn build(record_sets: &[&[AssetRecord]], config: &NetworkConfig) -> Self {
        let mut observations: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for records in record_sets {
            for record in *records {
                for token in record.endpoints.tokens() {
                    let token = token.trim();
                    if token.is_empty() {
                        continue;
                    }
                    observations
                        .entry(token.to_string())
                        .or_default()
                        .insert(record.source_group.clone());
                }
            }
        }

        let nodes: BTreeMap<NodeToken, CanonicalNode> = observations
            .into_iter()
            .map(|(token, sheets)| {
                let authorities: BTreeSet<String> = sheets
                    .iter()
                    .map(|sheet| {
                        config
                            .authority_for_sheet(sheet)
                            .unwrap_or(UNKNOWN_AUTHORITY)
                            .to_string()
                    })
                    .collect();
                let node = CanonicalNode {
                    voltage_class: derive_voltage(&token, config),
                    sheets: sheets.into_iter().collect(),
                    authorities: authorities.into_iter().collect(),
                    site_name: None,
                    full_name: None,
                    latitude: None,
                    longitude: None,
                    token: token.clone(),
                };
                (token, node)
            })
            .collect();

        info!(nodes = nodes.len(), "canonical node registry compiled");
        NodeRegistry { nodes }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.nodes.contains_key(token)
    }

    pub fn get(&self, token: &str) -> Option<&CanonicalNode> {
        self.nodes.get(token)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in token order.
    pub fn nodes(&self) -> impl Iterator<Item = &CanonicalNode> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut CanonicalNode> {
        self.nodes.values_mut()
    }

    pub fn into_nodes(self) -> Vec<CanonicalNode> {
        self.nodes.into_values().collect()
    }

    /// Resolve an external raw token to a registry node via the tiered
    /// matcher. This is the attribution seam for callers joining outside
    /// registers (generator/demand tables) against the registry; the site
    /// merger uses its own prefix joins and does not go through here.
    ///
    /// No match at any tier leaves the caller's field unset and records an
    /// `UnresolvedIdentity` diagnostic; a high-capacity entity landing on a
    /// non-transmission node records a mismatch warning.
    pub fn match_token(
        &self,
        raw_token: &str,
        context: MatchContext,
        config: &NetworkConfig,
        diags: &mut Diagnostics,
    ) -> Option<&CanonicalNode> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return None;
        }
        let candidates: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        let matcher = TieredMatcher::new(config);

        match matcher.resolve(raw_token, &candidates, context) {
            Some(hit) => {
                if let Some(capacity) = context.capacity_mw {
                    if capacity > config.high_capacity_mw && !is_transmission_coded(hit.candidate) {
                        warn!(
                            token = raw_token,
                            node = hit.candidate,
                            capacity_mw = capacity,
                            "high-capacity entity matched to a non-275/400kV node"
                        );
                        diags.push(
                            DiagnosticKind::HighCapacityMismatch,
                            raw_token,
                            format!(
                                "capacity {capacity}MW exceeds {}MW but matched node '{}' is not coded 275/400kV",
                                config.high_capacity_mw, hit.candidate
                            ),
                        );
                    }
                }
                self.nodes.get(hit.candidate)
            }
            None => {
                diags.push(
                    DiagnosticKind::UnresolvedIdentity,
                    raw_token,
                    format!("no node matched '{raw_token}' at any tier"),
                );
                None
            }
        }
    }
}

// ============================================================================
// TIERED MATCHING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchTier {
    /// Token equals the candidate key.
    Exact,
    /// First 5 characters agree; first candidate in table order wins.
    Prefix5,
    /// First 4 characters agree; capacity-aware voltage preference, falling
    /// back to the first candidate.
    Prefix4,
}

/// Side information for the 4-character tie-break.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchContext {
    pub capacity_mw: Option<f64>,
}

impl MatchContext {
    pub fn with_capacity(capacity_mw: f64) -> Self {
        MatchContext {
            capacity_mw: Some(capacity_mw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierMatch<'a> {
    pub candidate: &'a str,
    pub tier: MatchTier,
}

/// Ordered list of match strategies, tried strictly in sequence. Each tier is
/// a pure function of (token, candidates, context); an earlier hit
/// short-circuits the rest.
pub struct TieredMatcher<'c> {
    config: &'c NetworkConfig,
    tiers: Vec<MatchTier>,
}

impl<'c> TieredMatcher<'c> {
    pub fn new(config: &'c NetworkConfig) -> Self {
        TieredMatcher {
            config,
            tiers: vec![MatchTier::Exact, MatchTier::Prefix5, MatchTier::Prefix4],
        }
    }

    pub fn resolve<'a>(
        &self,
        token: &str,
        candidates: &[&'a str],
        context: MatchContext,
    ) -> Option<TierMatch<'a>> {
        self.tiers.iter().find_map(|&tier| {
            self.try_tier(tier, token, candidates, context)
                .map(|candidate| TierMatch { candidate, tier })
        })
    }

    fn try_tier<'a>(
        &self,
        tier: MatchTier,
        token: &str,
        candidates: &[&'a str],
        context: MatchContext,
    ) -> Option<&'a str> {
        match tier {
            MatchTier::Exact => candidates.iter().copied().find(|c| *c == token),
            MatchTier::Prefix5 => {
                let wanted = prefix(token, 5);
                candidates.iter().copied().find(|c| prefix(c, 5) == wanted)
            }
            MatchTier::Prefix4 => {
                let wanted = prefix(token, 4);
                let hits: Vec<&str> = candidates
                    .iter()
                    .copied()
                    .filter(|c| prefix(c, 4) == wanted)
                    .collect();
                let first = *hits.first()?;
                let Some(capacity) = context.capacity_mw else {
                    return Some(first);
                };
                let prefer_transmission = capacity > self.config.high_capacity_mw;
                hits.iter()
                    .copied()
                    .find(|c| is_transmission_coded(c) == prefer_transmission)
                    .or(Some(first))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AssetKind, Endpoints, Status};
    use std::collections::BTreeMap;

    fn config() -> NetworkConfig {
        NetworkConfig::gb_default(2028)
    }

    fn record(kind: AssetKind, endpoints: Endpoints, sheet: &str) -> AssetRecord {
        AssetRecord {
            kind,
            endpoints,
            status: Status::Unspecified,
            effective_year: None,
            source_group: sheet.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_derive_voltage_pure_lookup() {
        let config = config();
        assert_eq!(derive_voltage("ABCD4XX", &config), "400");
        assert_eq!(derive_voltage("ABCD2", &config), "275");
        assert_eq!(derive_voltage("ABCD1A", &config), "132");
        assert_eq!(derive_voltage("AB12", &config), UNKNOWN_VOLTAGE); // too short
        assert_eq!(derive_voltage("ABCDX1", &config), UNKNOWN_VOLTAGE); // not a digit
        assert_eq!(derive_voltage("ABCD9A", &config), UNKNOWN_VOLTAGE); // digit unmapped
    }

    #[test]
    fn test_registry_build_unions_sheets_and_authorities() {
        let config = config();
        let circuits = vec![
            record(
                AssetKind::Circuit,
                Endpoints::Two("ABCD41".into(), "EFGH41".into()),
                "B-2-1c",
            ),
            record(
                AssetKind::Circuit,
                Endpoints::Two("ABCD41".into(), "IJKL21".into()),
                "B-2-1a",
            ),
        ];
        let reactive = vec![record(
            AssetKind::ReactiveDevice,
            Endpoints::One("ABCD41".into()),
            "B-4-1c",
        )];

        let registry = NodeRegistry::build(&[&circuits, &reactive], &config);
        assert_eq!(registry.len(), 3);

        let node = registry.get("ABCD41").unwrap();
        assert_eq!(node.voltage_class, "400");
        assert_eq!(node.sheets, vec!["B-2-1a", "B-2-1c", "B-4-1c"]);
        assert_eq!(node.authorities, vec!["NGET", "SHET"]);

        // registry iterates in token order
        let tokens: Vec<&str> = registry.nodes().map(|n| n.token.as_str()).collect();
        assert_eq!(tokens, vec!["ABCD41", "EFGH41", "IJKL21"]);
    }

    #[test]
    fn test_exact_match_short_circuits_prefix_tiers() {
        let config = config();
        let matcher = TieredMatcher::new(&config);
        // A prefix-5 candidate appears before the exact one in table order;
        // tier 1 must still win.
        let candidates = ["ABCD4Z", "ABCD4A"];
        let hit = matcher
            .resolve("ABCD4A", &candidates, MatchContext::default())
            .unwrap();
        assert_eq!(hit.tier, MatchTier::Exact);
        assert_eq!(hit.candidate, "ABCD4A");
    }

    #[test]
    fn test_prefix5_first_in_table_order() {
        let config = config();
        let matcher = TieredMatcher::new(&config);
        let candidates = ["ABCD4X", "ABCD4Y"];
        let hit = matcher
            .resolve("ABCD4Q", &candidates, MatchContext::default())
            .unwrap();
        assert_eq!(hit.tier, MatchTier::Prefix5);
        assert_eq!(hit.candidate, "ABCD4X");
    }

    #[test]
    fn test_prefix4_capacity_disambiguation() {
        let config = config();
        let matcher = TieredMatcher::new(&config);
        // One 33kV candidate (digit 3) first, one 400kV candidate (digit 4).
        let candidates = ["ABCD3A", "ABCD4A"];

        let high = matcher
            .resolve("ABCDZZ", &candidates, MatchContext::with_capacity(250.0))
            .unwrap();
        assert_eq!(high.tier, MatchTier::Prefix4);
        assert_eq!(high.candidate, "ABCD4A");

        let low = matcher
            .resolve("ABCDZZ", &candidates, MatchContext::with_capacity(50.0))
            .unwrap();
        assert_eq!(low.candidate, "ABCD3A");

        // At the threshold exactly, the non-transmission preference applies.
        let at = matcher
            .resolve("ABCDZZ", &candidates, MatchContext::with_capacity(100.0))
            .unwrap();
        assert_eq!(at.candidate, "ABCD3A");
    }

    #[test]
    fn test_prefix4_falls_back_to_first_when_preference_unsatisfiable() {
        let config = config();
        let matcher = TieredMatcher::new(&config);
        let candidates = ["ABCD3A", "ABCD1B"]; // no 275/400 candidate

        let hit = matcher
            .resolve("ABCDZZ", &candidates, MatchContext::with_capacity(500.0))
            .unwrap();
        assert_eq!(hit.candidate, "ABCD3A");
    }

    #[test]
    fn test_prefix4_without_capacity_takes_first() {
        let config = config();
        let matcher = TieredMatcher::new(&config);
        let candidates = ["ABCD3A", "ABCD4A"];
        let hit = matcher
            .resolve("ABCDZZ", &candidates, MatchContext::default())
            .unwrap();
        assert_eq!(hit.candidate, "ABCD3A");
    }

    #[test]
    fn test_no_match_at_any_tier() {
        let config = config();
        let matcher = TieredMatcher::new(&config);
        let candidates = ["WXYZ4A"];
        assert!(matcher
            .resolve("ABCD4A", &candidates, MatchContext::default())
            .is_none());
    }

    #[test]
    fn test_match_token_unresolved_diagnostic() {
        let config = config();
        let circuits = vec![record(
            AssetKind::Circuit,
            Endpoints::Two("WXYZ4A".into(), "QRST4A".into()),
            "B-2-1c",
        )];
        let registry = NodeRegistry::build(&[&circuits], &config);
        let mut diags = Diagnostics::new();

        let matched = registry.match_token("ABCD4A", MatchContext::default(), &config, &mut diags);
        assert!(matched.is_none());
        assert_eq!(diags.count_of(DiagnosticKind::UnresolvedIdentity), 1);
    }

    #[test]
    fn test_match_token_high_capacity_mismatch_diagnostic() {
        let config = config();
        let circuits = vec![record(
            AssetKind::Circuit,
            Endpoints::Two("ABCD3A".into(), "QRST4A".into()),
            "B-2-1c",
        )];
        let registry = NodeRegistry::build(&[&circuits], &config);
        let mut diags = Diagnostics::new();

        // Only a 33kV node shares the prefix; a 500MW entity still matches it
        // but the mismatch is surfaced.
        let matched = registry.match_token(
            "ABCDZZ",
            MatchContext::with_capacity(500.0),
            &config,
            &mut diags,
        );
        assert_eq!(matched.unwrap().token, "ABCD3A");
        assert_eq!(diags.count_of(DiagnosticKind::HighCapacityMismatch), 1);
    }
}
