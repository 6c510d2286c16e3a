// Topology Assembler
// Combines the reconciled per-kind record lists with the canonical node
// registry into the final snapshot, partitions records by subtype for export,
// and surfaces endpoints with no canonical node as discrepancies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::records::{AssetKind, AssetRecord, NodeToken};
use crate::resolver::{CanonicalNode, NodeRegistry};

// ============================================================================
// SNAPSHOT
// ============================================================================

/// One subtype partition, e.g. all "Shunt Reactor" reactive records. Keyed by
/// kind and subtype name together: the same subtype label on two kinds yields
/// two partitions, so every partition has a uniform endpoint shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub kind: AssetKind,
    pub name: String,
    pub records: Vec<AssetRecord>,
}

/// The assembled as-of-year topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub target_year: i32,
    /// Canonical node registry, in token order.
    pub nodes: Vec<CanonicalNode>,
    pub circuits: Vec<AssetRecord>,
    pub transformers: Vec<AssetRecord>,
    pub reactive_devices: Vec<AssetRecord>,
    /// Per-subtype partitions, keyed in order of first appearance.
    pub partitions: Vec<Partition>,
    /// Endpoints with no canonical node. Never silently dropped, never
    /// auto-healed.
    pub discrepancies: Vec<Diagnostic>,
    pub metadata: serde_json::Value,
}

impl TopologySnapshot {
    pub fn record_count(&self) -> usize {
        self.circuits.len() + self.transformers.len() + self.reactive_devices.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Snapshot for {}: {} nodes, {} circuits, {} transformers, {} reactive devices, {} partitions, {} discrepancies",
            self.target_year,
            self.nodes.len(),
            self.circuits.len(),
            self.transformers.len(),
            self.reactive_devices.len(),
            self.partitions.len(),
            self.discrepancies.len(),
        )
    }
}

// ============================================================================
// ASSEMBLER
// ============================================================================

pub struct TopologyAssembler;

impl TopologyAssembler {
    pub fn assemble(
        target_year: i32,
        circuits: Vec<AssetRecord>,
        transformers: Vec<AssetRecord>,
        reactive_devices: Vec<AssetRecord>,
        registry: NodeRegistry,
        diags: &mut Diagnostics,
    ) -> TopologySnapshot {
        let discrepancies = Self::check_connectivity(
            &[&circuits, &transformers, &reactive_devices],
            &registry,
            diags,
        );

        let mut partitions = Vec::new();
        Self::partition_into(&mut partitions, &circuits);
        Self::partition_into(&mut partitions, &transformers);
        Self::partition_into(&mut partitions, &reactive_devices);

        let metadata = serde_json::json!({
            "target_year": target_year,
            "node_count": registry.len(),
            "circuit_count": circuits.len(),
            "transformer_count": transformers.len(),
            "reactive_count": reactive_devices.len(),
            "partition_count": partitions.len(),
        });

        let snapshot = TopologySnapshot {
            target_year,
            nodes: registry.into_nodes(),
            circuits,
            transformers,
            reactive_devices,
            partitions,
            discrepancies,
            metadata,
        };
        info!("{}", snapshot.summary());
        snapshot
    }

    /// Group records by (kind, subtype column value), preserving record order
    /// within each partition and first-appearance order across partitions.
    /// Records without a subtype value are left out of the partitions (they
    /// remain in the per-kind tables).
    fn partition_into(partitions: &mut Vec<Partition>, records: &[AssetRecord]) {
        for record in records {
            let Some(subtype) = record.attribute(record.kind.subtype_column()) else {
                continue;
            };
            match partitions
                .iter_mut()
                .find(|p| p.kind == record.kind && p.name == subtype)
            {
                Some(partition) => partition.records.push(record.clone()),
                None => partitions.push(Partition {
                    kind: record.kind,
                    name: subtype.to_string(),
                    records: vec![record.clone()],
                }),
            }
        }
    }

    /// Every endpoint of a surviving record must have a canonical node. One
    /// discrepancy per distinct orphaned token.
    fn check_connectivity(
        record_sets: &[&[AssetRecord]],
        registry: &NodeRegistry,
        diags: &mut Diagnostics,
    ) -> Vec<Diagnostic> {
        let mut orphans: BTreeSet<NodeToken> = BTreeSet::new();
        for records in record_sets {
            for record in *records {
                for token in record.endpoints.tokens() {
                    let token = token.trim();
                    if !token.is_empty() && !registry.contains(token) {
                        orphans.insert(token.to_string());
                    }
                }
            }
        }

        let discrepancies: Vec<Diagnostic> = orphans
            .into_iter()
            .map(|token| Diagnostic {
                kind: DiagnosticKind::ConnectivityDiscrepancy,
                message: format!("endpoint '{token}' has no canonical node in the registry"),
                subject: token,
            })
            .collect();

        if !discrepancies.is_empty() {
            warn!(
                orphans = discrepancies.len(),
                "reconciled records reference endpoints missing from the node registry"
            );
        }
        for discrepancy in &discrepancies {
            diags.entries.push(discrepancy.clone());
        }
        discrepancies
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::records::{AssetKind, Endpoints, Status};
    use std::collections::BTreeMap;

    fn record(kind: AssetKind, endpoints: Endpoints, subtype: Option<&str>) -> AssetRecord {
        let mut attributes = BTreeMap::new();
        if let Some(subtype) = subtype {
            attributes.insert(kind.subtype_column().to_string(), subtype.to_string());
        }
        AssetRecord {
            kind,
            endpoints,
            status: Status::Unspecified,
            effective_year: None,
            source_group: "B-2-1c".to_string(),
            attributes,
        }
    }

    #[test]
    fn test_partitions_first_appearance_order() {
        let config = NetworkConfig::gb_default(2028);
        let circuits = vec![
            record(
                AssetKind::Circuit,
                Endpoints::Two("AAAA41".into(), "BBBB41".into()),
                Some("OHL"),
            ),
            record(
                AssetKind::Circuit,
                Endpoints::Two("CCCC41".into(), "DDDD41".into()),
                Some("Cable"),
            ),
            record(
                AssetKind::Circuit,
                Endpoints::Two("EEEE41".into(), "FFFF41".into()),
                Some("OHL"),
            ),
        ];
        let registry = NodeRegistry::build(&[&circuits], &config);
        let mut diags = Diagnostics::new();

        let snapshot =
            TopologyAssembler::assemble(2028, circuits, vec![], vec![], registry, &mut diags);

        let names: Vec<&str> = snapshot.partitions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["OHL", "Cable"]);
        assert_eq!(snapshot.partitions[0].records.len(), 2);
        assert_eq!(snapshot.partitions[1].records.len(), 1);
        assert!(snapshot.discrepancies.is_empty());
    }

    #[test]
    fn test_shared_subtype_name_keeps_kinds_apart() {
        let config = NetworkConfig::gb_default(2028);
        // "Series Capacitor" appears as both a circuit type and a compensation
        // type; the two must not land in one partition.
        let circuits = vec![record(
            AssetKind::Circuit,
            Endpoints::Two("AAAA41".into(), "BBBB41".into()),
            Some("Series Capacitor"),
        )];
        let reactive = vec![record(
            AssetKind::ReactiveDevice,
            Endpoints::One("AAAA41".into()),
            Some("Series Capacitor"),
        )];
        let registry = NodeRegistry::build(&[&circuits, &reactive], &config);
        let mut diags = Diagnostics::new();

        let snapshot =
            TopologyAssembler::assemble(2028, circuits, vec![], reactive, registry, &mut diags);

        assert_eq!(snapshot.partitions.len(), 2);
        assert_eq!(snapshot.partitions[0].kind, AssetKind::Circuit);
        assert_eq!(snapshot.partitions[1].kind, AssetKind::ReactiveDevice);
        for partition in &snapshot.partitions {
            assert_eq!(partition.name, "Series Capacitor");
            assert!(partition.records.iter().all(|r| r.kind == partition.kind));
        }
    }

    #[test]
    fn test_records_without_subtype_stay_out_of_partitions() {
        let config = NetworkConfig::gb_default(2028);
        let circuits = vec![record(
            AssetKind::Circuit,
            Endpoints::Two("AAAA41".into(), "BBBB41".into()),
            None,
        )];
        let registry = NodeRegistry::build(&[&circuits], &config);
        let mut diags = Diagnostics::new();

        let snapshot =
            TopologyAssembler::assemble(2028, circuits, vec![], vec![], registry, &mut diags);
        assert!(snapshot.partitions.is_empty());
        assert_eq!(snapshot.circuits.len(), 1);
    }

    #[test]
    fn test_connectivity_discrepancy_surfaced() {
        let config = NetworkConfig::gb_default(2028);
        let circuits = vec![record(
            AssetKind::Circuit,
            Endpoints::Two("AAAA41".into(), "BBBB41".into()),
            None,
        )];
        // Registry deliberately built without the circuit's endpoints.
        let reactive = vec![record(
            AssetKind::ReactiveDevice,
            Endpoints::One("ZZZZ41".into()),
            None,
        )];
        let registry = NodeRegistry::build(&[&reactive], &config);
        let mut diags = Diagnostics::new();

        let snapshot =
            TopologyAssembler::assemble(2028, circuits, vec![], reactive, registry, &mut diags);

        assert_eq!(snapshot.discrepancies.len(), 2);
        assert_eq!(snapshot.discrepancies[0].subject, "AAAA41");
        assert_eq!(snapshot.discrepancies[1].subject, "BBBB41");
        assert_eq!(diags.count_of(DiagnosticKind::ConnectivityDiscrepancy), 2);
        // the offending records are still in the output
        assert_eq!(snapshot.circuits.len(), 1);
    }

    #[test]
    fn test_snapshot_metadata_counts() {
        let config = NetworkConfig::gb_default(2028);
        let circuits = vec![record(
            AssetKind::Circuit,
            Endpoints::Two("AAAA41".into(), "BBBB41".into()),
            Some("OHL"),
        )];
        let registry = NodeRegistry::build(&[&circuits], &config);
        let mut diags = Diagnostics::new();

        let snapshot =
            TopologyAssembler::assemble(2028, circuits, vec![], vec![], registry, &mut diags);
        assert_eq!(snapshot.metadata["node_count"], 2);
        assert_eq!(snapshot.metadata["circuit_count"], 1);
        assert_eq!(snapshot.record_count(), 1);
    }
}
