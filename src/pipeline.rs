// End-to-end collation pipeline
// Wires the components together in dependency order: normalize, reconcile,
// resolve, enrich, assemble. Purely sequential; every stage consumes
// immutable inputs and produces a new immutable output.

use tracing::info;

use crate::assembler::{TopologyAssembler, TopologySnapshot};
use crate::config::NetworkConfig;
use crate::diagnostics::{CollateError, Diagnostics};
use crate::normalizer::RecordNormalizer;
use crate::records::RawSheet;
use crate::resolver::NodeRegistry;
use crate::sites::{SiteCoordinates, SiteMerger, SiteRecord};
use crate::temporal::TemporalFilter;

/// Snapshot plus the non-fatal findings gathered along the way.
#[derive(Debug)]
pub struct PipelineOutput {
    pub snapshot: TopologySnapshot,
    pub diagnostics: Diagnostics,
}

/// Run the full collation over the provided workbook sheets and coordinate
/// table. The site reference table is compiled from the workbook's own index
/// sheets. Only structural failures abort; everything else lands in the
/// diagnostics report.
pub fn run(
    config: &NetworkConfig,
    sheets: &[RawSheet],
    coordinates: &[SiteCoordinates],
) -> Result<PipelineOutput, CollateError> {
    let mut diags = Diagnostics::new();
    info!(target_year = config.target_year, "starting network collation");

    let sites = SiteRecord::from_index_sheets(sheets, config, &mut diags);

    let normalized = RecordNormalizer::new(config).normalize(sheets, &mut diags)?;

    let filter = TemporalFilter::new(config.target_year);
    let circuits = filter.reconcile(normalized.circuits);
    let transformers = filter.reconcile(normalized.transformers);
    let reactive_devices = filter.reconcile(normalized.reactive_devices);

    let mut registry =
        NodeRegistry::build(&[&circuits, &transformers, &reactive_devices], config);
    SiteMerger::new(sites, coordinates.to_vec()).enrich(&mut registry, &mut diags);

    let snapshot = TopologyAssembler::assemble(
        config.target_year,
        circuits,
        transformers,
        reactive_devices,
        registry,
        &mut diags,
    );

    info!("collation finished: {}", diags.summary());
    Ok(PipelineOutput {
        snapshot,
        diagnostics: diags,
    })
}

// ============================================================================
// TESTS
// ============================================================================
