// ETYS network-data collation - core library
// Reconciles the time-versioned asset inventory into an as-of-year topology
// snapshot and resolves node identity across the dataset's naming schemes.

pub mod config;
pub mod records;
pub mod diagnostics;
pub mod normalizer;
pub mod temporal;
pub mod resolver;
pub mod sites;
pub mod assembler;
pub mod pipeline;
pub mod ingest;

// Re-export commonly used types
pub use config::{NetworkConfig, UNKNOWN_AUTHORITY};
pub use records::{
    parse_year, prefix,
    AssetKind, AssetRecord, Endpoints, NodeToken, RawSheet, RecordKey, Status,
};
pub use diagnostics::{
    CollateError, Diagnostic, DiagnosticKind, Diagnostics,
};
pub use normalizer::{NormalizedRecords, RecordNormalizer};
pub use temporal::{OrderedRecordMap, TemporalFilter};
pub use resolver::{
    derive_voltage, is_transmission_coded,
    CanonicalNode, MatchContext, MatchTier, NodeRegistry, TierMatch, TieredMatcher,
    UNKNOWN_VOLTAGE,
};
pub use sites::{SiteCoordinates, SiteMerger, SiteRecord};
pub use assembler::{Partition, TopologyAssembler, TopologySnapshot};
pub use pipeline::{run, PipelineOutput};
pub use ingest::{load_coordinates, load_sheet_dir};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
