// CLI entry point: load the sheet exports and coordinate table, run the
// collation, write the node registry and subtype partitions as CSV files.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};

use etys_topology::{
    load_coordinates, load_sheet_dir, run, AssetKind, CanonicalNode, NetworkConfig, Partition,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <sheets-dir> <coordinates-csv> <output-dir> [target-year]",
            args[0]
        );
        std::process::exit(1);
    }
    let sheets_dir = PathBuf::from(&args[1]);
    let coordinates_path = PathBuf::from(&args[2]);
    let output_dir = PathBuf::from(&args[3]);
    let target_year: i32 = match args.get(4) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid target year '{raw}'"))?,
        None => 2028,
    };

    println!("ETYS network-data collation (as of {target_year})");
    println!("=================================================");

    // 1. Load inputs
    println!("\nLoading sheet exports from {}...", sheets_dir.display());
    let sheets = load_sheet_dir(&sheets_dir)?;
    println!("Loaded {} sheets", sheets.len());

    let coordinates = load_coordinates(&coordinates_path)?;
    println!("Loaded {} coordinate rows", coordinates.len());

    // 2. Run the pipeline
    let config = NetworkConfig::gb_default(target_year);
    let output = run(&config, &sheets, &coordinates)?;

    // 3. Write outputs
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    write_nodes_csv(&output_dir.join("Nodes.csv"), &output.snapshot.nodes)?;
    let mut written = BTreeSet::new();
    for partition in &output.snapshot.partitions {
        // Two kinds may share a subtype label; suffix the kind on collision.
        let stem = if written.insert(partition.name.clone()) {
            safe_sheet_name(&partition.name)
        } else {
            safe_sheet_name(&format!("{} ({})", partition.name, partition.kind))
        };
        write_partition_csv(&output_dir.join(format!("{stem}.csv")), partition)?;
    }

    // 4. Summarize
    println!("\n{}", output.snapshot.summary());
    println!("{}", output.diagnostics.summary());
    if !output.snapshot.discrepancies.is_empty() {
        println!("\nConnectivity discrepancies:");
        for discrepancy in &output.snapshot.discrepancies {
            println!("  - {}", discrepancy.message);
        }
    }
    println!("\nOutput written to {}", output_dir.display());

    Ok(())
}

/// File-name-safe partition name, capped the way spreadsheet sheet names are.
fn safe_sheet_name(name: &str) -> String {
    name.chars()
        .take(31)
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

fn write_nodes_csv(path: &Path, nodes: &[CanonicalNode]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "Node",
        "Voltage (Derived)",
        "Sheet Names",
        "Relevant Authority",
        "Site Name",
        "latitude",
        "longitude",
        "Full Name",
    ])?;
    for node in nodes {
        let row = [
            node.token.clone(),
            node.voltage_class.clone(),
            node.sheets.join(", "),
            node.authorities.join(", "),
            node.site_name.clone().unwrap_or_default(),
            node.latitude.map(|v| v.to_string()).unwrap_or_default(),
            node.longitude.map(|v| v.to_string()).unwrap_or_default(),
            node.full_name.clone().unwrap_or_default(),
        ];
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_partition_csv(path: &Path, partition: &Partition) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let attribute_columns: BTreeSet<&str> = partition
        .records
        .iter()
        .flat_map(|record| record.attributes.keys().map(String::as_str))
        .collect();
    let endpoint_columns = endpoint_columns(partition.kind);

    let mut header: Vec<&str> = endpoint_columns.to_vec();
    header.extend(["Status", "Year", "Sheet_Name"]);
    header.extend(attribute_columns.iter().copied());
    writer.write_record(&header)?;

    for record in &partition.records {
        let mut row: Vec<String> = record
            .endpoints
            .tokens()
            .into_iter()
            .map(String::from)
            .collect();
        row.push(record.status.as_str().to_string());
        row.push(
            record
                .effective_year
                .map(|year| year.to_string())
                .unwrap_or_default(),
        );
        row.push(record.source_group.clone());
        for column in &attribute_columns {
            row.push(record.attribute(column).unwrap_or("").to_string());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn endpoint_columns(kind: AssetKind) -> &'static [&'static str] {
    match kind {
        AssetKind::ReactiveDevice => &["Node"],
        AssetKind::Circuit | AssetKind::Transformer => &["Node 1", "Node 2"],
    }
}

// ============================================================================
// TESTS
// ============================================================================
