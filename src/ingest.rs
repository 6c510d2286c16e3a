// CSV ingestion collaborators
// The workbook arrives as a directory of per-sheet CSV exports (file stem =
// sheet name) plus a substation coordinates CSV. Parsing stops at typed raw
// rows; all interpretation happens in the normalizer and merger.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::diagnostics::CollateError;
use crate::records::RawSheet;
use crate::sites::SiteCoordinates;

/// Load every `*.csv` file in a directory as one raw sheet each, in file-name
/// order so repeated runs see the same sheet sequence.
pub fn load_sheet_dir(dir: &Path) -> Result<Vec<RawSheet>, CollateError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| CollateError::Io {
            path: dir.display().to_string(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    let mut sheets = Vec::new();
    for path in paths {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = File::open(&path).map_err(|source| CollateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let sheet = sheet_from_reader(&name, file).map_err(|source| CollateError::Csv {
            path: path.display().to_string(),
            source,
        })?;
        info!(sheet = %sheet.name, rows = sheet.rows.len(), "sheet loaded");
        sheets.push(sheet);
    }
    Ok(sheets)
}

/// Parse one sheet from CSV. Headers are trimmed; blank cells are omitted
/// from the row maps.
pub fn sheet_from_reader<R: Read>(name: &str, reader: R) -> Result<RawSheet, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row: std::collections::BTreeMap<String, String> = columns
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(column, value)| (column.clone(), value.trim().to_string()))
            .collect();
        rows.push(row);
    }

    Ok(RawSheet {
        name: name.to_string(),
        columns,
        rows,
    })
}

/// Load the substation coordinates table. The three structural columns are
/// mandatory; rows with unparseable coordinates are dropped.
pub fn load_coordinates(path: &Path) -> Result<Vec<SiteCoordinates>, CollateError> {
    let file = File::open(path).map_err(|source| CollateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let coordinates = coordinates_from_reader(file, &path.display().to_string())?;
    info!(rows = coordinates.len(), "coordinates loaded");
    Ok(coordinates)
}

pub fn coordinates_from_reader<R: Read>(
    reader: R,
    table: &str,
) -> Result<Vec<SiteCoordinates>, CollateError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|source| CollateError::Csv {
            path: table.to_string(),
            source,
        })?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let position = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| CollateError::MissingColumn {
                table: table.to_string(),
                column: name.to_string(),
            })
    };
    let code_idx = position("Site Code")?;
    let lat_idx = position("latitude")?;
    let lon_idx = position("longitude")?;

    let mut coordinates = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|source| CollateError::Csv {
            path: table.to_string(),
            source,
        })?;
        let code = record.get(code_idx).map(str::trim).unwrap_or_default();
        let latitude = record.get(lat_idx).and_then(|v| v.trim().parse::<f64>().ok());
        let longitude = record.get(lon_idx).and_then(|v| v.trim().parse::<f64>().ok());
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            continue;
        };
        if code.is_empty() {
            continue;
        }
        coordinates.push(SiteCoordinates {
            site_code: code.to_string(),
            latitude,
            longitude,
        });
    }
    Ok(coordinates)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_from_reader_trims_and_skips_blanks() {
        let csv = "Node 1 , Node 2 ,Status\nABCD41,EFGH21,Addition\nIJKL41,, \n";
        let sheet = sheet_from_reader("B-2-1c", csv.as_bytes()).unwrap();

        assert_eq!(sheet.name, "B-2-1c");
        assert_eq!(sheet.columns, vec!["Node 1", "Node 2", "Status"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].get("Node 1").unwrap(), "ABCD41");
        // blank cells are omitted, not stored as empty strings
        assert!(!sheet.rows[1].contains_key("Node 2"));
        assert!(!sheet.rows[1].contains_key("Status"));
    }

    #[test]
    fn test_coordinates_reader_happy_path() {
        let csv = "Site Code,latitude,longitude\nABCD,51.5,-0.12\nEFGH,53.4,-2.99\n";
        let coords = coordinates_from_reader(csv.as_bytes(), "coordinates").unwrap();
        assert_eq!(coords.len(), 2);
        assert_eq!(coords[0].site_code, "ABCD");
        assert_eq!(coords[1].longitude, -2.99);
    }

    #[test]
    fn test_coordinates_missing_column_is_fatal() {
        let csv = "Site Code,lat,lon\nABCD,51.5,-0.12\n";
        let err = coordinates_from_reader(csv.as_bytes(), "coordinates").unwrap_err();
        assert!(matches!(
            err,
            CollateError::MissingColumn { ref column, .. } if column == "latitude"
        ));
    }

    #[test]
    fn test_coordinates_malformed_rows_dropped() {
        let csv = "Site Code,latitude,longitude\nABCD,51.5,-0.12\nEFGH,not-a-number,-2.99\n,51.0,0.0\n";
        let coords = coordinates_from_reader(csv.as_bytes(), "coordinates").unwrap();
        assert_eq!(coords.len(), 1);
    }
}
