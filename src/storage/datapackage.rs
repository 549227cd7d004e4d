//! Data-package manifest generation
//!
//! The manifest describes the CSV output as a tabular resource so that
//! consumers can load it with typed columns and known units.

use crate::config::PackageConfig;
use crate::record::{FIELDS, STORED_TIMESTAMP_FORMAT};
use crate::storage::traits::StorageResult;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// File name of the manifest, written next to the CSV output
pub const MANIFEST_FILE_NAME: &str = "datapackage.json";

/// Builds the manifest for a CSV file
///
/// # Arguments
///
/// * `package` - Package metadata from the configuration
/// * `csv_path` - The CSV file the manifest describes
pub fn build_manifest(package: &PackageConfig, csv_path: &Path) -> Value {
    let file_name = csv_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let resource_name = if package.resource_name.is_empty() {
        package.name.clone()
    } else {
        package.resource_name.clone()
    };

    let fields: Vec<Value> = FIELDS
        .iter()
        .map(|field| {
            let mut entry = json!({ "name": field.name, "type": field.kind });
            if let Some(unit) = field.unit {
                entry["unit"] = json!(unit);
            }
            if field.kind == "datetime" {
                entry["format"] = json!(STORED_TIMESTAMP_FORMAT);
            }
            entry
        })
        .collect();

    json!({
        "name": package.name,
        "title": package.title,
        "description": package.description,
        "resources": [{
            "name": resource_name,
            "path": file_name,
            "format": "csv",
            "mediatype": "text/csv",
            "encoding": "utf-8",
            "schema": {
                "fields": fields,
                "primaryKey": "id",
            },
        }],
    })
}

/// Writes the manifest next to `csv_path` and returns its location
pub fn write_manifest(package: &PackageConfig, csv_path: &Path) -> StorageResult<PathBuf> {
    let manifest = build_manifest(package, csv_path);
    let manifest_path = csv_path
        .parent()
        .map(|dir| dir.join(MANIFEST_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(MANIFEST_FILE_NAME));

    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
    tracing::debug!("Wrote data-package manifest to {}", manifest_path.display());

    Ok(manifest_path)
}
