//! Row parser: one results-table row to one [`Record`]
//!
//! Row layout, by cell index:
//!
//! | Index | Content |
//! |-------|---------|
//! | 0 | decoration |
//! | 1 | date (`DD/MM/YYYY`), may carry the felt marker |
//! | 2 | time (`HH:MM:SS`) |
//! | 3 | latitude |
//! | 4 | longitude |
//! | 5 | depth, with a unit suffix |
//! | 6 | magnitude |
//! | 7 | intensity |
//! | 8 | province |
//! | last | anchor to the event detail page |

use crate::crawler::page::{RawRow, FELT_MARKER_COLOR};
use crate::record::{RawRecord, Record, ValidationError};
use crate::url::{identifier_segment, join_site};
use thiserror::Error;
use url::Url;

/// Number of data columns between the leading and trailing decorative cells
pub const DATA_COLUMNS: usize = 8;

/// Why a row could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowErrorKind {
    #[error("expected at least {} cells, found {found}", DATA_COLUMNS + 2)]
    TooFewCells { found: usize },

    #[error("no detail link in the last cell")]
    MissingDetailLink,

    #[error("detail link {link:?} has no identifier segment")]
    MissingIdentifier { link: String },

    #[error("depth {raw:?} has no numeric prefix")]
    NonNumericDepth { raw: String },

    #[error("detail link {link:?} cannot be joined to the site URL")]
    BadDetailLink { link: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A row-level failure, with the row's cell texts for diagnosis
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (cells: {cells:?})")]
pub struct RowParseError {
    pub cells: Vec<String>,
    pub kind: RowErrorKind,
}

/// Parses one row into a record
///
/// # Arguments
///
/// * `row` - Every cell of the table row, decorative cells included
/// * `base_url` - Site root that detail links are relative to
///
/// # Example
///
/// ```
/// use inpres_harvest::crawler::{parse_row, RawCell, RawRow};
/// use url::Url;
///
/// let mut cells: Vec<RawCell> = ["", "01/05/2023", "14:32:10", "-31.5", "-68.6", "33 Km", "4.2", "III", "San Juan"]
///     .iter()
///     .map(|t| RawCell::text(*t))
///     .collect();
/// cells.push(RawCell { link: Some("ver/482910/detalle".to_string()), ..RawCell::default() });
///
/// let base = Url::parse("http://contenidos.inpres.gob.ar").unwrap();
/// let record = parse_row(&RawRow { cells }, &base).unwrap();
/// assert_eq!(record.id(), 482910);
/// assert_eq!(record.depth_km(), 33);
/// ```
pub fn parse_row(row: &RawRow, base_url: &Url) -> Result<Record, RowParseError> {
    extract(row, base_url)
        .and_then(|raw| Record::from_raw(raw).map_err(RowErrorKind::from))
        .map_err(|kind| RowParseError {
            cells: row.texts(),
            kind,
        })
}

fn extract(row: &RawRow, base_url: &Url) -> Result<RawRecord, RowErrorKind> {
    let cells = &row.cells;
    if cells.len() < DATA_COLUMNS + 2 {
        return Err(RowErrorKind::TooFewCells { found: cells.len() });
    }

    let data: Vec<&str> = cells[1..cells.len() - 1]
        .iter()
        .map(|c| c.text.trim())
        .collect();

    let link = cells[cells.len() - 1]
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or(RowErrorKind::MissingDetailLink)?;

    let id = identifier_segment(link).ok_or_else(|| RowErrorKind::MissingIdentifier {
        link: link.to_string(),
    })?;

    let detail_url = join_site(base_url, link).map_err(|_| RowErrorKind::BadDetailLink {
        link: link.to_string(),
    })?;

    let felt = cells[1].has_marker(FELT_MARKER_COLOR);

    Ok(RawRecord {
        id: Some(id.to_string()),
        timestamp: Some(format!("{} {}", data[0], data[1])),
        latitude: Some(data[2].to_string()),
        longitude: Some(data[3].to_string()),
        felt: Some(felt.to_string()),
        depth_km: Some(depth_token(data[4])?),
        magnitude: Some(data[5].to_string()),
        intensity: Some(data[6].to_string()),
        province: Some(data[7].to_string()),
        detail_url: Some(detail_url.to_string()),
    })
}

/// Strips whitespace and the unit suffix from a depth cell
///
/// `"33 Km"`, `"33Km"` and `"33 \n Km"` all yield `"33"`.
pub fn depth_token(raw: &str) -> Result<String, RowErrorKind> {
    let compact: String = raw.split_whitespace().collect();
    let numeric: String = compact
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        .collect();

    if !numeric.chars().any(|c| c.is_ascii_digit()) {
        return Err(RowErrorKind::NonNumericDepth {
            raw: raw.to_string(),
        });
    }

    Ok(numeric)
}
