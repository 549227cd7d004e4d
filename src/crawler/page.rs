//! Result page walker
//!
//! A results page carries a table of events (one `tr` per event, sharing a
//! style class with a leading label row) and a pagination strip whose last
//! anchor is decoration rather than a page. The walker turns the page into
//! raw rows for the row parser and page descriptors for the coordinator.

use crate::HarvestError;
use scraper::{ElementRef, Html, Selector};

/// Default selector for data rows of the results table
pub const DEFAULT_ROW_SELECTOR: &str = "table#sismos tr.Estilo68";

/// Default selector for anchors of the pagination strip
pub const DEFAULT_PAGINATION_SELECTOR: &str = "td.Estilo68 a";

/// Color of the marker used for events reported as felt
pub const FELT_MARKER_COLOR: &str = "#FF0000";

/// One table cell, reduced to what the row parser needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCell {
    /// Concatenated text of the cell and all its descendants
    pub text: String,

    /// `href` of an anchor placed directly in the cell
    pub link: Option<String>,

    /// `color` attributes of `div > font` markers placed directly in the cell
    pub marker_colors: Vec<String>,
}

impl RawCell {
    /// Creates a text-only cell
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Reads a `td` element
    pub fn from_element(cell: ElementRef<'_>) -> Self {
        let text = cell.text().collect::<String>();

        let link = child_elements(cell, "a")
            .find_map(|a| a.value().attr("href"))
            .map(str::to_string);

        let marker_colors = child_elements(cell, "div")
            .flat_map(|div| child_elements(div, "font"))
            .filter_map(|font| font.value().attr("color"))
            .map(str::to_string)
            .collect();

        Self {
            text,
            link,
            marker_colors,
        }
    }

    /// Returns true if the cell carries a marker of the given color
    ///
    /// The attribute must equal `color` byte for byte, as the site writes it;
    /// `#ff0000` does not match `#FF0000`.
    pub fn has_marker(&self, color: &str) -> bool {
        self.marker_colors.iter().any(|c| c == color)
    }
}

/// One results-table row, every cell included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn from_element(row: ElementRef<'_>) -> Self {
        Self {
            cells: child_elements(row, "td").map(RawCell::from_element).collect(),
        }
    }

    /// Cell texts, for diagnostics
    pub fn texts(&self) -> Vec<String> {
        self.cells.iter().map(|c| c.text.trim().to_string()).collect()
    }
}

/// A further results page discovered in the pagination strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Anchor text with all whitespace removed
    pub label: String,

    /// Site-relative link to the page
    pub href: String,
}

/// Extracts rows and pagination links from result pages
#[derive(Debug, Clone)]
pub struct PageWalker {
    row_selector: Selector,
    pagination_selector: Selector,
}

impl PageWalker {
    /// Creates a walker for the given row and pagination selectors
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::Selector` if either selector is not valid CSS
    pub fn new(row_selector: &str, pagination_selector: &str) -> Result<Self, HarvestError> {
        Ok(Self {
            row_selector: parse_selector(row_selector)?,
            pagination_selector: parse_selector(pagination_selector)?,
        })
    }

    /// Lazily yields the data rows of `document`, in document order
    ///
    /// The first matching row repeats the data-row style as a column header and
    /// is skipped.
    pub fn rows<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = RawRow> + 'a {
        document
            .select(&self.row_selector)
            .skip(1)
            .map(RawRow::from_element)
    }

    /// Lists further result pages linked from `document`, in document order
    ///
    /// The last anchor of the pagination strip is a navigation decoration and
    /// is excluded, as are anchors without an `href`.
    pub fn page_links(&self, document: &Html) -> Vec<PageDescriptor> {
        let anchors: Vec<ElementRef<'_>> = document.select(&self.pagination_selector).collect();
        let Some((_, pages)) = anchors.split_last() else {
            return Vec::new();
        };

        pages
            .iter()
            .filter_map(|a| {
                let href = a.value().attr("href")?.trim();
                if href.is_empty() {
                    return None;
                }
                Some(PageDescriptor {
                    label: a.text().flat_map(|t| t.split_whitespace()).collect(),
                    href: href.to_string(),
                })
            })
            .collect()
    }
}

fn parse_selector(selector: &str) -> Result<Selector, HarvestError> {
    Selector::parse(selector).map_err(|e| HarvestError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Direct element children of `parent` with the given tag name
fn child_elements<'a>(
    parent: ElementRef<'a>,
    tag: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == tag)
}
