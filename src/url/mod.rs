//! URL helpers for the catalogue site
//!
//! The site builds every link (result pages, event details) as a path relative
//! to its root, so joining is done by concatenation rather than RFC 3986
//! resolution against the current page.

use url::{ParseError, Url};

/// Joins the site base URL with a site-relative link
///
/// Leading slashes on `relative` and trailing slashes on `base` are collapsed
/// into a single separator.
///
/// # Examples
///
/// ```
/// use inpres_harvest::url::join_site;
/// use url::Url;
///
/// let base = Url::parse("http://contenidos.inpres.gob.ar").unwrap();
/// let url = join_site(&base, "ver/482910/detalle").unwrap();
/// assert_eq!(url.as_str(), "http://contenidos.inpres.gob.ar/ver/482910/detalle");
/// ```
pub fn join_site(base: &Url, relative: &str) -> Result<Url, ParseError> {
    let root = base.as_str().trim_end_matches('/');
    let path = relative.trim().trim_start_matches('/');
    Url::parse(&format!("{}/{}", root, path))
}

/// Returns the second `/`-delimited segment of a site-relative link
///
/// Detail links have the shape `ver/<id>/...`; the segment is returned as-is
/// and may still fail numeric parsing.
pub fn identifier_segment(link: &str) -> Option<&str> {
    link.trim()
        .split('/')
        .nth(1)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}

/// Resolves a form `action` attribute against the page that contains the form
///
/// A missing or blank action submits back to the page itself.
pub fn resolve_action(page: &Url, action: Option<&str>) -> Result<Url, ParseError> {
    match action.map(str::trim).filter(|a| !a.is_empty()) {
        Some(action) => page.join(action),
        None => Ok(page.clone()),
    }
}
