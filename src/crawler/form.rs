//! Search form replay
//!
//! The search page is submitted the way a browser would: the first form on the
//! page is located and its default field values are collected in document
//! order, then the caller's values replace any field with the same name.

use crate::url::resolve_action;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use url::Url;

/// HTTP method declared by a form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    fn from_attr(method: Option<&str>) -> Self {
        match method.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "post" => Self::Post,
            _ => Self::Get,
        }
    }
}

impl fmt::Display for FormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A filled-in form, ready to be sent by a fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest {
    pub url: Url,
    pub method: FormMethod,
    /// Name/value pairs in submission order
    pub fields: Vec<(String, String)>,
}

impl FormRequest {
    /// Returns the first value submitted under `name`
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// The search form found on a page, with its default values
#[derive(Debug, Clone)]
pub struct SearchForm {
    action: Url,
    method: FormMethod,
    defaults: Vec<(String, String)>,
}

impl SearchForm {
    /// Locates the first `<form>` in `html`
    ///
    /// # Arguments
    ///
    /// * `html` - The search page body
    /// * `page_url` - URL the page was fetched from, used to resolve `action`
    ///
    /// # Returns
    ///
    /// `None` if the page has no form or its action cannot be resolved
    pub fn from_page(html: &str, page_url: &Url) -> Option<Self> {
        let document = Html::parse_document(html);
        let form_selector = Selector::parse("form").ok()?;
        let form = document.select(&form_selector).next()?;

        let action = resolve_action(page_url, form.value().attr("action")).ok()?;
        let method = FormMethod::from_attr(form.value().attr("method"));

        Some(Self {
            action,
            method,
            defaults: collect_defaults(form),
        })
    }

    pub fn action(&self) -> &Url {
        &self.action
    }

    pub fn method(&self) -> FormMethod {
        self.method
    }

    /// Default name/value pairs, in document order
    pub fn defaults(&self) -> &[(String, String)] {
        &self.defaults
    }

    /// Builds the request, replacing defaults with `values`
    ///
    /// Every default whose name appears in `values` is dropped; `values` are
    /// then appended in the order given.
    pub fn fill(&self, values: &[(String, String)]) -> FormRequest {
        let mut fields: Vec<(String, String)> = self
            .defaults
            .iter()
            .filter(|(name, _)| !values.iter().any(|(override_name, _)| override_name == name))
            .cloned()
            .collect();
        fields.extend(values.iter().cloned());

        FormRequest {
            url: self.action.clone(),
            method: self.method,
            fields,
        }
    }
}

/// Collects the values a browser would submit without user input
fn collect_defaults(form: ElementRef<'_>) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut submit_seen = false;

    for element in form.descendants().filter_map(ElementRef::wrap) {
        let attrs = element.value();
        if attrs.attr("disabled").is_some() {
            continue;
        }
        let Some(name) = attrs.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };

        match attrs.name() {
            "input" => {
                let kind = attrs.attr("type").unwrap_or("text").to_ascii_lowercase();
                let value = attrs.attr("value").unwrap_or("");
                match kind.as_str() {
                    "checkbox" | "radio" => {
                        if attrs.attr("checked").is_some() {
                            let value = if value.is_empty() { "on" } else { value };
                            fields.push((name.to_string(), value.to_string()));
                        }
                    }
                    "submit" | "image" => {
                        if !submit_seen {
                            submit_seen = true;
                            fields.push((name.to_string(), value.to_string()));
                        }
                    }
                    "reset" | "button" | "file" => {}
                    _ => fields.push((name.to_string(), value.to_string())),
                }
            }
            "button" => {
                let kind = attrs.attr("type").unwrap_or("submit").to_ascii_lowercase();
                if kind == "submit" && !submit_seen {
                    submit_seen = true;
                    let value = attrs.attr("value").unwrap_or("");
                    fields.push((name.to_string(), value.to_string()));
                }
            }
            "select" => {
                if let Some(value) = selected_option(element) {
                    fields.push((name.to_string(), value));
                }
            }
            "textarea" => {
                fields.push((name.to_string(), element.text().collect::<String>()));
            }
            _ => {}
        }
    }

    fields
}

/// Value of the selected option of a `<select>`, or of its first option
fn selected_option(select: ElementRef<'_>) -> Option<String> {
    let options: Vec<ElementRef<'_>> = select
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "option")
        .collect();

    let chosen = options
        .iter()
        .find(|o| o.value().attr("selected").is_some())
        .or_else(|| options.first())?;

    Some(match chosen.value().attr("value") {
        Some(value) => value.to_string(),
        None => chosen.text().collect::<String>().trim().to_string(),
    })
}
