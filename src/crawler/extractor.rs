//! Listing extraction from search result pages
//!
//! This module turns one page of board HTML into raw listing records. It
//! never fails as a whole: a page without the offers container means the
//! results ran out, and a listing missing its id or title is skipped with a
//! warning. Every other field degrades to an empty string.

use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// One listing as it appears on a result page, before any normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    /// Board-assigned offer id (`data-test-offerid`)
    pub original_id: String,
    pub title: String,
    /// Free-text salary, empty when the offer shows none
    pub salary_text: String,
    /// Lower-cased seniority label, empty when not found
    pub seniority: String,
    /// Company display name as shown, not normalized
    pub company_name: String,
    /// Link to the company profile, empty when absent
    pub company_url: String,
}

struct Selectors {
    offers: Selector,
    title: Selector,
    salary: Selector,
    company_section: Selector,
    company_name: Selector,
    list_item: Selector,
}

const OFFER_ID_ATTR: &str = "data-test-offerid";

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |css: &str| Selector::parse(css).expect("static selector is valid");
        Selectors {
            offers: parse(r#"div[data-test="section-offers"]"#),
            title: parse(r#"h2[data-test="offer-title"]"#),
            salary: parse(r#"span[data-test="offer-salary"]"#),
            company_section: parse(r#"div[data-test="section-company"]"#),
            company_name: parse("h3"),
            list_item: parse("li"),
        }
    })
}

/// A parsed result page
///
/// Holds the parsed document; `listings` borrows from it, so the page must
/// outlive the iteration.
pub struct OfferPage {
    document: Html,
}

/// Parses `html` into an [`OfferPage`]
pub fn extract(html: &str) -> OfferPage {
    OfferPage::parse(html)
}

impl OfferPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Returns true if the page carries the offers container
    pub fn has_offers(&self) -> bool {
        self.offers_container().is_some()
    }

    /// Lazily walks the listings of the page
    ///
    /// Returns `None` when the offers container is missing, which marks the
    /// end of the search results.
    pub fn listings(&self) -> Option<Listings<'_>> {
        let container = self.offers_container()?;
        let iter = container
            .children()
            .filter_map(ElementRef::wrap)
            .filter_map(|child| parse_listing(listing_node(child)));
        Some(Listings {
            inner: Box::new(iter),
        })
    }

    fn offers_container(&self) -> Option<ElementRef<'_>> {
        self.document.select(&selectors().offers).next()
    }
}

/// One-shot iterator over the listings of an [`OfferPage`]
pub struct Listings<'a> {
    inner: Box<dyn Iterator<Item = RawListing> + 'a>,
}

impl<'a> Iterator for Listings<'a> {
    type Item = RawListing;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// The element carrying the listing data for one child of the container
///
/// Offers are normally wrapped once; the wrapper's first element child holds
/// the data. A bare listing (no wrapper) is used as is.
fn listing_node(child: ElementRef<'_>) -> ElementRef<'_> {
    if child.value().attr(OFFER_ID_ATTR).is_some() {
        return child;
    }

    child
        .children()
        .filter_map(ElementRef::wrap)
        .next()
        .unwrap_or(child)
}

fn parse_listing(node: ElementRef<'_>) -> Option<RawListing> {
    let sel = selectors();

    let original_id = match node.value().attr(OFFER_ID_ATTR).map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            tracing::warn!("Found listing without id, skipping");
            return None;
        }
    };

    let title = match node.select(&sel.title).next().map(element_text) {
        Some(title) if !title.is_empty() => title,
        _ => {
            tracing::warn!("Listing {} has no title, skipping", original_id);
            return None;
        }
    };

    let salary_text = node
        .select(&sel.salary)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let company = node.select(&sel.company_name).next();
    let company_name = company.map(element_text).unwrap_or_default();
    let company_url = company
        .and_then(|h3| h3.parent())
        .and_then(ElementRef::wrap)
        .and_then(|parent| parent.value().attr("href"))
        .map(|href| href.trim().to_string())
        .unwrap_or_default();

    Some(RawListing {
        original_id,
        title,
        salary_text,
        seniority: seniority(node),
        company_name,
        company_url,
    })
}

/// First `li` of the element following the company section
fn seniority(node: ElementRef<'_>) -> String {
    let sel = selectors();
    node.select(&sel.company_section)
        .next()
        .and_then(|section| section.next_siblings().find_map(ElementRef::wrap))
        .and_then(|sibling| sibling.select(&sel.list_item).next())
        .map(|li| element_text(li).to_lowercase())
        .unwrap_or_default()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
