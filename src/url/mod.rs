//! URL construction for search pages and offers
//!
//! Search URLs come from the configuration fully formed; the crawl only adds
//! its page parameter. Offer URLs are derived from the board's identifier.

use crate::storage::Board;
use url::Url;

/// Query parameter carrying the 1-based result page number
pub const PAGE_PARAM: &str = "pn";

/// Builds the URL of one result page of a search
///
/// Any page parameter already present in `filter_url` is replaced. The rest of
/// the query string is kept verbatim, so board-specific encodings such as
/// `et=3%2C17` survive unchanged.
///
/// # Examples
///
/// ```
/// use jobscout::url::page_url;
///
/// let url = page_url("https://www.pracuj.pl/praca?rd=0&et=3%2C17", 2).unwrap();
/// assert_eq!(url.as_str(), "https://www.pracuj.pl/praca?rd=0&et=3%2C17&pn=2");
/// ```
pub fn page_url(filter_url: &str, page: u32) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(filter_url)?;

    let mut parts: Vec<String> = url
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty() && !is_page_param(pair))
        .map(str::to_string)
        .collect();
    parts.push(format!("{}={}", PAGE_PARAM, page));

    url.set_query(Some(&parts.join("&")));
    Ok(url)
}

fn is_page_param(pair: &str) -> bool {
    pair.split('=').next() == Some(PAGE_PARAM)
}

/// Canonical offer URL for a listing identifier on the given board
pub fn offer_url(board: Board, original_id: &str) -> String {
    match board {
        Board::Pracuj => format!("https://www.pracuj.pl/praca/,oferta,{}", original_id),
        Board::NoFluff => format!("https://nofluffjobs.com/pl/job/{}", original_id),
        Board::JustJoinIt => format!("https://justjoin.it/job-offer/{}", original_id),
    }
}
