//! Company identity resolution
//!
//! Boards show the same employer under several spellings ("ACME",
//! "Acme sp. z o.o."). Resolution maps an observed name to at most one
//! stored company so lexical variants share a row.

use crate::storage::{Company, NewCompany, Storage, StorageResult};

/// Legal-form suffix stripped from company names
pub const LEGAL_SUFFIX: &str = "sp. z o.o.";

/// Case-folds `name`, removes the legal suffix and collapses whitespace
///
/// # Examples
///
/// ```
/// use jobscout::crawler::normalize_company_name;
///
/// assert_eq!(normalize_company_name("  ACME Sp. z o.o. "), "acme");
/// assert_eq!(normalize_company_name("Łódź   Logistics"), "łódź logistics");
/// ```
pub fn normalize_company_name(name: &str) -> String {
    name.to_lowercase()
        .replace(LEGAL_SUFFIX, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// How an observed company was mapped to a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Single match, stored as is
    Reused,
    /// Single match whose URL was replaced by the observed one
    UrlRefreshed,
    /// No match, new row
    Created,
    /// Several matches, new row
    Ambiguous,
}

#[derive(Debug, Clone)]
pub struct ResolvedCompany {
    pub company: Company,
    pub resolution: Resolution,
}

/// Finds or creates the company for an observed name and URL
///
/// Returns `Ok(None)` when the name normalizes to nothing; the listing is
/// then stored without a company. An empty observed URL never overwrites a
/// stored one.
pub fn resolve_company<S: Storage + ?Sized>(
    storage: &mut S,
    raw_name: &str,
    url: &str,
) -> StorageResult<Option<ResolvedCompany>> {
    let stripped = normalize_company_name(raw_name);
    if stripped.is_empty() {
        return Ok(None);
    }

    let mut candidates = storage.find_company_matches(&stripped)?;
    for company in storage.find_company_matches(&format!("{} {}", stripped, LEGAL_SUFFIX))? {
        if !candidates.iter().any(|c| c.id == company.id) {
            candidates.push(company);
        }
    }

    let resolved = match candidates.len() {
        1 => {
            let mut company = candidates.remove(0);
            if !url.is_empty() && company.url != url {
                storage.update_company_url(company.id, url)?;
                tracing::debug!("Company '{}' URL refreshed to {}", company.name, url);
                company.url = url.to_string();
                ResolvedCompany {
                    company,
                    resolution: Resolution::UrlRefreshed,
                }
            } else {
                ResolvedCompany {
                    company,
                    resolution: Resolution::Reused,
                }
            }
        }
        0 => ResolvedCompany {
            company: storage.create_company(NewCompany::sighted(stripped, url))?,
            resolution: Resolution::Created,
        },
        n => {
            tracing::warn!(
                "Company name '{}' matches {} stored companies; creating a new one",
                stripped,
                n
            );
            ResolvedCompany {
                company: storage.create_company(NewCompany::sighted(stripped, url))?,
                resolution: Resolution::Ambiguous,
            }
        }
    };

    Ok(Some(resolved))
}
