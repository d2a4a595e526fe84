//! The schema.org item model and the site → item-type mapping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single retrieved item: a schema.org-shaped JSON payload plus the
/// identifying tuple the reference retriever returns alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Canonical URL of the item.
    pub url: String,
    /// Raw schema.org/JSON-LD payload, as stored in the vector index.
    pub schema_json: String,
    /// Display name.
    pub name: String,
    /// Site the item belongs to.
    pub site: String,
}

/// Which sites a query should be run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteSelector {
    /// Search every allowed site.
    All,
    /// Search exactly these sites.
    Sites(Vec<String>),
}

impl SiteSelector {
    /// Builds a selector from a raw site parameter, matching the reference
    /// server's convention that the literal string `"all"` means "every
    /// allowed site".
    #[must_use]
    pub fn from_param(raw: &str) -> Self {
        if raw == "all" || raw.is_empty() {
            Self::All
        } else {
            Self::Sites(vec![raw.to_string()])
        }
    }

    /// The first site name, used for prompt/item-type resolution even when
    /// several sites are selected.
    #[must_use]
    pub fn primary(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Sites(sites) => sites.first().map_or("all", String::as_str),
        }
    }

    /// Whether this selector is the broadcast case the reference
    /// implementation treats identically in two places: the asking-sites
    /// notice and the relevance-detection skip gate. `"nlws"` is the site
    /// value the generate-mode surface sends when it has no specific site to
    /// narrow to, and is checked alongside the explicit `All` selector in
    /// both of those call sites (`core/ranking.py::sendMessageOnSitesBeingAsked`,
    /// `pre_retrieval/relevance_detection.py::do`).
    #[must_use]
    pub fn is_all_or_nlws(&self) -> bool {
        matches!(self, Self::All) || self.primary() == "nlws"
    }
}

/// Falls back to `"Thing"` for unknown sites. Unlike the reference
/// implementation's hardcoded-site-list function, this takes the mapping as
/// data so new sites don't require a recompile.
#[must_use]
pub fn site_to_item_type(site: &str, table: &HashMap<String, String>) -> String {
    table
        .get(site)
        .cloned()
        .unwrap_or_else(|| "Thing".to_string())
}

/// The built-in site → item-type table mirroring the reference deployment.
#[must_use]
pub fn default_site_table() -> HashMap<String, String> {
    let recipe_sites = [
        "seriouseats",
        "hebbarskitchen",
        "latam_recipes",
        "woksoflife",
        "cheftariq",
        "spruce",
        "nytimes",
    ];
    let mut table = HashMap::new();
    for site in recipe_sites {
        table.insert(site.to_string(), "Recipe".to_string());
    }
    table.insert("imdb".to_string(), "Movie".to_string());
    table.insert("npr podcasts".to_string(), "Thing".to_string());
    table.insert("neurips".to_string(), "Paper".to_string());
    table.insert("backcountry".to_string(), "Outdoor Gear".to_string());
    table.insert("tripadvisor".to_string(), "Restaurant".to_string());
    table.insert("zillow".to_string(), "RealEstate".to_string());
    table
}

/// Validates a requested site against the configured allow-list, falling
/// back to the full allowed set when the request names nothing valid.
#[must_use]
pub fn filter_allowed_sites(requested: &[String], allowed: &[String]) -> Vec<String> {
    if allowed.is_empty() {
        return requested.to_vec();
    }
    let valid: Vec<String> = requested
        .iter()
        .filter(|site| allowed.contains(site))
        .cloned()
        .collect();
    if valid.is_empty() {
        allowed.to_vec()
    } else {
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_selector_all_param() {
        assert_eq!(SiteSelector::from_param("all"), SiteSelector::All);
        assert_eq!(SiteSelector::from_param(""), SiteSelector::All);
    }

    #[test]
    fn site_selector_single_site() {
        let sel = SiteSelector::from_param("imdb");
        assert_eq!(sel.primary(), "imdb");
    }

    #[test]
    fn is_all_or_nlws_covers_both_broadcast_cases() {
        assert!(SiteSelector::All.is_all_or_nlws());
        assert!(SiteSelector::Sites(vec!["nlws".to_string()]).is_all_or_nlws());
        assert!(!SiteSelector::Sites(vec!["imdb".to_string()]).is_all_or_nlws());
    }

    #[test]
    fn unknown_site_falls_back_to_thing() {
        let table = default_site_table();
        assert_eq!(site_to_item_type("some_new_site", &table), "Thing");
        assert_eq!(site_to_item_type("imdb", &table), "Movie");
        assert_eq!(site_to_item_type("seriouseats", &table), "Recipe");
    }

    #[test]
    fn filter_allowed_sites_falls_back_on_no_match() {
        let allowed = vec!["imdb".to_string(), "neurips".to_string()];
        let requested = vec!["unknown".to_string()];
        assert_eq!(filter_allowed_sites(&requested, &allowed), allowed);
    }

    #[test]
    fn filter_allowed_sites_keeps_valid_subset() {
        let allowed = vec!["imdb".to_string(), "neurips".to_string()];
        let requested = vec!["imdb".to_string(), "unknown".to_string()];
        assert_eq!(filter_allowed_sites(&requested, &allowed), vec!["imdb".to_string()]);
    }

    #[test]
    fn empty_allow_list_permits_anything() {
        let requested = vec!["anything".to_string()];
        assert_eq!(filter_allowed_sites(&requested, &[]), requested);
    }
}
