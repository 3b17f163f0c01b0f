//! Static category catalog.

use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Site root, visited before any listing to establish a session.
pub const BASE_URL: &str = "https://notices.philgeps.gov.ph";

const LISTING_PATH: &str = "/GEPSNONPILOT/Tender/SplashOpportunitiesSearchUI.aspx";

/// One business category on the listing site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
}

impl Category {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Listing page URL for this category.
    pub fn listing_url(&self) -> String {
        format!(
            "{BASE_URL}{LISTING_PATH}?menuIndex=3&BusCatID={}&type=category&ClickFrom=OpenOpp",
            self.id
        )
    }

    /// File-name form of the display name: lowercase, spaces to underscores.
    pub fn slug(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

lazy_static! {
    static ref BUILTIN: Catalog = Catalog::new(vec![
        Category::new(28, "Packaging Supplies"),
        Category::new(29, "Printing Services"),
        Category::new(51, "Printing Supplies"),
        Category::new(64, "Graphics Design"),
        Category::new(71, "Corporate Giveaways"),
        Category::new(80, "General Merchandise"),
        Category::new(129, "Tokens"),
        Category::new(134, "Educational"),
        Category::new(150, "Reproduction Services"),
    ]);
}

/// Immutable set of known categories, in display order.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// The catalog shipped with the scraper.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    pub fn all(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, id: u32) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Category> {
        let name = name.trim();
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a selector that is either a numeric ID or a display name.
    pub fn resolve(&self, selector: &str) -> ConfigResult<&Category> {
        let selector = selector.trim();
        let found = match selector.parse::<u32>() {
            Ok(id) => self.get(id),
            Err(_) => self.find_by_name(selector),
        };
        found.ok_or_else(|| ConfigError::UnknownCategory(selector.to_string()))
    }

    /// Resolve every selector, keeping catalog order and dropping repeats.
    pub fn resolve_all<S: AsRef<str>>(&self, selectors: &[S]) -> ConfigResult<Vec<Category>> {
        let mut ids = Vec::new();
        for selector in selectors {
            let category = self.resolve(selector.as_ref())?;
            if !ids.contains(&category.id) {
                ids.push(category.id);
            }
        }
        Ok(self
            .categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }
}

/// True when `url` points at the opportunities search page for a category.
pub fn validate_listing_url(url: &str) -> bool {
    url.contains("SplashOpportunitiesSearchUI.aspx") && url.contains("BusCatID=")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_urls_are_valid() {
        for category in Catalog::builtin().all() {
            let url = category.listing_url();
            assert!(validate_listing_url(&url), "bad url for {category}");
            assert!(url.contains(&format!("BusCatID={}", category.id)));
        }
    }

    #[test]
    fn test_resolve_by_id_and_name() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.resolve("29").unwrap().name, "Printing Services");
        assert_eq!(catalog.resolve("printing services").unwrap().id, 29);
        assert!(matches!(
            catalog.resolve("Fireworks"),
            Err(ConfigError::UnknownCategory(_))
        ));
        assert!(catalog.resolve("9999").is_err());
    }

    #[test]
    fn test_resolve_all_keeps_catalog_order() {
        let selected = Catalog::builtin()
            .resolve_all(&["150", "Tokens", "28", "tokens"])
            .unwrap();
        let ids: Vec<u32> = selected.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![28, 129, 150]);
    }

    #[test]
    fn test_slug() {
        assert_eq!(
            Category::new(80, "General Merchandise").slug(),
            "general_merchandise"
        );
    }

    #[test]
    fn test_validate_listing_url_rejects_other_pages() {
        assert!(!validate_listing_url("https://notices.philgeps.gov.ph/"));
        assert!(!validate_listing_url(
            "https://notices.philgeps.gov.ph/GEPSNONPILOT/Tender/SplashOpportunitiesSearchUI.aspx"
        ));
    }
}
