//! Catalogue browsing: cached listing, filtering, sorting, and
//! single-module lookup.

use tracing::warn;

use crate::cache::CatalogCache;
use crate::client::CatalogApi;
use crate::identity::UserIdentity;
use crate::models::{Category, ModuleRecord};

// ---------------------------------------------------------------------------
// ListFilter
// ---------------------------------------------------------------------------

/// Optional narrowing applied to a catalogue listing. Fields left `None`
/// are skipped.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Case-insensitive substring match against name and description.
    pub search: Option<String>,
    pub category: Option<Category>,
    /// Catalogue order is kept when unset.
    pub sort: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Name,
    Price,
    Category,
}

impl SortOrder {
    pub fn parse(name: &str) -> Option<SortOrder> {
        match name.trim().to_lowercase().as_str() {
            "name" => Some(SortOrder::Name),
            "price" => Some(SortOrder::Price),
            "category" => Some(SortOrder::Category),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// CatalogQuery
// ---------------------------------------------------------------------------

/// Query interface for the module catalogue.
pub struct CatalogQuery<'a> {
    api: &'a dyn CatalogApi,
    cache: &'a CatalogCache,
}

impl<'a> CatalogQuery<'a> {
    pub(crate) fn new(api: &'a dyn CatalogApi, cache: &'a CatalogCache) -> Self {
        CatalogQuery { api, cache }
    }

    /// List the catalogue for `identity`, served from cache whenever the
    /// cached view can be trusted.
    ///
    /// Upstream failures degrade to an empty list rather than an error,
    /// so a listing page stays renderable while the catalogue is down.
    pub fn list(&self, identity: &UserIdentity, filter: &ListFilter) -> Vec<ModuleRecord> {
        let mut modules = match self.cache.modules_for(identity, self.api) {
            Ok(modules) => modules,
            Err(e) => {
                warn!(error = %e, "catalogue unavailable");
                return Vec::new();
            }
        };

        // -- search ----
        if let Some(query) = filter
            .search
            .as_deref()
            .map(str::to_lowercase)
            .filter(|q| !q.is_empty())
        {
            modules.retain(|m| {
                m.name.to_lowercase().contains(&query)
                    || m.description.to_lowercase().contains(&query)
            });
        }

        // -- category ----
        if let Some(category) = filter.category {
            modules.retain(|m| m.category == category);
        }

        // -- sort ----
        match filter.sort {
            Some(SortOrder::Name) => {
                modules.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            }
            Some(SortOrder::Price) => modules.sort_by(|a, b| {
                a.price
                    .partial_cmp(&b.price)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            Some(SortOrder::Category) => {
                modules.sort_by(|a, b| a.category.as_str().cmp(b.category.as_str()))
            }
            None => {}
        }

        modules
    }

    /// Every module for `identity`, in catalogue order.
    pub fn all(&self, identity: &UserIdentity) -> Vec<ModuleRecord> {
        self.list(identity, &ListFilter::default())
    }

    /// Look up one module by id.
    ///
    /// Asks upstream for the single module first; when that call fails or
    /// misses, falls back to scanning the (possibly cached) catalogue.
    /// Ids compare as strings, so `"42"` finds an entry listed as `42`.
    pub fn get(&self, identity: &UserIdentity, id: &str) -> Option<ModuleRecord> {
        match self.api.fetch_module(id, identity) {
            Ok(Some(module)) => return Some(module),
            Ok(None) => {}
            Err(e) => {
                warn!(module_id = id, error = %e, "module fetch failed, scanning catalogue");
            }
        }
        self.all(identity).into_iter().find(|m| m.id == id)
    }

    /// Distinct categories present in the catalogue, in first-appearance
    /// order.
    pub fn categories(&self, identity: &UserIdentity) -> Vec<Category> {
        let mut seen: Vec<Category> = Vec::new();
        for module in self.all(identity) {
            if !seen.contains(&module.category) {
                seen.push(module.category);
            }
        }
        seen
    }
}
