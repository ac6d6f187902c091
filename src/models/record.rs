//! Canonical catalogue entry model and upstream normalization.
//!
//! The catalogue API is loose about field naming (`snake_case` and
//! `camelCase` both occur in the wild) and about types (prices arrive as
//! numbers or as formatted strings, flags as booleans, numbers, or
//! strings). [`ModuleRecord::from_raw`] folds all of that into one
//! canonical shape and never fails: every missing or malformed field
//! degrades to a documented default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Catalogue category of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Communication,
    Content,
    Social,
    Productivity,
    Integration,
    Other,
}

/// Keyword tables for inferring a category from name and description.
/// Checked in order; the first table with a hit wins.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Productivity,
        &["calendar", "event", "schedule", "reminder", "task", "todo", "issue"],
    ),
    (
        Category::Social,
        &["poll", "survey", "vote", "like", "reaction"],
    ),
    (
        Category::Communication,
        &["message", "mail", "chat", "notification", "mention"],
    ),
    (
        Category::Content,
        &["wiki", "docs", "document", "page", "article", "blog"],
    ),
    (
        Category::Integration,
        &["shop", "store", "commerce", "stripe", "api", "webhook"],
    ),
];

impl Category {
    /// Parse an explicit category name. Unrecognized names yield `None`
    /// so the caller can fall back to inference.
    pub fn parse(name: &str) -> Option<Category> {
        match name.trim().to_lowercase().as_str() {
            "communication" => Some(Category::Communication),
            "content" => Some(Category::Content),
            "social" => Some(Category::Social),
            "productivity" => Some(Category::Productivity),
            "integration" => Some(Category::Integration),
            "other" => Some(Category::Other),
            _ => None,
        }
    }

    /// Guess a category from free text, matching keyword substrings
    /// case-insensitively. `Other` when nothing matches.
    pub fn infer(name: &str, description: &str) -> Category {
        let text = format!("{name} {description}").to_lowercase();
        for (category, keywords) in CATEGORY_KEYWORDS {
            if keywords.iter().any(|kw| text.contains(kw)) {
                return *category;
            }
        }
        Category::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Communication => "communication",
            Category::Content => "content",
            Category::Social => "social",
            Category::Productivity => "productivity",
            Category::Integration => "integration",
            Category::Other => "other",
        }
    }

    /// Human-readable label for listings.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Communication => "Communication",
            Category::Content => "Content",
            Category::Social => "Social",
            Category::Productivity => "Productivity",
            Category::Integration => "Integration",
            Category::Other => "Other",
        }
    }
}

// ---------------------------------------------------------------------------
// ModuleRecord — one catalogue entry, normalized
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    /// Catalogue identifier, always a string even when upstream sends it
    /// as a JSON number.
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    /// Numeric price, never negative. `0.0` for free modules.
    pub price: f64,
    pub currency: String,
    pub category: Category,
    pub author: String,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Present exactly when the requesting user may download the module:
    /// free or purchased, and not a pre-release entry.
    pub download_url: Option<String>,
    pub is_purchased: bool,
    pub is_paid: bool,
    pub is_soon: bool,
    pub product_id: Option<String>,
    pub price_id: Option<String>,
}

impl ModuleRecord {
    /// Normalize one raw catalogue item.
    ///
    /// `download_base` is the catalogue origin (scheme and host), used to
    /// synthesize a download URL when the item is installable but upstream
    /// omitted one. This function never fails; a raw item of the wrong
    /// shape entirely yields a mostly-default record with an empty id.
    pub fn from_raw(item: &Value, download_base: &str) -> ModuleRecord {
        let id = parse_id(raw_field(item, &["id", "module_id", "moduleId"]))
            .unwrap_or_default();
        let name = parse_string(raw_field(item, &["name", "title"]))
            .unwrap_or_else(|| "Unknown Module".to_string());
        let description = parse_string(raw_field(item, &["description", "summary"]))
            .unwrap_or_default();
        let version = parse_string(raw_field(item, &["version"]))
            .unwrap_or_else(|| "1.0.0".to_string());
        let currency = parse_string(raw_field(item, &["currency"]))
            .unwrap_or_else(|| "USD".to_string());
        let author = parse_string(raw_field(item, &["author", "vendor"]))
            .unwrap_or_else(|| "Green Meteor".to_string());

        let price = parse_price(raw_field(item, &["price"]));
        let is_paid =
            parse_bool(raw_field(item, &["is_paid", "isPaid"])).unwrap_or(price > 0.0);
        let is_purchased =
            parse_bool(raw_field(item, &["is_purchased", "isPurchased"])).unwrap_or(false);
        let is_soon = parse_bool(raw_field(item, &["is_soon", "isSoon", "coming_soon"]))
            .unwrap_or(false);

        let category = parse_string(raw_field(item, &["category"]))
            .as_deref()
            .and_then(Category::parse)
            .unwrap_or_else(|| Category::infer(&name, &description));

        let screenshots = match parse_string_list(raw_field(item, &["screenshots"])) {
            Some(list) => dedup_urls(list),
            None => parse_string(raw_field(item, &["image", "thumbnail"]))
                .map(|url| vec![url])
                .unwrap_or_default(),
        };

        let features = parse_features(raw_field(item, &["features"]));
        let requirements = parse_string_list(raw_field(item, &["requirements"]))
            .unwrap_or_else(default_requirements);

        let product_id = parse_id(raw_field(item, &["product_id", "productId"]));
        let price_id = parse_id(raw_field(item, &["price_id", "priceId", "stripe_price_id"]));

        // A download URL exists exactly for installable entries: free or
        // purchased, and released. Anything upstream says to the contrary
        // is overridden here.
        let upstream_url =
            parse_string(raw_field(item, &["download_url", "downloadUrl"]));
        let download_url = if (!is_paid || is_purchased) && !is_soon {
            Some(upstream_url.unwrap_or_else(|| fallback_download_url(download_base, &id)))
        } else {
            None
        };

        ModuleRecord {
            id,
            name,
            description,
            version,
            price,
            currency,
            category,
            author,
            screenshots,
            features,
            requirements,
            download_url,
            is_purchased,
            is_paid,
            is_soon,
            product_id,
            price_id,
        }
    }

    // -- Gates -------------------------------------------------------------

    /// True when the module can be bought right now.
    pub fn is_available_for_purchase(&self) -> bool {
        self.is_paid && !self.is_purchased && !self.is_soon && self.price > 0.0
    }

    /// True when the requesting user can download the module.
    pub fn is_downloadable(&self) -> bool {
        (!self.is_paid || self.is_purchased) && !self.is_soon && self.download_url.is_some()
    }

    // -- Display helpers ---------------------------------------------------

    /// Price rendered for listings.
    pub fn formatted_price(&self) -> String {
        if self.is_soon {
            return "Coming Soon".to_string();
        }
        if self.is_paid && self.price > 0.0 {
            return format!("{:.2} {}", self.price, self.currency);
        }
        "Free".to_string()
    }

    /// Short status line for listings.
    pub fn status_label(&self) -> &'static str {
        if self.is_soon {
            "Coming Soon"
        } else if !self.is_paid {
            "Free"
        } else if self.is_purchased {
            "Purchased"
        } else {
            "Available for Purchase"
        }
    }
}

/// Deterministic download URL for an installable module the upstream
/// listed without one.
pub fn fallback_download_url(download_base: &str, id: &str) -> String {
    format!("{}/download?module={id}", download_base.trim_end_matches('/'))
}

// ---------------------------------------------------------------------------
// Raw value coercion
// ---------------------------------------------------------------------------

/// First non-null value among the candidate keys. Catalogue items mix
/// `snake_case` and `camelCase`, so both spellings are tried.
fn raw_field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| item.get(key))
        .find(|v| !v.is_null())
}

fn parse_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Identifier as a string. Integral JSON numbers render without a
/// fractional part, so `42` and `"42"` normalize identically.
fn parse_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        _ => None,
    }
}

/// Price from a number or a formatted string. `"$19.99"` and
/// `"19.99 USD"` both come out as `19.99`; anything unparseable is `0.0`.
fn parse_price(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0).max(0.0),
        Some(Value::String(s)) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse::<f64>().map(|p| p.max(0.0)).unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// Truthiness across the encodings catalogue flags show up in: JSON
/// booleans, numbers (non-zero is true), and strings (`""`, `"0"`, and
/// `"false"` are false).
fn parse_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().unwrap_or(0.0) != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            Some(!(s.is_empty() || s == "0" || s == "false"))
        }
        _ => None,
    }
}

fn parse_string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

/// Feature list from a structured array, a comma-delimited string, or
/// the boilerplate fallback when neither is usable.
fn parse_features(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => {
            let parts: Vec<String> = s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect();
            if parts.is_empty() {
                boilerplate_features()
            } else {
                parts
            }
        }
        _ => boilerplate_features(),
    }
}

fn boilerplate_features() -> Vec<String> {
    vec![
        "Professional HumHub module".to_string(),
        "Full documentation included".to_string(),
        "Regular updates and support".to_string(),
        "Easy installation".to_string(),
    ]
}

fn default_requirements() -> Vec<String> {
    vec!["HumHub 1.18+".to_string(), "PHP 8.2+".to_string()]
}

/// Drop empty entries and duplicates, keeping first-seen order.
fn dedup_urls(list: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(list.len());
    for url in list {
        if url.is_empty() || out.contains(&url) {
            continue;
        }
        out.push(url);
    }
    out
}
