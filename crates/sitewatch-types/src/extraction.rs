use serde::{Deserialize, Serialize};

/// Per-site extraction configuration: one default config plus an ordered
/// list of per-URL-pattern overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSettings {
    pub default: ExtractionConfig,
    /// Overrides are resolved highest-priority-first; ties keep list order.
    pub overrides: Vec<PatternOverride>,
}

impl ExtractionSettings {
    /// Resolve the effective config for a URL.
    ///
    /// `matches` is the glob predicate `(url, pattern) -> bool`; it is
    /// injected so this crate stays free of the pattern-matcher dependency.
    /// All matching overrides are applied onto the default, lowest priority
    /// first, so the highest-priority override has the last word.
    pub fn config_for<F>(&self, url: &str, matches: F) -> ExtractionConfig
    where
        F: Fn(&str, &str) -> bool,
    {
        let mut applicable: Vec<(usize, &PatternOverride)> = self
            .overrides
            .iter()
            .enumerate()
            .filter(|(_, o)| matches(url, &o.pattern))
            .collect();
        // Ascending priority; equal priorities keep list order, so later
        // application order ends with the highest-priority override.
        applicable.sort_by(|(ia, a), (ib, b)| a.priority.cmp(&b.priority).then(ib.cmp(ia)));

        let mut config = self.default.clone();
        for (_, o) in applicable {
            o.config.apply_to(&mut config);
        }
        config
    }
}

/// An extraction override bound to a URL glob pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternOverride {
    pub pattern: String,
    pub priority: i32,
    pub config: ExtractionOverride,
}

/// Which fields to capture from a fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Identifier recorded on snapshots produced with this config.
    pub id: String,
    pub capture_title: bool,
    pub capture_meta_description: bool,
    pub capture_canonical: bool,
    pub capture_meta_keywords: bool,
    pub open_graph: OpenGraphConfig,
    pub headings: HeadingsConfig,
    pub breadcrumbs: BreadcrumbConfig,
    pub main_content: MainContentConfig,
    pub ecommerce: EcommerceConfig,
    pub custom_selectors: Vec<CustomSelector>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            capture_title: true,
            capture_meta_description: true,
            capture_canonical: true,
            capture_meta_keywords: false,
            open_graph: OpenGraphConfig::default(),
            headings: HeadingsConfig::default(),
            breadcrumbs: BreadcrumbConfig::default(),
            main_content: MainContentConfig::default(),
            ecommerce: EcommerceConfig::default(),
            custom_selectors: Vec::new(),
        }
    }
}

/// Partial extraction config; `None` fields fall back to the base config.
///
/// This collapses the deep-merge semantics of nested settings objects into
/// a single explicit rule: an override either replaces a whole section or
/// leaves it alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_title: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_meta_description: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_canonical: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_meta_keywords: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_graph: Option<OpenGraphConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headings: Option<HeadingsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breadcrumbs: Option<BreadcrumbConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_content: Option<MainContentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecommerce: Option<EcommerceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_selectors: Option<Vec<CustomSelector>>,
}

impl ExtractionOverride {
    /// Apply the set fields of this override onto `config`.
    pub fn apply_to(&self, config: &mut ExtractionConfig) {
        if let Some(id) = &self.id {
            config.id = id.clone();
        }
        if let Some(v) = self.capture_title {
            config.capture_title = v;
        }
        if let Some(v) = self.capture_meta_description {
            config.capture_meta_description = v;
        }
        if let Some(v) = self.capture_canonical {
            config.capture_canonical = v;
        }
        if let Some(v) = self.capture_meta_keywords {
            config.capture_meta_keywords = v;
        }
        if let Some(og) = &self.open_graph {
            config.open_graph = og.clone();
        }
        if let Some(h) = &self.headings {
            config.headings = h.clone();
        }
        if let Some(b) = &self.breadcrumbs {
            config.breadcrumbs = b.clone();
        }
        if let Some(m) = &self.main_content {
            config.main_content = m.clone();
        }
        if let Some(e) = &self.ecommerce {
            config.ecommerce = e.clone();
        }
        if let Some(s) = &self.custom_selectors {
            config.custom_selectors = s.clone();
        }
    }
}

/// Open Graph capture flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenGraphConfig {
    pub enabled: bool,
    pub title: bool,
    pub description: bool,
    pub image: bool,
    pub url: bool,
    pub site_name: bool,
    #[serde(rename = "type")]
    pub og_type: bool,
}

impl Default for OpenGraphConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            title: true,
            description: true,
            image: true,
            url: true,
            site_name: true,
            og_type: false,
        }
    }
}

/// Heading outline capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingsConfig {
    pub enabled: bool,
    /// Heading levels to collect (1..=6).
    pub levels: Vec<u8>,
    /// Keep the outline ordered by (level, document order).
    pub include_structure: bool,
    /// Truncate heading text to this many characters (ellipsis-marked).
    pub max_length: usize,
}

impl Default for HeadingsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            levels: vec![1, 2, 3],
            include_structure: true,
            max_length: 200,
        }
    }
}

/// Known breadcrumb markup conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbPreset {
    /// JSON-LD `BreadcrumbList` structured data.
    Schema,
    Bootstrap,
    Foundation,
    Bulma,
    Tailwind,
    Material,
    /// Caller-supplied selector list.
    Custom,
}

/// Breadcrumb trail capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreadcrumbConfig {
    pub enabled: bool,
    pub preset: BreadcrumbPreset,
    /// Selectors used when `preset` is `Custom` (and as the last fallback).
    pub custom_selectors: Vec<String>,
    /// Join separator used when breadcrumbs are rendered as one string.
    pub separator: String,
    /// Drop a leading "Home" entry.
    pub remove_home: bool,
    /// Cap on the number of trail entries.
    pub max_depth: usize,
}

impl Default for BreadcrumbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preset: BreadcrumbPreset::Schema,
            custom_selectors: Vec::new(),
            separator: " > ".to_string(),
            remove_home: false,
            max_depth: 10,
        }
    }
}

/// Main content capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainContentConfig {
    pub enabled: bool,
    pub selector: String,
    pub exclude_selectors: Vec<String>,
    pub max_length: usize,
    pub include_images: bool,
    pub include_links: bool,
    pub preserve_formatting: bool,
}

impl Default for MainContentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            selector: "main".to_string(),
            exclude_selectors: Vec::new(),
            max_length: 5000,
            include_images: false,
            include_links: false,
            preserve_formatting: false,
        }
    }
}

/// Selector set for one e-commerce entity (product or category page).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

/// E-commerce field capture; matched values land in the snapshot's custom
/// data under the selector-set field names (`price`, `product-name`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcommerceConfig {
    pub enabled: bool,
    pub product: SelectorSet,
    pub category: SelectorSet,
}

/// Expected type of a custom-selector value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomDataType {
    Text,
    Number,
    Url,
    Date,
    Boolean,
}

/// A caller-defined CSS selector capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomSelector {
    pub name: String,
    pub selector: String,
    /// Attribute to read instead of the text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub data_type: CustomDataType,
    /// A required selector that matches nothing marks the page result with
    /// a soft extraction warning.
    #[serde(default)]
    pub required: bool,
}
