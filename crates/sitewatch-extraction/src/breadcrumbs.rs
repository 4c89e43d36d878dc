use scraper::{Html, Selector};
use serde_json::Value;
use sitewatch_types::{BreadcrumbConfig, BreadcrumbPreset};

use crate::extractor::collapse_whitespace;

/// Selector lists for the known breadcrumb markup conventions. These are
/// fixed strings; site settings pick a preset rather than editing them.
pub fn preset_selectors(preset: BreadcrumbPreset) -> &'static [&'static str] {
    match preset {
        // Schema resolves through JSON-LD, not CSS selectors.
        BreadcrumbPreset::Schema => &[],
        BreadcrumbPreset::Bootstrap => &[".breadcrumb .breadcrumb-item", ".breadcrumb li"],
        BreadcrumbPreset::Foundation => &[".breadcrumbs li"],
        BreadcrumbPreset::Bulma => &[".breadcrumb li"],
        BreadcrumbPreset::Tailwind => &["nav[aria-label=\"breadcrumb\"] a"],
        BreadcrumbPreset::Material => &[".mdc-breadcrumb__item"],
        BreadcrumbPreset::Custom => &[],
    }
}

/// Extract the breadcrumb trail.
///
/// Precedence: JSON-LD `BreadcrumbList` first, then the configured
/// preset's selectors, then the custom selector list. The first source
/// yielding at least one entry wins.
pub fn extract_breadcrumbs(
    document: &Html,
    config: &BreadcrumbConfig,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    let mut trail = extract_json_ld(document);

    if trail.is_empty() {
        for raw in preset_selectors(config.preset) {
            trail = select_trail(document, raw, warnings);
            if !trail.is_empty() {
                break;
            }
        }
    }

    if trail.is_empty() {
        for raw in &config.custom_selectors {
            trail = select_trail(document, raw, warnings);
            if !trail.is_empty() {
                break;
            }
        }
    }

    if config.remove_home {
        if let Some(first) = trail.first() {
            if first.eq_ignore_ascii_case("home") {
                trail.remove(0);
            }
        }
    }

    trail.truncate(config.max_depth);
    trail
}

fn select_trail(document: &Html, raw: &str, warnings: &mut Vec<String>) -> Vec<String> {
    let selector = match Selector::parse(raw) {
        Ok(selector) => selector,
        Err(_) => {
            warnings.push(format!("invalid breadcrumb selector '{raw}'"));
            return Vec::new();
        }
    };

    document
        .select(&selector)
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Walk every JSON-LD script for a `BreadcrumbList` and yield its item
/// names in list order.
fn extract_json_ld(document: &Html) -> Vec<String> {
    let selector = match Selector::parse("script[type=\"application/ld+json\"]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        if let Some(list) = find_breadcrumb_list(&value) {
            let names = item_names(list);
            if !names.is_empty() {
                return names;
            }
        }
    }
    Vec::new()
}

fn find_breadcrumb_list(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if is_breadcrumb_type(map.get("@type")) {
                return Some(value);
            }
            // Documents commonly nest the list under @graph.
            if let Some(graph) = map.get("@graph") {
                if let Some(found) = find_breadcrumb_list(graph) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(find_breadcrumb_list),
        _ => None,
    }
}

fn is_breadcrumb_type(type_field: Option<&Value>) -> bool {
    match type_field {
        Some(Value::String(s)) => s == "BreadcrumbList",
        Some(Value::Array(items)) => items
            .iter()
            .any(|v| v.as_str() == Some("BreadcrumbList")),
        _ => false,
    }
}

fn item_names(list: &Value) -> Vec<String> {
    let Some(elements) = list.get("itemListElement").and_then(Value::as_array) else {
        return Vec::new();
    };

    elements
        .iter()
        .filter_map(|element| {
            element
                .get("name")
                .or_else(|| element.get("item").and_then(|item| item.get("name")))
                .and_then(Value::as_str)
        })
        .map(|name| collapse_whitespace(name))
        .filter(|name| !name.is_empty())
        .collect()
}
