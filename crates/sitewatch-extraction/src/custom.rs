use std::collections::BTreeMap;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use sitewatch_types::{CustomDataType, CustomSelector, EcommerceConfig};
use url::Url;

use crate::extractor::collapse_whitespace;

/// Run the configured custom selectors, writing typed values into
/// `custom_data`. Selector problems are soft: an invalid selector or a
/// missing required match adds a warning and moves on.
pub fn extract_custom_data(
    document: &Html,
    base: &Url,
    selectors: &[CustomSelector],
    custom_data: &mut BTreeMap<String, Value>,
    warnings: &mut Vec<String>,
) {
    for custom in selectors {
        let selector = match Selector::parse(&custom.selector) {
            Ok(selector) => selector,
            Err(_) => {
                warnings.push(format!(
                    "invalid selector '{}' for custom field '{}'",
                    custom.selector, custom.name
                ));
                continue;
            }
        };

        let Some(element) = document.select(&selector).next() else {
            if custom.required {
                warnings.push(format!(
                    "required custom field '{}' matched nothing",
                    custom.name
                ));
            }
            continue;
        };

        let raw = raw_value(element, custom.attribute.as_deref());
        if raw.is_empty() {
            if custom.required {
                warnings.push(format!("required custom field '{}' is empty", custom.name));
            }
            continue;
        }

        match cast(&raw, custom.data_type, base) {
            Some(value) => {
                custom_data.insert(custom.name.clone(), value);
            }
            None => warnings.push(format!(
                "custom field '{}' value '{}' is not a valid {:?}",
                custom.name, raw, custom.data_type
            )),
        }
    }
}

/// E-commerce selector sets feed the same custom-data map under fixed
/// field names, so the comparison engine's `price` rule applies.
pub fn extract_ecommerce(
    document: &Html,
    config: &EcommerceConfig,
    custom_data: &mut BTreeMap<String, Value>,
    warnings: &mut Vec<String>,
) {
    let fields: [(&str, &Option<String>, CustomDataType); 5] = [
        ("product-name", &config.product.name, CustomDataType::Text),
        ("price", &config.product.price, CustomDataType::Number),
        (
            "availability",
            &config.product.availability,
            CustomDataType::Text,
        ),
        ("sku", &config.product.sku, CustomDataType::Text),
        ("category-name", &config.category.name, CustomDataType::Text),
    ];

    for (name, raw_selector, data_type) in fields {
        let Some(raw_selector) = raw_selector else {
            continue;
        };
        let selector = match Selector::parse(raw_selector) {
            Ok(selector) => selector,
            Err(_) => {
                warnings.push(format!(
                    "invalid selector '{raw_selector}' for e-commerce field '{name}'"
                ));
                continue;
            }
        };
        let Some(element) = document.select(&selector).next() else {
            continue;
        };
        let raw = raw_value(element, None);
        if raw.is_empty() {
            continue;
        }
        // A price that fails numeric parsing is still worth keeping as text.
        let value = match data_type {
            CustomDataType::Number => parse_number(&raw)
                .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
                .unwrap_or(Value::String(raw)),
            _ => Value::String(raw),
        };
        custom_data.insert(name.to_string(), value);
    }
}

fn raw_value(element: ElementRef<'_>, attribute: Option<&str>) -> String {
    match attribute {
        Some(attr) => element
            .value()
            .attr(attr)
            .map(|v| v.trim().to_string())
            .unwrap_or_default(),
        None => collapse_whitespace(&element.text().collect::<String>()),
    }
}

fn cast(raw: &str, data_type: CustomDataType, base: &Url) -> Option<Value> {
    match data_type {
        CustomDataType::Text => Some(Value::String(raw.to_string())),
        CustomDataType::Number => parse_number(raw).and_then(|n| {
            serde_json::Number::from_f64(n).map(Value::Number)
        }),
        CustomDataType::Url => base
            .join(raw)
            .ok()
            .map(|url| Value::String(url.to_string())),
        CustomDataType::Date => parse_date(raw).map(Value::String),
        CustomDataType::Boolean => parse_boolean(raw).map(Value::Bool),
    }
}

/// Parse a number out of marked-up text ("$1,299.00" → 1299.0).
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

fn parse_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.to_rfc3339());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|date| date.to_string())
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "in stock" => Some(true),
        "false" | "0" | "no" | "off" | "out of stock" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(html: &str, selectors: Vec<CustomSelector>) -> (BTreeMap<String, Value>, Vec<String>) {
        let document = Html::parse_document(html);
        let base = Url::parse("https://a.example/").unwrap();
        let mut data = BTreeMap::new();
        let mut warnings = Vec::new();
        extract_custom_data(&document, &base, &selectors, &mut data, &mut warnings);
        (data, warnings)
    }

    fn selector(name: &str, css: &str, data_type: CustomDataType) -> CustomSelector {
        CustomSelector {
            name: name.to_string(),
            selector: css.to_string(),
            attribute: None,
            data_type,
            required: false,
        }
    }

    #[test]
    fn text_value_from_first_match() {
        let html = r#"<span class="sku">AB-123</span><span class="sku">ignored</span>"#;
        let (data, warnings) = run(html, vec![selector("sku", ".sku", CustomDataType::Text)]);
        assert_eq!(data["sku"], Value::String("AB-123".to_string()));
        assert!(warnings.is_empty());
    }

    #[test]
    fn number_strips_currency_markup() {
        let html = r#"<div class="price">$1,299.00</div>"#;
        let (data, _) = run(html, vec![selector("price", ".price", CustomDataType::Number)]);
        assert_eq!(data["price"].as_f64(), Some(1299.0));
    }

    #[test]
    fn attribute_value_instead_of_text() {
        let html = r#"<a class="buy" href="/cart">Buy now</a>"#;
        let mut custom = selector("cart", ".buy", CustomDataType::Url);
        custom.attribute = Some("href".to_string());
        let (data, _) = run(html, vec![custom]);
        assert_eq!(data["cart"], Value::String("https://a.example/cart".to_string()));
    }

    #[test]
    fn date_and_boolean_casting() {
        let html = r#"<time class="when">2024-03-05</time><span class="stock">In Stock</span>"#;
        let (data, _) = run(
            html,
            vec![
                selector("when", ".when", CustomDataType::Date),
                selector("stock", ".stock", CustomDataType::Boolean),
            ],
        );
        assert_eq!(data["when"], Value::String("2024-03-05".to_string()));
        assert_eq!(data["stock"], Value::Bool(true));
    }

    #[test]
    fn required_selector_without_match_warns() {
        let mut custom = selector("missing", ".nope", CustomDataType::Text);
        custom.required = true;
        let (data, warnings) = run("<body></body>", vec![custom]);
        assert!(data.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("required custom field 'missing'"));
    }

    #[test]
    fn optional_selector_without_match_is_silent() {
        let (data, warnings) = run("<body></body>", vec![selector("x", ".nope", CustomDataType::Text)]);
        assert!(data.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn invalid_selector_warns_and_continues() {
        let html = r#"<span class="ok">fine</span>"#;
        let (data, warnings) = run(
            html,
            vec![
                selector("bad", "..bad", CustomDataType::Text),
                selector("ok", ".ok", CustomDataType::Text),
            ],
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(data["ok"], Value::String("fine".to_string()));
    }

    #[test]
    fn uncastable_number_warns() {
        let html = r#"<div class="price">call us</div>"#;
        let (data, warnings) = run(html, vec![selector("price", ".price", CustomDataType::Number)]);
        assert!(data.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn ecommerce_fields_land_in_custom_data() {
        let html = r#"
            <h1 class="product-title">Widget</h1>
            <span class="price">€49.90</span>
            <span class="availability">In Stock</span>
        "#;
        let document = Html::parse_document(html);
        let mut data = BTreeMap::new();
        let mut warnings = Vec::new();
        let config = EcommerceConfig {
            enabled: true,
            product: sitewatch_types::SelectorSet {
                name: Some(".product-title".to_string()),
                price: Some(".price".to_string()),
                availability: Some(".availability".to_string()),
                sku: None,
            },
            category: sitewatch_types::SelectorSet::default(),
        };
        extract_ecommerce(&document, &config, &mut data, &mut warnings);

        assert_eq!(data["product-name"], Value::String("Widget".to_string()));
        assert_eq!(data["price"].as_f64(), Some(49.90));
        assert_eq!(data["availability"], Value::String("In Stock".to_string()));
        assert!(warnings.is_empty());
    }
}
