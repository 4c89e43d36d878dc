use std::collections::BTreeMap;
use std::collections::HashSet;

use scraper::{Html, Selector};
use sitewatch_types::{ExtractionConfig, Heading};
use url::Url;

use crate::breadcrumbs::extract_breadcrumbs;
use crate::custom::{extract_custom_data, extract_ecommerce};

/// Structured fields pulled out of one HTML document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub meta_keywords: Option<String>,
    pub open_graph: BTreeMap<String, String>,
    pub headings: Vec<Heading>,
    pub breadcrumbs: Vec<String>,
    /// Absolute link targets found in `<a href>`, first-seen order.
    pub links: Vec<String>,
    pub custom_data: BTreeMap<String, serde_json::Value>,
    pub main_content: Option<String>,
    /// Soft extraction problems (bad selector, required field missing).
    pub warnings: Vec<String>,
}

/// Extract a page per `config`. `base` resolves relative URLs.
///
/// Never fails; the worst malformed input yields an empty record.
pub fn extract_page(body: &[u8], base: &Url, config: &ExtractionConfig) -> ExtractedPage {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);
    let mut page = ExtractedPage::default();

    if config.capture_title {
        page.title = select_text(&document, "title");
    }
    if config.capture_meta_description {
        page.meta_description = select_attr(&document, "meta[name=\"description\"]", "content");
    }
    if config.capture_meta_keywords {
        page.meta_keywords = select_attr(&document, "meta[name=\"keywords\"]", "content");
    }
    if config.capture_canonical {
        page.canonical_url = select_attr(&document, "link[rel=\"canonical\"]", "href")
            .and_then(|href| resolve(base, &href));
    }
    if config.open_graph.enabled {
        page.open_graph = extract_open_graph(&document, config);
    }
    if config.headings.enabled {
        page.headings = extract_headings(&document, config);
    }
    if config.breadcrumbs.enabled {
        page.breadcrumbs = extract_breadcrumbs(&document, &config.breadcrumbs, &mut page.warnings);
    }
    if config.main_content.enabled {
        page.main_content = extract_main_content(&document, config, &mut page.warnings);
    }
    if config.ecommerce.enabled {
        extract_ecommerce(
            &document,
            &config.ecommerce,
            &mut page.custom_data,
            &mut page.warnings,
        );
    }
    extract_custom_data(
        &document,
        base,
        &config.custom_selectors,
        &mut page.custom_data,
        &mut page.warnings,
    );

    page.links = extract_links(&document, base);
    page
}

/// Link extraction straight from response bytes, for callers that do not
/// otherwise parse the document.
pub fn extract_links_from_bytes(body: &[u8], base: &Url) -> Vec<String> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);
    extract_links(&document, base)
}

/// All `<a href>` targets resolved to absolute URLs, invalid ones dropped,
/// deduplicated preserving first-seen order.
pub fn extract_links(document: &Html, base: &Url) -> Vec<String> {
    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(resolved) = resolve(base, href) {
                if seen.insert(resolved.clone()) {
                    links.push(resolved);
                }
            }
        }
    }
    links
}

fn extract_open_graph(document: &Html, config: &ExtractionConfig) -> BTreeMap<String, String> {
    let og = &config.open_graph;
    let properties: [(&str, bool); 6] = [
        ("og:title", og.title),
        ("og:description", og.description),
        ("og:image", og.image),
        ("og:url", og.url),
        ("og:site_name", og.site_name),
        ("og:type", og.og_type),
    ];

    let mut captured = BTreeMap::new();
    for (property, enabled) in properties {
        if !enabled {
            continue;
        }
        let selector = format!("meta[property=\"{property}\"]");
        if let Some(content) = select_attr(document, &selector, "content") {
            captured.insert(property.to_string(), content);
        }
    }
    captured
}

fn extract_headings(document: &Html, config: &ExtractionConfig) -> Vec<Heading> {
    let settings = &config.headings;
    let mut levels: Vec<u8> = settings
        .levels
        .iter()
        .copied()
        .filter(|l| (1..=6).contains(l))
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut headings = Vec::new();
    if settings.include_structure {
        // Per-level collection in ascending level order gives the
        // (level, document order) stable sort directly.
        for level in levels {
            collect_level(document, level, settings.max_length, &mut headings);
        }
    } else {
        // Flat document order across the enabled levels.
        let wanted: HashSet<u8> = levels.iter().copied().collect();
        let selector = match Selector::parse("h1, h2, h3, h4, h5, h6") {
            Ok(selector) => selector,
            Err(_) => return headings,
        };
        for element in document.select(&selector) {
            let level = match element
                .value()
                .name()
                .strip_prefix('h')
                .and_then(|d| d.parse::<u8>().ok())
            {
                Some(level @ 1..=6) => level,
                _ => continue,
            };
            if !wanted.contains(&level) {
                continue;
            }
            let text = collapse_whitespace(&element.text().collect::<String>());
            if !text.is_empty() {
                headings.push(Heading::new(level, truncate(&text, settings.max_length)));
            }
        }
    }
    headings
}

fn collect_level(document: &Html, level: u8, max_length: usize, out: &mut Vec<Heading>) {
    let selector = match Selector::parse(&format!("h{level}")) {
        Ok(selector) => selector,
        Err(_) => return,
    };
    for element in document.select(&selector) {
        let text = collapse_whitespace(&element.text().collect::<String>());
        if !text.is_empty() {
            out.push(Heading::new(level, truncate(&text, max_length)));
        }
    }
}

fn extract_main_content(
    document: &Html,
    config: &ExtractionConfig,
    warnings: &mut Vec<String>,
) -> Option<String> {
    let settings = &config.main_content;
    let selector = match Selector::parse(&settings.selector) {
        Ok(selector) => selector,
        Err(_) => {
            warnings.push(format!(
                "invalid main content selector '{}'",
                settings.selector
            ));
            return None;
        }
    };
    let main = document.select(&selector).next()?;

    // Node ids under any exclude selector; their text is skipped.
    let mut excluded = HashSet::new();
    for raw in &settings.exclude_selectors {
        match Selector::parse(raw) {
            Ok(exclude) => {
                for element in main.select(&exclude) {
                    excluded.insert(element.id());
                }
            }
            Err(_) => warnings.push(format!("invalid exclude selector '{raw}'")),
        }
    }

    let mut text = String::new();
    for node in main.descendants() {
        if let Some(fragment) = node.value().as_text() {
            let under_excluded = node.ancestors().any(|a| excluded.contains(&a.id()));
            if !under_excluded {
                text.push_str(fragment);
                text.push(' ');
            }
        }
    }

    let collapsed = collapse_whitespace(&text);
    if collapsed.is_empty() {
        None
    } else {
        Some(truncate(&collapsed, settings.max_length))
    }
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|element| {
        collapse_whitespace(&element.text().collect::<String>())
    })
    .filter(|text| !text.is_empty())
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|url| url.to_string())
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to `max` characters with an ellipsis marker.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if max == 0 || text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitewatch_types::{HeadingsConfig, MainContentConfig, OpenGraphConfig};

    fn base() -> Url {
        Url::parse("https://a.example/shop/").unwrap()
    }

    fn extract(html: &str, config: &ExtractionConfig) -> ExtractedPage {
        extract_page(html.as_bytes(), &base(), config)
    }

    #[test]
    fn extracts_title_and_meta() {
        let html = r#"<html><head>
            <title>  Widget   Shop </title>
            <meta name="description" content="All the widgets">
            <link rel="canonical" href="/shop/">
        </head><body></body></html>"#;

        let page = extract(html, &ExtractionConfig::default());
        assert_eq!(page.title.as_deref(), Some("Widget Shop"));
        assert_eq!(page.meta_description.as_deref(), Some("All the widgets"));
        assert_eq!(page.canonical_url.as_deref(), Some("https://a.example/shop/"));
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn missing_fields_stay_absent() {
        let page = extract("<html><body><p>bare</p></body></html>", &ExtractionConfig::default());
        assert!(page.title.is_none());
        assert!(page.meta_description.is_none());
        assert!(page.canonical_url.is_none());
        assert!(page.headings.is_empty());
    }

    #[test]
    fn malformed_html_does_not_panic() {
        let page = extract("<html><ti<<tle>broken</b0dy", &ExtractionConfig::default());
        assert!(page.title.is_none());
    }

    #[test]
    fn headings_sorted_by_level_then_document_order() {
        let html = r#"<body>
            <h2>Second A</h2>
            <h1>First</h1>
            <h2>Second B</h2>
            <h3>Third</h3>
        </body>"#;

        let page = extract(html, &ExtractionConfig::default());
        let outline: Vec<(u8, &str)> = page
            .headings
            .iter()
            .map(|h| (h.level, h.text.as_str()))
            .collect();
        assert_eq!(
            outline,
            vec![
                (1, "First"),
                (2, "Second A"),
                (2, "Second B"),
                (3, "Third")
            ]
        );
    }

    #[test]
    fn headings_respect_enabled_levels_and_truncation() {
        let html = "<body><h1>A very long heading indeed</h1><h4>Skipped</h4></body>";
        let config = ExtractionConfig {
            headings: HeadingsConfig {
                levels: vec![1],
                max_length: 6,
                ..HeadingsConfig::default()
            },
            ..ExtractionConfig::default()
        };

        let page = extract(html, &config);
        assert_eq!(page.headings.len(), 1);
        assert_eq!(page.headings[0].text, "A very…");
    }

    #[test]
    fn heading_inner_tags_are_stripped() {
        let html = "<body><h1>Big <em>sale</em>   now</h1></body>";
        let page = extract(html, &ExtractionConfig::default());
        assert_eq!(page.headings[0].text, "Big sale now");
    }

    #[test]
    fn links_resolved_and_deduplicated() {
        let html = r#"<body>
            <a href="widgets">One</a>
            <a href="/about">Two</a>
            <a href="https://other.example/x">Three</a>
            <a href="widgets">Duplicate</a>
            <a href="http://">Broken</a>
        </body>"#;

        let page = extract(html, &ExtractionConfig::default());
        assert_eq!(
            page.links,
            vec![
                "https://a.example/shop/widgets",
                "https://a.example/about",
                "https://other.example/x",
            ]
        );
    }

    #[test]
    fn open_graph_captured_when_enabled() {
        let html = r#"<head>
            <meta property="og:title" content="OG Widgets">
            <meta property="og:site_name" content="Widget Shop">
            <meta property="og:type" content="website">
        </head>"#;
        let config = ExtractionConfig {
            open_graph: OpenGraphConfig {
                enabled: true,
                og_type: false,
                ..OpenGraphConfig::default()
            },
            ..ExtractionConfig::default()
        };

        let page = extract(html, &config);
        assert_eq!(page.open_graph.get("og:title").map(String::as_str), Some("OG Widgets"));
        assert_eq!(
            page.open_graph.get("og:site_name").map(String::as_str),
            Some("Widget Shop")
        );
        // og:type disabled by the config.
        assert!(!page.open_graph.contains_key("og:type"));
    }

    #[test]
    fn main_content_skips_excluded_sections() {
        let html = r#"<body><main>
            <p>Keep this</p>
            <aside class="ads">Drop this</aside>
            <p>And this</p>
        </main></body>"#;
        let config = ExtractionConfig {
            main_content: MainContentConfig {
                enabled: true,
                selector: "main".to_string(),
                exclude_selectors: vec![".ads".to_string()],
                ..MainContentConfig::default()
            },
            ..ExtractionConfig::default()
        };

        let page = extract(html, &config);
        let content = page.main_content.unwrap();
        assert!(content.contains("Keep this"));
        assert!(content.contains("And this"));
        assert!(!content.contains("Drop this"));
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("abcdef", 4), "abcd…");
        assert_eq!(truncate("abc", 4), "abc");
        assert_eq!(truncate("héllo", 2), "hé…");
    }
}
