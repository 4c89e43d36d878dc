use regex::Regex;
use sitewatch_types::UrlPattern;
use tracing::warn;
use url::Url;

/// Translate a glob pattern into an anchored regular expression:
/// `*` matches any run of characters, `?` matches a single character,
/// everything else is literal.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            // Remaining regex metacharacters become literals.
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
    }
    regex.push('$');
    regex
}

/// Whether `url` matches a single glob pattern.
///
/// Path-shaped patterns (leading `/`) are matched against the URL path,
/// which is how site operators write include/exclude rules; anything else
/// matches the full URL string.
pub fn glob_matches(url: &str, pattern: &str) -> bool {
    let regex = match Regex::new(&glob_to_regex(pattern)) {
        Ok(regex) => regex,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Unusable URL pattern");
            return false;
        }
    };

    if pattern.starts_with('/') {
        if let Ok(parsed) = Url::parse(url) {
            return regex.is_match(parsed.path());
        }
    }
    regex.is_match(url)
}

/// Compiled include/exclude pattern lists.
///
/// Exclude always wins; an empty include list admits everything; disabled
/// patterns are kept in configuration but never match.
#[derive(Debug, Clone)]
pub struct PatternSet {
    includes: Vec<CompiledPattern>,
    excludes: Vec<CompiledPattern>,
    include_list_empty: bool,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    regex: Regex,
    path_only: bool,
}

impl CompiledPattern {
    fn compile(pattern: &UrlPattern) -> Option<Self> {
        match Regex::new(&glob_to_regex(&pattern.pattern)) {
            Ok(regex) => Some(Self {
                regex,
                path_only: pattern.pattern.starts_with('/'),
            }),
            Err(e) => {
                warn!(pattern = %pattern.pattern, error = %e, "Skipping unusable URL pattern");
                None
            }
        }
    }

    fn matches(&self, url: &str) -> bool {
        if self.path_only {
            if let Ok(parsed) = Url::parse(url) {
                return self.regex.is_match(parsed.path());
            }
        }
        self.regex.is_match(url)
    }
}

impl PatternSet {
    pub fn new(include: &[UrlPattern], exclude: &[UrlPattern]) -> Self {
        Self {
            includes: include
                .iter()
                .filter(|p| p.enabled)
                .filter_map(CompiledPattern::compile)
                .collect(),
            excludes: exclude
                .iter()
                .filter(|p| p.enabled)
                .filter_map(CompiledPattern::compile)
                .collect(),
            include_list_empty: include.is_empty(),
        }
    }

    /// The inclusion predicate: excluded URLs are always out; with no
    /// include patterns configured everything else is in; otherwise at
    /// least one enabled include pattern must match.
    pub fn should_include(&self, url: &str) -> bool {
        if self.excludes.iter().any(|p| p.matches(url)) {
            return false;
        }
        if self.include_list_empty {
            return true;
        }
        self.includes.iter().any(|p| p.matches(url))
    }
}
