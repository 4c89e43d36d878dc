//! Tolerant HTML extraction for sitewatch.
//!
//! Extracts the structured snapshot fields (title, metadata, heading
//! outline, breadcrumb trail, links, custom selectors) from raw response
//! bytes. Best-effort by contract: malformed HTML never fails extraction,
//! missing fields stay absent, and bad configuration (invalid selectors,
//! required selectors matching nothing) is reported as soft warnings on
//! the result rather than errors.

pub mod breadcrumbs;
pub mod custom;
pub mod extractor;

pub use breadcrumbs::extract_breadcrumbs;
pub use extractor::{extract_links_from_bytes, extract_page, ExtractedPage};
