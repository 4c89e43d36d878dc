//! # Sitewatch Spider
//!
//! URL discovery for sitewatch scans:
//!
//! - **Pattern matcher**: glob include/exclude predicates over URLs
//! - **Sitemap parser**: XML sitemap and sitemap-index resolution with
//!   auto-detection of conventional locations
//! - **Link crawler**: breadth-first discovery bounded by depth and page
//!   caps, with robots gating and batch pacing

pub mod crawler;
pub mod patterns;
pub mod sitemap;

pub use crawler::LinkCrawler;
pub use patterns::{glob_matches, PatternSet};
pub use sitemap::SitemapParser;
