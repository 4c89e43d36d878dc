use std::collections::BTreeSet;

use sitewatch_types::{ChangeImpact, FieldChange, Heading, PageSnapshot};

/// Separator used when a breadcrumb trail is compared as one string.
const BREADCRUMB_SEPARATOR: &str = " > ";

/// Impact classification for scalar snapshot fields.
fn scalar_impact(field: &str) -> ChangeImpact {
    match field {
        "title" => ChangeImpact::High,
        "metaDescription" | "canonicalUrl" => ChangeImpact::Medium,
        "breadcrumbs" => ChangeImpact::Low,
        _ => ChangeImpact::Low,
    }
}

/// Impact classification for heading fields by level.
fn heading_impact(level: u8) -> ChangeImpact {
    if level <= 2 {
        ChangeImpact::High
    } else {
        ChangeImpact::Medium
    }
}

/// Impact classification for custom-data fields; `price` is the one
/// commercially loaded field.
fn custom_impact(name: &str) -> ChangeImpact {
    if name == "price" {
        ChangeImpact::High
    } else {
        ChangeImpact::Low
    }
}

/// Field-by-field diff between two snapshots of the same URL.
pub fn compare_snapshots(base: &PageSnapshot, compare: &PageSnapshot) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    diff_scalar("title", &base.title, &compare.title, &mut changes);
    diff_scalar(
        "metaDescription",
        &base.meta_description,
        &compare.meta_description,
        &mut changes,
    );
    diff_scalar(
        "canonicalUrl",
        &base.canonical_url,
        &compare.canonical_url,
        &mut changes,
    );

    let base_trail = non_empty(base.breadcrumb_trail(BREADCRUMB_SEPARATOR));
    let compare_trail = non_empty(compare.breadcrumb_trail(BREADCRUMB_SEPARATOR));
    diff_scalar("breadcrumbs", &base_trail, &compare_trail, &mut changes);

    diff_headings(&base.headings, &compare.headings, &mut changes);
    diff_custom(base, compare, &mut changes);

    changes
}

/// Every present field of a snapshot reported as `Added`, for pages that
/// exist only in the compare scan.
pub fn field_changes_for_added(snapshot: &PageSnapshot) -> Vec<FieldChange> {
    one_sided(snapshot, true)
}

/// Every present field reported as `Removed`, for pages that exist only
/// in the base scan.
pub fn field_changes_for_removed(snapshot: &PageSnapshot) -> Vec<FieldChange> {
    one_sided(snapshot, false)
}

fn one_sided(snapshot: &PageSnapshot, added: bool) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut push = |field: &str, value: String, impact: ChangeImpact| {
        changes.push(if added {
            FieldChange::added(field, value, impact)
        } else {
            FieldChange::removed(field, value, impact)
        });
    };

    if let Some(title) = &snapshot.title {
        push("title", title.clone(), scalar_impact("title"));
    }
    if let Some(description) = &snapshot.meta_description {
        push(
            "metaDescription",
            description.clone(),
            scalar_impact("metaDescription"),
        );
    }
    if let Some(canonical) = &snapshot.canonical_url {
        push("canonicalUrl", canonical.clone(), scalar_impact("canonicalUrl"));
    }
    if !snapshot.breadcrumbs.is_empty() {
        push(
            "breadcrumbs",
            snapshot.breadcrumb_trail(BREADCRUMB_SEPARATOR),
            scalar_impact("breadcrumbs"),
        );
    }
    for heading in &snapshot.headings {
        push(
            &format!("header-h{}", heading.level),
            heading.text.clone(),
            heading_impact(heading.level),
        );
    }
    for (name, value) in &snapshot.custom_data {
        push(name, render_value(value), custom_impact(name));
    }

    changes
}

fn diff_scalar(
    field: &str,
    old: &Option<String>,
    new: &Option<String>,
    changes: &mut Vec<FieldChange>,
) {
    let impact = scalar_impact(field);
    match (old, new) {
        (None, Some(new)) => changes.push(FieldChange::added(field, new.clone(), impact)),
        (Some(old), None) => changes.push(FieldChange::removed(field, old.clone(), impact)),
        (Some(old), Some(new)) if old != new => {
            changes.push(FieldChange::modified(field, old.clone(), new.clone(), impact))
        }
        _ => {}
    }
}

/// Positional heading alignment: headings are keyed as
/// (level, index-within-level); a key present on one side only is an
/// added/removed heading, differing text at the same key is a modification.
fn diff_headings(base: &[Heading], compare: &[Heading], changes: &mut Vec<FieldChange>) {
    let levels: BTreeSet<u8> = base
        .iter()
        .chain(compare.iter())
        .map(|h| h.level)
        .collect();

    for level in levels {
        let field = format!("header-h{level}");
        let impact = heading_impact(level);
        let old: Vec<&str> = base
            .iter()
            .filter(|h| h.level == level)
            .map(|h| h.text.as_str())
            .collect();
        let new: Vec<&str> = compare
            .iter()
            .filter(|h| h.level == level)
            .map(|h| h.text.as_str())
            .collect();

        for index in 0..old.len().max(new.len()) {
            match (old.get(index), new.get(index)) {
                (Some(old_text), Some(new_text)) if old_text != new_text => {
                    changes.push(FieldChange::modified(&field, *old_text, *new_text, impact))
                }
                (Some(old_text), None) => {
                    changes.push(FieldChange::removed(&field, *old_text, impact))
                }
                (None, Some(new_text)) => {
                    changes.push(FieldChange::added(&field, *new_text, impact))
                }
                _ => {}
            }
        }
    }
}

fn diff_custom(base: &PageSnapshot, compare: &PageSnapshot, changes: &mut Vec<FieldChange>) {
    let names: BTreeSet<&String> = base
        .custom_data
        .keys()
        .chain(compare.custom_data.keys())
        .collect();

    for name in names {
        let impact = custom_impact(name);
        match (base.custom_data.get(name), compare.custom_data.get(name)) {
            (None, Some(new)) => {
                changes.push(FieldChange::added(name, render_value(new), impact))
            }
            (Some(old), None) => {
                changes.push(FieldChange::removed(name, render_value(old), impact))
            }
            (Some(old), Some(new)) if old != new => changes.push(FieldChange::modified(
                name,
                render_value(old),
                render_value(new),
                impact,
            )),
            _ => {}
        }
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty(trail: String) -> Option<String> {
    if trail.is_empty() {
        None
    } else {
        Some(trail)
    }
}
