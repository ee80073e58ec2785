//! Which promotional resources to send, and to whom they were already sent.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{CatalogEntry, CatalogSnapshot};
use crate::domain::delivery::ResourceType;
use crate::domain::lead::Lead;
use crate::domain::outbound::OutboundAction;

/// Lowercases, strips Latin diacritics and collapses whitespace.
pub fn normalize(value: &str) -> String {
    let folded: String = value
        .chars()
        .flat_map(char::to_lowercase)
        .map(|ch| match ch {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case- and accent-insensitive containment in either direction.
pub fn names_match(left: &str, right: &str) -> bool {
    let left = normalize(left);
    let right = normalize(right);
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left.contains(&right) || right.contains(&left)
}

/// First catalog entry whose name matches `requested`.
pub fn match_development<'a>(
    catalog: &'a CatalogSnapshot,
    requested: &str,
) -> Option<&'a CatalogEntry> {
    catalog.entries.iter().find(|entry| names_match(&entry.development_name, requested))
}

/// Developments from `requested` that still need sending.
///
/// Already-delivered developments are dropped unless the lead asked again explicitly.
/// Duplicates inside `requested` collapse to their first occurrence.
pub fn should_deliver(lead: &Lead, requested: &[String], explicit_request: bool) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();
    for development in requested {
        if normalize(development).is_empty() {
            continue;
        }
        if selected.iter().any(|existing| names_match(existing, development)) {
            continue;
        }
        let already_sent =
            lead.resources_sent_for.iter().any(|sent| names_match(sent, development));
        if explicit_request || !already_sent {
            selected.push(development.clone());
        }
    }
    selected
}

/// Idempotent set-union into `resources_sent_for`. Returns whether anything was added.
pub fn record_delivered(lead: &mut Lead, developments: &[String]) -> bool {
    let mut changed = false;
    for development in developments {
        let present = lead
            .resources_sent_for
            .iter()
            .any(|sent| normalize(sent) == normalize(development));
        if !present && !normalize(development).is_empty() {
            lead.resources_sent_for.insert(development.clone());
            changed = true;
        }
    }
    changed
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedDelivery {
    pub requested: String,
    /// Canonical catalog name, or `None` when falling back to the generic asset.
    pub development: Option<String>,
    pub resource_type: ResourceType,
    pub url: String,
}

impl PlannedDelivery {
    pub fn to_action(&self) -> OutboundAction {
        OutboundAction::Attachment {
            development: self.development.clone(),
            resource_type: self.resource_type,
            url: self.url.clone(),
        }
    }
}

/// Expands developments into concrete attachments. Unknown names fall back to the
/// catalog's generic asset, sent at most once per call.
pub fn resolve_assets(catalog: &CatalogSnapshot, developments: &[String]) -> Vec<PlannedDelivery> {
    let mut planned = Vec::new();
    let mut generic_added = false;

    for requested in developments {
        match match_development(catalog, requested) {
            Some(entry) if !entry.resource_links.is_empty() => {
                planned.extend(entry.resource_links.iter().map(|link| PlannedDelivery {
                    requested: requested.clone(),
                    development: Some(entry.development_name.clone()),
                    resource_type: link.resource_type,
                    url: link.url.clone(),
                }));
            }
            _ => {
                if generic_added {
                    continue;
                }
                if let Some(generic) = &catalog.generic_asset {
                    planned.push(PlannedDelivery {
                        requested: requested.clone(),
                        development: None,
                        resource_type: generic.resource_type,
                        url: generic.url.clone(),
                    });
                    generic_added = true;
                }
            }
        }
    }

    planned
}
