use serde::{Deserialize, Serialize};

use crate::domain::delivery::ResourceType;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub resource_type: ResourceType,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub development_name: String,
    #[serde(default)]
    pub resource_links: Vec<ResourceLink>,
    #[serde(default)]
    pub price_range: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
    /// Sent when a requested development cannot be matched to any entry.
    #[serde(default)]
    pub generic_asset: Option<ResourceLink>,
}

impl CatalogSnapshot {
    pub fn development_names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.development_name.as_str()).collect()
    }
}
