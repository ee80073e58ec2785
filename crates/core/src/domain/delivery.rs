use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Brochure,
    Video,
    Location,
    PriceList,
    GenericInfo,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brochure => "brochure",
            Self::Video => "video",
            Self::Location => "location",
            Self::PriceList => "price_list",
            Self::GenericInfo => "generic_info",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "brochure" => Some(Self::Brochure),
            "video" => Some(Self::Video),
            "location" => Some(Self::Location),
            "price_list" => Some(Self::PriceList),
            "generic_info" => Some(Self::GenericInfo),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryKey {
    pub lead_id: LeadId,
    pub development: String,
    pub resource_type: ResourceType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeliveryRecord {
    pub key: DeliveryKey,
    pub delivered_at: DateTime<Utc>,
}
