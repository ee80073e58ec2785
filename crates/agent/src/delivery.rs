//! Turns resource requests into attachments and records them once transmitted.

use chrono::{DateTime, Utc};

use leadflow_core::delivery::{record_delivered, resolve_assets, should_deliver, PlannedDelivery};
use leadflow_core::domain::catalog::CatalogSnapshot;
use leadflow_core::domain::delivery::{DeliveryKey, ResourceDeliveryRecord};
use leadflow_core::domain::lead::Lead;

pub fn plan_deliveries(
    lead: &Lead,
    requested: &[String],
    explicit_request: bool,
    catalog: &CatalogSnapshot,
) -> Vec<PlannedDelivery> {
    let to_send = should_deliver(lead, requested, explicit_request);
    resolve_assets(catalog, &to_send)
}

/// Name the delivery is remembered under: the catalog name, or what the lead asked for when
/// only the generic asset went out.
fn delivered_name(delivery: &PlannedDelivery) -> &str {
    delivery.development.as_deref().unwrap_or(delivery.requested.as_str())
}

/// Call only with attachments the channel accepted.
pub fn record_sent(
    lead: &mut Lead,
    sent: &[PlannedDelivery],
    now: DateTime<Utc>,
) -> Vec<ResourceDeliveryRecord> {
    let names: Vec<String> =
        sent.iter().map(|delivery| delivered_name(delivery).to_string()).collect();
    record_delivered(lead, &names);

    let mut records: Vec<ResourceDeliveryRecord> = Vec::new();
    for delivery in sent {
        let key = DeliveryKey {
            lead_id: lead.id.clone(),
            development: delivered_name(delivery).to_string(),
            resource_type: delivery.resource_type,
        };
        if records.iter().all(|record| record.key != key) {
            records.push(ResourceDeliveryRecord { key, delivered_at: now });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use leadflow_core::domain::catalog::{CatalogEntry, CatalogSnapshot, ResourceLink};
    use leadflow_core::domain::delivery::ResourceType;
    use leadflow_core::domain::lead::Lead;

    use super::{plan_deliveries, record_sent};

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot {
            entries: vec![CatalogEntry {
                development_name: "Monte Verde".to_string(),
                resource_links: vec![
                    ResourceLink {
                        resource_type: ResourceType::Brochure,
                        url: "https://cdn.example/monte-verde.pdf".to_string(),
                    },
                    ResourceLink {
                        resource_type: ResourceType::Video,
                        url: "https://cdn.example/monte-verde.mp4".to_string(),
                    },
                ],
                price_range: None,
            }],
            generic_asset: Some(ResourceLink {
                resource_type: ResourceType::GenericInfo,
                url: "https://cdn.example/overview.pdf".to_string(),
            }),
        }
    }

    #[test]
    fn second_request_without_explicit_ask_sends_nothing() {
        let mut lead = Lead::new("+5215550001111", Utc::now());
        let requested = vec!["monte verde".to_string()];

        let first = plan_deliveries(&lead, &requested, false, &catalog());
        assert_eq!(first.len(), 2);
        record_sent(&mut lead, &first, Utc::now());

        assert!(plan_deliveries(&lead, &requested, false, &catalog()).is_empty());
        assert_eq!(plan_deliveries(&lead, &requested, true, &catalog()).len(), 2);
    }

    #[test]
    fn recording_twice_is_idempotent() {
        let mut lead = Lead::new("+5215550001111", Utc::now());
        let planned = plan_deliveries(&lead, &["Monte Verde".to_string()], false, &catalog());

        let records = record_sent(&mut lead, &planned, Utc::now());
        record_sent(&mut lead, &planned, Utc::now());

        assert_eq!(records.len(), 2);
        assert_eq!(lead.resources_sent_for.len(), 1);
    }

    #[test]
    fn unknown_development_is_remembered_under_requested_name() {
        let mut lead = Lead::new("+5215550001111", Utc::now());
        let planned = plan_deliveries(&lead, &["Costa Azul".to_string()], false, &catalog());
        assert_eq!(planned[0].resource_type, ResourceType::GenericInfo);

        let records = record_sent(&mut lead, &planned, Utc::now());
        assert_eq!(records[0].key.development, "Costa Azul");
        assert!(lead.resources_sent_for.contains("Costa Azul"));
    }
}
