//! Change detection between a desired gateway configuration and the remote one.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Dlq, EntitiesAndEventTypes, GatewayConfig, GatewayState};

/// The comparable projection of a gateway.
///
/// `gatewayType`, credentials and any remote-only metadata are left out, so
/// additive fields on the remote side never trigger an update.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CanonicalGateway<'a> {
    subscriber_id: &'a str,
    connection_string: &'a str,
    dlq: Option<&'a Dlq>,
    entities: BTreeMap<&'a str, BTreeSet<&'a str>>,
}

fn canonical_entities(entities: &EntitiesAndEventTypes) -> BTreeMap<&str, BTreeSet<&str>> {
    entities
        .iter()
        .map(|(entity, events)| {
            (
                entity.as_str(),
                events.iter().map(String::as_str).collect::<BTreeSet<_>>(),
            )
        })
        .collect()
}

impl<'a> From<&'a GatewayConfig> for CanonicalGateway<'a> {
    fn from(config: &'a GatewayConfig) -> Self {
        Self {
            subscriber_id: &config.subscriber_id,
            connection_string: config.gateway_destination.connection_string(),
            dlq: config.gateway_destination.dlq(),
            entities: canonical_entities(&config.entities_and_event_types),
        }
    }
}

impl<'a> From<&'a GatewayState> for CanonicalGateway<'a> {
    fn from(state: &'a GatewayState) -> Self {
        Self {
            subscriber_id: &state.subscriber_id,
            connection_string: &state.gateway_destination.connection_string,
            dlq: state.gateway_destination.dlq.as_ref(),
            entities: canonical_entities(&state.entities_and_event_types),
        }
    }
}

/// Reports whether `current` must be updated to match `desired`.
///
/// A change is any difference in subscriber id, connection string, DLQ, the
/// set of entity types, or the set of event types of an entity. Event type
/// order and duplicates are ignored.
pub fn has_changed(desired: &GatewayConfig, current: &GatewayState) -> bool {
    let desired = CanonicalGateway::from(desired);
    let current = CanonicalGateway::from(current);

    if desired.subscriber_id != current.subscriber_id {
        tracing::debug!(
            desired = desired.subscriber_id,
            current = current.subscriber_id,
            "subscriberId changed"
        );
        return true;
    }
    if desired.connection_string != current.connection_string {
        tracing::debug!("connectionString changed");
        return true;
    }
    if desired.dlq != current.dlq {
        tracing::debug!(desired = ?desired.dlq, current = ?current.dlq, "dlq changed");
        return true;
    }
    if desired.entities != current.entities {
        tracing::debug!("entitiesAndEventTypes changed");
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AwsCredentials, AwsDestination, GatewayDestination, Space};
    use serde_json::json;

    fn desired(entities: serde_json::Value, dlq: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            subscriber_id: "s1".into(),
            space: Space::default(),
            entities_and_event_types: serde_json::from_value(entities).unwrap(),
            gateway_destination: GatewayDestination::Aws(AwsDestination {
                connection_string: "arn:x".into(),
                credentials: AwsCredentials::new("a", "b"),
                dlq: dlq.map(|url| Dlq { url: url.into() }),
            }),
        }
    }

    fn current(value: serde_json::Value) -> GatewayState {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_identical_config_is_unchanged() {
        let desired = desired(json!({"E": ["Created"]}), None);
        let current = current(json!({
            "subscriberId": "s1",
            "entitiesAndEventTypes": {"E": ["Created"]},
            "gatewayDestination": {"gatewayType": "AWS", "connectionString": "arn:x"}
        }));
        assert!(!has_changed(&desired, &current));
    }

    #[test]
    fn test_added_event_type_is_a_change() {
        let desired = desired(json!({"E": ["Created"]}), None);
        let current = current(json!({
            "subscriberId": "s1",
            "entitiesAndEventTypes": {"E": ["Created", "Updated"]},
            "gatewayDestination": {"gatewayType": "AWS", "connectionString": "arn:x"}
        }));
        assert!(has_changed(&desired, &current));
    }

    #[test]
    fn test_event_type_order_is_ignored() {
        let events = ["Created", "Updated", "Deleted"];
        let permutations = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let desired = desired(json!({"E": events, "F": ["Shipped"]}), Some("https://sqs/dlq"));
        for order in permutations {
            let permuted: Vec<&str> = order.iter().map(|&i| events[i]).collect();
            let current = current(json!({
                "subscriberId": "s1",
                "entitiesAndEventTypes": {"F": ["Shipped"], "E": permuted},
                "gatewayDestination": {
                    "gatewayType": "AWS",
                    "connectionString": "arn:x",
                    "dlq": {"url": "https://sqs/dlq"}
                }
            }));
            assert!(!has_changed(&desired, &current), "order {order:?}");
        }
    }

    #[test]
    fn test_subscriber_change() {
        let desired = desired(json!({"E": ["Created"]}), None);
        let current = current(json!({
            "subscriberId": "s2",
            "entitiesAndEventTypes": {"E": ["Created"]},
            "gatewayDestination": {"gatewayType": "AWS", "connectionString": "arn:x"}
        }));
        assert!(has_changed(&desired, &current));
    }

    #[test]
    fn test_connection_string_change() {
        let desired = desired(json!({"E": ["Created"]}), None);
        let current = current(json!({
            "subscriberId": "s1",
            "entitiesAndEventTypes": {"E": ["Created"]},
            "gatewayDestination": {"gatewayType": "AWS", "connectionString": "arn:y"}
        }));
        assert!(has_changed(&desired, &current));
    }

    #[test]
    fn test_dlq_presence_on_one_side_is_a_change() {
        let with_dlq = desired(json!({"E": ["Created"]}), Some("https://sqs/dlq"));
        let without_dlq = current(json!({
            "subscriberId": "s1",
            "entitiesAndEventTypes": {"E": ["Created"]},
            "gatewayDestination": {"gatewayType": "AWS", "connectionString": "arn:x"}
        }));
        assert!(has_changed(&with_dlq, &without_dlq));

        let plain = desired(json!({"E": ["Created"]}), None);
        let remote_dlq = current(json!({
            "subscriberId": "s1",
            "entitiesAndEventTypes": {"E": ["Created"]},
            "gatewayDestination": {
                "gatewayType": "AWS",
                "connectionString": "arn:x",
                "dlq": {"url": "https://sqs/dlq"}
            }
        }));
        assert!(has_changed(&plain, &remote_dlq));
    }

    #[test]
    fn test_dlq_url_change() {
        let desired = desired(json!({"E": ["Created"]}), Some("https://sqs/new"));
        let current = current(json!({
            "subscriberId": "s1",
            "entitiesAndEventTypes": {"E": ["Created"]},
            "gatewayDestination": {
                "gatewayType": "AWS",
                "connectionString": "arn:x",
                "dlq": {"url": "https://sqs/old"}
            }
        }));
        assert!(has_changed(&desired, &current));
    }

    #[test]
    fn test_entity_set_changes() {
        let desired = desired(json!({"E": ["Created"], "F": ["Created"]}), None);
        let fewer = current(json!({
            "subscriberId": "s1",
            "entitiesAndEventTypes": {"E": ["Created"]},
            "gatewayDestination": {"gatewayType": "AWS", "connectionString": "arn:x"}
        }));
        assert!(has_changed(&desired, &fewer));

        let different = current(json!({
            "subscriberId": "s1",
            "entitiesAndEventTypes": {"E": ["Created"], "G": ["Created"]},
            "gatewayDestination": {"gatewayType": "AWS", "connectionString": "arn:x"}
        }));
        assert!(has_changed(&desired, &different));
    }

    #[test]
    fn test_remote_metadata_and_gateway_type_are_ignored() {
        let desired = desired(json!({"E": ["Created"]}), None);
        let current = current(json!({
            "subscriberId": "s1",
            "space": "default",
            "enabled": false,
            "entitiesAndEventTypes": {"E": ["Created", "Created"]},
            "gatewayDestination": {
                "gatewayType": "aws-lambda",
                "connectionString": "arn:x",
                "credentials": {"accessKey": "other"}
            }
        }));
        assert!(!has_changed(&desired, &current));
    }
}
