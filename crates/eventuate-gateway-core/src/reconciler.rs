//! Create-or-update and delete reconciliation of gateways.
//!
//! `upsert` tries to create the gateway first. A conflict means it already
//! exists: the stored configuration is fetched and only replaced when it
//! differs from the desired one. Batch operations run every function
//! concurrently and collect all results, so one failure never stops the
//! others.

use futures_util::future::join_all;
use serde::Serialize;

use crate::client::DynGatewayApi;
use crate::diff::has_changed;
use crate::error::{GatewayError, Result};
use crate::identity::{AddressBook, GatewayId};
use crate::types::{Ack, GatewayConfig, GatewayState, Space};

/// What `upsert` did to the remote gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub function: String,
    pub gateway_id: GatewayId,
    pub space: Space,
    pub action: ReconcileAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOutcome {
    pub function: String,
    pub gateway_id: GatewayId,
    pub space: Space,
}

/// Per-function results of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub results: Vec<(String, Result<T>)>,
}

impl<T> BatchReport<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }

    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &GatewayError)> {
        self.results
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name.as_str(), e)))
    }

    /// All outcomes, or [`GatewayError::BatchFailed`] naming the failed functions.
    pub fn into_result(self) -> Result<Vec<T>> {
        let total = self.results.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut failed = Vec::new();
        for (name, result) in self.results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => failed.push(name),
            }
        }
        if failed.is_empty() {
            Ok(outcomes)
        } else {
            Err(GatewayError::BatchFailed { failed, total })
        }
    }
}

/// Drives gateway reconciliation through a [`crate::client::GatewayApi`].
#[derive(Clone)]
pub struct Reconciler {
    api: DynGatewayApi,
}

impl Reconciler {
    pub fn new(api: DynGatewayApi) -> Self {
        Self { api }
    }

    /// Creates the gateway of `function_name`, or updates it when the stored
    /// configuration differs from `config`.
    pub async fn upsert(
        &self,
        book: &AddressBook,
        function_name: &str,
        config: &GatewayConfig,
    ) -> Result<UpsertOutcome> {
        config.validate()?;
        let address = book.resolve_address(function_name)?;
        if address.as_str() != config.gateway_destination.connection_string() {
            return Err(GatewayError::configuration(format!(
                "connectionString of function \"{function_name}\" does not match its deployed address {address}"
            )));
        }

        let gateway_id = GatewayId::derive(address);
        let space = &config.space;
        tracing::info!(
            function = function_name,
            space = %space,
            gateway_id = %gateway_id,
            "Create eventuate gateway"
        );

        let action = match self.api.create(space, &gateway_id, config).await {
            Ok(_) => {
                tracing::info!(function = function_name, gateway_id = %gateway_id, "Eventuate gateway created");
                ReconcileAction::Created
            }
            Err(GatewayError::Conflict { .. }) => {
                let current = self.api.get(space, &gateway_id).await?;
                if !needs_update(config, current.as_ref(), &gateway_id) {
                    tracing::info!(
                        function = function_name,
                        space = %space,
                        gateway_id = %gateway_id,
                        "Eventuate gateway not changed"
                    );
                    ReconcileAction::Unchanged
                } else {
                    tracing::info!(
                        function = function_name,
                        space = %space,
                        gateway_id = %gateway_id,
                        "Update eventuate gateway"
                    );
                    self.api.update(space, &gateway_id, config).await?;
                    ReconcileAction::Updated
                }
            }
            Err(e) => return Err(e),
        };

        Ok(UpsertOutcome {
            function: function_name.to_string(),
            gateway_id,
            space: space.clone(),
            action,
        })
    }

    /// Deletes the gateway of `function_name` in `space`.
    pub async fn remove(
        &self,
        book: &AddressBook,
        function_name: &str,
        space: &Space,
    ) -> Result<RemoveOutcome> {
        let gateway_id = book.gateway_id(function_name)?;
        self.api.delete(space, &gateway_id).await?;
        tracing::info!(
            function = function_name,
            space = %space,
            gateway_id = %gateway_id,
            "Eventuate gateway removed"
        );
        Ok(RemoveOutcome {
            function: function_name.to_string(),
            gateway_id,
            space: space.clone(),
        })
    }

    /// Deletes a gateway by identifier.
    pub async fn delete(&self, gateway_id: &GatewayId, space: &Space) -> Result<Ack> {
        self.api.delete(space, gateway_id).await
    }

    /// Enables or disables routing of a gateway.
    pub async fn set_state(&self, gateway_id: &GatewayId, space: &Space, enabled: bool) -> Result<Ack> {
        let ack = self.api.set_enabled(space, gateway_id, enabled).await?;
        tracing::info!(space = %space, gateway_id = %gateway_id, enabled, "Eventuate gateway state set");
        Ok(ack)
    }

    /// Fetches a gateway; `None` when it does not exist.
    pub async fn describe(&self, gateway_id: &GatewayId, space: &Space) -> Result<Option<GatewayState>> {
        let state = self.api.get(space, gateway_id).await?;
        if state.is_none() {
            tracing::info!(space = %space, gateway_id = %gateway_id, "Eventuate gateway not exists");
        }
        Ok(state)
    }

    /// Upserts every `(function, config)` pair concurrently.
    pub async fn upsert_all(
        &self,
        book: &AddressBook,
        configs: Vec<(String, GatewayConfig)>,
    ) -> BatchReport<UpsertOutcome> {
        let tasks = configs.into_iter().map(|(function, config)| async move {
            let result = self.upsert(book, &function, &config).await;
            if let Err(e) = &result {
                tracing::warn!(function = %function, error = %e, "Gateway upsert failed");
            }
            (function, result)
        });
        let report = BatchReport {
            results: join_all(tasks).await,
        };
        tracing::info!(
            total = report.len(),
            failed = report.failures().count(),
            "Gateway upsert batch finished"
        );
        report
    }

    /// Removes the gateway of every `(function, space)` pair concurrently.
    pub async fn remove_all(
        &self,
        book: &AddressBook,
        targets: Vec<(String, Space)>,
    ) -> BatchReport<RemoveOutcome> {
        let tasks = targets.into_iter().map(|(function, space)| async move {
            let result = self.remove(book, &function, &space).await;
            if let Err(e) = &result {
                tracing::warn!(function = %function, error = %e, "Gateway removal failed");
            }
            (function, result)
        });
        let report = BatchReport {
            results: join_all(tasks).await,
        };
        tracing::info!(
            total = report.len(),
            failed = report.failures().count(),
            "Gateway removal batch finished"
        );
        report
    }
}

fn needs_update(desired: &GatewayConfig, current: Option<&GatewayState>, id: &GatewayId) -> bool {
    match current {
        Some(current) => has_changed(desired, current),
        None => {
            tracing::warn!(gateway_id = %id, "Gateway vanished after conflict, updating anyway");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GatewayApi;
    use crate::identity::FunctionAddress;
    use crate::types::{AwsCredentials, AwsDestination, GatewayDestination};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    const ARN: &str = "arn:aws:lambda:us-east-1:1:function:svc-dev-orders";

    /// In-memory gateway API that records calls.
    #[derive(Default)]
    struct FakeApi {
        stored: Mutex<HashMap<(String, String), serde_json::Value>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeApi {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn key(space: &Space, id: &GatewayId) -> (String, String) {
            (space.to_string(), id.to_string())
        }
    }

    #[async_trait]
    impl GatewayApi for FakeApi {
        async fn create(&self, space: &Space, id: &GatewayId, config: &GatewayConfig) -> Result<Ack> {
            self.record("create");
            let mut stored = self.stored.lock().unwrap();
            let key = Self::key(space, id);
            if stored.contains_key(&key) {
                return Err(GatewayError::conflict(space.as_str(), id.as_str()));
            }
            stored.insert(key, serde_json::to_value(config)?);
            Ok(Ack::default())
        }

        async fn get(&self, space: &Space, id: &GatewayId) -> Result<Option<GatewayState>> {
            self.record("get");
            let stored = self.stored.lock().unwrap();
            match stored.get(&Self::key(space, id)) {
                Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
                None => Ok(None),
            }
        }

        async fn update(&self, space: &Space, id: &GatewayId, config: &GatewayConfig) -> Result<Ack> {
            self.record("update");
            self.stored
                .lock()
                .unwrap()
                .insert(Self::key(space, id), serde_json::to_value(config)?);
            Ok(Ack::default())
        }

        async fn delete(&self, space: &Space, id: &GatewayId) -> Result<Ack> {
            self.record("delete");
            self.stored.lock().unwrap().remove(&Self::key(space, id));
            Ok(Ack::default())
        }

        async fn set_enabled(&self, _space: &Space, _id: &GatewayId, _enabled: bool) -> Result<Ack> {
            self.record("set_enabled");
            Ok(Ack::default())
        }
    }

    fn book() -> AddressBook {
        AddressBook::from_outputs(&HashMap::from([(
            "OrdersLambdaFunctionQualifiedArn".to_string(),
            format!("{ARN}:3"),
        )]))
    }

    fn config(events: &[&str]) -> GatewayConfig {
        GatewayConfig {
            subscriber_id: "orders-subscriber".into(),
            space: Space::new("test"),
            entities_and_event_types: BTreeMap::from([(
                "Order".to_string(),
                events.iter().map(|e| e.to_string()).collect(),
            )]),
            gateway_destination: GatewayDestination::Aws(AwsDestination {
                connection_string: ARN.into(),
                credentials: AwsCredentials::new("AKIA", "secret"),
                dlq: None,
            }),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_is_idempotent() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());
        let book = book();

        let first = reconciler.upsert(&book, "orders", &config(&["Created"])).await.unwrap();
        assert_eq!(first.action, ReconcileAction::Created);
        assert_eq!(first.gateway_id, GatewayId::derive(&FunctionAddress::from_qualified_arn(ARN)));
        let after_first = api.stored.lock().unwrap().clone();

        let second = reconciler.upsert(&book, "orders", &config(&["Created"])).await.unwrap();
        assert_eq!(second.action, ReconcileAction::Unchanged);
        assert_eq!(api.calls(), vec!["create", "create", "get"]);
        assert_eq!(*api.stored.lock().unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_upsert_updates_changed_config() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());
        let book = book();

        reconciler.upsert(&book, "orders", &config(&["Created"])).await.unwrap();
        let outcome = reconciler
            .upsert(&book, "orders", &config(&["Created", "Cancelled"]))
            .await
            .unwrap();

        assert_eq!(outcome.action, ReconcileAction::Updated);
        assert_eq!(api.calls(), vec!["create", "create", "get", "update"]);
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_config_before_any_call() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());
        let mut config = config(&["Created"]);
        let GatewayDestination::Aws(dest) = &mut config.gateway_destination;
        dest.credentials.access_key.clear();

        let err = reconciler.upsert(&book(), "orders", &config).await.unwrap_err();
        assert!(err.is_configuration_error());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_unknown_function_is_not_deployed() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());

        let err = reconciler
            .upsert(&book(), "payments", &config(&["Created"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotDeployed(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_rejects_mismatched_connection_string() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());
        let mut config = config(&["Created"]);
        let GatewayDestination::Aws(dest) = &mut config.gateway_destination;
        dest.connection_string = "arn:aws:lambda:us-east-1:1:function:other".into();

        let err = reconciler.upsert(&book(), "orders", &config).await.unwrap_err();
        assert!(err.is_configuration_error());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_describe() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());
        let book = book();
        let outcome = reconciler.upsert(&book, "orders", &config(&["Created"])).await.unwrap();

        let state = reconciler.describe(&outcome.gateway_id, &outcome.space).await.unwrap();
        assert_eq!(state.unwrap().subscriber_id, "orders-subscriber");

        reconciler.remove(&book, "orders", &Space::new("test")).await.unwrap();
        let state = reconciler.describe(&outcome.gateway_id, &outcome.space).await.unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_set_state_passes_through() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());
        reconciler
            .set_state(&GatewayId::new("abc"), &Space::default(), false)
            .await
            .unwrap();
        assert_eq!(api.calls(), vec!["set_enabled"]);
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());

        let report = reconciler
            .upsert_all(
                &book(),
                vec![
                    ("payments".to_string(), config(&["Created"])),
                    ("orders".to_string(), config(&["Created"])),
                ],
            )
            .await;

        assert!(!report.is_success());
        assert_eq!(report.successes().count(), 1);
        let failures: Vec<&str> = report.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["payments"]);
        assert_eq!(report.results[1].0, "orders");

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, GatewayError::BatchFailed { total: 2, .. }));
    }

    #[tokio::test]
    async fn test_remove_all() {
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());
        let book = book();
        reconciler.upsert(&book, "orders", &config(&["Created"])).await.unwrap();

        let report = reconciler
            .remove_all(&book, vec![("orders".to_string(), Space::new("test"))])
            .await;
        let outcomes = report.into_result().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(api.stored.lock().unwrap().is_empty());
    }
}
