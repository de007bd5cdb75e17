//! # eventuate-gateway-core
//!
//! Provisions and reconciles Eventuate AWS gateways, the remote resources
//! that route published events into deployed serverless functions.
//!
//! ## Overview
//!
//! - [`identity`] resolves a function name to its deployed address and
//!   derives the gateway identifier from it.
//! - [`client`] talks to the gateway HTTP API and classifies failures.
//! - [`diff`] decides whether a stored gateway needs an update.
//! - [`reconciler`] combines them into upsert, remove, describe and
//!   enable/disable operations, one function at a time or in batches.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use eventuate_gateway_core::{
//!     ApiAuth, CloudFormationOutputs, DEFAULT_GATEWAY_URL, HttpGatewayClient, IdentityResolver,
//!     Reconciler, ServiceManifest,
//! };
//!
//! let manifest = ServiceManifest::from_path("serverless.yml")?;
//! let resolver = IdentityResolver::new(
//!     Arc::new(CloudFormationOutputs::new()),
//!     manifest.deployment(None, None),
//! );
//! let book = resolver.address_book().await?;
//!
//! let client = HttpGatewayClient::new(DEFAULT_GATEWAY_URL, ApiAuth::resolve(None)?)?;
//! let reconciler = Reconciler::new(Arc::new(client));
//! let outcome = reconciler.upsert(&book, "eventHandlerLambda", &config).await?;
//! ```

pub mod aws;
pub mod client;
pub mod diff;
pub mod error;
pub mod identity;
pub mod manifest;
pub mod outputs;
pub mod reconciler;
pub mod types;

pub use aws::{AwsConnection, host_credentials};
pub use client::{ApiAuth, DEFAULT_GATEWAY_URL, DynGatewayApi, GatewayApi, HttpGatewayClient};
pub use diff::has_changed;
pub use error::{GatewayError, Result};
pub use identity::{AddressBook, FunctionAddress, GatewayId, IdentityResolver};
pub use manifest::{DeclaredGateway, ManifestCustom, ServiceManifest};
pub use outputs::{
    CloudFormationOutputs, DescribeStacksFile, Deployment, StackOutputs, StaticOutputs,
};
pub use reconciler::{BatchReport, ReconcileAction, Reconciler, RemoveOutcome, UpsertOutcome};
pub use types::{
    Ack, AwsCredentials, AwsDestination, DEFAULT_SPACE, Dlq, GatewayConfig, GatewayDestination,
    GatewayState, RemoteDestination, Space,
};
