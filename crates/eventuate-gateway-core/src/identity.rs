//! Identity resolution: function name to deployed address to gateway identifier.
//!
//! Deployed addresses come from stack outputs named
//! `<FunctionName>LambdaFunctionQualifiedArn`. The gateway identifier is the
//! URL-safe base64 encoding of the address, so it is deterministic and
//! reversible.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use regex::Regex;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::{GatewayError, Result};
use crate::outputs::{Deployment, StackOutputs};

static QUALIFIED_ARN_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)LambdaFunctionQualifiedArn$").expect("Invalid output key regex")
});

static VERSION_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\d+$").expect("Invalid version qualifier regex"));

/// Unique address of a deployed function, without version qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionAddress(String);

impl FunctionAddress {
    /// Builds an address from a (possibly qualified) ARN, stripping a
    /// trailing `:<version>`.
    pub fn from_qualified_arn(arn: &str) -> Self {
        Self(VERSION_QUALIFIER.replace(arn, "").into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URL-safe gateway resource key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct GatewayId(String);

impl GatewayId {
    /// Derives the identifier for a deployed function address.
    pub fn derive(address: &FunctionAddress) -> Self {
        Self(URL_SAFE.encode(address.as_str().as_bytes()))
    }

    /// Wraps an identifier supplied by an operator.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Recovers the function address this identifier was derived from.
    pub fn decode(&self) -> Result<FunctionAddress> {
        let bytes = URL_SAFE.decode(self.0.as_bytes()).map_err(|e| {
            GatewayError::configuration(format!("Gateway ID \"{}\" is not valid base64: {e}", self.0))
        })?;
        let address = String::from_utf8(bytes).map_err(|e| {
            GatewayError::configuration(format!("Gateway ID \"{}\" is not UTF-8: {e}", self.0))
        })?;
        Ok(FunctionAddress(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a function name to the logical id used in stack output keys.
/// `-` and `_` are spelled out as `Dash` and `Underscore`, then the first
/// letter is upper-cased.
pub fn normalize_function_name(name: &str) -> String {
    let escaped = name.replace('-', "Dash").replace('_', "Underscore");
    let mut chars = escaped.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Extracts the function logical id from a qualified-ARN output key.
///
/// Returns `None` for keys outside the naming convention.
pub fn output_key_to_logical_id(output_key: &str) -> Option<String> {
    if !QUALIFIED_ARN_SUFFIX.is_match(output_key) {
        return None;
    }
    Some(QUALIFIED_ARN_SUFFIX.replace(output_key, "").into_owned())
}

/// Deployed addresses keyed by function logical id.
///
/// Immutable once built; rebuild through [`IdentityResolver::refresh`].
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    addresses: HashMap<String, FunctionAddress>,
}

impl AddressBook {
    pub fn from_outputs(outputs: &HashMap<String, String>) -> Self {
        let addresses = outputs
            .iter()
            .filter_map(|(key, value)| {
                output_key_to_logical_id(key)
                    .map(|id| (id, FunctionAddress::from_qualified_arn(value)))
            })
            .collect();
        Self { addresses }
    }

    /// Resolves the deployed address of `function_name`.
    pub fn resolve_address(&self, function_name: &str) -> Result<&FunctionAddress> {
        self.addresses
            .get(&normalize_function_name(function_name))
            .ok_or_else(|| GatewayError::NotDeployed(function_name.to_string()))
    }

    /// Resolves the gateway identifier of `function_name`.
    pub fn gateway_id(&self, function_name: &str) -> Result<GatewayId> {
        self.resolve_address(function_name).map(GatewayId::derive)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FunctionAddress)> {
        self.addresses.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Builds and caches the address book for one deployment.
pub struct IdentityResolver {
    outputs: Arc<dyn StackOutputs>,
    deployment: Deployment,
    book: OnceCell<Arc<AddressBook>>,
}

impl IdentityResolver {
    pub fn new(outputs: Arc<dyn StackOutputs>, deployment: Deployment) -> Self {
        Self {
            outputs,
            deployment,
            book: OnceCell::new(),
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Returns the address book, fetching stack outputs on first use only.
    pub async fn address_book(&self) -> Result<Arc<AddressBook>> {
        self.book
            .get_or_try_init(|| async { self.load().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Discards the cached address book and fetches it again.
    pub async fn refresh(&mut self) -> Result<Arc<AddressBook>> {
        self.book = OnceCell::new();
        self.address_book().await
    }

    /// Resolves one function address through the cached address book.
    pub async fn resolve_address(&self, function_name: &str) -> Result<FunctionAddress> {
        let book = self.address_book().await?;
        book.resolve_address(function_name).cloned()
    }

    async fn load(&self) -> Result<AddressBook> {
        let outputs = self.outputs.outputs(&self.deployment).await?;
        let book = AddressBook::from_outputs(&outputs);
        tracing::debug!(
            stack = %self.deployment.stack_name(),
            region = %self.deployment.region,
            functions = book.len(),
            "Resolved function addresses"
        );
        Ok(book)
    }
}
