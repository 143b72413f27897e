//! # Wallet Provider
//!
//! Capability traits injected into the wallet engine: credential
//! storage, private-key storage, and HTTP fetch. Implementations are
//! supplied by the embedding application (context-broker, vault, and
//! HTTP adapters respectively); the engine only depends on the traits.

use std::future::Future;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::jose::Jwk;
use crate::types::{CredentialsBasicInfo, DeferredCredentialMetadata};

/// Wallet provider: the full capability bundle the workflows require.
pub trait Provider: CredentialStore + SecretStore + HttpClient + Clone {}

/// Storage of credential records and deferred-transaction metadata.
pub trait CredentialStore: Send + Sync {
    /// Persist a credential for a user, returning the record id.
    fn save_credential(
        &self, user_id: &str, credential: Value, format: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Credentials stored for the user that carry the given type.
    fn credentials_by_type(
        &self, user_id: &str, credential_type: &str,
    ) -> impl Future<Output = Result<Vec<CredentialsBasicInfo>>> + Send;

    /// Delete a stored credential.
    fn delete_credential(
        &self, user_id: &str, credential_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Persist deferred-transaction metadata. Exactly one record exists
    /// per pending credential id.
    fn save_deferred(
        &self, metadata: DeferredCredentialMetadata,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Retrieve deferred-transaction metadata by credential id.
    fn deferred(
        &self, credential_id: &str,
    ) -> impl Future<Output = Result<Option<DeferredCredentialMetadata>>> + Send;

    /// Delete deferred-transaction metadata once resolved or abandoned.
    fn delete_deferred(
        &self, credential_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Storage of private keys, keyed by DID.
pub trait SecretStore: Send + Sync {
    /// Persist the private key for a DID.
    fn save_secret(&self, did: &str, key: &Jwk) -> impl Future<Output = Result<()>> + Send;

    /// Retrieve the private key for a DID.
    fn secret(&self, did: &str) -> impl Future<Output = Result<Option<Jwk>>> + Send;

    /// Delete the private key for a DID.
    fn delete_secret(&self, did: &str) -> impl Future<Output = Result<()>> + Send;
}

/// HTTP fetch primitive. Implementations must never follow redirects:
/// several protocol steps inspect the redirect target (e.g. extract an
/// authorization code from a callback URL) instead of fetching it.
pub trait HttpClient: Send + Sync {
    /// Issue a GET request.
    fn get(
        &self, url: &str, headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse>> + Send;

    /// Issue a POST request.
    fn post(
        &self, url: &str, headers: &[(String, String)], body: RequestBody,
    ) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// A request body for [`HttpClient::post`].
#[derive(Clone, Debug)]
pub enum RequestBody {
    /// No body.
    Empty,

    /// `application/json`.
    Json(Value),

    /// `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

/// The outcome of an HTTP call. On a 3xx response the `Location` header
/// is surfaced instead of being followed.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// Response status.
    pub status: http::StatusCode,

    /// Response body, possibly empty.
    pub body: String,

    /// `Location` header of a 3xx response.
    pub location: Option<String>,
}

impl HttpResponse {
    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error when the body does not
    /// match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
