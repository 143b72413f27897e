//! # Credential Fetcher
//!
//! Calls the issuer's credential endpoint and handles the immediate and
//! deferred outcomes. A `202` answer parks the transaction in the
//! credential store; nothing polls in the background — resolution only
//! happens when [`resolve_deferred`] is explicitly invoked.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;
use crate::proof::Proof;
use crate::provider::{CredentialStore, HttpClient, Provider, RequestBody};
use crate::types::{CredentialIssuerMetadata, DeferredCredentialMetadata, TokenResponse};

/// The outcome of a credential request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialResult {
    /// The issuer answered immediately.
    Issued {
        /// The issued credential (typically a compact JWT string).
        credential: Value,
    },

    /// The issuer deferred issuance; metadata has been persisted under
    /// `credential_id` for a later [`resolve_deferred`] call.
    Pending {
        /// The wallet-side id of the pending record.
        credential_id: String,

        /// The issuer's transaction id.
        transaction_id: String,
    },
}

#[derive(Debug, Serialize)]
struct CredentialRequest<'r> {
    format: &'r str,
    types: &'r [String],
    proof: &'r Proof,
}

#[derive(Debug, Deserialize)]
struct CredentialResponseBody {
    #[serde(default)]
    credential: Option<Value>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    acceptance_token: Option<String>,
}

/// POST a credential request to the issuer's credential endpoint.
///
/// # Errors
///
/// `Error::FailedCommunication` for upstream failure,
/// `Error::FailedDeserializing` for malformed responses.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn fetch(
    provider: &impl Provider, proof: &Proof, token: &TokenResponse,
    issuer: &CredentialIssuerMetadata, format: &str, types: &[String],
) -> Result<CredentialResult, Error> {
    let request = CredentialRequest { format, types, proof };
    let body = serde_json::to_value(&request)
        .map_err(|e| Error::FailedSerializing(format!("credential request: {e}")))?;
    let headers = vec![(
        "Authorization".to_string(),
        format!("Bearer {}", token.access_token),
    )];

    let response = provider
        .post(&issuer.credential_endpoint, &headers, RequestBody::Json(body))
        .await
        .map_err(|e| Error::FailedCommunication(format!("credential endpoint: {e}")))?;

    match response.status.as_u16() {
        200 => {
            let body: CredentialResponseBody = response
                .json()
                .map_err(|e| Error::FailedDeserializing(format!("credential response: {e}")))?;
            let credential = body.credential.ok_or_else(|| {
                Error::FailedDeserializing("response carries no credential".to_string())
            })?;
            Ok(CredentialResult::Issued { credential })
        }
        202 => {
            let body: CredentialResponseBody = response
                .json()
                .map_err(|e| Error::FailedDeserializing(format!("deferred response: {e}")))?;
            let transaction_id = body.transaction_id.ok_or_else(|| {
                Error::FailedDeserializing("deferred response carries no transaction_id".to_string())
            })?;
            let deferred_endpoint =
                issuer.deferred_credential_endpoint.clone().ok_or_else(|| {
                    Error::FailedDeserializing(
                        "issuer deferred but advertises no deferred endpoint".to_string(),
                    )
                })?;

            // the acceptance token, when present, replaces the access
            // token for the deferred exchange
            let access_token =
                body.acceptance_token.unwrap_or_else(|| token.access_token.clone());

            let credential_id = Uuid::new_v4().to_string();
            let metadata = DeferredCredentialMetadata {
                credential_id: credential_id.clone(),
                transaction_id: transaction_id.clone(),
                access_token,
                deferred_endpoint,
            };
            provider
                .save_deferred(metadata)
                .await
                .map_err(|e| Error::FailedSerializing(format!("saving deferred state: {e}")))?;

            tracing::debug!("issuance deferred, transaction {transaction_id}");
            Ok(CredentialResult::Pending { credential_id, transaction_id })
        }
        _ => Err(Error::FailedCommunication(format!(
            "credential endpoint returned {}",
            response.status
        ))),
    }
}

/// Re-issue a parked credential request against the stored deferred
/// endpoint. Deletes the record once the credential arrives; leaves it
/// intact while the issuer still reports pending.
///
/// # Errors
///
/// `Error::NoSuchVerifiableCredential` when no deferred record exists
/// for the id, `Error::CredentialNotAvailable` while the issuer is
/// still pending.
#[tracing::instrument(level = "debug", skip(provider))]
pub async fn resolve_deferred(
    provider: &impl Provider, credential_id: &str,
) -> Result<Value, Error> {
    let metadata = provider
        .deferred(credential_id)
        .await
        .map_err(|e| Error::FailedDeserializing(format!("deferred state: {e}")))?
        .ok_or_else(|| {
            Error::NoSuchVerifiableCredential(format!(
                "no deferred transaction for credential {credential_id}"
            ))
        })?;

    let headers = vec![(
        "Authorization".to_string(),
        format!("Bearer {}", metadata.access_token),
    )];
    let body = serde_json::json!({ "transaction_id": metadata.transaction_id });

    let response = provider
        .post(&metadata.deferred_endpoint, &headers, RequestBody::Json(body))
        .await
        .map_err(|e| Error::FailedCommunication(format!("deferred endpoint: {e}")))?;

    match response.status.as_u16() {
        200 => {
            let parsed: CredentialResponseBody = response
                .json()
                .map_err(|e| Error::FailedDeserializing(format!("deferred response: {e}")))?;
            if let Some(credential) = parsed.credential {
                provider.delete_deferred(credential_id).await.map_err(|e| {
                    Error::FailedSerializing(format!("deleting deferred state: {e}"))
                })?;
                return Ok(credential);
            }
            // a 200 without a credential still counts as pending
            Err(Error::CredentialNotAvailable(format!(
                "transaction {} still pending",
                metadata.transaction_id
            )))
        }
        202 => Err(Error::CredentialNotAvailable(format!(
            "transaction {} still pending",
            metadata.transaction_id
        ))),
        _ => Err(Error::FailedCommunication(format!(
            "deferred endpoint returned {}",
            response.status
        ))),
    }
}
