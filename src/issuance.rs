//! # Issuance Workflow
//!
//! Drives a scanned credential offer through the OID4VCI state machine:
//! offer resolution, metadata discovery, token exchange, proof of
//! possession, credential fetch, and storage. The EBSI-conformance and
//! DOME-profile variants reuse the same steps with profile-specific
//! grant selection.
//!
//! A fresh did:key is generated for every flow; its private key lives
//! only in the secret store, keyed by the DID.

use std::time::Duration;

use uuid::Uuid;

use crate::credential::{self, CredentialResult};
use crate::did;
use crate::error::Error;
use crate::pin::PinRelay;
use crate::proof;
use crate::provider::{CredentialStore, HttpClient, Provider, SecretStore};
use crate::token::{TokenExchange, query_param};
use crate::types::{AuthorizationServerMetadata, CredentialIssuerMetadata, CredentialOffer};

/// The issuance profile a flow runs under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    /// Plain OID4VCI.
    #[default]
    Standard,

    /// EBSI conformance: authorization-code grant with PKCE and a
    /// self-issued id_token.
    Ebsi,

    /// DOME marketplace: pre-authorized issuance with DOME's fixed
    /// `jwt_vc_json` format.
    Dome,
}

/// The terminal state of a completed flow, one entry per offered
/// credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// The credential was issued and persisted.
    Stored {
        /// Credential store record id.
        credential_id: String,
    },

    /// Issuance was deferred; resolve later via the deferred endpoint.
    Pending {
        /// The wallet-side id of the pending record.
        credential_id: String,

        /// The issuer's transaction id.
        transaction_id: String,
    },
}

/// Executes issuance flows for one wallet user at a time.
pub struct IssuanceFlow<'a, P: Provider> {
    provider: &'a P,
    relay: &'a PinRelay,
    pin_timeout: Duration,
}

impl<'a, P: Provider> IssuanceFlow<'a, P> {
    /// Bind a flow runner to a provider and PIN relay.
    #[must_use]
    pub const fn new(provider: &'a P, relay: &'a PinRelay, pin_timeout: Duration) -> Self {
        Self { provider, relay, pin_timeout }
    }

    /// Run the full state machine for scanned offer content.
    ///
    /// # Errors
    ///
    /// Propagates the typed errors of each step: parsing, upstream
    /// communication, PIN handling, signing, and storage.
    #[tracing::instrument(level = "debug", skip(self, content))]
    pub async fn execute(
        &self, user_id: &str, content: &str, profile: Profile,
    ) -> Result<Vec<IssuanceOutcome>, Error> {
        // OfferReceived
        let offer = self.resolve_offer(content).await?;
        if offer.credentials.is_empty() {
            return Err(Error::Parse("offer carries no credential descriptors".to_string()));
        }

        // MetadataResolved
        let (issuer_meta, server_meta) = self.resolve_metadata(&offer.credential_issuer).await?;

        // a fresh identity per flow
        let material = did::generate()?;
        self.provider
            .save_secret(&material.did, &material.private_key)
            .await
            .map_err(|e| Error::Signing(format!("saving key for {}: {e}", material.did)))?;

        // TokenAcquired
        let process_id = Uuid::new_v4().to_string();
        let exchange = TokenExchange::new(self.provider, self.relay, self.pin_timeout);
        let token = exchange
            .exchange(
                user_id,
                &material.did,
                &process_id,
                &offer,
                &server_meta,
                profile == Profile::Ebsi,
            )
            .await?;

        let mut outcomes = Vec::with_capacity(offer.credentials.len());
        for offered in &offer.credentials {
            // ProofBuilt: one proof per credential request, never reused
            let proof = proof::build_proof(
                self.provider,
                token.c_nonce.as_deref(),
                &offer.credential_issuer,
                &material.did,
            )
            .await?;

            // CredentialFetched
            let format = match profile {
                Profile::Dome => "jwt_vc_json",
                Profile::Standard | Profile::Ebsi => offered.format.as_str(),
            };
            let result = credential::fetch(
                self.provider,
                &proof,
                &token,
                &issuer_meta,
                format,
                &offered.types,
            )
            .await?;

            // Stored
            let outcome = match result {
                CredentialResult::Issued { credential } => {
                    let credential_id = self
                        .provider
                        .save_credential(user_id, credential, format)
                        .await
                        .map_err(|e| {
                            Error::FailedSerializing(format!("saving credential: {e}"))
                        })?;
                    IssuanceOutcome::Stored { credential_id }
                }
                CredentialResult::Pending { credential_id, transaction_id } => {
                    IssuanceOutcome::Pending { credential_id, transaction_id }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Resolve the offer from scanned content: inline
    /// (`credential_offer`) or dereferenced (`credential_offer_uri`).
    async fn resolve_offer(&self, content: &str) -> Result<CredentialOffer, Error> {
        if let Some(inline) = query_param(content, "credential_offer") {
            return serde_json::from_str(&inline)
                .map_err(|e| Error::FailedDeserializing(format!("inline offer: {e}")));
        }

        let Some(uri) = query_param(content, "credential_offer_uri") else {
            return Err(Error::Parse("content carries no credential offer".to_string()));
        };
        let response = self
            .provider
            .get(&uri, &[])
            .await
            .map_err(|e| Error::FailedCommunication(format!("dereferencing offer: {e}")))?;
        if !response.status.is_success() {
            return Err(Error::FailedCommunication(format!(
                "offer endpoint returned {}",
                response.status
            )));
        }
        response
            .json()
            .map_err(|e| Error::FailedDeserializing(format!("credential offer: {e}")))
    }

    /// Discovery: issuer metadata, then the authorization server it
    /// names (falling back to the issuer's own configuration).
    async fn resolve_metadata(
        &self, issuer: &str,
    ) -> Result<(CredentialIssuerMetadata, AuthorizationServerMetadata), Error> {
        let issuer_uri = format!("{issuer}/.well-known/openid-credential-issuer");
        let response = self
            .provider
            .get(&issuer_uri, &[])
            .await
            .map_err(|e| Error::FailedCommunication(format!("issuer metadata: {e}")))?;
        if !response.status.is_success() {
            return Err(Error::FailedCommunication(format!(
                "issuer metadata endpoint returned {}",
                response.status
            )));
        }
        let issuer_meta: CredentialIssuerMetadata = response
            .json()
            .map_err(|e| Error::FailedDeserializing(format!("issuer metadata: {e}")))?;

        let server = issuer_meta.authorization_server.as_deref().unwrap_or(issuer);
        let server_uri = format!("{server}/.well-known/openid-configuration");
        let response = self
            .provider
            .get(&server_uri, &[])
            .await
            .map_err(|e| Error::FailedCommunication(format!("server metadata: {e}")))?;
        if !response.status.is_success() {
            return Err(Error::FailedCommunication(format!(
                "server metadata endpoint returned {}",
                response.status
            )));
        }
        let server_meta: AuthorizationServerMetadata = response
            .json()
            .map_err(|e| Error::FailedDeserializing(format!("server metadata: {e}")))?;

        Ok((issuer_meta, server_meta))
    }
}
