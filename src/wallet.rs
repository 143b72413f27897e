//! # Wallet Facade
//!
//! The single entry point an embedding application drives: scanned
//! content goes in, classified and dispatched to the issuance or
//! presentation workflow; stored credentials are listed, deleted, and
//! deferred issuances resolved through the same surface.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::{self, FlowType};
use crate::credential;
use crate::error::Error;
use crate::issuance::{IssuanceFlow, IssuanceOutcome, Profile};
use crate::pin::PinRelay;
use crate::presentation::{PresentationFlow, VcSelectorRequest, VcSelectorResponse};
use crate::provider::{CredentialStore, Provider};
use crate::types::CredentialsBasicInfo;

/// Wallet engine configuration, deserializable from whatever source the
/// embedding application loads it from.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Issuers whose presentation requests the wallet will answer.
    pub trusted_issuers: Vec<String>,

    /// How long a flow waits for a relayed PIN.
    pub pin_timeout_secs: u64,

    /// The audience claim of turnstile presentations.
    pub turnstile_audience: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            trusted_issuers: Vec::new(),
            pin_timeout_secs: 60,
            turnstile_audience: "physical-access-reader".to_string(),
        }
    }
}

/// What processing a piece of scanned content produced.
#[derive(Clone, Debug)]
pub enum ProcessedContent {
    /// An issuance flow ran to completion; one outcome per offered
    /// credential.
    Issuance(Vec<IssuanceOutcome>),

    /// A presentation request was authorized; the caller must confirm a
    /// selection and call [`Wallet::present`].
    SelectionRequired(VcSelectorRequest),
}

/// The wallet engine. One instance serves all users; per-user state
/// lives in the provider's stores and the PIN relay.
pub struct Wallet<P: Provider> {
    provider: P,
    config: WalletConfig,
    relay: PinRelay,
}

impl<P: Provider> Wallet<P> {
    /// Create a wallet over a provider.
    #[must_use]
    pub fn new(provider: P, config: WalletConfig) -> Self {
        Self { provider, config, relay: PinRelay::new() }
    }

    /// The PIN relay, for the embedding application's WebSocket layer to
    /// feed frames into.
    #[must_use]
    pub const fn pin_relay(&self) -> &PinRelay {
        &self.relay
    }

    /// Classify scanned content and run the workflow it belongs to.
    ///
    /// # Errors
    ///
    /// `Error::NoSuchQrContent` when the content matches no known shape;
    /// otherwise the dispatched workflow's errors.
    #[tracing::instrument(level = "debug", skip(self, content))]
    pub async fn process_content(
        &self, user_id: &str, content: &str,
    ) -> Result<ProcessedContent, Error> {
        let issuance = IssuanceFlow::new(&self.provider, &self.relay, self.pin_timeout());
        let presentation = PresentationFlow::new(
            &self.provider,
            &self.config.trusted_issuers,
            &self.config.turnstile_audience,
        );

        match classify::classify(content) {
            FlowType::Issuance => {
                let outcomes = issuance.execute(user_id, content, Profile::Standard).await?;
                Ok(ProcessedContent::Issuance(outcomes))
            }
            FlowType::IssuanceEbsi => {
                let outcomes = issuance.execute(user_id, content, Profile::Ebsi).await?;
                Ok(ProcessedContent::Issuance(outcomes))
            }
            FlowType::IssuanceDome => {
                let outcomes = issuance.execute(user_id, content, Profile::Dome).await?;
                Ok(ProcessedContent::Issuance(outcomes))
            }
            FlowType::Presentation | FlowType::PresentationEbsi => {
                let selector = presentation.process_request(user_id, content).await?;
                Ok(ProcessedContent::SelectionRequired(selector))
            }
            FlowType::Unknown => Err(Error::NoSuchQrContent(format!(
                "unrecognized content: {}",
                content.chars().take(64).collect::<String>()
            ))),
        }
    }

    /// Sign and submit the presentation for a confirmed selection.
    ///
    /// # Errors
    ///
    /// See [`PresentationFlow::present`].
    pub async fn present(&self, user_id: &str, selection: &VcSelectorResponse) -> Result<(), Error> {
        PresentationFlow::new(
            &self.provider,
            &self.config.trusted_issuers,
            &self.config.turnstile_audience,
        )
        .present(user_id, selection)
        .await
    }

    /// Sign the presentation for a confirmed selection and return it
    /// CBOR-encoded for a turnstile reader.
    ///
    /// # Errors
    ///
    /// See [`PresentationFlow::present_turnstile`].
    pub async fn present_turnstile(
        &self, user_id: &str, selection: &VcSelectorResponse,
    ) -> Result<Vec<u8>, Error> {
        PresentationFlow::new(
            &self.provider,
            &self.config.trusted_issuers,
            &self.config.turnstile_audience,
        )
        .present_turnstile(user_id, selection)
        .await
    }

    /// Resolve a deferred issuance and persist the credential it yields.
    ///
    /// # Errors
    ///
    /// See [`credential::resolve_deferred`]; additionally surfaces
    /// storage failures.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve_deferred(
        &self, user_id: &str, credential_id: &str,
    ) -> Result<Value, Error> {
        let credential = credential::resolve_deferred(&self.provider, credential_id).await?;
        self.provider
            .save_credential(user_id, credential.clone(), "jwt_vc_json")
            .await
            .map_err(|e| Error::FailedSerializing(format!("saving credential: {e}")))?;
        Ok(credential)
    }

    /// All credentials stored for a user.
    ///
    /// # Errors
    ///
    /// Surfaces credential-store failures.
    pub async fn credentials(&self, user_id: &str) -> Result<Vec<CredentialsBasicInfo>, Error> {
        self.provider
            .credentials_by_type(user_id, "VerifiableCredential")
            .await
            .map_err(|e| Error::FailedDeserializing(format!("credential query: {e}")))
    }

    /// Delete a stored credential.
    ///
    /// # Errors
    ///
    /// Surfaces credential-store failures.
    pub async fn delete_credential(&self, user_id: &str, credential_id: &str) -> Result<(), Error> {
        self.provider
            .delete_credential(user_id, credential_id)
            .await
            .map_err(|e| Error::FailedSerializing(format!("deleting credential: {e}")))
    }

    fn pin_timeout(&self) -> Duration {
        Duration::from_secs(self.config.pin_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = WalletConfig::default();
        assert_eq!(config.pin_timeout_secs, 60);
        assert!(config.trusted_issuers.is_empty());
    }

    #[test]
    fn config_deserializes_partially() {
        let config: WalletConfig =
            serde_json::from_str(r#"{"trusted_issuers": ["https://verifier.example"]}"#)
                .expect("should deserialize");
        assert_eq!(config.trusted_issuers, vec!["https://verifier.example".to_string()]);
        assert_eq!(config.pin_timeout_secs, 60);
    }
}
