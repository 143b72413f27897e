//! # Presentation Workflow
//!
//! Answers an OID4VP authorization request: dereferences the request
//! object, checks the requesting issuer against the trusted list, lets
//! the caller pick matching stored credentials, assembles and signs a
//! Verifiable Presentation with its `presentation_submission`, and
//! submits it via `direct_post`.
//!
//! The turnstile variant skips the HTTP submission and returns the
//! signed presentation CBOR-encoded for a local physical-access reader,
//! addressed to a fixed application identifier instead of a verifier
//! URL.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::did;
use crate::error::Error;
use crate::jose::{self, DocumentType, SignOptions};
use crate::provider::{CredentialStore, HttpClient, Provider, RequestBody, SecretStore};
use crate::token::query_param;
use crate::types::{
    CredentialsBasicInfo, DescriptorMap, PresentationSubmission, VerifiablePresentation,
};

const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// The selectable credential set handed back to the caller after a
/// presentation request was parsed and authorized. Echo `state`,
/// `nonce` and `response_uri` back in the [`VcSelectorResponse`]; the
/// flow keeps no server-side state between the two calls.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VcSelectorRequest {
    /// The verifier that signed the authorization request.
    pub relying_party: String,

    /// Requested scope entries (minus `openid`).
    pub scope: Vec<String>,

    /// Opaque verifier state, echoed on submission.
    pub state: String,

    /// Nonce binding the presentation to this request.
    pub nonce: String,

    /// Where the signed presentation must be posted.
    pub response_uri: String,

    /// Stored credentials satisfying the request.
    pub selectable: Vec<CredentialsBasicInfo>,
}

/// The caller's confirmed selection.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VcSelectorResponse {
    /// Echoed verifier state.
    pub state: String,

    /// Echoed nonce.
    pub nonce: String,

    /// Echoed submission target.
    pub response_uri: String,

    /// The credentials to present, in submission order.
    pub selected: Vec<CredentialsBasicInfo>,
}

/// Claims of a decoded authorization request object.
#[derive(Debug, Deserialize)]
struct RequestObjectClaims {
    iss: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    response_uri: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Executes presentation flows.
pub struct PresentationFlow<'a, P: Provider> {
    provider: &'a P,
    trusted_issuers: &'a [String],
    turnstile_audience: &'a str,
}

impl<'a, P: Provider> PresentationFlow<'a, P> {
    /// Bind a flow runner to a provider and trust configuration.
    #[must_use]
    pub const fn new(
        provider: &'a P, trusted_issuers: &'a [String], turnstile_audience: &'a str,
    ) -> Self {
        Self { provider, trusted_issuers, turnstile_audience }
    }

    /// Dereference and authorize the scanned authorization request,
    /// returning the selectable credential set.
    ///
    /// # Errors
    ///
    /// `Error::IssuerNotAuthorized` when the request issuer is not
    /// trusted, `Error::NoSuchVerifiableCredential` when nothing in the
    /// store satisfies the request.
    #[tracing::instrument(level = "debug", skip(self, content))]
    pub async fn process_request(
        &self, user_id: &str, content: &str,
    ) -> Result<VcSelectorRequest, Error> {
        let Some(request_uri) = query_param(content, "request_uri") else {
            return Err(Error::Parse("content carries no request_uri".to_string()));
        };

        let response = self
            .provider
            .get(&request_uri, &[])
            .await
            .map_err(|e| Error::FailedCommunication(format!("request object: {e}")))?;
        if !response.status.is_success() {
            return Err(Error::FailedCommunication(format!(
                "request object endpoint returned {}",
                response.status
            )));
        }

        let token = response.body.trim();
        let (_, claims): (_, RequestObjectClaims) = jose::jws::decode(token)?;

        if !self.trusted_issuers.iter().any(|trusted| trusted == &claims.iss) {
            return Err(Error::IssuerNotAuthorized(format!(
                "request issuer {} is not trusted",
                claims.iss
            )));
        }

        let response_uri = claims
            .response_uri
            .or(claims.redirect_uri)
            .ok_or_else(|| {
                Error::FailedDeserializing("request object names no response_uri".to_string())
            })?;

        let scope: Vec<String> = claims
            .scope
            .unwrap_or_default()
            .split_whitespace()
            .filter(|s| *s != "openid")
            .map(ToString::to_string)
            .collect();

        // match stored credentials against the requested scope; an empty
        // scope asks for any verifiable credential
        let mut selectable = Vec::new();
        if scope.is_empty() {
            selectable = self
                .provider
                .credentials_by_type(user_id, "VerifiableCredential")
                .await
                .map_err(|e| Error::FailedDeserializing(format!("credential query: {e}")))?;
        } else {
            for entry in &scope {
                let mut matching = self
                    .provider
                    .credentials_by_type(user_id, entry)
                    .await
                    .map_err(|e| Error::FailedDeserializing(format!("credential query: {e}")))?;
                selectable.append(&mut matching);
            }
            // a credential matching several scope entries appears once
            let mut seen = HashSet::new();
            selectable.retain(|vc| seen.insert(vc.id.clone()));
        }
        if selectable.is_empty() {
            return Err(Error::NoSuchVerifiableCredential(format!(
                "no stored credential matches scope {scope:?}"
            )));
        }

        Ok(VcSelectorRequest {
            relying_party: claims.iss,
            scope,
            state: claims.state.unwrap_or_default(),
            nonce: claims.nonce.unwrap_or_default(),
            response_uri,
            selectable,
        })
    }

    /// Assemble, sign and submit the presentation for a confirmed
    /// selection.
    ///
    /// # Errors
    ///
    /// `Error::NoSuchVerifiableCredential` for an empty selection,
    /// `Error::FailedCommunication` when the verifier rejects the
    /// submission.
    #[tracing::instrument(level = "debug", skip(self, selection))]
    pub async fn present(&self, user_id: &str, selection: &VcSelectorResponse) -> Result<(), Error> {
        let (vp_token, submission) = self
            .signed_presentation(&selection.selected, &selection.response_uri, &selection.nonce)
            .await?;

        let submission_json = serde_json::to_string(&submission)
            .map_err(|e| Error::FailedSerializing(format!("presentation submission: {e}")))?;
        let form = vec![
            ("vp_token".to_string(), vp_token),
            ("presentation_submission".to_string(), submission_json),
            ("state".to_string(), selection.state.clone()),
        ];

        let response = self
            .provider
            .post(&selection.response_uri, &[], RequestBody::Form(form))
            .await
            .map_err(|e| Error::FailedCommunication(format!("submitting presentation: {e}")))?;
        if !(response.status.is_success() || response.status.is_redirection()) {
            return Err(Error::FailedCommunication(format!(
                "verifier returned {}",
                response.status
            )));
        }

        tracing::debug!("presentation submitted for user {user_id}");
        Ok(())
    }

    /// The turnstile variant: no HTTP submission; the signed
    /// presentation is CBOR-encoded for a local physical-access reader.
    ///
    /// # Errors
    ///
    /// As [`Self::present`], minus the submission failures.
    #[tracing::instrument(level = "debug", skip(self, selection))]
    pub async fn present_turnstile(
        &self, user_id: &str, selection: &VcSelectorResponse,
    ) -> Result<Vec<u8>, Error> {
        let (vp_token, _) = self
            .signed_presentation(&selection.selected, self.turnstile_audience, &selection.nonce)
            .await?;

        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&vp_token, &mut encoded)
            .map_err(|e| Error::FailedSerializing(format!("CBOR presentation: {e}")))?;

        tracing::debug!("turnstile presentation prepared for user {user_id}");
        Ok(encoded)
    }

    /// Build and sign the VP and its submission descriptor. The signing
    /// DID is generated for this presentation and persisted alongside
    /// issuance keys.
    async fn signed_presentation(
        &self, selected: &[CredentialsBasicInfo], audience: &str, nonce: &str,
    ) -> Result<(String, PresentationSubmission), Error> {
        if selected.is_empty() {
            return Err(Error::NoSuchVerifiableCredential(
                "selection is empty".to_string(),
            ));
        }

        let material = did::generate()?;
        self.provider
            .save_secret(&material.did, &material.private_key)
            .await
            .map_err(|e| Error::Signing(format!("saving key for {}: {e}", material.did)))?;

        let presentation = VerifiablePresentation {
            context: vec![Value::String(CREDENTIALS_CONTEXT.to_string())],
            id: Some(format!("urn:uuid:{}", Uuid::new_v4())),
            type_: vec!["VerifiablePresentation".to_string()],
            holder: Some(material.did.clone()),
            verifiable_credential: selected.iter().map(|vc| vc.credential.clone()).collect(),
        };

        let descriptor_map = selected
            .iter()
            .enumerate()
            .map(|(n, vc)| DescriptorMap {
                id: vc.id.clone(),
                format: vc.format.clone(),
                path: format!("$.verifiableCredential[{n}]"),
            })
            .collect();
        let submission = PresentationSubmission {
            id: Uuid::new_v4().to_string(),
            definition_id: "holder-presentation".to_string(),
            descriptor_map,
        };

        let document = serde_json::to_value(&presentation)
            .map_err(|e| Error::FailedSerializing(format!("presentation: {e}")))?;
        let options = SignOptions {
            audience: Some(audience.to_string()),
            nonce: Some(nonce.to_string()),
        };
        let vp_token =
            jose::sign_document(self.provider, &material.did, &document, DocumentType::Vp, options)
                .await?;

        Ok((vp_token, submission))
    }
}
