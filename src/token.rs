//! # Token Exchange
//!
//! Executes the grant from a Credential Offer against the authorization
//! server: either the pre-authorized-code grant (optionally gated on a
//! user-entered PIN relayed over the PIN relay) or the
//! authorization-code grant with PKCE used by the EBSI profile, where
//! the wallet authenticates itself with a self-issued id_token signed by
//! its own DID key.
//!
//! No HTTP call in this module follows redirects: 3xx responses surface
//! their `Location` target, which several steps parse directly (the
//! id_token request and the authorization code both arrive as redirect
//! targets).

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::jose::{self, JwtType};
use crate::pin::PinRelay;
use crate::pkce;
use crate::provider::{HttpClient, HttpResponse, Provider, RequestBody};
use crate::types::{AuthorizationServerMetadata, CredentialOffer, TokenResponse};

const PRE_AUTHORIZED_GRANT: &str = "urn:ietf:params:oauth:grant-type:pre-authorized_code";

/// The wallet's fixed redirect URI for self-issued flows.
const SELF_ISSUED_REDIRECT: &str = "openid://";

/// Runs grants against an authorization server.
pub struct TokenExchange<'a, P: Provider> {
    provider: &'a P,
    relay: &'a PinRelay,
    pin_timeout: Duration,
}

impl<'a, P: Provider> TokenExchange<'a, P> {
    /// Create an exchange engine bound to a provider and PIN relay.
    #[must_use]
    pub const fn new(provider: &'a P, relay: &'a PinRelay, pin_timeout: Duration) -> Self {
        Self { provider, relay, pin_timeout }
    }

    /// Execute the offer's grant and return the token response.
    /// `prefer_authorization_code` selects the authorization-code grant
    /// when the offer carries both (the EBSI profile does).
    ///
    /// # Errors
    ///
    /// `Error::InvalidPin` when the server rejects the PIN,
    /// `Error::PinTimeout` when no PIN arrives, and
    /// `Error::FailedCommunication` for other upstream failures.
    #[tracing::instrument(level = "debug", skip(self, offer, server))]
    pub async fn exchange(
        &self, user_id: &str, did: &str, process_id: &str, offer: &CredentialOffer,
        server: &AuthorizationServerMetadata, prefer_authorization_code: bool,
    ) -> Result<TokenResponse, Error> {
        let use_pre_authorized = offer.pre_authorized_grant().is_some()
            && !(prefer_authorization_code && offer.authorization_code_grant().is_some());

        if use_pre_authorized
            && let Some(grant) = offer.pre_authorized_grant()
        {
            let pin = if grant.user_pin_required {
                self.relay.send_pin_request(user_id, process_id).await?;
                Some(self.relay.await_pin(user_id, process_id, self.pin_timeout).await?)
            } else {
                None
            };
            return self
                .pre_authorized(&server.token_endpoint, &grant.pre_authorized_code, pin)
                .await;
        }

        // EBSI profile: authorization code + PKCE, wallet self-issues
        // its identity
        let issuer_state =
            offer.authorization_code_grant().and_then(|g| g.issuer_state.clone());
        self.authorization_code(did, offer, server, issuer_state).await
    }

    /// POST the pre-authorized code (and PIN when required) to the token
    /// endpoint.
    async fn pre_authorized(
        &self, token_endpoint: &str, code: &str, pin: Option<String>,
    ) -> Result<TokenResponse, Error> {
        let pin_sent = pin.is_some();
        let mut form = vec![
            ("grant_type".to_string(), PRE_AUTHORIZED_GRANT.to_string()),
            ("pre-authorized_code".to_string(), code.to_string()),
        ];
        if let Some(pin) = pin {
            form.push(("user_pin".to_string(), pin));
        }

        let response = self
            .provider
            .post(token_endpoint, &[], RequestBody::Form(form))
            .await
            .map_err(|e| Error::FailedCommunication(format!("token endpoint: {e}")))?;

        if response.status.is_client_error() && pin_sent {
            return Err(Error::InvalidPin(format!(
                "authorization server rejected the PIN: {}",
                response.status
            )));
        }
        parse_token_response(&response)
    }

    /// The EBSI authorization-code dance: authorization request, signed
    /// id_token response, code extraction, token request with the PKCE
    /// verifier.
    async fn authorization_code(
        &self, did: &str, offer: &CredentialOffer, server: &AuthorizationServerMetadata,
        issuer_state: Option<String>,
    ) -> Result<TokenResponse, Error> {
        let Some(authorization_endpoint) = &server.authorization_endpoint else {
            return Err(Error::FailedDeserializing(
                "authorization server metadata has no authorization_endpoint".to_string(),
            ));
        };

        let code_verifier = pkce::code_verifier();
        let code_challenge = pkce::code_challenge(&code_verifier);
        let state = Uuid::new_v4().to_string();

        // authorization request; the id_token request comes back as a
        // redirect target
        let authorization_details = serde_json::to_string(
            &offer
                .credentials
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "type": "openid_credential",
                        "format": c.format,
                        "types": c.types,
                        "locations": [offer.credential_issuer],
                    })
                })
                .collect::<Vec<_>>(),
        )
        .map_err(|e| Error::FailedSerializing(format!("authorization_details: {e}")))?;

        let mut request_url = Url::parse(authorization_endpoint)
            .map_err(|e| Error::Parse(format!("authorization endpoint: {e}")))?;
        {
            let mut query = request_url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("scope", "openid")
                .append_pair("client_id", did)
                .append_pair("redirect_uri", SELF_ISSUED_REDIRECT)
                .append_pair("state", &state)
                .append_pair("code_challenge", &code_challenge)
                .append_pair("code_challenge_method", "S256")
                .append_pair("authorization_details", &authorization_details);
            if let Some(issuer_state) = &issuer_state {
                query.append_pair("issuer_state", issuer_state);
            }
        }

        let response = self
            .provider
            .get(request_url.as_str(), &[])
            .await
            .map_err(|e| Error::FailedCommunication(format!("authorization endpoint: {e}")))?;
        let Some(location) = redirect_target(&response) else {
            return Err(Error::FailedCommunication(format!(
                "authorization endpoint did not redirect: {}",
                response.status
            )));
        };

        // the redirect target is the id_token request
        let id_token_request = IdTokenRequest::from_location(&location)?;
        let id_token = self.self_issued_id_token(did, server, &id_token_request).await?;

        let form = vec![
            ("id_token".to_string(), id_token),
            ("state".to_string(), id_token_request.state.unwrap_or(state)),
        ];
        let response = self
            .provider
            .post(&id_token_request.redirect_uri, &[], RequestBody::Form(form))
            .await
            .map_err(|e| Error::FailedCommunication(format!("direct_post: {e}")))?;
        let Some(callback) = redirect_target(&response) else {
            return Err(Error::FailedCommunication(format!(
                "direct_post did not redirect: {}",
                response.status
            )));
        };

        let code = query_param(&callback, "code").ok_or_else(|| {
            Error::FailedDeserializing("callback carries no authorization code".to_string())
        })?;

        // exchange the code, proving possession of the verifier
        let form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("client_id".to_string(), did.to_string()),
            ("code".to_string(), code),
            ("code_verifier".to_string(), code_verifier),
            ("redirect_uri".to_string(), SELF_ISSUED_REDIRECT.to_string()),
        ];
        let response = self
            .provider
            .post(&server.token_endpoint, &[], RequestBody::Form(form))
            .await
            .map_err(|e| Error::FailedCommunication(format!("token endpoint: {e}")))?;
        parse_token_response(&response)
    }

    /// Sign the self-issued id_token the wallet answers the
    /// authorization server with.
    async fn self_issued_id_token(
        &self, did: &str, server: &AuthorizationServerMetadata, request: &IdTokenRequest,
    ) -> Result<String, Error> {
        #[derive(Serialize)]
        struct IdTokenClaims<'c> {
            iss: &'c str,
            sub: &'c str,
            aud: &'c str,
            iat: i64,
            exp: i64,
            #[serde(skip_serializing_if = "Option::is_none")]
            nonce: Option<&'c str>,
        }

        let now = Utc::now().timestamp();
        let audience = server.issuer.as_deref().unwrap_or(&server.token_endpoint);
        let claims = IdTokenClaims {
            iss: did,
            sub: did,
            aud: audience,
            iat: now,
            exp: now + 300,
            nonce: request.nonce.as_deref(),
        };

        jose::sign_claims(self.provider, did, JwtType::Jwt, &claims).await
    }
}

/// The id_token request the authorization server redirects the wallet
/// to, parsed from the `Location` target.
struct IdTokenRequest {
    redirect_uri: String,
    nonce: Option<String>,
    state: Option<String>,
}

impl IdTokenRequest {
    fn from_location(location: &str) -> Result<Self, Error> {
        let redirect_uri = query_param(location, "redirect_uri").ok_or_else(|| {
            Error::FailedDeserializing("id_token request carries no redirect_uri".to_string())
        })?;
        Ok(Self {
            redirect_uri,
            nonce: query_param(location, "nonce"),
            state: query_param(location, "state"),
        })
    }
}

/// The `Location` of a 3xx response, if any.
fn redirect_target(response: &HttpResponse) -> Option<String> {
    response.status.is_redirection().then(|| response.location.clone()).flatten()
}

/// A single query parameter of a URI. Parses the raw query string so
/// non-registered schemes (`openid://`, deep links) work too.
#[must_use]
pub(crate) fn query_param(uri: &str, name: &str) -> Option<String> {
    let query = uri.splitn(2, '?').nth(1)?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse, Error> {
    if !response.status.is_success() {
        return Err(Error::FailedCommunication(format!(
            "token endpoint returned {}",
            response.status
        )));
    }
    response
        .json::<TokenResponse>()
        .map_err(|e| Error::FailedDeserializing(format!("token response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_extraction() {
        let uri = "openid://?state=abc&nonce=n-1&redirect_uri=https%3A%2F%2Fauth.example%2Fdirect_post";
        assert_eq!(query_param(uri, "state").as_deref(), Some("abc"));
        assert_eq!(
            query_param(uri, "redirect_uri").as_deref(),
            Some("https://auth.example/direct_post")
        );
        assert_eq!(query_param(uri, "missing"), None);
    }

    #[test]
    fn id_token_request_requires_redirect_uri() {
        assert!(IdTokenRequest::from_location("openid://?state=abc").is_err());
        let parsed =
            IdTokenRequest::from_location("openid://?redirect_uri=https%3A%2F%2Fa%2Fb&nonce=n")
                .expect("should parse");
        assert_eq!(parsed.redirect_uri, "https://a/b");
        assert_eq!(parsed.nonce.as_deref(), Some("n"));
    }
}
