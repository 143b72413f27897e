//! Discovery document types. Fetched per flow, never cached across
//! flows (issuers may change endpoints between offers).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Credential Issuer metadata, from
/// `<issuer>/.well-known/openid-credential-issuer`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialIssuerMetadata {
    /// The Credential Issuer's identifier.
    pub credential_issuer: String,

    /// URL of the credential endpoint.
    pub credential_endpoint: String,

    /// URL of the deferred credential endpoint, when supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deferred_credential_endpoint: Option<String>,

    /// The authorization server handling this issuer's grants. When
    /// absent, the issuer acts as its own authorization server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,

    /// Supported credential configurations, kept opaque: the wallet
    /// only matches formats and type lists from the offer.
    #[serde(default)]
    pub credentials_supported: Vec<Value>,
}

/// Authorization server metadata, from the server's
/// `.well-known/openid-configuration`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationServerMetadata {
    /// The authorization server's identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// URL of the authorization endpoint. Absent for servers that only
    /// serve pre-authorized grants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// URL of the token endpoint.
    pub token_endpoint: String,

    /// Supported PKCE code challenge methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_challenge_methods_supported: Vec<String>,
}
