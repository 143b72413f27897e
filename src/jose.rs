//! # JSON Object Signing and Encryption (JOSE)
//!
//! JWK and JWS support for the wallet, plus the DID-bound signer that
//! wraps credential and presentation documents into compact JWTs.

pub mod jwk;
pub mod jws;

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use self::jwk::Jwk;
pub use self::jws::JwsHeader;
use crate::error::Error;
use crate::provider::SecretStore;

/// The JWT `typ` header parameter.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum JwtType {
    /// General purpose JWT type.
    #[default]
    #[serde(rename = "jwt")]
    Jwt,

    /// JWT `typ` for the wallet's proof of possession of key material.
    #[serde(rename = "openid4vci-proof+jwt")]
    Openid4VciProofJwt,

    /// JWT `typ` for an Authorization Request Object.
    #[serde(rename = "oauth-authz-req+jwt")]
    OauthAuthzReqJwt,
}

impl Display for JwtType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jwt => write!(f, "jwt"),
            Self::Openid4VciProofJwt => write!(f, "openid4vci-proof+jwt"),
            Self::OauthAuthzReqJwt => write!(f, "oauth-authz-req+jwt"),
        }
    }
}

/// The claim a signed document is embedded under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentType {
    /// A Verifiable Credential, embedded under the `vc` claim.
    Vc,

    /// A Verifiable Presentation, embedded under the `vp` claim.
    Vp,
}

impl DocumentType {
    const fn claim(self) -> &'static str {
        match self {
            Self::Vc => "vc",
            Self::Vp => "vp",
        }
    }
}

/// Registered claims accompanying a signed document.
#[derive(Clone, Debug, Default)]
pub struct SignOptions {
    /// `aud` claim: the verifier's response URI, or a fixed application
    /// identifier for the turnstile variant.
    pub audience: Option<String>,

    /// `nonce` claim echoed from the authorization request.
    pub nonce: Option<String>,
}

/// The `kid` DID URL for a did:key identifier: the multikey fragment
/// doubles as the key id.
#[must_use]
pub fn key_id(did: &str) -> String {
    let fragment = did.strip_prefix("did:key:").unwrap_or(did);
    format!("{did}#{fragment}")
}

/// Sign an arbitrary claim set with the private key stored for `did`.
///
/// # Errors
///
/// Returns `Error::Signing` when no key is stored for the DID, and the
/// underlying JWS errors otherwise.
pub async fn sign_claims<T: Serialize>(
    store: &impl SecretStore, did: &str, typ: JwtType, claims: &T,
) -> Result<String, Error> {
    let key = store
        .secret(did)
        .await
        .map_err(|e| Error::Signing(format!("retrieving key for {did}: {e}")))?
        .ok_or_else(|| Error::Signing(format!("no key stored for {did}")))?;

    let header = JwsHeader::es256(typ.to_string(), key_id(did));
    jws::encode_sign(&header, claims, &key)
}

/// Wrap a JSON document into a signed compact JWT bound to a DID. The
/// document lands under the `vc` or `vp` claim per `document_type`;
/// `iss` and `sub` are the DID.
///
/// # Errors
///
/// Returns `Error::Signing` when the key is absent and
/// `Error::FailedSerializing` when the document cannot be serialized.
pub async fn sign_document(
    store: &impl SecretStore, did: &str, document: &Value, document_type: DocumentType,
    options: SignOptions,
) -> Result<String, Error> {
    let mut claims = serde_json::Map::new();
    claims.insert("iss".to_string(), Value::String(did.to_string()));
    claims.insert("sub".to_string(), Value::String(did.to_string()));
    claims.insert(
        "iat".to_string(),
        Value::from(chrono::Utc::now().timestamp()),
    );
    if let Some(audience) = options.audience {
        claims.insert("aud".to_string(), Value::String(audience));
    }
    if let Some(nonce) = options.nonce {
        claims.insert("nonce".to_string(), Value::String(nonce));
    }
    claims.insert(document_type.claim().to_string(), document.clone());

    sign_claims(store, did, JwtType::Jwt, &Value::Object(claims)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_uses_multikey_fragment() {
        let did = "did:key:zDnaerx9CtbPJ1q36T5Ln5wYt3MQYeGRG5ehnPAmxcf5mDZpv";
        assert_eq!(
            key_id(did),
            format!("{did}#zDnaerx9CtbPJ1q36T5Ln5wYt3MQYeGRG5ehnPAmxcf5mDZpv")
        );
    }

    #[test]
    fn typ_serializes_to_registered_names() {
        assert_eq!(JwtType::Openid4VciProofJwt.to_string(), "openid4vci-proof+jwt");
        assert_eq!(JwtType::Jwt.to_string(), "jwt");
    }
}
