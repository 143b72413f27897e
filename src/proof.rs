//! # Proof of Possession
//!
//! Builds the signed JWT proof accompanying a credential request,
//! demonstrating possession of the key bound to the wallet's DID. One
//! proof is minted per credential request; proofs are never reused,
//! even for the same DID.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::jose::{self, JwtType};
use crate::provider::SecretStore;

/// Claims of a proof-of-possession JWT.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProofClaims {
    /// The wallet's DID.
    pub iss: String,

    /// The credential issuer the proof is intended for.
    pub aud: String,

    /// Seconds since epoch the proof was issued at.
    pub iat: i64,

    /// The `c_nonce` from the token response, when the issuer provided
    /// one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// A proof object as embedded in a credential request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Proof {
    /// Proof type. Always `jwt`.
    pub proof_type: String,

    /// The signed proof JWT.
    pub jwt: String,
}

/// Build a signed proof for a credential request.
///
/// # Errors
///
/// Returns `Error::Signing` when no key is stored for the DID.
pub async fn build_proof(
    store: &impl SecretStore, nonce: Option<&str>, issuer: &str, did: &str,
) -> Result<Proof, Error> {
    let claims = ProofClaims {
        iss: did.to_string(),
        aud: issuer.to_string(),
        iat: Utc::now().timestamp(),
        nonce: nonce.map(ToString::to_string),
    };

    let jwt = jose::sign_claims(store, did, JwtType::Openid4VciProofJwt, &claims).await?;

    Ok(Proof { proof_type: "jwt".to_string(), jwt })
}
