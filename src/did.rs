//! # DID Key Engine
//!
//! Generates P-256 key pairs and derives `did:key` identifiers from
//! them using the `jwk_jcs-pub` multicodec: the public JWK's minimal
//! members are JCS-canonicalized, prefixed with the varint-encoded
//! multicodec code, and base58-btc multibase encoded.
//!
//! The derivation is a pure function of the public key bytes: the same
//! key always yields the same DID, across processes and runs.
//!
//! See <https://w3c-ccg.github.io/did-method-key>

use base64ct::{Base64UrlUnpadded, Encoding};
use multibase::Base;
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;

use crate::error::Error;
use crate::jose::jwk::{self, Jwk};
use crate::varint;

/// The multicodec code for a JCS-canonicalized public JWK.
const JWK_JCS_PUB: u64 = 0xeb51;

/// A freshly generated DID and its key material. The private key must
/// only persist in the secret store, keyed by the DID.
#[derive(Clone, Debug)]
pub struct DidKeyMaterial {
    /// The derived `did:key` identifier.
    pub did: String,

    /// Public JWK (no private scalar).
    pub public_key_jwk: Jwk,

    /// Full JWK including the private scalar.
    pub private_key: Jwk,
}

/// Generate a P-256 key pair and derive its `did:key` identifier.
///
/// # Errors
///
/// Returns `Error::KeyEncoding` if the generated key cannot be encoded.
pub fn generate() -> Result<DidKeyMaterial, Error> {
    let signing_key = SigningKey::random(&mut OsRng);
    let point = signing_key.verifying_key().to_encoded_point(false);

    let (Some(x), Some(y)) = (point.x(), point.y()) else {
        return Err(Error::KeyEncoding("generated point has no affine coordinates".to_string()));
    };

    let public_key_jwk = Jwk {
        kty: "EC".to_string(),
        crv: "P-256".to_string(),
        x: Base64UrlUnpadded::encode_string(x),
        y: Base64UrlUnpadded::encode_string(y),
        d: None,
    };
    let private_key = Jwk {
        d: Some(Base64UrlUnpadded::encode_string(&signing_key.to_bytes())),
        ..public_key_jwk.clone()
    };

    Ok(DidKeyMaterial {
        did: did_from_jwk(&public_key_jwk)?,
        public_key_jwk,
        private_key,
    })
}

/// Derive the `did:key` identifier for a public P-256 JWK.
///
/// # Errors
///
/// Returns `Error::KeyEncoding` when the JWK is not a well-formed
/// P-256 key.
pub fn did_from_jwk(jwk: &Jwk) -> Result<String, Error> {
    if jwk.kty != "EC" || jwk.crv != "P-256" {
        return Err(Error::KeyEncoding(format!(
            "unsupported key type {}/{}",
            jwk.kty, jwk.crv
        )));
    }
    for (name, coordinate) in [("x", &jwk.x), ("y", &jwk.y)] {
        let bytes = Base64UrlUnpadded::decode_vec(coordinate)
            .map_err(|e| Error::KeyEncoding(format!("{name} coordinate: {e}")))?;
        if bytes.len() != 32 {
            return Err(Error::KeyEncoding(format!("{name} coordinate must be 32 bytes")));
        }
    }

    let canonical = jwk::canonicalize(&jwk.to_public_members())?;

    let mut multi_bytes = varint::encode(JWK_JCS_PUB);
    multi_bytes.extend_from_slice(&canonical);
    let multikey = multibase::encode(Base::Base58Btc, &multi_bytes);

    Ok(format!("did:key:{multikey}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let material = generate().expect("should generate");
        let again = did_from_jwk(&material.public_key_jwk).expect("should derive");
        assert_eq!(material.did, again);
        assert!(material.did.starts_with("did:key:z"));
    }

    #[test]
    fn distinct_keys_yield_distinct_dids() {
        let a = generate().expect("should generate");
        let b = generate().expect("should generate");
        assert_ne!(a.did, b.did);
    }

    #[test]
    fn member_order_does_not_change_the_did() {
        let material = generate().expect("should generate");
        // same members, parsed from a differently-ordered serialization
        let reordered: Jwk = serde_json::from_str(&format!(
            r#"{{"y":"{}","x":"{}","crv":"P-256","kty":"EC"}}"#,
            material.public_key_jwk.y, material.public_key_jwk.x
        ))
        .expect("should parse");

        assert_eq!(
            did_from_jwk(&reordered).expect("should derive"),
            material.did
        );
    }

    #[test]
    fn malformed_key_rejected() {
        let jwk = Jwk {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x: "short".to_string(),
            y: "short".to_string(),
            d: None,
        };
        assert!(matches!(did_from_jwk(&jwk), Err(Error::KeyEncoding(_))));
    }
}
