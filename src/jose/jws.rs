//! # JSON Web Signatures
//!
//! Compact JWS signing and decoding for ES256. Signing is always bound
//! to a P-256 JWK holding a private scalar; decoding is structural and
//! does not verify the signature (trust decisions for inbound request
//! objects are list-based, see the presentation workflow), with an
//! explicit [`verify`] available where the signer's key is known.

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::EncodedPoint;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::jose::jwk::Jwk;

/// The protected header of a compact JWS produced by this wallet.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct JwsHeader {
    /// Signing algorithm. Always `ES256`.
    pub alg: String,

    /// JWT `typ` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Key identifier: the signer's DID plus key fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JwsHeader {
    /// An ES256 header for the given `typ` and `kid`.
    #[must_use]
    pub fn es256(typ: impl Into<String>, kid: impl Into<String>) -> Self {
        Self {
            alg: "ES256".to_string(),
            typ: Some(typ.into()),
            kid: Some(kid.into()),
        }
    }
}

/// Sign a claim set into a compact JWS using the private scalar of the
/// provided JWK.
///
/// # Errors
///
/// Returns `Error::Signing` when the JWK holds no private scalar or the
/// scalar is not a valid P-256 key, and `Error::FailedSerializing` when
/// header or claims cannot be serialized.
pub fn encode_sign<T: Serialize>(header: &JwsHeader, claims: &T, jwk: &Jwk) -> Result<String, Error> {
    let header_json =
        serde_json::to_vec(header).map_err(|e| Error::FailedSerializing(e.to_string()))?;
    let claims_json =
        serde_json::to_vec(claims).map_err(|e| Error::FailedSerializing(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        Base64UrlUnpadded::encode_string(&header_json),
        Base64UrlUnpadded::encode_string(&claims_json)
    );

    let key = signing_key(jwk)?;
    let signature: Signature = key.sign(signing_input.as_bytes());

    Ok(format!(
        "{signing_input}.{}",
        Base64UrlUnpadded::encode_string(&signature.to_bytes())
    ))
}

/// Decode a compact JWS into its header and claims without verifying
/// the signature.
///
/// # Errors
///
/// Returns `Error::JwtInvalidFormat` when the token does not have three
/// base64url segments, and `Error::FailedDeserializing` when a segment
/// holds unexpected JSON.
pub fn decode<T: DeserializeOwned>(token: &str) -> Result<(JwsHeader, T), Error> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature)) =
        (segments.next(), segments.next(), segments.next())
    else {
        return Err(Error::JwtInvalidFormat("expected 3 segments".to_string()));
    };
    if segments.next().is_some() || signature.is_empty() {
        return Err(Error::JwtInvalidFormat("expected 3 segments".to_string()));
    }

    let header_json = Base64UrlUnpadded::decode_vec(header)
        .map_err(|_| Error::JwtInvalidFormat("header is not base64url".to_string()))?;
    let payload_json = Base64UrlUnpadded::decode_vec(payload)
        .map_err(|_| Error::JwtInvalidFormat("payload is not base64url".to_string()))?;

    let header: JwsHeader = serde_json::from_slice(&header_json)
        .map_err(|e| Error::FailedDeserializing(format!("JWS header: {e}")))?;
    let claims: T = serde_json::from_slice(&payload_json)
        .map_err(|e| Error::FailedDeserializing(format!("JWS claims: {e}")))?;

    Ok((header, claims))
}

/// Verify the ES256 signature of a compact JWS against a public JWK.
///
/// # Errors
///
/// Returns `Error::JwtInvalidFormat` for structural problems,
/// `Error::KeyEncoding` when the JWK is not a valid P-256 point, and
/// `Error::Signing` when the signature does not match.
pub fn verify(token: &str, jwk: &Jwk) -> Result<(), Error> {
    let mut segments = token.rsplitn(2, '.');
    let (Some(signature), Some(signing_input)) = (segments.next(), segments.next()) else {
        return Err(Error::JwtInvalidFormat("expected 3 segments".to_string()));
    };

    let signature_bytes = Base64UrlUnpadded::decode_vec(signature)
        .map_err(|_| Error::JwtInvalidFormat("signature is not base64url".to_string()))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|e| Error::JwtInvalidFormat(format!("signature: {e}")))?;

    let key = verifying_key(jwk)?;
    key.verify(signing_input.as_bytes(), &signature)
        .map_err(|e| Error::Signing(format!("signature mismatch: {e}")))
}

/// Reconstruct the signing key from a stored JWK.
pub(crate) fn signing_key(jwk: &Jwk) -> Result<SigningKey, Error> {
    let Some(d) = &jwk.d else {
        return Err(Error::Signing("JWK holds no private scalar".to_string()));
    };
    let scalar = Base64UrlUnpadded::decode_vec(d)
        .map_err(|e| Error::Signing(format!("private scalar is not base64url: {e}")))?;
    if scalar.len() != 32 {
        return Err(Error::Signing("private scalar must be 32 bytes".to_string()));
    }

    SigningKey::from_bytes(p256::FieldBytes::from_slice(&scalar))
        .map_err(|e| Error::Signing(format!("invalid P-256 scalar: {e}")))
}

fn verifying_key(jwk: &Jwk) -> Result<VerifyingKey, Error> {
    let x = Base64UrlUnpadded::decode_vec(&jwk.x)
        .map_err(|e| Error::KeyEncoding(format!("x coordinate: {e}")))?;
    let y = Base64UrlUnpadded::decode_vec(&jwk.y)
        .map_err(|e| Error::KeyEncoding(format!("y coordinate: {e}")))?;
    if x.len() != 32 || y.len() != 32 {
        return Err(Error::KeyEncoding("coordinates must be 32 bytes".to_string()));
    }

    let point = EncodedPoint::from_affine_coordinates(
        p256::FieldBytes::from_slice(&x),
        p256::FieldBytes::from_slice(&y),
        false,
    );
    VerifyingKey::from_encoded_point(&point)
        .map_err(|e| Error::KeyEncoding(format!("not a P-256 point: {e}")))
}
