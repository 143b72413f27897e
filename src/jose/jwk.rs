//! # JSON Web Keys
//!
//! The P-256 JWK model used for did:key generation and ES256 signing,
//! plus the JSON Canonicalization Scheme (JCS, RFC 8785) serialization
//! the did:key method requires.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// An elliptic-curve JWK. The private scalar `d` is present only for
/// keys held in the secret store, never in public material.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type. Always `EC` for this wallet.
    pub kty: String,

    /// Curve name. Always `P-256` for this wallet.
    pub crv: String,

    /// Base64url-encoded x-coordinate.
    pub x: String,

    /// Base64url-encoded y-coordinate.
    pub y: String,

    /// Base64url-encoded private scalar. Present in stored secrets only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

impl Jwk {
    /// The minimal required public members (`kty`, `crv`, `x`, `y`), in
    /// the shape the did:key method canonicalizes. Optional members and
    /// the private scalar are excluded.
    #[must_use]
    pub fn to_public_members(&self) -> Value {
        serde_json::json!({
            "kty": self.kty,
            "crv": self.crv,
            "x": self.x,
            "y": self.y,
        })
    }
}

/// Serialize a JSON value per the JSON Canonicalization Scheme:
/// lexicographically ordered object members, no insignificant
/// whitespace. Two structurally equal documents canonicalize to
/// byte-identical output regardless of member order in the source.
///
/// # Errors
///
/// Returns `Error::FailedSerializing` if a leaf value cannot be
/// serialized.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), Error> {
    match value {
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_leaf(&Value::String((*key).clone()), out)?;
                out.push(b':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        leaf => write_leaf(leaf, out)?,
    }
    Ok(())
}

fn write_leaf(value: &Value, out: &mut Vec<u8>) -> Result<(), Error> {
    let bytes =
        serde_json::to_vec(value).map_err(|e| Error::FailedSerializing(e.to_string()))?;
    out.extend_from_slice(&bytes);
    Ok(())
}
