//! Credential Offer types.

use serde::{Deserialize, Serialize};

/// A Credential Offer received from an issuer, by value or dereferenced
/// from a `credential_offer_uri`. Parsed once per flow and treated as
/// immutable from then on.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialOffer {
    /// URL of the offering Credential Issuer.
    pub credential_issuer: String,

    /// Descriptors of the credentials on offer.
    #[serde(default)]
    pub credentials: Vec<OfferedCredential>,

    /// Grants the issuer will accept for this offer. Absent grants mean
    /// the wallet must initiate a plain authorization-code flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grants: Option<Grants>,
}

/// A single offered credential: its wire format and type list.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct OfferedCredential {
    /// Credential format identifier, e.g. `jwt_vc_json`.
    pub format: String,

    /// Credential types, e.g. `["VerifiableCredential", "LEARCredential"]`.
    #[serde(default)]
    pub types: Vec<String>,
}

/// Grant parameters carried in a Credential Offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Grants {
    /// Pre-authorized code grant: the issuer authorized the holder
    /// out-of-band.
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_authorized_code: Option<PreAuthorizedCodeGrant>,

    /// Authorization code grant (used by the EBSI profile).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<AuthorizationCodeGrant>,
}

/// Pre-authorized code grant parameters.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PreAuthorizedCodeGrant {
    /// The code to present at the token endpoint.
    #[serde(rename = "pre-authorized_code")]
    pub pre_authorized_code: String,

    /// Whether the token request must carry a user-entered PIN.
    #[serde(default)]
    pub user_pin_required: bool,
}

/// Authorization code grant parameters.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationCodeGrant {
    /// Opaque state to echo in the authorization request, binding it to
    /// the offer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
}

impl CredentialOffer {
    /// Whether the offer carries a pre-authorized code grant.
    #[must_use]
    pub fn pre_authorized_grant(&self) -> Option<&PreAuthorizedCodeGrant> {
        self.grants.as_ref().and_then(|g| g.pre_authorized_code.as_ref())
    }

    /// Whether the offer carries an authorization code grant.
    #[must_use]
    pub fn authorization_code_grant(&self) -> Option<&AuthorizationCodeGrant> {
        self.grants.as_ref().and_then(|g| g.authorization_code.as_ref())
    }
}
