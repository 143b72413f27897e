//! Verifiable Credential / Presentation data model and the wallet's own
//! record types.
//!
//! The VC/VP structs are a naive rendering of the W3C data model: the
//! wallet parses what it needs for selection and assembly and carries
//! everything else opaquely.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A W3C Verifiable Credential, as embedded in a `vc` claim.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifiableCredential {
    /// JSON-LD context. The first item is the W3C credentials context.
    #[serde(rename = "@context")]
    pub context: Vec<Value>,

    /// Credential identifier URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Credential types, always including `VerifiableCredential`.
    #[serde(rename = "type")]
    pub type_: Vec<String>,

    /// Issuer URI or object with an `id` member.
    pub issuer: Value,

    /// Claims about the credential subject(s).
    pub credential_subject: Value,

    /// RFC 3339 date-time the credential becomes valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<String>,

    /// RFC 3339 date-time the credential ceases to be valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,

    /// Embedded proof, when the credential carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Value>,
}

/// A W3C Verifiable Presentation aggregating one or more credentials.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifiablePresentation {
    /// JSON-LD context.
    #[serde(rename = "@context")]
    pub context: Vec<Value>,

    /// Presentation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Presentation types, always including `VerifiablePresentation`.
    #[serde(rename = "type")]
    pub type_: Vec<String>,

    /// The presenting holder's DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,

    /// The aggregated credentials, in submission order. Entries are the
    /// stored credential representation (typically compact JWT strings).
    pub verifiable_credential: Vec<Value>,
}

/// Maps each credential in a presentation to the input descriptor it
/// satisfies.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    /// Submission identifier.
    pub id: String,

    /// The presentation definition this submission answers.
    pub definition_id: String,

    /// One entry per presented credential.
    pub descriptor_map: Vec<DescriptorMap>,
}

/// A single `descriptor_map` entry.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DescriptorMap {
    /// The input descriptor id this credential satisfies.
    pub id: String,

    /// Credential format, e.g. `jwt_vc_json`.
    pub format: String,

    /// JSON path of the credential within the presentation, e.g.
    /// `$.verifiableCredential[0]`.
    pub path: String,
}

/// Summary of a stored credential, as listed to wallet clients and used
/// for presentation selection.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialsBasicInfo {
    /// Record id in the credential store.
    pub id: String,

    /// Credential types.
    pub types: Vec<String>,

    /// Stored wire format.
    pub format: String,

    /// The stored credential itself (compact JWT string or JSON).
    pub credential: Value,
}

/// Bookkeeping for a deferred issuance. Created when the issuer answers
/// `202`, deleted once the credential is finally resolved or the flow
/// is abandoned. Exactly one record exists per pending credential id.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeferredCredentialMetadata {
    /// The wallet-side id of the pending credential record.
    pub credential_id: String,

    /// The issuer's transaction id for the pending issuance.
    pub transaction_id: String,

    /// The access token to present when resolving.
    pub access_token: String,

    /// The issuer's deferred credential endpoint.
    pub deferred_endpoint: String,
}
