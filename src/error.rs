//! # Wallet Errors
//!
//! Typed errors raised by the wallet engine. The engine never raises a
//! generic error: every failure is one of the variants below so the
//! embedding API can map it to a transport status without string
//! matching.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the wallet engine.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// An upstream HTTP call (issuer, authorization server, or verifier)
    /// failed or timed out.
    #[error("failed communication with upstream service: {0}")]
    FailedCommunication(String),

    /// Scanned content or a wire document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A JSON document received from a collaborator could not be
    /// deserialized into the expected shape.
    #[error("failed deserializing: {0}")]
    FailedDeserializing(String),

    /// A document produced by the wallet could not be serialized.
    #[error("failed serializing: {0}")]
    FailedSerializing(String),

    /// A compact JWT did not have the `header.payload.signature` shape.
    #[error("invalid JWT format: {0}")]
    JwtInvalidFormat(String),

    /// The authorization server rejected the user-entered PIN.
    #[error("invalid PIN: {0}")]
    InvalidPin(String),

    /// No PIN arrived on the relay before the wait deadline.
    #[error("timed out waiting for PIN: {0}")]
    PinTimeout(String),

    /// Scanned content matched none of the known QR/URI patterns.
    #[error("unknown QR content: {0}")]
    NoSuchQrContent(String),

    /// No stored credential satisfies the presentation request.
    #[error("no such verifiable credential: {0}")]
    NoSuchVerifiableCredential(String),

    /// A deferred credential is still pending at the issuer. Retryable,
    /// not a failure from the end user's point of view.
    #[error("credential not yet available: {0}")]
    CredentialNotAvailable(String),

    /// The presentation request was signed by an issuer that is not on
    /// the trusted-issuer list.
    #[error("issuer not authorized: {0}")]
    IssuerNotAuthorized(String),

    /// Key material could not be encoded into a did:key identifier.
    #[error("key encoding error: {0}")]
    KeyEncoding(String),

    /// A document could not be signed, typically because the private key
    /// for the DID is absent from the secret store.
    #[error("signing error: {0}")]
    Signing(String),

    /// A varint byte string was empty or truncated.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

impl Error {
    /// The HTTP status the embedding API should surface for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::FailedCommunication(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Parse(_) | Self::FailedDeserializing(_) | Self::JwtInvalidFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidPin(_) | Self::PinTimeout(_) => StatusCode::UNAUTHORIZED,
            Self::NoSuchQrContent(_) | Self::NoSuchVerifiableCredential(_) => {
                StatusCode::NOT_FOUND
            }
            Self::CredentialNotAvailable(_) => StatusCode::ACCEPTED,
            Self::IssuerNotAuthorized(_) => StatusCode::FORBIDDEN,
            Self::FailedSerializing(_)
            | Self::KeyEncoding(_)
            | Self::Signing(_)
            | Self::InvalidEncoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may retry the triggering operation as-is. Only
    /// the deferred-credential check is sanctioned for retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::CredentialNotAvailable(_))
    }
}

/// The uniform error envelope returned at the API boundary.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// Short, stable title for the error kind.
    pub title: String,

    /// Human-readable description of this occurrence.
    pub message: String,

    /// The request path (or flow step) the error was raised from.
    pub path: String,
}

impl ErrorEnvelope {
    /// Wrap an [`Error`] for the boundary.
    #[must_use]
    pub fn new(error: &Error, path: impl Into<String>) -> Self {
        let title = match error {
            Error::FailedCommunication(_) => "FailedCommunicationException",
            Error::Parse(_) => "ParseErrorException",
            Error::FailedDeserializing(_) => "FailedDeserializingException",
            Error::FailedSerializing(_) => "FailedSerializingException",
            Error::JwtInvalidFormat(_) => "JwtInvalidFormatException",
            Error::InvalidPin(_) | Error::PinTimeout(_) => "InvalidPinException",
            Error::NoSuchQrContent(_) => "NoSuchQrContentException",
            Error::NoSuchVerifiableCredential(_) => "NoSuchVerifiableCredentialException",
            Error::CredentialNotAvailable(_) => "CredentialNotAvailableException",
            Error::IssuerNotAuthorized(_) => "IssuerNotAuthorizedException",
            Error::KeyEncoding(_) => "KeyEncodingError",
            Error::Signing(_) => "SigningError",
            Error::InvalidEncoding(_) => "InvalidEncodingError",
        };

        Self {
            title: title.to_string(),
            message: error.to_string(),
            path: path.into(),
        }
    }
}
