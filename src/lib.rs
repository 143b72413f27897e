//! # OpenID4VC Wallet Engine
//!
//! A headless digital-wallet engine acting as the holder in the
//! [OpenID for Verifiable Credential Issuance] and [OpenID for
//! Verifiable Presentations] exchanges: it resolves scanned credential
//! offers and authorization requests, runs the grant and proof dance,
//! stores what is issued, and assembles and submits signed
//! presentations.
//!
//! The engine is transport-agnostic. REST routing, WebSocket accept
//! loops, and persistence adapters belong to the embedding application,
//! which supplies them through the [`provider`] traits and feeds
//! WebSocket frames into the [`pin::PinRelay`].
//!
//! Holder keys are fresh per flow: each issuance or presentation
//! generates a P-256 `did:key` and parks the private key in the
//! [`provider::SecretStore`], keyed by the DID.
//!
//! [OpenID for Verifiable Credential Issuance]: https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html
//! [OpenID for Verifiable Presentations]: https://openid.net/specs/openid-4-verifiable-presentations-1_0.html

pub mod classify;
pub mod credential;
pub mod did;
pub mod error;
pub mod http;
pub mod issuance;
pub mod jose;
pub mod pin;
pub mod pkce;
pub mod presentation;
pub mod proof;
pub mod provider;
pub mod token;
pub mod types;
pub mod varint;
pub mod wallet;

pub use self::classify::{FlowType, classify};
pub use self::error::{Error, ErrorEnvelope};
pub use self::issuance::{IssuanceOutcome, Profile};
pub use self::pin::PinRelay;
pub use self::presentation::{VcSelectorRequest, VcSelectorResponse};
pub use self::provider::{
    CredentialStore, HttpClient, HttpResponse, Provider, RequestBody, SecretStore,
};
pub use self::wallet::{ProcessedContent, Wallet, WalletConfig};
