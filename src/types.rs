//! # Wire Types
//!
//! Request, response and discovery document shapes for the OpenID4VCI
//! and OpenID4VP exchanges, parsed defensively from collaborator JSON.

mod metadata;
mod model;
mod offer;
mod token;

pub use self::metadata::{AuthorizationServerMetadata, CredentialIssuerMetadata};
pub use self::model::{
    CredentialsBasicInfo, DeferredCredentialMetadata, DescriptorMap, PresentationSubmission,
    VerifiableCredential, VerifiablePresentation,
};
pub use self::offer::{
    AuthorizationCodeGrant, CredentialOffer, Grants, OfferedCredential, PreAuthorizedCodeGrant,
};
pub use self::token::TokenResponse;
