//! # QR/URI Classifier
//!
//! Dispatches scanned content to the issuance or presentation workflow
//! (or their EBSI/DOME counterparts) by matching against fixed
//! patterns. Classification is a pure function; unknown content is
//! surfaced by the workflow layer as `NoSuchQrContent`.

use std::sync::LazyLock;

use regex::Regex;

/// The workflow a piece of scanned content belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowType {
    /// Standard OID4VCI credential offer.
    Issuance,

    /// Credential offer against the EBSI conformance profile.
    IssuanceEbsi,

    /// Credential offer against the DOME marketplace profile.
    IssuanceDome,

    /// Standard OID4VP authorization request.
    Presentation,

    /// EBSI self-issued authorization request.
    PresentationEbsi,

    /// None of the known shapes.
    Unknown,
}

static OFFER_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(openid-credential-offer://|openid4vci://)").expect("valid regex"));
static OFFER_BY_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(credential_offer_uri=|credential_offer=)").expect("valid regex"));
static PRESENTATION_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^openid4vp://").expect("valid regex"));
static EBSI_REQUEST_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^openid://").expect("valid regex"));
static EBSI_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ebsi|conformance").expect("valid regex"));
static DOME_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)dome").expect("valid regex"));

/// Classify scanned content into the workflow that handles it.
#[must_use]
pub fn classify(content: &str) -> FlowType {
    if OFFER_SCHEME.is_match(content) || OFFER_BY_REF.is_match(content) {
        if EBSI_MARKER.is_match(content) {
            return FlowType::IssuanceEbsi;
        }
        if DOME_MARKER.is_match(content) {
            return FlowType::IssuanceDome;
        }
        return FlowType::Issuance;
    }
    if PRESENTATION_SCHEME.is_match(content) {
        return FlowType::Presentation;
    }
    if EBSI_REQUEST_SCHEME.is_match(content) {
        return FlowType::PresentationEbsi;
    }
    FlowType::Unknown
}
