//! Pre-Authorized Code Flow Tests

mod provider;

use std::time::Duration;

use oid4vc_wallet::{Error, IssuanceOutcome, ProcessedContent, Wallet, WalletConfig};
use provider::TestProvider;
use serde_json::json;
use tokio::sync::mpsc;

const ISSUER: &str = "https://issuer.example";
const OFFER_CONTENT: &str =
    "openid-credential-offer://?credential_offer_uri=https%3A%2F%2Fissuer.example%2Foffers%2F1";

fn offer_json(user_pin_required: bool) -> String {
    json!({
        "credential_issuer": ISSUER,
        "credentials": [
            {"format": "jwt_vc_json", "types": ["VerifiableCredential", "EmployeeCredential"]}
        ],
        "grants": {
            "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                "pre-authorized_code": "oaKazRN8I0IbtZ0C7JuMn5",
                "user_pin_required": user_pin_required
            }
        }
    })
    .to_string()
}

fn issuer_metadata() -> String {
    json!({
        "credential_issuer": ISSUER,
        "credential_endpoint": format!("{ISSUER}/credential"),
        "credentials_supported": []
    })
    .to_string()
}

fn server_metadata() -> String {
    json!({
        "issuer": ISSUER,
        "token_endpoint": format!("{ISSUER}/token")
    })
    .to_string()
}

// Should issue and store a credential without any PIN relay interaction
// when the offer does not require a user PIN.
#[tokio::test]
async fn issue_without_pin() {
    let provider = TestProvider::new();
    let wallet = Wallet::new(provider.clone(), WalletConfig::default());

    // --------------------------------------------------
    // The issuer serves the offer, discovery documents, token and
    // credential
    // --------------------------------------------------
    provider.enqueue(200, offer_json(false));
    provider.enqueue(200, issuer_metadata());
    provider.enqueue(200, server_metadata());
    provider.enqueue(200, json!({"access_token": "at-1", "c_nonce": "n-1"}).to_string());
    let credential = provider::credential_jwt(&["VerifiableCredential", "EmployeeCredential"]);
    provider.enqueue(200, json!({"credential": credential}).to_string());

    // --------------------------------------------------
    // The wallet runs the scanned offer end to end
    // --------------------------------------------------
    let outcome =
        wallet.process_content("u1", OFFER_CONTENT).await.expect("should issue");
    let ProcessedContent::Issuance(outcomes) = outcome else {
        panic!("expected an issuance outcome");
    };
    assert!(matches!(outcomes.as_slice(), [IssuanceOutcome::Stored { .. }]));

    // --------------------------------------------------
    // The token request used the pre-authorized grant, no PIN attached
    // --------------------------------------------------
    let requests = provider.requests();
    let token_request = &requests[3];
    assert_eq!(token_request.url, format!("{ISSUER}/token"));
    let form = token_request.form();
    assert_eq!(
        form.get("grant_type").map(String::as_str),
        Some("urn:ietf:params:oauth:grant-type:pre-authorized_code")
    );
    assert_eq!(form.get("pre-authorized_code").map(String::as_str), Some("oaKazRN8I0IbtZ0C7JuMn5"));
    assert!(!form.contains_key("user_pin"));

    // --------------------------------------------------
    // The credential request carried the proof and bearer token
    // --------------------------------------------------
    let credential_request = &requests[4];
    assert_eq!(credential_request.url, format!("{ISSUER}/credential"));
    assert!(
        credential_request
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer at-1")
    );
    let body = credential_request.json();
    assert_eq!(body["format"], "jwt_vc_json");
    assert_eq!(body["proof"]["proof_type"], "jwt");

    // stored and listable
    let stored = wallet.credentials("u1").await.expect("should list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].types, vec!["VerifiableCredential", "EmployeeCredential"]);
}

// Should prompt the connected session, wait for the relayed PIN and send
// it with the token request.
#[tokio::test]
async fn issue_with_relayed_pin() {
    let provider = TestProvider::new();
    let wallet = Wallet::new(provider.clone(), WalletConfig::default());

    provider.enqueue(200, offer_json(true));
    provider.enqueue(200, issuer_metadata());
    provider.enqueue(200, server_metadata());
    provider.enqueue(200, json!({"access_token": "at-2"}).to_string());
    let credential = provider::credential_jwt(&["VerifiableCredential", "EmployeeCredential"]);
    provider.enqueue(200, json!({"credential": credential}).to_string());

    // --------------------------------------------------
    // A WebSocket session registers for the user
    // --------------------------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel();
    let bearer = provider::bearer_for("u2");
    wallet
        .pin_relay()
        .on_message("s-1", &tx, &json!({"id": bearer}).to_string())
        .await
        .expect("should register");

    // --------------------------------------------------
    // The flow blocks on the PIN; the session answers the prompt
    // --------------------------------------------------
    let flow = wallet.process_content("u2", OFFER_CONTENT);
    let answer = async {
        let prompt = rx.recv().await.expect("should be prompted");
        let prompt: serde_json::Value = serde_json::from_str(&prompt).expect("should parse");
        assert_eq!(prompt["pin_required"], true);
        let process_id = prompt["process_id"].as_str().expect("should carry process_id");

        wallet
            .pin_relay()
            .on_message(
                "s-1",
                &tx,
                &json!({"pin": "1234", "process_id": process_id}).to_string(),
            )
            .await
            .expect("should deliver");
    };
    let (outcome, ()) = tokio::join!(flow, answer);

    let ProcessedContent::Issuance(outcomes) = outcome.expect("should issue") else {
        panic!("expected an issuance outcome");
    };
    assert_eq!(outcomes.len(), 1);

    // the PIN travelled with the token request
    let token_request = &provider.requests()[3];
    assert_eq!(token_request.form().get("user_pin").map(String::as_str), Some("1234"));
}

// Should surface InvalidPin when the authorization server rejects the
// PIN-carrying token request.
#[tokio::test]
async fn rejected_pin() {
    let provider = TestProvider::new();
    let wallet = Wallet::new(provider.clone(), WalletConfig::default());

    provider.enqueue(200, offer_json(true));
    provider.enqueue(200, issuer_metadata());
    provider.enqueue(200, server_metadata());
    provider.enqueue(400, json!({"error": "invalid_grant"}).to_string());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let bearer = provider::bearer_for("u3");
    wallet
        .pin_relay()
        .on_message("s-2", &tx, &json!({"id": bearer}).to_string())
        .await
        .expect("should register");

    let flow = wallet.process_content("u3", OFFER_CONTENT);
    let answer = async {
        let prompt = rx.recv().await.expect("should be prompted");
        let prompt: serde_json::Value = serde_json::from_str(&prompt).expect("should parse");
        let process_id = prompt["process_id"].as_str().expect("should carry process_id");
        wallet
            .pin_relay()
            .on_message(
                "s-2",
                &tx,
                &json!({"pin": "0000", "process_id": process_id}).to_string(),
            )
            .await
            .expect("should deliver");
    };
    let (outcome, ()) = tokio::join!(flow, answer);

    assert!(matches!(outcome.expect_err("should reject"), Error::InvalidPin(_)));
}

// Should time out with PinTimeout when no session ever answers.
#[tokio::test]
async fn pin_times_out() {
    let provider = TestProvider::new();
    let config = WalletConfig { pin_timeout_secs: 1, ..WalletConfig::default() };
    let wallet = Wallet::new(provider.clone(), config);

    provider.enqueue(200, offer_json(true));
    provider.enqueue(200, issuer_metadata());
    provider.enqueue(200, server_metadata());

    let start = std::time::Instant::now();
    let err = wallet
        .process_content("u4", OFFER_CONTENT)
        .await
        .expect_err("should time out");

    assert!(matches!(err, Error::PinTimeout(_)));
    assert!(start.elapsed() >= Duration::from_secs(1));
}

// Should reject content matching no known flow shape.
#[tokio::test]
async fn unknown_content() {
    let provider = TestProvider::new();
    let wallet = Wallet::new(provider, WalletConfig::default());

    let err = wallet
        .process_content("u5", "https://example.com/just-a-link")
        .await
        .expect_err("should reject");
    assert!(matches!(err, Error::NoSuchQrContent(_)));
}
