//! Deferred Issuance Tests

mod provider;

use oid4vc_wallet::{Error, IssuanceOutcome, ProcessedContent, Wallet, WalletConfig};
use provider::TestProvider;
use serde_json::json;

const ISSUER: &str = "https://issuer.example";
const OFFER_CONTENT: &str =
    "openid-credential-offer://?credential_offer_uri=https%3A%2F%2Fissuer.example%2Foffers%2F9";

fn enqueue_deferred_issuance(provider: &TestProvider) {
    provider.enqueue(
        200,
        json!({
            "credential_issuer": ISSUER,
            "credentials": [
                {"format": "jwt_vc_json", "types": ["VerifiableCredential", "LEARCredential"]}
            ],
            "grants": {
                "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                    "pre-authorized_code": "code-9"
                }
            }
        })
        .to_string(),
    );
    provider.enqueue(
        200,
        json!({
            "credential_issuer": ISSUER,
            "credential_endpoint": format!("{ISSUER}/credential"),
            "deferred_credential_endpoint": format!("{ISSUER}/credential_deferred")
        })
        .to_string(),
    );
    provider.enqueue(200, json!({"token_endpoint": format!("{ISSUER}/token")}).to_string());
    provider.enqueue(200, json!({"access_token": "at-9", "c_nonce": "n-9"}).to_string());
    // the issuer defers
    provider.enqueue(
        202,
        json!({"transaction_id": "tx-77", "acceptance_token": "accept-77"}).to_string(),
    );
}

// A 202 from the credential endpoint should park the transaction and
// report a pending outcome; resolution later retrieves and stores the
// credential and deletes the parked record.
#[tokio::test]
async fn deferred_then_resolved() {
    let provider = TestProvider::new();
    let wallet = Wallet::new(provider.clone(), WalletConfig::default());

    // --------------------------------------------------
    // Issuance runs, but the issuer answers 202
    // --------------------------------------------------
    enqueue_deferred_issuance(&provider);
    let outcome = wallet.process_content("u1", OFFER_CONTENT).await.expect("should run");
    let ProcessedContent::Issuance(outcomes) = outcome else {
        panic!("expected an issuance outcome");
    };
    let [IssuanceOutcome::Pending { credential_id, transaction_id }] = outcomes.as_slice() else {
        panic!("expected a pending outcome");
    };
    assert_eq!(transaction_id, "tx-77");

    // the parked record holds the acceptance token and deferred endpoint
    let record = provider.deferred_record(credential_id).expect("should be parked");
    assert_eq!(record.access_token, "accept-77");
    assert_eq!(record.deferred_endpoint, format!("{ISSUER}/credential_deferred"));

    // --------------------------------------------------
    // First poll: the issuer is still pending, the record survives
    // --------------------------------------------------
    provider.enqueue(202, "");
    let err = wallet
        .resolve_deferred("u1", credential_id)
        .await
        .expect_err("should still be pending");
    assert!(matches!(err, Error::CredentialNotAvailable(_)));
    assert!(provider.deferred_record(credential_id).is_some());

    // --------------------------------------------------
    // Second poll: the credential arrives, is stored, record deleted
    // --------------------------------------------------
    let credential = provider::credential_jwt(&["VerifiableCredential", "LEARCredential"]);
    provider.enqueue(200, json!({"credential": credential}).to_string());
    let resolved = wallet
        .resolve_deferred("u1", credential_id)
        .await
        .expect("should resolve");
    assert_eq!(resolved.as_str(), Some(credential.as_str()));
    assert!(provider.deferred_record(credential_id).is_none());

    let stored = wallet.credentials("u1").await.expect("should list");
    assert_eq!(stored.len(), 1);

    // the poll presented the acceptance token and transaction id
    let requests = provider.requests();
    let poll = requests.last().expect("should have polled");
    assert_eq!(poll.url, format!("{ISSUER}/credential_deferred"));
    assert!(poll.headers.iter().any(|(k, v)| k == "Authorization" && v == "Bearer accept-77"));
    assert_eq!(poll.json()["transaction_id"], "tx-77");
}

// Resolving an id with no parked record is an error, not a silent no-op.
#[tokio::test]
async fn unknown_deferred_id() {
    let provider = TestProvider::new();
    let wallet = Wallet::new(provider, WalletConfig::default());

    let err = wallet
        .resolve_deferred("u1", "no-such-id")
        .await
        .expect_err("should not resolve");
    assert!(matches!(err, Error::NoSuchVerifiableCredential(_)));
}
