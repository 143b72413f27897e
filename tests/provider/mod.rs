//! Shared test provider: in-memory credential and secret stores plus a
//! scripted HTTP client that replays queued responses and records every
//! request for assertions.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use oid4vc_wallet::jose::{Jwk, JwsHeader, jws};
use oid4vc_wallet::provider::{
    CredentialStore, HttpClient, HttpResponse, Provider, RequestBody, SecretStore,
};
use oid4vc_wallet::types::{CredentialsBasicInfo, DeferredCredentialMetadata};
use serde_json::Value;

/// A request the scripted client saw, kept for assertions.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl RecordedRequest {
    /// The form fields of a form-encoded body.
    pub fn form(&self) -> HashMap<String, String> {
        match &self.body {
            Some(RequestBody::Form(fields)) => fields.iter().cloned().collect(),
            _ => panic!("request to {} carried no form body", self.url),
        }
    }

    /// The JSON body.
    pub fn json(&self) -> Value {
        match &self.body {
            Some(RequestBody::Json(value)) => value.clone(),
            _ => panic!("request to {} carried no JSON body", self.url),
        }
    }
}

#[derive(Default)]
struct Inner {
    credentials: Mutex<HashMap<String, Vec<CredentialsBasicInfo>>>,
    deferred: Mutex<HashMap<String, DeferredCredentialMetadata>>,
    secrets: Mutex<HashMap<String, Jwk>>,
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// The scripted provider handed to the wallet under test.
#[derive(Clone, Default)]
pub struct TestProvider {
    inner: Arc<Inner>,
}

impl TestProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next HTTP response, replayed in FIFO order.
    pub fn enqueue(&self, status: u16, body: impl Into<String>) {
        self.inner.responses.lock().unwrap().push_back(HttpResponse {
            status: http::StatusCode::from_u16(status).unwrap(),
            body: body.into(),
            location: None,
        });
    }

    /// Queue a 302 with a `Location` target.
    pub fn enqueue_redirect(&self, location: impl Into<String>) {
        self.inner.responses.lock().unwrap().push_back(HttpResponse {
            status: http::StatusCode::FOUND,
            body: String::new(),
            location: Some(location.into()),
        });
    }

    /// Every request issued so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    /// The deferred record stored under `credential_id`, if any.
    pub fn deferred_record(&self, credential_id: &str) -> Option<DeferredCredentialMetadata> {
        self.inner.deferred.lock().unwrap().get(credential_id).cloned()
    }

    fn next_response(&self, method: &'static str, url: &str) -> Result<HttpResponse> {
        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response for {method} {url}"))
    }

    fn record(&self, request: RecordedRequest) {
        self.inner.requests.lock().unwrap().push(request);
    }
}

impl Provider for TestProvider {}

impl CredentialStore for TestProvider {
    async fn save_credential(
        &self, user_id: &str, credential: Value, format: &str,
    ) -> Result<String> {
        let id = format!("vc-{}", self.inner.credentials.lock().unwrap().len() + 1);
        let types = credential_types(&credential);
        self.inner.credentials.lock().unwrap().entry(user_id.to_string()).or_default().push(
            CredentialsBasicInfo {
                id: id.clone(),
                types,
                format: format.to_string(),
                credential,
            },
        );
        Ok(id)
    }

    async fn credentials_by_type(
        &self, user_id: &str, credential_type: &str,
    ) -> Result<Vec<CredentialsBasicInfo>> {
        Ok(self
            .inner
            .credentials
            .lock()
            .unwrap()
            .get(user_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.types.iter().any(|t| t == credential_type))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_credential(&self, user_id: &str, credential_id: &str) -> Result<()> {
        if let Some(records) = self.inner.credentials.lock().unwrap().get_mut(user_id) {
            records.retain(|r| r.id != credential_id);
        }
        Ok(())
    }

    async fn save_deferred(&self, metadata: DeferredCredentialMetadata) -> Result<()> {
        self.inner.deferred.lock().unwrap().insert(metadata.credential_id.clone(), metadata);
        Ok(())
    }

    async fn deferred(&self, credential_id: &str) -> Result<Option<DeferredCredentialMetadata>> {
        Ok(self.inner.deferred.lock().unwrap().get(credential_id).cloned())
    }

    async fn delete_deferred(&self, credential_id: &str) -> Result<()> {
        self.inner.deferred.lock().unwrap().remove(credential_id);
        Ok(())
    }
}

impl SecretStore for TestProvider {
    async fn save_secret(&self, did: &str, key: &Jwk) -> Result<()> {
        self.inner.secrets.lock().unwrap().insert(did.to_string(), key.clone());
        Ok(())
    }

    async fn secret(&self, did: &str) -> Result<Option<Jwk>> {
        Ok(self.inner.secrets.lock().unwrap().get(did).cloned())
    }

    async fn delete_secret(&self, did: &str) -> Result<()> {
        self.inner.secrets.lock().unwrap().remove(did);
        Ok(())
    }
}

impl HttpClient for TestProvider {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        self.record(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            headers: headers.to_vec(),
            body: None,
        });
        self.next_response("GET", url)
    }

    async fn post(
        &self, url: &str, headers: &[(String, String)], body: RequestBody,
    ) -> Result<HttpResponse> {
        self.record(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            headers: headers.to_vec(),
            body: Some(body),
        });
        self.next_response("POST", url)
    }
}

/// Types carried by a credential: the decoded `vc.type` of a compact
/// JWT, the `type` member of a JSON credential, or the base type.
fn credential_types(credential: &Value) -> Vec<String> {
    if let Some(token) = credential.as_str()
        && let Ok((_, claims)) = jws::decode::<Value>(token)
        && let Some(types) = claims["vc"]["type"].as_array()
    {
        return types.iter().filter_map(|t| t.as_str().map(String::from)).collect();
    }
    if let Some(types) = credential["type"].as_array() {
        return types.iter().filter_map(|t| t.as_str().map(String::from)).collect();
    }
    vec!["VerifiableCredential".to_string()]
}

/// A compact JWT whose `sub` claim names the user, for relay
/// registration.
pub fn bearer_for(sub: &str) -> String {
    let material = oid4vc_wallet::did::generate().expect("should generate");
    let header = JwsHeader::es256("jwt", "test");
    jws::encode_sign(&header, &serde_json::json!({ "sub": sub }), &material.private_key)
        .expect("should sign")
}

/// A signed credential JWT carrying the given types, as an issuer would
/// mint it.
pub fn credential_jwt(types: &[&str]) -> String {
    let material = oid4vc_wallet::did::generate().expect("should generate");
    let header = JwsHeader::es256("jwt", "test-issuer");
    let claims = serde_json::json!({
        "iss": "https://issuer.example",
        "vc": {
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": types,
            "credentialSubject": { "given_name": "Normal", "family_name": "Person" }
        }
    });
    jws::encode_sign(&header, &claims, &material.private_key).expect("should sign")
}
