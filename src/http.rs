//! # HTTP Fetch
//!
//! A `reqwest`-backed [`HttpClient`] with redirect-following disabled.
//! 3xx responses surface their `Location` header so protocol steps can
//! inspect the redirect target (e.g. extract an authorization code from
//! a callback URL) instead of fetching it.

use anyhow::{Context as _, Result};
use reqwest::redirect::Policy;

use crate::provider::{HttpClient, HttpResponse, RequestBody};

/// HTTP client for issuer, authorization-server and verifier calls.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a client. Redirects are never followed.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<HttpResponse> {
        let response = request.send().await.context("sending request")?;

        let status =
            http::StatusCode::from_u16(response.status().as_u16()).context("mapping status")?;
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body = response.text().await.context("reading body")?;

        Ok(HttpResponse { status, body, location })
    }
}

impl HttpClient for Fetcher {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        self.execute(request).await
    }

    async fn post(
        &self, url: &str, headers: &[(String, String)], body: RequestBody,
    ) -> Result<HttpResponse> {
        let mut request = self.client.post(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(json) => request.json(&json),
            RequestBody::Form(fields) => request.form(&fields),
        };
        self.execute(request).await
    }
}
