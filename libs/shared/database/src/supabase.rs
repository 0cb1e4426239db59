use anyhow::Result;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Non-success answer from PostgREST, kept typed so callers can react to specific statuses.
#[derive(Debug, Error)]
#[error("API error ({status}): {body}")]
pub struct SupabaseApiError {
    pub status: StatusCode,
    pub body: String,
}

impl SupabaseApiError {
    /// Look through an `anyhow` chain for a PostgREST status.
    pub fn status_of(err: &anyhow::Error) -> Option<StatusCode> {
        err.downcast_ref::<SupabaseApiError>().map(|e| e.status)
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let api_key = if self.anon_key.is_empty() { &self.service_role_key } else { &self.anon_key };
        headers.insert("apikey", HeaderValue::from_str(api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseApiError { status, body: error_text }.into());
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Request authenticated with the service role, for server-side stores and workers.
    pub async fn service_request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        representation: bool,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        let prefer = if representation { "return=representation" } else { "return=minimal" };
        headers.insert("Prefer", HeaderValue::from_static(prefer));

        self.request_with_headers(
            method,
            path,
            Some(&self.service_role_key),
            body,
            Some(headers),
        )
        .await
    }

    /// Like [`service_request`](Self::service_request) for calls whose response body is ignored.
    pub async fn service_execute(&self, method: Method, path: &str, body: Option<Value>) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Executing {} request to {}", method, url);

        let mut headers = self.get_headers(Some(&self.service_role_key))?;
        headers.insert("Prefer", HeaderValue::from_static("return=minimal"));

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseApiError { status, body: error_text }.into());
        }

        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
