use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Thin PostgREST client. Every request runs with the service key and asks
/// for `return=representation`, so mutating calls echo the affected rows.
/// An empty echo from a filtered `PATCH` means the filter matched nothing,
/// which the repositories use as a failed compare-and-swap.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_credentials(&config.supabase_url, &config.supabase_service_key)
    }

    pub fn with_credentials(base_url: &str, service_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers()?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => SupabaseError::Auth(error_text),
                404 => SupabaseError::NotFound(error_text),
                409 => SupabaseError::Conflict(error_text),
                code => SupabaseError::Api { status: code, message: error_text },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// `GET /rest/v1/{table}?{query}`
    pub async fn select<T>(&self, table: &str, query: &str) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, &rest_path(table, query), None).await
    }

    /// Inserts one row and returns the stored representation.
    pub async fn insert<T>(&self, table: &str, row: Value) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let mut rows: Vec<T> = self.request(Method::POST, &rest_path(table, ""), Some(row)).await?;

        if rows.is_empty() {
            return Err(SupabaseError::UnexpectedResponse(format!(
                "insert into {} returned no rows",
                table
            )));
        }

        Ok(rows.swap_remove(0))
    }

    /// Patches every row matching `filter` and returns the rows that changed.
    pub async fn update<T>(&self, table: &str, filter: &str, changes: Value) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, &rest_path(table, filter), Some(changes)).await
    }

    /// Deletes every row matching `filter` and returns the removed rows.
    pub async fn delete<T>(&self, table: &str, filter: &str) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::DELETE, &rest_path(table, filter), None).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn rest_path(table: &str, query: &str) -> String {
    if query.is_empty() {
        format!("/rest/v1/{}", table)
    } else {
        format!("/rest/v1/{}?{}", table, query)
    }
}
