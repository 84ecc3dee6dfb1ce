//! reqwest-backed [`RestTransport`] for a PostgREST endpoint.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde_json::json;

use crate::config::RemoteConfig;
use crate::error::{Result, StorageError};

use super::codec::Row;
use super::transport::{RestError, RestTransport, SelectQuery};

/// HTTP client for a single remote project.
pub struct HttpTransport {
    client: Client,
    rest_url: String,
    api_key: String,
    probe_timeout: std::time::Duration,
}

impl HttpTransport {
    /// Validate the configured URL and build a client with the request
    /// timeout applied to every call.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let url = Url::parse(config.base_url()).map_err(|e| {
            StorageError::InvalidConfig(format!("remote URL \"{}\" is invalid: {e}", config.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(StorageError::InvalidConfig(format!(
                "remote URL \"{}\" must be an absolute http(s) URL",
                config.url
            )));
        }
        if config.api_key.trim().is_empty() {
            return Err(StorageError::InvalidConfig("remote API key is empty".into()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StorageError::InvalidConfig(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            rest_url: config.rest_url(),
            api_key: config.api_key.clone(),
            probe_timeout: config.probe_timeout,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, path))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn key_filter(key: &str, id: i64) -> [(String, String); 1] {
        [(key.to_string(), format!("eq.{id}"))]
    }

    // ---- private helpers ----

    async fn send(request: RequestBuilder) -> Result<Response, RestError> {
        let response = request.send().await.map_err(RestError::from_reqwest)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
        Err(RestError::from_response(status.as_u16(), &body))
    }

    async fn rows(request: RequestBuilder) -> Result<Vec<Row>, RestError> {
        let response = Self::send(request).await?;
        response.json::<Vec<Row>>().await.map_err(|e| RestError {
            status: None,
            code: None,
            message: format!("malformed response body: {e}"),
            details: None,
            network: false,
        })
    }
}

#[async_trait]
impl RestTransport for HttpTransport {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>, RestError> {
        let mut params: Vec<(String, String)> = vec![("select".into(), "*".into())];
        if let Some((column, id)) = &query.filter {
            params.push((column.clone(), format!("eq.{id}")));
        }
        if let Some(column) = &query.order_by {
            params.push(("order".into(), format!("{column}.asc")));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".into(), limit.to_string()));
        }
        Self::rows(self.request(Method::GET, table).query(&params)).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, RestError> {
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&rows);
        Self::rows(request).await
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        id: i64,
        row: Row,
    ) -> Result<Vec<Row>, RestError> {
        let request = self
            .request(Method::PATCH, table)
            .query(&Self::key_filter(key, id))
            .header("Prefer", "return=representation")
            .json(&row);
        Self::rows(request).await
    }

    async fn delete(&self, table: &str, key: &str, id: i64) -> Result<(), RestError> {
        let request = self
            .request(Method::DELETE, table)
            .query(&Self::key_filter(key, id));
        Self::send(request).await.map(|_| ())
    }

    async fn delete_all(&self, table: &str, key: &str) -> Result<(), RestError> {
        // PostgREST refuses unfiltered deletes; this filter matches every row.
        let request = self
            .request(Method::DELETE, table)
            .query(&[(key, "not.is.null")]);
        Self::send(request).await.map(|_| ())
    }

    async fn execute_sql(&self, sql: &str) -> Result<(), RestError> {
        let request = self
            .request(Method::POST, "rpc/exec_sql")
            .json(&json!({ "sql": sql }));
        Self::send(request).await.map(|_| ())
    }

    async fn ping(&self) -> Result<(), RestError> {
        let request = self.request(Method::GET, "").timeout(self.probe_timeout);
        match request.send().await {
            Ok(response) if response.status().is_server_error() => Err(RestError::network(
                format!("remote answered {}", response.status()),
            )),
            Ok(_) => Ok(()),
            Err(e) => Err(RestError::network(e.to_string())),
        }
    }
}
