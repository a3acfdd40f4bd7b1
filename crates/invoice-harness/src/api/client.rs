//! Authenticated client for the invoicing REST API.

use super::payload::{InvoicePatch, InvoicePayload};
use crate::env::{EnvConfig, EnvKey};
use crate::result::{HarnessError, HarnessResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Message of the error returned by requests outside the `Ready` state
pub const NOT_INITIALIZED: &str = "API context not initialized. Call init() before making requests.";

const INVOICES_SEGMENTS: [&str; 2] = ["v1", "invoices"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Keys under which the API may return an invoice identifier
pub const ID_FIELDS: [&str; 3] = ["id", "_id", "invoiceId"];

/// Raw API response; status codes are not interpreted
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn status(&self) -> u16 {
        self.status
    }

    /// 2xx
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> HarnessResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Invoice identifier from `id`, `_id` or `invoiceId`, string or number
    pub fn invoice_id(&self) -> HarnessResult<Option<String>> {
        Ok(invoice_id_of(&self.json::<Value>()?))
    }

    /// String field of a JSON object body
    pub fn field(&self, name: &str) -> HarnessResult<Option<String>> {
        let value = self.json::<Value>()?;
        Ok(value.get(name).and_then(Value::as_str).map(str::to_string))
    }
}

/// First non-empty identifier in `body`
pub fn invoice_id_of(body: &Value) -> Option<String> {
    ID_FIELDS.iter().find_map(|key| match body.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug)]
struct Context {
    http: reqwest::Client,
    base_url: Url,
}

impl Context {
    /// `{base}/v1/invoices[/{id}]`, with `id` pushed as one encoded segment
    fn invoices_url(&self, id: Option<&str>) -> HarnessResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| HarnessError::Config {
                message: format!("API_BASE_URL cannot be a base URL: {}", self.base_url),
            })?;
            segments.pop_if_empty().extend(INVOICES_SEGMENTS);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Uninitialized,
    Ready(Context),
    Disposed,
}

/// One authenticated request context shared by the steps of a suite.
///
/// Lifecycle is `Uninitialized → Ready → Disposed`; requests are only valid
/// while `Ready`.
#[derive(Debug, Default)]
pub struct ApiClient {
    state: State,
}

impl ApiClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub const fn is_disposed(&self) -> bool {
        matches!(self.state, State::Disposed)
    }

    /// Build the request context from `API_BASE_URL` and `API_AUTH`
    pub fn init(&mut self, config: &EnvConfig) -> HarnessResult<()> {
        match self.state {
            State::Uninitialized => {}
            State::Ready(_) => {
                return Err(HarnessError::IllegalState {
                    message: "API context already initialized.".to_string(),
                })
            }
            State::Disposed => {
                return Err(HarnessError::IllegalState {
                    message: "API context was disposed and cannot be re-initialized.".to_string(),
                })
            }
        }

        let raw_base_url = config.require(EnvKey::ApiBaseUrl)?;
        let base_url = Url::parse(raw_base_url.trim()).map_err(|e| HarnessError::Config {
            message: format!("API_BASE_URL is not a valid URL: {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(HarnessError::Config {
                message: format!("API_BASE_URL cannot be a base URL: {raw_base_url}"),
            });
        }
        let auth = config.require(EnvKey::ApiAuth)?;

        let mut auth_value = HeaderValue::from_str(auth).map_err(|e| HarnessError::Config {
            message: format!("API_AUTH is not a valid header value: {e}"),
        })?;
        auth_value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        info!("API context ready for {}", base_url);
        self.state = State::Ready(Context { http, base_url });
        Ok(())
    }

    /// Release the request context. No-op unless `Ready`.
    pub fn dispose(&mut self) {
        if let State::Ready(_) = self.state {
            debug!("Disposing API context");
            self.state = State::Disposed;
        }
    }

    fn context(&self) -> HarnessResult<&Context> {
        match &self.state {
            State::Ready(context) => Ok(context),
            _ => Err(HarnessError::IllegalState {
                message: NOT_INITIALIZED.to_string(),
            }),
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        id: Option<&str>,
        body: Option<&B>,
    ) -> HarnessResult<ApiResponse> {
        let context = self.context()?;
        let url = context.invoices_url(id)?;
        debug!("{} {}", method, url);

        let mut request = context.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!("{} {} -> {}", method, url, status);
        Ok(ApiResponse::new(status, body.to_vec()))
    }

    /// `POST /v1/invoices`
    pub async fn create_invoice(&self, payload: &InvoicePayload) -> HarnessResult<ApiResponse> {
        self.send(Method::POST, None, Some(payload)).await
    }

    /// `GET /v1/invoices/{id}`
    pub async fn get_invoice(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.send::<()>(Method::GET, Some(id), None).await
    }

    /// `PUT /v1/invoices/{id}`, full replace
    pub async fn update_invoice(
        &self,
        id: &str,
        payload: &InvoicePayload,
    ) -> HarnessResult<ApiResponse> {
        self.send(Method::PUT, Some(id), Some(payload)).await
    }

    /// `PATCH /v1/invoices/{id}`
    pub async fn patch_invoice(&self, id: &str, patch: &InvoicePatch) -> HarnessResult<ApiResponse> {
        self.send(Method::PATCH, Some(id), Some(patch)).await
    }

    /// `DELETE /v1/invoices/{id}`
    pub async fn delete_invoice(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.send::<()>(Method::DELETE, Some(id), None).await
    }
}
