use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde_json::Value;

/// JSON request/response seam in front of the Eagle HTTP API.
pub trait EagleTransport {
    fn get_json(&self, endpoint: &str) -> Result<Value>;
    fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

/// Blocking reqwest transport. Credentials embedded in the base URL are
/// moved into a basic-auth header sent with every request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    auth: Option<BasicAuth>,
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let (base_url, auth) = split_credentials(base_url)?;
        tracing::info!(base_url = %base_url, basic_auth = auth.is_some(), "eagle api server");
        Ok(Self {
            base_url,
            auth,
            http: HttpClient::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> Option<&BasicAuth> {
        self.auth.as_ref()
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, endpoint))
            .header(CONTENT_TYPE, "application/json");
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, auth.password.as_ref());
        }
        request
    }

    fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Value> {
        let response = request
            .send()
            .with_context(|| format!("eagle request {endpoint} failed"))?;
        response_json_or_error(endpoint, response)
    }
}

impl EagleTransport for HttpTransport {
    fn get_json(&self, endpoint: &str) -> Result<Value> {
        self.send(self.request(Method::GET, endpoint), endpoint)
    }

    fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.send(self.request(Method::POST, endpoint).json(body), endpoint)
    }
}

/// Strips `user:pass@` from `raw`, returning the bare base URL (no trailing
/// slash) and the credentials, if any.
fn split_credentials(raw: &str) -> Result<(String, Option<BasicAuth>)> {
    let mut url = Url::parse(raw.trim())
        .with_context(|| format!("invalid eagle server url '{raw}'"))?;
    let auth = if url.username().is_empty() {
        None
    } else {
        Some(BasicAuth {
            username: url.username().to_string(),
            password: url.password().map(str::to_string),
        })
    };
    url.set_username("")
        .map_err(|_| anyhow!("eagle server url '{raw}' cannot carry credentials"))?;
    url.set_password(None)
        .map_err(|_| anyhow!("eagle server url '{raw}' cannot carry credentials"))?;
    Ok((url.as_str().trim_end_matches('/').to_string(), auth))
}

fn response_json_or_error(endpoint: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("eagle {endpoint} response body read failed"))?;
    if !status.is_success() {
        bail!("eagle {endpoint} failed ({code}): {}", truncate_text(&body, 512));
    }
    serde_json::from_str(&body).with_context(|| format!("eagle {endpoint} returned invalid JSON"))
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
