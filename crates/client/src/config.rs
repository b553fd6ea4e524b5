use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_HOSTING_PRICE: f64 = 29.0;
pub const DEFAULT_URGENT_HOURS: i64 = 48;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("base URL must use http or https, got {0}")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Server origin, e.g. `https://os.vibeweb.dev`. API paths are joined onto it.
    pub base_url: Url,
    /// Monthly price of one hosted live project.
    pub hosting_price: f64,
    /// Deadlines closer than this many hours are urgent.
    pub urgent_hours: i64,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ClientConfigError> {
        let mut base_url = Url::parse(base_url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientConfigError::UnsupportedScheme(
                base_url.scheme().to_string(),
            ));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            hosting_price: DEFAULT_HOSTING_PRICE,
            urgent_hours: DEFAULT_URGENT_HOURS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_hosting_price(mut self, hosting_price: f64) -> Self {
        self.hosting_price = hosting_price;
        self
    }

    pub fn with_urgent_hours(mut self, urgent_hours: i64) -> Self {
        self.urgent_hours = urgent_hours;
        self
    }

    pub fn api_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("api/{}", path.trim_start_matches('/')))
    }

    /// `ws(s)://…/socket?token=…`
    pub fn socket_url(&self, token: &str) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.join("socket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http(s) -> ws(s) is always an allowed scheme change.
        let _ = url.set_scheme(scheme);
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(url)
    }
}
