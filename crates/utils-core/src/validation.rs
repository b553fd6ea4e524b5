//! Server-side field validation and sanitisation for task payloads.
//!
//! Every check returns a [`ValidationError`] naming the offending field; the
//! HTTP layer turns it into a 400 with that message.

use board_protocol::Stage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

pub const CLIENT_MAX_LEN: usize = 255;
pub const SHORT_TEXT_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 5000;
pub const PRICE_MAX: f64 = 999_999.99;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://[a-z0-9\-._~%]+(\.[a-z0-9\-._~%]+)+(:\d+)?(/\S*)?$")
        .expect("valid url regex")
});
static HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z0-9]([a-z0-9\-]*[a-z0-9])?\.)+[a-z]{2,}(/\S*)?$")
        .expect("valid host regex")
});
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static HANDLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@?[A-Za-z0-9_.]{1,30}$").expect("valid handle regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trims and caps to `max_len` characters.
pub fn sanitize_text(value: &str, max_len: usize) -> String {
    value.trim().chars().take(max_len).collect()
}

/// Like [`sanitize_text`] but maps blank input to `None`.
pub fn sanitize_optional(value: Option<&str>, max_len: usize) -> Option<String> {
    value
        .map(|v| sanitize_text(v, max_len))
        .filter(|v| !v.is_empty())
}

pub fn validate_client(client: &str) -> Result<String, ValidationError> {
    let client = sanitize_text(client, CLIENT_MAX_LEN);
    if client.is_empty() {
        return Err(ValidationError::new("client", "Client name is required"));
    }
    Ok(client)
}

/// Prices are stored with cent precision.
pub fn validate_price(price: f64) -> Result<f64, ValidationError> {
    if !price.is_finite() || !(0.0..=PRICE_MAX).contains(&price) {
        return Err(ValidationError::new(
            "price",
            format!("Price must be between 0 and {PRICE_MAX}"),
        ));
    }
    Ok((price * 100.0).round() / 100.0)
}

pub fn validate_stage(col_id: i64) -> Result<Stage, ValidationError> {
    Stage::try_from(col_id).map_err(|err| ValidationError::new("col_id", err.to_string()))
}

pub fn validate_order_position(order_position: i64) -> Result<i64, ValidationError> {
    if order_position < 0 {
        return Err(ValidationError::new(
            "order_position",
            "order_position must be zero or greater",
        ));
    }
    Ok(order_position)
}

/// Accepts `https://site.com/path` or a bare `site.com`. Bare hosts are
/// lowercased; trailing slashes are dropped.
pub fn normalize_domain(domain: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(domain) = sanitize_optional(domain, SHORT_TEXT_MAX_LEN) else {
        return Ok(None);
    };

    let normalized = if URL_PATTERN.is_match(&domain) {
        domain.trim_end_matches('/').to_string()
    } else if HOST_PATTERN.is_match(&domain) {
        domain.trim_end_matches('/').to_ascii_lowercase()
    } else {
        return Err(ValidationError::new(
            "domain",
            "Domain must be a URL or a hostname like example.com",
        ));
    };

    Ok(Some(normalized))
}

/// Accepts an e-mail address (lowercased) or a social handle (`@`-prefixed).
pub fn normalize_contact(contact: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(contact) = sanitize_optional(contact, SHORT_TEXT_MAX_LEN) else {
        return Ok(None);
    };

    if EMAIL_PATTERN.is_match(&contact) {
        return Ok(Some(contact.to_lowercase()));
    }
    if HANDLE_PATTERN.is_match(&contact) {
        let handle = contact.trim_start_matches('@');
        return Ok(Some(format!("@{handle}")));
    }

    Err(ValidationError::new(
        "contact",
        "Contact must be an e-mail address or an @handle",
    ))
}

/// Lowercased e-mail address; used for user accounts.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = sanitize_text(email, SHORT_TEXT_MAX_LEN).to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(ValidationError::new("email", "Invalid e-mail address"));
    }
    Ok(email)
}

/// Usernames follow the handle rules but are stored without the `@`.
pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    let username = username.trim().trim_start_matches('@');
    if username.is_empty() || !HANDLE_PATTERN.is_match(username) {
        return Err(ValidationError::new(
            "username",
            "Username may only contain letters, digits, '_' and '.'",
        ));
    }
    Ok(username.to_string())
}

/// Optional http(s) URL, e.g. an avatar.
pub fn normalize_url(field: &'static str, url: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(url) = sanitize_optional(url, 2048) else {
        return Ok(None);
    };
    if !URL_PATTERN.is_match(&url) {
        return Err(ValidationError::new(field, format!("{field} must be an http(s) URL")));
    }
    Ok(Some(url))
}

/// `assets_link` arrives either as a JSON array or as a string holding one.
/// Every entry must be an http(s) URL; the result is the serialized array.
pub fn normalize_assets_links(assets: Option<&Value>) -> Result<Option<String>, ValidationError> {
    let invalid = || ValidationError::new("assets_link", "assets_link must be a list of URLs");

    let parsed = match assets {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(None),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).map_err(|_| invalid())?,
        Some(value) => value.clone(),
    };

    let Value::Array(entries) = parsed else {
        return Err(invalid());
    };

    let mut links = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::String(link) = entry else {
            return Err(invalid());
        };
        let link = link.trim();
        if link.is_empty() {
            continue;
        }
        if !URL_PATTERN.is_match(link) {
            return Err(ValidationError::new(
                "assets_link",
                format!("Invalid asset URL: {link}"),
            ));
        }
        links.push(Value::String(link.to_string()));
    }

    if links.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(&Value::Array(links))
        .map(Some)
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_is_trimmed_and_required() {
        assert_eq!(validate_client("  Acme  ").unwrap(), "Acme");
        assert_eq!(validate_client("   ").unwrap_err().field, "client");
        assert_eq!(validate_client(&"x".repeat(300)).unwrap().len(), CLIENT_MAX_LEN);
    }

    #[test]
    fn price_bounds() {
        assert_eq!(validate_price(0.0).unwrap(), 0.0);
        assert_eq!(validate_price(999_999.99).unwrap(), 999_999.99);
        assert_eq!(validate_price(10.556).unwrap(), 10.56);
        assert!(validate_price(-0.01).is_err());
        assert!(validate_price(1_000_000.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
    }

    #[test]
    fn stage_and_order_position() {
        assert_eq!(validate_stage(3).unwrap(), Stage::Live);
        assert_eq!(validate_stage(4).unwrap_err().field, "col_id");
        assert!(validate_order_position(-1).is_err());
        assert_eq!(validate_order_position(0).unwrap(), 0);
    }

    #[test]
    fn domain_accepts_urls_and_bare_hosts() {
        assert_eq!(
            normalize_domain(Some(" Acme.COM.br ")).unwrap().as_deref(),
            Some("acme.com.br")
        );
        assert_eq!(
            normalize_domain(Some("https://acme.com/")).unwrap().as_deref(),
            Some("https://acme.com")
        );
        assert_eq!(normalize_domain(Some("")).unwrap(), None);
        assert_eq!(
            normalize_domain(Some("not a domain")).unwrap_err().field,
            "domain"
        );
        assert!(normalize_domain(Some("localhost")).is_err());
    }

    #[test]
    fn contact_accepts_email_or_handle() {
        assert_eq!(
            normalize_contact(Some("Ana@Acme.com")).unwrap().as_deref(),
            Some("ana@acme.com")
        );
        assert_eq!(
            normalize_contact(Some("acme_oficial")).unwrap().as_deref(),
            Some("@acme_oficial")
        );
        assert_eq!(
            normalize_contact(Some("@acme")).unwrap().as_deref(),
            Some("@acme")
        );
        assert_eq!(
            normalize_contact(Some("two words")).unwrap_err().field,
            "contact"
        );
    }

    #[test]
    fn account_fields() {
        assert_eq!(normalize_email(" Ana@VibeWeb.dev ").unwrap(), "ana@vibeweb.dev");
        assert_eq!(normalize_email("nope").unwrap_err().field, "email");
        assert_eq!(validate_username("@ana.s").unwrap(), "ana.s");
        assert!(validate_username("ana souza").is_err());
        assert_eq!(
            normalize_url("avatar_url", Some("https://cdn.example.com/a.png"))
                .unwrap()
                .as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert!(normalize_url("avatar_url", Some("ftp://x.com/a")).is_err());
    }

    #[test]
    fn assets_links_are_validated_urls() {
        let from_array =
            normalize_assets_links(Some(&json!(["https://drive.example.com/a", " "]))).unwrap();
        assert_eq!(from_array.as_deref(), Some(r#"["https://drive.example.com/a"]"#));

        let from_string =
            normalize_assets_links(Some(&json!(r#"["http://figma.com/file/1"]"#))).unwrap();
        assert_eq!(from_string.as_deref(), Some(r#"["http://figma.com/file/1"]"#));

        assert!(normalize_assets_links(Some(&json!(["javascript:alert(1)"]))).is_err());
        assert!(normalize_assets_links(Some(&json!({"a": 1}))).is_err());
        assert_eq!(normalize_assets_links(Some(&json!([]))).unwrap(), None);
    }
}
