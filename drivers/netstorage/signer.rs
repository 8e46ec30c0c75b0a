//! Request signing for the NetStorage HTTP API / NetStorage 请求签名
//!
//! Every request carries three headers: the action descriptor, the auth data
//! (timestamp, nonce, key name) and a base64 HMAC-SHA256 over auth data plus
//! the canonical sign string. A fresh timestamp/nonce pair is drawn per request.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use reqwest::Method;
use sha2::Sha256;
use url::Url;

use crate::storage::StorageError;

pub const ACTION_HEADER: &str = "x-akamai-acs-action";
pub const AUTH_DATA_HEADER: &str = "x-akamai-acs-auth-data";
pub const AUTH_SIGN_HEADER: &str = "x-akamai-acs-auth-sign";

/// Fixed client identifier sent as User-Agent
pub const CLIENT_ID: &str = "NetStorageKit-Rust";

/// Nonce is drawn from 0..NONCE_LIMIT
const NONCE_LIMIT: u32 = 100_000;

/// NetStorage account credentials / 账号凭据
#[derive(Clone)]
pub struct Credentials {
    hostname: String,
    keyname: String,
    key: String,
    secure: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("hostname", &self.hostname)
            .field("keyname", &self.keyname)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new(hostname: impl Into<String>, keyname: impl Into<String>, key: impl Into<String>, secure: bool) -> Result<Self> {
        let (hostname, keyname, key) = (hostname.into(), keyname.into(), key.into());
        for (field, value) in [("hostname", &hostname), ("keyname", &keyname), ("key", &key)] {
            if value.is_empty() {
                return Err(StorageError::Config(format!("{} required", field)).into());
            }
        }
        Ok(Self { hostname, keyname, key, secure })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn keyname(&self) -> &str {
        &self.keyname
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }
}

/// A request ready to send; callers attach the body for uploads
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

/// Builds authenticated requests from the configured credentials / 签名请求构造器
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sign `action` on `path` with the current time and a random nonce
    pub fn build(&self, action: &str, method: Method, path: &str) -> Result<SignedRequest> {
        let timestamp = chrono::Utc::now().timestamp();
        let nonce = rand::thread_rng().gen_range(0..NONCE_LIMIT);
        self.build_with(action, method, path, timestamp, nonce)
    }

    /// Same as `build` with explicit timestamp and nonce
    pub fn build_with(&self, action: &str, method: Method, path: &str, timestamp: i64, nonce: u32) -> Result<SignedRequest> {
        let request_uri = request_uri(path)?;

        let acs_action = format!("version=1&action={}", action);
        // The two addresses are fixed placeholders of the auth data format
        let auth_data = format!(
            "5, 0.0.0.0, 0.0.0.0, {}, {}, {}",
            timestamp, nonce, self.credentials.keyname
        );
        let sign_string = format!("{}\n{}:{}\n", request_uri, ACTION_HEADER, acs_action);
        let signature = sign(&self.credentials.key, &auth_data, &sign_string);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(ACTION_HEADER), header_value(&acs_action)?);
        headers.insert(HeaderName::from_static(AUTH_DATA_HEADER), header_value(&auth_data)?);
        headers.insert(HeaderName::from_static(AUTH_SIGN_HEADER), header_value(&signature)?);
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_ID));

        Ok(SignedRequest {
            method,
            url: format!("{}://{}{}", self.credentials.scheme(), self.credentials.hostname, request_uri),
            headers,
        })
    }
}

/// base64(HMAC-SHA256(key, auth_data + sign_string))
pub fn sign(key: &str, auth_data: &str, sign_string: &str) -> String {
    type HmacSha256 = Hmac<Sha256>;
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC key of any size");
    mac.update(auth_data.as_bytes());
    mac.update(sign_string.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Canonical request URI of an absolute path (percent-encoded path plus query)
pub fn request_uri(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(StorageError::InvalidPath(format!("netstorage path must be absolute: {}", path)).into());
    }

    // URL parsing would resolve dot segments and pass bad escapes through
    let path_part = path.split('?').next().unwrap_or(path);
    if path_part.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(StorageError::InvalidPath(format!("dot segment in netstorage path: {}", path)).into());
    }
    if !valid_escapes(path) {
        return Err(StorageError::InvalidPath(format!("malformed escape in netstorage path: {}", path)).into());
    }

    let url = Url::parse(&format!("http://localhost{}", path))
        .map_err(|e| StorageError::InvalidPath(format!("{}: {}", path, e)))?;

    let mut uri = url.path().to_string();
    if let Some(query) = url.query() {
        uri.push('?');
        uri.push_str(query);
    }
    Ok(uri)
}

/// Every `%` must start a two-digit hex escape
fn valid_escapes(path: &str) -> bool {
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !matches!(escape, Some([a, b]) if a.is_ascii_hexdigit() && b.is_ascii_hexdigit()) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| StorageError::Config(format!("invalid header value {:?}: {}", value, e)).into())
}
