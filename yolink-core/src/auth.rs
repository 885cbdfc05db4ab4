//! Signed client for the vendor REST API
//!
//! Every request is a JSON POST carrying the account id in a header
//! and an `ys-sec` signature: the MD5 hex digest of the exact request
//! body concatenated with the account secret. Responses come wrapped
//! in an envelope whose `code` field is `"000000"` on success.
//!
//! Two operations are exposed:
//! - [`AuthClient::authenticate`] exchanges the account keys for a
//!   [`Session`] (broker token, topic and endpoint)
//! - [`AuthClient::enable_device`] turns on event reporting for one
//!   sensor serial and returns its device record

use chrono::{DateTime, TimeZone, Utc};
use md5::{Digest, Md5};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::Credentials;
use crate::device::{DeviceKind, DeviceRecord};

/// Envelope code the vendor returns on success
const CODE_SUCCESS: &str = "000000";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential field `{0}` is empty")]
    MissingField(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Authorization context granting subscribe access to the broker.
///
/// Fetched once at startup and passed by reference into the
/// subscriber; there is no in-process refresh, the external
/// supervisor restarts the whole agent instead.
#[derive(Debug, Clone)]
pub struct Session {
    /// Broker username (the account id)
    pub csid: String,

    /// Broker password issued by the vendor
    pub access_token: String,

    /// Topic all of this account's device events arrive on
    pub topic: String,

    pub broker_host: String,
    pub broker_port: u16,

    /// When the token stops working, if the vendor told us
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() >= at,
            None => false,
        }
    }
}

/// Vendor API client
pub struct AuthClient {
    client: Client,
    credentials: Credentials,
}

/// Response envelope shared by every vendor endpoint
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// `data` payload of a successful token exchange
#[derive(Debug, Deserialize)]
struct SessionData {
    token: String,
    host: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    /// Epoch milliseconds, same convention as event timestamps
    #[serde(default)]
    expires: Option<i64>,
}

/// `data` payload of a successful device enablement
#[derive(Debug, Deserialize)]
struct DeviceData {
    #[serde(rename = "deviceId")]
    device_id: String,
    name: String,
    #[serde(rename = "type")]
    raw_type: String,
    token: String,
}

/// Signed request body. Field order matters: the signature covers the
/// serialized text, so it must match what goes on the wire.
#[derive(Debug, Serialize)]
struct ApiRequest {
    method: &'static str,
    time: String,
    params: serde_json::Value,
}

/// MD5 hex digest of `body + secret`, the vendor's `ys-sec` scheme
pub fn sign(body: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl AuthClient {
    /// Create a client owning the account keys
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
        }
    }

    /// Exchange the account keys for a broker session.
    ///
    /// Incomplete credentials fail before any request is built or
    /// sent; the vendor is only contacted with a fully-formed,
    /// signed request.
    pub async fn authenticate(&self) -> Result<Session, AuthError> {
        self.credentials_complete()?;

        let body = self.request_body(
            "Manage.requestToken",
            json!({ "csname": self.credentials.csname }),
        );
        let response = self.post(&body).await?;
        let status = response.status();
        let text = response.text().await?;

        session_from_response(
            status,
            &text,
            &self.credentials.csid,
            &self.credentials.csname,
        )
    }

    /// Enable event reporting for one sensor serial
    pub async fn enable_device(&self, serial: &str) -> Result<DeviceRecord, AuthError> {
        self.credentials_complete()?;

        let body = self.request_body("Manage.addYoLinkDevice", json!({ "sn": serial }));
        let response = self.post(&body).await?;
        let status = response.status();
        let text = response.text().await?;

        device_from_response(status, &text)
    }

    async fn post(&self, body: &str) -> Result<reqwest::Response, AuthError> {
        debug!(url = %self.credentials.server_url, "sending signed vendor request");
        let response = self
            .client
            .post(&self.credentials.server_url)
            .header("Content-Type", "application/json")
            .header("ktt-ys-brand", "yolink")
            .header("YS-CSID", &self.credentials.csid)
            .header("ys-sec", sign(body, &self.credentials.secret_key))
            .body(body.to_string())
            .send()
            .await?;
        Ok(response)
    }

    fn request_body(&self, method: &'static str, params: serde_json::Value) -> String {
        let request = ApiRequest {
            method,
            time: Utc::now().timestamp().to_string(),
            params,
        };
        // Serializing a struct of plain fields cannot fail
        serde_json::to_string(&request).unwrap_or_default()
    }

    fn credentials_complete(&self) -> Result<(), AuthError> {
        let c = &self.credentials;
        for (field, value) in [
            ("csid", &c.csid),
            ("csname", &c.csname),
            ("cssekkey", &c.secret_key),
            ("svr_url", &c.server_url),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::MissingField(field));
            }
        }
        Ok(())
    }
}

fn parse_envelope(status: StatusCode, body: &str) -> Result<serde_json::Value, AuthError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AuthError::Rejected(format!("HTTP {status}")));
    }
    if !status.is_success() {
        return Err(AuthError::MalformedResponse(format!("HTTP {status}")));
    }

    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    if envelope.code != CODE_SUCCESS {
        let desc = envelope.desc.unwrap_or_default();
        return Err(AuthError::Rejected(format!(
            "code {} {}",
            envelope.code, desc
        )));
    }

    envelope
        .data
        .ok_or_else(|| AuthError::MalformedResponse("missing `data`".to_string()))
}

fn session_from_response(
    status: StatusCode,
    body: &str,
    csid: &str,
    csname: &str,
) -> Result<Session, AuthError> {
    let data = parse_envelope(status, body)?;
    let data: SessionData = serde_json::from_value(data)
        .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    if data.token.is_empty() {
        return Err(AuthError::MalformedResponse("empty token".to_string()));
    }

    // Fall back to the account's report topic and the broker's usual
    // port when the response leaves them out
    let topic = data
        .topic
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("{csname}/report"));

    Ok(Session {
        csid: csid.to_string(),
        access_token: data.token,
        topic,
        broker_host: data.host,
        broker_port: data.port.unwrap_or(crate::DEFAULT_BROKER_PORT),
        expires_at: data
            .expires
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
    })
}

fn device_from_response(status: StatusCode, body: &str) -> Result<DeviceRecord, AuthError> {
    let data = parse_envelope(status, body)?;
    let data: DeviceData = serde_json::from_value(data)
        .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    Ok(DeviceRecord {
        device_id: data.device_id,
        name: data.name,
        kind: DeviceKind::from_raw(&data.raw_type),
        raw_type: data.raw_type,
        token: data.token,
    })
}
