use chrono::Utc;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, trace};

use crate::logger::MessageLogger;
use crate::protocol::{api_error, parse_token_response, PATH_REFRESH_TOKEN, PATH_SIGN_IN};
use crate::session::Session;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

/// Thin authenticated transport over the Airstage REST API. Owns the
/// session so that sign-in and refresh responses update it in place.
pub(crate) struct ApiClient {
    http: reqwest::Client,
    region: String,
    base_url: Option<String>,
    user_agent: String,
    session: Session,
    logger: Option<MessageLogger>,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        region: String,
        base_url: Option<String>,
        user_agent: String,
        session: Session,
        logger: Option<MessageLogger>,
    ) -> Self {
        Self {
            http,
            region,
            base_url,
            user_agent,
            session,
            logger,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn logger_mut(&mut self) -> Option<&mut MessageLogger> {
        self.logger.as_mut()
    }

    pub async fn get(&mut self, path: &str, params: &[(&str, String)]) -> Result<ApiResponse> {
        self.send(Method::GET, path, params, None).await
    }

    pub async fn post(&mut self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&mut self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    async fn send(
        &mut self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let token = match self.session.access_token.as_deref() {
            Some(t) if !t.is_empty() => Some(t.to_string()),
            _ if path == PATH_SIGN_IN => None,
            _ => return Err(Error::AccessTokenNotSet),
        };
        let base_url = self
            .base_url
            .clone()
            .ok_or_else(|| Error::UnsupportedRegion(self.region.clone()))?;

        debug!(method = %method, path, "airstage request");
        if let Some(ref mut logger) = self.logger {
            logger.log_request(method.as_str(), path, body);
        }

        let mut req = self
            .http
            .request(method.clone(), format!("{base_url}{path}"))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        trace!(status = status.as_u16(), len = text.len(), "airstage response");

        let parsed = if text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(v) => Some(v),
                Err(_) if !status.is_success() => None,
                Err(e) => {
                    return Err(Error::Protocol(format!("invalid JSON from {path}: {e}")));
                }
            }
        };

        if let Some(ref mut logger) = self.logger {
            logger.log_response(method.as_str(), path, status.as_u16(), parsed.as_ref());
        }

        if !status.is_success() {
            return Err(api_error(status.as_u16(), parsed.as_ref()));
        }

        if path == PATH_SIGN_IN || path == PATH_REFRESH_TOKEN {
            let tokens = parse_token_response(parsed.as_ref())?;
            // A refresh response may omit the refresh token; keep the old one then.
            let refresh_token = tokens
                .refresh_token
                .or_else(|| self.session.refresh_token.clone());
            self.session = Session::issued(
                tokens.access_token,
                tokens.expires_in,
                refresh_token,
                Utc::now(),
            );
            debug!(expiry = ?self.session.access_token_expiry, "session updated");
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body: parsed,
        })
    }
}
