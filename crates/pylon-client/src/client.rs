//! HTTP client for the Pylon API.

use crate::context::RequestContext;
use crate::error::Error;
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, RawResponse, ReqwestTransport};
use crate::types::*;
use crate::websocket::{LogStream, LogStreamConfig};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[cfg(test)]
mod tests;

/// Base URL of the public Pylon API.
pub const DEFAULT_BASE_URL: &str = "https://pylon.bot/api";

/// Prefix of the HTML-ish body the web server sends for unknown routes.
const WARNING_SIGN: &str = "\u{26A0}\u{FE0F}";
const DEPLOYMENT_NOT_FOUND_BODY: &str = "could not find deployment";
const GUILD_NOT_FOUND_BODY: &str = "could not find guild";
const MISSING_JSON_BODY_MSG: &str = "missing json body";
const NOT_AUTHORIZED_MESSAGE: &str = "not authorized";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API token, sent verbatim in the `Authorization` header.
    pub token: String,
    /// Deployment used when a call does not name one.
    pub deployment_id: Option<String>,
    /// Base URL of the API (e.g., "https://pylon.bot/api").
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            deployment_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with the given token and defaults otherwise.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// Sets the default deployment.
    #[must_use]
    pub fn with_deployment_id(mut self, deployment_id: impl Into<String>) -> Self {
        self.deployment_id = Some(deployment_id.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// HTTP client for the Pylon API.
///
/// Cloning is cheap; clones share the transport and token.
#[derive(Debug, Clone)]
pub struct PylonClient {
    transport: Arc<dyn HttpTransport>,
    token: Arc<str>,
    deployment_id: Option<String>,
    base_url: String,
}

impl PylonClient {
    /// Creates a new client backed by `reqwest`.
    ///
    /// # Errors
    /// Returns error if the token is empty, the base URL is invalid, or the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a new client with default configuration and the given token.
    ///
    /// # Errors
    /// Returns error if the token is empty or the HTTP client cannot be built.
    pub fn with_token(token: &str) -> Result<Self, Error> {
        Self::new(ClientConfig::new(token))
    }

    /// Creates a new client that sends requests through `transport`.
    ///
    /// # Errors
    /// Returns error if the token is empty or the base URL is invalid.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, Error> {
        if config.token.is_empty() {
            return Err(Error::missing("token"));
        }
        if Url::parse(&config.base_url).is_err() {
            return Err(Error::incompatible("base_url"));
        }

        Ok(Self {
            transport,
            token: Arc::from(config.token),
            deployment_id: config.deployment_id.filter(|id| !id.is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the default deployment ID, if one was configured.
    #[must_use]
    pub fn deployment_id(&self) -> Option<&str> {
        self.deployment_id.as_deref()
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // User
    // ========================================================================

    /// Gets the account associated with the token.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_user(&self) -> Result<User, Error> {
        self.request(&RequestContext::new(), HttpMethod::Get, "/user", None)
            .await
    }

    /// Gets all guilds the user is in.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_available_guilds(&self) -> Result<Vec<AvailableGuild>, Error> {
        self.request(
            &RequestContext::new(),
            HttpMethod::Get,
            "/user/guilds/available",
            None,
        )
        .await
    }

    /// Gets all guilds the user can edit with Pylon, i.e. where the user is an
    /// administrator.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_editable_guilds(&self) -> Result<Vec<EditableGuild>, Error> {
        self.request(&RequestContext::new(), HttpMethod::Get, "/user/guilds", None)
            .await
    }

    // ========================================================================
    // Guilds
    // ========================================================================

    /// Gets the Discord guild information along with its deployments.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_guild_info(&self, guild_id: &str) -> Result<GuildInfo, Error> {
        self.request(
            &RequestContext::guild(guild_id),
            HttpMethod::Get,
            &format!("/guilds/{}", guild_id),
            None,
        )
        .await
    }

    /// Gets the computational statistics of a guild.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_guild_stats(&self, guild_id: &str) -> Result<Vec<GuildStats>, Error> {
        self.request(
            &RequestContext::guild(guild_id),
            HttpMethod::Get,
            &format!("/guilds/{}/stats", guild_id),
            None,
        )
        .await
    }

    /// Gets the most recent deployment ID of a guild.
    ///
    /// # Errors
    /// Returns error if the request fails or the guild has no deployment.
    pub async fn get_deployment_id_from_guild(&self, guild_id: &str) -> Result<String, Error> {
        let guild = self.get_guild_info(guild_id).await?;
        guild
            .deployments
            .into_iter()
            .next()
            .map(|d| d.id)
            .ok_or_else(|| Error::UnexpectedResponse {
                detail: format!("guild {} has no deployments", guild_id),
                response: None,
            })
    }

    // ========================================================================
    // Deployments
    // ========================================================================

    /// Gets a deployment. Falls back to the client's default deployment.
    ///
    /// # Errors
    /// Returns error if no deployment ID is available or the request fails.
    pub async fn get_deployment(&self, deployment_id: Option<&str>) -> Result<Deployment, Error> {
        let id = self.resolve_deployment(deployment_id)?;
        self.request(
            &RequestContext::deployment(id),
            HttpMethod::Get,
            &format!("/deployments/{}", id),
            None,
        )
        .await
    }

    /// Publishes a new script to a deployment. Falls back to the client's
    /// default deployment.
    ///
    /// # Errors
    /// Returns error if no deployment ID is available or the request fails.
    pub async fn publish_deployment(
        &self,
        body: &PublishRequest,
        deployment_id: Option<&str>,
    ) -> Result<PublishResponse, Error> {
        let id = self.resolve_deployment(deployment_id)?;
        let body = serde_json::to_string(body)?;
        self.request(
            &RequestContext::deployment(id),
            HttpMethod::Post,
            &format!("/deployments/{}", id),
            Some(body),
        )
        .await
    }

    // ========================================================================
    // KV Namespaces
    // ========================================================================

    /// Lists the KV namespaces of a deployment.
    ///
    /// # Errors
    /// Returns error if no deployment ID is available or the request fails.
    pub async fn get_namespaces(&self, deployment_id: Option<&str>) -> Result<Vec<Namespace>, Error> {
        let id = self.resolve_deployment(deployment_id)?;
        self.request(
            &RequestContext::deployment(id),
            HttpMethod::Get,
            &format!("/deployments/{}/kv/namespaces", id),
            None,
        )
        .await
    }

    /// Lists the items of a KV namespace with their values decoded as `T`.
    ///
    /// # Errors
    /// Returns error if no deployment ID is available, the request fails, or
    /// an item has no JSON value.
    pub async fn get_namespace_items<T: DeserializeOwned>(
        &self,
        namespace: &str,
        deployment_id: Option<&str>,
    ) -> Result<Vec<NamespaceEntry<T>>, Error> {
        let id = self.resolve_deployment(deployment_id)?;
        let items: Vec<NamespaceItem> = self
            .request(
                &RequestContext::deployment(id),
                HttpMethod::Get,
                &format!("/deployments/{}/kv/namespaces/{}/items", id, namespace),
                None,
            )
            .await?;

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let text = item.value.string.ok_or_else(|| Error::UnexpectedResponse {
                    detail: format!("response[{}].value.string is undefined", i),
                    response: None,
                })?;
                let value = serde_json::from_str(&text).map_err(|e| Error::UnexpectedResponse {
                    detail: format!("response[{}].value.string is not valid JSON: {}", i, e),
                    response: None,
                })?;
                Ok(NamespaceEntry {
                    key: item.key,
                    value,
                })
            })
            .collect()
    }

    // ========================================================================
    // WebSocket
    // ========================================================================

    /// Creates a log stream following a deployment's console output. Falls
    /// back to the client's default deployment.
    ///
    /// The stream is not connected yet; call [`LogStream::connect`].
    ///
    /// # Errors
    /// Returns error if no deployment ID is available.
    pub fn connect_socket(&self, deployment_id: Option<&str>) -> Result<LogStream, Error> {
        self.connect_socket_with_config(deployment_id, LogStreamConfig::default())
    }

    /// Like [`connect_socket`](Self::connect_socket) with a custom stream
    /// configuration.
    ///
    /// # Errors
    /// Returns error if no deployment ID is available.
    pub fn connect_socket_with_config(
        &self,
        deployment_id: Option<&str>,
        config: LogStreamConfig,
    ) -> Result<LogStream, Error> {
        let id = self.resolve_deployment(deployment_id)?;
        LogStream::new(self.clone(), id, config)
    }

    // ========================================================================
    // Dispatcher
    // ========================================================================

    /// Sends one request and decodes the response body as `T`.
    ///
    /// `ctx` is only used to explain not-found failures; it is never sent.
    /// A failed response is classified into exactly one [`Error`].
    ///
    /// # Errors
    /// Returns error if `path` does not start with `/`, the request fails, the
    /// response is not 2xx, or the body does not decode as `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> Result<T, Error> {
        if !path.starts_with('/') {
            return Err(Error::incompatible("path"));
        }

        let mut headers = vec![("Authorization".to_string(), self.token.to_string())];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        let request = HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body,
        };

        debug!(%method, path, "sending request");
        let resp = self.transport.send(request).await?;

        if resp.is_success() {
            decode_body(resp)
        } else {
            let error = classify_response(ctx, resp);
            warn!(%method, path, kind = %error.kind(), "request failed: {}", error);
            Err(error)
        }
    }

    fn resolve_deployment<'a>(&'a self, deployment_id: Option<&'a str>) -> Result<&'a str, Error> {
        deployment_id
            .filter(|id| !id.is_empty())
            .or(self.deployment_id.as_deref())
            .ok_or_else(|| Error::missing("deployment_id, client default deployment_id"))
    }
}

// ============================================================================
// Internal Helpers
// ============================================================================

fn decode_body<T: DeserializeOwned>(resp: RawResponse) -> Result<T, Error> {
    // Empty bodies decode as `null`, non-JSON bodies as an opaque string.
    let decoded = match &resp.json {
        Some(value) => T::deserialize(value),
        None if resp.text.trim().is_empty() => T::deserialize(&Value::Null),
        None => T::deserialize(&Value::String(resp.text.clone())),
    };

    decoded.map_err(|e| Error::UnexpectedResponse {
        detail: e.to_string(),
        response: Some(resp),
    })
}

/// Maps a non-2xx response to its error classification.
///
/// Specific body shapes are checked before bare status codes; anything
/// unrecognized becomes [`Error::Unidentifiable`].
fn classify_response(ctx: &RequestContext, resp: RawResponse) -> Error {
    let status = resp.status;
    match status {
        404 if resp.text.starts_with(WARNING_SIGN) => Error::ResourceNotFound { response: resp },
        404 if resp.text == DEPLOYMENT_NOT_FOUND_BODY => match ctx.deployment_id() {
            Some(id) => Error::DeploymentNotFound {
                deployment_id: id.to_string(),
                response: resp,
            },
            None => Error::NullishContext {
                field: "deployment_id",
                context: ctx.clone(),
                response: resp,
            },
        },
        404 if resp.text == GUILD_NOT_FOUND_BODY => match ctx.guild_id() {
            Some(id) => Error::GuildNotFound {
                guild_id: id.to_string(),
                response: resp,
            },
            None => Error::NullishContext {
                field: "guild_id",
                context: ctx.clone(),
                response: resp,
            },
        },
        _ if resp.json_str("message") == Some(NOT_AUTHORIZED_MESSAGE) => {
            Error::Unauthorized { response: resp }
        }
        401 => Error::Unauthorized { response: resp },
        403 => Error::Forbidden { response: resp },
        405 => Error::MethodNotAllowed { response: resp },
        400 if resp.json_str("msg") == Some(MISSING_JSON_BODY_MSG) => {
            Error::MissingOrInvalidRequestBody {
                message: MISSING_JSON_BODY_MSG.to_string(),
                response: resp,
            }
        }
        500 => Error::InternalServerError { response: resp },
        _ => Error::Unidentifiable { response: resp },
    }
}
