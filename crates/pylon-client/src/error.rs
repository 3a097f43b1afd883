//! Error types for the Pylon client.

use crate::context::RequestContext;
use crate::transport::RawResponse;
use thiserror::Error;


/// Classification tag of an [`Error`].
///
/// Callers should branch on this rather than on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credentials were missing or rejected.
    Unauthorized,
    /// Credentials were accepted but access was denied.
    Forbidden,
    /// The HTTP method is not allowed for the resource.
    MethodNotAllowed,
    /// The URL resource does not exist on the web server.
    ResourceNotFound,
    /// The requested guild does not exist.
    GuildNotFound,
    /// The requested deployment does not exist.
    DeploymentNotFound,
    /// The request body was missing or not valid JSON.
    MissingOrInvalidRequestBody,
    /// The server answered with status 500.
    InternalServerError,
    /// A required parameter was missing or invalid on the caller side.
    MissingRequiredParameter,
    /// A context value needed to explain a not-found response was absent.
    NullishContext,
    /// The failure did not match any known pattern.
    Unidentifiable,
    /// A successful response did not have the expected shape.
    UnexpectedResponse,
    /// A request body could not be serialized.
    Serialization,
    /// The request never produced a response.
    Transport,
    /// A workbench socket could not be opened.
    WebSocket,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::MethodNotAllowed => "HTTP Method Not Allowed",
            Self::ResourceNotFound => "URL Resource Not Found",
            Self::GuildNotFound => "Guild Not Found",
            Self::DeploymentNotFound => "Deployment Not Found",
            Self::MissingOrInvalidRequestBody => "Missing or Invalid JSON in Request Body",
            Self::InternalServerError => "Internal Server Error",
            Self::MissingRequiredParameter => "Missing or Invalid Required Parameter",
            Self::NullishContext => "Nullish Context",
            Self::Unidentifiable => "Unidentifiable Error",
            Self::UnexpectedResponse => "Missing or Unexpected Value in Response",
            Self::Serialization => "Serialization Error",
            Self::Transport => "Transport Error",
            Self::WebSocket => "WebSocket Error",
        };
        f.write_str(name)
    }
}

/// What is wrong with a caller-supplied parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterIssue {
    /// The parameter was absent or empty.
    Missing,
    /// The parameter was present but unusable.
    Incompatible,
}

impl std::fmt::Display for ParameterIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Incompatible => write!(f, "invalid"),
        }
    }
}

/// Client error types.
///
/// Every failed call produces exactly one of these. Variants built from a
/// received response keep that response as evidence, see [`Error::response`].
#[derive(Debug, Error)]
pub enum Error {
    /// Status 401, or a `{"message": "not authorized"}` body.
    #[error("Server responded with HTTP status code {}", .response.status)]
    Unauthorized {
        /// The offending response.
        response: RawResponse,
    },

    /// Status 403.
    #[error("Server responded with HTTP status code {}", .response.status)]
    Forbidden {
        /// The offending response.
        response: RawResponse,
    },

    /// Status 405.
    #[error("Server responded with HTTP status code {}", .response.status)]
    MethodNotAllowed {
        /// The offending response.
        response: RawResponse,
    },

    /// Status 404 with a body starting with the warning sign glyph.
    #[error("Server responded with HTTP status code {}: {}", .response.status, .response.text)]
    ResourceNotFound {
        /// The offending response.
        response: RawResponse,
    },

    /// Status 404 with body `could not find guild`.
    #[error("Guild ID {guild_id} could not be found")]
    GuildNotFound {
        /// Guild ID taken from the request context.
        guild_id: String,
        /// The offending response.
        response: RawResponse,
    },

    /// Status 404 with body `could not find deployment`.
    #[error("Deployment ID {deployment_id} could not be found")]
    DeploymentNotFound {
        /// Deployment ID taken from the request context.
        deployment_id: String,
        /// The offending response.
        response: RawResponse,
    },

    /// Status 400 with a `{"msg": "missing json body"}` body.
    #[error("Request body was missing or contained invalid JSON (server said {message:?})")]
    MissingOrInvalidRequestBody {
        /// The `msg` field reported by the server.
        message: String,
        /// The offending response.
        response: RawResponse,
    },

    /// Status 500. The API also uses this status for invalid credentials.
    #[error(
        "Server responded with HTTP status code {}; this is either a server fault or invalid credentials",
        .response.status
    )]
    InternalServerError {
        /// The offending response.
        response: RawResponse,
    },

    /// A caller-supplied parameter was missing or invalid.
    #[error("Required parameter(s) {parameters} were {issue}")]
    MissingRequiredParameter {
        /// Name(s) of the parameter(s) at fault.
        parameters: String,
        /// Whether the parameter was missing or invalid.
        issue: ParameterIssue,
    },

    /// A domain-specific 404 arrived but the caller gave no ID to report.
    #[error("Context parameter {field} is nullish, where access is necessary")]
    NullishContext {
        /// The context field that was needed.
        field: &'static str,
        /// The context the request was made with.
        context: RequestContext,
        /// The offending response.
        response: RawResponse,
    },

    /// No known failure pattern matched.
    #[error(
        "Unidentifiable error: HTTP status code {}, ok: {}, body: {:?}",
        .response.status,
        .response.is_success(),
        .response.text
    )]
    Unidentifiable {
        /// The offending response.
        response: RawResponse,
    },

    /// A response had a missing or unexpected value.
    #[error("Response structure validation failed: {detail}")]
    UnexpectedResponse {
        /// What was wrong with the response.
        detail: String,
        /// The response, when it is still available.
        response: Option<RawResponse>,
    },

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

impl Error {
    /// Returns the classification tag.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            Self::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Self::GuildNotFound { .. } => ErrorKind::GuildNotFound,
            Self::DeploymentNotFound { .. } => ErrorKind::DeploymentNotFound,
            Self::MissingOrInvalidRequestBody { .. } => ErrorKind::MissingOrInvalidRequestBody,
            Self::InternalServerError { .. } => ErrorKind::InternalServerError,
            Self::MissingRequiredParameter { .. } => ErrorKind::MissingRequiredParameter,
            Self::NullishContext { .. } => ErrorKind::NullishContext,
            Self::Unidentifiable { .. } => ErrorKind::Unidentifiable,
            Self::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
            Self::Json(_) => ErrorKind::Serialization,
            Self::Http(_) => ErrorKind::Transport,
            Self::WebSocket(_) => ErrorKind::WebSocket,
        }
    }

    /// Returns an explanation of what might have happened.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Unauthorized => "Required credentials were missing from the request.",
            ErrorKind::Forbidden => {
                "Access to the resource is denied despite included credentials."
            }
            ErrorKind::MethodNotAllowed => "The HTTP method is not allowed.",
            ErrorKind::ResourceNotFound => "The URL resource on the web server was not found.",
            ErrorKind::GuildNotFound => "The guild specified was not found.",
            ErrorKind::DeploymentNotFound => "The deployment specified was not found.",
            ErrorKind::MissingOrInvalidRequestBody => {
                "The request did not carry the required JSON body."
            }
            ErrorKind::InternalServerError => {
                "The server failed, or the request's authorization header is invalid."
            }
            ErrorKind::MissingRequiredParameter => "Required parameter(s) were missing or invalid.",
            ErrorKind::NullishContext => "A context parameter was missing where it was needed.",
            ErrorKind::Unidentifiable => {
                "The error was unidentifiable, inspect the raw response for details."
            }
            ErrorKind::UnexpectedResponse => {
                "Response structure is incomplete or has unexpected behavior."
            }
            ErrorKind::Serialization => "A value could not be serialized to JSON.",
            ErrorKind::Transport => "The request did not produce a response.",
            ErrorKind::WebSocket => "The workbench socket could not be opened.",
        }
    }

    /// Returns the raw response this error was classified from, if any.
    #[must_use]
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Self::Unauthorized { response }
            | Self::Forbidden { response }
            | Self::MethodNotAllowed { response }
            | Self::ResourceNotFound { response }
            | Self::GuildNotFound { response, .. }
            | Self::DeploymentNotFound { response, .. }
            | Self::MissingOrInvalidRequestBody { response, .. }
            | Self::InternalServerError { response }
            | Self::NullishContext { response, .. }
            | Self::Unidentifiable { response } => Some(response),
            Self::UnexpectedResponse { response, .. } => response.as_ref(),
            Self::MissingRequiredParameter { .. }
            | Self::Json(_)
            | Self::Http(_)
            | Self::WebSocket(_) => None,
        }
    }

    /// Builds a [`Error::MissingRequiredParameter`] for an absent parameter.
    pub(crate) fn missing(parameters: impl Into<String>) -> Self {
        Self::MissingRequiredParameter {
            parameters: parameters.into(),
            issue: ParameterIssue::Missing,
        }
    }

    /// Builds a [`Error::MissingRequiredParameter`] for an unusable parameter.
    pub(crate) fn incompatible(parameters: impl Into<String>) -> Self {
        Self::MissingRequiredParameter {
            parameters: parameters.into(),
            issue: ParameterIssue::Incompatible,
        }
    }
}
