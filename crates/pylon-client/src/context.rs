//! Request context used to explain domain-specific failures.

/// Identifiers involved in a request.
///
/// These are never sent to the API. The dispatcher only reads them when a
/// not-found response needs to say *which* guild or deployment was missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Deployment ID involved in the request.
    pub deployment_id: Option<String>,
    /// Guild ID involved in the request.
    pub guild_id: Option<String>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context naming a deployment.
    #[must_use]
    pub fn deployment(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: Some(deployment_id.into()),
            guild_id: None,
        }
    }

    /// Creates a context naming a guild.
    #[must_use]
    pub fn guild(guild_id: impl Into<String>) -> Self {
        Self {
            deployment_id: None,
            guild_id: Some(guild_id.into()),
        }
    }

    /// Returns the deployment ID unless it is absent or empty.
    #[must_use]
    pub fn deployment_id(&self) -> Option<&str> {
        non_empty(self.deployment_id.as_deref())
    }

    /// Returns the guild ID unless it is absent or empty.
    #[must_use]
    pub fn guild_id(&self) -> Option<&str> {
        non_empty(self.guild_id.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
