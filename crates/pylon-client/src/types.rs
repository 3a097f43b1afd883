//! Request and response types for the Pylon API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};


/// Kind of deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeploymentType {
    /// A collection of scripts.
    #[default]
    Script,
    /// An app.
    App,
}

impl TryFrom<u8> for DeploymentType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Script),
            1 => Ok(Self::App),
            other => Err(format!("unknown deployment type {other}")),
        }
    }
}

impl From<DeploymentType> for u8 {
    fn from(value: DeploymentType) -> Self {
        match value {
            DeploymentType::Script => 0,
            DeploymentType::App => 1,
        }
    }
}

/// Whether a deployment runs. Only Pylon administrators change this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeploymentStatus {
    /// The deployment does not run.
    Disabled,
    /// The deployment runs.
    #[default]
    Enabled,
}

impl TryFrom<u8> for DeploymentStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Enabled),
            other => Err(format!("unknown deployment status {other}")),
        }
    }
}

impl From<DeploymentStatus> for u8 {
    fn from(value: DeploymentStatus) -> Self {
        match value {
            DeploymentStatus::Disabled => 0,
            DeploymentStatus::Enabled => 1,
        }
    }
}

// ============================================================================
// User
// ============================================================================

/// Response of `GET /user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Discord user ID.
    pub id: String,
    /// When the user was last seen, ISO 8601.
    pub last_seen_at: String,
    /// Avatar hash.
    pub avatar: Option<String>,
    /// Display name.
    pub display_name: String,
    /// Whether the user may use Pylon.
    pub has_access: bool,
}

// ============================================================================
// Guilds
// ============================================================================

/// Minimal guild payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSummary {
    /// Guild ID.
    pub id: String,
    /// Guild name.
    pub name: String,
    /// Icon hash.
    pub icon: Option<String>,
}

/// Element of `GET /user/guilds/available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableGuild {
    /// Guild ID.
    pub id: String,
    /// Guild name.
    pub name: String,
    /// Icon hash.
    pub icon: Option<String>,
    /// Discord permission bits of the user in this guild.
    pub permissions: u64,
}

/// Element of `GET /user/guilds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableGuild {
    /// Guild ID.
    pub id: String,
    /// Guild name.
    pub name: String,
    /// Icon hash.
    pub icon: Option<String>,
    /// Discord permission bits of the user in this guild.
    pub permissions: u64,
    /// The user's nickname in the guild.
    #[serde(default)]
    pub nick: Option<String>,
}

/// Response of `GET /guilds/{id}`.
///
/// Besides the fields below the API forwards the whole Discord guild object;
/// those fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildInfo {
    /// Guild ID.
    pub id: String,
    /// Guild name.
    pub name: String,
    /// Icon hash.
    #[serde(default)]
    pub icon: Option<String>,
    /// Deployments attached to the guild, newest first.
    #[serde(default)]
    pub deployments: Vec<GuildDeployment>,
    /// `true` during a Discord outage.
    #[serde(default)]
    pub unavailable: bool,
    /// Remaining Discord guild fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deployment entry inside [`GuildInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildDeployment {
    /// Deployment ID.
    pub id: String,
    /// Bot the deployment runs for.
    pub bot_id: String,
    /// Deployment kind.
    #[serde(rename = "type")]
    pub kind: DeploymentType,
    /// Application ID.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Script or app name.
    pub name: String,
    /// Run status.
    pub status: DeploymentStatus,
    /// Increments on every publish.
    pub revision: u64,
    /// Deployment configuration.
    #[serde(with = "stringified")]
    pub config: DeploymentConfig,
    /// Whether the deployment is disabled.
    #[serde(default)]
    pub disabled: bool,
    /// Unused by the API.
    #[serde(default)]
    pub last_updated_at: Option<String>,
}

/// Element of `GET /guilds/{id}/stats`.
///
/// Counters are absent when no information was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildStats {
    /// Capture time, Unix seconds.
    pub date: i64,
    /// Milliseconds of CPU time.
    #[serde(default)]
    pub cpu_ms: Option<f64>,
    /// Milliseconds of script execution.
    #[serde(default)]
    pub execution_ms: Option<f64>,
    /// Host function calls across all scripts.
    #[serde(default)]
    pub host_function_calls: Option<u64>,
    /// Discord cache requests across all scripts.
    #[serde(default)]
    pub discord_cache_requests: Option<u64>,
    /// Discord API requests across all scripts.
    #[serde(default)]
    pub discord_api_requests: Option<u64>,
    /// Gateway events handled.
    #[serde(default)]
    pub events: Option<u64>,
    /// Average CPU milliseconds.
    #[serde(default)]
    pub cpu_ms_avg: Option<f64>,
    /// Average execution milliseconds.
    #[serde(default)]
    pub execution_ms_avg: Option<f64>,
    /// KV operations across all scripts.
    #[serde(default)]
    pub kv_operations: Option<u64>,
}

impl GuildStats {
    /// Returns the capture time as a UTC timestamp.
    #[must_use]
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date, 0)
    }
}

// ============================================================================
// Deployments
// ============================================================================

/// Deployment configuration, delivered by the API as a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// False only when an administrator disabled the deployment.
    pub enabled: bool,
    /// Gateway events the scripts listen to.
    pub events: Vec<String>,
    /// Scheduled tasks.
    pub tasks: DeploymentTasks,
}

/// Scheduled task configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeploymentTasks {
    /// Cron handlers, at most five.
    pub cron_tasks: Vec<CronTask>,
}

/// A named cron handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronTask {
    /// Handler name.
    pub name: String,
    /// Cron expression.
    pub cron_string: String,
}

/// A project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Path such as `/main.ts`.
    pub path: String,
    /// File contents.
    pub content: String,
}

/// The project directory shown in the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptProject {
    /// Files of the project.
    #[serde(default)]
    pub files: Vec<ProjectFile>,
}

/// Script information of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentScript {
    /// Script ID.
    pub id: String,
    /// Project directory, delivered by the API as a JSON string.
    #[serde(with = "stringified")]
    pub project: ScriptProject,
}

/// Response of `GET /deployments/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment ID.
    pub id: String,
    /// Bot the deployment runs for.
    pub bot_id: String,
    /// Deployment kind.
    #[serde(rename = "type")]
    pub kind: DeploymentType,
    /// Application ID.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Script or app name.
    pub name: String,
    /// Run status.
    pub status: DeploymentStatus,
    /// Increments on every publish.
    pub revision: u64,
    /// Deployment configuration.
    #[serde(with = "stringified")]
    pub config: DeploymentConfig,
    /// One-time workbench WebSocket URL.
    pub workbench_url: String,
    /// Guild the deployment belongs to.
    pub guild: GuildSummary,
    /// Script information.
    pub script: DeploymentScript,
}

/// Body of `POST /deployments/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Compiled JavaScript bundle.
    pub contents: String,
    /// Project directory shown in the editor.
    pub project: ScriptProject,
}

/// Response of `POST /deployments/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Deployment ID.
    pub id: String,
    /// Bot the deployment runs for.
    pub bot_id: String,
    /// Deployment kind.
    #[serde(rename = "type")]
    pub kind: DeploymentType,
    /// Application ID.
    #[serde(default)]
    pub app_id: Option<String>,
    /// Script or app name.
    pub name: String,
    /// Run status.
    pub status: DeploymentStatus,
    /// Revision after publishing.
    pub revision: u64,
    /// Deployment configuration.
    #[serde(with = "stringified")]
    pub config: DeploymentConfig,
    /// One-time workbench WebSocket URL.
    pub workbench_url: String,
    /// Guild the deployment belongs to.
    pub guild: GuildSummary,
    /// The new script information.
    #[serde(default)]
    pub script: Option<DeploymentScript>,
    /// Validation errors reported by the API.
    #[serde(default)]
    pub errors: Option<PublishErrors>,
}

impl PublishResponse {
    /// Returns `true` if the API reported validation errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.errors.is_empty())
    }
}

/// Validation error block returned by a publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishErrors {
    /// Error category, e.g. `validation`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Individual errors.
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

/// One validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// Path of keys leading to the offending value.
    pub loc: Vec<Value>,
    /// Message.
    pub msg: String,
    /// Error token, e.g. `value_error`.
    #[serde(rename = "type")]
    pub kind: String,
}

// ============================================================================
// KV
// ============================================================================

/// Element of `GET /deployments/{id}/kv/namespaces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace title.
    pub namespace: String,
    /// Number of keys.
    pub count: u64,
}

/// Element of `GET /deployments/{id}/kv/namespaces/{ns}/items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceItem {
    /// Key.
    pub key: String,
    /// Stored value.
    pub value: NamespaceValue,
    /// Expiry, when set.
    #[serde(default, rename = "expiresAt")]
    pub expires_at: Option<String>,
}

/// Stored value of a KV item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceValue {
    /// JSON text of the value.
    #[serde(default)]
    pub string: Option<String>,
    /// Byte payload.
    #[serde(default)]
    pub bytes: Option<String>,
}

/// A KV item with its value decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceEntry<T> {
    /// Key.
    pub key: String,
    /// Decoded value.
    pub value: T,
}

/// Fields the API sends as JSON encoded inside a string.
mod stringified {
    use serde::de::{DeserializeOwned, Error as _};
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let text = serde_json::to_string(value).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::String(text) => serde_json::from_str(&text).map_err(D::Error::custom),
            other => serde_json::from_value(other).map_err(D::Error::custom),
        }
    }
}
