//! # Pylon Workbench
//!
//! Command-line workbench for [Pylon](https://pylon.bot) bot deployments,
//! built on the [`pylon_client`] crate.
//!
//! ## Commands
//!
//! | Command | Endpoint |
//! |---------|----------|
//! | `user` | `GET /user` |
//! | `guilds` | `GET /user/guilds/available` |
//! | `editable-guilds` | `GET /user/guilds` |
//! | `guild ID` | `GET /guilds/{id}` |
//! | `stats ID` | `GET /guilds/{id}/stats` |
//! | `deployment [ID]` | `GET /deployments/{id}` |
//! | `publish FILE [ID]` | `POST /deployments/{id}` |
//! | `namespaces [ID]` | `GET /deployments/{id}/kv/namespaces` |
//! | `items NS [ID]` | `GET /deployments/{id}/kv/namespaces/{ns}/items` |
//! | `tail [ID]` | workbench WebSocket |
//!
//! Results are printed as pretty JSON. `tail` prints one line per console
//! message and keeps reconnecting until interrupted.
//!
//! ## Configuration
//!
//! An optional TOML file (`--config`, `PYLON_CONFIG`):
//!
//! ```toml
//! [api]
//! token = "..."
//! deployment_id = "123456789"
//! base_url = "https://pylon.bot/api"
//! timeout_secs = 30
//!
//! [log_stream]
//! reconnect_delay_ms = 250
//! event_capacity = 256
//! ```
//!
//! `--token` / `PYLON_TOKEN` and `--deployment` / `PYLON_DEPLOYMENT_ID`
//! override the file.

pub mod cli;
pub mod commands;
pub mod config;
