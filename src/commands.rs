//! Subcommand execution.

use crate::cli::Commands;
use pylon_client::{
    ConsoleMessage, LogEvent, LogStreamConfig, ProjectFile, PublishRequest, PylonClient,
    ScriptProject,
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

/// Runs one subcommand, writing its output to `out`.
///
/// # Errors
/// Returns error if the API call fails, the output cannot be written, or a
/// publish is rejected.
pub async fn execute<W: Write>(
    client: &PylonClient,
    stream_config: LogStreamConfig,
    command: &Commands,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Commands::User => print_json(out, &client.get_user().await?),
        Commands::Guilds => print_json(out, &client.get_available_guilds().await?),
        Commands::EditableGuilds => print_json(out, &client.get_editable_guilds().await?),
        Commands::Guild { id } => print_json(out, &client.get_guild_info(id).await?),
        Commands::Stats { id } => print_json(out, &client.get_guild_stats(id).await?),
        Commands::Deployment { id } => {
            print_json(out, &client.get_deployment(id.as_deref()).await?)
        }
        Commands::Publish { file, id } => {
            let request = publish_request(file)?;
            let response = client.publish_deployment(&request, id.as_deref()).await?;
            print_json(out, &response)?;
            if response.has_errors() {
                anyhow::bail!("publish was rejected");
            }
            Ok(())
        }
        Commands::Namespaces { id } => {
            print_json(out, &client.get_namespaces(id.as_deref()).await?)
        }
        Commands::Items { namespace, id } => {
            let items = client
                .get_namespace_items::<Value>(namespace, id.as_deref())
                .await?;
            print_json(out, &items)
        }
        Commands::Tail { id } => {
            let stream = client.connect_socket_with_config(id.as_deref(), stream_config)?;
            let mut events = stream.subscribe();
            stream.connect().await?;
            let result = tail(&mut events, out, interrupted(tokio::signal::ctrl_c())).await;
            stream.close();
            result
        }
    }
}

/// Prints console messages until `shutdown` resolves or the stream closes.
///
/// # Errors
/// Returns error if the output cannot be written.
pub async fn tail<W: Write>(
    events: &mut broadcast::Receiver<LogEvent>,
    out: &mut W,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    tokio::pin!(shutdown);

    loop {
        let event = tokio::select! {
            _ = &mut shutdown => return Ok(()),
            event = events.recv() => event,
        };

        match event {
            Ok(LogEvent::Message(message)) => {
                writeln!(out, "{}", format_message(&message))?;
                out.flush()?;
            }
            Ok(LogEvent::Open) => info!("workbench connected"),
            Ok(LogEvent::Close(close)) => {
                info!(code = ?close.code, reason = %close.reason, "workbench disconnected");
            }
            Ok(LogEvent::Error(error)) => warn!(%error, "workbench error"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "console output lagged"),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Resolves when `signal` fires. If the signal cannot be listened for, never
/// resolves, so the caller keeps running until its other exit conditions.
async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Formats a console message as `[method] arg arg ...`.
///
/// String arguments are printed bare, everything else as compact JSON.
#[must_use]
pub fn format_message(message: &ConsoleMessage) -> String {
    let args: Vec<String> = message
        .data
        .iter()
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    format!("[{}] {}", message.method, args.join(" "))
}

fn publish_request(file: &Path) -> anyhow::Result<PublishRequest> {
    let content = std::fs::read_to_string(file)?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main.js".to_string());

    Ok(PublishRequest {
        contents: content.clone(),
        project: ScriptProject {
            files: vec![ProjectFile {
                path: format!("/{}", name),
                content,
            }],
        },
    })
}

fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pylon_client::ConsoleMethod;
    use serde_json::json;

    #[test]
    fn test_format_message() {
        let message = ConsoleMessage {
            method: ConsoleMethod::Warn,
            data: vec![json!("count"), json!(3), json!({"a": true})],
        };

        assert_eq!(format_message(&message), r#"[warn] count 3 {"a":true}"#);
    }

    #[test]
    fn test_format_message_without_args() {
        let message = ConsoleMessage {
            method: ConsoleMethod::Log,
            data: vec![],
        };

        assert_eq!(format_message(&message), "[log] ");
    }

    #[test]
    fn test_print_json_is_pretty() {
        let mut out = Vec::new();
        print_json(&mut out, &json!({"id": "1"})).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"id\": \"1\"\n}\n");
    }

    #[test]
    fn test_publish_request_from_file() {
        let path = std::env::temp_dir().join("pylon-workbench-publish-test.js");
        std::fs::write(&path, "console.log(1)").unwrap();

        let request = publish_request(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(request.contents, "console.log(1)");
        assert_eq!(request.project.files[0].path, "/pylon-workbench-publish-test.js");
    }

    #[test]
    fn test_publish_request_missing_file() {
        assert!(publish_request(Path::new("/definitely/not/here.js")).is_err());
    }

    #[tokio::test]
    async fn test_tail_prints_messages_until_closed() {
        let (tx, mut rx) = broadcast::channel(16);
        tx.send(LogEvent::Open).unwrap();
        tx.send(LogEvent::Message(ConsoleMessage {
            method: ConsoleMethod::Log,
            data: vec![json!("hi"), json!(1)],
        }))
        .unwrap();
        tx.send(LogEvent::Error("boom".to_string())).unwrap();
        drop(tx);

        let mut out = Vec::new();
        tail(&mut rx, &mut out, std::future::pending()).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "[log] hi 1\n");
    }

    #[tokio::test]
    async fn test_tail_stops_on_shutdown() {
        let (_tx, mut rx) = broadcast::channel::<LogEvent>(16);

        let mut out = Vec::new();
        tail(&mut rx, &mut out, async {}).await.unwrap();

        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_resolves_on_signal() {
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            interrupted(async { Ok(()) }),
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_interrupted_keeps_waiting_when_signal_fails() {
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            interrupted(async { Err(std::io::Error::other("no signal handler")) }),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tail_ends_on_stream_close_when_signal_fails() {
        let (tx, mut rx) = broadcast::channel::<LogEvent>(16);
        drop(tx);

        let mut out = Vec::new();
        tail(
            &mut rx,
            &mut out,
            interrupted(async { Err(std::io::Error::other("no signal handler")) }),
        )
        .await
        .unwrap();

        assert!(out.is_empty());
    }
}
