//! CLI runner - executes commands

use crate::auth::Credential;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::client::{HttpSyncTransport, SyncController, SyncStatus};
use crate::config::AppConfig;
use crate::error::{Error, Result, ResultExt};
use crate::prompt::build_system_prompt;
use crate::refs::{Extraction, RefExtractor};
use crate::store::{FileSnapshotStore, SnapshotStore};
use crate::types::Snapshot;
use serde_json::json;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Environment fallback for `sync --token`
pub const TOKEN_ENV: &str = "BOOKMARK_SYNC_TOKEN";

/// Environment fallback for `sync --user-id`
pub const USER_ID_ENV: &str = "BOOKMARK_SYNC_USER_ID";

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let mut config = self.load_config()?;

        match &self.cli.command {
            Commands::Serve { port } => {
                if let Some(port) = port {
                    config.server.port = *port;
                }
                crate::cli::serve(&config).await
            }
            Commands::Sync {
                token,
                user_id,
                server_url,
            } => {
                if let Some(url) = server_url {
                    config.client.server_url.clone_from(url);
                }
                let credential = resolve_credential(token.as_deref(), user_id.as_deref())?;
                self.sync(&config, credential).await
            }
            Commands::Show { server } => {
                let snapshot = load_snapshot(&config, *server).await?;
                self.show(snapshot.as_ref());
                Ok(())
            }
            Commands::Prompt { server } => {
                let snapshot = load_snapshot(&config, *server).await?;
                println!("{}", build_system_prompt(snapshot.as_ref()));
                Ok(())
            }
            Commands::Refs => self.refs().await,
        }
    }

    /// Load config file (if any), apply environment overrides and validate
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.cli.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Run one client sync, printing status changes to stderr
    async fn sync(&self, config: &AppConfig, credential: Credential) -> Result<()> {
        let transport = HttpSyncTransport::new(&config.client, credential)
            .context("Failed to build sync client")?;
        let store = FileSnapshotStore::new(&config.client.snapshot_path);
        let controller =
            SyncController::new(Arc::new(transport), Arc::new(store), config.retry.clone());

        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, abandoning sync");
                    cancel.cancel();
                }
            })
        };

        let mut status = controller.subscribe();
        let sync = controller.sync(&cancel);
        tokio::pin!(sync);

        let result = loop {
            tokio::select! {
                result = &mut sync => break result,
                Ok(()) = status.changed() => {
                    eprintln!("{}", *status.borrow_and_update());
                }
            }
        };
        ctrl_c.abort();
        if let Some(last) = unseen_status(&mut status) {
            eprintln!("{last}");
        }

        match result {
            Ok(snapshot) => {
                self.show(Some(&snapshot));
                Ok(())
            }
            Err(Error::Cancelled) => {
                warn!("Sync cancelled");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Print a snapshot summary
    fn show(&self, snapshot: Option<&Snapshot>) {
        match self.cli.format {
            OutputFormat::Json => {
                let summary = snapshot.map_or_else(
                    || json!({ "data": null }),
                    |s| {
                        json!({
                            "lastSynced": s.synchronized_at,
                            "items": s.len(),
                            "authors": s.authors().len(),
                        })
                    },
                );
                println!("{summary}");
            }
            OutputFormat::Pretty => match snapshot {
                Some(s) => {
                    println!(
                        "{} items from {} authors, last synced {}",
                        s.len(),
                        s.authors().len(),
                        s.synchronized_at.to_rfc3339()
                    );
                    for item in s.items.iter().take(10) {
                        let text = item.text().unwrap_or_default().replace('\n', " ");
                        println!("  {}  {}", item.id, truncate(&text, 72));
                    }
                    if s.len() > 10 {
                        println!("  ... and {} more", s.len() - 10);
                    }
                }
                None => println!("No snapshot stored yet"),
            },
        }
    }

    /// Feed stdin through the reference scanner as it arrives
    async fn refs(&self) -> Result<()> {
        let mut stdin = tokio::io::stdin();
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 4096];
        let mut extractor = RefExtractor::new();
        let mut extraction = Extraction::default();
        let mut warned = false;

        loop {
            let read = stdin.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..read]);
            let text = utf8_prefix(&bytes);
            if !warned && matches!(text, Cow::Owned(_)) {
                warn!("Input is not valid UTF-8, replacing invalid bytes");
                warned = true;
            }
            extraction = extractor.update(&text);
            debug!(
                "{} bytes read, {} visible",
                bytes.len(),
                extraction.visible_text.len()
            );
        }

        match self.cli.format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "text": extraction.visible_text,
                    "ids": extraction.reference_ids,
                })
            ),
            OutputFormat::Pretty => {
                println!("{}", extraction.visible_text);
                if !extraction.reference_ids.is_empty() {
                    println!("\nReferences: {}", extraction.reference_ids.join(", "));
                }
            }
        }
        Ok(())
    }
}

/// Pick the credential from flags, then the environment
fn resolve_credential(token: Option<&str>, user_id: Option<&str>) -> Result<Credential> {
    let token = token
        .map(ToString::to_string)
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::unauthenticated("Not authenticated"))?;
    let user_id = user_id
        .map(ToString::to_string)
        .or_else(|| std::env::var(USER_ID_ENV).ok())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::unauthenticated("No session"))?;
    Ok(Credential::new(token, user_id))
}

async fn load_snapshot(config: &AppConfig, server: bool) -> Result<Option<Snapshot>> {
    let path = if server {
        &config.storage.snapshot_path
    } else {
        &config.client.snapshot_path
    };
    let side = if server { "server" } else { "client" };
    FileSnapshotStore::new(path)
        .load()
        .await
        .with_context(|| format!("Failed to load {side} snapshot"))
}

/// Status published after the select loop last looked, if any
fn unseen_status(rx: &mut watch::Receiver<SyncStatus>) -> Option<SyncStatus> {
    match rx.has_changed() {
        Ok(true) => Some(rx.borrow_and_update().clone()),
        _ => None,
    }
}

/// Decode everything read so far. Invalid bytes become U+FFFD; a character
/// split across reads waits for its tail.
fn utf8_prefix(bytes: &[u8]) -> Cow<'_, str> {
    let first = match std::str::from_utf8(bytes) {
        Ok(text) => return Cow::Borrowed(text),
        Err(e) => e,
    };
    if first.error_len().is_none() {
        let valid = &bytes[..first.valid_up_to()];
        return Cow::Borrowed(std::str::from_utf8(valid).unwrap_or_default());
    }

    let mut text = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    }
                    None => break,
                }
            }
        }
    }
    Cow::Owned(text)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_credential_from_flags() {
        let credential = resolve_credential(Some("tok"), Some("7")).unwrap();
        assert_eq!(credential.token(), "tok");
        assert_eq!(credential.user_id(), "7");
    }

    #[test]
    fn test_resolve_credential_rejects_empty() {
        let err = resolve_credential(Some(""), Some("7")).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_utf8_prefix_waits_for_split_char() {
        let text = "hé";
        let bytes = text.as_bytes();
        assert_eq!(utf8_prefix(&bytes[..2]), "h");
        assert_eq!(utf8_prefix(bytes), "hé");
    }

    #[test]
    fn test_utf8_prefix_keeps_text_after_invalid_byte() {
        let mut bytes = b"ok \xff then more".to_vec();
        assert_eq!(utf8_prefix(&bytes), "ok \u{FFFD} then more");

        // Split character after the bad byte still waits
        bytes.extend_from_slice(&"é".as_bytes()[..1]);
        assert_eq!(utf8_prefix(&bytes), "ok \u{FFFD} then more");
        bytes.push("é".as_bytes()[1]);
        assert_eq!(utf8_prefix(&bytes), "ok \u{FFFD} then moreé");
    }

    #[test]
    fn test_utf8_prefix_invalid_input_still_feeds_refs() {
        let bytes = b"\xfe\xffAnswer <<REFS>>12,34<</REFS>>";
        let extraction = RefExtractor::new().update(&utf8_prefix(bytes));
        assert_eq!(extraction.visible_text, "\u{FFFD}\u{FFFD}Answer");
        assert_eq!(extraction.reference_ids, vec!["12", "34"]);
    }

    #[test]
    fn test_unseen_status_drains_final_update() {
        let (tx, mut rx) = watch::channel(SyncStatus::Idle);
        assert_eq!(unseen_status(&mut rx), None);

        tx.send_replace(SyncStatus::Attempting { attempt: 1, synced: 3 });
        tx.send_replace(SyncStatus::Succeeded { items: 3 });
        assert_eq!(unseen_status(&mut rx), Some(SyncStatus::Succeeded { items: 3 }));
        assert_eq!(unseen_status(&mut rx), None);

        drop(tx);
        assert_eq!(unseen_status(&mut rx), None);
    }

    #[tokio::test]
    async fn test_load_snapshot_adds_context() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, "not json").unwrap();

        let mut config = AppConfig::default();
        config.client.snapshot_path = path;

        let err = load_snapshot(&config, false).await.unwrap_err();
        assert!(matches!(err, Error::Other(_)));
        let message = err.to_string();
        assert!(message.starts_with("Failed to load client snapshot: "), "{message}");
        assert!(message.contains("client.json"), "{message}");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
