use crate::downloader::PlaylistWorker;
use crate::errors::{AppError, Result};
use crate::progress::{Event, WorkerLink};
use crate::security::InputValidator;
use crate::utils::{ensure_dir_exists, sanitize_filename};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Delegates the playlist download to an external helper program.
///
/// The helper is invoked as `<command> <args..> --output <dir> <playlist-link>`
/// and reports on stdout, one JSON message per line:
///
/// ```text
/// {"type": "song_title", "contents": "Artist - Title"}
/// {"type": "eta_update", "contents": ["eta", 95]}
/// {"type": "progress",   "contents": [3, 12]}
/// ```
///
/// Its stderr is forwarded to the log at debug level.
pub struct ScriptDownloader {
    name: String,
    command: String,
    args: Vec<String>,
    output_dir: PathBuf,
    validator: InputValidator,
}

impl ScriptDownloader {
    pub fn new(command: impl Into<String>, args: Vec<String>, output_dir: PathBuf) -> Self {
        Self {
            name: "script-downloader".to_string(),
            command: command.into(),
            args,
            output_dir,
            validator: InputValidator::new(),
        }
    }

    fn playlist_dir(&self, source: &str) -> Result<PathBuf> {
        let id = self.validator.playlist_id(source)?;
        Ok(self.output_dir.join(sanitize_filename(&id)))
    }

    fn forward(line: &str, link: &WorkerLink) {
        if line.trim().is_empty() {
            return;
        }
        match Event::from_json_line(line) {
            // The helper has no business stopping the session on our behalf.
            Ok(Event::Terminate) => log::debug!("Ignoring terminate message from helper"),
            Ok(event) => {
                link.send(event);
            }
            Err(e) => log::warn!("Skipping helper output {:?}: {}", line, e),
        }
    }
}

#[async_trait]
impl PlaylistWorker for ScriptDownloader {
    fn validate(&self, source: &str) -> bool {
        self.validator.validate_playlist_url(source).is_ok()
    }

    async fn run(&self, source: &str, link: &mut WorkerLink) -> Result<()> {
        let target_dir = self.playlist_dir(source)?;
        ensure_dir_exists(&target_dir).await?;

        log::info!("Started downloading {} into {:?}", source, target_dir);

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg("--output")
            .arg(&target_dir)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::WorkerFailure(format!("Failed to start {}: {}", self.command, e)))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("helper: {}", line);
                }
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::WorkerFailure("helper stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        // Stdout is read to the end before waiting on the process, and the
        // terminate signal is honoured in both phases.
        let mut stdout_open = true;
        let status = loop {
            tokio::select! {
                biased;
                _ = link.terminated() => {
                    log::info!("Terminate received, stopping helper");
                    if let Err(e) = child.kill().await {
                        log::warn!("Failed to kill helper: {}", e);
                    }
                    return Ok(());
                }
                line = lines.next_line(), if stdout_open => match line? {
                    Some(line) => Self::forward(&line, link),
                    None => stdout_open = false,
                },
                status = child.wait(), if !stdout_open => break status?,
            }
        };

        if !status.success() {
            return Err(AppError::WorkerFailure(format!("helper exited with {}", status)));
        }

        log::info!("Finished downloading {}", source);
        Ok(())
    }

    fn get_name(&self) -> &str {
        &self.name
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::progress::{channel, Received};

    const PLAYLIST: &str = "https://open.spotify.com/playlist/05MWSPxUUWA0d238WFvkKA";

    fn shell(script: &str, output_dir: PathBuf) -> ScriptDownloader {
        // `sh -c <script> <$0> <$1..>`: the helper's own arguments land in $0..$2.
        ScriptDownloader::new("sh", vec!["-c".to_string(), script.to_string()], output_dir)
    }

    fn drain(consumer: &mut crate::progress::ConsumerLink) -> Vec<Event> {
        let mut events = Vec::new();
        while let Received::Event(event) = consumer.try_receive() {
            events.push(event);
        }
        events
    }

    #[test]
    fn validates_with_playlist_rules() {
        let worker = shell("true", PathBuf::from("."));
        assert!(worker.validate(PLAYLIST));
        assert!(!worker.validate("https://example.com/playlist"));
    }

    #[tokio::test]
    async fn relays_helper_messages() {
        let dir = tempfile::tempdir().unwrap();
        let worker = shell(
            r#"echo '{"type": "song_title", "contents": "Song A"}'
               echo 'garbage'
               echo '{"type": "eta_update", "contents": ["eta", 42]}'
               echo '{"type": "progress", "contents": [1, 1]}'"#,
            dir.path().to_path_buf(),
        );
        let (mut link, mut consumer) = channel();

        worker.run(PLAYLIST, &mut link).await.unwrap();

        assert_eq!(
            drain(&mut consumer),
            vec![
                Event::track_title("Song A"),
                Event::eta_update("eta", 42),
                Event::progress(1, 1),
            ]
        );
        assert!(dir.path().join("05MWSPxUUWA0d238WFvkKA").is_dir());
    }

    #[tokio::test]
    async fn failing_helper_is_a_worker_failure() {
        let dir = tempfile::tempdir().unwrap();
        let worker = shell("exit 3", dir.path().to_path_buf());
        let (mut link, _consumer) = channel();

        let err = worker.run(PLAYLIST, &mut link).await.unwrap_err();
        assert!(matches!(err, AppError::WorkerFailure(_)));
    }

    #[tokio::test]
    async fn terminate_reaches_helper_after_stdout_closes() {
        let dir = tempfile::tempdir().unwrap();
        let worker = shell("exec 1>&-; sleep 30", dir.path().to_path_buf());
        let (mut link, consumer) = channel();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            consumer.send_terminate();
            consumer
        });

        let started = std::time::Instant::now();
        worker.run(PLAYLIST, &mut link).await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        drop(stopper.await.unwrap());
    }

    #[tokio::test]
    async fn terminate_kills_helper() {
        let dir = tempfile::tempdir().unwrap();
        let worker = shell(
            r#"echo '{"type": "progress", "contents": [0, 5]}'
               sleep 30"#,
            dir.path().to_path_buf(),
        );
        let (mut link, mut consumer) = channel();
        consumer.send_terminate();

        let started = std::time::Instant::now();
        worker.run(PLAYLIST, &mut link).await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
