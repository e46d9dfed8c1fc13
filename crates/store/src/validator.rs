//! Executability and version checks for cached binaries
//!
//! Each candidate is run once with the configured version arguments under a
//! fixed timeout. All candidates run concurrently, so total latency is
//! bounded by the timeout rather than by the number of candidates.

use devnet_errors::{Error, PlatformError, UserFacingError};
use devnet_platform::{CommandExecutor, PlatformCommand};
use devnet_types::CachedBinaryMetadata;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Default time a binary gets to report its version
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Build details a binary reports about itself with `version --long`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildIdentity {
    pub commit: Option<String>,
    pub version: Option<String>,
}

/// Runs cached binaries to confirm they execute
#[derive(Clone)]
pub struct BinaryValidator {
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
    version_args: Vec<String>,
}

impl BinaryValidator {
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            timeout: DEFAULT_VALIDATION_TIMEOUT,
            version_args: vec!["version".to_string()],
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_version_args(mut self, args: Vec<String>) -> Self {
        self.version_args = args;
        self
    }

    /// Run one candidate and record the outcome on its metadata
    ///
    /// Never fails: timeouts, spawn errors and non-zero exits are recorded in
    /// `is_valid`/`validation_error` so the caller can report them.
    pub async fn validate_and_enrich(
        &self,
        cancel: &CancellationToken,
        mut metadata: CachedBinaryMetadata,
    ) -> CachedBinaryMetadata {
        let outcome = tokio::select! {
            () = cancel.cancelled() => Err("validation cancelled".to_string()),
            outcome = self.run_version(&metadata) => outcome,
        };

        match outcome {
            Ok(version) => {
                metadata.is_valid = true;
                metadata.validation_error = None;
                metadata.detected_version = version;
            }
            Err(reason) => {
                metadata.is_valid = false;
                metadata.validation_error = Some(reason);
                metadata.detected_version = None;
            }
        }
        metadata
    }

    /// Validate every candidate concurrently
    ///
    /// Results are fanned in through a single channel and returned sorted by
    /// `mod_time`, most recent first. Invalid entries are kept.
    ///
    /// # Errors
    /// Returns `Error::Cancelled` if `cancel` fires before all results arrive.
    pub async fn validate_all(
        &self,
        cancel: &CancellationToken,
        candidates: Vec<CachedBinaryMetadata>,
    ) -> Result<Vec<CachedBinaryMetadata>, Error> {
        let expected = candidates.len();
        let (tx, mut rx) = mpsc::channel(expected.max(1));
        let mut tasks = JoinSet::new();

        for candidate in candidates {
            let validator = self.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let enriched = validator.validate_and_enrich(&cancel, candidate).await;
                let _ = tx.send(enriched).await;
            });
        }
        // Drop the original sender so the channel closes when every task is done
        drop(tx);

        let mut results = Vec::with_capacity(expected);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(Error::Cancelled);
                }
                received = rx.recv() => match received {
                    Some(enriched) => results.push(enriched),
                    None => break,
                },
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "validation task did not complete");
            }
        }

        sort_by_recency(&mut results);
        Ok(results)
    }

    /// Ask `binary` which commit and version it was built from
    ///
    /// # Errors
    /// Returns an error if the binary cannot be run, times out or exits
    /// unsuccessfully.
    pub async fn identify(&self, binary: &Path) -> Result<BuildIdentity, Error> {
        let cmd = PlatformCommand::new(binary.to_string_lossy()).args(["version", "--long"]);
        let output = tokio::time::timeout(self.timeout, self.executor.run(&cmd))
            .await
            .map_err(|_| PlatformError::ProcessExecutionFailed {
                command: cmd.display(),
                message: format!("timed out after {}s", self.timeout.as_secs_f32()),
            })??
            .into_success(&cmd)?;
        Ok(parse_long_version(&output.stdout_str()))
    }

    async fn run_version(&self, metadata: &CachedBinaryMetadata) -> Result<Option<String>, String> {
        if !devnet_platform::fs::is_executable_file(&metadata.path).await {
            return Err(format!("{} is not an executable file", metadata.path.display()));
        }

        let cmd = PlatformCommand::new(metadata.path.to_string_lossy()).args(&self.version_args);

        let output = match tokio::time::timeout(self.timeout, self.executor.run(&cmd)).await {
            Err(_) => return Err(format!("timed out after {}s", self.timeout.as_secs_f32())),
            Ok(Err(e)) => return Err(e.user_message().into_owned()),
            Ok(Ok(output)) => output,
        };

        if !output.success() {
            let stderr = output.stderr_str();
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(if stderr.is_empty() {
                format!("exited with status {code}")
            } else {
                format!("exited with status {code}: {}", first_line(&stderr))
            });
        }

        // Some binaries print their version on stderr
        let stdout = output.stdout_str();
        let text = if stdout.is_empty() {
            output.stderr_str()
        } else {
            stdout
        };
        let version = first_line(&text);
        Ok((!version.is_empty()).then(|| version.to_string()))
    }
}

fn parse_long_version(text: &str) -> BuildIdentity {
    let field = |name: &str| {
        text.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == name)
                .then(|| value.trim().trim_matches('"').to_string())
                .filter(|v| !v.is_empty())
        })
    };
    BuildIdentity {
        commit: field("commit"),
        version: field("version"),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

/// Most recently built or downloaded first; ties broken by commit for determinism
pub fn sort_by_recency(binaries: &mut [CachedBinaryMetadata]) {
    binaries.sort_by(|a, b| {
        b.mod_time
            .cmp(&a.mod_time)
            .then_with(|| a.commit_hash.cmp(&b.commit_hash))
    });
}

/// Summarize why every candidate failed, for "all failed validation" errors
#[must_use]
pub fn summarize_failures(binaries: &[CachedBinaryMetadata]) -> String {
    binaries
        .iter()
        .filter(|b| !b.is_valid)
        .map(|b| {
            format!(
                "{}: {}",
                b.commit_hash_short,
                b.validation_error.as_deref().unwrap_or("invalid")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_version() {
        let text = "name: simd\nserver_name: simd\nversion: v0.50.10\ncommit: A1B2C3D4E5F6A1B2C3D4E5F6A1B2C3D4E5F6A1B2\nbuild_tags: netgo\n";
        let identity = parse_long_version(text);
        assert_eq!(
            identity.commit.as_deref(),
            Some("A1B2C3D4E5F6A1B2C3D4E5F6A1B2C3D4E5F6A1B2")
        );
        assert_eq!(identity.version.as_deref(), Some("v0.50.10"));

        assert_eq!(parse_long_version("version: \"\"\n"), BuildIdentity::default());
    }
}
