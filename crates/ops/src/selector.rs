//! Choosing one cached binary out of many
//!
//! Candidates come from the scanner, are validated concurrently and then
//! either auto-selected, offered in a prompt, or rejected when no choice can
//! be made without an operator.

use devnet_errors::{CacheError, Error};
use devnet_events::{AppEvent, CacheEvent, EventEmitter, EventSender};
use devnet_store::{
    scan_all_networks, scan_cached_binaries, summarize_failures, BinaryCache, BinaryValidator,
    ScanReport,
};
use devnet_types::{BinarySelectionResult, CachedBinaryMetadata};
use dialoguer::{theme::ColorfulTheme, Select};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Operator interaction used when more than one choice is possible
pub trait SelectionPrompt: Send + Sync {
    /// Whether a terminal is attached that can answer prompts
    fn is_interactive(&self) -> bool;

    /// Ask for one of `options`; `None` when the operator dismissed the prompt
    ///
    /// # Errors
    /// Returns an error if the terminal interaction fails.
    fn choose(&self, title: &str, options: &[String]) -> Result<Option<usize>, Error>;
}

/// Terminal prompt on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompt;

impl SelectionPrompt for DialoguerPrompt {
    fn is_interactive(&self) -> bool {
        console::Term::stderr().features().is_attended()
    }

    fn choose(&self, title: &str, options: &[String]) -> Result<Option<usize>, Error> {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(title)
            .items(options)
            .default(0)
            .interact_opt()
            .map_err(|e| {
                CacheError::PromptFailed {
                    message: e.to_string(),
                }
                .into()
            })
    }
}

/// Prompt for scripted use; never asks
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl SelectionPrompt for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    fn choose(&self, _title: &str, _options: &[String]) -> Result<Option<usize>, Error> {
        Err(CacheError::NotInteractive.into())
    }
}

/// Selection policy
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    /// Offer building from source; upgrades turn this off
    pub allow_build_from_source: bool,
    /// Pick the only valid candidate without prompting
    pub auto_select_single: bool,
    /// Version offered for a source build
    pub build_version: Option<String>,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            allow_build_from_source: false,
            auto_select_single: true,
            build_version: None,
        }
    }
}

/// Turns cached candidates into a single [`BinarySelectionResult`]
#[derive(Clone)]
pub struct BinarySelector {
    validator: BinaryValidator,
    prompt: Arc<dyn SelectionPrompt>,
    options: SelectorOptions,
    tx: Option<EventSender>,
}

impl EventEmitter for BinarySelector {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl BinarySelector {
    #[must_use]
    pub fn new(
        validator: BinaryValidator,
        prompt: Arc<dyn SelectionPrompt>,
        options: SelectorOptions,
    ) -> Self {
        Self {
            validator,
            prompt,
            options,
            tx: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn validator(&self) -> &BinaryValidator {
        &self.validator
    }

    #[must_use]
    pub fn options(&self) -> &SelectorOptions {
        &self.options
    }

    /// Scan the cache for this network, falling back to every network when
    /// it has no candidates, and report skipped entries
    ///
    /// # Errors
    /// Returns an error if the scan is cancelled or the cache is unreadable.
    pub async fn discover(
        &self,
        cancel: &CancellationToken,
        cache: &BinaryCache,
    ) -> Result<Vec<CachedBinaryMetadata>, Error> {
        self.emit(AppEvent::Cache(CacheEvent::ScanStarted {
            network_type: Some(cache.network_type().to_string()),
            cache_dir: cache.root().to_path_buf(),
        }));
        let mut report = scan_cached_binaries(
            cancel,
            cache.root(),
            cache.network_type(),
            cache.binary_name(),
        )
        .await?;

        if report.binaries.is_empty() {
            self.emit(AppEvent::Cache(CacheEvent::ScanFallbackAllNetworks {
                network_type: cache.network_type().to_string(),
            }));
            report = scan_all_networks(cancel, cache.root(), cache.binary_name()).await?;
        }

        self.report_scan(&report);
        Ok(report.binaries)
    }

    fn report_scan(&self, report: &ScanReport) {
        for skipped in &report.skipped {
            self.emit(AppEvent::Cache(CacheEvent::EntrySkipped {
                path: skipped.path.clone(),
                reason: skipped.reason.clone(),
            }));
        }
        self.emit(AppEvent::Cache(CacheEvent::ScanCompleted {
            found: report.binaries.len(),
            skipped: report.skipped.len(),
        }));
    }

    /// Validate candidates concurrently and report each outcome
    ///
    /// # Errors
    /// Returns `Error::Cancelled` if validation is interrupted.
    pub async fn validate(
        &self,
        cancel: &CancellationToken,
        candidates: Vec<CachedBinaryMetadata>,
    ) -> Result<Vec<CachedBinaryMetadata>, Error> {
        self.emit(AppEvent::Cache(CacheEvent::ValidationStarted {
            candidates: candidates.len(),
        }));
        let started = Instant::now();
        let validated = self.validator.validate_all(cancel, candidates).await?;

        for binary in &validated {
            if binary.is_valid {
                self.emit(AppEvent::Cache(CacheEvent::BinaryValidated {
                    commit_hash_short: binary.commit_hash_short.clone(),
                    version: binary.detected_version.clone(),
                }));
            } else {
                self.emit(AppEvent::Cache(CacheEvent::BinaryInvalid {
                    commit_hash_short: binary.commit_hash_short.clone(),
                    reason: binary
                        .validation_error
                        .clone()
                        .unwrap_or_else(|| "invalid".to_string()),
                }));
            }
        }

        let valid = validated.iter().filter(|b| b.is_valid).count();
        self.emit(AppEvent::Cache(CacheEvent::ValidationCompleted {
            valid,
            invalid: validated.len() - valid,
            duration: started.elapsed(),
        }));
        Ok(validated)
    }

    /// Discover, validate and choose
    ///
    /// # Errors
    /// See [`Self::choose`].
    pub async fn select(
        &self,
        cancel: &CancellationToken,
        cache: &BinaryCache,
    ) -> Result<BinarySelectionResult, Error> {
        let candidates = self.discover(cancel, cache).await?;
        if candidates.is_empty() {
            return self.nothing_usable(
                CacheError::NoCachedBinaries {
                    binary_name: cache.binary_name().to_string(),
                }
                .into(),
            );
        }
        let validated = self.validate(cancel, candidates).await?;
        self.choose(&validated)
    }

    /// Choose among already validated candidates (most recent first)
    ///
    /// # Errors
    /// Returns `AllInvalid` when nothing valid remains and building is not
    /// allowed, `AmbiguousSelection` when several candidates remain and no
    /// terminal is attached, or a prompt failure.
    pub fn choose(&self, validated: &[CachedBinaryMetadata]) -> Result<BinarySelectionResult, Error> {
        let valid: Vec<&CachedBinaryMetadata> = validated.iter().filter(|b| b.is_valid).collect();

        if valid.is_empty() {
            let err = if validated.is_empty() {
                CacheError::NoCachedBinaries {
                    binary_name: "binary".to_string(),
                }
            } else {
                CacheError::AllInvalid {
                    found: validated.len(),
                    reasons: summarize_failures(validated),
                }
            };
            return self.nothing_usable(err.into());
        }

        if valid.len() == 1 && self.options.auto_select_single {
            let binary = valid[0].clone();
            self.emit(AppEvent::Cache(CacheEvent::BinaryAutoSelected {
                commit_hash_short: binary.commit_hash_short.clone(),
                git_ref: binary.git_ref.clone(),
                version: binary.detected_version.clone(),
            }));
            return Ok(BinarySelectionResult::Selected {
                binary: Box::new(binary),
                auto_selected: true,
            });
        }

        if !self.prompt.is_interactive() {
            return Err(CacheError::AmbiguousSelection { count: valid.len() }.into());
        }

        let mut options: Vec<String> = valid.iter().map(|b| b.display_label()).collect();
        let build_version = self.build_offer();
        if let Some(version) = &build_version {
            options.push(format!("Build {version} from source"));
        }

        match self.prompt.choose("Select a binary", &options)? {
            None => Ok(BinarySelectionResult::Cancelled),
            Some(index) if index < valid.len() => {
                let binary = valid[index].clone();
                self.emit(AppEvent::Cache(CacheEvent::BinarySelected {
                    commit_hash_short: binary.commit_hash_short.clone(),
                    git_ref: binary.git_ref.clone(),
                }));
                Ok(BinarySelectionResult::Selected {
                    binary: Box::new(binary),
                    auto_selected: false,
                })
            }
            Some(_) => match build_version {
                Some(version) => Ok(BinarySelectionResult::Build { version }),
                None => Err(Error::internal("prompt returned an out-of-range choice")),
            },
        }
    }

    fn build_offer(&self) -> Option<String> {
        if self.options.allow_build_from_source {
            self.options.build_version.clone()
        } else {
            None
        }
    }

    fn nothing_usable(&self, err: Error) -> Result<BinarySelectionResult, Error> {
        match self.build_offer() {
            Some(version) => Ok(BinarySelectionResult::Build { version }),
            None => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use devnet_platform::TokioCommandExecutor;
    use devnet_types::{CacheKey, ConfigHash};
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct ScriptedPrompt {
        answer: Option<usize>,
        seen: Mutex<Vec<String>>,
    }

    impl SelectionPrompt for ScriptedPrompt {
        fn is_interactive(&self) -> bool {
            true
        }

        fn choose(&self, _title: &str, options: &[String]) -> Result<Option<usize>, Error> {
            self.seen.lock().unwrap().extend(options.iter().cloned());
            Ok(self.answer)
        }
    }

    fn candidate(n: u8, valid: bool, age_minutes: i64) -> CachedBinaryMetadata {
        let commit = format!("{n:02x}").repeat(20);
        let key = CacheKey::new(&commit, ConfigHash::parse("00000000").unwrap()).unwrap();
        let mut meta = CachedBinaryMetadata::new(
            "cosmos",
            &key,
            format!("ref-{n}"),
            Utc::now(),
            1,
            PathBuf::from("/nonexistent"),
            Utc::now() - ChronoDuration::minutes(age_minutes),
        );
        meta.is_valid = valid;
        if !valid {
            meta.validation_error = Some("exited with status 1".to_string());
        }
        meta
    }

    fn selector(prompt: Arc<dyn SelectionPrompt>, options: SelectorOptions) -> BinarySelector {
        BinarySelector::new(
            BinaryValidator::new(Arc::new(TokioCommandExecutor::new())),
            prompt,
            options,
        )
    }

    #[test]
    fn test_single_valid_is_auto_selected() {
        let (tx, mut rx) = devnet_events::channel();
        let s = selector(Arc::new(NonInteractive), SelectorOptions::default()).with_event_sender(tx);
        let result = s.choose(&[candidate(1, true, 0), candidate(2, false, 5)]).unwrap();

        match result {
            BinarySelectionResult::Selected {
                binary,
                auto_selected,
            } => {
                assert!(auto_selected);
                assert_eq!(binary.git_ref, "ref-1");
            }
            other => panic!("unexpected {other:?}"),
        }
        let message = rx.try_recv().unwrap();
        assert!(matches!(
            message.event,
            AppEvent::Cache(CacheEvent::BinaryAutoSelected { .. })
        ));
    }

    #[test]
    fn test_zero_candidates_without_build_is_error() {
        let s = selector(Arc::new(NonInteractive), SelectorOptions::default());
        let err = s.choose(&[]).unwrap_err();
        assert!(matches!(err, Error::Cache(CacheError::NoCachedBinaries { .. })));
    }

    #[test]
    fn test_all_invalid_reports_reasons() {
        let s = selector(Arc::new(NonInteractive), SelectorOptions::default());
        let err = s
            .choose(&[candidate(1, false, 0), candidate(2, false, 1)])
            .unwrap_err();
        match err {
            Error::Cache(CacheError::AllInvalid { found, reasons }) => {
                assert_eq!(found, 2);
                assert!(reasons.contains("exited with status 1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_build_offered_when_allowed() {
        let options = SelectorOptions {
            allow_build_from_source: true,
            auto_select_single: true,
            build_version: Some("v0.50.10".to_string()),
        };
        let s = selector(Arc::new(NonInteractive), options);
        let result = s.choose(&[candidate(1, false, 0)]).unwrap();
        assert_eq!(
            result,
            BinarySelectionResult::Build {
                version: "v0.50.10".to_string()
            }
        );
    }

    #[test]
    fn test_ambiguous_without_terminal() {
        let s = selector(Arc::new(NonInteractive), SelectorOptions::default());
        let err = s
            .choose(&[candidate(1, true, 0), candidate(2, true, 1)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Cache(CacheError::AmbiguousSelection { count: 2 })
        ));
    }

    #[test]
    fn test_interactive_choice_and_cancel() {
        let prompt = Arc::new(ScriptedPrompt {
            answer: Some(1),
            seen: Mutex::new(Vec::new()),
        });
        let s = selector(prompt.clone(), SelectorOptions::default());
        let candidates = [candidate(1, true, 0), candidate(2, true, 1)];
        let result = s.choose(&candidates).unwrap();
        assert_eq!(result.selected().unwrap().git_ref, "ref-2");
        assert_eq!(prompt.seen.lock().unwrap().len(), 2);

        let dismissed = Arc::new(ScriptedPrompt {
            answer: None,
            seen: Mutex::new(Vec::new()),
        });
        let s = selector(dismissed, SelectorOptions::default());
        assert!(s.choose(&candidates).unwrap().was_cancelled());
    }
}
