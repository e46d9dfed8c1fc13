//! The upgrade state machine

use super::height::{BlockTimeSampler, HeightPlan, HeightPlanner};
use super::stage::{StageHandle, StageTracker};
use super::{ExecuteUpgradeInput, ExecuteUpgradeOutput};
use crate::export::GenesisExporter;
use crate::gov_params::GovParamsResolver;
use crate::governance::{GovernanceClient, UpgradeProposal};
use crate::network::{ChainCli, NetworkModule};
use crate::nodes::{NodeController, NodeLaunch};
use crate::selector::BinarySelector;
use devnet_config::UpgradeConfig;
use devnet_errors::{CacheError, ChainError, Error, UpgradeError, UserFacingError};
use devnet_events::{
    AppEvent, CacheEvent, EventEmitter, EventMeta, EventSender, FailureContext, UpgradeEvent,
};
use devnet_net::RpcClient;
use devnet_state::{ActivationManager, DevnetRepository};
use devnet_store::{BinaryCache, BuildIdentity, BuildInfo};
use devnet_types::{
    is_valid_commit_hash, BinarySelectionResult, CacheKey, CachedBinaryMetadata, ConfigHash,
    DevnetMetadata, ExecutionMode, ProposalStatus, UpgradeStage,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Collaborators of an [`UpgradeOrchestrator`]
///
/// Every chain or process interaction goes through one of these so runs can
/// be driven against fakes.
pub struct UpgradeDeps {
    pub rpc: Arc<dyn RpcClient>,
    pub governance: Arc<dyn GovernanceClient>,
    pub nodes: Arc<dyn NodeController>,
    pub exporter: Arc<dyn GenesisExporter>,
    pub repository: Arc<dyn DevnetRepository>,
    pub network: Arc<dyn NetworkModule>,
    pub planner: Arc<dyn HeightPlanner>,
    pub cache: BinaryCache,
    pub activation: ActivationManager,
    pub selector: BinarySelector,
}

/// What the nodes will run after the switch
#[derive(Debug, Clone)]
enum UpgradeTarget {
    Binary {
        path: PathBuf,
        key: CacheKey,
        version: String,
    },
    Image {
        image: String,
        version: String,
    },
}

impl UpgradeTarget {
    fn reference(&self) -> String {
        match self {
            Self::Binary { path, .. } => path.display().to_string(),
            Self::Image { image, .. } => image.clone(),
        }
    }

    fn version(&self) -> &str {
        match self {
            Self::Binary { version, .. } | Self::Image { version, .. } => version,
        }
    }

    fn from_cached(binary: &CachedBinaryMetadata, version: Option<&String>) -> Result<Self, Error> {
        Ok(Self::Binary {
            path: binary.path.clone(),
            key: binary.cache_key()?,
            version: version
                .cloned()
                .or_else(|| binary.detected_version.clone())
                .unwrap_or_else(|| binary.git_ref.clone()),
        })
    }
}

/// Drives one devnet through a software upgrade
///
/// The governance path resolves the voting period, plans an upgrade height,
/// submits an expedited proposal, votes with every validator, waits for the
/// chain to halt at the height and then swaps the binary. The direct path
/// skips everything up to the swap.
///
/// Devnet metadata is only rewritten after the chain resumed on the new
/// binary.
pub struct UpgradeOrchestrator {
    deps: UpgradeDeps,
    settings: UpgradeConfig,
    stage: StageTracker,
    tx: Option<EventSender>,
}

impl EventEmitter for UpgradeOrchestrator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }

    fn enrich_event_meta(&self, event: &AppEvent, meta: &mut EventMeta) {
        self.stage.enrich_event_meta(event, meta);
    }
}

impl UpgradeOrchestrator {
    #[must_use]
    pub fn new(deps: UpgradeDeps, settings: UpgradeConfig, tx: Option<EventSender>) -> Self {
        Self {
            deps,
            settings,
            stage: StageTracker::new(tx.clone()),
            tx,
        }
    }

    /// Live view of the current stage, for interrupt reporting
    #[must_use]
    pub fn stage_handle(&self) -> StageHandle {
        self.stage.handle()
    }

    /// Run the upgrade to completion, failure or cancellation
    ///
    /// Never returns an error directly: the outcome, the last completed
    /// stage and whatever was learned along the way are in the output.
    pub async fn execute(
        &self,
        input: &ExecuteUpgradeInput,
        cancel: &CancellationToken,
    ) -> ExecuteUpgradeOutput {
        let started = Instant::now();
        self.stage.reset(format!(
            "upgrade-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f")
        ));
        self.emit(AppEvent::Upgrade(UpgradeEvent::Started {
            upgrade_name: input.upgrade_name.clone(),
            mode: input.mode,
            skip_governance: input.skip_governance,
        }));

        let mut output = ExecuteUpgradeOutput::default();
        let result = self.run(input, cancel, &mut output).await;
        output.duration = started.elapsed();
        output.last_stage = self.stage.get();

        match result {
            Ok(()) => {
                output.success = true;
                self.emit(AppEvent::Upgrade(UpgradeEvent::Completed {
                    duration: output.duration,
                    post_upgrade_height: output.post_upgrade_height.unwrap_or_default(),
                }));
            }
            Err(e) if e.is_cancelled() => {
                self.emit(AppEvent::Upgrade(UpgradeEvent::Cancelled {
                    stage: output.last_stage,
                }));
                output.error = Some(e);
            }
            Err(e) => {
                tracing::error!(stage = ?output.last_stage, error = %e, "upgrade failed");
                self.emit(AppEvent::Upgrade(UpgradeEvent::Failed {
                    stage: output.last_stage,
                    failure: FailureContext::from_error(&e),
                }));
                output.error = Some(e);
            }
        }
        output
    }

    async fn run(
        &self,
        input: &ExecuteUpgradeInput,
        cancel: &CancellationToken,
        output: &mut ExecuteUpgradeOutput,
    ) -> Result<(), Error> {
        validate_input(input)?;

        let mut devnet = self.deps.repository.load().await?;
        if devnet.validators.is_empty() {
            return Err(UpgradeError::NoValidators.into());
        }
        check_cancelled(cancel)?;

        let target = self.resolve_target(input, cancel).await?;
        output.new_binary = Some(target.reference());
        output.new_version = Some(target.version().to_string());
        tracing::info!(target = %target.reference(), version = target.version(), "upgrade target resolved");

        if input.skip_governance {
            self.run_direct(input, &target, &mut devnet, cancel, output)
                .await
        } else {
            self.run_governance(input, &target, &mut devnet, cancel, output)
                .await
        }
    }

    async fn resolve_target(
        &self,
        input: &ExecuteUpgradeInput,
        cancel: &CancellationToken,
    ) -> Result<UpgradeTarget, Error> {
        match input.mode {
            ExecutionMode::Docker => self.resolve_image(input),
            ExecutionMode::Local => self.resolve_binary(input, cancel).await,
        }
    }

    fn resolve_image(&self, input: &ExecuteUpgradeInput) -> Result<UpgradeTarget, Error> {
        if let Some(image) = &input.target_image {
            let version = input.target_version.clone().unwrap_or_else(|| {
                image
                    .rsplit_once(':')
                    .map_or_else(|| "latest".to_string(), |(_, tag)| tag.to_string())
            });
            return Ok(UpgradeTarget::Image {
                image: image.clone(),
                version,
            });
        }
        let Some(version) = &input.target_version else {
            return Err(UpgradeError::MissingTarget.into());
        };
        let image = self.deps.network.image_for_version(version).ok_or_else(|| {
            UpgradeError::BuildUnavailable {
                reference: version.clone(),
                message: "no published image exists for this version".to_string(),
            }
        })?;
        Ok(UpgradeTarget::Image {
            image,
            version: version.clone(),
        })
    }

    async fn resolve_binary(
        &self,
        input: &ExecuteUpgradeInput,
        cancel: &CancellationToken,
    ) -> Result<UpgradeTarget, Error> {
        if let Some(path) = &input.target_binary {
            let binary = self.import_binary(input, path, cancel).await?;
            let binary = self.validate_one(cancel, binary).await?;
            return UpgradeTarget::from_cached(&binary, input.target_version.as_ref());
        }

        if let Some(reference) = &input.cache_ref {
            let found = if looks_like_commit(reference) {
                self.deps.cache.find_by_commit(cancel, reference).await?
            } else {
                self.deps.cache.find_by_ref(cancel, reference).await?
            };
            let binary = found.ok_or_else(|| CacheError::CommitNotCached {
                commit: reference.clone(),
            })?;
            let binary = self.validate_one(cancel, binary).await?;
            return UpgradeTarget::from_cached(&binary, input.target_version.as_ref());
        }

        if let Some(version) = &input.target_version {
            return match self.deps.cache.find_by_ref(cancel, version).await? {
                Some(binary) => {
                    let binary = self.validate_one(cancel, binary).await?;
                    UpgradeTarget::from_cached(&binary, Some(version))
                }
                None => Err(UpgradeError::BuildUnavailable {
                    reference: version.clone(),
                    message: "no cached binary was built from this ref".to_string(),
                }
                .into()),
            };
        }

        match self.deps.selector.select(cancel, &self.deps.cache).await? {
            BinarySelectionResult::Selected { binary, .. } => {
                UpgradeTarget::from_cached(&binary, None)
            }
            BinarySelectionResult::Build { version } => Err(UpgradeError::BuildUnavailable {
                reference: version,
                message: "building from source is not available during an upgrade".to_string(),
            }
            .into()),
            BinarySelectionResult::Cancelled => Err(Error::Cancelled),
        }
    }

    /// Store an explicitly given binary so it is activated from the cache
    async fn import_binary(
        &self,
        input: &ExecuteUpgradeInput,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<CachedBinaryMetadata, Error> {
        if !devnet_platform::fs::is_executable_file(path).await {
            return Err(CacheError::MissingTarget {
                path: path.display().to_string(),
            }
            .into());
        }

        let identity = match &input.target_commit {
            Some(_) => BuildIdentity::default(),
            None => match self.deps.selector.validator().identify(path).await {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::debug!(binary = %path.display(), error = %e, "no build identity");
                    BuildIdentity::default()
                }
            },
        };
        let commit_hash = input
            .target_commit
            .clone()
            .or(identity.commit)
            .map(|c| c.to_ascii_lowercase())
            .filter(|c| is_valid_commit_hash(c))
            .ok_or_else(|| UpgradeError::InvalidInput {
                message: format!(
                    "cannot tell which commit {} was built from; pass --commit",
                    path.display()
                ),
            })?;

        let info = BuildInfo {
            commit_hash,
            config_hash: ConfigHash::from_build_settings::<&str, &str>(&[]),
            git_ref: input
                .target_version
                .clone()
                .or(identity.version)
                .unwrap_or_else(|| "unknown".to_string()),
            build_time: chrono::Utc::now(),
        };
        let created = !self
            .deps
            .cache
            .exists(&CacheKey::new(&info.commit_hash, info.config_hash.clone())?)
            .await;
        let key = self.deps.cache.store(path, &info).await?;
        let stored = self.deps.cache.path(&key);
        self.emit(AppEvent::Cache(CacheEvent::BinaryStored {
            cache_key: key.to_string(),
            path: stored.clone(),
            created,
        }));

        self.deps
            .cache
            .scan(cancel)
            .await?
            .binaries
            .into_iter()
            .find(|b| b.cache_key().is_ok_and(|k| k == key))
            .ok_or_else(|| {
                CacheError::MissingTarget {
                    path: stored.display().to_string(),
                }
                .into()
            })
    }

    async fn validate_one(
        &self,
        cancel: &CancellationToken,
        binary: CachedBinaryMetadata,
    ) -> Result<CachedBinaryMetadata, Error> {
        let validated = self.deps.selector.validate(cancel, vec![binary]).await?;
        match validated.into_iter().next() {
            Some(binary) if binary.is_valid => Ok(binary),
            Some(binary) => Err(CacheError::AllInvalid {
                found: 1,
                reasons: binary
                    .validation_error
                    .unwrap_or_else(|| "invalid".to_string()),
            }
            .into()),
            None => Err(Error::internal("validation returned no result")),
        }
    }

    async fn run_governance(
        &self,
        input: &ExecuteUpgradeInput,
        target: &UpgradeTarget,
        devnet: &mut DevnetMetadata,
        cancel: &CancellationToken,
        output: &mut ExecuteUpgradeOutput,
    ) -> Result<(), Error> {
        self.stage.set(UpgradeStage::ResolvingGovParams);
        let gov = GovParamsResolver::new(
            self.deps.rpc.clone(),
            self.deps.network.gov_params_provider(),
        )
        .with_event_sender(self.tx.clone())
        .resolve(cancel, input.force_voting_period, input.voting_period)
        .await?;

        let current_height = cancellable(cancel, self.deps.rpc.get_height()).await?;
        let block_time = self.average_block_time(cancel, current_height).await?;
        let plan = self.deps.planner.plan(
            current_height,
            gov.voting_period(),
            block_time,
            input.height_buffer,
        );
        self.emit(AppEvent::Upgrade(UpgradeEvent::Plan {
            current_height: plan.current_height,
            upgrade_height: plan.upgrade_height,
            voting_period: plan.voting_period,
            average_block_time: plan.average_block_time,
            margin_blocks: plan.margin_blocks,
        }));
        output.upgrade_height = Some(plan.upgrade_height);
        self.stage.set(UpgradeStage::PlanPrinted);
        check_cancelled(cancel)?;

        let proposer = devnet
            .validators
            .first()
            .cloned()
            .ok_or(UpgradeError::NoValidators)?;
        let proposal = UpgradeProposal {
            name: input.upgrade_name.clone(),
            height: plan.upgrade_height,
            title: format!("Upgrade to {}", target.version()),
            summary: format!(
                "Software upgrade {} to {} at height {}",
                input.upgrade_name,
                target.version(),
                plan.upgrade_height
            ),
            proposer,
        };
        let proposal_id = cancellable(
            cancel,
            self.deps.governance.submit_upgrade_proposal(&proposal),
        )
        .await?;
        output.proposal_id = Some(proposal_id);
        self.emit(AppEvent::Upgrade(UpgradeEvent::ProposalSubmitted {
            proposal_id,
            upgrade_height: plan.upgrade_height,
        }));
        self.stage.set(UpgradeStage::ProposalSubmitted);

        self.stage.set(UpgradeStage::VotingInProgress);
        for validator in &devnet.validators {
            cancellable(cancel, self.deps.governance.vote_yes(validator, proposal_id)).await?;
            self.emit(AppEvent::Upgrade(UpgradeEvent::VoteCast {
                validator: validator.name.clone(),
                proposal_id,
            }));
        }

        self.stage.set(UpgradeStage::AwaitingUpgradeHeight);
        self.wait_for_upgrade_height(cancel, proposal_id, &plan)
            .await?;

        self.replace_binary(input, target, devnet, cancel, output)
            .await?;

        self.stage.set(UpgradeStage::VerifyingResumption);
        let height = self
            .wait_for_resumption(cancel, plan.upgrade_height)
            .await?;
        output.post_upgrade_height = Some(height);

        self.persist(input, target, devnet).await?;
        self.stage.set(UpgradeStage::Succeeded);
        Ok(())
    }

    async fn run_direct(
        &self,
        input: &ExecuteUpgradeInput,
        target: &UpgradeTarget,
        devnet: &mut DevnetMetadata,
        cancel: &CancellationToken,
        output: &mut ExecuteUpgradeOutput,
    ) -> Result<(), Error> {
        self.emit(AppEvent::Upgrade(UpgradeEvent::SkipGovernanceWarning));

        // A chain that is not reachable right now still gets its binary replaced
        let baseline = match cancellable(cancel, self.deps.rpc.get_height()).await {
            Ok(height) => height,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "no baseline height before direct replacement");
                0
            }
        };

        self.replace_binary(input, target, devnet, cancel, output)
            .await?;

        self.stage.set(UpgradeStage::VerifyingResumption);
        let height = self.wait_for_resumption(cancel, baseline).await?;
        output.post_upgrade_height = Some(height);

        self.persist(input, target, devnet).await?;
        self.stage.set(UpgradeStage::Succeeded);
        Ok(())
    }

    async fn average_block_time(
        &self,
        cancel: &CancellationToken,
        current_height: u64,
    ) -> Result<Duration, Error> {
        let sampler = BlockTimeSampler::new(self.deps.rpc.clone(), self.settings.block_time_samples);
        match cancellable(cancel, sampler.sample(current_height)).await {
            Ok((average, intervals)) => {
                self.emit(AppEvent::Upgrade(UpgradeEvent::BlockTimeSampled {
                    average,
                    samples: usize::try_from(intervals).unwrap_or(usize::MAX),
                }));
                Ok(average)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                let block_time = self.settings.fallback_block_time();
                self.emit(AppEvent::Upgrade(UpgradeEvent::BlockTimeFallback {
                    block_time,
                    reason: e.user_message().into_owned(),
                }));
                Ok(block_time)
            }
        }
    }

    /// Poll until the proposal passed and the chain halted at the upgrade height
    async fn wait_for_upgrade_height(
        &self,
        cancel: &CancellationToken,
        proposal_id: u64,
        plan: &HeightPlan,
    ) -> Result<u64, Error> {
        let target = plan.upgrade_height;
        let blocks = u32::try_from(target.saturating_sub(plan.current_height)).unwrap_or(u32::MAX);
        let budget = plan
            .average_block_time
            .saturating_mul(blocks)
            .saturating_mul(2)
            .max(plan.voting_period)
            + self.settings.proposal_grace();
        let deadline = Instant::now() + budget;

        let mut passed = false;
        let mut last_height = None;
        loop {
            check_cancelled(cancel)?;

            if !passed {
                match cancellable(cancel, self.deps.governance.proposal_status(proposal_id)).await
                {
                    Ok(ProposalStatus::Passed) => {
                        passed = true;
                        self.emit(AppEvent::Upgrade(UpgradeEvent::ProposalPassed { proposal_id }));
                    }
                    Ok(status) if status.is_final_failure() => {
                        return Err(ChainError::ProposalRejected {
                            proposal_id,
                            status: status.to_string(),
                        }
                        .into());
                    }
                    Ok(_) => {}
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => tracing::debug!(error = %e, "proposal status unavailable"),
                }
            }

            match cancellable(cancel, self.deps.rpc.get_height()).await {
                Ok(height) => {
                    if last_height != Some(height) {
                        last_height = Some(height);
                        self.emit(AppEvent::Upgrade(UpgradeEvent::HeightProgress {
                            current: height,
                            target,
                        }));
                    }
                    // Nodes halt once the block before the upgrade height is committed
                    if passed && height + 1 >= target {
                        self.emit(AppEvent::Upgrade(UpgradeEvent::UpgradeHeightReached {
                            height,
                        }));
                        return Ok(height);
                    }
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => tracing::debug!(error = %e, "height unavailable while waiting"),
            }

            if Instant::now() >= deadline {
                let what = if passed {
                    format!("height {target}")
                } else {
                    format!("proposal {proposal_id} to pass")
                };
                return Err(ChainError::WaitTimeout {
                    what,
                    seconds: budget.as_secs(),
                }
                .into());
            }
            self.pause(cancel).await?;
        }
    }

    /// Stop nodes, swap what they run, and start them again
    async fn replace_binary(
        &self,
        input: &ExecuteUpgradeInput,
        target: &UpgradeTarget,
        devnet: &mut DevnetMetadata,
        cancel: &CancellationToken,
        output: &mut ExecuteUpgradeOutput,
    ) -> Result<(), Error> {
        let pointer = self.deps.activation.pointer_path();
        let old_cli = ChainCli::for_devnet(devnet, self.deps.network.as_ref(), &pointer);

        check_cancelled(cancel)?;
        self.stage.set(UpgradeStage::StoppingNodes);
        let stopped = self.deps.nodes.stop_all(devnet).await?;
        self.emit(AppEvent::Upgrade(UpgradeEvent::NodesStopped { count: stopped }));

        if input.with_export {
            output.pre_genesis_path = self.export(devnet, &old_cli, "pre-upgrade").await;
        }

        let (launch, new_cli) = match target {
            UpgradeTarget::Binary { key, .. } => {
                self.deps
                    .activation
                    .switch_to_key(&self.deps.cache, key)
                    .await?;
                (
                    NodeLaunch::Binary(pointer.clone()),
                    ChainCli::Local { binary: pointer },
                )
            }
            UpgradeTarget::Image { image, .. } => (
                NodeLaunch::Image(image.clone()),
                ChainCli::Docker {
                    image: image.clone(),
                },
            ),
        };
        self.emit(AppEvent::Upgrade(UpgradeEvent::BinarySwitched {
            mode: launch.mode(),
            target: target.reference(),
        }));
        self.stage.set(UpgradeStage::BinarySwitched);

        if input.with_export {
            output.post_genesis_path = self.export(devnet, &new_cli, "post-upgrade").await;
        }

        // Nodes are down at this point; restart them even if cancellation was requested
        self.stage.set(UpgradeStage::RestartingNodes);
        let started = self.deps.nodes.start_all(devnet, &launch).await?;
        self.emit(AppEvent::Upgrade(UpgradeEvent::NodesStarted { count: started }));
        // The new pids must be on disk even if the chain never resumes
        self.deps.repository.save(devnet).await
    }

    async fn export(&self, devnet: &DevnetMetadata, cli: &ChainCli, label: &str) -> Option<PathBuf> {
        match self.deps.exporter.export(devnet, cli, label).await {
            Ok(path) => {
                self.emit(AppEvent::Upgrade(UpgradeEvent::GenesisExported {
                    label: label.to_string(),
                    path: path.clone(),
                }));
                Some(path)
            }
            Err(e) => {
                self.emit(AppEvent::Upgrade(UpgradeEvent::ExportFailed {
                    label: label.to_string(),
                    reason: e.user_message().into_owned(),
                }));
                None
            }
        }
    }

    /// Poll until the chain produces a block above `after`
    async fn wait_for_resumption(&self, cancel: &CancellationToken, after: u64) -> Result<u64, Error> {
        let deadline = Instant::now() + self.settings.resumption_timeout();
        let mut last_height = None;
        loop {
            check_cancelled(cancel)?;
            match cancellable(cancel, self.deps.rpc.get_height()).await {
                Ok(height) if height > after => {
                    self.emit(AppEvent::Upgrade(UpgradeEvent::Resumed { height }));
                    return Ok(height);
                }
                Ok(height) => last_height = Some(height),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => tracing::debug!(error = %e, "chain not answering yet"),
            }
            if Instant::now() >= deadline {
                return Err(ChainError::NotResumed {
                    height: last_height.unwrap_or_default(),
                    target: after,
                }
                .into());
            }
            self.pause(cancel).await?;
        }
    }

    async fn persist(
        &self,
        input: &ExecuteUpgradeInput,
        target: &UpgradeTarget,
        devnet: &mut DevnetMetadata,
    ) -> Result<(), Error> {
        let image = match target {
            UpgradeTarget::Image { image, .. } => Some(image.clone()),
            UpgradeTarget::Binary { .. } => None,
        };
        devnet.record_upgrade(target.version(), input.mode, image);
        self.deps.repository.save(devnet).await
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<(), Error> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(self.settings.poll_interval()) => Ok(()),
        }
    }
}

fn validate_input(input: &ExecuteUpgradeInput) -> Result<(), Error> {
    if !input.skip_governance && input.upgrade_name.trim().is_empty() {
        return Err(UpgradeError::MissingUpgradeName.into());
    }
    if !input.skip_governance && !input.force_voting_period && input.voting_period.is_zero() {
        return Err(UpgradeError::InvalidInput {
            message: "voting period must be greater than zero".to_string(),
        }
        .into());
    }
    if input.target_binary.is_some() && input.cache_ref.is_some() {
        return Err(UpgradeError::InvalidInput {
            message: "a target binary and a cache ref cannot both be given".to_string(),
        }
        .into());
    }
    if input.target_commit.is_some() && input.target_binary.is_none() {
        return Err(UpgradeError::InvalidInput {
            message: "a commit only applies to an explicit target binary".to_string(),
        }
        .into());
    }
    match input.mode {
        ExecutionMode::Docker if input.target_binary.is_some() || input.cache_ref.is_some() => {
            Err(UpgradeError::InvalidInput {
                message: "docker mode upgrades to an image, not a local binary".to_string(),
            }
            .into())
        }
        ExecutionMode::Local if input.target_image.is_some() => Err(UpgradeError::InvalidInput {
            message: "local mode upgrades to a binary, not an image".to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

fn looks_like_commit(reference: &str) -> bool {
    (7..=40).contains(&reference.len()) && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), Error> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ExecuteUpgradeInput {
        ExecuteUpgradeInput {
            upgrade_name: "v2".to_string(),
            ..ExecuteUpgradeInput::default()
        }
    }

    #[test]
    fn test_upgrade_name_required_for_governance() {
        let mut input = input();
        input.upgrade_name = "  ".to_string();
        assert!(matches!(
            validate_input(&input),
            Err(Error::Upgrade(UpgradeError::MissingUpgradeName))
        ));

        input.skip_governance = true;
        assert!(validate_input(&input).is_ok());
    }

    #[test]
    fn test_mode_target_mismatch() {
        let mut input = input();
        input.mode = ExecutionMode::Docker;
        input.cache_ref = Some("main".to_string());
        assert!(matches!(
            validate_input(&input),
            Err(Error::Upgrade(UpgradeError::InvalidInput { .. }))
        ));

        let mut input = self::input();
        input.mode = ExecutionMode::Local;
        input.target_image = Some("img:v2".to_string());
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn test_commit_requires_target_binary() {
        let mut input = input();
        input.mode = ExecutionMode::Local;
        input.target_commit = Some("a".repeat(40));
        assert!(matches!(
            validate_input(&input),
            Err(Error::Upgrade(UpgradeError::InvalidInput { .. }))
        ));

        input.target_binary = Some(PathBuf::from("/tmp/simd"));
        assert!(validate_input(&input).is_ok());
    }

    #[test]
    fn test_zero_voting_period_rejected_unless_forced() {
        let mut input = input();
        input.voting_period = Duration::ZERO;
        assert!(validate_input(&input).is_err());
        input.force_voting_period = true;
        assert!(validate_input(&input).is_ok());
    }

    #[test]
    fn test_looks_like_commit() {
        assert!(looks_like_commit("a1b2c3d"));
        assert!(looks_like_commit("a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6a1b2"));
        assert!(!looks_like_commit("main"));
        assert!(!looks_like_commit("abc12"));
        assert!(!looks_like_commit("v1.2.3-rc"));
    }
}
