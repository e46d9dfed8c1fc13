//! Operations context for dependency injection

use crate::export::CliGenesisExporter;
use crate::governance::{CliGovernanceClient, TxSettings};
use crate::network::{ChainCli, CosmosModule, NetworkModule};
use crate::nodes::ExecutorNodeController;
use crate::selector::{BinarySelector, DialoguerPrompt, SelectionPrompt, SelectorOptions};
use crate::upgrade::{ConservativeHeightPlanner, UpgradeDeps, UpgradeOrchestrator};
use devnet_config::Config;
use devnet_errors::Error;
use devnet_events::{EventEmitter, EventSender};
use devnet_net::{CometRpcClient, NetClient, NetConfig, RpcClient};
use devnet_platform::{CommandExecutor, TokioCommandExecutor};
use devnet_state::{ActivationManager, DevnetRepository, FileDevnetRepository};
use devnet_store::{BinaryCache, BinaryValidator};
use std::sync::Arc;

/// Operations context providing access to all system components
pub struct OpsCtx {
    /// Loaded configuration
    pub config: Config,
    /// Binary cache for the configured network
    pub cache: BinaryCache,
    /// Active binary pointer
    pub activation: ActivationManager,
    /// Devnet metadata store
    pub repository: Arc<dyn DevnetRepository>,
    pub executor: Arc<dyn CommandExecutor>,
    pub rpc: Arc<dyn RpcClient>,
    pub network: Arc<dyn NetworkModule>,
    pub prompt: Arc<dyn SelectionPrompt>,
    /// Event sender for progress reporting
    pub tx: EventSender,
}

impl OpsCtx {
    // No public constructor - use OpsContextBuilder instead

    /// Validator configured from the cache settings
    #[must_use]
    pub fn validator(&self) -> BinaryValidator {
        BinaryValidator::new(self.executor.clone())
            .with_timeout(self.config.cache.validation_timeout())
            .with_version_args(self.config.cache.version_args.clone())
    }

    #[must_use]
    pub fn selector(&self, options: SelectorOptions) -> BinarySelector {
        BinarySelector::new(self.validator(), self.prompt.clone(), options)
            .with_event_sender(self.tx.clone())
    }

    /// Wire an orchestrator against the devnet as it is recorded now
    ///
    /// # Errors
    /// Returns an error if the devnet metadata cannot be loaded.
    pub async fn upgrade_orchestrator(&self) -> Result<UpgradeOrchestrator, Error> {
        let devnet = self.repository.load().await?;
        let cli = ChainCli::for_devnet(
            &devnet,
            self.network.as_ref(),
            &self.activation.pointer_path(),
        );
        let chain = &self.config.chain;
        let settings = TxSettings {
            chain_id: chain.chain_id.clone().unwrap_or(devnet.chain_id),
            node_url: chain.rpc_url.clone(),
            keyring_backend: chain.keyring_backend.clone(),
            fees: chain.fees.clone(),
            deposit: chain.deposit.clone(),
        };
        let upgrade = self.config.upgrade.clone();

        let deps = UpgradeDeps {
            rpc: self.rpc.clone(),
            governance: Arc::new(
                CliGovernanceClient::new(self.executor.clone(), cli, settings)
                    .with_poll_interval(upgrade.poll_interval()),
            ),
            nodes: Arc::new(ExecutorNodeController::new(
                self.executor.clone(),
                self.network.clone(),
                upgrade.stop_grace(),
                self.config.logs_dir(),
            )),
            exporter: Arc::new(CliGenesisExporter::new(
                self.executor.clone(),
                self.config.exports_dir(),
            )),
            repository: self.repository.clone(),
            network: self.network.clone(),
            planner: Arc::new(ConservativeHeightPlanner {
                min_margin_blocks: upgrade.safety_margin_blocks,
                margin_ratio: upgrade.safety_margin_ratio,
            }),
            cache: self.cache.clone(),
            activation: self.activation.clone(),
            selector: self.selector(SelectorOptions {
                allow_build_from_source: false,
                auto_select_single: self.config.cache.auto_select_single,
                build_version: None,
            }),
        };
        Ok(UpgradeOrchestrator::new(deps, upgrade, Some(self.tx.clone())))
    }
}

impl EventEmitter for OpsCtx {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

/// Builder for operations context
///
/// Only the configuration and the event sender are required; every other
/// component defaults to the real implementation derived from the config.
pub struct OpsContextBuilder {
    config: Option<Config>,
    tx: Option<EventSender>,
    executor: Option<Arc<dyn CommandExecutor>>,
    rpc: Option<Arc<dyn RpcClient>>,
    repository: Option<Arc<dyn DevnetRepository>>,
    network: Option<Arc<dyn NetworkModule>>,
    prompt: Option<Arc<dyn SelectionPrompt>>,
}

impl OpsContextBuilder {
    /// Create new context builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            tx: None,
            executor: None,
            rpc: None,
            repository: None,
            network: None,
            prompt: None,
        }
    }

    /// Set configuration
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set event sender
    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    #[must_use]
    pub fn with_rpc(mut self, rpc: Arc<dyn RpcClient>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    #[must_use]
    pub fn with_repository(mut self, repository: Arc<dyn DevnetRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn with_network(mut self, network: Arc<dyn NetworkModule>) -> Self {
        self.network = Some(network);
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn SelectionPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Build the context
    ///
    /// # Errors
    ///
    /// Returns an error if the config or event sender is missing, or the
    /// HTTP client cannot be created.
    pub fn build(self) -> Result<OpsCtx, Error> {
        let config = self
            .config
            .ok_or_else(|| Error::internal("ops context requires a config"))?;
        let tx = self
            .tx
            .ok_or_else(|| Error::internal("ops context requires an event sender"))?;

        let network = self
            .network
            .unwrap_or_else(|| Arc::new(CosmosModule::from_config(&config.chain)));
        let rpc = match self.rpc {
            Some(rpc) => rpc,
            None => {
                let net = NetClient::new(NetConfig::from(&config.network))?;
                Arc::new(CometRpcClient::new(
                    net,
                    &config.chain.rpc_url,
                    &config.chain.rest_url,
                ))
            }
        };
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(FileDevnetRepository::new(config.metadata_path())));
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(TokioCommandExecutor::new()));
        let prompt = self.prompt.unwrap_or_else(|| Arc::new(DialoguerPrompt));

        let cache = BinaryCache::new(
            config.cache_root(),
            network.network_type(),
            network.binary_name(),
        );
        let activation = ActivationManager::new(config.bin_dir(), network.binary_name())
            .with_event_sender(tx.clone());

        Ok(OpsCtx {
            config,
            cache,
            activation,
            repository,
            executor,
            rpc,
            network,
            prompt,
            tx,
        })
    }
}

impl Default for OpsContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
