//! Voting period resolution for governance upgrades
//!
//! Priority, highest first: a forced CLI value, a network module that knows
//! its chain's parameters, the generic chain query, and finally the CLI value
//! as a fallback when the chain cannot be queried.

use async_trait::async_trait;
use devnet_errors::{Error, UserFacingError};
use devnet_events::{AppEvent, EventEmitter, EventSender, UpgradeEvent};
use devnet_net::RpcClient;
use devnet_types::{GovParams, GovParamsSource};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Optional capability of a network module with its own parameter source
#[async_trait]
pub trait GovParamsProvider: Send + Sync {
    /// `Ok(None)` when this chain has nothing beyond the generic query
    async fn gov_params(&self) -> Result<Option<GovParams>, Error>;
}

/// Voting period and where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedGovParams {
    pub params: GovParams,
    pub source: GovParamsSource,
}

impl ResolvedGovParams {
    #[must_use]
    pub fn voting_period(&self) -> Duration {
        self.params.expedited_voting_period
    }
}

/// Resolves governance parameters once per upgrade
pub struct GovParamsResolver {
    rpc: Arc<dyn RpcClient>,
    provider: Option<Arc<dyn GovParamsProvider>>,
    tx: Option<EventSender>,
}

impl EventEmitter for GovParamsResolver {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl GovParamsResolver {
    #[must_use]
    pub fn new(rpc: Arc<dyn RpcClient>, provider: Option<Arc<dyn GovParamsProvider>>) -> Self {
        Self {
            rpc,
            provider,
            tx: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: Option<EventSender>) -> Self {
        self.tx = tx;
        self
    }

    /// Resolve the voting period
    ///
    /// Chain query failures are reported and replaced by `cli_value`; they
    /// never fail the upgrade.
    ///
    /// # Errors
    /// Returns `Error::Cancelled` if `cancel` fires during a query.
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        force: bool,
        cli_value: Duration,
    ) -> Result<ResolvedGovParams, Error> {
        let resolved = if force {
            ResolvedGovParams {
                params: GovParams {
                    expedited_voting_period: cli_value,
                },
                source: GovParamsSource::Forced,
            }
        } else {
            self.query(cancel, cli_value).await?
        };

        self.emit(AppEvent::Upgrade(UpgradeEvent::GovParamsResolved {
            voting_period: resolved.voting_period(),
            source: resolved.source,
        }));
        Ok(resolved)
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        cli_value: Duration,
    ) -> Result<ResolvedGovParams, Error> {
        if let Some(provider) = &self.provider {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = provider.gov_params() => outcome,
            };
            match outcome {
                Ok(Some(params)) => {
                    return Ok(ResolvedGovParams {
                        params,
                        source: GovParamsSource::Plugin,
                    })
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "network module query failed, using chain query");
                }
            }
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = self.rpc.get_gov_params() => outcome,
        };
        match outcome {
            Ok(params) => Ok(ResolvedGovParams {
                params,
                source: GovParamsSource::Chain,
            }),
            Err(e) => {
                self.emit(AppEvent::Upgrade(UpgradeEvent::GovParamsFallback {
                    voting_period: cli_value,
                    reason: e.user_message().into_owned(),
                }));
                Ok(ResolvedGovParams {
                    params: GovParams {
                        expedited_voting_period: cli_value,
                    },
                    source: GovParamsSource::Fallback,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use devnet_errors::ChainError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Chain {
        period: Option<Duration>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RpcClient for Chain {
        async fn get_height(&self) -> Result<u64, Error> {
            Ok(1)
        }

        async fn get_block_time(&self, _height: u64) -> Result<DateTime<Utc>, Error> {
            Ok(Utc::now())
        }

        async fn get_gov_params(&self) -> Result<GovParams, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.period
                .map(|p| GovParams {
                    expedited_voting_period: p,
                })
                .ok_or_else(|| ChainError::ConnectionRefused("127.0.0.1:1317".to_string()).into())
        }
    }

    struct Plugin(Option<Duration>);

    #[async_trait]
    impl GovParamsProvider for Plugin {
        async fn gov_params(&self) -> Result<Option<GovParams>, Error> {
            Ok(self.0.map(|p| GovParams {
                expedited_voting_period: p,
            }))
        }
    }

    fn chain(period: Option<Duration>) -> Arc<Chain> {
        Arc::new(Chain {
            period,
            calls: AtomicUsize::new(0),
        })
    }

    const CLI: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_forced_skips_queries() {
        let rpc = chain(Some(Duration::from_secs(10)));
        let resolver = GovParamsResolver::new(rpc.clone(), None);
        let resolved = resolver
            .resolve(&CancellationToken::new(), true, CLI)
            .await
            .unwrap();
        assert_eq!(resolved.source, GovParamsSource::Forced);
        assert_eq!(resolved.voting_period(), CLI);
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plugin_then_chain_then_fallback() {
        let cancel = CancellationToken::new();

        let resolver = GovParamsResolver::new(
            chain(Some(Duration::from_secs(10))),
            Some(Arc::new(Plugin(Some(Duration::from_secs(20))))),
        );
        let resolved = resolver.resolve(&cancel, false, CLI).await.unwrap();
        assert_eq!(resolved.source, GovParamsSource::Plugin);
        assert_eq!(resolved.voting_period(), Duration::from_secs(20));

        let resolver = GovParamsResolver::new(
            chain(Some(Duration::from_secs(10))),
            Some(Arc::new(Plugin(None))),
        );
        let resolved = resolver.resolve(&cancel, false, CLI).await.unwrap();
        assert_eq!(resolved.source, GovParamsSource::Chain);
        assert_eq!(resolved.voting_period(), Duration::from_secs(10));

        let (tx, mut rx) = devnet_events::channel();
        let resolver = GovParamsResolver::new(chain(None), None).with_event_sender(Some(tx));
        let resolved = resolver.resolve(&cancel, false, CLI).await.unwrap();
        assert_eq!(resolved.source, GovParamsSource::Fallback);
        assert_eq!(resolved.voting_period(), CLI);
        assert!(matches!(
            rx.try_recv().unwrap().event,
            AppEvent::Upgrade(UpgradeEvent::GovParamsFallback { .. })
        ));
    }
}
