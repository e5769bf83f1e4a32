//! Per-invocation state shared by the commands.

use crate::Cli;
use slimsnap_core::config::Config;
use slimsnap_core::Tier;
use slimsnap_image::{CompressionEngine, SearchTuning};
use slimsnap_quota::{JsonFileStore, MemoryStore, PolicyEvaluator, QuotaTracker, Scope, SystemClock, UsageStore};
use std::path::PathBuf;
use std::sync::Arc;

pub struct Context {
    pub config: Config,
    pub tier: Tier,
    pub scope: Scope,
    usage_file: Option<PathBuf>,
}

impl Context {
    pub fn new(config: Config, cli: &Cli) -> Self {
        let persist = config.schema.store.persist && !cli.no_persist;
        let usage_file = persist.then(|| {
            cli.usage_file
                .clone()
                .or_else(|| config.schema.store.path.clone())
                .unwrap_or_else(JsonFileStore::default_path)
        });

        Self {
            tier: Tier::from_premium_flag(cli.premium),
            scope: Scope::for_user(cli.user.as_deref()),
            usage_file,
            config,
        }
    }

    pub fn store(&self) -> Arc<dyn UsageStore> {
        match &self.usage_file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using usage file");
                Arc::new(JsonFileStore::new(path))
            }
            None => Arc::new(MemoryStore::new()),
        }
    }

    pub fn tracker(&self) -> QuotaTracker {
        QuotaTracker::new(
            self.store(),
            Arc::new(SystemClock),
            self.scope.clone(),
            self.config.schema.usage,
        )
    }

    pub fn policy(&self) -> PolicyEvaluator {
        PolicyEvaluator::new(self.config.schema.freemium)
    }

    pub fn engine(&self) -> CompressionEngine {
        let compression = &self.config.schema.compression;
        CompressionEngine::new(
            &self.config.schema.freemium,
            SearchTuning {
                max_iterations: compression.max_iterations,
                min_quality: compression.min_search_quality,
            },
            compression.alpha_threshold,
        )
    }
}
