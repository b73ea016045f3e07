//! Per-site fetch scheduling.
//!
//! Every host gets its own bounded queue, rate limiter, worker gate and
//! health counter, created on the first URL for that host. A process-wide
//! semaphore additionally caps concurrent network calls across all hosts.
//! Every outcome is published on one shared channel.

mod limits;
mod site;

pub use self::limits::SiteLimits;
pub use self::site::{SiteHealth, EMPTY_BODY_MESSAGE};

use log::{debug, info};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock, Semaphore};

use self::site::SiteWorker;
use crate::cache::RecipeCache;
use crate::config::{ScanConfig, SchedulerConfig, SiteOverride};
use crate::error::ScanError;
use crate::fetch::Transport;
use crate::model::RecipeRecord;
use crate::pipelines::RecipeScraper;

/// State shared by the scheduler handle and every site worker.
pub(crate) struct Shared {
    config: SchedulerConfig,
    sites_config: HashMap<String, SiteOverride>,
    transport: Arc<dyn Transport>,
    scraper: RecipeScraper,
    cache: Option<RecipeCache>,
    global: Semaphore,
    replies: mpsc::Sender<RecipeRecord>,
}

impl Shared {
    async fn reply(&self, record: RecipeRecord) {
        if self.replies.send(record).await.is_err() {
            debug!("result receiver dropped, discarding record");
        }
    }
}

struct SiteQueue {
    sender: mpsc::Sender<String>,
    worker: Arc<SiteWorker>,
}

/// Accepts URLs from any number of callers and routes each to its host's queue.
///
/// Cloning is cheap; all clones feed the same queues and the same output channel.
#[derive(Clone)]
pub struct SiteScheduler {
    shared: Arc<Shared>,
    sites: Arc<RwLock<HashMap<String, SiteQueue>>>,
}

impl SiteScheduler {
    /// Build a scheduler and the receiving end of its result channel.
    ///
    /// Must be called from within a Tokio runtime; site loops are spawned on
    /// first use of each host.
    pub fn new(config: &ScanConfig, transport: Arc<dyn Transport>) -> (Self, mpsc::Receiver<RecipeRecord>) {
        Self::with_scraper(config, transport, RecipeScraper::default())
    }

    pub fn with_scraper(
        config: &ScanConfig,
        transport: Arc<dyn Transport>,
        scraper: RecipeScraper,
    ) -> (Self, mpsc::Receiver<RecipeRecord>) {
        let (replies, receiver) = mpsc::channel(config.scheduler.reply_capacity.max(1));
        let shared = Shared {
            config: config.scheduler.clone(),
            sites_config: config.sites.clone(),
            transport,
            scraper,
            cache: config
                .cache
                .enabled
                .then(|| RecipeCache::new(config.cache.max_entries)),
            global: Semaphore::new(config.scheduler.global_max_workers.max(1)),
            replies,
        };
        info!(
            "scheduler ready: {} global workers, {} per site",
            config.scheduler.global_max_workers, config.scheduler.site_max_workers
        );

        let scheduler = Self {
            shared: Arc::new(shared),
            sites: Arc::new(RwLock::new(HashMap::new())),
        };
        (scheduler, receiver)
    }

    /// Queue `url` on its host's queue.
    ///
    /// Returns once the URL is buffered; waits only when that host's queue is
    /// full. The outcome arrives later on the result channel.
    pub async fn site_get_recipe(&self, url: &str) -> Result<(), ScanError> {
        let host = host_of(url)?;
        let sender = self.site_sender(&host).await;
        sender
            .send(url.to_string())
            .await
            .map_err(|_| ScanError::QueueClosed(host))
    }

    async fn site_sender(&self, host: &str) -> mpsc::Sender<String> {
        if let Some(site) = self.sites.read().await.get(host) {
            return site.sender.clone();
        }

        let mut sites = self.sites.write().await;
        // another caller may have created it while we waited for the write lock
        if let Some(site) = sites.get(host) {
            return site.sender.clone();
        }

        let limits = SiteLimits::for_host(host, &self.shared.config, &self.shared.sites_config);
        let (sender, queue) = mpsc::channel(self.shared.config.queue_capacity.max(1));
        let worker = Arc::new(SiteWorker::new(host.to_string(), limits, Arc::clone(&self.shared)));
        tokio::spawn(Arc::clone(&worker).run(queue));
        info!("{}: new site queue", host);

        sites.insert(
            host.to_string(),
            SiteQueue {
                sender: sender.clone(),
                worker,
            },
        );
        sender
    }

    /// Health of a host's queue, if one has been created.
    pub async fn site_health(&self, host: &str) -> Option<SiteHealth> {
        self.sites.read().await.get(host).map(|site| site.worker.health())
    }

    /// Limits in force for a host's queue, if one has been created.
    pub async fn site_limits(&self, host: &str) -> Option<SiteLimits> {
        self.sites.read().await.get(host).map(|site| site.worker.limits())
    }

    pub async fn site_count(&self) -> usize {
        self.sites.read().await.len()
    }
}

/// The host component that keys a site queue.
pub fn host_of(url: &str) -> Result<String, ScanError> {
    let parsed = Url::parse(url).map_err(|e| ScanError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .host_str()
        .map(|host| host.to_ascii_lowercase())
        .ok_or_else(|| ScanError::MissingHost(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://Example.com/recipe/1").unwrap(), "example.com");
        assert_eq!(host_of("http://127.0.0.1:8080/x").unwrap(), "127.0.0.1");
        assert!(matches!(host_of("not a url"), Err(ScanError::InvalidUrl { .. })));
        assert!(matches!(host_of("data:text/plain,hi"), Err(ScanError::MissingHost(_))));
    }
}
