use log::{debug, warn};
use reqwest::StatusCode;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Semaphore};

use super::limits::{SiteLimits, SiteRateLimiter};
use super::Shared;
use crate::fetch::decode::decode_body;
use crate::model::RecipeRecord;

pub const EMPTY_BODY_MESSAGE: &str = "Website closed connection before any data sent";

/// Consecutive transport failures for one host and the latest reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteHealth {
    pub consecutive_failures: u32,
    pub last_failure: Option<String>,
}

impl SiteHealth {
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(message.into());
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure = None;
    }

    /// The message to report when the host has failed more than `threshold`
    /// times in a row.
    pub fn tripped(&self, threshold: u32) -> Option<String> {
        (self.consecutive_failures > threshold).then(|| {
            self.last_failure
                .clone()
                .unwrap_or_else(|| "too many transport failures".to_string())
        })
    }
}

/// Everything one host's queue loop and its fetch tasks share.
pub(super) struct SiteWorker {
    host: String,
    limits: SiteLimits,
    limiter: SiteRateLimiter,
    workers: Arc<Semaphore>,
    health: Mutex<SiteHealth>,
    shared: Arc<Shared>,
}

impl SiteWorker {
    pub(super) fn new(host: String, limits: SiteLimits, shared: Arc<Shared>) -> Self {
        Self {
            limiter: limits.rate_limiter(),
            workers: Arc::new(Semaphore::new(limits.max_workers)),
            health: Mutex::new(SiteHealth::default()),
            host,
            limits,
            shared,
        }
    }

    pub(super) fn limits(&self) -> SiteLimits {
        self.limits
    }

    pub(super) fn health(&self) -> SiteHealth {
        self.health.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update_health(&self, update: impl FnOnce(&mut SiteHealth)) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut *health);
    }

    /// Drain this host's queue for the life of the scheduler. URLs are taken in
    /// submission order; each one runs in its own task once a worker slot and
    /// a rate-limit token are available. Health is checked after the slot is
    /// held, so it reflects every fetch that has released one.
    pub(super) async fn run(self: Arc<Self>, mut queue: mpsc::Receiver<String>) {
        debug!("{}: queue started ({:?})", self.host, self.limits);

        while let Some(url) = queue.recv().await {
            if let Some(hit) = self.shared.cache.as_ref().and_then(|cache| cache.get(&url)) {
                debug!("{}: cache hit", url);
                self.shared.reply(hit).await;
                continue;
            }

            let Ok(permit) = Arc::clone(&self.workers).acquire_owned().await else {
                break;
            };

            if let Some(message) = self.health().tripped(self.shared.config.failure_threshold) {
                drop(permit);
                warn!("{}: host is failing, skipping {}", self.host, url);
                let record = RecipeRecord::failure(&url, StatusCode::SERVICE_UNAVAILABLE.as_u16(), message);
                self.shared.reply(record).await;
                continue;
            }

            self.limiter.until_ready().await;

            let site = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                let record = site.fetch_and_extract(&url).await;
                if let Some(cache) = &site.shared.cache {
                    cache.insert(&record);
                }
                site.shared.reply(record).await;
            });
        }

        debug!("{}: queue closed", self.host);
    }

    /// One URL's fetch transaction, retried for outcomes that often succeed on
    /// a second try. The global slot is held only around the network call.
    async fn fetch_and_extract(&self, url: &str) -> RecipeRecord {
        let max_attempts = self.shared.config.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=max_attempts {
            let fetched = {
                let Ok(_global) = self.shared.global.acquire().await else {
                    break;
                };
                self.shared.transport.fetch(url).await
            };

            let response = match fetched {
                Ok(response) => response,
                Err(e) => {
                    warn!("{}: attempt {} transport error: {}", url, attempt, e);
                    let status = if e.is_timeout() {
                        StatusCode::GATEWAY_TIMEOUT
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    self.update_health(|h| h.record_failure(e.to_string()));
                    last = Some(RecipeRecord::failure(url, status.as_u16(), e.to_string()));
                    continue;
                }
            };

            match StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR) {
                StatusCode::OK => {
                    let body = match decode_body(response.content_encoding(), &response.body) {
                        Ok(body) => body,
                        Err(e) => {
                            warn!("{}: {}", url, e);
                            return RecipeRecord::failure(
                                url,
                                StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                                e.to_string(),
                            );
                        }
                    };
                    if body.is_empty() {
                        debug!("{}: attempt {} returned an empty body", url, attempt);
                        self.update_health(|h| h.record_failure(EMPTY_BODY_MESSAGE));
                        last = Some(RecipeRecord::failure(
                            url,
                            StatusCode::LENGTH_REQUIRED.as_u16(),
                            EMPTY_BODY_MESSAGE,
                        ));
                        continue;
                    }

                    self.update_health(SiteHealth::record_success);
                    return self
                        .shared
                        .scraper
                        .scrape_recipe(url, &body, response.content_type());
                }
                StatusCode::FORBIDDEN | StatusCode::LENGTH_REQUIRED => {
                    debug!("{}: attempt {} got {}", url, attempt, response.status);
                    last = Some(http_status_failure(url, response.status));
                }
                _ => return http_status_failure(url, response.status),
            }
        }

        last.unwrap_or_else(|| {
            RecipeRecord::failure(url, StatusCode::SERVICE_UNAVAILABLE.as_u16(), "scheduler is shutting down")
        })
    }
}

fn http_status_failure(url: &str, status: u16) -> RecipeRecord {
    RecipeRecord::failure(url, status, format!("HTTP status code {}", status))
}
