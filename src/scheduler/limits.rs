use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::{SchedulerConfig, SiteOverride};

const UNLIMITED_PER_SECOND: NonZeroU32 = match NonZeroU32::new(1_000_000) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

pub type SiteRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Built-in pacing for hosts known to throttle or block eager clients.
/// Matched against the host and any parent domain.
const BUILTIN_OVERRIDES: &[(&str, SiteOverride)] = &[
    (
        "allrecipes.com",
        SiteOverride {
            rate_period_ms: Some(20_000),
            burst: Some(1),
            max_workers: Some(1),
        },
    ),
    (
        "foodnetwork.com",
        SiteOverride {
            rate_period_ms: Some(15_000),
            burst: Some(1),
            max_workers: Some(2),
        },
    ),
    (
        "yummly.com",
        SiteOverride {
            rate_period_ms: Some(30_000),
            burst: Some(1),
            max_workers: Some(1),
        },
    ),
    (
        "wordpress.com",
        SiteOverride {
            rate_period_ms: Some(2_000),
            burst: Some(2),
            max_workers: Some(4),
        },
    ),
];

/// Resolved pacing for one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteLimits {
    pub rate_period: Duration,
    pub burst: NonZeroU32,
    pub max_workers: usize,
}

impl SiteLimits {
    /// Scheduler defaults, then the built-in list, then configured overrides.
    pub fn for_host(host: &str, defaults: &SchedulerConfig, configured: &HashMap<String, SiteOverride>) -> Self {
        let mut limits = Self {
            rate_period: Duration::from_millis(defaults.site_rate_period_ms),
            burst: NonZeroU32::new(defaults.site_burst).unwrap_or(NonZeroU32::MIN),
            max_workers: defaults.site_max_workers.max(1),
        };

        let host = host.to_ascii_lowercase();
        if let Some((_, site)) = BUILTIN_OVERRIDES
            .iter()
            .find(|(domain, _)| domain_matches(&host, domain))
        {
            limits.apply(site);
        }
        if let Some(site) = configured
            .iter()
            .find(|(domain, _)| host == domain.to_ascii_lowercase())
            .map(|(_, site)| site)
        {
            limits.apply(site);
        }
        limits
    }

    fn apply(&mut self, site: &SiteOverride) {
        if let Some(ms) = site.rate_period_ms {
            self.rate_period = Duration::from_millis(ms);
        }
        if let Some(burst) = site.burst.and_then(NonZeroU32::new) {
            self.burst = burst;
        }
        if let Some(workers) = site.max_workers {
            self.max_workers = workers.max(1);
        }
    }

    /// A zero period means the site is not rate limited.
    pub fn rate_limiter(&self) -> SiteRateLimiter {
        let quota = Quota::with_period(self.rate_period)
            .map(|q| q.allow_burst(self.burst))
            .unwrap_or_else(|| Quota::per_second(UNLIMITED_PER_SECOND));
        RateLimiter::direct(quota)
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_unknown_host() {
        let limits = SiteLimits::for_host("example.com", &SchedulerConfig::default(), &HashMap::new());
        assert_eq!(limits.rate_period, Duration::from_secs(10));
        assert_eq!(limits.burst.get(), 1);
        assert_eq!(limits.max_workers, 4);
    }

    #[test]
    fn test_builtin_override_matches_subdomains() {
        let limits = SiteLimits::for_host("www.allrecipes.com", &SchedulerConfig::default(), &HashMap::new());
        assert_eq!(limits.max_workers, 1);
        assert_eq!(limits.rate_period, Duration::from_secs(20));

        let limits = SiteLimits::for_host("notallrecipes.com", &SchedulerConfig::default(), &HashMap::new());
        assert_eq!(limits.max_workers, 4);
    }

    #[test]
    fn test_configured_override_wins() {
        let mut sites = HashMap::new();
        sites.insert(
            "www.allrecipes.com".to_string(),
            SiteOverride {
                rate_period_ms: None,
                burst: None,
                max_workers: Some(3),
            },
        );
        let limits = SiteLimits::for_host("www.allrecipes.com", &SchedulerConfig::default(), &sites);
        assert_eq!(limits.max_workers, 3);
        assert_eq!(limits.rate_period, Duration::from_secs(20));
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let defaults = SchedulerConfig {
            site_rate_period_ms: 0,
            site_burst: 0,
            site_max_workers: 0,
            ..SchedulerConfig::default()
        };
        let limits = SiteLimits::for_host("example.com", &defaults, &HashMap::new());
        assert_eq!(limits.burst.get(), 1);
        assert_eq!(limits.max_workers, 1);
        let limiter = limits.rate_limiter();
        for _ in 0..100 {
            assert!(limiter.check().is_ok());
        }
    }

    #[test]
    fn test_rate_limiter_enforces_burst() {
        let limits = SiteLimits {
            rate_period: Duration::from_secs(60),
            burst: NonZeroU32::new(2).unwrap(),
            max_workers: 1,
        };
        let limiter = limits.rate_limiter();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
