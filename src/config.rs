//! Site configuration and the builder that wires a [`Publisher`] together.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{PublishError, Result};
use crate::publisher::Publisher;
use crate::storage::ObjectStore;

/// Subdomains that never map to a site.
pub const DEFAULT_RESERVED: &[&str] = &["www", "api", "crm", "preview", "s"];

/// Runtime configuration shared by every component.
///
/// Built through [`PublisherBuilder`]; nothing here is read from the process
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Domains under which `{site}.{domain}` hosts are routed. The first one
    /// is used when building public site URLs.
    pub base_domains: Vec<String>,
    /// Public URL of this service, used for canonical and preview links.
    pub public_base_url: String,
    /// Leftmost labels that are never treated as site identifiers.
    pub reserved_subdomains: Vec<String>,
    /// Host suffixes of platform-internal preview deployments.
    pub preview_host_suffixes: Vec<String>,
    /// `max-age` for published pages.
    pub published_max_age: Duration,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_domains: Vec::new(),
            public_base_url: "http://127.0.0.1:8080".into(),
            reserved_subdomains: DEFAULT_RESERVED.iter().map(|s| s.to_string()).collect(),
            preview_host_suffixes: Vec::new(),
            published_max_age: Duration::from_secs(60),
        }
    }
}

impl SiteConfig {
    pub fn primary_domain(&self) -> Option<&str> {
        self.base_domains.first().map(String::as_str)
    }

    pub fn is_reserved(&self, label: &str) -> bool {
        self.reserved_subdomains.iter().any(|r| r == label)
    }
}

/// Builder for configuring a [`Publisher`] over an [`ObjectStore`].
///
/// # Example
///
/// ```rust
/// use site_publisher::{MemoryStorage, PublisherBuilder};
/// use std::time::Duration;
///
/// let publisher = PublisherBuilder::new(MemoryStorage::new())
///     .base_domain("example.com")
///     .public_base_url("https://publish.example.com")
///     .preview_host_suffix(".preview.example.net")
///     .published_max_age(Duration::from_secs(120))
///     .build()
///     .unwrap();
/// assert_eq!(publisher.config().primary_domain(), Some("example.com"));
/// ```
pub struct PublisherBuilder<S: ObjectStore> {
    store: Arc<S>,
    config: SiteConfig,
}

impl<S: ObjectStore> PublisherBuilder<S> {
    /// Create a new builder with the given store and default settings.
    ///
    /// Defaults: no base domains, public URL `http://127.0.0.1:8080`,
    /// reserved subdomains `www api crm preview s`, no preview suffixes,
    /// published max-age 60 s.
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Like [`new`](Self::new) for a store that is already shared.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            config: SiteConfig::default(),
        }
    }

    /// Add a domain whose subdomains are routed to sites.
    pub fn base_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.base_domains.push(domain.into());
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.public_base_url = url.into();
        self
    }

    /// Add a subdomain to the reserved set.
    pub fn reserve_subdomain(mut self, label: impl Into<String>) -> Self {
        self.config.reserved_subdomains.push(label.into());
        self
    }

    /// Hosts ending in `suffix` (e.g. `.vercel.app`) are never rewritten.
    pub fn preview_host_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.preview_host_suffixes.push(suffix.into());
        self
    }

    pub fn published_max_age(mut self, max_age: Duration) -> Self {
        self.config.published_max_age = max_age;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SiteConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and assemble the [`Publisher`].
    pub fn build(self) -> Result<Publisher<S>> {
        let config = normalize(self.config)?;
        Ok(Publisher::new(self.store, Arc::new(config)))
    }
}

fn normalize(mut config: SiteConfig) -> Result<SiteConfig> {
    let mut domains = Vec::with_capacity(config.base_domains.len());
    for raw in &config.base_domains {
        let domain = raw.trim().trim_matches('.').to_lowercase();
        if domain.is_empty() || !domain.contains('.') {
            return Err(PublishError::Config(format!(
                "base domain {raw:?} must have at least two labels"
            )));
        }
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    config.base_domains = domains;

    let base = config.public_base_url.trim().trim_end_matches('/').to_string();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(PublishError::Config(format!(
            "public base URL {:?} must be http(s)",
            config.public_base_url
        )));
    }
    config.public_base_url = base;

    for label in &mut config.reserved_subdomains {
        *label = label.trim().to_lowercase();
    }
    for suffix in &mut config.preview_host_suffixes {
        *suffix = suffix.trim().to_lowercase();
    }
    config.preview_host_suffixes.retain(|s| !s.is_empty());
    Ok(config)
}
