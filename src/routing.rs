//! Host-based routing of `{site}.{base-domain}` requests.
//!
//! A request for `brand.example.com/about?x=1` is rewritten to
//! `/s/brand/about?x=1` before route matching. The apex, `www`, reserved
//! subdomains, platform preview hosts and requests already aimed at an
//! internal route are left untouched.

use std::sync::Arc;

use crate::config::SiteConfig;
use crate::slug;

/// Canonical read route for published content.
pub const READ_PREFIX: &str = "/s";
/// Read route for drafts.
pub const PREVIEW_PREFIX: &str = "/preview";
/// Internal API routes.
pub const API_PREFIX: &str = "/api";

/// Routing decision for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Serve `path_and_query` instead of the original target.
    Rewrite { site: String, path_and_query: String },
    PassThrough,
}

/// Maps request hosts to sites.
#[derive(Debug, Clone)]
pub struct SiteRouter {
    config: Arc<SiteConfig>,
}

impl SiteRouter {
    pub fn new(config: Arc<SiteConfig>) -> Self {
        Self { config }
    }

    /// Decide how to route a request for `host` with target `path_and_query`.
    pub fn route(&self, host: &str, path_and_query: &str) -> Route {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        if is_internal(path) {
            return Route::PassThrough;
        }

        let Some(site) = self.site_for_host(host) else {
            return Route::PassThrough;
        };

        let mut target = format!("{READ_PREFIX}/{site}");
        let rest = path.trim_start_matches('/');
        if !rest.is_empty() {
            target.push('/');
            target.push_str(rest);
        }
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }
        Route::Rewrite {
            site,
            path_and_query: target,
        }
    }

    /// Site identifier encoded in `host`, if any.
    pub fn site_for_host(&self, host: &str) -> Option<String> {
        let host = strip_port(host.trim()).trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }

        if self
            .config
            .preview_host_suffixes
            .iter()
            .any(|suffix| host.ends_with(suffix.as_str()))
        {
            return None;
        }

        let sub = self.config.base_domains.iter().find_map(|base| {
            host.strip_suffix(base.as_str())
                .and_then(|rest| rest.strip_suffix('.'))
        })?;

        // `www.{base}` is the main site; `www.{site}.{base}` is the site.
        let sub = sub.strip_prefix("www.").unwrap_or(sub);
        if sub.is_empty() || sub.contains('.') {
            return None;
        }
        if self.config.is_reserved(sub) || !slug::is_valid(sub) {
            return None;
        }
        Some(sub.to_string())
    }
}

fn is_internal(path: &str) -> bool {
    [API_PREFIX, READ_PREFIX, PREVIEW_PREFIX].iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
