//! Login URL construction.

use crate::config::UrlSettings;

/// First candidate that is present and non-blank, without a trailing slash.
pub fn resolve_base_url<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|c| c.trim().trim_end_matches('/').to_string())
        .find(|c| !c.is_empty())
}

impl UrlSettings {
    /// Base URL in priority order: explicit setting, CMS setting, then the
    /// current site's domain over HTTPS.
    pub fn resolved_base_url(&self) -> Option<String> {
        let site = self
            .site_domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| format!("https://{d}"));
        resolve_base_url([self.base_url.clone(), self.cms_base_url.clone(), site])
    }

    /// Path at which `token` is redeemed.
    pub fn login_path(&self, token: &str) -> String {
        format!("{}/{token}/", self.route_prefix)
    }

    /// Full redemption URL, or the bare path when no base URL resolves.
    pub fn login_url(&self, token: &str) -> String {
        let path = self.login_path(token);
        match self.resolved_base_url() {
            Some(base) => format!("{base}{path}"),
            None => path,
        }
    }
}
