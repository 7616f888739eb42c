//! Callback URLs derived from the current host name.

use crate::config::AuthConfig;
use crate::constants::paths;

const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone)]
pub struct Redirects {
    production_url: String,
    development_url: String,
}

impl Redirects {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            production_url: config.production_url.trim_end_matches('/').to_string(),
            development_url: config.development_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn site_origin(&self, hostname: &str) -> &str {
        let host = hostname.trim().trim_start_matches('[').trim_end_matches(']');
        if LOCAL_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h)) {
            &self.development_url
        } else {
            &self.production_url
        }
    }

    /// Landing page after a password-reset link.
    #[must_use]
    pub fn admin_redirect_url(&self, hostname: &str) -> String {
        format!("{}{}", self.site_origin(hostname), paths::ADMIN)
    }

    /// Landing page for the sign-up confirmation link.
    #[must_use]
    pub fn email_callback_url(&self, hostname: &str) -> String {
        format!("{}{}", self.site_origin(hostname), paths::AUTH_CALLBACK)
    }
}
