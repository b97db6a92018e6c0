// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proxy-aware HTTP transport.
//
// The proxy and its credentials belong to the client built here; nothing is
// installed process-wide, so two clients with different preferences never
// see each other's proxy.

use std::time::Duration;

use chancela_core::config::{ClientSettings, Preferences, ProxyConfig};
use chancela_core::error::{ChancelaError, Result};
use reqwest::{Client, Proxy};
use tracing::{debug, instrument};

/// Operators often paste a full URL into the proxy address field.
const PASTED_SCHEME: &str = "http://";

/// `http://host:port` for an active proxy, `None` for a direct connection.
pub fn proxy_url(proxy: &ProxyConfig) -> Option<String> {
    if !proxy.is_active() {
        return None;
    }
    let host = proxy
        .address
        .trim()
        .trim_start_matches(PASTED_SCHEME)
        .trim_end_matches('/');
    Some(format!("http://{host}:{}", proxy.port))
}

/// Build an HTTP client for `prefs`, with the settings' timeouts.
#[instrument(skip_all, fields(proxied = prefs.proxy().is_some_and(ProxyConfig::is_active)))]
pub fn build_transport(prefs: &Preferences, settings: &ClientSettings) -> Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .user_agent(format!("chancela/{}", settings.app_version));

    match prefs.proxy().and_then(|p| proxy_url(p).map(|url| (p, url))) {
        Some((proxy, url)) => {
            let mut route = Proxy::all(&url)
                .map_err(|e| ChancelaError::Configuration(format!("invalid proxy {url}: {e}")))?;
            if proxy.requires_auth {
                route = route.basic_auth(
                    proxy.user.as_deref().unwrap_or_default(),
                    proxy.password.as_deref().unwrap_or_default(),
                );
            }
            debug!(proxy = %url, authenticated = proxy.requires_auth, "routing through proxy");
            builder = builder.proxy(route);
        }
        None => {
            builder = builder.no_proxy();
        }
    }

    builder
        .build()
        .map_err(|e| ChancelaError::Configuration(format!("HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chancela_core::config::UserConfig;

    fn proxy(address: &str) -> ProxyConfig {
        ProxyConfig {
            address: address.into(),
            port: 3128,
            ..Default::default()
        }
    }

    #[test]
    fn pasted_scheme_is_stripped() {
        assert_eq!(
            proxy_url(&proxy("http://proxy.local")).as_deref(),
            Some("http://proxy.local:3128")
        );
        assert_eq!(
            proxy_url(&proxy("proxy.local/")).as_deref(),
            Some("http://proxy.local:3128")
        );
    }

    #[test]
    fn blank_address_means_direct() {
        assert_eq!(proxy_url(&proxy("")), None);
        assert_eq!(proxy_url(&proxy("   ")), None);
    }

    #[test]
    fn builds_direct_and_authenticated_transports() {
        let settings = ClientSettings::default();
        build_transport(&Preferences::default(), &settings).expect("direct");

        let prefs = Preferences::new(UserConfig {
            proxy: Some(ProxyConfig {
                requires_auth: true,
                user: Some("ana".into()),
                password: Some("s3cret".into()),
                ..proxy("http://10.0.0.1")
            }),
            ..Default::default()
        });
        build_transport(&prefs, &settings).expect("proxied");
    }
}
