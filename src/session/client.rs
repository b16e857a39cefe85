//! `reqwest::Client` construction for sessions.
//!
//! Reading the system proxy configuration can panic inside `reqwest` on
//! locked-down hosts (sandboxed macOS runners among them). When it does, the
//! client is built a second time with system discovery disabled and proxies
//! taken from the environment instead.

use std::panic::{AssertUnwindSafe, catch_unwind, set_hook, take_hook};
use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use super::SessionError;
use super::config::SessionConfig;

pub(super) fn build_client(
    config: &SessionConfig,
    cookie_jar: Option<Arc<Jar>>,
) -> Result<Client, SessionError> {
    match try_build_client(config, cookie_jar.clone(), false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            warn!(
                "HTTP client builder panicked while loading system proxy settings; retrying with env-proxy fallback"
            );
            match try_build_client(config, cookie_jar, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Build(error)) => Err(SessionError::Client(error)),
                Err(BuildClientFailure::Panic) => Err(SessionError::ClientPanicked),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(SessionError::Client(error)),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

// `catch_unwind` does not suppress panic-hook stderr output; silence the hook
// while the guarded build runs so recovery stays quiet.
static CLIENT_BUILD_PANIC_HOOK_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn try_build_client(
    config: &SessionConfig,
    cookie_jar: Option<Arc<Jar>>,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let _hook_guard = CLIENT_BUILD_PANIC_HOOK_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let previous_hook = take_hook();
    set_hook(Box::new(|_| {}));
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut builder = base_client_builder(config, cookie_jar);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }));
    set_hook(previous_hook);
    outcome.map_err(|_| BuildClientFailure::Panic)?
}

fn base_client_builder(config: &SessionConfig, cookie_jar: Option<Arc<Jar>>) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.max_connections)
        .gzip(true)
        .user_agent(config.user_agent.clone());
    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    }
    builder
}

const HTTPS_PROXY_VARS: &[&str] = &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"];
const HTTP_PROXY_VARS: &[&str] = &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"];

// Only reached after system proxy discovery panicked.
fn apply_env_proxy_fallback(builder: ClientBuilder) -> ClientBuilder {
    env_proxies(|name| std::env::var(name).ok())
        .into_iter()
        .fold(builder, ClientBuilder::proxy)
}

/// Proxies named by the first non-blank variable per scheme.
fn env_proxies(lookup: impl Fn(&str) -> Option<String>) -> Vec<Proxy> {
    let first_set = |names: &[&str]| {
        names.iter().find_map(|name| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
    };
    let mut proxies = Vec::new();
    if let Some(url) = first_set(HTTPS_PROXY_VARS)
        && let Ok(proxy) = Proxy::https(&url)
    {
        proxies.push(proxy);
    }
    if let Some(url) = first_set(HTTP_PROXY_VARS)
        && let Ok(proxy) = Proxy::http(&url)
    {
        proxies.push(proxy);
    }
    proxies
}
