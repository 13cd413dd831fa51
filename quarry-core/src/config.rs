use crate::{ErrorContext, ErrorKind, Result, error};
use std::{env, time::Duration};
use url::Url;
use urlencoding::decode;

/// Behaviour of the dispatch layer shared by every result set of a [`crate::Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Serve identical reads from the dispatch cache. Result sets can override it with the `cache` attribute.
    pub cache: bool,
    /// How long a cached read stays valid.
    pub cache_ttl: Duration,
    /// Maximum number of cached reads, the oldest entry is evicted first.
    pub cache_capacity: usize,
    /// Log every payload at debug level.
    pub log_payloads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: false,
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 1024,
            log_payloads: true,
        }
    }
}

impl Config {
    pub const SCHEME: &'static str = "quarry";

    /// Parse `quarry://?cache=true&cache_ttl_ms=500&cache_capacity=64&log_payloads=false`.
    ///
    /// Every parameter that is missing from the url falls back to the
    /// environment variable `QUARRY_<PARAMETER>` and then to the default.
    pub fn from_url(url: &str) -> Result<Config> {
        let context = || format!("While decoding the configuration url `{}`", url);
        let url = decode(url).with_context(context)?;
        let prefix = format!("{}://", Self::SCHEME);
        if !url.starts_with(&prefix) {
            let e = error(
                ErrorKind::Validation,
                format!("Configuration url must start with `{}`", prefix),
            )
            .context(context());
            log::error!("{:#}", e);
            return Err(e);
        }
        let url = Url::parse(&url).with_context(context)?;
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut take_param = |key: &str| {
            let value = pairs
                .iter()
                .position(|(k, _)| k == key)
                .map(|i| pairs.remove(i).1);
            value.or_else(|| env::var(format!("QUARRY_{}", key.to_ascii_uppercase())).ok())
        };
        let mut config = Config::default();
        if let Some(v) = take_param("cache") {
            config.cache = parse_bool(&v).with_context(context)?;
        }
        if let Some(v) = take_param("cache_ttl_ms") {
            let ms = v
                .parse::<u64>()
                .with_context(|| format!("`cache_ttl_ms` must be an integer, found `{v}`"))?;
            config.cache_ttl = Duration::from_millis(ms);
        }
        if let Some(v) = take_param("cache_capacity") {
            config.cache_capacity = v
                .parse::<usize>()
                .with_context(|| format!("`cache_capacity` must be an integer, found `{v}`"))?;
        }
        if let Some(v) = take_param("log_payloads") {
            config.log_payloads = parse_bool(&v).with_context(context)?;
        }
        if let Some((key, _)) = pairs.first() {
            return Err(error(
                ErrorKind::Validation,
                format!("Unknown configuration parameter `{key}`"),
            ));
        }
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(error(
            ErrorKind::Validation,
            format!("Expected a boolean, found `{value}`"),
        )),
    }
}
