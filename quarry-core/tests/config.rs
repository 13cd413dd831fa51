#[cfg(test)]
mod tests {
    use quarry_core::{Config, ErrorKind, error_kind};
    use std::time::Duration;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(!config.cache);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_capacity, 1024);
        assert!(config.log_payloads);
    }

    #[test]
    fn from_url() {
        let config = Config::from_url(
            "quarry://?cache=true&cache_ttl_ms=500&cache_capacity=64&log_payloads=off",
        )
        .expect("Valid configuration url");
        assert_eq!(
            config,
            Config {
                cache: true,
                cache_ttl: Duration::from_millis(500),
                cache_capacity: 64,
                log_payloads: false,
            }
        );
        let config = Config::from_url("quarry://?cache=YES").unwrap();
        assert!(config.cache);
    }

    #[test]
    fn from_url_errors() {
        let error = Config::from_url("postgres://localhost").unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        let error = Config::from_url("quarry://?cache=maybe").unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        let error = Config::from_url("quarry://?cache_size=3").unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::Validation));
        assert!(format!("{error:#}").contains("cache_size"));
        assert!(Config::from_url("quarry://?cache_ttl_ms=soon").is_err());
    }
}
