//! Integration tests for config

#[cfg(test)]
mod tests {
    use plugpm_config::*;
    use plugpm_errors::{ConfigError, Error};
    use plugpm_types::StrategyKind;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[resolver]
strategy = "legacy"
allow_snapshot = true
keep = false
max_depth = 12
solver_node_budget = 5000

[catalogue]
cache_ttl_seconds = 60
        "#
        )
        .unwrap();

        let config = ResolverConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.strategy(), StrategyKind::Legacy);
        assert!(config.resolver.allow_snapshot);
        assert!(!config.resolver.keep);
        assert_eq!(config.resolver.max_depth, 12);
        assert_eq!(config.resolver.solver_node_budget, 5000);
        assert_eq!(config.cache_ttl(), chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_empty_file_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = ResolverConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.strategy(), StrategyKind::Cudf);
        assert!(config.resolver.keep);
        assert_eq!(config.resolver.max_depth, constants::DEFAULT_MAX_DEPTH);
    }

    #[tokio::test]
    async fn test_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[resolver\nstrategy = ").unwrap();
        let err = ResolverConfig::load_from_file(temp_file.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        // Clean up any existing env vars first
        std::env::remove_var("PLUGPM_RESOLVER_STRATEGY");
        std::env::remove_var("PLUGPM_CACHE_TTL");

        std::env::set_var("PLUGPM_RESOLVER_STRATEGY", "legacy");
        std::env::set_var("PLUGPM_CACHE_TTL", "0");

        let mut config = ResolverConfig::default();
        config.merge_env().unwrap();

        assert_eq!(config.strategy(), StrategyKind::Legacy);
        assert_eq!(config.cache_ttl(), chrono::Duration::zero());

        // Clean up
        std::env::remove_var("PLUGPM_RESOLVER_STRATEGY");
        std::env::remove_var("PLUGPM_CACHE_TTL");
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        // Clean up any existing env vars first
        std::env::remove_var("PLUGPM_MAX_DEPTH");

        std::env::set_var("PLUGPM_MAX_DEPTH", "deep");

        let mut config = ResolverConfig::default();
        let result = config.merge_env();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));

        std::env::set_var("PLUGPM_MAX_DEPTH", "0");
        let mut config = ResolverConfig::default();
        assert!(matches!(
            config.merge_env(),
            Err(Error::Config(ConfigError::Invalid { .. }))
        ));

        // Clean up
        std::env::remove_var("PLUGPM_MAX_DEPTH");
    }
}
