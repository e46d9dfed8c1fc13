//! Integration tests for config

#[cfg(test)]
mod tests {
    use devnet_config::*;
    use devnet_types::{ColorChoice, OutputFormat};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 5] = [
        "DEVNET_HOME",
        "DEVNET_RPC_URL",
        "DEVNET_REST_URL",
        "DEVNET_NETWORK",
        "DEVNET_BINARY",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
default_output = "json"
color = "never"

[paths]
home = "/srv/devnet"

[chain]
binary_name = "gaiad"
rpc_url = "http://10.0.0.5:26657"

[upgrade]
safety_margin_blocks = 4
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.default_output, OutputFormat::Json);
        assert_eq!(config.general.color, ColorChoice::Never);
        assert_eq!(config.home(), PathBuf::from("/srv/devnet"));
        assert_eq!(config.cache_root(), PathBuf::from("/srv/devnet/cache/binaries"));
        assert_eq!(config.chain.binary_name, "gaiad");
        assert_eq!(config.chain.network_type, "cosmos");
        assert_eq!(config.upgrade.safety_margin_blocks, 4);
        assert_eq!(config.upgrade.block_time_samples, 10);
        assert_eq!(config.cache.validation_timeout_secs, 5);
    }

    #[tokio::test]
    async fn test_invalid_file_values_are_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[cache]\nvalidation_timeout_secs = 0").unwrap();
        assert!(Config::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chain.rpc_url, "http://127.0.0.1:26657");
        assert_eq!(config.chain.rest_url, "http://127.0.0.1:1317");
        assert_eq!(config.cache.version_args, vec!["version".to_string()]);
        assert!(config.cache.auto_select_single);
        assert_eq!(config.upgrade.default_voting_period_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("DEVNET_HOME", "/tmp/devnet-env");
        std::env::set_var("DEVNET_RPC_URL", "http://node0:26657/");
        std::env::set_var("DEVNET_BINARY", "wasmd");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.home(), PathBuf::from("/tmp/devnet-env"));
        assert_eq!(config.chain.rpc_url, "http://node0:26657");
        assert_eq!(config.chain.binary_name, "wasmd");

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("DEVNET_REST_URL", "localhost:1317");

        let mut config = Config::default();
        assert!(config.merge_env().is_err());

        clear_env();
    }
}
