//! Configuration loading and the flat environment-variable contract.

use figment::Jail;
use vcon_domain::error::Error;
use vcon_infrastructure::config::{AppConfig, validate_config};

#[test]
fn defaults_apply_and_database_url_is_required() {
    Jail::expect_with(|_jail| {
        let err = AppConfig::load().unwrap_err();
        match err {
            Error::ConfigInvalid { key, .. } => assert_eq!(key, "database.url"),
            other => panic!("expected ConfigInvalid, got {other}"),
        }
        Ok(())
    });
}

#[test]
fn env_contract_names_are_honored() {
    Jail::expect_with(|jail| {
        jail.set_env("DATABASE_URL", "postgres://localhost/vcon");
        jail.set_env("REDIS_URL", "redis://localhost:6379");
        jail.set_env("VCON_REDIS_EXPIRY", "120");
        jail.set_env("VCON_PLUGINS_PATH", "audit, legal-hold");
        jail.set_env("RLS_ENABLED", "true");
        jail.set_env("TENANT_ATTACHMENT_TYPE", "owner");
        jail.set_env("TENANT_JSON_PATH", "org.id");
        jail.set_env("CURRENT_TENANT_ID", "acme");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.database.url, "postgres://localhost/vcon");
        assert_eq!(config.cache.provider.as_deref(), Some("redis"));
        assert_eq!(config.cache.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.plugins.modules, vec!["audit", "legal-hold"]);
        assert!(config.tenant.rls_enabled);
        assert_eq!(config.tenant.attachment_type, "owner");
        assert_eq!(config.tenant.json_path, "org.id");
        assert_eq!(config.tenant.current_tenant_id.as_deref(), Some("acme"));
        Ok(())
    });
}

#[test]
fn toml_file_is_merged_under_env() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "vcon.toml",
            r#"
            [database]
            url = "postgres://from-toml/vcon"
            max_connections = 5

            [cache]
            provider = "moka"
            ttl_secs = 30
            "#,
        )?;
        jail.set_env("DATABASE_URL", "postgres://from-env/vcon");

        let config = AppConfig::load().unwrap();
        // Env contract wins over the file.
        assert_eq!(config.database.url, "postgres://from-env/vcon");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.cache.provider.as_deref(), Some("moka"));
        assert_eq!(config.cache.ttl_secs, 30);
        Ok(())
    });
}

#[test]
fn zero_cache_ttl_with_cache_enabled_is_invalid() {
    let mut config = AppConfig::default();
    config.database.url = "postgres://localhost/vcon".to_owned();
    config.cache.provider = Some("moka".to_owned());
    config.cache.ttl_secs = 0;
    let err = validate_config(&config).unwrap_err();
    assert!(matches!(err, Error::ConfigInvalid { .. }));
}

#[test]
fn redis_provider_requires_a_url() {
    let mut config = AppConfig::default();
    config.database.url = "postgres://localhost/vcon".to_owned();
    config.cache.provider = Some("redis".to_owned());
    config.cache.redis_url = None;
    let err = validate_config(&config).unwrap_err();
    match err {
        Error::ConfigInvalid { key, .. } => assert_eq!(key, "cache.redis_url"),
        other => panic!("expected ConfigInvalid, got {other}"),
    }
}
