use super::*;
use tempfile::TempDir;

#[test]
fn defaults_are_valid() {
    let config = Config {
        provider: ProviderConfig::default(),
        search: SearchConfig::default(),
        base_dir: PathBuf::new(),
    };

    assert!(config.validate().is_ok());
    assert_eq!(config.provider.model, DEFAULT_MODEL);
    assert_eq!(config.provider.dimensions, DEFAULT_EMBEDDING_DIMENSION);
    assert_eq!(config.search.monthly_search_limit, 1000);
    assert_eq!(config.search.index_limit, 500);
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("temp dir");

    let config = Config::load(temp_dir.path()).expect("load");

    assert_eq!(config.provider, ProviderConfig::default());
    assert_eq!(config.search, SearchConfig::default());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("temp dir");

    let mut config = Config::load(temp_dir.path()).expect("load");
    config.search.per_page = 25;
    config.search.similarity_threshold = 0.7;
    config.provider.model = "text-embedding-3-large".to_string();
    config.save().expect("save");

    let reloaded = Config::load(temp_dir.path()).expect("reload");
    assert_eq!(reloaded.search.per_page, 25);
    assert!((reloaded.search.similarity_threshold - 0.7).abs() < 1e-6);
    assert_eq!(reloaded.provider.model, "text-embedding-3-large");
}

#[test]
fn partial_file_fills_defaults() {
    let temp_dir = TempDir::new().expect("temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[search]\nper_page = 20\n",
    )
    .expect("write config");

    let config = Config::load(temp_dir.path()).expect("load");

    assert_eq!(config.search.per_page, 20);
    assert_eq!(config.search.max_results, 100);
    assert_eq!(config.provider.endpoint, DEFAULT_ENDPOINT);
}

#[test]
fn invalid_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[search]\nper_page = 0\n",
    )
    .expect("write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn provider_validation_bounds() {
    let mut provider = ProviderConfig::default();
    assert!(provider.validate().is_ok());

    provider.endpoint = "not a url".to_string();
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidEndpoint(_))
    ));

    provider = ProviderConfig {
        endpoint: "ftp://example.com".to_string(),
        ..ProviderConfig::default()
    };
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidEndpoint(_))
    ));

    provider = ProviderConfig {
        model: "  ".to_string(),
        ..ProviderConfig::default()
    };
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidModel(_))
    ));

    provider = ProviderConfig {
        dimensions: 32,
        ..ProviderConfig::default()
    };
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(32))
    ));

    provider = ProviderConfig {
        timeout_secs: 0,
        ..ProviderConfig::default()
    };
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidTimeout(0))
    ));

    provider = ProviderConfig {
        cache_ttl_secs: 100_000,
        ..ProviderConfig::default()
    };
    assert!(matches!(
        provider.validate(),
        Err(ConfigError::InvalidCacheTtl(100_000))
    ));
}

#[test]
fn search_validation_bounds() {
    let mut search = SearchConfig::default();
    assert!(search.validate().is_ok());

    search.indexed_types = Vec::new();
    assert!(matches!(
        search.validate(),
        Err(ConfigError::NoIndexedTypes)
    ));

    search = SearchConfig {
        per_page: 101,
        ..SearchConfig::default()
    };
    assert!(matches!(
        search.validate(),
        Err(ConfigError::InvalidPerPage(101))
    ));

    search = SearchConfig {
        similarity_threshold: 1.5,
        ..SearchConfig::default()
    };
    assert!(matches!(
        search.validate(),
        Err(ConfigError::InvalidThreshold(_))
    ));

    search = SearchConfig {
        max_results: 5,
        ..SearchConfig::default()
    };
    assert!(matches!(
        search.validate(),
        Err(ConfigError::InvalidMaxResults(5))
    ));

    search = SearchConfig {
        monthly_search_limit: 0,
        ..SearchConfig::default()
    };
    assert!(matches!(
        search.validate(),
        Err(ConfigError::InvalidSearchLimit(0))
    ));

    search = SearchConfig {
        index_limit: 0,
        ..SearchConfig::default()
    };
    assert!(matches!(
        search.validate(),
        Err(ConfigError::InvalidIndexLimit(0))
    ));
}

#[test]
fn cache_ttl_zero_is_allowed() {
    let provider = ProviderConfig {
        cache_ttl_secs: 0,
        ..ProviderConfig::default()
    };
    assert!(provider.validate().is_ok());
}

#[test]
fn database_path_lives_in_base_dir() {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = Config::load(temp_dir.path()).expect("load");

    assert_eq!(
        config.database_path(),
        temp_dir.path().join("semsearch.db")
    );
}
