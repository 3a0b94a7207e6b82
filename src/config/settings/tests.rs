use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "nomic-embed-text:latest");
    assert_eq!(config.index.collection, "documents");
    assert!((config.search.blend_weight - 0.3).abs() < f32::EPSILON);
    assert_eq!(config.search.hnsw_ef, 128);
    assert!(!config.search.exact);
    assert_eq!(config.provision.parallelism, 4);
    assert_eq!(config.provision.max_retries, 3);
    assert_eq!(config.provision.verification_category, "sports-watch");
    assert_eq!(config.provision.verification_limit, 5);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.search.blend_weight = 1.5;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidBlendWeight(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.search.blend_weight = f32::NAN;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.search.hnsw_ef = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidHnswEf(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.provision.parallelism = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidParallelism(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.provision.verification_category = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.index.collection = "../escape".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidCollection(_))
    ));
}

#[test]
fn collection_name_rules() {
    assert!(validate_collection_name("livedoor_news-2024").is_ok());
    assert!(validate_collection_name("").is_err());
    assert!(validate_collection_name("with space").is_err());
    assert!(validate_collection_name("slash/name").is_err());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn index_uri_defaults_to_base_dir() {
    let config = Config {
        base_dir: PathBuf::from("/tmp/semsearch-test"),
        ..Config::default()
    };
    assert_eq!(
        PathBuf::from(config.index_uri()),
        PathBuf::from("/tmp/semsearch-test").join("vectors")
    );

    let config = Config {
        index: IndexConfig {
            uri: Some("db://remote-bucket".to_string()),
            ..IndexConfig::default()
        },
        ..config
    };
    assert_eq!(config.index_uri(), "db://remote-bucket");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        [search]
        hnsw_ef = 256

        [provision]
        parallelism = 8
    "#;
    let config: Config = toml::from_str(toml_str).expect("should parse partial toml");
    assert_eq!(config.search.hnsw_ef, 256);
    assert_eq!(config.search.default_limit, 10);
    assert_eq!(config.provision.parallelism, 8);
    assert_eq!(config.provision.max_retries, 3);
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert_eq!(config.host, "example.com");
    assert_eq!(config.port, 8080);

    assert!(config.set_port(0).is_err());
    assert!(config.set_host("bad host name".to_string()).is_err());
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.search, SearchConfig::default());
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.index.collection = "news".to_string();
    config.search.exact = true;

    config.save().expect("should save config");
    assert!(config.config_file_path().exists());

    let loaded = Config::load(temp_dir.path().join("nested")).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[provision]\nparallelism = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}
