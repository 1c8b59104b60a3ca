use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.embedding_dimension, 768);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.overlap, 50);
    assert_eq!(config.indexing.batch_size, 5);
    assert_eq!(config.indexing.embed_concurrency, 5);
    assert_eq!(config.indexing.batch_delay_ms, 100);
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
    invalid_config.ollama.embedding_dimension = 12;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.indexing.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.indexing.embed_concurrency = 101;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn overlap_must_stay_below_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 100;
    config.chunking.overlap = 100;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidOverlap(100, 100))
    ));

    config.chunking.overlap = 150;
    assert!(config.validate().is_err());

    config.chunking.overlap = 99;
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama
        .base_url()
        .expect("should generate base_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");

    let https_config = OllamaConfig {
        protocol: "https".to_string(),
        host: "embeddings.internal".to_string(),
        port: 443,
        ..OllamaConfig::default()
    };
    let url = https_config
        .base_url()
        .expect("should generate https base_url successfully");
    assert_eq!(url.as_str(), "https://embeddings.internal/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn load_missing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should fall back to defaults");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.index_dir(), temp_dir.path().join("index"));
}

#[test]
fn save_and_reload_roundtrip() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.ollama.model = "mxbai-embed-large".to_string();
    config.chunking.chunk_size = 300;
    config.chunking.overlap = 30;
    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert_eq!(reloaded.ollama.model, "mxbai-embed-large");
    assert_eq!(reloaded.chunking.chunk_size, 300);
    assert_eq!(reloaded.chunking.overlap, 30);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 100\noverlap = 400\n",
    )
    .expect("should write config file");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn index_dir_override_wins() {
    let mut config = Config {
        base_dir: PathBuf::from("/data/semdex"),
        ..Config::default()
    };
    assert_eq!(config.index_dir(), PathBuf::from("/data/semdex/index"));

    config.index_override = Some(PathBuf::from("/elsewhere/idx"));
    assert_eq!(config.index_dir(), PathBuf::from("/elsewhere/idx"));
}
