use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use facade_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let mut table = root.as_table_mut().expect("Sample config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Sample config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render sample config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("facade_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse test config.")
}

#[test]
fn sample_config_loads() {
	let path = write_temp_config(SAMPLE_CONFIG_TOML.to_string());
	let result = facade_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Sample config must load.");

	assert_eq!(cfg.pool.source, "static");
	assert_eq!(cfg.scoring.mode, "phash");
	assert_eq!(cfg.scoring.concurrency, 8);
	assert!(cfg.providers.listing.as_ref().is_some_and(|listing| listing.active_only));
}

#[test]
fn load_normalizes_enumerations() {
	let payload = sample_toml_with("scoring", "mode", Value::String(" PHash ".to_string()));
	let path = write_temp_config(payload);
	let result = facade_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert_eq!(result.expect("Config must load.").scoring.mode, "phash");
}

#[test]
fn missing_file_is_read_error() {
	let mut path = env::temp_dir();

	path.push("facade_config_test_does_not_exist.toml");

	let err = facade_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn unknown_scoring_mode_is_rejected() {
	let payload = sample_toml_with("scoring", "mode", Value::String("neural".to_string()));
	let path = write_temp_config(payload);
	let result = facade_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected scoring mode validation error.");

	assert!(
		err.to_string().contains("scoring.mode must be one of phash, embedding, or digest."),
		"Unexpected error: {err}"
	);
}

#[test]
fn scoring_concurrency_must_be_positive() {
	let mut cfg = base_config();

	cfg.scoring.concurrency = 0;

	let err = facade_config::validate(&cfg).expect_err("Expected concurrency validation error.");

	assert!(
		matches!(err, Error::Validation { field: "scoring.concurrency", .. }),
		"Unexpected error: {err}"
	);
}

#[test]
fn static_pool_requires_dataset_path() {
	let mut cfg = base_config();

	cfg.pool.dataset_path = None;

	let err = facade_config::validate(&cfg).expect_err("Expected dataset path validation error.");

	assert!(
		err.to_string().contains("pool.dataset_path is required when pool.source is static."),
		"Unexpected error: {err}"
	);
}

#[test]
fn live_pool_requires_listing_api_key() {
	let mut cfg = base_config();

	cfg.pool.source = "live".to_string();

	if let Some(listing) = cfg.providers.listing.as_mut() {
		listing.api_key = "  ".to_string();
	}

	let err = facade_config::validate(&cfg).expect_err("Expected api key validation error.");

	assert!(
		err.to_string().contains("providers.listing.api_key must be non-empty."),
		"Unexpected error: {err}"
	);

	cfg.providers.listing = None;

	let err = facade_config::validate(&cfg).expect_err("Expected listing validation error.");

	assert!(
		err.to_string().contains("providers.listing is required when pool.source is live."),
		"Unexpected error: {err}"
	);
}

#[test]
fn embedding_mode_requires_dimensions() {
	let mut cfg = base_config();

	cfg.scoring.mode = "embedding".to_string();

	assert!(facade_config::validate(&cfg).is_ok());

	if let Some(embedding) = cfg.providers.embedding.as_mut() {
		embedding.dimensions = 0;
	}

	let err = facade_config::validate(&cfg).expect_err("Expected dimensions validation error.");

	assert!(
		err.to_string().contains("providers.embedding.dimensions must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn embedding_section_is_optional_for_other_modes() {
	let mut cfg = base_config();

	cfg.providers.embedding = None;
	cfg.scoring.mode = "digest".to_string();

	assert!(facade_config::validate(&cfg).is_ok());
}
