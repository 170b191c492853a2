use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use matcher_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.unwrap_or_else(|| panic!("Template config must include [{section}]."));

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
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

	path.push(format!("matcher_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

#[test]
fn sample_config_loads() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = matcher_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected sample config to load.");

	assert_eq!(cfg.matching.weight_increment, 1);
	assert_eq!(cfg.matching.trigger_timeout_ms, 30_000);
	assert_eq!(cfg.storage.postgres.pool_max_conns, 4);
	assert!(cfg.security.bind_localhost_only);
}

#[test]
fn matching_section_is_optional() {
	let payload = "\
[service]
http_bind = \"127.0.0.1:8080\"
admin_bind = \"127.0.0.1:8081\"

[storage.postgres]
dsn = \"postgres://localhost/matcher\"
pool_max_conns = 1
";
	let cfg: Config = toml::from_str(payload).expect("Failed to parse minimal config.");

	assert_eq!(cfg.service.log_level, "info");
	assert_eq!(cfg.matching.weight_increment, 1);
	assert_eq!(cfg.matching.max_pool_size, 512);
	assert!(matcher_config::validate(&cfg).is_ok());
}

#[test]
fn weight_increment_must_be_positive() {
	let path = write_temp_config(sample_toml_with("matching", "weight_increment", Value::Integer(0)));
	let result = matcher_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected weight_increment validation error.");

	assert!(
		err.to_string().contains("matching.weight_increment must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn trigger_timeout_must_be_positive() {
	let mut cfg = base_config();

	cfg.matching.trigger_timeout_ms = 0;

	let err = matcher_config::validate(&cfg).expect_err("Expected timeout validation error.");

	assert!(
		err.to_string().contains("matching.trigger_timeout_ms must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn max_pool_size_must_allow_a_pair() {
	let mut cfg = base_config();

	cfg.matching.max_pool_size = 1;

	let err = matcher_config::validate(&cfg).expect_err("Expected pool size validation error.");

	assert!(
		err.to_string().contains("matching.max_pool_size must be at least 2."),
		"Unexpected error: {err}"
	);
}

#[test]
fn blank_binds_are_rejected() {
	let mut cfg = base_config();

	cfg.service.admin_bind = "  ".to_string();

	let err = matcher_config::validate(&cfg).expect_err("Expected bind validation error.");

	assert!(matches!(err, Error::Validation { .. }));
	assert!(err.to_string().contains("service.admin_bind must be non-empty."));
}

#[test]
fn blank_log_level_normalizes_to_info() {
	let path = write_temp_config(sample_toml_with("service", "log_level", Value::String(" ".into())));
	let result = matcher_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert_eq!(result.expect("Expected config to load.").service.log_level, "info");
}

#[test]
fn missing_file_reports_path() {
	let path = env::temp_dir().join("matcher_config_test_missing.toml");
	let err = matcher_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
