use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub matching: Matching,
	#[serde(default)]
	pub security: Security,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	/// Serves the round trigger. Must be a loopback address.
	pub admin_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Matching {
	/// Added to a pair's weight each time they are matched.
	#[serde(default = "default_weight_increment")]
	pub weight_increment: i64,
	/// Budget for reading the waiting set and computing the matching. Committing
	/// is never cut short.
	#[serde(default = "default_trigger_timeout_ms")]
	pub trigger_timeout_ms: u64,
	#[serde(default = "default_max_pool_size")]
	pub max_pool_size: u32,
}
impl Default for Matching {
	fn default() -> Self {
		Self {
			weight_increment: default_weight_increment(),
			trigger_timeout_ms: default_trigger_timeout_ms(),
			max_pool_size: default_max_pool_size(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Security {
	#[serde(default = "default_true")]
	pub bind_localhost_only: bool,
}
impl Default for Security {
	fn default() -> Self {
		Self { bind_localhost_only: true }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_weight_increment() -> i64 {
	1
}

fn default_trigger_timeout_ms() -> u64 {
	30_000
}

fn default_max_pool_size() -> u32 {
	512
}

fn default_true() -> bool {
	true
}
