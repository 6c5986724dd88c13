//! npmsift configuration layer
//!
//! All environment reads live here; the engine and the CLI read structured
//! config instead of calling `std::env::var` directly.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool`, `env_parse`, `.env` loading
//! - `schema`: `ScanConfig`, `ObservabilityConfig`
//! - `env_keys`: key constants (with aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_parse, load_dotenv};
pub use schema::{ConfigError, ObservabilityConfig, ScanConfig};
