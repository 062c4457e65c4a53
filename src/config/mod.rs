pub mod lexer;
pub mod parser;
pub mod types;
pub mod validate;

pub use parser::{parse_config, ConfigError};
pub use types::{LocationConfig, ServerConfig};
pub use validate::validate_configs;
