pub mod loader;
pub mod schema;

pub use loader::{find_config_file, load_config, load_config_from_str, load_default_config};
pub use schema::{Configuration, Endpoint};
