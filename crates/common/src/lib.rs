pub mod plates;
pub mod validation;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
