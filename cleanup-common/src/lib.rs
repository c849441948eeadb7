pub mod cleanup_config;
pub mod error;
pub mod profiles;
pub mod session;
pub mod statement;
pub mod store;
pub mod template;
