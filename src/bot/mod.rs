use std::sync::Arc;

pub mod access;
pub mod admin;
pub mod callback;
pub mod commands;
pub mod context;
pub mod handlers;
pub mod upload;

pub type HandlerResult = anyhow::Result<()>;
pub type SharedContext = Arc<AppContext>;

pub use commands::Command;
pub use context::AppContext;
pub use handlers::build_schema;
