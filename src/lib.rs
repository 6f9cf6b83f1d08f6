// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod format;
pub mod runtime;
pub mod session;
pub mod step_source;
pub mod store;
pub mod stride;
pub mod ui;
pub mod walk;
