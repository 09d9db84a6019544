//! Logging initialization and utilities

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// verdant::core::logging::init();
/// log::info!("Grass renderer started");
/// ```
pub fn init() {
    // try_init so repeated calls (tests, doc examples) don't panic
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
