/// Set up log levels and formatting
///
/// No logs are shown by default, only human-friendly messages. Enable log
/// output with "export RUST_LOG=debug" in terminal.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
}
