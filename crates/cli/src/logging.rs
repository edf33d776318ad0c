use nexus_core::config::{AppConfig, LogFormat};
use tracing::Level;

/// Installs a stderr subscriber so log lines never interleave with command
/// output on stdout. A second call is a no-op.
pub fn init(config: &AppConfig) {
    let level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder =
        tracing_subscriber::fmt().with_writer(std::io::stderr).with_target(false).with_max_level(level);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
