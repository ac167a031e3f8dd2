use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "quadrant_engine=debug,wgpu_core=warn"). When it is `None`, `RUST_LOG` is
/// consulted, then the `info` default applies.
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Caps the GPU stack (`wgpu_core`, `wgpu_hal`, `naga`) at `warn` unless
    /// the filter names them explicitly.
    pub quiet_gpu_stack: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            quiet_gpu_stack: true,
        }
    }
}

const GPU_STACK: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Idempotent; subsequent calls are ignored. Call early in `main`. If another
/// logger was installed first, this one is silently skipped.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(log::LevelFilter::Info);

        let filter = config.env_filter.or_else(|| std::env::var("RUST_LOG").ok());

        if config.quiet_gpu_stack {
            for module in GPU_STACK {
                let named = filter.as_deref().is_some_and(|f| f.contains(module));
                if !named {
                    builder.filter_module(module, log::LevelFilter::Warn);
                }
            }
        }

        if let Some(filter) = &filter {
            builder.parse_filters(filter);
        }

        builder.write_style(config.write_style);

        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}
