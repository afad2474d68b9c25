use std::{fs, path::Path, sync::OnceLock};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::LineFormatter;
pub use writer::{CircularFileWriter, strip_ansi_escapes};

use crate::configs::LoggingConfig;

pub(crate) static GLOBAL_FILE_WRITER: OnceLock<CircularFileWriter> = OnceLock::new();

/// `println!` that also lands in the file log, for output emitted outside `tracing`.
#[macro_export]
macro_rules! log_println {
    () => {{
        std::println!();
        $crate::common::logger::append_to_file_raw("\n");
    }};
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        std::println!("{}", msg);
        $crate::common::logger::append_to_file_raw(&format!("{}\n", msg));
    }};
}

pub fn append_to_file_raw(msg: &str) {
    if let Some(mut writer) = GLOBAL_FILE_WRITER.get().cloned() {
        use std::io::Write;
        let _ = writer.write_all(strip_ansi_escapes(msg).as_bytes());
    }
}

/// Builds the filter directive from config. `RUST_LOG` still wins when set.
pub fn filter_directive(logging: &LoggingConfig) -> String {
    let level = logging.level.as_deref().unwrap_or("info");
    match logging.filters.as_deref() {
        Some(filters) if !filters.is_empty() => {
            format!("{},hyper=warn,reqwest=warn,{}", level, filters)
        }
        _ => format!("{},hyper=warn,reqwest=warn", level),
    }
}

pub fn init(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(logging)));

    let stdout_layer = fmt::layer()
        .event_format(LineFormatter::new(true))
        .with_ansi(true);

    let file_layer = logging.file.as_ref().map(|file_config| {
        if let Some(parent) = Path::new(&file_config.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {}", e);
            }
        }

        let writer = CircularFileWriter::new(file_config.path.clone(), file_config.max_lines);
        let _ = GLOBAL_FILE_WRITER.set(writer.clone());
        fmt::layer()
            .with_writer(writer)
            .event_format(LineFormatter::new(false))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_defaults_to_info() {
        let logging = LoggingConfig::default();
        assert_eq!(filter_directive(&logging), "info,hyper=warn,reqwest=warn");
    }

    #[test]
    fn test_filter_directive_appends_filters() {
        let logging = LoggingConfig {
            level: Some("debug".into()),
            filters: Some("tunelink::process=trace".into()),
            file: None,
        };
        assert_eq!(
            filter_directive(&logging),
            "debug,hyper=warn,reqwest=warn,tunelink::process=trace"
        );
    }
}
