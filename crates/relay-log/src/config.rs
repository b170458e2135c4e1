//! Logging configuration and environment-derived presets.

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable, single line per event.
    Compact,
    /// Multi-line, indented — convenient while developing locally.
    Pretty,
    /// One JSON object per line — what a log aggregator expects.
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub filter: String,
    pub format: Format,
    pub ansi: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: Format::Compact,
            ansi: true,
        }
    }
}

impl Config {
    /// Read `RELAY_LOG` (falling back to `RUST_LOG`) and `RELAY_LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var("RELAY_LOG") {
            config.filter = filter;
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            config.filter = filter;
        }
        if let Ok(format) = std::env::var("RELAY_LOG_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "pretty" => Format::Pretty,
                "json" => Format::Json,
                _ => Format::Compact,
            };
        }
        config
    }

    #[must_use]
    pub fn development() -> Self {
        Self {
            filter: "debug".to_string(),
            format: Format::Pretty,
            ansi: true,
        }
    }

    #[must_use]
    pub fn production() -> Self {
        Self {
            filter: "info".to_string(),
            format: Format::Json,
            ansi: false,
        }
    }

    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            filter: "trace".to_string(),
            format: Format::Compact,
            ansi: false,
        }
    }
}
