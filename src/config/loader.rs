//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse a TOML file without semantic validation.
///
/// Command-line overrides are applied afterwards; startup validates the
/// merged result.
pub fn read_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate_config, TransportMode};
    use std::io::Write;

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:25555\"\n\n[upstream]\nurl = \"http://127.0.0.1:4000\"\ntransport = \"http2\""
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:25555");
        assert_eq!(config.upstream.url, "http://127.0.0.1:4000");
        assert_eq!(config.upstream.transport, TransportMode::Http2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config(Path::new("/definitely/not/here/relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener\nbind_address = ").unwrap();

        let err = read_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parsed_values_are_validated_separately() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nbind_address = \"nope\"\nmax_connections = 0").unwrap();

        let config = read_config(file.path()).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
