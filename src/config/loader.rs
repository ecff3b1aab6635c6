//! Options loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::LoggingOptions;
use crate::config::validation::validate_options;
use crate::config::ConfigError;

/// Load and validate options from a TOML file.
pub fn load_options(path: &Path) -> Result<LoggingOptions, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_options(&content)
}

/// Parse and validate options from TOML text.
pub fn parse_options(content: &str) -> Result<LoggingOptions, ConfigError> {
    let options: LoggingOptions = toml::from_str(content)?;

    validate_options(&options).map_err(ConfigError::Validation)?;

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ConsoleFormat;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "poll_interval_secs = 2\n\n[console]\nformat = \"json\"\n\n[seq]\nbatch_size = 5"
        )
        .unwrap();

        let options = load_options(file.path()).unwrap();
        assert_eq!(options.poll_interval_secs, 2);
        assert_eq!(options.console.format, ConsoleFormat::Json);
        assert_eq!(options.seq.batch_size, 5);
        assert_eq!(options.seq.flush_interval_ms, 2000);
    }

    #[test]
    fn test_validation_failure_surfaces() {
        let err = parse_options("poll_interval_secs = 0").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err_to_string("poll_interval_secs = 0").contains("poll_interval_secs"));
    }

    fn err_to_string(content: &str) -> String {
        parse_options(content).unwrap_err().to_string()
    }

    #[test]
    fn test_missing_file() {
        let err = load_options(Path::new("/nonexistent/options.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
