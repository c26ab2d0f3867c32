use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KeelError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("reading {document} from {location}")]
    DocumentUnreadable {
        document: &'static str,
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {document} from {location}: {message}")]
    DocumentMalformed {
        document: &'static str,
        location: String,
        message: String,
    },

    #[error("{document} does not provide {field}")]
    MissingField {
        document: &'static str,
        field: &'static str,
    },

    #[error("Metadata does not provide settings")]
    MissingSettings,

    #[error("no metadata source reported availability")]
    NoSourceAvailable,

    // Resolver failure text is embedded rather than chained so it survives
    // a plain to_string() at the boot-failure log line.
    #[error("resolving registry endpoint {endpoint}: {message}")]
    ResolutionFailed { endpoint: String, message: String },

    #[error("fetching settings from registry {endpoint}: {message}")]
    Registry { endpoint: String, message: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl KeelError {
    /// True for read errors whose underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        match self {
            KeelError::DocumentUnreadable { source, .. } | KeelError::Io { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_message_is_exact() {
        assert_eq!(
            KeelError::MissingSettings.to_string(),
            "Metadata does not provide settings"
        );
    }

    #[test]
    fn missing_field_names_the_field() {
        let err = KeelError::MissingField {
            document: "config drive metadata",
            field: "openssh-key",
        };
        assert!(err.to_string().contains("openssh-key"));
    }

    #[test]
    fn resolution_failure_carries_resolver_text() {
        let err = KeelError::ResolutionFailed {
            endpoint: "http://registry.internal".into(),
            message: "no records found".into(),
        };
        assert!(err.to_string().contains("no records found"));
    }

    #[test]
    fn not_found_detection() {
        let err = KeelError::DocumentUnreadable {
            document: "user data",
            location: "/nonexistent".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_not_found());

        let err = KeelError::DocumentUnreadable {
            document: "user data",
            location: "/denied".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!err.is_not_found());
    }
}
