use crate::{ErrorCode, ErrorContext, WeirError};

impl From<std::io::Error> for WeirError {
    fn from(err: std::io::Error) -> Self {
        WeirError::new(ErrorCode::Io, err.to_string())
    }
}

impl From<serde_json::Error> for WeirError {
    fn from(err: serde_json::Error) -> Self {
        WeirError::new(ErrorCode::SerializationFailed, err.to_string())
    }
}

impl From<serde_yaml::Error> for WeirError {
    fn from(err: serde_yaml::Error) -> Self {
        WeirError::new(ErrorCode::InvalidYaml, err.to_string())
    }
}

impl From<config::ConfigError> for WeirError {
    fn from(err: config::ConfigError) -> Self {
        let field = match &err {
            config::ConfigError::NotFound(key) => Some(key.clone()),
            config::ConfigError::Type { key, .. } => key.clone(),
            _ => None,
        };
        let code = match &err {
            config::ConfigError::Type { .. } | config::ConfigError::NotFound(_) => {
                ErrorCode::SchemaViolation
            }
            _ => ErrorCode::ConfigLoadFailed,
        };
        WeirError::new(code, err.to_string()).with_context(ErrorContext::Config {
            file_path: None,
            field,
        })
    }
}
