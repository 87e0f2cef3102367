//! Integration tests for error types

#[cfg(test)]
mod tests {
    use plugpm_errors::*;

    #[test]
    fn test_error_conversion() {
        let version_err = VersionError::InvalidVersion {
            input: "1.x".into(),
        };
        let err: Error = version_err.into();
        assert!(matches!(err, Error::Version(_)));
        assert_eq!(err.user_code(), Some("version.invalid_version"));
    }

    #[test]
    fn test_error_display() {
        let err = ResolverError::UnknownPackage {
            package: "nuxeo-dm-5.5.0".into(),
        };
        assert_eq!(err.to_string(), "unknown package: nuxeo-dm-5.5.0");

        let err = ResolverError::unresolvable("Unable to resolve dependencies");
        assert_eq!(err.to_string(), "Unable to resolve dependencies");
    }

    #[test]
    fn test_error_clone() {
        let err = ResolverError::MalformedUniverseText {
            line: 3,
            message: "missing ':'".into(),
        };
        let cloned = err.clone();
        assert_eq!(err, cloned);
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_config_error_hint() {
        let err: Error = ConfigError::InvalidValue {
            field: "PLUGPM_KEEP".into(),
            value: "maybe".into(),
        }
        .into();
        assert_eq!(err.user_code(), Some("config.invalid_value"));
        assert!(err.user_hint().is_some());
        assert!(!err.is_retryable());
    }
}
