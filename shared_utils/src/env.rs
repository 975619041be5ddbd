use std::str::FromStr;

use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// An environment variable is set but its value cannot be parsed.
#[derive(Debug, Error)]
#[error("Invalid value for environment variable {name}: {value:?}")]
pub struct InvalidEnvVarError {
    pub name: String,
    pub value: String,
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    std::env::var(name).map_err(|_| MissingEnvVarError(name.to_string()))
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when the variable is unset or blank, so callers can fall
/// back to a file or compiled-in default.
pub fn parse_env_var<T: FromStr>(name: &str) -> Result<Option<T>, InvalidEnvVarError> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| InvalidEnvVarError {
            name: name.to_string(),
            value: raw,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_var_is_reported_by_name() {
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_MISSING") };
        let err = get_env_var("SHARED_UTILS_TEST_MISSING").unwrap_err();
        assert_eq!(err.to_string(), "Missing environment variable: SHARED_UTILS_TEST_MISSING");
    }

    #[test]
    #[serial]
    fn parse_env_var_handles_unset_blank_and_invalid() {
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_NUM") };
        assert_eq!(parse_env_var::<u64>("SHARED_UTILS_TEST_NUM").unwrap(), None);

        unsafe { std::env::set_var("SHARED_UTILS_TEST_NUM", "  ") };
        assert_eq!(parse_env_var::<u64>("SHARED_UTILS_TEST_NUM").unwrap(), None);

        unsafe { std::env::set_var("SHARED_UTILS_TEST_NUM", " 42 ") };
        assert_eq!(parse_env_var::<u64>("SHARED_UTILS_TEST_NUM").unwrap(), Some(42));

        unsafe { std::env::set_var("SHARED_UTILS_TEST_NUM", "forty-two") };
        let err = parse_env_var::<u64>("SHARED_UTILS_TEST_NUM").unwrap_err();
        assert_eq!(err.name, "SHARED_UTILS_TEST_NUM");

        unsafe { std::env::remove_var("SHARED_UTILS_TEST_NUM") };
    }
}
