//! Environment variable expansion for configuration strings.

use crate::ConfigError;

const PAGE_PLACEHOLDER: &str = "PAGE";

/// Expand `${VAR}` and `${VAR:-default}` references in a value.
///
/// `$PAGE` is a placeholder of URL templates and stays as written.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env_with_context(value, |name| match name {
        PAGE_PLACEHOLDER => Ok(None),
        _ => std::env::var(name).map(Some),
    })
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_literal_value_unchanged() {
        assert_eq!(expand_env("/user/$PAGE", "wiki.user_url").unwrap(), "/user/$PAGE");
    }

    #[test]
    fn test_placeholder_next_to_variable() {
        assert_eq!(
            expand_env("${INYOKA_UNSET_FOR_TEST:-https://example.org}/user/$PAGE", "wiki.user_url").unwrap(),
            "https://example.org/user/$PAGE"
        );
    }

    #[test]
    fn test_default_value() {
        assert_eq!(
            expand_env("${INYOKA_UNSET_FOR_TEST:-wiki.local}", "wiki.base_domain").unwrap(),
            "wiki.local"
        );
    }

    #[test]
    fn test_missing_variable() {
        let err = expand_env("${INYOKA_UNSET_FOR_TEST}", "wiki.base_domain").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable error in wiki.base_domain: ${INYOKA_UNSET_FOR_TEST} not set"
        );
    }
}
