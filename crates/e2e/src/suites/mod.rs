//! Suites compiled into the binary

use crate::error::{E2eError, E2eResult};
use crate::spec::SuiteSpec;

const AUTH: &str = include_str!("../../suites/auth.yaml");

/// Names of the built-in suites
pub const BUILTIN: &[&str] = &["auth"];

/// Sign-up, login, session and onboarding scenarios
pub fn auth() -> E2eResult<SuiteSpec> {
    SuiteSpec::from_yaml(AUTH)
}

pub fn builtin(name: &str) -> E2eResult<SuiteSpec> {
    match name {
        "auth" => auth(),
        other => Err(E2eError::SpecParse(format!(
            "unknown built-in suite '{}' (available: {})",
            other,
            BUILTIN.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::TestStep;

    #[test]
    fn test_auth_suite_parses() {
        let suite = auth().unwrap();
        assert_eq!(suite.name, "auth");
        assert_eq!(suite.scenarios.len(), 8);
        assert!(suite.setup.seed);

        let aliases: Vec<_> = suite
            .setup
            .intercepts
            .iter()
            .filter_map(|r| r.alias.as_deref())
            .collect();
        assert_eq!(aliases, vec!["signup", "gqlCreateBankAccountMutation"]);
        assert_eq!(suite.setup.intercepts[1].url, "{{apiUrl}}/graphql");
    }

    #[test]
    fn test_logout_uses_nav_click() {
        let suite = auth().unwrap().filter_by_name("remember a user");
        assert_eq!(suite.scenarios.len(), 1);
        assert!(suite.scenarios[0]
            .steps
            .iter()
            .any(|s| matches!(s, TestStep::NavClick { .. })));
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin("payments").is_err());
        assert_eq!(builtin("auth").unwrap().filter_by_tag("credentials").scenarios.len(), 2);
    }
}
