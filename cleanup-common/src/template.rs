//! Resolution of `where_condition` templates.
//!
//! A template carries the literal placeholder `RETENSION`, replaced by the configured number of
//! retention days before the predicate is sent to the database. Matching is exact and
//! case-sensitive: `retension` or `Retension` are left untouched.
use serde_derive::Serialize;

/// Placeholder replaced by `retension_days`. The spelling matches the column names of
/// `c_sup_cleanup_config`.
pub const RETENTION_TOKEN: &str = "RETENSION";

/// Conditions worth surfacing to an operator when a template resolves without substitutions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateWarning {
    /// The template holds no placeholder at all.
    TokenAbsent,
    /// The placeholder appears in a casing other than upper case at least once, and those
    /// occurrences were not replaced.
    TokenMiscased,
}

impl std::fmt::Display for TemplateWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateWarning::TokenAbsent => {
                write!(f, "{} placeholder not found in template", RETENTION_TOKEN)
            }
            TemplateWarning::TokenMiscased => write!(
                f,
                "{} placeholder found with wrong casing and left unresolved",
                RETENTION_TOKEN
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub predicate: String,
    pub substitutions: usize,
    pub warning: Option<TemplateWarning>,
}

/// Replace every occurrence of [`RETENTION_TOKEN`] in `template` with `retention_days`.
pub fn resolve(template: &str, retention_days: u32) -> Resolution {
    let substitutions = template.matches(RETENTION_TOKEN).count();
    let any_casing = template
        .to_ascii_uppercase()
        .matches(RETENTION_TOKEN)
        .count();

    let warning = if any_casing > substitutions {
        Some(TemplateWarning::TokenMiscased)
    } else if substitutions == 0 {
        Some(TemplateWarning::TokenAbsent)
    } else {
        None
    };

    let predicate = if substitutions == 0 {
        template.to_owned()
    } else {
        template.replace(RETENTION_TOKEN, &retention_days.to_string())
    };

    Resolution {
        predicate,
        substitutions,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_interval_template() {
        let resolution = resolve(
            "trx_date < DATE_ADD(CURDATE(), INTERVAL -RETENSION DAY)",
            300,
        );

        assert_eq!(
            resolution.predicate,
            "trx_date < DATE_ADD(CURDATE(), INTERVAL -300 DAY)"
        );
        assert_eq!(resolution.substitutions, 1);
        assert_eq!(resolution.warning, None);
    }

    #[test]
    fn test_resolve_replaces_every_occurrence() {
        let template = "created < NOW() - INTERVAL RETENSION DAY OR updated < NOW() - INTERVAL RETENSION DAY AND RETENSION IS NOT NULL";

        for days in [0, 7, 45, 3650] {
            let resolution = resolve(template, days);
            let value = days.to_string();

            assert_eq!(resolution.substitutions, 3);
            assert_eq!(resolution.predicate.matches(RETENTION_TOKEN).count(), 0);
            assert_eq!(resolution.predicate.matches(value.as_str()).count(), 3);
        }
    }

    #[test]
    fn test_resolve_without_token_is_unchanged() {
        let template = "status = 'archived'";

        let resolution = resolve(template, 30);

        assert_eq!(resolution.predicate, template);
        assert_eq!(resolution.substitutions, 0);
        assert_eq!(resolution.warning, Some(TemplateWarning::TokenAbsent));
        assert_eq!(resolve(&resolution.predicate, 30), resolution);
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let template = "d < NOW() - retension";

        let resolution = resolve(template, 10);

        assert_eq!(resolution.predicate, template);
        assert_eq!(resolution.warning, Some(TemplateWarning::TokenMiscased));
    }

    #[test]
    fn test_mixed_casing_only_replaces_upper_case() {
        let resolution = resolve("a < RETENSION AND b < Retension", 5);

        assert_eq!(resolution.predicate, "a < 5 AND b < Retension");
        assert_eq!(resolution.substitutions, 1);
        assert_eq!(resolution.warning, Some(TemplateWarning::TokenMiscased));
    }
}
