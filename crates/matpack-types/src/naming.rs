//! Datapackage naming rules.
//!
//! Names must be usable in URLs and file paths: alphanumerics plus `.`,
//! `_`, and `-`. `clean_name` coerces arbitrary strings into that shape;
//! `check_name` rejects the rest.

use crate::error::{TypeError, TypeResult};

fn allowed(c: char) -> bool {
    c.is_alphanumeric() || c == '.' || c == '_' || c == '-'
}

/// Validate a package or resource name against the naming pattern.
pub fn check_name(name: &str) -> TypeResult<()> {
    if name.chars().all(allowed) {
        Ok(())
    } else {
        Err(TypeError::InvalidName(name.to_string()))
    }
}

/// Replace disallowed characters with underscores, collapsing runs.
pub fn clean_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sub = false;
    for c in name.trim().chars() {
        if allowed(c) {
            out.push(c);
            last_was_sub = false;
        } else if !last_was_sub {
            out.push('_');
            last_was_sub = true;
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_pass() {
        check_name("my-package_1.0").unwrap();
        check_name("").unwrap();
    }

    #[test]
    fn invalid_names_rejected() {
        assert!(matches!(
            check_name("has spaces"),
            Err(TypeError::InvalidName(_))
        ));
        assert!(check_name("slash/name").is_err());
    }

    #[test]
    fn cleaning_substitutes_and_collapses() {
        assert_eq!(clean_name("my package! (v2)"), "my_package_v2");
        assert_eq!(clean_name("  already-clean.name  "), "already-clean.name");
        assert_eq!(clean_name("__underscored__"), "underscored");
    }
}
