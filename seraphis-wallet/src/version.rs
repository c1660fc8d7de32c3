//! Semantic-rules versioning.
//!
//! The version string is bound into every composition-proof message, so a
//! proof made under one rules version cannot authorize a transaction under
//! another.

/// Current semantic-rules version.
pub const SEMANTIC_RULES_VERSION: u32 = 1;

/// Version string bound into proof messages.
#[must_use]
pub fn make_version_string() -> String {
    format!("seraphis-tx-v{SEMANTIC_RULES_VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_carries_rules_version() {
        assert!(make_version_string().ends_with(&SEMANTIC_RULES_VERSION.to_string()));
    }
}
