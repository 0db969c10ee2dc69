//! Built-in template challenges.

use serde::Serialize;

/// A preset target offered when creating a template challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChallengeTemplate {
    pub key: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    /// Minor units.
    pub target_amount: i64,
    pub total_weeks: u32,
}

pub const TEMPLATES: &[ChallengeTemplate] = &[
    ChallengeTemplate {
        key: "classic-5k",
        title: "5K in a year",
        icon: "piggy-bank",
        target_amount: 500_000,
        total_weeks: 52,
    },
    ChallengeTemplate {
        key: "classic-10k",
        title: "10K in a year",
        icon: "vault",
        target_amount: 1_000_000,
        total_weeks: 52,
    },
];

/// Look a template up by key.
pub fn find_template(key: &str) -> Option<&'static ChallengeTemplate> {
    TEMPLATES.iter().find(|t| t.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_templates() {
        assert_eq!(find_template("classic-5k").map(|t| t.target_amount), Some(500_000));
        assert_eq!(find_template("classic-10k").map(|t| t.target_amount), Some(1_000_000));
        assert!(find_template("classic-1m").is_none());
    }
}
