//! Response Budget Policy
//!
//! Maps the word count of the final outgoing message onto a response-size
//! ceiling and a creativity value for the chosen role.
//!
//! ## Step Tables
//!
//! Each role owns a [`BudgetTable`]: an ascending list of
//! `(max_words, max_tokens)` steps plus a fallback ceiling for anything
//! longer than the last step. Longer input never yields a smaller ceiling.
//!
//! | Role           | ≤ words → ceiling                                   | else |
//! |----------------|-----------------------------------------------------|------|
//! | conversational | 5→20, 15→80, 50→200, 500→400                        | 800  |
//! | analytical     | 10→150, 30→350, 100→600, 500→1200, 2000→2000        | 3000 |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chat::{Role, RoleProfile};
use crate::config::Config;
use crate::types::word_count;

// =============================================================================
// Step Table
// =============================================================================

/// One step of a budget table: messages of at most `max_words` words get
/// `max_tokens` response units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStep {
    pub max_words: usize,
    pub max_tokens: u32,
}

/// Ordered step table with a fallback ceiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetTable {
    pub steps: Vec<BudgetStep>,
    pub fallback: u32,
}

/// Why a budget table was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetTableError {
    /// Step thresholds must be strictly ascending
    UnorderedThreshold { index: usize },
    /// Ceilings must never shrink as thresholds grow
    DecreasingCeiling { index: usize },
    /// Fallback must be at least the last step's ceiling
    FallbackTooSmall { fallback: u32, last: u32 },
    /// Ceilings must be positive
    ZeroCeiling,
}

impl fmt::Display for BudgetTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnorderedThreshold { index } => {
                write!(f, "step {} threshold is not above the previous one", index)
            }
            Self::DecreasingCeiling { index } => {
                write!(f, "step {} ceiling is below the previous one", index)
            }
            Self::FallbackTooSmall { fallback, last } => write!(
                f,
                "fallback {} is below the last step ceiling {}",
                fallback, last
            ),
            Self::ZeroCeiling => write!(f, "ceilings must be greater than 0"),
        }
    }
}

impl std::error::Error for BudgetTableError {}

impl BudgetTable {
    /// Build a table from `(max_words, max_tokens)` pairs
    pub fn from_steps(steps: &[(usize, u32)], fallback: u32) -> Self {
        Self {
            steps: steps
                .iter()
                .map(|&(max_words, max_tokens)| BudgetStep {
                    max_words,
                    max_tokens,
                })
                .collect(),
            fallback,
        }
    }

    /// Check ordering so the table stays monotone in the word count
    pub fn validate(&self) -> std::result::Result<(), BudgetTableError> {
        if self.fallback == 0 || self.steps.iter().any(|s| s.max_tokens == 0) {
            return Err(BudgetTableError::ZeroCeiling);
        }

        for (index, pair) in self.steps.windows(2).enumerate() {
            if pair[1].max_words <= pair[0].max_words {
                return Err(BudgetTableError::UnorderedThreshold { index: index + 1 });
            }
            if pair[1].max_tokens < pair[0].max_tokens {
                return Err(BudgetTableError::DecreasingCeiling { index: index + 1 });
            }
        }

        if let Some(last) = self.steps.last()
            && self.fallback < last.max_tokens
        {
            return Err(BudgetTableError::FallbackTooSmall {
                fallback: self.fallback,
                last: last.max_tokens,
            });
        }

        Ok(())
    }

    /// Ceiling for a message of `words` words: first step whose threshold
    /// is not exceeded, else the fallback
    pub fn ceiling(&self, words: usize) -> u32 {
        self.steps
            .iter()
            .find(|step| words <= step.max_words)
            .map(|step| step.max_tokens)
            .unwrap_or(self.fallback)
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Response-size ceiling and creativity for one outgoing message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetResult {
    pub max_response_units: u32,
    pub creativity: f32,
}

/// Per-role budget tables and creativity values
#[derive(Debug, Clone)]
pub struct TextBudgetPolicy {
    conversational: (BudgetTable, f32),
    analytical: (BudgetTable, f32),
}

impl Default for TextBudgetPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl TextBudgetPolicy {
    pub fn new(
        conversational: BudgetTable,
        conversational_creativity: f32,
        analytical: BudgetTable,
        analytical_creativity: f32,
    ) -> Self {
        Self {
            conversational: (conversational, conversational_creativity),
            analytical: (analytical, analytical_creativity),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let conversational = RoleProfile::from_config(Role::Conversational, config);
        let analytical = RoleProfile::from_config(Role::Analytical, config);
        Self::new(
            conversational.budget_table,
            conversational.temperature,
            analytical.budget_table,
            analytical.temperature,
        )
    }

    /// Table in effect for a role
    pub fn table(&self, role: Role) -> &BudgetTable {
        match role {
            Role::Conversational => &self.conversational.0,
            Role::Analytical => &self.analytical.0,
        }
    }

    /// Budget for the final outgoing message (attachment prefix included)
    pub fn compute_budget(&self, role: Role, message: &str) -> BudgetResult {
        let (table, creativity) = match role {
            Role::Conversational => &self.conversational,
            Role::Analytical => &self.analytical,
        };

        BudgetResult {
            max_response_units: table.ceiling(word_count(message)),
            creativity: *creativity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(n: usize) -> String {
        vec!["wort"; n].join(" ")
    }

    #[test]
    fn test_conversational_steps() {
        let policy = TextBudgetPolicy::default();
        let cases = [
            (0, 20),
            (5, 20),
            (6, 80),
            (15, 80),
            (16, 200),
            (50, 200),
            (51, 400),
            (500, 400),
            (501, 800),
        ];
        for (n, expected) in cases {
            let result = policy.compute_budget(Role::Conversational, &words(n));
            assert_eq!(result.max_response_units, expected, "{} words", n);
            assert_eq!(result.creativity, 0.5);
        }
    }

    #[test]
    fn test_analytical_steps() {
        let policy = TextBudgetPolicy::default();
        let cases = [
            (6, 150),
            (10, 150),
            (11, 350),
            (30, 350),
            (100, 600),
            (101, 1200),
            (2000, 2000),
            (2001, 3000),
        ];
        for (n, expected) in cases {
            let result = policy.compute_budget(Role::Analytical, &words(n));
            assert_eq!(result.max_response_units, expected, "{} words", n);
            assert_eq!(result.creativity, 0.3);
        }
    }

    #[test]
    fn test_counts_attachment_prefix() {
        let policy = TextBudgetPolicy::default();
        let message = format!("[File: notes.txt]\n\n{}\n\n---\n\nhi", words(20));
        // 20 body words + "[File:" "notes.txt]" "---" "hi"
        assert_eq!(
            policy.compute_budget(Role::Analytical, &message).max_response_units,
            350
        );
    }

    #[test]
    fn test_validate_default_tables() {
        let config = Config::default();
        assert!(config.budget.conversational.validate().is_ok());
        assert!(config.budget.analytical.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        assert_eq!(
            BudgetTable::from_steps(&[(10, 20), (5, 80)], 100).validate(),
            Err(BudgetTableError::UnorderedThreshold { index: 1 })
        );
        assert_eq!(
            BudgetTable::from_steps(&[(5, 200), (15, 80)], 800).validate(),
            Err(BudgetTableError::DecreasingCeiling { index: 1 })
        );
        assert_eq!(
            BudgetTable::from_steps(&[(5, 200)], 100).validate(),
            Err(BudgetTableError::FallbackTooSmall {
                fallback: 100,
                last: 200
            })
        );
        assert_eq!(
            BudgetTable::from_steps(&[], 0).validate(),
            Err(BudgetTableError::ZeroCeiling)
        );
    }

    #[test]
    fn test_empty_table_uses_fallback() {
        let table = BudgetTable::from_steps(&[], 64);
        assert_eq!(table.ceiling(0), 64);
        assert_eq!(table.ceiling(10_000), 64);
    }

    proptest! {
        #[test]
        fn prop_budget_monotone_in_word_count(a in 0usize..3000, b in 0usize..3000) {
            let policy = TextBudgetPolicy::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for role in Role::ALL {
                let small = policy.compute_budget(role, &words(lo)).max_response_units;
                let large = policy.compute_budget(role, &words(hi)).max_response_units;
                prop_assert!(small <= large);
            }
        }
    }
}
