//! Keyword-driven command intent classification.
//!
//! Rules are evaluated in order and the first whose trigger words appear in
//! the lower-cased command decides the family; within a family the first
//! matching branch picks the concrete intent. Analysis verbs are checked
//! before update verbs, so "calculate the new total after a 10% increase"
//! is a read operation.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandIntent {
    SumAnalysis,
    TopAnalysis,
    AverageAnalysis,
    SalaryUpdate,
    BonusUpdate,
    GeneralUpdate,
    ReadAnalysis,
    ComprehensiveAnalysis,
}

impl CommandIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandIntent::SumAnalysis => "sum_analysis",
            CommandIntent::TopAnalysis => "top_analysis",
            CommandIntent::AverageAnalysis => "average_analysis",
            CommandIntent::SalaryUpdate => "salary_update",
            CommandIntent::BonusUpdate => "bonus_update",
            CommandIntent::GeneralUpdate => "general_update",
            CommandIntent::ReadAnalysis => "read_analysis",
            CommandIntent::ComprehensiveAnalysis => "comprehensive_analysis",
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(
            self,
            CommandIntent::SalaryUpdate | CommandIntent::BonusUpdate | CommandIntent::GeneralUpdate
        )
    }
}

impl fmt::Display for CommandIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A family of intents triggered by any of `triggers`.
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub triggers: &'static [&'static str],
    pub branches: &'static [(&'static [&'static str], CommandIntent)],
    pub fallback: CommandIntent,
}

impl IntentRule {
    /// Returns the intent for `lowered` when this rule fires.
    pub fn evaluate(&self, lowered: &str) -> Option<CommandIntent> {
        if !contains_any(lowered, self.triggers) {
            return None;
        }
        let intent = self
            .branches
            .iter()
            .find(|(keywords, _)| contains_any(lowered, keywords))
            .map(|(_, intent)| *intent)
            .unwrap_or(self.fallback);
        Some(intent)
    }
}

pub const ANALYSIS_RULE: IntentRule = IntentRule {
    triggers: &["calculate", "sum", "total", "analyze", "show"],
    branches: &[
        (
            &["top", "best", "highest", "maximum"],
            CommandIntent::TopAnalysis,
        ),
        (&["average", "mean", "avg"], CommandIntent::AverageAnalysis),
    ],
    fallback: CommandIntent::SumAnalysis,
};

pub const UPDATE_RULE: IntentRule = IntentRule {
    triggers: &["update", "increase", "decrease", "modify", "change"],
    branches: &[
        (&["salary", "pay", "compensation"], CommandIntent::SalaryUpdate),
        (&["bonus", "incentive"], CommandIntent::BonusUpdate),
    ],
    fallback: CommandIntent::GeneralUpdate,
};

pub const READ_RULE: IntentRule = IntentRule {
    triggers: &["read", "load", "open", "display"],
    branches: &[],
    fallback: CommandIntent::ReadAnalysis,
};

pub const INTENT_RULES: &[IntentRule] = &[ANALYSIS_RULE, UPDATE_RULE, READ_RULE];

pub fn classify(command: &str) -> CommandIntent {
    let lowered = command.to_lowercase();
    INTENT_RULES
        .iter()
        .find_map(|rule| rule.evaluate(&lowered))
        .unwrap_or(CommandIntent::ComprehensiveAnalysis)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
