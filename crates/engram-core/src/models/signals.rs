use std::fmt;

use serde::{Deserialize, Serialize};

/// What the user was trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Question,
    Command,
    Request,
    #[default]
    Statement,
    Feedback,
    Greeting,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::Question,
        Intent::Command,
        Intent::Request,
        Intent::Statement,
        Intent::Feedback,
        Intent::Greeting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Command => "command",
            Self::Request => "request",
            Self::Statement => "statement",
            Self::Feedback => "feedback",
            Self::Greeting => "greeting",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse complexity tier of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    /// Ordinal used for compatibility checks.
    pub fn tier(self) -> u8 {
        match self {
            Self::Simple => 0,
            Self::Moderate => 1,
            Self::Complex => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }
}

/// How time-sensitive the user made the exchange sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Heuristic signals computed inline at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SignalBundle {
    pub intent: Intent,
    pub complexity: Complexity,
    /// Density of technical vocabulary, in [0, 1].
    pub technical_depth: f64,
    pub urgency: Urgency,
    pub has_code: bool,
    pub has_error: bool,
}

impl SignalBundle {
    /// Clamp the numeric fields into their documented ranges.
    pub fn normalized(mut self) -> Self {
        self.technical_depth = if self.technical_depth.is_finite() {
            self.technical_depth.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}
