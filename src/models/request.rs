//! Intent, requirements, and the pieces the text parser and analyzer fill in.

use serde::{Deserialize, Serialize};

/// One of the five conversational modes (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Gift,
    Value,
    Bundle,
    Review,
    Trend,
}

impl Intent {
    /// Parses a model-authored intent label, defaulting callers decide on `None`
    /// rather than silently picking VALUE here — see `analyzer::classify`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "GIFT" => Some(Intent::Gift),
            "VALUE" => Some(Intent::Value),
            "BUNDLE" => Some(Intent::Bundle),
            "REVIEW" => Some(Intent::Review),
            "TREND" => Some(Intent::Trend),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Gift => "GIFT",
            Intent::Value => "VALUE",
            Intent::Bundle => "BUNDLE",
            Intent::Review => "REVIEW",
            Intent::Trend => "TREND",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min_price: i64,
    pub max_price: i64,
    pub total_budget: Option<i64>,
    pub is_flexible: bool,
}

/// Enumerated relation set from spec §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Friend,
    Colleague,
    Boss,
    Parent,
    Mother,
    Father,
    Girlfriend,
    Boyfriend,
    Wife,
    Husband,
    Child,
    Son,
    Daughter,
    Teacher,
    Professor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occasion {
    Birthday,
    Farewell,
    Welcome,
    Promotion,
    Wedding,
    Anniversary,
    Christmas,
    Valentine,
    Whiteday,
    ParentsDay,
    TeachersDay,
    Graduation,
    Enrollment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipientInfo {
    pub relation: Option<Relation>,
    pub gender: Option<Gender>,
    pub age_group: Option<String>,
    pub occasion: Option<Occasion>,
}

impl RecipientInfo {
    pub fn is_empty(&self) -> bool {
        self.relation.is_none()
            && self.gender.is_none()
            && self.age_group.is_none()
            && self.occasion.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    pub exclude_used: bool,
    pub exclude_rental: bool,
    pub exclude_overseas: bool,
    pub brand_blacklist: Vec<String>,
    pub delivery_deadline: Option<chrono::NaiveDate>,
}

impl Default for Constraints {
    /// Analyzer post-processing sets all three exclusion flags true (spec §4.6).
    fn default() -> Self {
        Constraints {
            exclude_used: true,
            exclude_rental: true,
            exclude_overseas: true,
            brand_blacklist: Vec::new(),
            delivery_deadline: None,
        }
    }
}

/// Which requirement fields the analyzer found missing, per spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    Items,
    Recipient,
    Budget,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Requirements {
    pub budget: Option<BudgetRange>,
    pub items: Vec<String>,
    pub recipient: Option<RecipientInfo>,
    pub constraints: Constraints,
    pub missing_fields: Vec<MissingField>,
    pub clarify_count: u8,
}

impl Requirements {
    /// Clamps to [0, 2] per spec §3; the orchestrator must never push this past 2.
    pub fn bump_clarify_count(&mut self) {
        self.clarify_count = (self.clarify_count + 1).min(2);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f32,
    pub secondary: Option<Vec<Intent>>,
}
