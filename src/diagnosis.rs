use serde::{Deserialize, Serialize};

pub const THRESHOLD: f32 = 0.5;

const POSITIVE_MSG: &str = "COVID-19 found. Consult a doctor";
const NEGATIVE_MSG: &str = "COVID-19 not found. You are fine!!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub msg: String,
    pub code: u8,
}

impl Diagnosis {
    pub fn positive() -> Self {
        Self {
            msg: POSITIVE_MSG.to_string(),
            code: 1,
        }
    }

    pub fn negative() -> Self {
        Self {
            msg: NEGATIVE_MSG.to_string(),
            code: 0,
        }
    }

    /// The threshold is inclusive: a score of exactly 0.5 is positive.
    pub fn from_score(score: f32) -> Self {
        if score >= THRESHOLD {
            Self::positive()
        } else {
            Self::negative()
        }
    }
}
