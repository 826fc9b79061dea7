//! Score classification.
//!
//! Juniors (F1/F2) are graded on a letter scale, seniors (F3/F4) on a point
//! scale where 1 is best and 9 is worst. Bands are inclusive on their lower
//! bound and cover 0..=100 without gaps.

use crate::error::GradingError;
use crate::model::Level;
use serde::Serialize;
use std::fmt;

/// Scores at or above this pass on the junior scale.
pub const JUNIOR_PASS_MARK: f64 = 40.0;
/// Senior points at or below this pass.
pub const SENIOR_PASS_POINT_MAX: u8 = 8;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comment {
    #[serde(rename = "EXCELLENT")]
    Excellent,
    #[serde(rename = "VERY GOOD")]
    VeryGood,
    #[serde(rename = "GOOD")]
    Good,
    #[serde(rename = "DISTINCTION")]
    Distinction,
    #[serde(rename = "STRONG CREDIT")]
    StrongCredit,
    #[serde(rename = "CREDIT")]
    Credit,
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl Comment {
    pub fn as_str(self) -> &'static str {
        match self {
            Comment::Excellent => "EXCELLENT",
            Comment::VeryGood => "VERY GOOD",
            Comment::Good => "GOOD",
            Comment::Distinction => "DISTINCTION",
            Comment::StrongCredit => "STRONG CREDIT",
            Comment::Credit => "CREDIT",
            Comment::Pass => "PASS",
            Comment::Fail => "FAIL",
        }
    }
}

/// Letter for juniors, point for seniors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Mark {
    Letter(Letter),
    Point(u8),
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Letter(l) => write!(f, "{:?}", l),
            Mark::Point(p) => write!(f, "{}", p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub mark: Mark,
    pub comment: Comment,
    pub passed: bool,
}

impl Classification {
    pub fn point(&self) -> Option<u8> {
        match self.mark {
            Mark::Point(p) => Some(p),
            Mark::Letter(_) => None,
        }
    }

    /// "A (EXCELLENT)", "3 (STRONG CREDIT)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.mark, self.comment.as_str())
    }
}

const JUNIOR_BANDS: [(f64, Letter, Comment); 4] = [
    (80.0, Letter::A, Comment::Excellent),
    (70.0, Letter::B, Comment::VeryGood),
    (60.0, Letter::C, Comment::Good),
    (40.0, Letter::D, Comment::Pass),
];

const SENIOR_BANDS: [(f64, u8, Comment); 8] = [
    (80.0, 1, Comment::Distinction),
    (70.0, 2, Comment::Distinction),
    (65.0, 3, Comment::StrongCredit),
    (60.0, 4, Comment::Credit),
    (55.0, 5, Comment::Credit),
    (50.0, 6, Comment::Credit),
    (45.0, 7, Comment::Pass),
    (40.0, 8, Comment::Pass),
];

pub fn validate_score(score: f64) -> Result<f64, GradingError> {
    if !score.is_finite() {
        return Err(GradingError::Validation(format!(
            "{} is not a finite number",
            score
        )));
    }
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(GradingError::Validation(format!(
            "{} is outside {}..={}",
            score, MIN_SCORE, MAX_SCORE
        )));
    }
    Ok(score)
}

pub fn classify(score: f64, level: Level) -> Result<Classification, GradingError> {
    let score = validate_score(score)?;
    Ok(match level {
        Level::Junior => classify_junior(score),
        Level::Senior => classify_senior(score),
    })
}

fn classify_junior(score: f64) -> Classification {
    let (letter, comment) = JUNIOR_BANDS
        .iter()
        .find(|(floor, _, _)| score >= *floor)
        .map(|(_, l, c)| (*l, *c))
        .unwrap_or((Letter::F, Comment::Fail));
    Classification {
        mark: Mark::Letter(letter),
        comment,
        passed: score >= JUNIOR_PASS_MARK,
    }
}

fn classify_senior(score: f64) -> Classification {
    let (point, comment) = SENIOR_BANDS
        .iter()
        .find(|(floor, _, _)| score >= *floor)
        .map(|(_, p, c)| (*p, *c))
        .unwrap_or((9, Comment::Fail));
    Classification {
        mark: Mark::Point(point),
        comment,
        passed: point <= SENIOR_PASS_POINT_MAX,
    }
}

/// Accepts a JSON number or a numeric string. Never clamps.
pub fn parse_score(raw: &serde_json::Value) -> Result<f64, GradingError> {
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(score) = parsed else {
        return Err(GradingError::Validation(format!("{} is not numeric", raw)));
    };
    validate_score(score)
}

/// Scores are kept at two decimal places.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOUNDARIES: [f64; 18] = [
        0.0, 39.0, 40.0, 44.0, 45.0, 49.0, 50.0, 54.0, 55.0, 59.0, 60.0, 64.0, 65.0, 69.0, 70.0,
        79.0, 80.0, 100.0,
    ];

    fn junior(score: f64) -> Classification {
        classify(score, Level::Junior).expect("valid score")
    }

    fn senior(score: f64) -> Classification {
        classify(score, Level::Senior).expect("valid score")
    }

    #[test]
    fn junior_boundary_table() {
        let expected = [
            (0.0, Letter::F, Comment::Fail, false),
            (39.0, Letter::F, Comment::Fail, false),
            (40.0, Letter::D, Comment::Pass, true),
            (44.0, Letter::D, Comment::Pass, true),
            (45.0, Letter::D, Comment::Pass, true),
            (49.0, Letter::D, Comment::Pass, true),
            (50.0, Letter::D, Comment::Pass, true),
            (54.0, Letter::D, Comment::Pass, true),
            (55.0, Letter::D, Comment::Pass, true),
            (59.0, Letter::D, Comment::Pass, true),
            (60.0, Letter::C, Comment::Good, true),
            (64.0, Letter::C, Comment::Good, true),
            (65.0, Letter::C, Comment::Good, true),
            (69.0, Letter::C, Comment::Good, true),
            (70.0, Letter::B, Comment::VeryGood, true),
            (79.0, Letter::B, Comment::VeryGood, true),
            (80.0, Letter::A, Comment::Excellent, true),
            (100.0, Letter::A, Comment::Excellent, true),
        ];
        for (score, letter, comment, passed) in expected {
            let c = junior(score);
            assert_eq!(c.mark, Mark::Letter(letter), "score {}", score);
            assert_eq!(c.comment, comment, "score {}", score);
            assert_eq!(c.passed, passed, "score {}", score);
        }
    }

    #[test]
    fn senior_boundary_table() {
        let expected: [(f64, u8, Comment); 18] = [
            (0.0, 9, Comment::Fail),
            (39.0, 9, Comment::Fail),
            (40.0, 8, Comment::Pass),
            (44.0, 8, Comment::Pass),
            (45.0, 7, Comment::Pass),
            (49.0, 7, Comment::Pass),
            (50.0, 6, Comment::Credit),
            (54.0, 6, Comment::Credit),
            (55.0, 5, Comment::Credit),
            (59.0, 5, Comment::Credit),
            (60.0, 4, Comment::Credit),
            (64.0, 4, Comment::Credit),
            (65.0, 3, Comment::StrongCredit),
            (69.0, 3, Comment::StrongCredit),
            (70.0, 2, Comment::Distinction),
            (79.0, 2, Comment::Distinction),
            (80.0, 1, Comment::Distinction),
            (100.0, 1, Comment::Distinction),
        ];
        for (score, point, comment) in expected {
            let c = senior(score);
            assert_eq!(c.point(), Some(point), "score {}", score);
            assert_eq!(c.comment, comment, "score {}", score);
            assert_eq!(c.passed, point <= 8, "score {}", score);
        }
    }

    #[test]
    fn labels_match_report_wording() {
        assert_eq!(junior(80.0).label(), "A (EXCELLENT)");
        assert_eq!(junior(79.0).label(), "B (VERY GOOD)");
        assert_eq!(junior(40.0).label(), "D (PASS)");
        assert_eq!(junior(39.0).label(), "F (FAIL)");
        assert_eq!(senior(65.0).label(), "3 (STRONG CREDIT)");
        assert_eq!(senior(39.0).label(), "9 (FAIL)");
    }

    #[test]
    fn junior_letters_never_improve_as_score_drops() {
        let mut prev = Letter::A;
        let mut s = 100.0;
        while s >= 0.0 {
            let Mark::Letter(l) = junior(s).mark else {
                panic!("junior score {} produced a point", s);
            };
            assert!(l >= prev, "letter improved at {}", s);
            prev = l;
            s -= 0.25;
        }
    }

    #[test]
    fn senior_points_never_improve_as_score_drops() {
        let mut prev = 1;
        let mut s = 100.0;
        while s >= 0.0 {
            let p = senior(s).point().expect("senior point");
            assert!((1..=9).contains(&p));
            assert!(p >= prev, "point improved at {}", s);
            prev = p;
            s -= 0.25;
        }
    }

    #[test]
    fn fractional_scores_use_lower_band() {
        assert_eq!(junior(79.99).mark, Mark::Letter(Letter::B));
        assert_eq!(senior(39.99).point(), Some(9));
        assert!(!junior(39.99).passed);
    }

    #[test]
    fn boundaries_classify_without_error() {
        for s in BOUNDARIES {
            assert!(classify(s, Level::Junior).is_ok());
            assert!(classify(s, Level::Senior).is_ok());
        }
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        for s in [-0.01, 100.01, f64::NAN, f64::INFINITY] {
            let e = classify(s, Level::Junior).expect_err("rejected");
            assert_eq!(e.code(), "bad_params");
        }
    }

    #[test]
    fn parse_score_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_score(&json!(72.5)).expect("number"), 72.5);
        assert_eq!(parse_score(&json!(" 64 ")).expect("string"), 64.0);
        assert!(parse_score(&json!("abc")).is_err());
        assert!(parse_score(&json!(null)).is_err());
        assert!(parse_score(&json!(150)).is_err());
    }

    #[test]
    fn round_score_keeps_two_decimals() {
        assert_eq!(round_score(72.456), 72.46);
        assert_eq!(round_score(40.0), 40.0);
    }
}
