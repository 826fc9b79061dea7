//! Per-student, per-term summary of classified grades.

use crate::error::GradingError;
use crate::grading::{self, Classification};
use crate::model::{is_english_name, GradeRecord, Level};
use serde::{Serialize, Serializer};

/// Passing grades needed for an overall pass.
pub const REQUIRED_PASSES: usize = 6;
/// Seniors are ranked on the sum of their best (lowest) points in this many subjects.
pub const SENIOR_BEST_OF: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedGrade {
    pub grade_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub score: f64,
    pub classification: Classification,
}

impl ClassifiedGrade {
    pub fn is_english(&self) -> bool {
        is_english_name(&self.subject_name)
    }
}

pub fn classify_grades(
    records: &[GradeRecord],
    level: Level,
) -> Result<Vec<ClassifiedGrade>, GradingError> {
    records
        .iter()
        .map(|r| {
            let classification = grading::classify(r.score, level).map_err(|e| match e {
                GradingError::Validation(msg) => {
                    GradingError::Validation(format!("{} grade {}: {}", r.subject_name, r.id, msg))
                }
                other => other,
            })?;
            Ok(ClassifiedGrade {
                grade_id: r.id.clone(),
                subject_id: r.subject_id.clone(),
                subject_name: r.subject_name.clone(),
                score: r.score,
                classification,
            })
        })
        .collect()
}

/// The value a student is ranked on.
///
/// `Incomplete` and `NoGrades` are sentinels that always rank last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Metric {
    /// Sum of the best senior points; lower is better.
    Points(u32),
    /// Mean junior score; higher is better.
    Average(f64),
    Incomplete,
    NoGrades,
}

impl Metric {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Metric::Incomplete | Metric::NoGrades)
    }

    pub fn display(&self) -> String {
        match self {
            Metric::Points(p) => format!("{} pts", p),
            Metric::Average(a) => format!("{:.1}%", a),
            Metric::Incomplete => "Incomplete".to_string(),
            Metric::NoGrades => "No grades".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallResult {
    Pass,
    Fail,
    FailMissingEnglish,
}

impl OverallResult {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallResult::Pass => "Pass",
            OverallResult::Fail => "Fail",
            OverallResult::FailMissingEnglish => "Fail - missing English",
        }
    }
}

impl Serialize for OverallResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAggregate {
    pub metric: Metric,
    pub display_metric: String,
    pub pass_count: usize,
    pub total_subjects: usize,
    /// English plus the best five other points; seniors with an English grade only.
    pub english_anchored_points: Option<u32>,
    pub overall_result: OverallResult,
}

pub fn aggregate(grades: &[ClassifiedGrade], level: Level) -> StudentAggregate {
    let pass_count = grades.iter().filter(|g| g.classification.passed).count();
    let english = grades.iter().find(|g| g.is_english());

    let (metric, english_anchored_points, overall_result) = match level {
        Level::Senior => {
            let mut points: Vec<u32> = grades
                .iter()
                .filter_map(|g| g.classification.point())
                .map(u32::from)
                .collect();
            points.sort_unstable();
            let metric = if points.len() < SENIOR_BEST_OF {
                Metric::Incomplete
            } else {
                Metric::Points(points.iter().take(SENIOR_BEST_OF).sum())
            };

            let (anchored, result) = match english {
                None => (None, OverallResult::FailMissingEnglish),
                Some(eng) => {
                    let anchored = english_anchored(grades, eng);
                    let result = if pass_count >= REQUIRED_PASSES && eng.classification.passed {
                        OverallResult::Pass
                    } else {
                        OverallResult::Fail
                    };
                    (anchored, result)
                }
            };
            (metric, anchored, result)
        }
        Level::Junior => {
            let metric = if grades.is_empty() {
                Metric::NoGrades
            } else {
                let sum: f64 = grades.iter().map(|g| g.score).sum();
                Metric::Average(sum / grades.len() as f64)
            };
            let english_passed = english.map(|g| g.classification.passed).unwrap_or(false);
            let result = if pass_count >= REQUIRED_PASSES && english_passed {
                OverallResult::Pass
            } else {
                OverallResult::Fail
            };
            (metric, None, result)
        }
    };

    StudentAggregate {
        display_metric: metric.display(),
        metric,
        pass_count,
        total_subjects: grades.len(),
        english_anchored_points,
        overall_result,
    }
}

fn english_anchored(grades: &[ClassifiedGrade], english: &ClassifiedGrade) -> Option<u32> {
    let english_point = u32::from(english.classification.point()?);
    let mut others: Vec<u32> = grades
        .iter()
        .filter(|g| !g.is_english())
        .filter_map(|g| g.classification.point())
        .map(u32::from)
        .collect();
    others.sort_unstable();
    Some(english_point + others.iter().take(SENIOR_BEST_OF - 1).sum::<u32>())
}
