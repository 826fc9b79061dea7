//! Presentation-ready report structures.
//!
//! Everything here is a pure transformation of a [`CohortSnapshot`]; the
//! same snapshot always yields the same structures.

use crate::aggregate::{self, ClassifiedGrade, Metric, StudentAggregate};
use crate::error::GradingError;
use crate::model::{Form, Level, Stream, Student, Subject, Term};
use crate::ranking::{self, Rankable, Ranked};
use crate::store::{CohortMember, CohortSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;

pub const ABSENT_DISPLAY: &str = "AB";
pub const ABSENT_COMMENT: &str = "Absent";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub form: Form,
    pub form_display: &'static str,
    pub stream: Stream,
    pub level: Level,
}

impl From<&Student> for StudentSummary {
    fn from(s: &Student) -> Self {
        Self {
            student_id: s.student_id.clone(),
            name: s.display_name(),
            first_name: s.first_name.clone(),
            last_name: s.last_name.clone(),
            form: s.form,
            form_display: s.form.display_name(),
            stream: s.stream(),
            level: s.level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Scored,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectEntry {
    pub subject_id: String,
    pub subject_name: String,
    pub status: EntryStatus,
    pub score: Option<f64>,
    pub display: String,
    pub grade: String,
    pub comment: String,
    pub label: Option<String>,
    pub passed: bool,
    /// Position among distinct scores for this subject in the form and term.
    pub position: Option<usize>,
}

impl SubjectEntry {
    fn scored(g: &ClassifiedGrade, position: Option<usize>) -> Self {
        Self {
            subject_id: g.subject_id.clone(),
            subject_name: g.subject_name.clone(),
            status: EntryStatus::Scored,
            score: Some(g.score),
            display: format!("{:.1}", g.score),
            grade: g.classification.mark.to_string(),
            comment: g.classification.comment.as_str().to_string(),
            label: Some(g.classification.label()),
            passed: g.classification.passed,
            position,
        }
    }

    fn absent(subject: &Subject) -> Self {
        Self {
            subject_id: subject.id.clone(),
            subject_name: subject.name.clone(),
            status: EntryStatus::Absent,
            score: None,
            display: ABSENT_DISPLAY.to_string(),
            grade: ABSENT_DISPLAY.to_string(),
            comment: ABSENT_COMMENT.to_string(),
            label: None,
            passed: false,
            position: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectHeader {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: StudentSummary,
    pub term: Term,
    pub term_display: &'static str,
    pub subjects: Vec<SubjectEntry>,
    pub aggregate: StudentAggregate,
    /// `None` when the student has no rankable metric for the term.
    pub position: Option<usize>,
    pub cohort_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRow {
    pub student: StudentSummary,
    pub subjects: Vec<SubjectEntry>,
    pub aggregate: StudentAggregate,
}

impl Rankable for ClassRow {
    fn metric(&self) -> Metric {
        self.aggregate.metric
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub student_id: String,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub form: Form,
    pub form_display: &'static str,
    pub term: Term,
    pub term_display: &'static str,
    pub level: Level,
    pub subjects: Vec<SubjectHeader>,
    pub rows: Vec<Ranked<ClassRow>>,
    pub failures: Vec<RowFailure>,
    pub total_students: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BulkOutcome {
    Generated { report: Box<StudentReport> },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEntry {
    pub student_id: String,
    pub last_name: String,
    #[serde(flatten)]
    pub outcome: BulkOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReports {
    pub form: Form,
    pub term: Term,
    pub entries: Vec<BulkEntry>,
    pub summary: BulkSummary,
}

/// Subjects actually graded in the form and term, or the full catalog when
/// nobody has been graded yet. Ordered by name.
pub fn effective_subjects(graded: &[Subject], catalog: &[Subject]) -> Vec<Subject> {
    let mut subjects = if graded.is_empty() {
        catalog.to_vec()
    } else {
        graded.to_vec()
    };
    subjects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    subjects
}

fn member_classified(
    member: &CohortMember,
    level: Level,
) -> Result<Vec<ClassifiedGrade>, GradingError> {
    match &member.grades {
        Ok(records) => aggregate::classify_grades(records, level),
        Err(e) => Err(e.clone()),
    }
}

fn sentinel_for(level: Level) -> Metric {
    match level {
        Level::Senior => Metric::Incomplete,
        Level::Junior => Metric::NoGrades,
    }
}

struct CohortEntry {
    student_id: String,
    metric: Metric,
}

impl Rankable for CohortEntry {
    fn metric(&self) -> Metric {
        self.metric
    }
}

/// Derived once per snapshot and shared by every per-student report.
struct CohortContext<'a> {
    snapshot: &'a CohortSnapshot,
    level: Level,
    subjects: Vec<Subject>,
    distinct_by_subject: BTreeMap<String, Vec<f64>>,
    ranking: Vec<Ranked<CohortEntry>>,
}

impl<'a> CohortContext<'a> {
    fn new(snapshot: &'a CohortSnapshot) -> Self {
        let level = snapshot.form.level();
        let subjects = effective_subjects(&snapshot.graded_subjects, &snapshot.catalog);

        // Only members whose grades classify contribute to subject positions.
        let mut scores_by_subject: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for member in &snapshot.members {
            let Ok(classified) = member_classified(member, level) else {
                continue;
            };
            for g in classified {
                scores_by_subject
                    .entry(g.subject_id)
                    .or_default()
                    .push(g.score);
            }
        }
        let distinct_by_subject = scores_by_subject
            .into_iter()
            .map(|(id, scores)| (id, ranking::distinct_scores_desc(&scores)))
            .collect();

        // Members whose grades cannot be classified rank as sentinels.
        let entries: Vec<CohortEntry> = snapshot
            .members
            .iter()
            .map(|m| CohortEntry {
                student_id: m.student.student_id.clone(),
                metric: member_classified(m, level)
                    .map(|c| aggregate::aggregate(&c, level).metric)
                    .unwrap_or_else(|_| sentinel_for(level)),
            })
            .collect();

        Self {
            snapshot,
            level,
            subjects,
            distinct_by_subject,
            ranking: ranking::rank(entries, level),
        }
    }

    fn subject_entries(&self, classified: &[ClassifiedGrade]) -> Vec<SubjectEntry> {
        self.subjects
            .iter()
            .map(|subject| {
                // Grades arrive newest first; a duplicate entry shows the newest.
                match classified.iter().find(|g| g.subject_id == subject.id) {
                    Some(g) => {
                        let position = self
                            .distinct_by_subject
                            .get(&subject.id)
                            .and_then(|d| ranking::subject_position(d, g.score));
                        SubjectEntry::scored(g, position)
                    }
                    None => SubjectEntry::absent(subject),
                }
            })
            .collect()
    }

    fn student_report(&self, member: &CohortMember) -> Result<StudentReport, GradingError> {
        let classified = member_classified(member, self.level)?;
        let aggregate = aggregate::aggregate(&classified, self.level);
        let position = if aggregate.metric.is_sentinel() {
            None
        } else {
            ranking::position_where(&self.ranking, |e| {
                e.student_id == member.student.student_id
            })
        };
        Ok(StudentReport {
            student: StudentSummary::from(&member.student),
            term: self.snapshot.term,
            term_display: self.snapshot.term.display_name(),
            subjects: self.subject_entries(&classified),
            aggregate,
            position,
            cohort_size: self.snapshot.members.len(),
        })
    }
}

pub fn build_student_report(
    snapshot: &CohortSnapshot,
    student_id: &str,
) -> Result<StudentReport, GradingError> {
    let member = snapshot
        .members
        .iter()
        .find(|m| m.student.student_id == student_id)
        .ok_or_else(|| {
            GradingError::NotFound(format!("student {} in {}", student_id, snapshot.form))
        })?;
    CohortContext::new(snapshot).student_report(member)
}

pub fn build_class_report(snapshot: &CohortSnapshot) -> ClassReport {
    let ctx = CohortContext::new(snapshot);
    let mut rows = Vec::new();
    let mut failures = Vec::new();

    for member in &snapshot.members {
        match member_classified(member, ctx.level) {
            Ok(classified) => rows.push(ClassRow {
                student: StudentSummary::from(&member.student),
                subjects: ctx.subject_entries(&classified),
                aggregate: aggregate::aggregate(&classified, ctx.level),
            }),
            Err(e) => failures.push(RowFailure {
                student_id: member.student.student_id.clone(),
                name: member.student.display_name(),
                message: e.to_string(),
            }),
        }
    }

    ClassReport {
        form: snapshot.form,
        form_display: snapshot.form.display_name(),
        term: snapshot.term,
        term_display: snapshot.term.display_name(),
        level: ctx.level,
        subjects: ctx
            .subjects
            .iter()
            .map(|s| SubjectHeader {
                id: s.id.clone(),
                name: s.name.clone(),
            })
            .collect(),
        total_students: snapshot.members.len(),
        rows: ranking::rank(rows, ctx.level),
        failures,
    }
}

/// One report per student. A student whose report cannot be built is
/// recorded as failed and the rest of the batch continues.
pub fn build_bulk_reports(snapshot: &CohortSnapshot) -> BulkReports {
    let ctx = CohortContext::new(snapshot);
    let entries: Vec<BulkEntry> = snapshot
        .members
        .iter()
        .map(|member| {
            let outcome = match ctx.student_report(member) {
                Ok(report) => BulkOutcome::Generated {
                    report: Box::new(report),
                },
                Err(e) => BulkOutcome::Failed {
                    message: e.to_string(),
                },
            };
            BulkEntry {
                student_id: member.student.student_id.clone(),
                last_name: member.student.last_name.clone(),
                outcome,
            }
        })
        .collect();

    let successful = entries
        .iter()
        .filter(|e| matches!(e.outcome, BulkOutcome::Generated { .. }))
        .count();
    BulkReports {
        form: snapshot.form,
        term: snapshot.term,
        summary: BulkSummary {
            total: entries.len(),
            successful,
            failed: entries.len() - successful,
        },
        entries,
    }
}
