//! Read-only query capabilities the engine depends on, and their SQLite implementation.

use crate::error::GradingError;
use crate::model::{Form, FormLevel, GradeRecord, Student, Subject, SubjectStream, Term};
use rusqlite::{Connection, OptionalExtension};

pub trait GradebookStore {
    fn find_student(&self, student_id: &str) -> Result<Option<Student>, GradingError>;

    /// Newest first.
    fn grades_for_student_term(
        &self,
        student_id: &str,
        term: Term,
    ) -> Result<Vec<GradeRecord>, GradingError>;

    /// Ordered by last name, first name.
    fn students_in_form(&self, form: Form) -> Result<Vec<Student>, GradingError>;

    /// Subjects anyone in `form` has a grade for in `term`, ordered by name.
    /// May be empty; callers fall back to [`GradebookStore::all_subjects`].
    fn subjects_graded(&self, form: Form, term: Term) -> Result<Vec<Subject>, GradingError>;

    fn all_subjects(&self) -> Result<Vec<Subject>, GradingError>;
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

type StudentRow = (String, String, String, String);
type SubjectRow = (String, String, String, String);

fn student_from_row((student_id, first_name, last_name, form): StudentRow) -> Result<Student, GradingError> {
    let form = Form::parse(&form).ok_or_else(|| {
        GradingError::Store(format!("student {} has unknown form {}", student_id, form))
    })?;
    Ok(Student {
        student_id,
        first_name,
        last_name,
        form,
    })
}

fn subject_from_row((id, name, stream, form_level): SubjectRow) -> Result<Subject, GradingError> {
    // Older rows may predate the restriction columns; treat unknown values as unrestricted.
    Ok(Subject {
        stream: SubjectStream::parse(&stream).unwrap_or(SubjectStream::All),
        form_level: FormLevel::parse(&form_level).unwrap_or(FormLevel::All),
        id,
        name,
    })
}

impl GradebookStore for SqliteStore<'_> {
    fn find_student(&self, student_id: &str) -> Result<Option<Student>, GradingError> {
        let row: Option<StudentRow> = self
            .conn
            .query_row(
                "SELECT student_id, first_name, last_name, form
                 FROM students
                 WHERE student_id = ?",
                [student_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;
        row.map(student_from_row).transpose()
    }

    fn grades_for_student_term(
        &self,
        student_id: &str,
        term: Term,
    ) -> Result<Vec<GradeRecord>, GradingError> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.student_id, g.subject_id, s.name, g.score, g.created_at
             FROM grades g
             JOIN subjects s ON s.id = g.subject_id
             WHERE g.student_id = ? AND g.term = ?
             ORDER BY g.created_at DESC, g.rowid DESC",
        )?;
        let rows = stmt
            .query_map((student_id, term.code()), |r| {
                Ok(GradeRecord {
                    id: r.get(0)?,
                    student_id: r.get(1)?,
                    subject_id: r.get(2)?,
                    subject_name: r.get(3)?,
                    term,
                    score: r.get(4)?,
                    created_at: r.get(5)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn students_in_form(&self, form: Form) -> Result<Vec<Student>, GradingError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, first_name, last_name, form
             FROM students
             WHERE form = ?
             ORDER BY last_name, first_name, student_id",
        )?;
        let rows: Vec<StudentRow> = stmt
            .query_map([form.code()], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        rows.into_iter().map(student_from_row).collect()
    }

    fn subjects_graded(&self, form: Form, term: Term) -> Result<Vec<Subject>, GradingError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT s.id, s.name, s.stream, s.form_level
             FROM subjects s
             JOIN grades g ON g.subject_id = s.id
             JOIN students st ON st.student_id = g.student_id
             WHERE st.form = ? AND g.term = ?
             ORDER BY s.name, s.id",
        )?;
        let rows: Vec<SubjectRow> = stmt
            .query_map((form.code(), term.code()), |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        rows.into_iter().map(subject_from_row).collect()
    }

    fn all_subjects(&self) -> Result<Vec<Subject>, GradingError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, stream, form_level
             FROM subjects
             ORDER BY name, id",
        )?;
        let rows: Vec<SubjectRow> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        rows.into_iter().map(subject_from_row).collect()
    }
}

/// One student and the outcome of loading their grades for the term.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortMember {
    pub student: Student,
    pub grades: Result<Vec<GradeRecord>, GradingError>,
}

/// Everything the report builder needs for one form and term.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortSnapshot {
    pub form: Form,
    pub term: Term,
    pub members: Vec<CohortMember>,
    pub graded_subjects: Vec<Subject>,
    pub catalog: Vec<Subject>,
}

/// Reads a cohort. A failure loading one student's grades is kept on that
/// member instead of failing the whole snapshot.
pub fn load_cohort(
    store: &dyn GradebookStore,
    form: Form,
    term: Term,
) -> Result<CohortSnapshot, GradingError> {
    let students = store.students_in_form(form)?;
    let graded_subjects = store.subjects_graded(form, term)?;
    let catalog = store.all_subjects()?;

    let members = students
        .into_iter()
        .map(|student| {
            let grades = store.grades_for_student_term(&student.student_id, term);
            if let Err(e) = &grades {
                tracing::warn!(student = %student.student_id, error = %e, "grade query failed");
            }
            CohortMember { student, grades }
        })
        .collect();

    Ok(CohortSnapshot {
        form,
        term,
        members,
        graded_subjects,
        catalog,
    })
}
