use serde::{Deserialize, Serialize};
use std::fmt;

/// A year-group cohort. F3 and F4 are split by stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Form {
    F1,
    F2,
    F3S,
    F3H,
    F4S,
    F4H,
}

impl Form {
    pub const ALL: [Form; 6] = [Form::F1, Form::F2, Form::F3S, Form::F3H, Form::F4S, Form::F4H];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "F1" => Some(Self::F1),
            "F2" => Some(Self::F2),
            "F3S" => Some(Self::F3S),
            "F3H" => Some(Self::F3H),
            "F4S" => Some(Self::F4S),
            "F4H" => Some(Self::F4H),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::F1 => "F1",
            Self::F2 => "F2",
            Self::F3S => "F3S",
            Self::F3H => "F3H",
            Self::F4S => "F4S",
            Self::F4H => "F4H",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::F1 => "Form 1",
            Self::F2 => "Form 2",
            Self::F3S => "Form 3 Science",
            Self::F3H => "Form 3 Humanities",
            Self::F4S => "Form 4 Science",
            Self::F4H => "Form 4 Humanities",
        }
    }

    /// Stream is a pure function of the form; it is never stored.
    pub fn stream(self) -> Stream {
        match self {
            Self::F3S | Self::F4S => Stream::Science,
            Self::F3H | Self::F4H => Stream::Humanities,
            Self::F1 | Self::F2 => Stream::None,
        }
    }

    pub fn level(self) -> Level {
        match self {
            Self::F1 | Self::F2 => Level::Junior,
            _ => Level::Senior,
        }
    }

    pub fn base_form(self) -> FormLevel {
        match self {
            Self::F1 => FormLevel::F1,
            Self::F2 => FormLevel::F2,
            Self::F3S | Self::F3H => FormLevel::F3,
            Self::F4S | Self::F4H => FormLevel::F4,
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stream {
    Science,
    Humanities,
    None,
}

impl Stream {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Science => "Science",
            Self::Humanities => "Humanities",
            Self::None => "None",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Junior,
    Senior,
}

impl Level {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" => Some(Self::Junior),
            "senior" => Some(Self::Senior),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    T1,
    T2,
    T3,
}

impl Term {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "T1" => Some(Self::T1),
            "T2" => Some(Self::T2),
            "T3" => Some(Self::T3),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::T3 => "T3",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::T1 => "Term 1",
            Self::T2 => "Term 2",
            Self::T3 => "Term 3",
        }
    }

    /// Space-free label used in exported file names.
    pub fn file_label(self) -> &'static str {
        match self {
            Self::T1 => "Term1",
            Self::T2 => "Term2",
            Self::T3 => "Term3",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubjectStream {
    All,
    Science,
    Humanities,
    Junior,
    Senior,
}

impl SubjectStream {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Some(Self::All),
            "SCIENCE" => Some(Self::Science),
            "HUMANITIES" => Some(Self::Humanities),
            "JUNIOR" => Some(Self::Junior),
            "SENIOR" => Some(Self::Senior),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Science => "SCIENCE",
            Self::Humanities => "HUMANITIES",
            Self::Junior => "JUNIOR",
            Self::Senior => "SENIOR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormLevel {
    #[serde(rename = "ALL")]
    All,
    F1,
    F2,
    F3,
    F4,
}

impl FormLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Some(Self::All),
            "F1" => Some(Self::F1),
            "F2" => Some(Self::F2),
            "F3" => Some(Self::F3),
            "F4" => Some(Self::F4),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::F1 => "F1",
            Self::F2 => "F2",
            Self::F3 => "F3",
            Self::F4 => "F4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub stream: SubjectStream,
    pub form_level: FormLevel,
}

impl Subject {
    /// Whether the subject's stream and form-level restrictions admit `form`.
    pub fn offered_to(&self, form: Form) -> bool {
        let stream_ok = match self.stream {
            SubjectStream::All => true,
            SubjectStream::Science => form.stream() == Stream::Science,
            SubjectStream::Humanities => form.stream() == Stream::Humanities,
            SubjectStream::Junior => form.level() == Level::Junior,
            SubjectStream::Senior => form.level() == Level::Senior,
        };
        let level_ok = self.form_level == FormLevel::All || self.form_level == form.base_form();
        stream_ok && level_ok
    }
}

pub fn is_english_name(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("english")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub form: Form,
}

impl Student {
    pub fn stream(&self) -> Stream {
        self.form.stream()
    }

    pub fn level(&self) -> Level {
        self.form.level()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A persisted grade row joined with its subject name.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub term: Term,
    pub score: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Student,
    Teacher,
    Admin,
    Parent,
}

impl StaffRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            "parent" => Some(Self::Parent),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
            Self::Parent => "parent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffProfile {
    pub id: String,
    pub username: String,
    pub role: StaffRole,
    pub forms_responsible: Option<String>,
}

impl StaffProfile {
    pub fn can_print_reports(&self) -> bool {
        matches!(self.role, StaffRole::Teacher | StaffRole::Admin)
    }

    /// Expands `ALL` to every form; unknown codes are dropped.
    pub fn responsible_forms(&self) -> Vec<Form> {
        match self.forms_responsible.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(s) if s.eq_ignore_ascii_case("ALL") => Form::ALL.to_vec(),
            Some(s) => s.split(',').filter_map(Form::parse).collect(),
        }
    }

    /// Admins may report on any form; teachers only on forms they are responsible for.
    pub fn may_report_on(&self, form: Form) -> bool {
        match self.role {
            StaffRole::Admin => true,
            StaffRole::Teacher => self.responsible_forms().contains(&form),
            StaffRole::Student | StaffRole::Parent => false,
        }
    }

    /// Forms this profile may report on, in form order.
    pub fn available_forms(&self) -> Vec<Form> {
        Form::ALL
            .iter()
            .copied()
            .filter(|f| self.may_report_on(*f))
            .collect()
    }
}
