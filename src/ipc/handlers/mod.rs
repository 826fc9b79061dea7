pub mod core;
pub mod grades;
pub mod reports;
pub mod setup;
pub mod staff;
pub mod students;
pub mod subjects;
