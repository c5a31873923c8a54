pub mod access;
pub mod core;
pub mod courses;
pub mod grades;
pub mod reports;
pub mod session;
pub mod setup;
pub mod students;
pub mod teachers;
pub mod users;
