pub mod student_form;
pub mod students;
