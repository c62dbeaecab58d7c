pub mod auth;
pub mod classes;
pub mod core;
pub mod demo;
pub mod grades;
pub mod reports;
pub mod session;
pub mod settings;
pub mod students;
