pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod lookups;
pub mod notes;
pub mod patients;
pub mod payments;
pub mod profile;
