pub mod appointment;
pub mod enums;
pub mod note;
pub mod patient;
pub mod payment;
pub mod user;

pub use appointment::{Appointment, UnpaidAppointment};
pub use enums::*;
pub use note::PatientNote;
pub use patient::{Patient, PatientLookup};
pub use payment::Payment;
pub use user::PublicUser;
