pub mod patient;
pub mod review;

pub use patient::PatientService;
pub use review::ReviewService;
