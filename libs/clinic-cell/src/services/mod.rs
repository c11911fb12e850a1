pub mod clinic;
pub mod lifecycle;

pub use clinic::ClinicService;
pub use lifecycle::AppointmentLifecycleService;
