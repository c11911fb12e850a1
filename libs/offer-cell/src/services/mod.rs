pub mod lifecycle;
pub mod offer;

pub use lifecycle::PlanLifecycleService;
pub use offer::OfferService;
