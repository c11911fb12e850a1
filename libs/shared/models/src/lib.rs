pub mod auth;
pub mod domain;
pub mod error;

pub use domain::*;
