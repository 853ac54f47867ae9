//! Entity types for the four clinic collections.

pub mod appointment;
pub mod bill;
pub mod doctor;
pub mod enums;
pub mod patient;

pub use appointment::*;
pub use bill::*;
pub use doctor::*;
pub use enums::*;
pub use patient::*;
