//! Domain values the metrics are labelled with.

pub mod regel;
pub mod ytelse;

pub use regel::{Arsak, RegelId, Svar};
pub use ytelse::Ytelse;
