pub mod decimal;
pub mod error;
pub mod keys;
pub mod types;

pub use error::{IndexError, Result, StatusClass};
