pub mod errors;
pub mod param;

pub use errors::*;
pub use param::*;
