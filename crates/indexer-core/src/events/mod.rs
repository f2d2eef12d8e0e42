pub mod governance;
pub mod registry;

pub use governance::*;
pub use registry::*;
