pub mod canonical;
pub mod result;
pub mod scenario;

pub use canonical::*;
pub use result::*;
pub use scenario::*;
