pub mod purchase;
pub mod record;

pub use purchase::*;
pub use record::*;
