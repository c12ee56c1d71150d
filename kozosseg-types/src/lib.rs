pub mod models;
pub mod enums;
pub mod pagination;

pub use models::*;
pub use enums::*;
