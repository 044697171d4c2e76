pub mod account;
pub mod appointment;
pub mod enums;
pub mod filters;
pub mod transaction;

pub use account::*;
pub use appointment::*;
pub use enums::*;
pub use filters::*;
pub use transaction::*;
