pub mod action;
pub mod balance;
pub mod log;
pub mod position;
pub mod status;

pub use action::*;
pub use balance::*;
pub use log::*;
pub use position::*;
pub use status::*;
