pub mod manager;
pub mod runtime;
pub mod settings;

pub use manager::*;
pub use runtime::*;
pub use settings::*;
