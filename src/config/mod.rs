//! Configuration: entity table mapping and service settings.

pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
