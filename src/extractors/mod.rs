//! Request extractors.

pub mod tenant;
pub use tenant::{TENANT_ID_HEADER, USERNAME_HEADER, USER_ID_HEADER};
