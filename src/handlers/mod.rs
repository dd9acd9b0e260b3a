//! HTTP handlers for the custom field API.

pub mod fields;
