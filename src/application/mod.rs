//! Application services layer.

pub mod error;
pub mod i18n;
pub mod render;
pub mod templates;
