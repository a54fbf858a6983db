//! Terminal host: plain-text renderers and the interactive tree browser.

pub mod app;
pub mod components;
pub mod text;
