//! Interactive terminal dashboard.

pub mod app;
pub mod scale;
pub mod ui;
