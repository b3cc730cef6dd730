//! Terminal travel-journal map.
//!
//! A base outline, province boundaries and journal markers rendered with
//! braille characters. Hovering a marker previews it; clicking opens its page.

pub mod app;
pub mod boundary;
pub mod braille;
pub mod config;
pub mod data;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod map;
pub mod marker;
pub mod navigation;
pub mod style;
pub mod ui;
