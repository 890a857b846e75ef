//! Interactive front end for the `dm856-tool` binary.

pub mod chart;
pub mod menu;

pub use menu::Menu;
