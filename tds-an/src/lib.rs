//! tds-an library - temporal dominance curve analyzer
//!
//! Command implementations used by the `tds-an` binary.

pub mod commands;
