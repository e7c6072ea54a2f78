//! CLI Commands

pub mod config;
pub mod run;
pub mod visual;
