//! Configuration loading and offline planning for the Legato motion core.

pub mod config;
mod file;
pub mod moves;
pub mod report;
