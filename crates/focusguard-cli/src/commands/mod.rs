pub mod config;
pub mod history;
pub mod schedule;
pub mod strict;
pub mod timer;
pub mod windows;
