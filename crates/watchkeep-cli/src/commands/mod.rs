pub mod clear;
pub mod config;
pub mod status;
