pub mod command;
pub mod config;
pub mod gpio;
pub mod motor;
pub mod tracking;
