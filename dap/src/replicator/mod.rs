pub mod base;
pub mod command;
