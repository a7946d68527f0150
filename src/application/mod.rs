pub mod bootstrap;
pub mod commands;
pub mod controller;
pub mod recommendations;
pub mod session_factory;
pub mod ticker;
