pub mod auth;
pub mod core;
pub mod forms;
pub mod grid;
pub mod results;
pub mod setup;
