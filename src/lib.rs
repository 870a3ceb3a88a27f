// Library exports for integration tests and the binary

pub mod actuation;
pub mod bot;
pub mod capture;
pub mod catalog;
pub mod config;
pub mod detection;
pub mod error;
pub mod perception;
pub mod runtime;
pub mod state;
