//! Builds LXD images: provisions a throwaway container from a base image,
//! publishes it under an alias and injects boot-time templates into the
//! published image's metadata.

pub mod archive;
pub mod backends;
pub mod controller;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod frontends;
#[cfg(test)]
mod log_capture;
pub mod models;
pub mod network;
pub mod provision;
pub mod services;
pub mod templates;

pub use controller::{BuildState, Controller};
pub use error::{Error, Result};
pub use models::{BuildSpec, Template};
