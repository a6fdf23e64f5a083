// runtime crate

pub mod docker;
pub mod manager;

pub use docker::DockerManager;
pub use manager::{EnvironmentError, EnvironmentManager};

#[cfg(test)]
mod docker_test;
