//! CUDA driver launch bindings for the GPU container system
//!
//! This crate provides the thin layer between kernel launch requests and the
//! CUDA driver API:
//! - Driver status decoding into typed errors
//! - Kernel argument marshaling (pointer array and packed buffer)
//! - Compile-time selection of the launch call sequence per driver version
//! - Kernel attribute queries
//!
//! The driver version is resolved by `build.rs` and fixed for the artifact.
//! Linking against `libcuda` requires the `cuda` feature.

#![warn(missing_docs)]

pub mod attributes;
pub mod driver;
pub mod error;
pub mod launch;
pub mod params;
pub mod status;
pub mod stream;
#[allow(missing_docs)]
pub mod sys;
pub mod version;

pub use attributes::KernelAttributes;
pub use driver::{Driver, NativeDriver};
pub use error::{CudaError, CudaResult};
pub use launch::{
    Dim3, Function, LaunchAttribute, LaunchConfig, LaunchConfigBuilder, Launcher,
};
pub use params::{ArgValue, KernelArg, PackedParams, PointerArray};
pub use status::{DriverStatus, StatusReport};
pub use stream::StreamHandle;
pub use version::{
    build_info, BuildInfo, CudaVersion, Gate, LaunchCapabilities, LaunchStrategy, VersionSource,
    LINKED,
};

/// Re-export common types
pub mod prelude {
    pub use crate::{
        CudaError, CudaResult, CudaVersion, Dim3, Driver, DriverStatus, Function, KernelArg,
        KernelAttributes, LaunchConfig, LaunchConfigBuilder, LaunchStrategy, Launcher,
        NativeDriver, StatusReport, StreamHandle,
    };
}

#[cfg(test)]
mod tests;
