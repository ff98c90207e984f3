//! Version-dispatch selection.
//!
//! The driver version is resolved once by `build.rs` and baked into this
//! crate as [`LINKED`]. Everything here is `const`: the chosen call sequence
//! and the set of available entry points are fixed per build artifact and
//! never re-checked at run time.

use crate::error::{CudaError, CudaResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// CUDA version information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CudaVersion {
    /// Major version number
    pub major: u32,
    /// Minor version number
    pub minor: u32,
    /// Patch version number
    pub patch: u32,
}

impl CudaVersion {
    /// Create a new version
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Decode the `CUDA_VERSION` / `cuDriverGetVersion` form (`major * 1000 + minor * 10`)
    pub const fn from_encoded(encoded: u32) -> Self {
        Self::new(encoded / 1000, (encoded % 1000) / 10, 0)
    }

    /// Encode back into `major * 1000 + minor * 10`
    pub const fn encoded(&self) -> u32 {
        self.major * 1000 + self.minor * 10
    }

    /// Check if this version meets minimum requirements
    pub const fn meets_minimum(&self, min_major: u32, min_minor: u32) -> bool {
        self.major > min_major || (self.major == min_major && self.minor >= min_minor)
    }
}

impl std::fmt::Display for CudaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

const fn parse_encoded(value: &str) -> u32 {
    let bytes = value.as_bytes();
    let mut i = 0;
    let mut out = 0u32;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(digit.is_ascii_digit(), "STRATOSWARM_CUDA_VERSION must be numeric");
        out = out * 10 + (digit - b'0') as u32;
        i += 1;
    }
    out
}

/// Driver version this artifact was built against.
pub const LINKED: CudaVersion = CudaVersion::from_encoded(parse_encoded(env!("STRATOSWARM_CUDA_VERSION")));

/// Where `build.rs` found [`LINKED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    /// `STRATOSWARM_CUDA_VERSION` override
    Env,
    /// `CUDA_VERSION` define in `cuda.h`
    Header,
    /// `nvcc --version`
    Nvcc,
    /// No toolkit found
    Fallback,
}

impl VersionSource {
    /// Source recorded for this build
    pub fn current() -> Self {
        match env!("STRATOSWARM_CUDA_VERSION_SOURCE") {
            "env" => VersionSource::Env,
            "header" => VersionSource::Header,
            "nvcc" => VersionSource::Nvcc,
            _ => VersionSource::Fallback,
        }
    }
}

/// Driver entry points that only exist from some version on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    /// `cuLaunchKernel`
    LaunchKernel,
    /// `cuLaunchCooperativeKernel`
    CooperativeLaunch,
    /// `CU_FUNC_ATTRIBUTE_MAX_DYNAMIC_SHARED_SIZE_BYTES` and the carveout attribute
    MaxDynamicSharedSize,
    /// `cuLaunchKernelEx`
    LaunchKernelEx,
}

impl Gate {
    /// First version providing the entry point
    pub const fn required(self) -> CudaVersion {
        match self {
            Gate::LaunchKernel => CudaVersion::new(4, 0, 0),
            Gate::CooperativeLaunch | Gate::MaxDynamicSharedSize => CudaVersion::new(9, 0, 0),
            Gate::LaunchKernelEx => CudaVersion::new(12, 0, 0),
        }
    }

    /// Native symbol behind the gate
    pub const fn symbol(self) -> &'static str {
        match self {
            Gate::LaunchKernel => "cuLaunchKernel",
            Gate::CooperativeLaunch => "cuLaunchCooperativeKernel",
            Gate::MaxDynamicSharedSize => "cuFuncGetAttribute(MAX_DYNAMIC_SHARED_SIZE_BYTES)",
            Gate::LaunchKernelEx => "cuLaunchKernelEx",
        }
    }

    /// Whether `version` provides the entry point
    pub const fn is_available(self, version: CudaVersion) -> bool {
        let required = self.required();
        version.meets_minimum(required.major, required.minor)
    }

    /// `Err(Unsupported)` when `version` predates the entry point
    pub fn require(self, version: CudaVersion) -> CudaResult<()> {
        if self.is_available(version) {
            Ok(())
        } else {
            Err(CudaError::Unsupported {
                operation: self.symbol(),
                required: self.required(),
                linked: version,
            })
        }
    }
}

/// How kernel arguments reach the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStrategy {
    /// `cuLaunchKernel` with `kernelParams`: one pointer per argument
    PointerArray,
    /// `cuLaunchKernel` with `extra`: one packed buffer plus its size
    PackedBuffer,
    /// `cuParamSetv` / `cuParamSetSize` / `cuFuncSetSharedSize` /
    /// `cuFuncSetBlockShape` / `cuLaunchGridAsync`
    Legacy,
}

impl LaunchStrategy {
    /// Default strategy for a driver version
    pub const fn for_version(version: CudaVersion) -> Self {
        if Gate::LaunchKernel.is_available(version) {
            LaunchStrategy::PointerArray
        } else {
            LaunchStrategy::Legacy
        }
    }

    /// Strategy fixed for this build
    pub const SELECTED: LaunchStrategy = LaunchStrategy::for_version(LINKED);
}

bitflags! {
    /// What the launch paths of a driver version can express
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LaunchCapabilities: u32 {
        /// Four-call legacy sequence
        const LEGACY = 1 << 0;
        /// Arguments as an array of pointers
        const POINTER_ARRAY = 1 << 1;
        /// Arguments as one packed buffer via `extra`
        const PACKED_BUFFER = 1 << 2;
        /// Grid z dimension is honored (the legacy sequence has no grid z)
        const GRID_Z = 1 << 3;
        /// Cooperative launches
        const COOPERATIVE = 1 << 4;
        /// Thread block clusters through `cuLaunchKernelEx`
        const CLUSTER = 1 << 5;
    }
}

impl LaunchCapabilities {
    /// Capabilities provided by a driver version
    pub const fn for_version(version: CudaVersion) -> Self {
        let mut bits = Self::LEGACY.bits();
        if Gate::LaunchKernel.is_available(version) {
            bits |= Self::POINTER_ARRAY.bits() | Self::PACKED_BUFFER.bits() | Self::GRID_Z.bits();
        }
        if Gate::CooperativeLaunch.is_available(version) {
            bits |= Self::COOPERATIVE.bits();
        }
        if Gate::LaunchKernelEx.is_available(version) {
            bits |= Self::CLUSTER.bits();
        }
        Self::from_bits_retain(bits)
    }

    /// Capabilities of this build
    pub const SELECTED: LaunchCapabilities = LaunchCapabilities::for_version(LINKED);
}

/// Compile-time launch configuration of this build
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    /// Linked driver version
    pub version: CudaVersion,
    /// Where the version came from
    pub source: VersionSource,
    /// Default launch strategy
    pub strategy: LaunchStrategy,
    /// Names of the available capabilities
    pub capabilities: Vec<&'static str>,
    /// Whether the native driver is linked
    pub native: bool,
}

/// Describe the launch configuration baked into this build
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: LINKED,
        source: VersionSource::current(),
        strategy: LaunchStrategy::SELECTED,
        capabilities: LaunchCapabilities::SELECTED
            .iter_names()
            .map(|(name, _)| name)
            .collect(),
        native: cfg!(feature = "cuda"),
    }
}
