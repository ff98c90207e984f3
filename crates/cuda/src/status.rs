//! Driver status decoding.
//!
//! Every native call returns a `CUresult`. [`check`] turns it into a
//! [`CudaResult`] for calls that are expected to succeed, [`query`] hands the
//! decoded [`DriverStatus`] back for calls whose outcome the caller inspects.

use crate::error::{CudaError, CudaResult};
use crate::sys::CUresult;
use serde::Serialize;
use std::fmt;
use tracing::warn;

macro_rules! driver_status {
    ($($variant:ident = $code:literal, $name:literal, $desc:literal;)*) => {
        /// Closed set of `CUresult` values known to this crate.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[repr(i32)]
        pub enum DriverStatus {
            $(
                #[doc = $desc]
                $variant = $code,
            )*
        }

        impl DriverStatus {
            /// Every named status, in code order.
            pub const ALL: &'static [DriverStatus] = &[$(DriverStatus::$variant,)*];

            /// Decode a raw driver result. Codes this crate does not know map
            /// to [`DriverStatus::Unknown`].
            pub fn from_raw(raw: CUresult) -> Self {
                match raw {
                    $($code => DriverStatus::$variant,)*
                    other => {
                        warn!(code = other, "unrecognized CUDA driver status");
                        DriverStatus::Unknown
                    }
                }
            }

            /// Symbolic name as spelled in `cuda.h`.
            pub fn name(self) -> &'static str {
                match self {
                    $(DriverStatus::$variant => $name,)*
                }
            }

            /// Human readable description.
            pub fn description(self) -> &'static str {
                match self {
                    $(DriverStatus::$variant => $desc,)*
                }
            }
        }
    };
}

driver_status! {
    Success = 0, "CUDA_SUCCESS", "no error";
    InvalidValue = 1, "CUDA_ERROR_INVALID_VALUE", "invalid argument";
    OutOfMemory = 2, "CUDA_ERROR_OUT_OF_MEMORY", "out of memory";
    NotInitialized = 3, "CUDA_ERROR_NOT_INITIALIZED", "initialization error";
    Deinitialized = 4, "CUDA_ERROR_DEINITIALIZED", "driver shutting down";
    ProfilerDisabled = 5, "CUDA_ERROR_PROFILER_DISABLED", "profiler disabled while using a different profiling tool";
    ProfilerNotInitialized = 6, "CUDA_ERROR_PROFILER_NOT_INITIALIZED", "profiler not initialized";
    ProfilerAlreadyStarted = 7, "CUDA_ERROR_PROFILER_ALREADY_STARTED", "profiler already started";
    ProfilerAlreadyStopped = 8, "CUDA_ERROR_PROFILER_ALREADY_STOPPED", "profiler already stopped";
    StubLibrary = 34, "CUDA_ERROR_STUB_LIBRARY", "CUDA driver is a stub library";
    DeviceUnavailable = 46, "CUDA_ERROR_DEVICE_UNAVAILABLE", "CUDA-capable device(s) is/are busy or unavailable";
    NoDevice = 100, "CUDA_ERROR_NO_DEVICE", "no CUDA-capable device is detected";
    InvalidDevice = 101, "CUDA_ERROR_INVALID_DEVICE", "invalid device ordinal";
    DeviceNotLicensed = 102, "CUDA_ERROR_DEVICE_NOT_LICENSED", "device doesn't have valid Grid license";
    InvalidImage = 200, "CUDA_ERROR_INVALID_IMAGE", "device kernel image is invalid";
    InvalidContext = 201, "CUDA_ERROR_INVALID_CONTEXT", "invalid device context";
    ContextAlreadyCurrent = 202, "CUDA_ERROR_CONTEXT_ALREADY_CURRENT", "context already current";
    MapFailed = 205, "CUDA_ERROR_MAP_FAILED", "mapping of buffer object failed";
    UnmapFailed = 206, "CUDA_ERROR_UNMAP_FAILED", "unmapping of buffer object failed";
    ArrayIsMapped = 207, "CUDA_ERROR_ARRAY_IS_MAPPED", "array is mapped";
    AlreadyMapped = 208, "CUDA_ERROR_ALREADY_MAPPED", "resource already mapped";
    NoBinaryForGpu = 209, "CUDA_ERROR_NO_BINARY_FOR_GPU", "no kernel image is available for execution on the device";
    AlreadyAcquired = 210, "CUDA_ERROR_ALREADY_ACQUIRED", "resource already acquired";
    NotMapped = 211, "CUDA_ERROR_NOT_MAPPED", "resource not mapped";
    NotMappedAsArray = 212, "CUDA_ERROR_NOT_MAPPED_AS_ARRAY", "resource not mapped as array";
    NotMappedAsPointer = 213, "CUDA_ERROR_NOT_MAPPED_AS_POINTER", "resource not mapped as pointer";
    EccUncorrectable = 214, "CUDA_ERROR_ECC_UNCORRECTABLE", "uncorrectable ECC error encountered";
    UnsupportedLimit = 215, "CUDA_ERROR_UNSUPPORTED_LIMIT", "limit is not supported on this architecture";
    ContextAlreadyInUse = 216, "CUDA_ERROR_CONTEXT_ALREADY_IN_USE", "exclusive-thread device already in use by a different thread";
    PeerAccessUnsupported = 217, "CUDA_ERROR_PEER_ACCESS_UNSUPPORTED", "peer access is not supported between these two devices";
    InvalidPtx = 218, "CUDA_ERROR_INVALID_PTX", "a PTX JIT compilation failed";
    InvalidGraphicsContext = 219, "CUDA_ERROR_INVALID_GRAPHICS_CONTEXT", "invalid OpenGL or DirectX context";
    NvlinkUncorrectable = 220, "CUDA_ERROR_NVLINK_UNCORRECTABLE", "uncorrectable NVLink error detected during the execution";
    JitCompilerNotFound = 221, "CUDA_ERROR_JIT_COMPILER_NOT_FOUND", "PTX JIT compiler library not found";
    UnsupportedPtxVersion = 222, "CUDA_ERROR_UNSUPPORTED_PTX_VERSION", "the provided PTX was compiled with an unsupported toolchain";
    JitCompilationDisabled = 223, "CUDA_ERROR_JIT_COMPILATION_DISABLED", "PTX JIT compilation was disabled";
    UnsupportedExecAffinity = 224, "CUDA_ERROR_UNSUPPORTED_EXEC_AFFINITY", "the provided execution affinity is not supported";
    UnsupportedDevsideSync = 225, "CUDA_ERROR_UNSUPPORTED_DEVSIDE_SYNC", "the provided PTX contains unsupported call to cudaDeviceSynchronize";
    InvalidSource = 300, "CUDA_ERROR_INVALID_SOURCE", "device kernel image is invalid";
    FileNotFound = 301, "CUDA_ERROR_FILE_NOT_FOUND", "file not found";
    SharedObjectSymbolNotFound = 302, "CUDA_ERROR_SHARED_OBJECT_SYMBOL_NOT_FOUND", "shared object symbol not found";
    SharedObjectInitFailed = 303, "CUDA_ERROR_SHARED_OBJECT_INIT_FAILED", "shared object initialization failed";
    OperatingSystem = 304, "CUDA_ERROR_OPERATING_SYSTEM", "OS call failed or operation not supported on this OS";
    InvalidHandle = 400, "CUDA_ERROR_INVALID_HANDLE", "invalid resource handle";
    IllegalState = 401, "CUDA_ERROR_ILLEGAL_STATE", "the operation cannot be performed in the present state";
    LossyQuery = 402, "CUDA_ERROR_LOSSY_QUERY", "attempted introspection would be semantically lossy";
    NotFound = 500, "CUDA_ERROR_NOT_FOUND", "named symbol not found";
    NotReady = 600, "CUDA_ERROR_NOT_READY", "device not ready";
    IllegalAddress = 700, "CUDA_ERROR_ILLEGAL_ADDRESS", "an illegal memory access was encountered";
    LaunchOutOfResources = 701, "CUDA_ERROR_LAUNCH_OUT_OF_RESOURCES", "too many resources requested for launch";
    LaunchTimeout = 702, "CUDA_ERROR_LAUNCH_TIMEOUT", "the launch timed out and was terminated";
    LaunchIncompatibleTexturing = 703, "CUDA_ERROR_LAUNCH_INCOMPATIBLE_TEXTURING", "launch uses incompatible texturing mode";
    PeerAccessAlreadyEnabled = 704, "CUDA_ERROR_PEER_ACCESS_ALREADY_ENABLED", "peer access is already enabled";
    PeerAccessNotEnabled = 705, "CUDA_ERROR_PEER_ACCESS_NOT_ENABLED", "peer access has not been enabled";
    PrimaryContextActive = 708, "CUDA_ERROR_PRIMARY_CONTEXT_ACTIVE", "cannot set while device is active in this process";
    ContextIsDestroyed = 709, "CUDA_ERROR_CONTEXT_IS_DESTROYED", "context is destroyed";
    Assert = 710, "CUDA_ERROR_ASSERT", "device-side assert triggered";
    TooManyPeers = 711, "CUDA_ERROR_TOO_MANY_PEERS", "peer mapping resources exhausted";
    HostMemoryAlreadyRegistered = 712, "CUDA_ERROR_HOST_MEMORY_ALREADY_REGISTERED", "part or all of the requested memory range is already mapped";
    HostMemoryNotRegistered = 713, "CUDA_ERROR_HOST_MEMORY_NOT_REGISTERED", "pointer does not correspond to a registered memory region";
    HardwareStackError = 714, "CUDA_ERROR_HARDWARE_STACK_ERROR", "hardware stack error";
    IllegalInstruction = 715, "CUDA_ERROR_ILLEGAL_INSTRUCTION", "an illegal instruction was encountered";
    MisalignedAddress = 716, "CUDA_ERROR_MISALIGNED_ADDRESS", "misaligned address";
    InvalidAddressSpace = 717, "CUDA_ERROR_INVALID_ADDRESS_SPACE", "operation not supported on global/shared address space";
    InvalidPc = 718, "CUDA_ERROR_INVALID_PC", "invalid program counter";
    LaunchFailed = 719, "CUDA_ERROR_LAUNCH_FAILED", "unspecified launch failure";
    CooperativeLaunchTooLarge = 720, "CUDA_ERROR_COOPERATIVE_LAUNCH_TOO_LARGE", "too many blocks in cooperative launch";
    NotPermitted = 800, "CUDA_ERROR_NOT_PERMITTED", "operation not permitted";
    NotSupported = 801, "CUDA_ERROR_NOT_SUPPORTED", "operation not supported";
    SystemNotReady = 802, "CUDA_ERROR_SYSTEM_NOT_READY", "system not yet initialized";
    SystemDriverMismatch = 803, "CUDA_ERROR_SYSTEM_DRIVER_MISMATCH", "system has unsupported display driver / cuda driver combination";
    CompatNotSupportedOnDevice = 804, "CUDA_ERROR_COMPAT_NOT_SUPPORTED_ON_DEVICE", "forward compatibility was attempted on non supported HW";
    MpsConnectionFailed = 805, "CUDA_ERROR_MPS_CONNECTION_FAILED", "MPS client failed to connect to the MPS control daemon or the MPS server";
    MpsRpcFailure = 806, "CUDA_ERROR_MPS_RPC_FAILURE", "the remote procedural call between the MPS server and the MPS client failed";
    MpsServerNotReady = 807, "CUDA_ERROR_MPS_SERVER_NOT_READY", "MPS server is not ready to accept new MPS client requests";
    MpsMaxClientsReached = 808, "CUDA_ERROR_MPS_MAX_CLIENTS_REACHED", "the hardware resources required to create MPS client have been exhausted";
    MpsMaxConnectionsReached = 809, "CUDA_ERROR_MPS_MAX_CONNECTIONS_REACHED", "the hardware resources required to support device connections have been exhausted";
    MpsClientTerminated = 810, "CUDA_ERROR_MPS_CLIENT_TERMINATED", "the MPS client has been terminated by the server";
    CdpNotSupported = 811, "CUDA_ERROR_CDP_NOT_SUPPORTED", "the module is using CUDA Dynamic Parallelism, but the current configuration does not support it";
    CdpVersionMismatch = 812, "CUDA_ERROR_CDP_VERSION_MISMATCH", "CUDA Dynamic Parallelism is not supported across mismatched module versions";
    StreamCaptureUnsupported = 900, "CUDA_ERROR_STREAM_CAPTURE_UNSUPPORTED", "operation not permitted when stream is capturing";
    StreamCaptureInvalidated = 901, "CUDA_ERROR_STREAM_CAPTURE_INVALIDATED", "operation failed due to a previous error during capture";
    StreamCaptureMerge = 902, "CUDA_ERROR_STREAM_CAPTURE_MERGE", "operation would result in a merge of separate capture sequences";
    StreamCaptureUnmatched = 903, "CUDA_ERROR_STREAM_CAPTURE_UNMATCHED", "capture was not ended in the same stream as it began";
    StreamCaptureUnjoined = 904, "CUDA_ERROR_STREAM_CAPTURE_UNJOINED", "capturing stream has unjoined work";
    StreamCaptureIsolation = 905, "CUDA_ERROR_STREAM_CAPTURE_ISOLATION", "dependency created on uncaptured work in another stream";
    StreamCaptureImplicit = 906, "CUDA_ERROR_STREAM_CAPTURE_IMPLICIT", "operation would make the legacy stream depend on a capturing blocking stream";
    CapturedEvent = 907, "CUDA_ERROR_CAPTURED_EVENT", "operation not permitted on an event last recorded in a capturing stream";
    StreamCaptureWrongThread = 908, "CUDA_ERROR_STREAM_CAPTURE_WRONG_THREAD", "attempt to terminate a thread-local capture sequence from another thread";
    Timeout = 909, "CUDA_ERROR_TIMEOUT", "wait operation timed out";
    GraphExecUpdateFailure = 910, "CUDA_ERROR_GRAPH_EXEC_UPDATE_FAILURE", "the graph update was not performed because it included changes which violated constraints specific to instantiated graph update";
    ExternalDevice = 911, "CUDA_ERROR_EXTERNAL_DEVICE", "an async error has occurred in an external entity outside of CUDA";
    InvalidClusterSize = 912, "CUDA_ERROR_INVALID_CLUSTER_SIZE", "a kernel launch error has occurred due to cluster misconfiguration";
    FunctionNotLoaded = 913, "CUDA_ERROR_FUNCTION_NOT_LOADED", "the function handle is not loaded when calling an API that requires a loaded function";
    InvalidResourceType = 914, "CUDA_ERROR_INVALID_RESOURCE_TYPE", "one or more resources passed in are not valid resource types for the operation";
    InvalidResourceConfiguration = 915, "CUDA_ERROR_INVALID_RESOURCE_CONFIGURATION", "one or more resources are insufficient or non-applicable for the operation";
    Unknown = 999, "CUDA_ERROR_UNKNOWN", "unknown error";
}

impl DriverStatus {
    /// Numeric value as defined by the driver.
    pub fn code(self) -> CUresult {
        self as CUresult
    }

    /// Whether this is the success sentinel.
    pub fn is_success(self) -> bool {
        self == DriverStatus::Success
    }

    /// Errors that leave the context unusable; every later call in the same
    /// context reports the same failure until the process restarts.
    pub fn is_sticky(self) -> bool {
        matches!(
            self,
            DriverStatus::IllegalAddress
                | DriverStatus::LaunchFailed
                | DriverStatus::HardwareStackError
                | DriverStatus::IllegalInstruction
                | DriverStatus::MisalignedAddress
                | DriverStatus::InvalidAddressSpace
                | DriverStatus::InvalidPc
                | DriverStatus::Assert
                | DriverStatus::EccUncorrectable
                | DriverStatus::NvlinkUncorrectable
        )
    }

    /// Convert into the fail-loudly convention.
    pub fn into_result(self) -> CudaResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(CudaError::Driver {
                status: self,
                code: self.code(),
            })
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Fail loudly: `Ok(())` on `CUDA_SUCCESS`, otherwise a driver error that
/// retains the raw code.
#[inline]
pub fn check(raw: CUresult) -> CudaResult<()> {
    if raw == crate::sys::CUDA_SUCCESS {
        return Ok(());
    }
    Err(CudaError::Driver {
        status: DriverStatus::from_raw(raw),
        code: raw,
    })
}

/// Fail softly: hand the decoded status back to the caller.
#[inline]
pub fn query(raw: CUresult) -> DriverStatus {
    DriverStatus::from_raw(raw)
}

/// Decoded status together with the raw code it came from.
///
/// Codes outside the table all decode to [`DriverStatus::Unknown`]; `code`
/// keeps them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StatusReport {
    /// Decoded status
    pub status: DriverStatus,
    /// Raw integer returned by the driver
    pub code: CUresult,
}

impl StatusReport {
    /// Decode `raw`, keeping it alongside the status.
    pub fn from_raw(raw: CUresult) -> Self {
        Self {
            status: query(raw),
            code: raw,
        }
    }

    /// Whether the native call succeeded.
    pub fn is_success(self) -> bool {
        self.code == crate::sys::CUDA_SUCCESS
    }

    /// Convert into the fail-loudly convention without losing the raw code.
    pub fn into_result(self) -> CudaResult<()> {
        check(self.code)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.status.name(), self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_sentinel() {
        assert_eq!(DriverStatus::from_raw(0), DriverStatus::Success);
        assert!(check(0).is_ok());
        assert!(query(0).is_success());
    }

    #[test]
    fn test_allocation_failure_code() {
        assert_eq!(query(2), DriverStatus::OutOfMemory);
        assert_eq!(
            check(2),
            Err(CudaError::Driver {
                status: DriverStatus::OutOfMemory,
                code: 2
            })
        );
    }

    #[test]
    fn test_table_round_trips_codes() {
        for status in DriverStatus::ALL {
            assert_eq!(DriverStatus::from_raw(status.code()), *status);
            assert!(status.name().starts_with("CUDA_"));
            assert!(!status.description().is_empty());
        }
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = DriverStatus::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DriverStatus::ALL.len());
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(query(-1), DriverStatus::Unknown);
        assert_eq!(query(42), DriverStatus::Unknown);
        match check(42) {
            Err(CudaError::Driver { status, code }) => {
                assert_eq!(status, DriverStatus::Unknown);
                assert_eq!(code, 42);
            }
            other => panic!("expected driver error, got {other:?}"),
        }
    }

    #[test]
    fn test_sticky_errors() {
        assert!(DriverStatus::IllegalAddress.is_sticky());
        assert!(DriverStatus::LaunchFailed.is_sticky());
        assert!(!DriverStatus::OutOfMemory.is_sticky());
        assert!(!DriverStatus::NotReady.is_sticky());
    }

    #[test]
    fn test_into_result_matches_check() {
        for status in DriverStatus::ALL {
            assert_eq!(status.into_result(), check(status.code()));
        }
    }

    #[test]
    fn test_report_keeps_unknown_codes_apart() {
        let unlisted = StatusReport::from_raw(4242);
        let listed = StatusReport::from_raw(999);
        assert_eq!(unlisted.status, DriverStatus::Unknown);
        assert_eq!(listed.status, DriverStatus::Unknown);
        assert_ne!(unlisted, listed);
        assert_eq!(unlisted.code, 4242);
        assert_eq!(unlisted.to_string(), "CUDA_ERROR_UNKNOWN (4242)");
        assert_eq!(
            unlisted.into_result(),
            Err(CudaError::Driver {
                status: DriverStatus::Unknown,
                code: 4242
            })
        );
        assert!(StatusReport::from_raw(0).is_success());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DriverStatus::LaunchOutOfResources.to_string(),
            "CUDA_ERROR_LAUNCH_OUT_OF_RESOURCES (701)"
        );
    }
}
