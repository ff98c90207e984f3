//! Raw CUDA driver ABI.
//!
//! Handle typedefs, launch-parameter markers and `#[repr(C)]` mirrors of the
//! driver structs this crate passes by pointer. The `extern "C"` block is only
//! compiled with the `cuda` feature, and each entry point that is missing from
//! older drivers is additionally gated on a `cfg` emitted by `build.rs`.
//!
//! Use [`crate::launch::Launcher`] for safe wrappers.

#![allow(non_camel_case_types, non_snake_case)]

#[cfg(feature = "cuda")]
use std::ffi::c_void;
use std::os::raw::{c_int, c_uint};

/// Driver status code. 0 = success, non-zero = error.
pub type CUresult = c_int;

/// Device pointer as seen by kernels.
pub type CUdeviceptr = u64;

/// Opaque driver function object.
#[repr(C)]
pub struct CUfunc_st {
    _private: [u8; 0],
}

/// Opaque driver stream object.
#[repr(C)]
pub struct CUstream_st {
    _private: [u8; 0],
}

/// Kernel handle.
pub type CUfunction = *mut CUfunc_st;

/// Stream handle. Null is the default stream.
pub type CUstream = *mut CUstream_st;

/// `CUfunction_attribute` selector.
pub type CUfunction_attribute = c_int;

/// `CUlaunchAttributeID` selector.
pub type CUlaunchAttributeID = c_uint;

pub const CUDA_SUCCESS: CUresult = 0;
pub const CUDA_ERROR_INVALID_VALUE: CUresult = 1;
pub const CUDA_ERROR_NOT_SUPPORTED: CUresult = 801;

// Markers for the `extra` argument of `cuLaunchKernel`.
pub const CU_LAUNCH_PARAM_END: usize = 0x00;
pub const CU_LAUNCH_PARAM_BUFFER_POINTER: usize = 0x01;
pub const CU_LAUNCH_PARAM_BUFFER_SIZE: usize = 0x02;

// Special stream handles.
pub const CU_STREAM_LEGACY: usize = 0x1;
pub const CU_STREAM_PER_THREAD: usize = 0x2;

pub const CU_FUNC_ATTRIBUTE_MAX_THREADS_PER_BLOCK: CUfunction_attribute = 0;
pub const CU_FUNC_ATTRIBUTE_SHARED_SIZE_BYTES: CUfunction_attribute = 1;
pub const CU_FUNC_ATTRIBUTE_CONST_SIZE_BYTES: CUfunction_attribute = 2;
pub const CU_FUNC_ATTRIBUTE_LOCAL_SIZE_BYTES: CUfunction_attribute = 3;
pub const CU_FUNC_ATTRIBUTE_NUM_REGS: CUfunction_attribute = 4;
pub const CU_FUNC_ATTRIBUTE_PTX_VERSION: CUfunction_attribute = 5;
pub const CU_FUNC_ATTRIBUTE_BINARY_VERSION: CUfunction_attribute = 6;
pub const CU_FUNC_ATTRIBUTE_CACHE_MODE_CA: CUfunction_attribute = 7;
pub const CU_FUNC_ATTRIBUTE_MAX_DYNAMIC_SHARED_SIZE_BYTES: CUfunction_attribute = 8;
pub const CU_FUNC_ATTRIBUTE_PREFERRED_SHARED_MEMORY_CARVEOUT: CUfunction_attribute = 9;

pub const CU_LAUNCH_ATTRIBUTE_IGNORE: CUlaunchAttributeID = 0;
pub const CU_LAUNCH_ATTRIBUTE_COOPERATIVE: CUlaunchAttributeID = 2;
pub const CU_LAUNCH_ATTRIBUTE_CLUSTER_DIMENSION: CUlaunchAttributeID = 4;
pub const CU_LAUNCH_ATTRIBUTE_PRIORITY: CUlaunchAttributeID = 8;

/// `clusterDim` member of `CUlaunchAttributeValue`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CUclusterDim {
    pub x: c_uint,
    pub y: c_uint,
    pub z: c_uint,
}

/// Mirrors `CUlaunchAttributeValue` (a 64-byte union).
#[repr(C)]
#[derive(Clone, Copy)]
pub union CUlaunchAttributeValue {
    pub pad: [u8; 64],
    pub cooperative: c_int,
    pub cluster_dim: CUclusterDim,
    pub priority: c_int,
    _align: [u64; 8],
}

/// Mirrors `CUlaunchAttribute`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CUlaunchAttribute {
    pub id: CUlaunchAttributeID,
    pub pad: [u8; 8 - std::mem::size_of::<CUlaunchAttributeID>()],
    pub value: CUlaunchAttributeValue,
}

impl CUlaunchAttribute {
    /// Attribute with a zeroed value.
    pub fn new(id: CUlaunchAttributeID) -> Self {
        Self {
            id,
            pad: [0; 4],
            value: CUlaunchAttributeValue { pad: [0; 64] },
        }
    }
}

/// Mirrors `CUlaunchConfig`, the first argument of `cuLaunchKernelEx`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CUlaunchConfig {
    pub gridDimX: c_uint,
    pub gridDimY: c_uint,
    pub gridDimZ: c_uint,
    pub blockDimX: c_uint,
    pub blockDimY: c_uint,
    pub blockDimZ: c_uint,
    pub sharedMemBytes: c_uint,
    pub hStream: CUstream,
    pub attrs: *mut CUlaunchAttribute,
    pub numAttrs: c_uint,
}

const _: () = assert!(std::mem::size_of::<CUclusterDim>() == 12);
const _: () = assert!(std::mem::size_of::<CUlaunchAttributeValue>() == 64);
const _: () = assert!(std::mem::align_of::<CUlaunchAttributeValue>() == 8);
const _: () = assert!(std::mem::size_of::<CUlaunchAttribute>() == 72);
const _: () = assert!(std::mem::align_of::<CUlaunchAttribute>() == 8);

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(std::mem::size_of::<CUlaunchConfig>() == 56);
    assert!(std::mem::align_of::<CUlaunchConfig>() == 8);
    assert!(std::mem::offset_of!(CUlaunchConfig, hStream) == 32);
    assert!(std::mem::offset_of!(CUlaunchConfig, attrs) == 40);
    assert!(std::mem::offset_of!(CUlaunchConfig, numAttrs) == 48);
};

#[cfg(feature = "cuda")]
#[link(name = "cuda")]
extern "C" {
    pub fn cuDriverGetVersion(driver_version: *mut c_int) -> CUresult;

    pub fn cuFuncGetAttribute(
        pi: *mut c_int,
        attrib: CUfunction_attribute,
        hfunc: CUfunction,
    ) -> CUresult;

    #[cfg(cuda_launch_kernel)]
    pub fn cuLaunchKernel(
        f: CUfunction,
        grid_dim_x: c_uint,
        grid_dim_y: c_uint,
        grid_dim_z: c_uint,
        block_dim_x: c_uint,
        block_dim_y: c_uint,
        block_dim_z: c_uint,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult;

    #[cfg(cuda_cooperative_launch)]
    pub fn cuLaunchCooperativeKernel(
        f: CUfunction,
        grid_dim_x: c_uint,
        grid_dim_y: c_uint,
        grid_dim_z: c_uint,
        block_dim_x: c_uint,
        block_dim_y: c_uint,
        block_dim_z: c_uint,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
    ) -> CUresult;

    #[cfg(cuda_launch_ex)]
    pub fn cuLaunchKernelEx(
        config: *const CUlaunchConfig,
        f: CUfunction,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult;

    // Deprecated execution control, still exported by current drivers.
    pub fn cuParamSetSize(hfunc: CUfunction, numbytes: c_uint) -> CUresult;
    pub fn cuParamSetv(
        hfunc: CUfunction,
        offset: c_int,
        ptr: *mut c_void,
        numbytes: c_uint,
    ) -> CUresult;
    pub fn cuFuncSetBlockShape(hfunc: CUfunction, x: c_int, y: c_int, z: c_int) -> CUresult;
    pub fn cuFuncSetSharedSize(hfunc: CUfunction, bytes: c_uint) -> CUresult;
    pub fn cuLaunchGridAsync(
        f: CUfunction,
        grid_width: c_int,
        grid_height: c_int,
        stream: CUstream,
    ) -> CUresult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_attribute_value_fields_share_storage() {
        let mut attr = CUlaunchAttribute::new(CU_LAUNCH_ATTRIBUTE_CLUSTER_DIMENSION);
        attr.value.cluster_dim = CUclusterDim { x: 2, y: 1, z: 1 };

        let raw = unsafe { attr.value.pad };
        assert_eq!(&raw[0..4], &2u32.to_ne_bytes());
        assert_eq!(&raw[4..8], &1u32.to_ne_bytes());
        assert_eq!(attr.id, 4);
    }

    #[test]
    fn test_launch_config_layout() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<CUlaunchConfig>(), 56);
        assert_eq!(std::mem::offset_of!(CUlaunchConfig, sharedMemBytes), 24);
    }
}
