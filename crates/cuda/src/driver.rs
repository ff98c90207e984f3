//! The seam between argument marshaling and the native driver.
//!
//! [`Driver`] lists the raw entry points the launch paths need. Its
//! associated constants carry the version and link state, so every gate in
//! [`crate::launch::Launcher`] folds to a constant per driver type.

use crate::launch::Dim3;
use crate::sys::{CUfunction, CUfunction_attribute, CUlaunchConfig, CUresult, CUstream};
use crate::version::{CudaVersion, LaunchStrategy};
use std::ffi::c_void;
use std::os::raw::{c_int, c_uint};

/// Raw driver entry points.
///
/// Implementations forward to the driver unchanged; they never decode
/// statuses or check versions themselves.
///
/// # Safety
///
/// Every method has the contract of the driver function it is named after:
/// handles must be live in the current context and pointers must stay valid
/// for the duration of the call.
pub trait Driver {
    /// Driver version the implementation calls into
    const VERSION: CudaVersion;

    /// Whether calls reach a real library
    const IS_LINKED: bool = true;

    /// Call sequence [`crate::launch::Launcher::launch`] uses.
    ///
    /// Defaults to the pointer array from 4.0 on and the legacy sequence
    /// before; an implementation may pick the packed buffer instead.
    const STRATEGY: LaunchStrategy = LaunchStrategy::for_version(Self::VERSION);

    /// `cuDriverGetVersion`
    unsafe fn driver_get_version(&self, version: *mut c_int) -> CUresult;

    /// `cuFuncGetAttribute`
    unsafe fn func_get_attribute(
        &self,
        value: *mut c_int,
        attrib: CUfunction_attribute,
        f: CUfunction,
    ) -> CUresult;

    /// `cuLaunchKernel`
    #[allow(clippy::too_many_arguments)]
    unsafe fn launch_kernel(
        &self,
        f: CUfunction,
        grid: Dim3,
        block: Dim3,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult;

    /// `cuLaunchCooperativeKernel`
    unsafe fn launch_cooperative_kernel(
        &self,
        f: CUfunction,
        grid: Dim3,
        block: Dim3,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
    ) -> CUresult;

    /// `cuLaunchKernelEx`
    unsafe fn launch_kernel_ex(
        &self,
        config: *const CUlaunchConfig,
        f: CUfunction,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult;

    /// `cuParamSetv`
    unsafe fn param_setv(
        &self,
        f: CUfunction,
        offset: c_int,
        ptr: *mut c_void,
        numbytes: c_uint,
    ) -> CUresult;

    /// `cuParamSetSize`
    unsafe fn param_set_size(&self, f: CUfunction, numbytes: c_uint) -> CUresult;

    /// `cuFuncSetSharedSize`
    unsafe fn func_set_shared_size(&self, f: CUfunction, bytes: c_uint) -> CUresult;

    /// `cuFuncSetBlockShape`
    unsafe fn func_set_block_shape(&self, f: CUfunction, x: c_int, y: c_int, z: c_int)
        -> CUresult;

    /// `cuLaunchGridAsync`
    unsafe fn launch_grid_async(
        &self,
        f: CUfunction,
        grid_width: c_int,
        grid_height: c_int,
        stream: CUstream,
    ) -> CUresult;
}

/// The driver this crate was built against.
///
/// Without the `cuda` feature nothing is linked: [`Driver::IS_LINKED`] is
/// false, the launcher refuses every call with `CudaError::NotLinked`, and
/// the methods below answer `CUDA_ERROR_NOT_SUPPORTED` if called directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDriver;

#[cfg(not(feature = "cuda"))]
#[allow(unused_variables)]
impl Driver for NativeDriver {
    const VERSION: CudaVersion = crate::version::LINKED;
    const IS_LINKED: bool = false;

    unsafe fn driver_get_version(&self, version: *mut c_int) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn func_get_attribute(
        &self,
        value: *mut c_int,
        attrib: CUfunction_attribute,
        f: CUfunction,
    ) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn launch_kernel(
        &self,
        f: CUfunction,
        grid: Dim3,
        block: Dim3,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn launch_cooperative_kernel(
        &self,
        f: CUfunction,
        grid: Dim3,
        block: Dim3,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
    ) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn launch_kernel_ex(
        &self,
        config: *const CUlaunchConfig,
        f: CUfunction,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn param_setv(
        &self,
        f: CUfunction,
        offset: c_int,
        ptr: *mut c_void,
        numbytes: c_uint,
    ) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn param_set_size(&self, f: CUfunction, numbytes: c_uint) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn func_set_shared_size(&self, f: CUfunction, bytes: c_uint) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn func_set_block_shape(
        &self,
        f: CUfunction,
        x: c_int,
        y: c_int,
        z: c_int,
    ) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }

    unsafe fn launch_grid_async(
        &self,
        f: CUfunction,
        grid_width: c_int,
        grid_height: c_int,
        stream: CUstream,
    ) -> CUresult {
        crate::sys::CUDA_ERROR_NOT_SUPPORTED
    }
}

#[cfg(feature = "cuda")]
impl Driver for NativeDriver {
    const VERSION: CudaVersion = crate::version::LINKED;

    unsafe fn driver_get_version(&self, version: *mut c_int) -> CUresult {
        crate::sys::cuDriverGetVersion(version)
    }

    unsafe fn func_get_attribute(
        &self,
        value: *mut c_int,
        attrib: CUfunction_attribute,
        f: CUfunction,
    ) -> CUresult {
        crate::sys::cuFuncGetAttribute(value, attrib, f)
    }

    unsafe fn launch_kernel(
        &self,
        f: CUfunction,
        grid: Dim3,
        block: Dim3,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult {
        #[cfg(cuda_launch_kernel)]
        {
            crate::sys::cuLaunchKernel(
                f,
                grid.0,
                grid.1,
                grid.2,
                block.0,
                block.1,
                block.2,
                shared_mem_bytes,
                stream,
                kernel_params,
                extra,
            )
        }

        #[cfg(not(cuda_launch_kernel))]
        {
            let _ = (f, grid, block, shared_mem_bytes, stream, kernel_params, extra);
            crate::sys::CUDA_ERROR_NOT_SUPPORTED
        }
    }

    unsafe fn launch_cooperative_kernel(
        &self,
        f: CUfunction,
        grid: Dim3,
        block: Dim3,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
    ) -> CUresult {
        #[cfg(cuda_cooperative_launch)]
        {
            crate::sys::cuLaunchCooperativeKernel(
                f,
                grid.0,
                grid.1,
                grid.2,
                block.0,
                block.1,
                block.2,
                shared_mem_bytes,
                stream,
                kernel_params,
            )
        }

        #[cfg(not(cuda_cooperative_launch))]
        {
            let _ = (f, grid, block, shared_mem_bytes, stream, kernel_params);
            crate::sys::CUDA_ERROR_NOT_SUPPORTED
        }
    }

    unsafe fn launch_kernel_ex(
        &self,
        config: *const CUlaunchConfig,
        f: CUfunction,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult {
        #[cfg(cuda_launch_ex)]
        {
            crate::sys::cuLaunchKernelEx(config, f, kernel_params, extra)
        }

        #[cfg(not(cuda_launch_ex))]
        {
            let _ = (config, f, kernel_params, extra);
            crate::sys::CUDA_ERROR_NOT_SUPPORTED
        }
    }

    unsafe fn param_setv(
        &self,
        f: CUfunction,
        offset: c_int,
        ptr: *mut c_void,
        numbytes: c_uint,
    ) -> CUresult {
        crate::sys::cuParamSetv(f, offset, ptr, numbytes)
    }

    unsafe fn param_set_size(&self, f: CUfunction, numbytes: c_uint) -> CUresult {
        crate::sys::cuParamSetSize(f, numbytes)
    }

    unsafe fn func_set_shared_size(&self, f: CUfunction, bytes: c_uint) -> CUresult {
        crate::sys::cuFuncSetSharedSize(f, bytes)
    }

    unsafe fn func_set_block_shape(
        &self,
        f: CUfunction,
        x: c_int,
        y: c_int,
        z: c_int,
    ) -> CUresult {
        crate::sys::cuFuncSetBlockShape(f, x, y, z)
    }

    unsafe fn launch_grid_async(
        &self,
        f: CUfunction,
        grid_width: c_int,
        grid_height: c_int,
        stream: CUstream,
    ) -> CUresult {
        crate::sys::cuLaunchGridAsync(f, grid_width, grid_height, stream)
    }
}
