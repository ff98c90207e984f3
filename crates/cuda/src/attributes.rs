//! Compiled kernel attributes via `cuFuncGetAttribute`.

use crate::driver::Driver;
use crate::error::CudaResult;
use crate::launch::{Function, Launcher};
use crate::status;
use crate::sys::{
    CUfunction_attribute, CU_FUNC_ATTRIBUTE_BINARY_VERSION, CU_FUNC_ATTRIBUTE_CACHE_MODE_CA,
    CU_FUNC_ATTRIBUTE_CONST_SIZE_BYTES, CU_FUNC_ATTRIBUTE_LOCAL_SIZE_BYTES,
    CU_FUNC_ATTRIBUTE_MAX_DYNAMIC_SHARED_SIZE_BYTES, CU_FUNC_ATTRIBUTE_MAX_THREADS_PER_BLOCK,
    CU_FUNC_ATTRIBUTE_NUM_REGS, CU_FUNC_ATTRIBUTE_PREFERRED_SHARED_MEMORY_CARVEOUT,
    CU_FUNC_ATTRIBUTE_PTX_VERSION, CU_FUNC_ATTRIBUTE_SHARED_SIZE_BYTES,
};
use crate::version::Gate;
use serde::Serialize;
use std::os::raw::c_int;
use tracing::debug;

/// Resource usage and limits of one compiled kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KernelAttributes {
    /// Largest block this kernel can be launched with
    pub max_threads_per_block: i32,
    /// Statically allocated shared memory
    pub shared_size_bytes: i32,
    /// User constant memory
    pub const_size_bytes: i32,
    /// Local memory per thread
    pub local_size_bytes: i32,
    /// Registers per thread
    pub num_regs: i32,
    /// PTX virtual architecture, e.g. 70 for `compute_70`
    pub ptx_version: i32,
    /// Binary architecture, e.g. 86 for `sm_86`
    pub binary_version: i32,
    /// Compiled with `-Xptxas --dlcm=ca`
    pub cache_mode_ca: bool,
    /// Dynamic shared memory limit; `None` before CUDA 9.0
    pub max_dynamic_shared_size_bytes: Option<i32>,
    /// Preferred shared memory carveout in percent; `None` before CUDA 9.0
    pub preferred_shared_memory_carveout: Option<i32>,
}

impl<D: Driver> Launcher<D> {
    /// Query every attribute the driver version knows about.
    ///
    /// Attributes introduced after `D::VERSION` come back as `None` without
    /// asking the driver.
    pub fn kernel_attributes(&self, f: Function) -> CudaResult<KernelAttributes> {
        self.ensure_linked("cuFuncGetAttribute")?;

        let get = |attrib: CUfunction_attribute| -> CudaResult<i32> {
            let mut value: c_int = 0;
            // SAFETY: `value` is a valid out pointer; `f` is a live function.
            let raw = unsafe {
                self.driver()
                    .func_get_attribute(&mut value, attrib, f.as_raw())
            };
            status::check(raw)?;
            Ok(value)
        };

        let dynamic = Gate::MaxDynamicSharedSize.is_available(D::VERSION);
        let attributes = KernelAttributes {
            max_threads_per_block: get(CU_FUNC_ATTRIBUTE_MAX_THREADS_PER_BLOCK)?,
            shared_size_bytes: get(CU_FUNC_ATTRIBUTE_SHARED_SIZE_BYTES)?,
            const_size_bytes: get(CU_FUNC_ATTRIBUTE_CONST_SIZE_BYTES)?,
            local_size_bytes: get(CU_FUNC_ATTRIBUTE_LOCAL_SIZE_BYTES)?,
            num_regs: get(CU_FUNC_ATTRIBUTE_NUM_REGS)?,
            ptx_version: get(CU_FUNC_ATTRIBUTE_PTX_VERSION)?,
            binary_version: get(CU_FUNC_ATTRIBUTE_BINARY_VERSION)?,
            cache_mode_ca: get(CU_FUNC_ATTRIBUTE_CACHE_MODE_CA)? != 0,
            max_dynamic_shared_size_bytes: if dynamic {
                Some(get(CU_FUNC_ATTRIBUTE_MAX_DYNAMIC_SHARED_SIZE_BYTES)?)
            } else {
                None
            },
            preferred_shared_memory_carveout: if dynamic {
                Some(get(CU_FUNC_ATTRIBUTE_PREFERRED_SHARED_MEMORY_CARVEOUT)?)
            } else {
                None
            },
        };
        debug!(?attributes, "queried kernel attributes");
        Ok(attributes)
    }
}
