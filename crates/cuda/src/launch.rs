//! Kernel launches.
//!
//! [`Launcher`] marshals a [`LaunchConfig`] and an ordered argument list into
//! the call sequence its [`Driver`] version supports. Each path comes in two
//! flavors: the plain method returns `CudaResult<()>`, the `_status` variant
//! hands back a [`StatusReport`] for callers that want to inspect native
//! failures themselves. Locally detected misuse is an `Err` either way.

use crate::driver::{Driver, NativeDriver};
use crate::error::{CudaError, CudaResult};
use crate::params::{KernelArg, PackedParams, PointerArray};
use crate::status::{self, StatusReport};
use crate::stream::StreamHandle;
use crate::sys::{
    CUclusterDim, CUfunction, CUlaunchAttribute, CUlaunchConfig, CUresult, CUDA_SUCCESS,
    CU_LAUNCH_ATTRIBUTE_CLUSTER_DIMENSION, CU_LAUNCH_ATTRIBUTE_COOPERATIVE,
    CU_LAUNCH_ATTRIBUTE_PRIORITY,
};
use crate::version::{CudaVersion, Gate, LaunchCapabilities, LaunchStrategy};
use std::ffi::c_void;
use std::os::raw::{c_int, c_uint};
use std::ptr;
use tracing::{trace, warn};

/// Grid or block extent as `(x, y, z)`
pub type Dim3 = (u32, u32, u32);

/// Threads per block used by [`LaunchConfig::for_num_elems`]
const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Handle of a loaded kernel.
///
/// Borrowed from the module loader; this crate never unloads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Function(usize);

impl Function {
    /// Wrap a handle returned by `cuModuleGetFunction`.
    ///
    /// # Safety
    ///
    /// `raw` must stay a valid function of its module for as long as the
    /// returned value is used to launch.
    pub unsafe fn from_raw(raw: CUfunction) -> CudaResult<Self> {
        if raw.is_null() {
            return Err(CudaError::invalid_value("function handle"));
        }
        Ok(Function(raw as usize))
    }

    /// Raw handle
    pub fn as_raw(self) -> CUfunction {
        self.0 as CUfunction
    }
}

/// Grid geometry, dynamic shared memory and stream of one launch.
///
/// Nothing here is validated against device limits; the driver does that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Grid dimensions in blocks
    pub grid_dim: Dim3,
    /// Block dimensions in threads
    pub block_dim: Dim3,
    /// Dynamic shared memory per block
    pub shared_memory_bytes: u32,
    /// Stream to launch on, `None` for the default stream
    pub stream: Option<StreamHandle>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            grid_dim: (1, 1, 1),
            block_dim: (1, 1, 1),
            shared_memory_bytes: 0,
            stream: None,
        }
    }
}

impl LaunchConfig {
    /// One thread per element in 1D blocks of 256.
    pub fn for_num_elems(n: u32) -> Self {
        let blocks = n.div_ceil(DEFAULT_BLOCK_SIZE).max(1);
        Self {
            grid_dim: (blocks, 1, 1),
            block_dim: (DEFAULT_BLOCK_SIZE, 1, 1),
            ..Self::default()
        }
    }

    /// Threads in one block
    pub fn threads_per_block(&self) -> u64 {
        let (x, y, z) = self.block_dim;
        x as u64 * y as u64 * z as u64
    }

    /// Threads across the whole grid
    pub fn total_threads(&self) -> u64 {
        let (x, y, z) = self.grid_dim;
        x as u64 * y as u64 * z as u64 * self.threads_per_block()
    }
}

/// Builder for [`LaunchConfig`]
#[derive(Debug, Clone, Default)]
pub struct LaunchConfigBuilder {
    config: LaunchConfig,
}

impl LaunchConfigBuilder {
    /// Start from a single-thread launch on the default stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Set grid dimensions
    pub fn grid_dim(mut self, x: u32, y: u32, z: u32) -> Self {
        self.config.grid_dim = (x, y, z);
        self
    }

    /// Set block dimensions
    pub fn block_dim(mut self, x: u32, y: u32, z: u32) -> Self {
        self.config.block_dim = (x, y, z);
        self
    }

    /// Set dynamic shared memory size
    pub fn shared_memory(mut self, bytes: u32) -> Self {
        self.config.shared_memory_bytes = bytes;
        self
    }

    /// Launch on `stream`
    pub fn stream(mut self, stream: StreamHandle) -> Self {
        self.config.stream = Some(stream);
        self
    }

    /// Build the configuration
    pub fn build(self) -> LaunchConfig {
        self.config
    }
}

/// Extra per-launch attributes for [`Launcher::launch_ex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchAttribute {
    /// Thread block cluster shape
    ClusterDim(Dim3),
    /// Launch cooperatively
    Cooperative(bool),
    /// Stream priority override
    Priority(i32),
}

impl LaunchAttribute {
    fn to_raw(self) -> CUlaunchAttribute {
        match self {
            LaunchAttribute::ClusterDim((x, y, z)) => {
                let mut attr = CUlaunchAttribute::new(CU_LAUNCH_ATTRIBUTE_CLUSTER_DIMENSION);
                attr.value.cluster_dim = CUclusterDim { x, y, z };
                attr
            }
            LaunchAttribute::Cooperative(enabled) => {
                let mut attr = CUlaunchAttribute::new(CU_LAUNCH_ATTRIBUTE_COOPERATIVE);
                attr.value.cooperative = enabled as c_int;
                attr
            }
            LaunchAttribute::Priority(priority) => {
                let mut attr = CUlaunchAttribute::new(CU_LAUNCH_ATTRIBUTE_PRIORITY);
                attr.value.priority = priority;
                attr
            }
        }
    }
}

/// Returns early with the raw status when a native call fails.
macro_rules! try_native {
    ($call:expr) => {{
        let raw: CUresult = $call;
        if raw != CUDA_SUCCESS {
            return Ok(raw);
        }
    }};
}

fn to_c_int(value: u32, parameter: &str) -> CudaResult<c_int> {
    c_int::try_from(value).map_err(|_| CudaError::invalid_value(parameter))
}

/// Launches kernels through a [`Driver`].
#[derive(Debug, Clone, Default)]
pub struct Launcher<D: Driver> {
    driver: D,
}

impl Launcher<NativeDriver> {
    /// Launcher over the driver this crate was built against
    pub fn native() -> Self {
        Self::new(NativeDriver)
    }
}

impl<D: Driver> Launcher<D> {
    /// Call sequence used by [`Launcher::launch`]
    pub const STRATEGY: LaunchStrategy = D::STRATEGY;

    /// Launch paths `D` provides
    pub const CAPABILITIES: LaunchCapabilities = LaunchCapabilities::for_version(D::VERSION);

    /// Wrap a driver
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// The wrapped driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Version the launch paths are selected for
    pub fn version(&self) -> CudaVersion {
        D::VERSION
    }

    pub(crate) fn ensure_linked(&self, operation: &'static str) -> CudaResult<()> {
        if D::IS_LINKED {
            Ok(())
        } else {
            Err(CudaError::NotLinked { operation })
        }
    }

    /// Launch with the strategy selected for `D`.
    pub fn launch(&self, f: Function, config: &LaunchConfig, args: &[KernelArg]) -> CudaResult<()> {
        status::check(self.selected_raw(f, config, args)?)
    }

    /// Like [`Launcher::launch`], reporting the native outcome instead of failing on it.
    pub fn launch_status(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<StatusReport> {
        Ok(StatusReport::from_raw(self.selected_raw(f, config, args)?))
    }

    fn selected_raw(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<CUresult> {
        match Self::STRATEGY {
            LaunchStrategy::PointerArray => self.pointer_array_raw(f, config, args),
            LaunchStrategy::PackedBuffer => self.packed_raw(f, config, args),
            LaunchStrategy::Legacy => self.legacy_raw(f, config, args),
        }
    }

    /// `cuLaunchKernel` with one pointer per argument.
    pub fn launch_pointer_array(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<()> {
        status::check(self.pointer_array_raw(f, config, args)?)
    }

    /// [`Launcher::launch_pointer_array`] reporting the native outcome.
    pub fn launch_pointer_array_status(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<StatusReport> {
        Ok(StatusReport::from_raw(self.pointer_array_raw(f, config, args)?))
    }

    /// `cuLaunchKernel` with the arguments packed into one buffer.
    pub fn launch_packed(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<()> {
        status::check(self.packed_raw(f, config, args)?)
    }

    /// [`Launcher::launch_packed`] reporting the native outcome.
    pub fn launch_packed_status(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<StatusReport> {
        Ok(StatusReport::from_raw(self.packed_raw(f, config, args)?))
    }

    /// The pre-4.0 four-call sequence.
    ///
    /// That sequence has no grid z extent, so a config with
    /// `grid_dim.2 > 1` is rejected before any native call.
    pub fn launch_legacy(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<()> {
        status::check(self.legacy_raw(f, config, args)?)
    }

    /// [`Launcher::launch_legacy`] reporting the outcome of the first failing
    /// call, or of `cuLaunchGridAsync`.
    pub fn launch_legacy_status(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<StatusReport> {
        Ok(StatusReport::from_raw(self.legacy_raw(f, config, args)?))
    }

    /// `cuLaunchCooperativeKernel`, available from CUDA 9.0.
    pub fn launch_cooperative(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<()> {
        status::check(self.cooperative_raw(f, config, args)?)
    }

    /// [`Launcher::launch_cooperative`] reporting the native outcome.
    pub fn launch_cooperative_status(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<StatusReport> {
        Ok(StatusReport::from_raw(self.cooperative_raw(f, config, args)?))
    }

    /// `cuLaunchKernelEx` with a thread block cluster, available from CUDA 12.0.
    pub fn launch_with_cluster(
        &self,
        f: Function,
        config: &LaunchConfig,
        cluster_dim: Dim3,
        args: &[KernelArg],
    ) -> CudaResult<()> {
        self.launch_ex(f, config, &[LaunchAttribute::ClusterDim(cluster_dim)], args)
    }

    /// `cuLaunchKernelEx` with arbitrary launch attributes, available from CUDA 12.0.
    pub fn launch_ex(
        &self,
        f: Function,
        config: &LaunchConfig,
        attributes: &[LaunchAttribute],
        args: &[KernelArg],
    ) -> CudaResult<()> {
        status::check(self.ex_raw(f, config, attributes, args)?)
    }

    /// [`Launcher::launch_ex`] reporting the native outcome.
    pub fn launch_ex_status(
        &self,
        f: Function,
        config: &LaunchConfig,
        attributes: &[LaunchAttribute],
        args: &[KernelArg],
    ) -> CudaResult<StatusReport> {
        Ok(StatusReport::from_raw(self.ex_raw(f, config, attributes, args)?))
    }

    /// Installed driver version, as reported by `cuDriverGetVersion`.
    pub fn driver_version(&self) -> CudaResult<CudaVersion> {
        self.ensure_linked("cuDriverGetVersion")?;
        let mut encoded: c_int = 0;
        // SAFETY: `encoded` is a valid out pointer for the duration of the call.
        status::check(unsafe { self.driver.driver_get_version(&mut encoded) })?;
        let encoded =
            u32::try_from(encoded).map_err(|_| CudaError::invalid_value("driver version"))?;
        Ok(CudaVersion::from_encoded(encoded))
    }

    /// Compare the installed driver with the version launches were selected for.
    ///
    /// An older installed driver is only warned about: launches that need a
    /// newer entry point will fail in the driver.
    pub fn check_driver_compat(&self) -> CudaResult<CudaVersion> {
        let installed = self.driver_version()?;
        if installed < D::VERSION {
            warn!(
                installed = %installed,
                linked = %D::VERSION,
                "installed CUDA driver is older than the version this build targets"
            );
        }
        Ok(installed)
    }

    fn pointer_array_raw(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<CUresult> {
        Gate::LaunchKernel.require(D::VERSION)?;
        self.ensure_linked(Gate::LaunchKernel.symbol())?;

        let mut params = PointerArray::encode(args);
        trace!(
            strategy = ?LaunchStrategy::PointerArray,
            grid = ?config.grid_dim,
            block = ?config.block_dim,
            shared = config.shared_memory_bytes,
            args = args.len(),
            "launching kernel"
        );
        // SAFETY: `params` outlives the call and holds one slot per argument.
        Ok(unsafe {
            self.driver.launch_kernel(
                f.as_raw(),
                config.grid_dim,
                config.block_dim,
                config.shared_memory_bytes,
                StreamHandle::resolve(config.stream),
                params.as_kernel_params(),
                ptr::null_mut(),
            )
        })
    }

    fn packed_raw(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<CUresult> {
        Gate::LaunchKernel.require(D::VERSION)?;
        self.ensure_linked(Gate::LaunchKernel.symbol())?;

        let mut packed = PackedParams::encode(args)?;
        let size = packed.size();
        let mut extra = packed.extra();
        trace!(
            strategy = ?LaunchStrategy::PackedBuffer,
            grid = ?config.grid_dim,
            block = ?config.block_dim,
            shared = config.shared_memory_bytes,
            args = args.len(),
            size,
            "launching kernel"
        );
        // SAFETY: `extra` borrows `packed`, which outlives the call.
        Ok(unsafe {
            self.driver.launch_kernel(
                f.as_raw(),
                config.grid_dim,
                config.block_dim,
                config.shared_memory_bytes,
                StreamHandle::resolve(config.stream),
                ptr::null_mut(),
                extra.as_mut_ptr(),
            )
        })
    }

    fn cooperative_raw(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<CUresult> {
        Gate::CooperativeLaunch.require(D::VERSION)?;
        self.ensure_linked(Gate::CooperativeLaunch.symbol())?;

        let mut params = PointerArray::encode(args);
        trace!(
            strategy = "cooperative",
            grid = ?config.grid_dim,
            block = ?config.block_dim,
            shared = config.shared_memory_bytes,
            args = args.len(),
            "launching kernel"
        );
        // SAFETY: `params` outlives the call and holds one slot per argument.
        Ok(unsafe {
            self.driver.launch_cooperative_kernel(
                f.as_raw(),
                config.grid_dim,
                config.block_dim,
                config.shared_memory_bytes,
                StreamHandle::resolve(config.stream),
                params.as_kernel_params(),
            )
        })
    }

    fn ex_raw(
        &self,
        f: Function,
        config: &LaunchConfig,
        attributes: &[LaunchAttribute],
        args: &[KernelArg],
    ) -> CudaResult<CUresult> {
        Gate::LaunchKernelEx.require(D::VERSION)?;
        self.ensure_linked(Gate::LaunchKernelEx.symbol())?;

        let mut attrs: Vec<CUlaunchAttribute> =
            attributes.iter().map(|attr| attr.to_raw()).collect();
        let num_attrs = c_uint::try_from(attrs.len())
            .map_err(|_| CudaError::invalid_value("launch attribute count"))?;
        let (grid_x, grid_y, grid_z) = config.grid_dim;
        let (block_x, block_y, block_z) = config.block_dim;
        let launch_config = CUlaunchConfig {
            gridDimX: grid_x,
            gridDimY: grid_y,
            gridDimZ: grid_z,
            blockDimX: block_x,
            blockDimY: block_y,
            blockDimZ: block_z,
            sharedMemBytes: config.shared_memory_bytes,
            hStream: StreamHandle::resolve(config.stream),
            attrs: if attrs.is_empty() {
                ptr::null_mut()
            } else {
                attrs.as_mut_ptr()
            },
            numAttrs: num_attrs,
        };

        let mut params = PointerArray::encode(args);
        trace!(
            strategy = "launch_ex",
            grid = ?config.grid_dim,
            block = ?config.block_dim,
            attributes = attributes.len(),
            args = args.len(),
            "launching kernel"
        );
        // SAFETY: `launch_config`, `attrs` and `params` all outlive the call.
        Ok(unsafe {
            self.driver.launch_kernel_ex(
                &launch_config,
                f.as_raw(),
                params.as_kernel_params(),
                ptr::null_mut(),
            )
        })
    }

    fn legacy_raw(
        &self,
        f: Function,
        config: &LaunchConfig,
        args: &[KernelArg],
    ) -> CudaResult<CUresult> {
        self.ensure_linked("cuLaunchGridAsync")?;

        let (grid_x, grid_y, grid_z) = config.grid_dim;
        if grid_z > 1 {
            return Err(CudaError::InvalidLaunch {
                message: format!("legacy launch has no grid z extent (grid_dim.2 = {grid_z})"),
            });
        }
        let grid_x = to_c_int(grid_x, "grid_dim.0")?;
        let grid_y = to_c_int(grid_y, "grid_dim.1")?;
        let (block_x, block_y, block_z) = config.block_dim;
        let block_x = to_c_int(block_x, "block_dim.0")?;
        let block_y = to_c_int(block_y, "block_dim.1")?;
        let block_z = to_c_int(block_z, "block_dim.2")?;

        let packed = PackedParams::encode(args)?;
        trace!(
            strategy = ?LaunchStrategy::Legacy,
            grid = ?config.grid_dim,
            block = ?config.block_dim,
            shared = config.shared_memory_bytes,
            args = args.len(),
            size = packed.size(),
            "launching kernel"
        );

        let raw_f = f.as_raw();
        for (&offset, arg) in packed.offsets().iter().zip(args) {
            let bytes = &packed.bytes()[offset..offset + arg.size()];
            let offset = c_int::try_from(offset)
                .map_err(|_| CudaError::invalid_value("kernel argument offset"))?;
            let len = c_uint::try_from(bytes.len())
                .map_err(|_| CudaError::invalid_value("kernel argument size"))?;
            // SAFETY: the driver copies `len` bytes out of `packed` during the call.
            try_native!(unsafe {
                self.driver
                    .param_setv(raw_f, offset, bytes.as_ptr() as *mut c_void, len)
            });
        }
        let size = c_uint::try_from(packed.size())
            .map_err(|_| CudaError::invalid_value("kernel argument buffer size"))?;

        // SAFETY: plain value arguments on a valid function handle.
        unsafe {
            try_native!(self.driver.param_set_size(raw_f, size));
            try_native!(self
                .driver
                .func_set_shared_size(raw_f, config.shared_memory_bytes));
            try_native!(self
                .driver
                .func_set_block_shape(raw_f, block_x, block_y, block_z));
            Ok(self.driver.launch_grid_async(
                raw_f,
                grid_x,
                grid_y,
                StreamHandle::resolve(config.stream),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_config_creation() {
        let config = LaunchConfig {
            grid_dim: (100, 1, 1),
            block_dim: (256, 1, 1),
            shared_memory_bytes: 1024,
            stream: None,
        };

        assert_eq!(config.grid_dim, (100, 1, 1));
        assert_eq!(config.block_dim, (256, 1, 1));
        assert_eq!(config.shared_memory_bytes, 1024);
        assert!(config.stream.is_none());
        assert_eq!(config.total_threads(), 25_600);
    }

    #[test]
    fn test_launch_config_builder() {
        let config = LaunchConfigBuilder::new()
            .grid_dim(100, 1, 1)
            .block_dim(16, 16, 1)
            .shared_memory(4096)
            .stream(StreamHandle::PER_THREAD)
            .build();

        assert_eq!(config.grid_dim, (100, 1, 1));
        assert_eq!(config.block_dim, (16, 16, 1));
        assert_eq!(config.shared_memory_bytes, 4096);
        assert_eq!(config.stream, Some(StreamHandle::PER_THREAD));
        assert_eq!(config.threads_per_block(), 256);
    }

    #[test]
    fn test_for_num_elems() {
        assert_eq!(LaunchConfig::for_num_elems(1000).grid_dim, (4, 1, 1));
        assert_eq!(LaunchConfig::for_num_elems(1024).grid_dim, (4, 1, 1));
        assert_eq!(LaunchConfig::for_num_elems(0).grid_dim, (1, 1, 1));
        assert_eq!(LaunchConfig::for_num_elems(1).block_dim, (256, 1, 1));
    }

    #[test]
    fn test_null_function_rejected() {
        let err = unsafe { Function::from_raw(ptr::null_mut()) }.unwrap_err();
        assert!(matches!(err, CudaError::InvalidValue { .. }));

        let raw = 0x5000usize as CUfunction;
        let f = unsafe { Function::from_raw(raw) }.unwrap();
        assert_eq!(f.as_raw(), raw);
    }

    #[test]
    fn test_launch_attribute_to_raw() {
        let attr = LaunchAttribute::ClusterDim((2, 1, 1)).to_raw();
        assert_eq!(attr.id, CU_LAUNCH_ATTRIBUTE_CLUSTER_DIMENSION);
        let dims = unsafe { attr.value.cluster_dim };
        assert_eq!((dims.x, dims.y, dims.z), (2, 1, 1));

        let attr = LaunchAttribute::Priority(-1).to_raw();
        assert_eq!(attr.id, CU_LAUNCH_ATTRIBUTE_PRIORITY);
        assert_eq!(unsafe { attr.value.priority }, -1);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_native_launcher_without_driver() {
        let launcher = Launcher::native();
        let f = unsafe { Function::from_raw(0x1000usize as CUfunction) }.unwrap();
        let err = launcher
            .launch(f, &LaunchConfig::default(), &[KernelArg::Int(1)])
            .unwrap_err();
        assert!(matches!(err, CudaError::NotLinked { .. }));
        assert!(matches!(
            launcher.driver_version(),
            Err(CudaError::NotLinked { .. })
        ));
    }
}
