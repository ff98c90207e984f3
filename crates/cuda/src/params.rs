//! Kernel argument marshaling.
//!
//! [`KernelArg`] is the tagged union of values a kernel can take. Two encoders
//! turn an ordered argument list into something the driver accepts:
//!
//! - [`PointerArray`]: every argument copied into its own heap slot, plus an
//!   array with one pointer per slot (`kernelParams` of `cuLaunchKernel`).
//! - [`PackedParams`]: all arguments packed into one buffer at their natural
//!   alignment, described to the driver by the `extra` side table.
//!
//! Both own their scratch storage; dropping the encoder releases it, so a
//! launch that fails half way leaks nothing.

use crate::error::{CudaError, CudaResult};
use crate::sys::{
    CUdeviceptr, CU_LAUNCH_PARAM_BUFFER_POINTER, CU_LAUNCH_PARAM_BUFFER_SIZE, CU_LAUNCH_PARAM_END,
};
use bytemuck::{Pod, Zeroable};
use std::ffi::c_void;
use std::marker::PhantomData;
use tracing::debug;

/// Largest alignment a kernel parameter can declare (`float4`, `double2`).
pub const MAX_ARG_ALIGN: usize = 16;

/// Arbitrary fixed-size value passed by bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgValue {
    bytes: Vec<u8>,
    align: usize,
}

impl ArgValue {
    /// Raw byte image with an explicit alignment.
    pub fn from_bytes(bytes: &[u8], align: usize) -> CudaResult<Self> {
        if bytes.is_empty() {
            return Err(CudaError::invalid_value("kernel argument size"));
        }
        if !align.is_power_of_two() || align > MAX_ARG_ALIGN {
            return Err(CudaError::invalid_value("kernel argument alignment"));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
            align,
        })
    }

    /// Byte image of a plain-old-data value, aligned like `T`.
    pub fn of<T: Pod>(value: &T) -> CudaResult<Self> {
        Self::from_bytes(bytemuck::bytes_of(value), std::mem::align_of::<T>())
    }

    /// Native bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Declared alignment
    pub fn align(&self) -> usize {
        self.align
    }
}

/// One kernel argument.
///
/// The order of a `&[KernelArg]` is the order of the kernel's parameters.
/// Nothing here can check it against the compiled signature; a mismatch is a
/// silent fault on the device.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelArg {
    /// 32-bit signed integer (`int`)
    Int(i32),
    /// Single precision float (`float`)
    Float(f32),
    /// Any other fixed-size value, including device pointers and structs
    Value(ArgValue),
}

impl KernelArg {
    /// Argument from a plain-old-data value.
    pub fn value<T: Pod>(value: &T) -> CudaResult<Self> {
        ArgValue::of(value).map(KernelArg::Value)
    }

    /// Device pointer argument.
    pub fn device_ptr(ptr: CUdeviceptr) -> Self {
        KernelArg::Value(ArgValue {
            bytes: ptr.to_ne_bytes().to_vec(),
            align: std::mem::align_of::<CUdeviceptr>(),
        })
    }

    /// Size in bytes of the native representation
    pub fn size(&self) -> usize {
        match self {
            KernelArg::Int(_) => std::mem::size_of::<i32>(),
            KernelArg::Float(_) => std::mem::size_of::<f32>(),
            KernelArg::Value(value) => value.size(),
        }
    }

    /// Alignment of the native representation
    pub fn align(&self) -> usize {
        match self {
            KernelArg::Int(_) => std::mem::align_of::<i32>(),
            KernelArg::Float(_) => std::mem::align_of::<f32>(),
            KernelArg::Value(value) => value.align(),
        }
    }

    /// Copy the native bytes into `out`, which must be exactly `size()` long.
    fn write_to(&self, out: &mut [u8]) {
        match self {
            KernelArg::Int(v) => out.copy_from_slice(&v.to_ne_bytes()),
            KernelArg::Float(v) => out.copy_from_slice(&v.to_ne_bytes()),
            KernelArg::Value(value) => out.copy_from_slice(value.bytes()),
        }
    }
}

impl From<i32> for KernelArg {
    fn from(value: i32) -> Self {
        KernelArg::Int(value)
    }
}

impl From<f32> for KernelArg {
    fn from(value: f32) -> Self {
        KernelArg::Float(value)
    }
}

/// 16-byte aligned storage unit.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct Chunk([u8; MAX_ARG_ALIGN]);

// SAFETY: a byte array with no padding; every bit pattern is valid.
unsafe impl Zeroable for Chunk {}
unsafe impl Pod for Chunk {}

/// Zeroed heap storage of at least `len` bytes, aligned to [`MAX_ARG_ALIGN`].
struct AlignedBytes {
    chunks: Box<[Chunk]>,
    len: usize,
}

impl AlignedBytes {
    fn zeroed(len: usize) -> Self {
        let count = len.div_ceil(MAX_ARG_ALIGN);
        Self {
            chunks: vec![Chunk::zeroed(); count].into_boxed_slice(),
            len,
        }
    }

    fn as_slice(&self) -> &[u8] {
        &bytemuck::cast_slice::<Chunk, u8>(&self.chunks)[..self.len]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Chunk, u8>(&mut self.chunks)[..self.len]
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.chunks.as_mut_ptr().cast()
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Arguments as an array of pointers, one per argument.
pub struct PointerArray {
    slots: Vec<AlignedBytes>,
    pointers: Vec<*mut c_void>,
}

impl PointerArray {
    /// Copy every argument into its own slot.
    pub fn encode(args: &[KernelArg]) -> Self {
        let mut slots: Vec<AlignedBytes> = args
            .iter()
            .map(|arg| {
                let mut slot = AlignedBytes::zeroed(arg.size());
                arg.write_to(slot.as_mut_slice());
                slot
            })
            .collect();
        let pointers = slots.iter_mut().map(AlignedBytes::as_mut_ptr).collect();
        debug!(count = args.len(), "encoded kernel arguments as pointer array");
        Self { slots, pointers }
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    /// Whether there are no arguments
    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// Bytes of the `index`-th argument
    pub fn arg_bytes(&self, index: usize) -> Option<&[u8]> {
        self.slots.get(index).map(AlignedBytes::as_slice)
    }

    /// The pointer array itself
    pub fn pointers(&self) -> &[*mut c_void] {
        &self.pointers
    }

    /// `kernelParams` for the driver. Never null, even without arguments.
    pub fn as_kernel_params(&mut self) -> *mut *mut c_void {
        self.pointers.as_mut_ptr()
    }
}

/// Arguments packed into one contiguous buffer.
pub struct PackedParams {
    buffer: AlignedBytes,
    offsets: Vec<usize>,
    sizes: Vec<usize>,
    size: usize,
}

impl PackedParams {
    /// Pack `args`, each at the next offset aligned to its own alignment.
    pub fn encode(args: &[KernelArg]) -> CudaResult<Self> {
        let mut offsets = Vec::with_capacity(args.len());
        let sizes: Vec<usize> = args.iter().map(KernelArg::size).collect();
        let mut size = 0usize;
        for (arg, arg_size) in args.iter().zip(&sizes) {
            let offset = align_up(size, arg.align());
            offsets.push(offset);
            size = offset + arg_size;
        }

        if u32::try_from(size).is_err() {
            return Err(CudaError::invalid_value("kernel argument buffer size"));
        }
        if offsets.last().is_some_and(|o| i32::try_from(*o).is_err()) {
            return Err(CudaError::invalid_value("kernel argument offset"));
        }

        let mut buffer = AlignedBytes::zeroed(size);
        let bytes = buffer.as_mut_slice();
        for ((arg, offset), len) in args.iter().zip(&offsets).zip(&sizes) {
            arg.write_to(&mut bytes[*offset..*offset + len]);
        }

        debug!(count = args.len(), size, "packed kernel arguments");
        Ok(Self {
            buffer,
            offsets,
            sizes,
            size,
        })
    }

    /// Total buffer size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Offset of each argument within the buffer
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The packed bytes
    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Bytes of the `index`-th argument
    pub fn arg_bytes(&self, index: usize) -> Option<&[u8]> {
        let start = *self.offsets.get(index)?;
        let len = self.sizes[index];
        Some(&self.bytes()[start..start + len])
    }

    /// Sentinel-terminated `extra` table pointing at this buffer.
    pub fn extra(&mut self) -> ExtraArgs<'_> {
        let size_ptr: *mut usize = &mut self.size;
        ExtraArgs {
            slots: [
                CU_LAUNCH_PARAM_BUFFER_POINTER as *mut c_void,
                self.buffer.as_mut_ptr(),
                CU_LAUNCH_PARAM_BUFFER_SIZE as *mut c_void,
                size_ptr.cast(),
                CU_LAUNCH_PARAM_END as *mut c_void,
            ],
            _buffer: PhantomData,
        }
    }
}

/// The `extra` argument of `cuLaunchKernel`, borrowing its [`PackedParams`].
pub struct ExtraArgs<'a> {
    slots: [*mut c_void; 5],
    _buffer: PhantomData<&'a mut PackedParams>,
}

impl ExtraArgs<'_> {
    /// Raw table entries
    pub fn slots(&self) -> &[*mut c_void; 5] {
        &self.slots
    }

    /// Pointer handed to the driver
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_void {
        self.slots.as_mut_ptr()
    }
}
