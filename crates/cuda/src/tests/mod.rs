//! Test suite for the launch bindings

mod attribute_tests;

use crate::launch::Function;
use crate::sys::CUfunction;

/// Stand-in kernel handle; the mock driver never dereferences it.
pub(crate) fn test_function() -> Function {
    unsafe { Function::from_raw(0x1000usize as CUfunction) }.unwrap()
}
