//! Tests for kernel attribute queries

use super::mock_driver::{Call, Cuda12, Cuda8};
use super::test_function;
use crate::launch::Launcher;
use crate::status::DriverStatus;
use crate::sys::*;

#[test]
fn test_all_attributes_on_current_driver() {
    let driver = Cuda12::new()
        .with_attribute(CU_FUNC_ATTRIBUTE_MAX_THREADS_PER_BLOCK, 1024)
        .with_attribute(CU_FUNC_ATTRIBUTE_SHARED_SIZE_BYTES, 4096)
        .with_attribute(CU_FUNC_ATTRIBUTE_NUM_REGS, 32)
        .with_attribute(CU_FUNC_ATTRIBUTE_PTX_VERSION, 80)
        .with_attribute(CU_FUNC_ATTRIBUTE_BINARY_VERSION, 86)
        .with_attribute(CU_FUNC_ATTRIBUTE_CACHE_MODE_CA, 1)
        .with_attribute(CU_FUNC_ATTRIBUTE_MAX_DYNAMIC_SHARED_SIZE_BYTES, 49152)
        .with_attribute(CU_FUNC_ATTRIBUTE_PREFERRED_SHARED_MEMORY_CARVEOUT, -1);
    let launcher = Launcher::new(driver);

    let attributes = launcher.kernel_attributes(test_function()).unwrap();
    assert_eq!(attributes.max_threads_per_block, 1024);
    assert_eq!(attributes.shared_size_bytes, 4096);
    assert_eq!(attributes.const_size_bytes, 0);
    assert_eq!(attributes.num_regs, 32);
    assert_eq!(attributes.ptx_version, 80);
    assert_eq!(attributes.binary_version, 86);
    assert!(attributes.cache_mode_ca);
    assert_eq!(attributes.max_dynamic_shared_size_bytes, Some(49152));
    assert_eq!(attributes.preferred_shared_memory_carveout, Some(-1));
    assert_eq!(launcher.driver().calls().len(), 10);
}

#[test]
fn test_newer_attributes_skipped_on_old_driver() {
    let launcher = Launcher::new(Cuda8::new().with_attribute(CU_FUNC_ATTRIBUTE_NUM_REGS, 16));

    let attributes = launcher.kernel_attributes(test_function()).unwrap();
    assert_eq!(attributes.num_regs, 16);
    assert!(attributes.max_dynamic_shared_size_bytes.is_none());
    assert!(attributes.preferred_shared_memory_carveout.is_none());

    let queried: Vec<_> = launcher
        .driver()
        .calls()
        .into_iter()
        .map(|call| match call {
            Call::FuncGetAttribute(attrib) => attrib,
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(queried, (0..8).collect::<Vec<_>>());
}

#[test]
fn test_attribute_failure() {
    let launcher = Launcher::new(Cuda12::new().failing("cuFuncGetAttribute", 400));

    let err = launcher.kernel_attributes(test_function()).unwrap_err();
    assert_eq!(err.status(), Some(DriverStatus::InvalidHandle));
    assert_eq!(launcher.driver().calls().len(), 1);
}

#[test]
fn test_attributes_serialize() {
    let launcher = Launcher::new(Cuda8::new().with_attribute(CU_FUNC_ATTRIBUTE_NUM_REGS, 24));
    let attributes = launcher.kernel_attributes(test_function()).unwrap();

    let json = serde_json::to_value(attributes).unwrap();
    assert_eq!(json["num_regs"], 24);
    assert!(json["max_dynamic_shared_size_bytes"].is_null());
}
