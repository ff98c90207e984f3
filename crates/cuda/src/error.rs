//! CUDA error types and result handling

use crate::status::DriverStatus;
use crate::version::CudaVersion;
use thiserror::Error;

/// CUDA operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CudaError {
    /// Non-success status returned by a native driver call
    #[error("CUDA driver error {code} ({}): {}", status.name(), status.description())]
    Driver {
        /// Decoded status
        status: DriverStatus,
        /// Raw integer returned by the driver
        code: i32,
    },

    /// Entry point does not exist in the linked driver version
    #[error("{operation} requires CUDA {required}, built against CUDA {linked}")]
    Unsupported {
        /// Operation that was requested
        operation: &'static str,
        /// Minimum version providing the entry point
        required: CudaVersion,
        /// Version this build links against
        linked: CudaVersion,
    },

    /// Launch request the selected call sequence cannot express
    #[error("Invalid launch: {message}")]
    InvalidLaunch {
        /// Error message
        message: String,
    },

    /// Argument that cannot be marshaled to its native representation
    #[error("Invalid value for {parameter}")]
    InvalidValue {
        /// Parameter name
        parameter: String,
    },

    /// Native call requested from a build without the `cuda` feature
    #[error("{operation} needs the native driver (build with feature `cuda`)")]
    NotLinked {
        /// Operation that was requested
        operation: &'static str,
    },
}

impl CudaError {
    /// Status carried by a driver error
    pub fn status(&self) -> Option<DriverStatus> {
        match self {
            CudaError::Driver { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error was synthesized because the linked version lacks the call
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CudaError::Unsupported { .. })
    }

    pub(crate) fn invalid_value(parameter: impl Into<String>) -> Self {
        CudaError::InvalidValue {
            parameter: parameter.into(),
        }
    }
}

/// Result type for CUDA operations
pub type CudaResult<T> = Result<T, CudaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CudaError::Driver {
            status: DriverStatus::OutOfMemory,
            code: 2,
        };
        assert_eq!(
            err.to_string(),
            "CUDA driver error 2 (CUDA_ERROR_OUT_OF_MEMORY): out of memory"
        );

        let err = CudaError::Unsupported {
            operation: "cuLaunchKernelEx",
            required: CudaVersion::new(12, 0, 0),
            linked: CudaVersion::new(11, 8, 0),
        };
        assert_eq!(
            err.to_string(),
            "cuLaunchKernelEx requires CUDA 12.0.0, built against CUDA 11.8.0"
        );

        let err = CudaError::InvalidValue {
            parameter: "shared_memory_bytes".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for shared_memory_bytes");
    }

    #[test]
    fn test_unknown_code_keeps_raw_value() {
        let err = CudaError::Driver {
            status: DriverStatus::Unknown,
            code: 12345,
        };
        assert!(err.to_string().starts_with("CUDA driver error 12345"));
        assert_eq!(err.status(), Some(DriverStatus::Unknown));
    }

    #[test]
    fn test_error_predicates() {
        let err = CudaError::NotLinked {
            operation: "cuLaunchKernel",
        };
        assert!(!err.is_unsupported());
        assert_eq!(err.status(), None);

        let err = CudaError::Unsupported {
            operation: "cuLaunchCooperativeKernel",
            required: CudaVersion::new(9, 0, 0),
            linked: CudaVersion::new(8, 0, 0),
        };
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_error_conversion() {
        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(CudaError::InvalidLaunch {
            message: "grid z".to_string(),
        });
        assert_eq!(err.to_string(), "Invalid launch: grid z");
    }
}
