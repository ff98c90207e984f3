//! Stream tokens consumed by launches.
//!
//! Streams are created and destroyed by the stream manager; this crate only
//! forwards the handle. `None` at a launch site means the default stream.

use crate::sys::{CUstream, CU_STREAM_LEGACY, CU_STREAM_PER_THREAD};

/// Borrowed stream handle.
///
/// Stored as an address so it can cross threads; whether the driver accepts
/// it there depends on which context is current, which callers manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(usize);

impl StreamHandle {
    /// The default stream (null handle)
    pub const DEFAULT: StreamHandle = StreamHandle(0);

    /// Legacy default stream, synchronizing with all blocking streams
    pub const LEGACY: StreamHandle = StreamHandle(CU_STREAM_LEGACY);

    /// Per-thread default stream
    pub const PER_THREAD: StreamHandle = StreamHandle(CU_STREAM_PER_THREAD);

    /// Wrap a handle from the stream manager.
    ///
    /// # Safety
    ///
    /// `raw` must be null, one of the special handles, or a live stream of
    /// the context that is current when the handle is used.
    pub unsafe fn from_raw(raw: CUstream) -> Self {
        StreamHandle(raw as usize)
    }

    /// Raw handle
    pub fn as_raw(self) -> CUstream {
        self.0 as CUstream
    }

    /// Whether this is the null default stream
    pub fn is_default(self) -> bool {
        self.0 == 0
    }

    /// Resolve an optional stream: absent means [`StreamHandle::DEFAULT`].
    pub fn resolve(stream: Option<StreamHandle>) -> CUstream {
        stream.unwrap_or(StreamHandle::DEFAULT).as_raw()
    }
}

impl Default for StreamHandle {
    fn default() -> Self {
        StreamHandle::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stream_is_null() {
        assert!(StreamHandle::resolve(None).is_null());
        assert!(StreamHandle::default().is_default());
        assert!(StreamHandle::DEFAULT.as_raw().is_null());
    }

    #[test]
    fn test_special_handles() {
        assert_eq!(StreamHandle::LEGACY.as_raw() as usize, 0x1);
        assert_eq!(StreamHandle::PER_THREAD.as_raw() as usize, 0x2);
        assert!(!StreamHandle::LEGACY.is_default());
    }

    #[test]
    fn test_raw_round_trip() {
        let raw = 0x7f00_1000usize as CUstream;
        let stream = unsafe { StreamHandle::from_raw(raw) };
        assert_eq!(stream.as_raw(), raw);
        assert_eq!(StreamHandle::resolve(Some(stream)), raw);
    }
}
