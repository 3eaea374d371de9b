//! Read prefetch hint (read-only, temporal locality 3).
//!
//! x86_64 uses `_mm_prefetch` with `_MM_HINT_T0`, which is baseline SSE.
//! Other targets have no stable prefetch intrinsic and fall back to a no-op.

#[inline(always)]
pub fn prefetch_read(ptr: *const u64) {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: prefetch never faults, even on an invalid address.
        unsafe {
            use std::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};
            _mm_prefetch::<_MM_HINT_T0>(ptr as *const i8);
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = ptr;
    }
}
