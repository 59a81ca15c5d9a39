//! Minimal C ABI surface: freeing buffers the engine handed back across a
//! foreign boundary.
//!
//! The engine returns `read`/streaming output as ordinary heap-allocated
//! `Vec<u8>`s to Rust callers; ownership transfers to the caller. A foreign
//! caller that received the buffer's raw parts (pointer, length, capacity —
//! the original C engine's `uint8_t *` plus its tracked allocation size)
//! cannot run `Vec`'s destructor itself and must hand the parts back here
//! instead.
//!
//! # Stability
//! `bindle_free_buffer`'s signature is frozen for as long as any buffer
//! crossing the FFI boundary may have been allocated under it.

use std::os::raw::c_void;

/// Reconstruct and drop a `Vec<u8>` previously leaked across the FFI
/// boundary via [`Vec::into_raw_parts`]-equivalent bookkeeping (`ptr`,
/// `len`, `cap`).
///
/// # Safety
/// - `ptr` must have been produced by this engine as the `Vec<u8>` data
///   pointer of an allocation with exactly `len` initialized bytes and
///   `cap` bytes of capacity.
/// - `ptr` must not have been freed already; calling this twice on the same
///   pointer is a double free.
/// - After this call returns, `ptr` is dangling and must not be
///   dereferenced or passed to `bindle_free_buffer` again.
/// - Passing a null `ptr` with `cap == 0` is a no-op.
#[no_mangle]
pub unsafe extern "C" fn bindle_free_buffer(ptr: *mut u8, len: usize, cap: usize) {
    if ptr.is_null() {
        return;
    }
    drop(Vec::from_raw_parts(ptr, len, cap));
}

/// Split a `Vec<u8>` into the `(ptr, len, cap)` triple a foreign caller
/// needs in order to later call [`bindle_free_buffer`]. Leaks the
/// allocation until that call is made.
pub fn into_raw_parts(mut buf: Vec<u8>) -> (*mut u8, usize, usize) {
    let ptr = buf.as_mut_ptr();
    let len = buf.len();
    let cap = buf.capacity();
    std::mem::forget(buf);
    (ptr, len, cap)
}

// Silence an unused-import lint on platforms where c_void is not otherwise
// referenced; kept to document the ABI's conceptual buffer type.
#[allow(unused)]
type _OpaqueBuffer = c_void;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_raw_parts_does_not_leak_or_crash() {
        let data = vec![1u8, 2, 3, 4, 5];
        let (ptr, len, cap) = into_raw_parts(data);
        unsafe {
            bindle_free_buffer(ptr, len, cap);
        }
    }

    #[test]
    fn null_pointer_is_a_no_op() {
        unsafe {
            bindle_free_buffer(std::ptr::null_mut(), 0, 0);
        }
    }
}
