// src/marshal.rs

//! Path marshaling between host paths and the native string layouts.
//!
//! Outbound, watch paths become a [`PathArray`]: an ordered list of
//! NUL-terminated UTF-8 strings owned by the caller. The create call only
//! borrows it; dropping the array releases every string on all exit paths.
//!
//! Inbound, the callback hands over `char **` entries that belong to the
//! native service. [`from_native_string`] copies them out and never keeps
//! the pointer.

use std::ffi::{c_char, CStr, CString};
use std::path::Path;

use crate::errors::CreationError;

/// Owned, ordered native path list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathArray {
    entries: Vec<CString>,
}

impl PathArray {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> {
        self.entries.iter().map(CString::as_c_str)
    }

    /// Host strings in array order.
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(from_native_cstr).collect()
    }

    /// Pointer table in the `char **` layout. Valid while `self` is alive.
    pub fn as_ptrs(&self) -> Vec<*const c_char> {
        self.entries.iter().map(|s| s.as_ptr()).collect()
    }

    /// Build the CoreFoundation array expected by `FSEventStreamCreate`.
    /// The returned array releases itself on drop.
    #[cfg(target_os = "macos")]
    pub fn to_cf_array(
        &self,
    ) -> core_foundation::array::CFArray<core_foundation::string::CFString> {
        use core_foundation::array::CFArray;
        use core_foundation::string::CFString;

        let strings: Vec<CFString> = self
            .iter()
            .map(|s| CFString::new(&from_native_cstr(s)))
            .collect();
        CFArray::from_CFTypes(&strings)
    }
}

/// Encode `paths` in order into a native path array.
pub fn to_native_array<I, P>(paths: I) -> Result<PathArray, CreationError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut entries = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let utf8 = path.to_str().ok_or_else(|| CreationError::InvalidPath {
            path: path.to_path_buf(),
            reason: "not valid UTF-8",
        })?;
        let c = CString::new(utf8).map_err(|_| CreationError::InvalidPath {
            path: path.to_path_buf(),
            reason: "contains a NUL byte",
        })?;
        entries.push(c);
    }
    Ok(PathArray { entries })
}

/// Copy a native C string into a host string.
///
/// Invalid UTF-8 is replaced rather than rejected so an event is never lost
/// over its path encoding. A null pointer yields an empty string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn from_native_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    from_native_cstr(unsafe { CStr::from_ptr(ptr) })
}

pub fn from_native_cstr(s: &CStr) -> String {
    s.to_string_lossy().into_owned()
}
