// src/native/sys.rs

//! Raw CoreServices and libdispatch declarations used by the macOS backend.

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals)]

use std::ffi::{c_char, c_void};

use core_foundation::array::CFArrayRef;
use core_foundation::base::{Boolean, CFAllocatorRef, CFIndex};
use core_foundation::date::{CFAbsoluteTime, CFTimeInterval};
use core_foundation::string::CFStringRef;

use super::NativeCallback;

pub type FSEventStreamRef = *mut c_void;
pub type ConstFSEventStreamRef = *const c_void;
pub type FSEventStreamEventId = u64;
pub type FSEventStreamCreateFlags = u32;
pub type dev_t = i32;
pub type CFUUIDRef = *const c_void;
pub type dispatch_queue_t = *mut c_void;
pub type dispatch_queue_attr_t = *const c_void;

/// Serial queue attribute (`DISPATCH_QUEUE_SERIAL` is `NULL`).
pub const DISPATCH_QUEUE_SERIAL: dispatch_queue_attr_t = std::ptr::null();

#[repr(C)]
pub struct FSEventStreamContext {
    pub version: CFIndex,
    pub info: *mut c_void,
    pub retain: Option<extern "C" fn(*const c_void) -> *const c_void>,
    pub release: Option<extern "C" fn(*const c_void)>,
    pub copy_description: Option<extern "C" fn(*const c_void) -> CFStringRef>,
}

#[link(name = "CoreServices", kind = "framework")]
unsafe extern "C" {
    pub fn FSEventStreamCreate(
        allocator: CFAllocatorRef,
        callback: NativeCallback,
        context: *const FSEventStreamContext,
        paths_to_watch: CFArrayRef,
        since_when: FSEventStreamEventId,
        latency: CFTimeInterval,
        flags: FSEventStreamCreateFlags,
    ) -> FSEventStreamRef;

    pub fn FSEventStreamCreateRelativeToDevice(
        allocator: CFAllocatorRef,
        callback: NativeCallback,
        context: *const FSEventStreamContext,
        device_to_watch: dev_t,
        paths_to_watch_relative_to_device: CFArrayRef,
        since_when: FSEventStreamEventId,
        latency: CFTimeInterval,
        flags: FSEventStreamCreateFlags,
    ) -> FSEventStreamRef;

    pub fn FSEventStreamSetDispatchQueue(stream: FSEventStreamRef, queue: dispatch_queue_t);
    pub fn FSEventStreamStart(stream: FSEventStreamRef) -> Boolean;
    pub fn FSEventStreamStop(stream: FSEventStreamRef);
    pub fn FSEventStreamInvalidate(stream: FSEventStreamRef);
    pub fn FSEventStreamRelease(stream: FSEventStreamRef);
    pub fn FSEventStreamFlushSync(stream: FSEventStreamRef);
    pub fn FSEventStreamFlushAsync(stream: FSEventStreamRef) -> FSEventStreamEventId;
    pub fn FSEventStreamGetLatestEventId(stream: ConstFSEventStreamRef) -> FSEventStreamEventId;

    pub fn FSEventsGetCurrentEventId() -> FSEventStreamEventId;
    pub fn FSEventsCopyUUIDForDevice(dev: dev_t) -> CFUUIDRef;
    pub fn FSEventsGetLastEventIdForDeviceBeforeTime(
        dev: dev_t,
        time: CFAbsoluteTime,
    ) -> FSEventStreamEventId;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    pub fn CFUUIDCreateString(allocator: CFAllocatorRef, uuid: CFUUIDRef) -> CFStringRef;
}

unsafe extern "C" {
    pub fn dispatch_queue_create(
        label: *const c_char,
        attr: dispatch_queue_attr_t,
    ) -> dispatch_queue_t;
    pub fn dispatch_release(object: *mut c_void);
}
