// SPDX-License-Identifier: GPL-3.0-only

//! Flat C ABI
//!
//! The host links against the `cdylib` and drives one [`CaptureManager`] per
//! handle. Every type crossing the boundary has a fixed `#[repr(C)]` layout
//! mirrored in `include/becam.h`. Lists are allocated here and must be handed
//! back to the matching `BecamFree*` export; status texts are static and must
//! never be freed.
//!
//! No panic unwinds into the host: each export catches it and reports
//! [`StatusCode::Internal`].

use crate::backends::camera::gstreamer::GstPlatform;
use crate::backends::camera::{
    CaptureManager, CapturePlatform, DeviceDescriptor, FourCc, FrameBuffer, HostSink,
    StreamFormat,
};
use crate::config::Config;
use crate::errors::{CaptureError, CaptureResult, ErrorKind};
use crate::logging;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use tracing::{debug, error, warn};

/// Opaque handle returned by [`BecamNew`]
pub type BecamHandle = *mut c_void;

/// Host frame callback: `(userData, data, size)`. `data` is only valid for
/// the duration of the call.
pub type BecamFrameCallback = Option<extern "C" fn(*mut c_void, *const u8, usize)>;

type Manager = CaptureManager<GstPlatform>;

/// Result of every fallible export. Zero is success; the rest follow
/// [`ErrorKind::ALL`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success = 0,
    DeviceNotFound,
    Enumeration,
    CapabilityQuery,
    Bind,
    GraphBuilder,
    AddFilter,
    GrabberCreate,
    SetFormat,
    TerminatorCreate,
    Connect,
    Callback,
    Run,
    NoMatchingFormat,
    DeviceNotOpen,
    DeviceAlreadyOpen,
    InvalidParam,
    HandleEmpty,
    FrameEmpty,
    FrameNotUpdated,
    Internal,
}

impl StatusCode {
    /// Failure cause, `None` for success
    pub fn kind(self) -> Option<ErrorKind> {
        (self as usize)
            .checked_sub(1)
            .and_then(|i| ErrorKind::ALL.get(i).copied())
    }

    pub fn text(self) -> &'static CStr {
        match self.kind() {
            Some(kind) => kind.description(),
            None => c"success",
        }
    }
}

impl From<ErrorKind> for StatusCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::DeviceNotFound => StatusCode::DeviceNotFound,
            ErrorKind::Enumeration => StatusCode::Enumeration,
            ErrorKind::CapabilityQuery => StatusCode::CapabilityQuery,
            ErrorKind::Bind => StatusCode::Bind,
            ErrorKind::GraphBuilder => StatusCode::GraphBuilder,
            ErrorKind::AddFilter => StatusCode::AddFilter,
            ErrorKind::GrabberCreate => StatusCode::GrabberCreate,
            ErrorKind::SetFormat => StatusCode::SetFormat,
            ErrorKind::TerminatorCreate => StatusCode::TerminatorCreate,
            ErrorKind::Connect => StatusCode::Connect,
            ErrorKind::Callback => StatusCode::Callback,
            ErrorKind::Run => StatusCode::Run,
            ErrorKind::NoMatchingFormat => StatusCode::NoMatchingFormat,
            ErrorKind::DeviceNotOpen => StatusCode::DeviceNotOpen,
            ErrorKind::DeviceAlreadyOpen => StatusCode::DeviceAlreadyOpen,
            ErrorKind::InvalidParam => StatusCode::InvalidParam,
            ErrorKind::HandleEmpty => StatusCode::HandleEmpty,
            ErrorKind::FrameEmpty => StatusCode::FrameEmpty,
            ErrorKind::FrameNotUpdated => StatusCode::FrameNotUpdated,
            ErrorKind::Internal => StatusCode::Internal,
        }
    }
}

/// One stream format as seen by the host
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoFrameInfo {
    /// Little-endian FourCC
    pub format: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl From<StreamFormat> for VideoFrameInfo {
    fn from(format: StreamFormat) -> Self {
        Self {
            format: format.encoding.to_u32(),
            width: format.width,
            height: format.height,
            fps: format.fps,
        }
    }
}

impl From<VideoFrameInfo> for StreamFormat {
    fn from(info: VideoFrameInfo) -> Self {
        StreamFormat::new(info.width, info.height, info.fps, FourCc::from_u32(info.format))
    }
}

/// Device listing as parallel string arrays of length `num`.
/// Entries of `location_info` and `name` may be null.
#[repr(C)]
#[derive(Debug)]
pub struct DeviceList {
    pub num: usize,
    pub path: *mut *mut c_char,
    pub location_info: *mut *mut c_char,
    pub name: *mut *mut c_char,
}

impl DeviceList {
    pub const fn empty() -> Self {
        Self {
            num: 0,
            path: ptr::null_mut(),
            location_info: ptr::null_mut(),
            name: ptr::null_mut(),
        }
    }

    pub fn from_descriptors(devices: &[DeviceDescriptor]) -> Self {
        if devices.is_empty() {
            return Self::empty();
        }
        Self {
            num: devices.len(),
            path: string_array(devices.iter().map(|d| Some(d.identity.as_str()))),
            location_info: string_array(devices.iter().map(|d| d.location_info.as_deref())),
            name: string_array(devices.iter().map(|d| d.display_name.as_deref())),
        }
    }

    /// Free every string and array, then reset to [`DeviceList::empty`].
    ///
    /// # Safety
    /// The arrays must come from [`DeviceList::from_descriptors`] with the
    /// same `num`, or be null.
    pub unsafe fn release(&mut self) {
        unsafe {
            free_string_array(self.path, self.num);
            free_string_array(self.location_info, self.num);
            free_string_array(self.name, self.num);
        }
        *self = Self::empty();
    }
}

/// Format listing of length `num`
#[repr(C)]
#[derive(Debug)]
pub struct FrameInfoList {
    pub num: usize,
    pub list: *mut VideoFrameInfo,
}

impl FrameInfoList {
    pub const fn empty() -> Self {
        Self {
            num: 0,
            list: ptr::null_mut(),
        }
    }

    pub fn from_formats(formats: &[StreamFormat]) -> Self {
        if formats.is_empty() {
            return Self::empty();
        }
        let list: Box<[VideoFrameInfo]> = formats.iter().copied().map(Into::into).collect();
        Self {
            num: list.len(),
            list: Box::into_raw(list).cast(),
        }
    }

    /// # Safety
    /// `list` must come from [`FrameInfoList::from_formats`] with the same
    /// `num`, or be null.
    pub unsafe fn release(&mut self) {
        if !self.list.is_null() {
            drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(self.list, self.num)) });
        }
        *self = Self::empty();
    }
}

fn string_array<'a>(values: impl Iterator<Item = Option<&'a str>>) -> *mut *mut c_char {
    let array: Box<[*mut c_char]> = values
        .map(|value| {
            value
                .and_then(|s| CString::new(s.replace('\0', "")).ok())
                .map_or(ptr::null_mut(), CString::into_raw)
        })
        .collect();
    Box::into_raw(array).cast()
}

unsafe fn free_string_array(array: *mut *mut c_char, len: usize) {
    if array.is_null() {
        return;
    }
    let array = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(array, len)) };
    for &value in array.iter() {
        if !value.is_null() {
            drop(unsafe { CString::from_raw(value) });
        }
    }
}

/// Host callback plus its opaque context
struct HostCallback {
    callback: extern "C" fn(*mut c_void, *const u8, usize),
    user_data: *mut c_void,
}

// The host promises its callback may be invoked from the capture thread.
unsafe impl Send for HostCallback {}
unsafe impl Sync for HostCallback {}

impl HostCallback {
    fn call(&self, frame: FrameBuffer<'_>) {
        let data = frame.as_slice();
        (self.callback)(self.user_data, data.as_ptr(), data.len());
    }

    fn into_sink(self) -> HostSink {
        Box::new(move |frame: FrameBuffer<'_>| self.call(frame))
    }
}

// Core of each export, generic so it runs against any platform

pub(crate) fn get_device_list<P: CapturePlatform>(
    manager: &CaptureManager<P>,
    reply: &mut DeviceList,
) -> CaptureResult<()> {
    let devices = manager.list_devices()?;
    *reply = DeviceList::from_descriptors(&devices);
    Ok(())
}

pub(crate) fn get_frame_info_list<P: CapturePlatform>(
    manager: &CaptureManager<P>,
    identity: &str,
    reply: &mut FrameInfoList,
) -> CaptureResult<()> {
    let formats = manager.formats(identity)?;
    *reply = FrameInfoList::from_formats(&formats);
    Ok(())
}

pub(crate) fn open_device<P: CapturePlatform>(
    manager: &CaptureManager<P>,
    identity: &str,
    frame_info: Option<VideoFrameInfo>,
    host: Option<HostSink>,
) -> CaptureResult<()> {
    let request = frame_info.map_or_else(StreamFormat::auto, StreamFormat::from);
    manager.open_device(identity, &request, host).map(|_| ())
}

pub(crate) fn get_frame<P: CapturePlatform>(
    manager: &CaptureManager<P>,
    data: &mut *mut u8,
    size: &mut usize,
) -> CaptureResult<()> {
    let (ptr, len) = manager.lend_frame()?;
    *data = ptr.cast_mut();
    *size = len;
    Ok(())
}

// Boundary helpers

fn guarded(error_text: *mut *const c_char, op: impl FnOnce() -> CaptureResult<()>) -> StatusCode {
    let result = catch_unwind(AssertUnwindSafe(op)).unwrap_or_else(|_| {
        error!("Panic caught at the C boundary");
        Err(CaptureError::from(ErrorKind::Internal))
    });
    match result {
        Ok(()) => StatusCode::Success,
        Err(err) => {
            warn!(kind = ?err.kind(), detail = %err.detail, "Call failed");
            if !error_text.is_null() {
                unsafe { *error_text = err.kind().description().as_ptr() };
            }
            StatusCode::from(err.kind())
        }
    }
}

unsafe fn manager<'a>(handle: BecamHandle) -> CaptureResult<&'a Manager> {
    unsafe { handle.cast::<Manager>().as_ref() }
        .ok_or_else(|| CaptureError::from(ErrorKind::HandleEmpty))
}

unsafe fn identity<'a>(device_path: *const c_char) -> CaptureResult<&'a str> {
    if device_path.is_null() {
        return Err(CaptureError::new(ErrorKind::InvalidParam, "device path is null"));
    }
    unsafe { CStr::from_ptr(device_path) }
        .to_str()
        .map_err(|_| CaptureError::new(ErrorKind::InvalidParam, "device path is not UTF-8"))
}

unsafe fn out_param<'a, T>(ptr: *mut T, name: &str) -> CaptureResult<&'a mut T> {
    unsafe { ptr.as_mut() }
        .ok_or_else(|| CaptureError::new(ErrorKind::InvalidParam, format!("{} is null", name)))
}

// Exports

/// Create a handle. Returns null if the capture framework cannot start.
#[unsafe(no_mangle)]
pub extern "C" fn BecamNew() -> BecamHandle {
    catch_unwind(|| {
        let config = logging::init_from(Config::try_load());
        match GstPlatform::new(&config) {
            Ok(platform) => Box::into_raw(Box::new(Manager::new(platform, config))).cast(),
            Err(err) => {
                error!(%err, "Failed to initialize capture framework");
                ptr::null_mut()
            }
        }
    })
    .unwrap_or(ptr::null_mut())
}

/// Close any open device, free the handle and null it.
///
/// # Safety
/// `handle` must be null or point to a handle from [`BecamNew`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamFree(handle: *mut BecamHandle) {
    let Some(slot) = (unsafe { handle.as_mut() }) else {
        return;
    };
    let raw = std::mem::replace(slot, ptr::null_mut());
    if raw.is_null() {
        return;
    }
    let manager = unsafe { Box::from_raw(raw.cast::<Manager>()) };
    if catch_unwind(AssertUnwindSafe(move || drop(manager))).is_err() {
        error!("Panic while freeing handle");
    }
}

/// # Safety
/// `handle` must come from [`BecamNew`]; `reply` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamGetDeviceList(
    handle: BecamHandle,
    reply: *mut DeviceList,
    error_text: *mut *const c_char,
) -> StatusCode {
    guarded(error_text, || {
        let manager = unsafe { manager(handle) }?;
        let reply = unsafe { out_param(reply, "reply") }?;
        get_device_list(manager, reply)
    })
}

/// Free a list from [`BecamGetDeviceList`]. Safe to call again on the
/// nulled list.
///
/// # Safety
/// `input` must be null or a list filled by [`BecamGetDeviceList`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamFreeDeviceList(_handle: BecamHandle, input: *mut DeviceList) {
    if let Some(list) = unsafe { input.as_mut() } {
        unsafe { list.release() };
    }
}

/// # Safety
/// `handle` must come from [`BecamNew`], `device_path` must be a NUL
/// terminated string and `reply` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamGetFrameInfoList(
    handle: BecamHandle,
    device_path: *const c_char,
    reply: *mut FrameInfoList,
    error_text: *mut *const c_char,
) -> StatusCode {
    guarded(error_text, || {
        let manager = unsafe { manager(handle) }?;
        let identity = unsafe { identity(device_path) }?;
        let reply = unsafe { out_param(reply, "reply") }?;
        get_frame_info_list(manager, identity, reply)
    })
}

/// # Safety
/// `input` must be null or a list filled by [`BecamGetFrameInfoList`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamFreeFrameInfoList(_handle: BecamHandle, input: *mut FrameInfoList) {
    if let Some(list) = unsafe { input.as_mut() } {
        unsafe { list.release() };
    }
}

/// Open a device for pull-mode capture. A null `frame_info` selects the
/// format automatically.
///
/// # Safety
/// `handle` must come from [`BecamNew`] and `device_path` must be a NUL
/// terminated string. `frame_info` must be null or readable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamOpenDevice(
    handle: BecamHandle,
    device_path: *const c_char,
    frame_info: *const VideoFrameInfo,
    error_text: *mut *const c_char,
) -> StatusCode {
    guarded(error_text, || {
        let manager = unsafe { manager(handle) }?;
        let identity = unsafe { identity(device_path) }?;
        let frame_info = unsafe { frame_info.as_ref() }.copied();
        open_device(manager, identity, frame_info, None)
    })
}

/// Open a device and push every frame to `callback` on the capture thread.
/// Frames stay available to [`BecamGetFrame`] as well.
///
/// # Safety
/// As [`BecamOpenDevice`]. `callback` must be safe to call from any thread
/// with `user_data` until [`BecamCloseDevice`] or [`BecamFree`] returns.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamOpenDeviceWithCallback(
    handle: BecamHandle,
    device_path: *const c_char,
    frame_info: *const VideoFrameInfo,
    callback: BecamFrameCallback,
    user_data: *mut c_void,
    error_text: *mut *const c_char,
) -> StatusCode {
    guarded(error_text, || {
        let manager = unsafe { manager(handle) }?;
        let identity = unsafe { identity(device_path) }?;
        let frame_info = unsafe { frame_info.as_ref() }.copied();
        let callback = callback
            .ok_or_else(|| CaptureError::new(ErrorKind::InvalidParam, "callback is null"))?;
        let host = HostCallback {
            callback,
            user_data,
        };
        open_device(manager, identity, frame_info, Some(host.into_sink()))
    })
}

/// Close the open device. Succeeds when nothing is open.
///
/// # Safety
/// `handle` must come from [`BecamNew`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamCloseDevice(
    handle: BecamHandle,
    error_text: *mut *const c_char,
) -> StatusCode {
    guarded(error_text, || unsafe { manager(handle) }?.close_device())
}

/// Copy out the newest frame. The buffer stays valid until
/// [`BecamFreeFrame`] or [`BecamFree`].
///
/// # Safety
/// `handle` must come from [`BecamNew`]; `data` and `size` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamGetFrame(
    handle: BecamHandle,
    data: *mut *mut u8,
    size: *mut usize,
    error_text: *mut *const c_char,
) -> StatusCode {
    guarded(error_text, || {
        let manager = unsafe { manager(handle) }?;
        let data = unsafe { out_param(data, "data") }?;
        let size = unsafe { out_param(size, "size") }?;
        get_frame(manager, data, size)
    })
}

/// Return a frame from [`BecamGetFrame`] and null the caller's pointer.
///
/// # Safety
/// `handle` must come from [`BecamNew`]; `data` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn BecamFreeFrame(handle: BecamHandle, data: *mut *mut u8) {
    let Some(slot) = (unsafe { data.as_mut() }) else {
        return;
    };
    let frame = std::mem::replace(slot, ptr::null_mut());
    if frame.is_null() {
        return;
    }
    let released = catch_unwind(AssertUnwindSafe(|| {
        unsafe { manager(handle) }?.release_frame(frame.cast_const())
    }));
    if let Ok(Err(err)) = released {
        debug!(%err, "Ignoring frame release");
    }
}

/// Static description of a status code. Never free the result.
#[unsafe(no_mangle)]
pub extern "C" fn BecamStatusText(code: c_int) -> *const c_char {
    let text = match usize::try_from(code) {
        Ok(0) => c"success",
        Ok(i) => ErrorKind::ALL
            .get(i - 1)
            .map_or(c"unknown status", ErrorKind::description),
        Err(_) => c"unknown status",
    };
    text.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::{VirtualDevice, VirtualPlatform};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn descriptor(identity: &str, name: Option<&str>) -> DeviceDescriptor {
        DeviceDescriptor {
            identity: identity.to_string(),
            display_name: name.map(str::to_string),
            location_info: None,
        }
    }

    fn virtual_manager() -> CaptureManager<VirtualPlatform> {
        let platform = VirtualPlatform::new()
            .with_device(
                VirtualDevice::new("cam0")
                    .with_name(Some("Front"))
                    .with_format(640, 480, 30, FourCc::MJPG)
                    .with_format(1280, 720, 30, FourCc::YUY2),
            )
            .with_frame_interval(Duration::from_millis(5));
        CaptureManager::new(platform, Config::default())
    }

    #[test]
    fn test_status_codes_follow_error_kinds() {
        assert_eq!(StatusCode::Success as i32, 0);
        assert_eq!(StatusCode::Success.kind(), None);
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            let code = StatusCode::from(*kind);
            assert_eq!(code as usize, i + 1);
            assert_eq!(code.kind(), Some(*kind));
        }
    }

    #[test]
    fn test_status_text_is_static() {
        let text = unsafe { CStr::from_ptr(BecamStatusText(0)) };
        assert_eq!(text.to_str().unwrap(), "success");

        let code = StatusCode::DeviceNotFound as c_int;
        assert_eq!(BecamStatusText(code), ErrorKind::DeviceNotFound.description().as_ptr());
        assert_eq!(BecamStatusText(code), BecamStatusText(code));

        let unknown = unsafe { CStr::from_ptr(BecamStatusText(999)) };
        assert_eq!(unknown.to_str().unwrap(), "unknown status");
        let negative = unsafe { CStr::from_ptr(BecamStatusText(-1)) };
        assert_eq!(negative.to_str().unwrap(), "unknown status");
    }

    #[test]
    fn test_device_list_free_twice() {
        let devices = vec![descriptor("a", Some("Cam A")), descriptor("b", None)];
        let mut list = DeviceList::from_descriptors(&devices);
        assert_eq!(list.num, 2);

        let names = unsafe { std::slice::from_raw_parts(list.name, list.num) };
        assert!(!names[0].is_null());
        assert!(names[1].is_null());
        let path = unsafe { CStr::from_ptr(*list.path.add(1)) };
        assert_eq!(path.to_str().unwrap(), "b");

        unsafe { BecamFreeDeviceList(ptr::null_mut(), &mut list) };
        assert_eq!(list.num, 0);
        assert!(list.path.is_null());
        assert!(list.location_info.is_null());
        assert!(list.name.is_null());

        unsafe { BecamFreeDeviceList(ptr::null_mut(), &mut list) };
        assert!(list.path.is_null());
    }

    #[test]
    fn test_empty_lists_free_safely() {
        let mut devices = DeviceList::from_descriptors(&[]);
        assert!(devices.path.is_null());
        unsafe { BecamFreeDeviceList(ptr::null_mut(), &mut devices) };

        let mut formats = FrameInfoList::from_formats(&[]);
        assert!(formats.list.is_null());
        unsafe { BecamFreeFrameInfoList(ptr::null_mut(), &mut formats) };
        unsafe { BecamFreeFrameInfoList(ptr::null_mut(), ptr::null_mut()) };
    }

    #[test]
    fn test_frame_info_list_matches_formats() {
        let manager = virtual_manager();
        let mut reply = FrameInfoList::empty();
        get_frame_info_list(&manager, "cam0", &mut reply).unwrap();
        assert_eq!(reply.num, 2);

        let infos = unsafe { std::slice::from_raw_parts(reply.list, reply.num) };
        assert_eq!(infos[0].format, 0x4750_4A4D);
        assert_eq!((infos[0].width, infos[0].height, infos[0].fps), (640, 480, 30));
        assert_eq!(StreamFormat::from(infos[1]).encoding, FourCc::YUY2);

        unsafe { reply.release() };
        unsafe { reply.release() };
        assert_eq!(reply.num, 0);
    }

    #[test]
    fn test_null_handle_reports_handle_empty() {
        let mut text: *const c_char = ptr::null();
        let mut list = DeviceList::empty();
        let code = unsafe { BecamGetDeviceList(ptr::null_mut(), &mut list, &mut text) };
        assert_eq!(code, StatusCode::HandleEmpty);
        assert_eq!(text, ErrorKind::HandleEmpty.description().as_ptr());

        let code = unsafe { BecamCloseDevice(ptr::null_mut(), ptr::null_mut()) };
        assert_eq!(code, StatusCode::HandleEmpty);
    }

    #[test]
    fn test_free_null_handle_is_noop() {
        let mut handle: BecamHandle = ptr::null_mut();
        unsafe { BecamFree(&mut handle) };
        unsafe { BecamFree(ptr::null_mut()) };
        assert!(handle.is_null());
    }

    #[test]
    fn test_panic_becomes_internal() {
        let mut text: *const c_char = ptr::null();
        let code = guarded(&mut text, || panic!("boom"));
        assert_eq!(code, StatusCode::Internal);
        assert_eq!(text, ErrorKind::Internal.description().as_ptr());
    }

    #[test]
    fn test_lent_frame_round_trip() {
        let manager = virtual_manager();
        open_device(&manager, "cam0", None, None).unwrap();

        let mut data: *mut u8 = ptr::null_mut();
        let mut size = 0usize;
        get_frame(&manager, &mut data, &mut size).unwrap();
        assert!(!data.is_null());
        assert!(size > 0);
        assert_eq!(manager.outstanding_frames(), 1);

        manager.release_frame(data.cast_const()).unwrap();
        assert_eq!(manager.outstanding_frames(), 0);
        manager.close_device().unwrap();
    }

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn count_frames(user_data: *mut c_void, data: *const u8, size: usize) {
        assert_eq!(user_data as usize, 0x1234);
        assert!(!data.is_null());
        assert!(size > 0);
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_host_callback_receives_frames() {
        let manager = virtual_manager();
        let host = HostCallback {
            callback: count_frames,
            user_data: 0x1234 as *mut c_void,
        };
        let info = VideoFrameInfo {
            format: FourCc::MJPG.to_u32(),
            width: 640,
            height: 480,
            fps: 30,
        };
        open_device(&manager, "cam0", Some(info), Some(host.into_sink())).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while CALLS.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        manager.close_device().unwrap();
        assert!(CALLS.load(Ordering::SeqCst) > 0);
    }
}
