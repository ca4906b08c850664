// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the exported C types

use becam::ffi::{
    BecamFreeDeviceList, BecamFreeFrame, BecamFreeFrameInfoList, BecamStatusText, DeviceList,
    FrameInfoList, StatusCode, VideoFrameInfo,
};
use becam::{DeviceDescriptor, ErrorKind, FourCc, StreamFormat};
use std::ffi::CStr;
use std::ptr;

#[test]
fn test_device_list_double_free_is_safe() {
    let devices = vec![
        DeviceDescriptor {
            identity: "usb-0001".into(),
            display_name: Some("Camera".into()),
            location_info: Some("usb-1".into()),
        },
        DeviceDescriptor {
            identity: "usb-0002".into(),
            display_name: None,
            location_info: None,
        },
    ];
    let mut list = DeviceList::from_descriptors(&devices);

    let location = unsafe { CStr::from_ptr(*list.location_info) };
    assert_eq!(location.to_str().unwrap(), "usb-1");
    assert!(unsafe { *list.location_info.add(1) }.is_null());

    unsafe { BecamFreeDeviceList(ptr::null_mut(), &mut list) };
    unsafe { BecamFreeDeviceList(ptr::null_mut(), &mut list) };
    assert_eq!(list.num, 0);
    assert!(list.path.is_null() && list.name.is_null() && list.location_info.is_null());
}

#[test]
fn test_zeroed_lists_free_safely() {
    let mut devices = DeviceList::empty();
    unsafe { BecamFreeDeviceList(ptr::null_mut(), &mut devices) };
    let mut formats = FrameInfoList::empty();
    unsafe { BecamFreeFrameInfoList(ptr::null_mut(), &mut formats) };
    unsafe { BecamFreeDeviceList(ptr::null_mut(), ptr::null_mut()) };
}

#[test]
fn test_free_frame_tolerates_null() {
    let mut data: *mut u8 = ptr::null_mut();
    unsafe { BecamFreeFrame(ptr::null_mut(), &mut data) };
    unsafe { BecamFreeFrame(ptr::null_mut(), ptr::null_mut()) };
}

#[test]
fn test_frame_info_uses_little_endian_fourcc() {
    let info = VideoFrameInfo::from(StreamFormat::new(1280, 720, 30, FourCc::MJPG));
    assert_eq!(info.format, 0x4750_4A4D);
    assert_eq!(StreamFormat::from(info).encoding, FourCc::MJPG);
}

#[test]
fn test_status_text_matches_error_descriptions() {
    for kind in ErrorKind::ALL {
        let code = StatusCode::from(kind);
        let text = unsafe { CStr::from_ptr(BecamStatusText(code as i32)) };
        assert_eq!(text, kind.description());
        assert_eq!(code.text(), kind.description());
    }
}
