// uinput records and request numbers from linux/uinput.h
use super::input::{ff_effect, input_absinfo, input_id};
use nix::sys::ioctl::ioctl_num_type;
use nix::{request_code_none, request_code_read, request_code_readwrite, request_code_write};
use std::mem::size_of;

pub const UINPUT_MAX_NAME_SIZE: usize = 80;
pub const ABS_CNT: usize = 64;

pub const UI_DEV_CREATE: ioctl_num_type = request_code_none!(b'U', 1);
pub const UI_DEV_DESTROY: ioctl_num_type = request_code_none!(b'U', 2);
pub const UI_DEV_SETUP: ioctl_num_type = request_code_write!(b'U', 3, size_of::<uinput_setup>());
pub const UI_ABS_SETUP: ioctl_num_type = request_code_write!(b'U', 4, size_of::<uinput_abs_setup>());

pub const UI_SET_EVBIT: ioctl_num_type = request_code_write!(b'U', 100, size_of::<libc::c_int>());
pub const UI_SET_KEYBIT: ioctl_num_type = request_code_write!(b'U', 101, size_of::<libc::c_int>());
pub const UI_SET_RELBIT: ioctl_num_type = request_code_write!(b'U', 102, size_of::<libc::c_int>());
pub const UI_SET_ABSBIT: ioctl_num_type = request_code_write!(b'U', 103, size_of::<libc::c_int>());
pub const UI_SET_MSCBIT: ioctl_num_type = request_code_write!(b'U', 104, size_of::<libc::c_int>());
pub const UI_SET_LEDBIT: ioctl_num_type = request_code_write!(b'U', 105, size_of::<libc::c_int>());
pub const UI_SET_SNDBIT: ioctl_num_type = request_code_write!(b'U', 106, size_of::<libc::c_int>());
pub const UI_SET_FFBIT: ioctl_num_type = request_code_write!(b'U', 107, size_of::<libc::c_int>());
pub const UI_SET_PHYS: ioctl_num_type = request_code_write!(b'U', 108, size_of::<*const libc::c_char>());
pub const UI_SET_SWBIT: ioctl_num_type = request_code_write!(b'U', 109, size_of::<libc::c_int>());
pub const UI_SET_PROPBIT: ioctl_num_type = request_code_write!(b'U', 110, size_of::<libc::c_int>());

pub const UI_BEGIN_FF_UPLOAD: ioctl_num_type =
    request_code_readwrite!(b'U', 200, size_of::<uinput_ff_upload>());
pub const UI_END_FF_UPLOAD: ioctl_num_type =
    request_code_write!(b'U', 201, size_of::<uinput_ff_upload>());
pub const UI_BEGIN_FF_ERASE: ioctl_num_type =
    request_code_readwrite!(b'U', 202, size_of::<uinput_ff_erase>());
pub const UI_END_FF_ERASE: ioctl_num_type =
    request_code_write!(b'U', 203, size_of::<uinput_ff_erase>());

/// UI_GET_SYSNAME(len): name of the sysfs directory backing the created device
pub const fn ui_get_sysname(len: usize) -> ioctl_num_type {
    request_code_read!(b'U', 44, len)
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct uinput_setup {
    pub id: input_id,
    pub name: [u8; UINPUT_MAX_NAME_SIZE],
    pub ff_effects_max: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct uinput_abs_setup {
    pub code: u16,
    pub absinfo: input_absinfo,
}

/// Pre-4.5 kernels take this record through `write(2)` instead of UI_DEV_SETUP.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct uinput_user_dev {
    pub name: [u8; UINPUT_MAX_NAME_SIZE],
    pub id: input_id,
    pub ff_effects_max: u32,
    pub absmax: [i32; ABS_CNT],
    pub absmin: [i32; ABS_CNT],
    pub absfuzz: [i32; ABS_CNT],
    pub absflat: [i32; ABS_CNT],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct uinput_ff_upload {
    pub request_id: u32,
    pub retval: i32,
    pub effect: ff_effect,
    pub old: ff_effect,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct uinput_ff_erase {
    pub request_id: u32,
    pub retval: i32,
    pub effect_id: u32,
}

/// Copy `name` into a fixed kernel name field, truncating to fit.
pub fn name_field(name: &str) -> [u8; UINPUT_MAX_NAME_SIZE] {
    let mut field = [0u8; UINPUT_MAX_NAME_SIZE];
    let bytes = name.as_bytes();
    let len = bytes.len().min(UINPUT_MAX_NAME_SIZE);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}
