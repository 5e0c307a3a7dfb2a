// evdev records and request numbers from linux/input.h
use nix::sys::ioctl::ioctl_num_type;
use nix::{request_code_read, request_code_write};
use std::mem::size_of;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct timeval {
    pub tv_sec: libc::time_t,
    pub tv_usec: libc::suseconds_t,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct input_event {
    pub time: timeval,
    pub type_: u16,
    pub code: u16,
    pub value: i32,
}
impl input_event {
    pub const fn zeroed() -> Self {
        Self {
            time: timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            type_: 0,
            code: 0,
            value: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct input_id {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct input_absinfo {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ff_trigger {
    pub button: u16,
    pub interval: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ff_replay {
    pub length: u16,
    pub delay: u16,
}

/// `struct ff_effect`; the effect-specific union is kept as opaque storage.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ff_effect {
    pub type_: u16,
    pub id: i16,
    pub direction: u16,
    pub trigger: ff_trigger,
    pub replay: ff_replay,
    /// Alignment gap before the union; kept as a field so it is always initialized
    pub _pad: u16,
    #[cfg(target_pointer_width = "64")]
    pub u: [u64; 4],
    #[cfg(target_pointer_width = "32")]
    pub u: [u32; 7],
}

pub const EVIOCGVERSION: ioctl_num_type = request_code_read!(b'E', 0x01, size_of::<libc::c_int>());
pub const EVIOCGID: ioctl_num_type = request_code_read!(b'E', 0x02, size_of::<input_id>());
pub const EVIOCGREP: ioctl_num_type = request_code_read!(b'E', 0x03, size_of::<[libc::c_uint; 2]>());
pub const EVIOCSREP: ioctl_num_type = request_code_write!(b'E', 0x03, size_of::<[libc::c_uint; 2]>());
pub const EVIOCSFF: ioctl_num_type = request_code_write!(b'E', 0x80, size_of::<ff_effect>());
pub const EVIOCRMFF: ioctl_num_type = request_code_write!(b'E', 0x81, size_of::<libc::c_int>());
pub const EVIOCGEFFECTS: ioctl_num_type = request_code_read!(b'E', 0x84, size_of::<libc::c_int>());
pub const EVIOCGRAB: ioctl_num_type = request_code_write!(b'E', 0x90, size_of::<libc::c_int>());

pub const fn eviocgname(len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x06, len)
}

pub const fn eviocgphys(len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x07, len)
}

pub const fn eviocguniq(len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x08, len)
}

pub const fn eviocgprop(len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x09, len)
}

pub const fn eviocgkey(len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x18, len)
}

pub const fn eviocgled(len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x19, len)
}

pub const fn eviocgsnd(len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x1a, len)
}

pub const fn eviocgsw(len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x1b, len)
}

/// EVIOCGBIT(ev, len); `ev == 0` returns the event type bitmask itself
pub const fn eviocgbit(ev: u16, len: usize) -> ioctl_num_type {
    request_code_read!(b'E', 0x20 + ev, len)
}

pub const fn eviocgabs(abs: u16) -> ioctl_num_type {
    request_code_read!(b'E', 0x40 + abs, size_of::<input_absinfo>())
}

pub const fn eviocsabs(abs: u16) -> ioctl_num_type {
    request_code_write!(b'E', 0xc0 + abs, size_of::<input_absinfo>())
}
