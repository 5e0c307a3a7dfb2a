//! Raw kernel ABI: record layouts, ioctl request numbers and thin syscall wrappers.
//!
//! Everything here returns `std::io::Result` with the kernel's errno intact; the safe
//! layer above decides how each failure maps onto [`crate::Error`].
#![allow(non_camel_case_types)]

pub mod input;
pub mod uinput;

use libc::c_int;
pub use nix::sys::ioctl::ioctl_num_type;
use std::io;
use std::mem::{MaybeUninit, size_of};
use std::os::fd::{AsRawFd, BorrowedFd};

pub use input::*;
pub use uinput::*;

/// Number of events pulled from the kernel per `read(2)`.
pub const READ_BATCH: usize = 64;

fn check(ret: c_int) -> io::Result<c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// ioctl with an integer argument passed by value
pub fn ioctl_int(fd: BorrowedFd<'_>, request: ioctl_num_type, arg: c_int) -> io::Result<c_int> {
    check(unsafe { libc::ioctl(fd.as_raw_fd(), request as _, arg) })
}

/// ioctl reading into `T`
pub fn ioctl_read<T>(fd: BorrowedFd<'_>, request: ioctl_num_type) -> io::Result<T> {
    let mut out = MaybeUninit::<T>::zeroed();
    check(unsafe { libc::ioctl(fd.as_raw_fd(), request as _, out.as_mut_ptr()) })?;
    Ok(unsafe { out.assume_init() })
}

/// ioctl handing `arg` to the kernel by pointer; the kernel may write back into it
pub fn ioctl_ptr<T>(fd: BorrowedFd<'_>, request: ioctl_num_type, arg: &mut T) -> io::Result<c_int> {
    check(unsafe { libc::ioctl(fd.as_raw_fd(), request as _, arg as *mut T) })
}

/// ioctl filling a caller-provided byte buffer, returning the byte count the kernel reports
pub fn ioctl_buf(fd: BorrowedFd<'_>, request: ioctl_num_type, buf: &mut [u8]) -> io::Result<usize> {
    let n = check(unsafe { libc::ioctl(fd.as_raw_fd(), request as _, buf.as_mut_ptr()) })?;
    Ok(n as usize)
}

/// Read whole `input_event` records into `buf`, returning how many arrived.
///
/// An empty queue on a non-blocking descriptor surfaces as `ErrorKind::WouldBlock`.
/// End of file yields `Ok(0)`.
pub fn read_events(fd: BorrowedFd<'_>, buf: &mut [input_event]) -> io::Result<usize> {
    let size = size_of::<input_event>();
    let n = unsafe {
        libc::read(
            fd.as_raw_fd(),
            buf.as_mut_ptr().cast(),
            buf.len() * size,
        )
    };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    let n = n as usize;
    if n % size != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("short read of {} bytes from event device", n),
        ));
    }
    Ok(n / size)
}

/// Write one record, failing unless the kernel took all of it.
pub fn write_record<T>(fd: BorrowedFd<'_>, record: &T) -> io::Result<()> {
    let size = size_of::<T>();
    let n = unsafe { libc::write(fd.as_raw_fd(), (record as *const T).cast(), size) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    if n as usize != size {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("wrote {} of {} bytes", n, size),
        ));
    }
    Ok(())
}

/// Decode a NUL-terminated string the kernel wrote into `buf`.
pub fn c_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Is bit `n` set in a kernel bitmask of `unsigned long` words laid out as bytes.
pub fn test_bit(bits: &[u8], n: usize) -> bool {
    bits.get(n / 8).is_some_and(|byte| byte & (1 << (n % 8)) != 0)
}

/// Iterate the set bits of a kernel bitmask in ascending order.
pub fn set_bits(bits: &[u8]) -> impl Iterator<Item = u16> + '_ {
    (0..bits.len() * 8)
        .filter(move |&n| test_bit(bits, n))
        .map(|n| n as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_bits() {
        let bits = [0b0000_0101u8, 0, 0b1000_0000];
        assert_eq!(set_bits(&bits).collect::<Vec<_>>(), vec![0, 2, 23]);
        assert!(test_bit(&bits, 23));
        assert!(!test_bit(&bits, 64));
    }

    #[test]
    fn test_c_string() {
        assert_eq!(c_string(b"Virtual Pad\0\0garbage"), "Virtual Pad");
        assert_eq!(c_string(b"unterminated"), "unterminated");
    }

    #[test]
    fn test_request_numbers() {
        // Values as computed by the kernel headers on the generic ioctl layout.
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        {
            assert_eq!(EVIOCGVERSION as u64, 0x8004_4501);
            assert_eq!(EVIOCGID as u64, 0x8008_4502);
            assert_eq!(eviocgname(256) as u64, 0x8100_4506);
            assert_eq!(UI_DEV_SETUP as u64, 0x405c_5503);
            assert_eq!(UI_ABS_SETUP as u64, 0x401c_5504);
            assert_eq!(UI_SET_EVBIT as u64, 0x4004_5564);
            assert_eq!(UI_DEV_CREATE as u64, 0x5501);
            assert_eq!(ui_get_sysname(64) as u64, 0x8040_552c);
        }
        assert_eq!(size_of::<input_absinfo>(), 24);
        assert_eq!(size_of::<uinput_setup>(), 92);
    }
}
