//! Force-feedback effect records.
//!
//! An [`Effect`] is the kernel's `struct ff_effect` held as-is. Only the header fields
//! and the rumble payload get accessors; other effect kinds can be built from bytes.

use crate::ecodes::FF_RUMBLE;
use crate::sys;

/// Opaque `struct ff_effect`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Effect {
    raw: sys::ff_effect,
}
impl Effect {
    /// Rumble with the given motor strengths, playing for `length_ms`
    pub fn rumble(strong_magnitude: u16, weak_magnitude: u16, length_ms: u16) -> Self {
        let mut raw = sys::ff_effect {
            type_: FF_RUMBLE,
            id: -1,
            ..Default::default()
        };
        raw.replay.length = length_ms;
        let mut effect = Self { raw };
        effect.payload_mut()[..4].copy_from_slice(
            &[strong_magnitude.to_ne_bytes(), weak_magnitude.to_ne_bytes()].concat(),
        );
        effect
    }

    /// Reinterpret a native `struct ff_effect`; `None` on a size mismatch
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != size_of::<sys::ff_effect>() {
            return None;
        }
        let raw = unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<sys::ff_effect>()) };
        Some(Self { raw })
    }

    pub fn as_bytes(&self) -> &[u8] {
        let ptr = (&self.raw as *const sys::ff_effect).cast::<u8>();
        unsafe { std::slice::from_raw_parts(ptr, size_of::<sys::ff_effect>()) }
    }

    /// Effect kind, e.g. `FF_RUMBLE`
    pub fn effect_type(&self) -> u16 {
        self.raw.type_
    }

    /// Kernel slot id, -1 for an effect not uploaded yet
    pub fn id(&self) -> i16 {
        self.raw.id
    }

    pub fn set_id(&mut self, id: i16) {
        self.raw.id = id;
    }

    pub fn direction(&self) -> u16 {
        self.raw.direction
    }

    /// Playback length and delay in milliseconds
    pub fn replay(&self) -> (u16, u16) {
        (self.raw.replay.length, self.raw.replay.delay)
    }

    /// `(strong, weak)` magnitudes of a rumble effect
    pub fn rumble_magnitudes(&self) -> Option<(u16, u16)> {
        if self.raw.type_ != FF_RUMBLE {
            return None;
        }
        let p = self.payload();
        Some((
            u16::from_ne_bytes([p[0], p[1]]),
            u16::from_ne_bytes([p[2], p[3]]),
        ))
    }

    pub(crate) fn raw(&self) -> &sys::ff_effect {
        &self.raw
    }

    pub(crate) fn from_raw(raw: sys::ff_effect) -> Self {
        Self { raw }
    }

    fn payload(&self) -> &[u8] {
        let ptr = std::ptr::addr_of!(self.raw.u).cast::<u8>();
        unsafe { std::slice::from_raw_parts(ptr, size_of_val(&self.raw.u)) }
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        let len = size_of_val(&self.raw.u);
        let ptr = std::ptr::addr_of_mut!(self.raw.u).cast::<u8>();
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }
}

/// Pending `UI_FF_UPLOAD` request on a virtual device.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest {
    raw: sys::uinput_ff_upload,
}
impl UploadRequest {
    pub(crate) fn new(request_id: u32) -> Self {
        Self {
            raw: sys::uinput_ff_upload {
                request_id,
                ..Default::default()
            },
        }
    }

    pub fn request_id(&self) -> u32 {
        self.raw.request_id
    }

    /// The effect the client is uploading
    pub fn effect(&self) -> Effect {
        Effect::from_raw(self.raw.effect)
    }

    /// The effect previously in that slot, when updating
    pub fn old(&self) -> Effect {
        Effect::from_raw(self.raw.old)
    }

    /// Result reported back to the uploading client, 0 or a negative errno
    pub fn retval(&self) -> i32 {
        self.raw.retval
    }

    pub fn set_retval(&mut self, retval: i32) {
        self.raw.retval = retval;
    }

    pub(crate) fn raw_mut(&mut self) -> &mut sys::uinput_ff_upload {
        &mut self.raw
    }
}

/// Pending `UI_FF_ERASE` request on a virtual device.
#[derive(Debug, Clone, Copy)]
pub struct EraseRequest {
    raw: sys::uinput_ff_erase,
}
impl EraseRequest {
    pub(crate) fn new(request_id: u32) -> Self {
        Self {
            raw: sys::uinput_ff_erase {
                request_id,
                ..Default::default()
            },
        }
    }

    pub fn request_id(&self) -> u32 {
        self.raw.request_id
    }

    pub fn effect_id(&self) -> u32 {
        self.raw.effect_id
    }

    pub fn retval(&self) -> i32 {
        self.raw.retval
    }

    pub fn set_retval(&mut self, retval: i32) {
        self.raw.retval = retval;
    }

    pub(crate) fn raw_mut(&mut self) -> &mut sys::uinput_ff_erase {
        &mut self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rumble_layout() {
        let effect = Effect::rumble(0xc000, 0x4000, 500);
        assert_eq!(effect.effect_type(), FF_RUMBLE);
        assert_eq!(effect.id(), -1);
        assert_eq!(effect.replay(), (500, 0));
        assert_eq!(effect.rumble_magnitudes(), Some((0xc000, 0x4000)));

        let copy = Effect::from_bytes(effect.as_bytes()).unwrap();
        assert_eq!(copy.rumble_magnitudes(), Some((0xc000, 0x4000)));
        assert!(Effect::from_bytes(&effect.as_bytes()[2..]).is_none());
    }

    #[test]
    fn test_header_gap_is_zeroed() {
        let effect = Effect::rumble(0xffff, 0xffff, 0xffff);
        let bytes = effect.as_bytes();
        assert_eq!(std::mem::offset_of!(sys::ff_effect, _pad), 14);
        assert_eq!(&bytes[14..16], &[0, 0]);
        assert_eq!(&bytes[10..12], &0xffffu16.to_ne_bytes());
    }

    #[test]
    fn test_ff_effect_size_matches_kernel() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(size_of::<sys::ff_effect>(), 48);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(size_of::<sys::ff_effect>(), 44);
    }
}
