use crate::capabilities::{AbsInfo, Capabilities, Named, ResolvedType, resolve_ecodes};
use crate::ecodes::{
    self, EV_ABS, EV_CNT, EV_LED, EV_SW, Family, INPUT_PROP_CNT, KEY_CNT, LED_CNT, SND_CNT, SW_CNT,
};
use crate::error::{Error, Result};
use crate::eventio::EventIo;
use crate::ff::Effect;
use crate::sys::{self, ioctl_num_type};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::Deref;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const NAME_LEN: usize = 256;

/// Bus type and ids the kernel reports for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}
impl From<sys::input_id> for DeviceInfo {
    fn from(id: sys::input_id) -> Self {
        Self {
            bustype: id.bustype,
            vendor: id.vendor,
            product: id.product,
            version: id.version,
        }
    }
}
impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bus: {:04x}, vendor {:04x}, product {:04x}, version {:04x}",
            self.bustype, self.vendor, self.product, self.version
        )
    }
}

/// Keyboard autorepeat settings, both in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KbdInfo {
    /// Period between repeats
    pub repeat: u32,
    /// Hold time before repeating starts
    pub delay: u32,
}

/// Fields to change with [`InputDevice::set_absinfo`].
///
/// `None` and `Some(0)` both keep the device's current value, so this path cannot
/// set a field to zero; use [`InputDevice::set_absinfo_exact`] for that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsInfoUpdate {
    pub value: Option<i32>,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub fuzz: Option<i32>,
    pub flat: Option<i32>,
    pub resolution: Option<i32>,
}
impl AbsInfoUpdate {
    /// Overlay the given fields onto `current`, treating zero as unset
    pub fn merge(&self, current: AbsInfo) -> AbsInfo {
        let pick = |new: Option<i32>, old: i32| new.filter(|&v| v != 0).unwrap_or(old);
        AbsInfo {
            value: pick(self.value, current.value),
            min: pick(self.min, current.min),
            max: pick(self.max, current.max),
            fuzz: pick(self.fuzz, current.fuzz),
            flat: pick(self.flat, current.flat),
            resolution: pick(self.resolution, current.resolution),
        }
    }
}

/// An open evdev character device.
pub struct InputDevice {
    path: PathBuf,
    file: Option<File>,
    writable: bool,
    info: DeviceInfo,
    name: String,
    phys: String,
    uniq: String,
    version: i32,
    capabilities: Capabilities,
    ff_effects_count: i32,
}
impl InputDevice {
    /// Open `path` read-write, or read-only when write access is denied, and
    /// snapshot its identity and capabilities
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |source| Error::Open {
            path: path.to_path_buf(),
            source,
        };

        let meta = std::fs::metadata(path).map_err(open_err)?;
        if !meta.file_type().is_char_device() {
            return Err(open_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a character device",
            )));
        }

        let (file, writable) = match open_nonblocking(path, true) {
            Ok(file) => (file, true),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!("No write access to {}, opening read-only", path.display());
                (open_nonblocking(path, false).map_err(open_err)?, false)
            }
            Err(e) => return Err(open_err(e)),
        };

        // On any failure below `file` is dropped, closing the descriptor.
        let fd = file.as_fd();
        let id: sys::input_id = sys::ioctl_read(fd, sys::EVIOCGID).map_err(Error::io("EVIOCGID"))?;
        let name = query_string(fd, sys::eviocgname, "EVIOCGNAME", false)?;
        let phys = query_string(fd, sys::eviocgphys, "EVIOCGPHYS", true)?;
        let uniq = query_string(fd, sys::eviocguniq, "EVIOCGUNIQ", true)?;
        let version: libc::c_int =
            sys::ioctl_read(fd, sys::EVIOCGVERSION).map_err(Error::io("EVIOCGVERSION"))?;
        let capabilities = query_capabilities(fd)?;
        let ff_effects_count: libc::c_int =
            sys::ioctl_read(fd, sys::EVIOCGEFFECTS).map_err(Error::io("EVIOCGEFFECTS"))?;

        info!(
            "Opened {} \"{}\" ({}){}",
            path.display(),
            name,
            DeviceInfo::from(id),
            if writable { "" } else { " read-only" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            writable,
            info: id.into(),
            name,
            phys,
            uniq,
            version,
            capabilities,
            ff_effects_count,
        })
    }

    /// Release the descriptor. Later calls do nothing.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("Closed {}", self.path.display());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn info(&self) -> DeviceInfo {
        self.info
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical topology, empty when the driver reports none
    pub fn phys(&self) -> &str {
        &self.phys
    }

    pub fn uniq(&self) -> &str {
        &self.uniq
    }

    /// evdev protocol version
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Number of force-feedback effects the device can hold at once
    pub fn ff_effects_count(&self) -> i32 {
        self.ff_effects_count
    }

    /// Supported types and codes as captured at open time
    pub fn capabilities(&self, absinfo: bool) -> Capabilities {
        if absinfo {
            self.capabilities.clone()
        } else {
            self.capabilities.without_absinfo()
        }
    }

    /// Capabilities with names, `?` standing in for anything unknown
    pub fn capabilities_verbose(&self, absinfo: bool) -> Vec<ResolvedType> {
        self.capabilities(absinfo)
            .resolve(ecodes::registry(), crate::capabilities::UNKNOWN)
    }

    /// Take exclusive delivery of this device's events.
    ///
    /// Fails with [`Error::Busy`] when someone, including this handle, already holds it.
    pub fn grab(&self) -> Result<()> {
        self.set_grab(1)?;
        debug!("Grabbed {}", self.path.display());
        Ok(())
    }

    /// Fails with [`Error::InvalidArgument`] when the device is not grabbed.
    pub fn ungrab(&self) -> Result<()> {
        self.set_grab(0)?;
        debug!("Released {}", self.path.display());
        Ok(())
    }

    /// Grab for the lifetime of the returned guard
    pub fn grab_scoped(&self) -> Result<Grab<'_>> {
        self.grab()?;
        Ok(Grab { device: self })
    }

    fn set_grab(&self, on: libc::c_int) -> Result<()> {
        match sys::ioctl_int(self.fd()?, sys::EVIOCGRAB, on) {
            Ok(_) => Ok(()),
            Err(e) => Err(match e.raw_os_error() {
                Some(libc::EBUSY) => Error::Busy,
                Some(libc::EINVAL) => Error::InvalidArgument,
                _ => Error::Io {
                    op: "EVIOCGRAB",
                    source: e,
                },
            }),
        }
    }

    /// LEDs currently lit
    pub fn leds(&self) -> Result<Vec<u16>> {
        self.state_bits(sys::eviocgled, LED_CNT, "EVIOCGLED")
    }

    pub fn leds_verbose(&self) -> Result<Vec<Named>> {
        let leds = self.leds()?;
        Ok(resolve_ecodes(ecodes::registry().bytype(EV_LED), &leds, crate::capabilities::UNKNOWN))
    }

    /// Keys and buttons currently held down
    pub fn active_keys(&self) -> Result<Vec<u16>> {
        self.state_bits(sys::eviocgkey, KEY_CNT, "EVIOCGKEY")
    }

    pub fn active_keys_verbose(&self) -> Result<Vec<Named>> {
        let keys = self.active_keys()?;
        Ok(resolve_ecodes(Some(ecodes::registry().keys()), &keys, crate::capabilities::UNKNOWN))
    }

    /// Switches currently on
    pub fn switches(&self) -> Result<Vec<u16>> {
        self.state_bits(sys::eviocgsw, SW_CNT, "EVIOCGSW")
    }

    pub fn switches_verbose(&self) -> Result<Vec<Named>> {
        let switches = self.switches()?;
        Ok(resolve_ecodes(ecodes::registry().bytype(EV_SW), &switches, crate::capabilities::UNKNOWN))
    }

    /// Sounds currently playing
    pub fn sounds(&self) -> Result<Vec<u16>> {
        self.state_bits(sys::eviocgsnd, SND_CNT, "EVIOCGSND")
    }

    /// Device properties such as `INPUT_PROP_POINTER`
    pub fn input_props(&self) -> Result<Vec<u16>> {
        self.state_bits(sys::eviocgprop, INPUT_PROP_CNT, "EVIOCGPROP")
    }

    pub fn input_props_verbose(&self) -> Result<Vec<Named>> {
        let props = self.input_props()?;
        let reverse = ecodes::registry().family(Family::InputProp);
        Ok(resolve_ecodes(Some(reverse), &props, crate::capabilities::UNKNOWN))
    }

    fn state_bits(&self, request: fn(usize) -> ioctl_num_type, count: u16, op: &'static str) -> Result<Vec<u16>> {
        let mut bits = vec![0u8; (count as usize).div_ceil(8)];
        sys::ioctl_buf(self.fd()?, request(bits.len()), &mut bits).map_err(Error::io(op))?;
        Ok(sys::set_bits(&bits).collect())
    }

    /// Turn an LED on or off. Like any write, it needs a `SYN_REPORT` to take effect.
    pub fn set_led(&self, led: u16, on: bool) -> Result<()> {
        self.write(EV_LED, led, on as i32)
    }

    pub fn repeat(&self) -> Result<KbdInfo> {
        let rep: [libc::c_uint; 2] =
            sys::ioctl_read(self.fd()?, sys::EVIOCGREP).map_err(Error::io("EVIOCGREP"))?;
        Ok(KbdInfo {
            delay: rep[0],
            repeat: rep[1],
        })
    }

    pub fn set_repeat(&self, kbd: KbdInfo) -> Result<()> {
        let mut rep: [libc::c_uint; 2] = [kbd.delay, kbd.repeat];
        sys::ioctl_ptr(self.fd()?, sys::EVIOCSREP, &mut rep).map_err(Error::io("EVIOCSREP"))?;
        Ok(())
    }

    /// Current calibration of absolute axis `code`
    pub fn absinfo(&self, code: u16) -> Result<AbsInfo> {
        let raw: sys::input_absinfo =
            sys::ioctl_read(self.fd()?, sys::eviocgabs(code)).map_err(Error::io("EVIOCGABS"))?;
        Ok(raw.into())
    }

    /// Change some calibration fields of axis `code`, keeping the rest as the kernel
    /// reports them now. Zero counts as unset; see [`AbsInfoUpdate`].
    pub fn set_absinfo(&self, code: u16, update: AbsInfoUpdate) -> Result<AbsInfo> {
        let merged = update.merge(self.absinfo(code)?);
        self.set_absinfo_exact(code, merged)?;
        Ok(merged)
    }

    /// Write all six calibration fields of axis `code`
    pub fn set_absinfo_exact(&self, code: u16, info: AbsInfo) -> Result<()> {
        let mut raw = sys::input_absinfo::from(info);
        sys::ioctl_ptr(self.fd()?, sys::eviocsabs(code), &mut raw).map_err(Error::io("EVIOCSABS"))?;
        debug!("Set absinfo of axis {} on {}: {:?}", code, self.path.display(), info);
        Ok(())
    }

    /// Upload a force-feedback effect, returning the slot id the kernel assigned.
    ///
    /// An effect whose id is -1 gets a new slot; any other id updates that slot.
    pub fn upload_effect(&self, effect: &Effect) -> Result<i16> {
        let mut raw = *effect.raw();
        sys::ioctl_ptr(self.fd()?, sys::EVIOCSFF, &mut raw).map_err(Error::io("EVIOCSFF"))?;
        debug!("Uploaded effect type {:#x} to slot {}", raw.type_, raw.id);
        Ok(raw.id)
    }

    /// Stop and free effect slot `id`
    pub fn erase_effect(&self, id: i16) -> Result<()> {
        sys::ioctl_int(self.fd()?, sys::EVIOCRMFF, id as libc::c_int)
            .map_err(Error::io("EVIOCRMFF"))?;
        debug!("Erased effect slot {}", id);
        Ok(())
    }

    fn fd(&self) -> Result<BorrowedFd<'_>> {
        self.file.as_ref().map(AsFd::as_fd).ok_or(Error::Closed)
    }
}
impl EventIo for InputDevice {
    fn fileno(&self) -> Result<BorrowedFd<'_>> {
        self.fd()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn writable(&self) -> bool {
        self.writable
    }
}
impl AsRawFd for InputDevice {
    /// `-1` once closed
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }
}
impl PartialEq for InputDevice {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info && self.name == other.name && self.phys == other.phys
    }
}
impl fmt::Debug for InputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDevice")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("phys", &self.phys)
            .field("info", &self.info)
            .field("writable", &self.writable)
            .field("closed", &self.is_closed())
            .finish()
    }
}
impl fmt::Display for InputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device {}, name \"{}\", phys \"{}\"",
            self.path.display(),
            self.name,
            self.phys
        )
    }
}

/// Holds a grab on a device; releases it when dropped.
pub struct Grab<'a> {
    device: &'a InputDevice,
}
impl Deref for Grab<'_> {
    type Target = InputDevice;

    fn deref(&self) -> &InputDevice {
        self.device
    }
}
impl Drop for Grab<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.device.ungrab() {
            warn!("Failed to release grab on {}: {}", self.device.path.display(), e);
        }
    }
}

fn open_nonblocking(path: &Path, write: bool) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(write)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

fn query_string(
    fd: BorrowedFd<'_>,
    request: fn(usize) -> ioctl_num_type,
    op: &'static str,
    optional: bool,
) -> Result<String> {
    let mut buf = [0u8; NAME_LEN];
    match sys::ioctl_buf(fd, request(buf.len()), &mut buf) {
        Ok(_) => Ok(sys::c_string(&buf)),
        // Drivers without a topology or serial answer ENOENT.
        Err(e) if optional && e.raw_os_error() == Some(libc::ENOENT) => Ok(String::new()),
        Err(e) => Err(Error::Io { op, source: e }),
    }
}

fn query_capabilities(fd: BorrowedFd<'_>) -> Result<Capabilities> {
    let mut type_bits = [0u8; (EV_CNT as usize).div_ceil(8)];
    sys::ioctl_buf(fd, sys::eviocgbit(0, type_bits.len()), &mut type_bits)
        .map_err(Error::io("EVIOCGBIT"))?;

    let mut caps = Capabilities::new();
    for ev_type in sys::set_bits(&type_bits) {
        caps.enable_type(ev_type);

        let mut code_bits = [0u8; (KEY_CNT as usize).div_ceil(8)];
        match sys::ioctl_buf(fd, sys::eviocgbit(ev_type, code_bits.len()), &mut code_bits) {
            Ok(_) => {}
            // evdev keeps no code table for some types, EV_REP among them.
            Err(e) if e.raw_os_error() == Some(libc::EINVAL) => {
                debug!("No code bitmask for event type {}", ev_type);
                continue;
            }
            Err(e) => {
                return Err(Error::Io {
                    op: "EVIOCGBIT",
                    source: e,
                });
            }
        }

        for code in sys::set_bits(&code_bits) {
            if ev_type == EV_ABS {
                let raw: sys::input_absinfo =
                    sys::ioctl_read(fd, sys::eviocgabs(code)).map_err(Error::io("EVIOCGABS"))?;
                caps.insert(EV_ABS, (code, AbsInfo::from(raw)));
            } else {
                caps.insert(ev_type, code);
            }
        }
    }
    Ok(caps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_regular_file() {
        let path = std::env::temp_dir().join(format!("evdevio-not-a-device-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let err = InputDevice::open(&path).unwrap_err();
        assert!(matches!(err, Error::Open { .. }), "{:?}", err);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_missing_path() {
        let err = InputDevice::open("/nonexistent/event99").unwrap_err();
        match err {
            Error::Open { path, source } => {
                assert_eq!(path, PathBuf::from("/nonexistent/event99"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_absinfo_update_merges_over_current() {
        let current = AbsInfo::from([10, -100, 100, 2, 4, 1]);
        let update = AbsInfoUpdate {
            max: Some(200),
            ..Default::default()
        };
        assert_eq!(update.merge(current).to_array(), [10, -100, 200, 2, 4, 1]);
    }

    #[test]
    fn test_absinfo_update_cannot_set_zero() {
        let current = AbsInfo::from([10, -100, 100, 2, 4, 1]);
        let update = AbsInfoUpdate {
            fuzz: Some(0),
            flat: Some(16),
            ..Default::default()
        };
        assert_eq!(update.merge(current).to_array(), [10, -100, 100, 2, 16, 1]);
    }
}
