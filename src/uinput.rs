use crate::capabilities::{AbsInfo, Capabilities, DEFAULT_FILTERED_TYPES};
use crate::config::Config;
use crate::device::InputDevice;
use crate::ecodes::{
    self, BUS_USB, EV_ABS, EV_FF, EV_KEY, EV_LED, EV_MSC, EV_REL, EV_SND, EV_SW, EV_SYN,
    FF_MAX_EFFECTS, SYN_REPORT,
};
use crate::error::{Error, ProvisionStage, Result};
use crate::eventio::EventIo;
use crate::ff::{EraseRequest, UploadRequest};
use crate::sys::{self, ioctl_num_type};
use crate::util;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

pub const DEFAULT_NAME: &str = "evdevio-uinput";
pub const DEFAULT_PHYS: &str = "evdevio-uinput";

/// Lifecycle of a virtual device. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UInputState {
    Unconfigured,
    DescriptorOpen,
    CapabilitiesEnabled,
    /// The kernel device exists but its event node has not been found
    Created,
    /// The event node is open as the companion device
    Ready,
    Closed,
}

/// Declares a virtual device and provisions it with [`UInputBuilder::build`].
#[derive(Debug, Clone)]
pub struct UInputBuilder {
    events: Option<Capabilities>,
    name: String,
    vendor: u16,
    product: u16,
    version: u16,
    bustype: u16,
    phys: String,
    input_props: Vec<u16>,
    max_effects: u32,
    config: Config,
}
impl Default for UInputBuilder {
    fn default() -> Self {
        Self {
            events: None,
            name: DEFAULT_NAME.to_string(),
            vendor: 0x1,
            product: 0x1,
            version: 0x1,
            bustype: BUS_USB,
            phys: DEFAULT_PHYS.to_string(),
            input_props: Vec::new(),
            max_effects: FF_MAX_EFFECTS as u32,
            config: Config::default(),
        }
    }
}
impl UInputBuilder {
    /// Types and codes the device will report. Defaults to every key and button.
    pub fn events(mut self, events: Capabilities) -> Self {
        self.events = Some(events);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn vendor(mut self, vendor: u16) -> Self {
        self.vendor = vendor;
        self
    }

    pub fn product(mut self, product: u16) -> Self {
        self.product = product;
        self
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn bustype(mut self, bustype: u16) -> Self {
        self.bustype = bustype;
        self
    }

    pub fn phys(mut self, phys: impl Into<String>) -> Self {
        self.phys = phys.into();
        self
    }

    /// `INPUT_PROP_*` flags to declare
    pub fn input_props(mut self, props: impl IntoIterator<Item = u16>) -> Self {
        self.input_props = props.into_iter().collect();
        self
    }

    /// Force-feedback effects the device can hold at once
    pub fn max_effects(mut self, max_effects: u32) -> Self {
        self.max_effects = max_effects;
        self
    }

    /// Path of the uinput node; overrides `config.uinput_path`
    pub fn devnode(mut self, devnode: impl Into<PathBuf>) -> Self {
        self.config.uinput_path = devnode.into();
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Provision the device and look for its event node.
    ///
    /// A failure before the create step leaves nothing behind in the kernel. If the
    /// device is created but its node cannot be found the result is still `Ok`, in
    /// state [`UInputState::Created`]; see [`UInput::resolve_device`].
    pub fn build(self) -> Result<UInput> {
        let events = declared_or_default(self.events);

        let mut uinput = UInput {
            name: self.name,
            vendor: self.vendor,
            product: self.product,
            version: self.version,
            bustype: self.bustype,
            phys: self.phys,
            config: self.config,
            file: None,
            device: None,
            state: UInputState::Unconfigured,
        };

        validate(&uinput.config.uinput_path, &uinput.name)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&uinput.config.uinput_path)
            .map_err(Error::provision(ProvisionStage::Open))?;
        uinput.file = Some(file);
        uinput.transition(UInputState::DescriptorOpen);

        // Dropping `uinput` before the create step only closes the descriptor.
        {
            let fd = uinput.fd()?;
            for (ev_type, code) in events.enable_list() {
                enable_event(fd, ev_type, code)
                    .map_err(Error::provision(ProvisionStage::EnableCapabilities))?;
            }
        }
        uinput.transition(UInputState::CapabilitiesEnabled);

        {
            let fd = uinput.fd()?;
            uinput
                .setup(fd, &events.abs_setup(), &self.input_props, self.max_effects)
                .map_err(Error::provision(ProvisionStage::Setup))?;
            sys::ioctl_int(fd, sys::UI_DEV_CREATE, 0)
                .map_err(Error::provision(ProvisionStage::Create))?;
        }
        uinput.transition(UInputState::Created);
        info!("Created uinput device \"{}\"", uinput.name);

        if let Err(e) = uinput.resolve_device() {
            warn!("{}", e);
        }
        Ok(uinput)
    }
}

/// A virtual input device.
///
/// Writes to the uinput descriptor inject events; reads return what the kernel sends
/// back, such as LED changes and force-feedback requests. The kernel's view of the
/// device is available through [`UInput::device`] once its event node is resolved.
pub struct UInput {
    name: String,
    vendor: u16,
    product: u16,
    version: u16,
    bustype: u16,
    phys: String,
    config: Config,
    file: Option<File>,
    device: Option<InputDevice>,
    state: UInputState,
}
impl UInput {
    pub fn builder() -> UInputBuilder {
        UInputBuilder::default()
    }

    /// A virtual keyboard with the default identity
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Builder declaring the union of the devices' capabilities, skipping
    /// `filtered_types`, with `max_effects` set to the smallest effect count among them
    pub fn from_devices<'a>(
        devices: impl IntoIterator<Item = &'a InputDevice>,
        filtered_types: Option<&[u16]>,
    ) -> UInputBuilder {
        let devices: Vec<&InputDevice> = devices.into_iter().collect();
        let filtered = filtered_types.unwrap_or(&DEFAULT_FILTERED_TYPES);
        let caps: Vec<Capabilities> = devices.iter().map(|d| d.capabilities(true)).collect();
        let events = Capabilities::merge(&caps, filtered);

        let mut builder = UInputBuilder::default().events(events);
        if let Some(min) = devices.iter().map(|d| d.ff_effects_count()).min() {
            builder = builder.max_effects(min.max(0) as u32);
        }
        builder
    }

    pub fn state(&self) -> UInputState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phys(&self) -> &str {
        &self.phys
    }

    pub fn devnode(&self) -> &Path {
        &self.config.uinput_path
    }

    /// The event device the kernel created for this virtual device
    pub fn device(&self) -> Result<&InputDevice> {
        match (&self.device, self.state) {
            (_, UInputState::Closed) => Err(Error::Closed),
            (Some(device), _) => Ok(device),
            (None, _) => Err(Error::Unresolved {
                name: self.name.clone(),
            }),
        }
    }

    /// Look for the event node again if it was not found at creation
    pub fn resolve_device(&mut self) -> Result<&InputDevice> {
        match self.state {
            UInputState::Created => {}
            UInputState::Ready | UInputState::Closed => return self.device(),
            _ => {
                return Err(Error::Unresolved {
                    name: self.name.clone(),
                });
            }
        }

        let device = self.find_device()?;
        info!("uinput device \"{}\" is {}", self.name, device.path().display());
        self.device = Some(device);
        self.transition(UInputState::Ready);
        self.device()
    }

    /// Capabilities as the kernel reports them for the created device
    pub fn capabilities(&self, absinfo: bool) -> Result<Capabilities> {
        Ok(self.device()?.capabilities(absinfo))
    }

    /// Emit `SYN_REPORT`, making preceding writes visible to readers
    pub fn syn(&self) -> Result<()> {
        self.write(EV_SYN, SYN_REPORT, 0)
    }

    /// Fetch the effect behind a `UI_FF_UPLOAD` request event
    pub fn begin_upload(&self, request_id: u32) -> Result<UploadRequest> {
        let mut request = UploadRequest::new(request_id);
        sys::ioctl_ptr(self.fd()?, sys::UI_BEGIN_FF_UPLOAD, request.raw_mut())
            .map_err(Error::io("UI_BEGIN_FF_UPLOAD"))?;
        trace!("Began upload request {}", request_id);
        Ok(request)
    }

    /// Complete an upload, reporting its `retval` to the client
    pub fn end_upload(&self, mut request: UploadRequest) -> Result<()> {
        sys::ioctl_ptr(self.fd()?, sys::UI_END_FF_UPLOAD, request.raw_mut())
            .map_err(Error::io("UI_END_FF_UPLOAD"))?;
        trace!("Ended upload request {}", request.request_id());
        Ok(())
    }

    /// Fetch the slot behind a `UI_FF_ERASE` request event
    pub fn begin_erase(&self, request_id: u32) -> Result<EraseRequest> {
        let mut request = EraseRequest::new(request_id);
        sys::ioctl_ptr(self.fd()?, sys::UI_BEGIN_FF_ERASE, request.raw_mut())
            .map_err(Error::io("UI_BEGIN_FF_ERASE"))?;
        trace!("Began erase request {}", request_id);
        Ok(request)
    }

    pub fn end_erase(&self, mut request: EraseRequest) -> Result<()> {
        sys::ioctl_ptr(self.fd()?, sys::UI_END_FF_ERASE, request.raw_mut())
            .map_err(Error::io("UI_END_FF_ERASE"))?;
        trace!("Ended erase request {}", request.request_id());
        Ok(())
    }

    /// Close the companion device, then destroy the virtual device. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut device) = self.device.take() {
            device.close();
        }
        let Some(file) = self.file.take() else {
            self.state = UInputState::Closed;
            return Ok(());
        };

        let created = self.state >= UInputState::Created;
        self.transition(UInputState::Closed);
        if created {
            sys::ioctl_int(file.as_fd(), sys::UI_DEV_DESTROY, 0).map_err(Error::io("UI_DEV_DESTROY"))?;
            info!("Destroyed uinput device \"{}\"", self.name);
        }
        Ok(())
    }

    fn transition(&mut self, next: UInputState) {
        debug!("uinput \"{}\": {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
    }

    fn fd(&self) -> Result<BorrowedFd<'_>> {
        self.file.as_ref().map(AsFd::as_fd).ok_or(Error::Closed)
    }

    /// Commit identity and axis calibration, falling back to the pre-4.5 record write
    fn setup(&self, fd: BorrowedFd<'_>, abs: &[(u16, AbsInfo)], props: &[u16], max_effects: u32) -> io::Result<()> {
        let phys = std::ffi::CString::new(self.phys.as_str())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let ret = unsafe { libc::ioctl(fd.as_raw_fd(), sys::UI_SET_PHYS as _, phys.as_ptr()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        for &prop in props {
            sys::ioctl_int(fd, sys::UI_SET_PROPBIT, prop as libc::c_int)?;
        }

        let id = sys::input_id {
            bustype: self.bustype,
            vendor: self.vendor,
            product: self.product,
            version: self.version,
        };
        let mut setup = sys::uinput_setup {
            id,
            name: sys::name_field(&self.name),
            ff_effects_max: max_effects,
        };
        match sys::ioctl_ptr(fd, sys::UI_DEV_SETUP, &mut setup) {
            Ok(_) => {
                for &(code, info) in abs {
                    let mut abs_setup = sys::uinput_abs_setup {
                        code,
                        absinfo: info.into(),
                    };
                    sys::ioctl_ptr(fd, sys::UI_ABS_SETUP, &mut abs_setup)?;
                }
                Ok(())
            }
            Err(e) if matches!(e.raw_os_error(), Some(libc::EINVAL) | Some(libc::ENOTTY)) => {
                debug!("UI_DEV_SETUP unsupported ({}), writing uinput_user_dev", e);
                let mut dev = sys::uinput_user_dev {
                    name: setup.name,
                    id,
                    ff_effects_max: max_effects,
                    absmax: [0; sys::ABS_CNT],
                    absmin: [0; sys::ABS_CNT],
                    absfuzz: [0; sys::ABS_CNT],
                    absflat: [0; sys::ABS_CNT],
                };
                for &(code, info) in abs.iter().filter(|(code, _)| (*code as usize) < sys::ABS_CNT) {
                    let i = code as usize;
                    dev.absmin[i] = info.min;
                    dev.absmax[i] = info.max;
                    dev.absfuzz[i] = info.fuzz;
                    dev.absflat[i] = info.flat;
                }
                sys::write_record(fd, &dev)
            }
            Err(e) => Err(e),
        }
    }

    fn find_device(&self) -> Result<InputDevice> {
        let attempts = self.config.discovery_attempts.max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                std::thread::sleep(self.config.discovery_delay(attempt));
            }
            if let Some(device) = self.find_by_sysname() {
                return Ok(device);
            }
            if let Some(device) = self.find_by_name() {
                return Ok(device);
            }
            trace!("Event node of \"{}\" not found (attempt {})", self.name, attempt + 1);
        }
        Err(Error::Unresolved {
            name: self.name.clone(),
        })
    }

    /// UI_GET_SYSNAME names the device's sysfs directory, which lists its event node
    fn find_by_sysname(&self) -> Option<InputDevice> {
        let fd = self.fd().ok()?;
        let mut buf = [0u8; 64];
        if let Err(e) = sys::ioctl_buf(fd, sys::ui_get_sysname(buf.len()), &mut buf) {
            trace!("UI_GET_SYSNAME failed: {}", e);
            return None;
        }
        let sysname = sys::c_string(&buf);
        let syspath = self
            .config
            .sysfs_dir
            .join("devices/virtual/input")
            .join(&sysname);

        let entries = std::fs::read_dir(&syspath).ok()?;
        let node = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .find(|name| util::event_number(name).is_some())?;
        match InputDevice::open(self.config.input_dir.join(&node)) {
            Ok(device) => Some(device),
            Err(e) => {
                trace!("{} belongs to {} but is not usable yet: {}", node, sysname, e);
                None
            }
        }
    }

    /// Scan every event node for one with our name. The highest numbered match is
    /// taken as the newest, which is a best guess when names collide.
    fn find_by_name(&self) -> Option<InputDevice> {
        let entries = std::fs::read_dir(&self.config.input_dir).ok()?;
        let mut nodes: Vec<(u32, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let n = util::event_number(entry.file_name().to_str()?)?;
                Some((n, entry.path()))
            })
            .collect();
        nodes.sort_by(|a, b| b.0.cmp(&a.0));

        nodes
            .into_iter()
            .filter_map(|(_, path)| InputDevice::open(path).ok())
            .find(|device| device.name() == self.name)
    }
}
impl EventIo for UInput {
    fn fileno(&self) -> Result<BorrowedFd<'_>> {
        self.fd()
    }

    fn path(&self) -> &Path {
        &self.config.uinput_path
    }

    fn writable(&self) -> bool {
        true
    }
}
impl AsRawFd for UInput {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }
}
impl Drop for UInput {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to destroy uinput device \"{}\": {}", self.name, e);
        }
    }
}
impl fmt::Debug for UInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UInput")
            .field("name", &self.name)
            .field("devnode", &self.config.uinput_path)
            .field("state", &self.state)
            .field("device", &self.device.as_ref().map(|d| d.path().to_path_buf()))
            .finish()
    }
}
impl fmt::Display for UInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name \"{}\", bus {:#06x}, vendor {:04x}, product {:04x}, version {:04x}, phys \"{}\"",
            self.name, self.bustype, self.vendor, self.product, self.version, self.phys
        )
    }
}

/// Every key and button the registry knows
fn default_events() -> Capabilities {
    let mut caps = Capabilities::new();
    caps.extend(EV_KEY, ecodes::registry().keys().keys().copied());
    caps
}

/// An absent or empty declaration means a plain keyboard
fn declared_or_default(events: Option<Capabilities>) -> Capabilities {
    match events {
        Some(events) if !events.is_empty() => events,
        _ => default_events(),
    }
}

fn validate(devnode: &Path, name: &str) -> Result<()> {
    let invalid = |msg: String| Error::Provision {
        stage: ProvisionStage::Validate,
        source: io::Error::new(io::ErrorKind::InvalidInput, msg),
    };

    if name.len() > sys::UINPUT_MAX_NAME_SIZE {
        return Err(invalid(format!(
            "device name longer than {} bytes",
            sys::UINPUT_MAX_NAME_SIZE
        )));
    }

    let meta = std::fs::metadata(devnode).map_err(Error::provision(ProvisionStage::Validate))?;
    if !meta.file_type().is_char_device() {
        return Err(invalid(format!("{} is not a character device", devnode.display())));
    }
    nix::unistd::access(devnode, nix::unistd::AccessFlags::W_OK)
        .map_err(|errno| Error::Provision {
            stage: ProvisionStage::Validate,
            source: io::Error::from(errno),
        })?;
    Ok(())
}

fn enable_event(fd: BorrowedFd<'_>, ev_type: u16, code: u16) -> io::Result<()> {
    let request: ioctl_num_type = match ev_type {
        EV_KEY => sys::UI_SET_KEYBIT,
        EV_ABS => sys::UI_SET_ABSBIT,
        EV_REL => sys::UI_SET_RELBIT,
        EV_MSC => sys::UI_SET_MSCBIT,
        EV_SW => sys::UI_SET_SWBIT,
        EV_LED => sys::UI_SET_LEDBIT,
        EV_FF => sys::UI_SET_FFBIT,
        EV_SND => sys::UI_SET_SNDBIT,
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("event type {} cannot be enabled on a uinput device", ev_type),
            ));
        }
    };
    sys::ioctl_int(fd, sys::UI_SET_EVBIT, ev_type as libc::c_int)?;
    sys::ioctl_int(fd, request, code as libc::c_int)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecodes::{ABS_X, KEY_A, KEY_MAX, KEY_P, REL_X};

    #[test]
    fn test_default_events_are_all_keys() {
        let events = default_events();
        let codes = events.codes(EV_KEY);
        assert!(codes.contains(&KEY_A));
        assert!(!codes.contains(&KEY_MAX));
        assert_eq!(codes.len(), ecodes::registry().keys().len());
    }

    #[test]
    fn test_empty_declaration_falls_back_to_keys() {
        assert_eq!(declared_or_default(None), default_events());
        assert_eq!(declared_or_default(Some(Capabilities::new())), default_events());

        let declared: Capabilities = [(EV_REL, vec![REL_X])].into_iter().collect();
        assert_eq!(declared_or_default(Some(declared.clone())), declared);
    }

    #[test]
    fn test_name_too_long() {
        let err = UInput::builder().name("a".repeat(150)).build().unwrap_err();
        assert!(matches!(
            err,
            Error::Provision {
                stage: ProvisionStage::Validate,
                ..
            }
        ));
    }

    #[test]
    fn test_devnode_must_be_char_device() {
        let path = std::env::temp_dir().join(format!("evdevio-fake-uinput-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let err = UInput::builder().devnode(&path).build().unwrap_err();
        assert!(matches!(
            err,
            Error::Provision {
                stage: ProvisionStage::Validate,
                ..
            }
        ));
        std::fs::remove_file(&path).unwrap();

        let err = UInput::builder().devnode("/nonexistent/uinput").build().unwrap_err();
        match err {
            Error::Provision { stage, source } => {
                assert_eq!(stage, ProvisionStage::Validate);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_type_is_rejected_before_any_ioctl() {
        let dev_null = File::open("/dev/null").unwrap();
        let err = enable_event(dev_null.as_fd(), EV_SYN, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_from_devices_without_sources() {
        let builder = UInput::from_devices([], None);
        let events = builder.events.clone().unwrap();
        assert!(events.is_empty());
        assert_eq!(builder.max_effects, FF_MAX_EFFECTS as u32);

        let builder = UInput::builder().events([(EV_REL, vec![REL_X]), (EV_KEY, vec![KEY_P])].into_iter().collect());
        assert!(builder.events.as_ref().unwrap().contains(EV_REL, REL_X));
        assert!(!builder.events.as_ref().unwrap().contains(EV_ABS, ABS_X));
    }

    #[test]
    fn test_states_are_ordered() {
        assert!(UInputState::Unconfigured < UInputState::DescriptorOpen);
        assert!(UInputState::CapabilitiesEnabled < UInputState::Created);
        assert!(UInputState::Created < UInputState::Ready);
    }
}
