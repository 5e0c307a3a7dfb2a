//! evdevio - Linux input events through evdev and uinput
//!
//! This library reads events from `/dev/input/event*` nodes, queries and configures
//! those devices, and creates virtual devices through `/dev/uinput` to inject events.

pub mod capabilities;
pub mod config;
pub mod device;
pub mod ecodes;
pub mod error;
pub mod event;
pub mod eventio;
pub mod ff;
pub mod stream;
pub mod sys;
pub mod uinput;
pub mod util;

// Re-export commonly used types
pub use capabilities::{AbsInfo, Capabilities, CodeEntry, Named, ResolvedEntry, ResolvedType};
pub use config::Config;
pub use device::{AbsInfoUpdate, DeviceInfo, Grab, InputDevice, KbdInfo};
pub use ecodes::{Registry, registry};
pub use error::{Error, ProvisionStage, Result};
pub use event::{
    AbsEvent, Event, EventFactory, InputEvent, KeyEvent, KeyState, RelEvent, SynEvent, categorize,
};
pub use eventio::{EventIo, Events, ReadLoop};
pub use ff::{Effect, EraseRequest, UploadRequest};
pub use stream::EventStream;
pub use uinput::{UInput, UInputBuilder, UInputState};
pub use util::{find_ecodes_by_regex, is_device, list_devices};
