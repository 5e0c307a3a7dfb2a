use crate::ecodes::{self, EV_ABS, EV_KEY, EV_REL, EV_SYN};
use crate::sys;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// One event as delivered by the kernel. Type and code are not validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputEvent {
    pub sec: u64,
    pub usec: u64,
    #[serde(rename = "type")]
    pub type_: u16,
    pub code: u16,
    pub value: i32,
}
impl InputEvent {
    pub fn new(type_: u16, code: u16, value: i32) -> Self {
        Self {
            sec: 0,
            usec: 0,
            type_,
            code,
            value,
        }
    }

    /// Same event stamped with the current wall clock time
    pub fn now(type_: u16, code: u16, value: i32) -> Self {
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: since.as_secs(),
            usec: since.subsec_micros() as u64,
            type_,
            code,
            value,
        }
    }

    pub fn timestamp(&self) -> f64 {
        self.sec as f64 + self.usec as f64 / 1_000_000.0
    }

    pub(crate) fn from_raw(raw: &sys::input_event) -> Self {
        Self {
            sec: raw.time.tv_sec as u64,
            usec: raw.time.tv_usec as u64,
            type_: raw.type_,
            code: raw.code,
            value: raw.value,
        }
    }

    pub(crate) fn to_raw(self) -> sys::input_event {
        sys::input_event {
            time: sys::timeval {
                tv_sec: self.sec as libc::time_t,
                tv_usec: self.usec as libc::suseconds_t,
            },
            type_: self.type_,
            code: self.code,
            value: self.value,
        }
    }

    /// Decode the kernel's native `struct input_event` layout.
    ///
    /// Returns `None` unless `bytes` holds exactly one record.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != size_of::<sys::input_event>() {
            return None;
        }
        let raw = unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<sys::input_event>()) };
        Some(Self::from_raw(&raw))
    }

    /// Encode into the kernel's native `struct input_event` layout
    pub fn to_bytes(self) -> Vec<u8> {
        let raw = self.to_raw();
        let ptr = (&raw as *const sys::input_event).cast::<u8>();
        unsafe { std::slice::from_raw_parts(ptr, size_of::<sys::input_event>()) }.to_vec()
    }
}
impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event at {:.6}, code {:02}, type {:02}, val {:02}",
            self.timestamp(),
            self.code,
            self.type_,
            self.value
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Up,
    Down,
    Hold,
}
impl KeyState {
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyState::Up),
            1 => Some(KeyState::Down),
            2 => Some(KeyState::Hold),
            _ => None,
        }
    }

    pub fn value(self) -> i32 {
        match self {
            KeyState::Up => 0,
            KeyState::Down => 1,
            KeyState::Hold => 2,
        }
    }
}
impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyState::Up => "up",
            KeyState::Down => "down",
            KeyState::Hold => "hold",
        })
    }
}

/// `EV_KEY` event: key or button transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub event: InputEvent,
}
impl KeyEvent {
    pub fn new(event: InputEvent) -> Self {
        Self { event }
    }

    /// Key state, or `None` for values outside 0..=2
    pub fn keystate(&self) -> Option<KeyState> {
        KeyState::from_value(self.event.value)
    }

    pub fn scancode(&self) -> u16 {
        self.event.code
    }

    /// Symbolic key name, or the hex code when the registry has no name for it
    pub fn keycode(&self) -> Cow<'static, str> {
        match ecodes::registry().keys().get(&self.event.code) {
            Some(&name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("{:#x}", self.event.code)),
        }
    }
}
impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.keystate() {
            Some(state) => state.to_string(),
            None => "unknown".to_string(),
        };
        write!(
            f,
            "key event at {:.6}, {} ({}), {}",
            self.event.timestamp(),
            self.scancode(),
            self.keycode(),
            state
        )
    }
}

/// `EV_REL` event: relative axis movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelEvent {
    pub event: InputEvent,
}
impl RelEvent {
    pub fn new(event: InputEvent) -> Self {
        Self { event }
    }
}
impl fmt::Display for RelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ecodes::registry().code_name(EV_REL, self.event.code).unwrap_or("?");
        write!(f, "relative axis event at {:.6}, {}", self.event.timestamp(), name)
    }
}

/// `EV_ABS` event: absolute axis position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsEvent {
    pub event: InputEvent,
}
impl AbsEvent {
    pub fn new(event: InputEvent) -> Self {
        Self { event }
    }
}
impl fmt::Display for AbsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ecodes::registry().code_name(EV_ABS, self.event.code).unwrap_or("?");
        write!(f, "absolute axis event at {:.6}, {}", self.event.timestamp(), name)
    }
}

/// `EV_SYN` event: frame delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynEvent {
    pub event: InputEvent,
}
impl SynEvent {
    pub fn new(event: InputEvent) -> Self {
        Self { event }
    }
}
impl fmt::Display for SynEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ecodes::registry().code_name(EV_SYN, self.event.code).unwrap_or("?");
        write!(f, "synchronization event at {:.6}, {}", self.event.timestamp(), name)
    }
}

/// An event, raw or wrapped in a typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Raw(InputEvent),
    Key(KeyEvent),
    Rel(RelEvent),
    Abs(AbsEvent),
    Syn(SynEvent),
}
impl Event {
    /// The underlying kernel event
    pub fn input_event(&self) -> InputEvent {
        match self {
            Event::Raw(ev) => *ev,
            Event::Key(KeyEvent { event })
            | Event::Rel(RelEvent { event })
            | Event::Abs(AbsEvent { event })
            | Event::Syn(SynEvent { event }) => *event,
        }
    }
}
impl From<InputEvent> for Event {
    fn from(ev: InputEvent) -> Self {
        Event::Raw(ev)
    }
}
impl From<KeyEvent> for Event {
    fn from(ev: KeyEvent) -> Self {
        Event::Key(ev)
    }
}
impl From<RelEvent> for Event {
    fn from(ev: RelEvent) -> Self {
        Event::Rel(ev)
    }
}
impl From<AbsEvent> for Event {
    fn from(ev: AbsEvent) -> Self {
        Event::Abs(ev)
    }
}
impl From<SynEvent> for Event {
    fn from(ev: SynEvent) -> Self {
        Event::Syn(ev)
    }
}
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Raw(ev) => ev.fmt(f),
            Event::Key(ev) => ev.fmt(f),
            Event::Rel(ev) => ev.fmt(f),
            Event::Abs(ev) => ev.fmt(f),
            Event::Syn(ev) => ev.fmt(f),
        }
    }
}

pub type EventConstructor = fn(InputEvent) -> Event;

/// Event type to typed-view constructor table.
#[derive(Debug, Clone)]
pub struct EventFactory {
    constructors: HashMap<u16, EventConstructor>,
}
impl Default for EventFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register(EV_KEY, |ev| Event::Key(KeyEvent::new(ev)));
        factory.register(EV_REL, |ev| Event::Rel(RelEvent::new(ev)));
        factory.register(EV_ABS, |ev| Event::Abs(AbsEvent::new(ev)));
        factory.register(EV_SYN, |ev| Event::Syn(SynEvent::new(ev)));
        factory
    }
}
impl EventFactory {
    /// A table with no constructors; everything categorizes as raw
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Install or replace the constructor for `ev_type`, returning the previous one
    pub fn register(&mut self, ev_type: u16, constructor: EventConstructor) -> Option<EventConstructor> {
        self.constructors.insert(ev_type, constructor)
    }

    pub fn unregister(&mut self, ev_type: u16) -> Option<EventConstructor> {
        self.constructors.remove(&ev_type)
    }

    pub fn categorize(&self, event: InputEvent) -> Event {
        match self.constructors.get(&event.type_) {
            Some(constructor) => constructor(event),
            None => Event::Raw(event),
        }
    }
}

lazy_static! {
    static ref DEFAULT_FACTORY: EventFactory = EventFactory::default();
}

/// Wrap `event` in its typed view using the built-in table
pub fn categorize(event: InputEvent) -> Event {
    DEFAULT_FACTORY.categorize(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecodes::{EV_LED, EV_MSC, KEY_P, LED_CAPSL, MSC_SCAN, REL_X, SYN_REPORT};

    #[test]
    fn test_timestamp() {
        let ev = InputEvent {
            sec: 12,
            usec: 250_000,
            type_: EV_KEY,
            code: KEY_P,
            value: 1,
        };
        assert_eq!(ev.timestamp(), 12.25);
    }

    #[test]
    fn test_decode_passes_unknown_values_through() {
        let ev = InputEvent {
            sec: 1,
            usec: 2,
            type_: 0x7ff,
            code: 0xfff0,
            value: -5,
        };
        let bytes = ev.to_bytes();
        assert_eq!(bytes.len(), size_of::<sys::input_event>());
        assert_eq!(InputEvent::from_bytes(&bytes), Some(ev));
        assert_eq!(InputEvent::from_bytes(&bytes[1..]), None);
    }

    #[test]
    fn test_categorize_builtin() {
        assert!(matches!(categorize(InputEvent::new(EV_KEY, KEY_P, 1)), Event::Key(_)));
        assert!(matches!(categorize(InputEvent::new(EV_REL, REL_X, -3)), Event::Rel(_)));
        assert!(matches!(categorize(InputEvent::new(EV_SYN, SYN_REPORT, 0)), Event::Syn(_)));
        let msc = InputEvent::new(EV_MSC, MSC_SCAN, 0x70013);
        assert_eq!(categorize(msc), Event::Raw(msc));
    }

    #[test]
    fn test_factory_is_extensible() {
        let mut factory = EventFactory::default();
        let led = InputEvent::new(EV_LED, LED_CAPSL, 1);
        assert!(matches!(factory.categorize(led), Event::Raw(_)));

        factory.register(EV_LED, |ev| Event::Key(KeyEvent::new(ev)));
        assert!(matches!(factory.categorize(led), Event::Key(_)));

        factory.unregister(EV_KEY);
        let key = InputEvent::new(EV_KEY, KEY_P, 0);
        assert_eq!(factory.categorize(key), Event::Raw(key));
    }

    #[test]
    fn test_shared_table_ignores_local_factories() {
        let mut local = EventFactory::default();
        local.unregister(EV_KEY);
        local.register(EV_MSC, |ev| Event::Syn(SynEvent::new(ev)));

        let key = InputEvent::new(EV_KEY, KEY_P, 1);
        let msc = InputEvent::new(EV_MSC, MSC_SCAN, 4);
        assert!(matches!(categorize(key), Event::Key(_)));
        assert_eq!(categorize(msc), Event::Raw(msc));
        assert_eq!(DEFAULT_FACTORY.constructors.len(), 4);
    }

    #[test]
    fn test_key_event_names() {
        let ev = KeyEvent::new(InputEvent {
            sec: 1,
            usec: 0,
            type_: EV_KEY,
            code: KEY_P,
            value: 1,
        });
        assert_eq!(ev.keystate(), Some(KeyState::Down));
        assert_eq!(ev.keycode(), "KEY_P");
        assert_eq!(ev.to_string(), "key event at 1.000000, 25 (KEY_P), down");

        let unknown = KeyEvent::new(InputEvent::new(EV_KEY, 0x2fe, 7));
        assert_eq!(unknown.keycode(), "0x2fe");
        assert_eq!(unknown.keystate(), None);
        assert!(!ecodes::registry().keys().contains_key(&0x2fe));
    }

    #[test]
    fn test_event_variant_exposes_canonical_fields() {
        let raw = InputEvent::new(EV_KEY, KEY_P, 2);
        let wrapped: Event = KeyEvent::new(raw).into();
        assert_eq!(wrapped.input_event(), raw);
        assert_eq!(Event::from(raw).input_event(), raw);
    }
}
