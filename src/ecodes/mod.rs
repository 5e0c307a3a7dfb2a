//! Event type and code constants, and the name <-> number registry built from them.
//!
//! Every constant from the kernel headers is available as a `u16` (`ecodes::KEY_A`,
//! `ecodes::EV_ABS`, ...). [`registry()`] returns the process-wide [`Registry`], which
//! maps names to numbers and, per family, numbers back to a single preferred name.

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::BTreeMap;

macro_rules! ecodes {
    ($($name:ident = $value:expr,)*) => {
        $(pub const $name: u16 = $value;)*

        /// All constants in header order.
        pub static CONSTANTS: &[(&str, u16)] = &[$((stringify!($name), $name),)*];
    };
}

mod table;

pub use table::*;

/// `EV_VERSION` does not fit in a code, so it lives outside the table.
pub const EV_VERSION: u32 = 0x010001;

/// Number to name map for one family.
pub type ReverseMap = BTreeMap<u16, &'static str>;

/// Constant families, in the order a name is tested against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Family {
    Key,
    Abs,
    Rel,
    Sw,
    Msc,
    Led,
    Btn,
    Rep,
    Snd,
    Id,
    Ev,
    Bus,
    Syn,
    FfStatus,
    Ff,
    InputProp,
    UiFf,
}
impl Family {
    pub const ALL: [Family; 17] = [
        Family::Key,
        Family::Abs,
        Family::Rel,
        Family::Sw,
        Family::Msc,
        Family::Led,
        Family::Btn,
        Family::Rep,
        Family::Snd,
        Family::Id,
        Family::Ev,
        Family::Bus,
        Family::Syn,
        Family::FfStatus,
        Family::Ff,
        Family::InputProp,
        Family::UiFf,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Family::Key => "KEY",
            Family::Abs => "ABS",
            Family::Rel => "REL",
            Family::Sw => "SW",
            Family::Msc => "MSC",
            Family::Led => "LED",
            Family::Btn => "BTN",
            Family::Rep => "REP",
            Family::Snd => "SND",
            Family::Id => "ID",
            Family::Ev => "EV",
            Family::Bus => "BUS",
            Family::Syn => "SYN",
            Family::FfStatus => "FF_STATUS",
            Family::Ff => "FF",
            Family::InputProp => "INPUT_PROP",
            Family::UiFf => "UI_FF",
        }
    }

    /// First family whose prefix (followed by `_`) starts `name`
    pub fn of(name: &str) -> Option<Family> {
        Family::ALL.into_iter().find(|family| {
            name.strip_prefix(family.prefix())
                .is_some_and(|rest| rest.starts_with('_'))
        })
    }

    /// Event type whose codes this family names
    pub fn event_type(self) -> Option<u16> {
        match self {
            Family::Key | Family::Btn => Some(EV_KEY),
            Family::Abs => Some(EV_ABS),
            Family::Rel => Some(EV_REL),
            Family::Sw => Some(EV_SW),
            Family::Msc => Some(EV_MSC),
            Family::Led => Some(EV_LED),
            Family::Rep => Some(EV_REP),
            Family::Snd => Some(EV_SND),
            Family::Syn => Some(EV_SYN),
            Family::Ff => Some(EV_FF),
            Family::FfStatus => Some(EV_FF_STATUS),
            _ => None,
        }
    }
}

/// Bidirectional name/number tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registry {
    ecodes: BTreeMap<&'static str, u16>,
    families: BTreeMap<Family, ReverseMap>,
    keys: ReverseMap,
    bytype: BTreeMap<u16, ReverseMap>,
}
impl Registry {
    /// Build the tables from `(name, value)` pairs. Earlier names win a shared value,
    /// except that a `_MIN`/`_MAX` name gives way to any later name.
    pub fn build(constants: &[(&'static str, u16)]) -> Self {
        let mut ecodes = BTreeMap::new();
        let mut families: BTreeMap<Family, ReverseMap> =
            Family::ALL.iter().map(|&f| (f, ReverseMap::new())).collect();

        for &(name, value) in constants {
            let Some(family) = Family::of(name) else {
                continue;
            };
            ecodes.insert(name, value);

            let reverse = families.entry(family).or_default();
            let replace = match reverse.get(&value) {
                None => true,
                Some(existing) => existing.ends_with("_MIN") || existing.ends_with("_MAX"),
            };
            if replace {
                reverse.insert(value, name);
            }
        }

        let mut keys = families[&Family::Btn].clone();
        keys.extend(&families[&Family::Key]);
        keys.remove(&KEY_MAX);
        keys.remove(&KEY_CNT);

        let mut bytype = BTreeMap::new();
        for family in Family::ALL {
            let Some(ev_type) = family.event_type() else {
                continue;
            };
            let map = match family {
                Family::Key | Family::Btn => keys.clone(),
                _ => families[&family].clone(),
            };
            bytype.insert(ev_type, map);
        }

        Self {
            ecodes,
            families,
            keys,
            bytype,
        }
    }

    /// Every known name and its value
    pub fn ecodes(&self) -> &BTreeMap<&'static str, u16> {
        &self.ecodes
    }

    pub fn value(&self, name: &str) -> Option<u16> {
        self.ecodes.get(name).copied()
    }

    pub fn family(&self, family: Family) -> &ReverseMap {
        &self.families[&family]
    }

    /// Union of the BTN and KEY maps without the `KEY_MAX`/`KEY_CNT` sentinels
    pub fn keys(&self) -> &ReverseMap {
        &self.keys
    }

    /// Reverse map for the codes of event type `ev_type`
    pub fn bytype(&self, ev_type: u16) -> Option<&ReverseMap> {
        self.bytype.get(&ev_type)
    }

    /// Name of an event type, e.g. `EV_KEY`
    pub fn type_name(&self, ev_type: u16) -> Option<&'static str> {
        self.families[&Family::Ev].get(&ev_type).copied()
    }

    /// Name of `code` within event type `ev_type`
    pub fn code_name(&self, ev_type: u16, code: u16) -> Option<&'static str> {
        self.bytype(ev_type)?.get(&code).copied()
    }
}

lazy_static! {
    static ref REGISTRY: Registry = Registry::build(CONSTANTS);
}

/// The registry built from the kernel header constants.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_reverse_maps_round_trip() {
        let reg = registry();
        for family in Family::ALL {
            for (&code, &name) in reg.family(family) {
                assert_eq!(reg.value(name), Some(code), "{} in {:?}", name, family);
                assert_eq!(Family::of(name), Some(family));
            }
        }
    }

    #[test]
    fn test_every_value_is_reachable() {
        let reg = registry();
        let from_families: BTreeSet<(Family, u16)> = Family::ALL
            .iter()
            .flat_map(|&f| reg.family(f).keys().map(move |&v| (f, v)))
            .collect();
        for (&name, &value) in reg.ecodes() {
            let family = Family::of(name).unwrap();
            assert!(from_families.contains(&(family, value)), "{}", name);
        }
    }

    #[test]
    fn test_ff_and_ff_status_are_disjoint() {
        let reg = registry();
        let ff: BTreeSet<_> = reg.family(Family::Ff).keys().collect();
        let status: BTreeSet<_> = reg.family(Family::FfStatus).keys().collect();
        assert!(ff.is_disjoint(&status));
        assert_eq!(reg.family(Family::FfStatus).get(&FF_STATUS_PLAYING), Some(&"FF_STATUS_PLAYING"));
        assert!(!reg.family(Family::Ff).values().any(|n| n.starts_with("FF_STATUS")));
    }

    #[test]
    fn test_keys_exclude_sentinels() {
        let reg = registry();
        assert_eq!(reg.family(Family::Key).get(&KEY_MAX), Some(&"KEY_MAX"));
        assert!(!reg.keys().contains_key(&KEY_MAX));
        assert!(!reg.keys().contains_key(&KEY_CNT));
        assert_eq!(reg.keys().get(&KEY_P), Some(&"KEY_P"));
        assert!(reg.keys().contains_key(&BTN_LEFT));
    }

    #[test]
    fn test_min_max_names_give_way() {
        let reg = Registry::build(&[
            ("FF_EFFECT_MIN", 0x50),
            ("FF_RUMBLE", 0x50),
            ("FF_PERIODIC", 0x51),
            ("FF_WAVEFORM_MAX", 0x51),
        ]);
        assert_eq!(reg.family(Family::Ff)[&0x50], "FF_RUMBLE");
        assert_eq!(reg.family(Family::Ff)[&0x51], "FF_PERIODIC");
        assert_eq!(reg.value("FF_EFFECT_MIN"), Some(0x50));
    }

    #[test]
    fn test_first_alias_wins() {
        let reg = registry();
        assert_eq!(reg.code_name(EV_KEY, KEY_MUTE), Some("KEY_MUTE"));
        assert_eq!(reg.code_name(EV_SW, SW_RFKILL_ALL), Some("SW_RFKILL_ALL"));
        assert_eq!(reg.code_name(EV_ABS, ABS_MT_SLOT), Some("ABS_MT_SLOT"));
    }

    #[test]
    fn test_bytype_dispatch() {
        let reg = registry();
        assert_eq!(reg.type_name(EV_KEY), Some("EV_KEY"));
        assert_eq!(reg.code_name(EV_SYN, SYN_REPORT), Some("SYN_REPORT"));
        assert_eq!(reg.code_name(EV_FF, FF_RUMBLE), Some("FF_RUMBLE"));
        assert_eq!(reg.code_name(EV_FF_STATUS, FF_STATUS_STOPPED), Some("FF_STATUS_STOPPED"));
        assert!(reg.bytype(EV_PWR).is_none());
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = serde_json::to_string(&Registry::build(CONSTANTS)).unwrap();
        let b = serde_json::to_string(&Registry::build(CONSTANTS)).unwrap();
        assert_eq!(a, b);
    }
}
