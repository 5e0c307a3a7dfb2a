use crate::ecodes::{EV_FF, EV_SYN, Family, Registry, ReverseMap};
use crate::sys;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event types left out when cloning capabilities from real devices.
pub const DEFAULT_FILTERED_TYPES: [u16; 2] = [EV_SYN, EV_FF];

/// Placeholder name for types and codes the registry does not know.
pub const UNKNOWN: &str = "?";

/// Calibration of one absolute axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbsInfo {
    pub value: i32,
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}
impl AbsInfo {
    /// Build from leading fields in `value, min, max, fuzz, flat, resolution` order;
    /// missing trailing fields are zero and extra ones are ignored
    pub fn from_partial(fields: &[i32]) -> Self {
        let mut all = [0i32; 6];
        let len = fields.len().min(6);
        all[..len].copy_from_slice(&fields[..len]);
        Self::from(all)
    }

    pub fn to_array(self) -> [i32; 6] {
        [self.value, self.min, self.max, self.fuzz, self.flat, self.resolution]
    }
}
impl From<[i32; 6]> for AbsInfo {
    fn from(f: [i32; 6]) -> Self {
        Self {
            value: f[0],
            min: f[1],
            max: f[2],
            fuzz: f[3],
            flat: f[4],
            resolution: f[5],
        }
    }
}
impl From<sys::input_absinfo> for AbsInfo {
    fn from(raw: sys::input_absinfo) -> Self {
        Self {
            value: raw.value,
            min: raw.minimum,
            max: raw.maximum,
            fuzz: raw.fuzz,
            flat: raw.flat,
            resolution: raw.resolution,
        }
    }
}
impl From<AbsInfo> for sys::input_absinfo {
    fn from(info: AbsInfo) -> Self {
        Self {
            value: info.value,
            minimum: info.min,
            maximum: info.max,
            fuzz: info.fuzz,
            flat: info.flat,
            resolution: info.resolution,
        }
    }
}

/// One supported code, with calibration for absolute axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeEntry {
    Code(u16),
    Abs(u16, AbsInfo),
}
impl CodeEntry {
    /// Absolute axis entry from leading calibration fields, zero-padded to six
    pub fn abs(code: u16, fields: &[i32]) -> Self {
        CodeEntry::Abs(code, AbsInfo::from_partial(fields))
    }

    pub fn code(&self) -> u16 {
        match *self {
            CodeEntry::Code(code) | CodeEntry::Abs(code, _) => code,
        }
    }

    pub fn absinfo(&self) -> Option<&AbsInfo> {
        match self {
            CodeEntry::Code(_) => None,
            CodeEntry::Abs(_, info) => Some(info),
        }
    }
}
impl From<u16> for CodeEntry {
    fn from(code: u16) -> Self {
        CodeEntry::Code(code)
    }
}
impl From<(u16, AbsInfo)> for CodeEntry {
    fn from((code, info): (u16, AbsInfo)) -> Self {
        CodeEntry::Abs(code, info)
    }
}

/// A name resolved through the registry, paired with the number it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Named {
    pub name: String,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolvedEntry {
    Code(Named),
    Abs(Named, AbsInfo),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedType {
    pub ev_type: Named,
    pub codes: Vec<ResolvedEntry>,
}

/// Resolve each code through `reverse`; codes it lacks are named `unknown`.
pub fn resolve_ecodes(reverse: Option<&ReverseMap>, codes: &[u16], unknown: &str) -> Vec<Named> {
    codes.iter().map(|&code| named(reverse, code, unknown)).collect()
}

fn named(reverse: Option<&ReverseMap>, value: u16, unknown: &str) -> Named {
    let name = reverse
        .and_then(|map| map.get(&value))
        .map_or(unknown, |name| *name);
    Named {
        name: name.to_string(),
        value,
    }
}

/// Event types a device supports, each with its ordered list of codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    types: BTreeMap<u16, Vec<CodeEntry>>,
}
impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `ev_type` without adding codes to it
    pub fn enable_type(&mut self, ev_type: u16) {
        self.types.entry(ev_type).or_default();
    }

    pub fn insert(&mut self, ev_type: u16, entry: impl Into<CodeEntry>) {
        self.types.entry(ev_type).or_default().push(entry.into());
    }

    pub fn extend<E: Into<CodeEntry>>(&mut self, ev_type: u16, entries: impl IntoIterator<Item = E>) {
        let codes = self.types.entry(ev_type).or_default();
        codes.extend(entries.into_iter().map(Into::into));
    }

    pub fn get(&self, ev_type: u16) -> Option<&[CodeEntry]> {
        self.types.get(&ev_type).map(Vec::as_slice)
    }

    pub fn contains(&self, ev_type: u16, code: u16) -> bool {
        self.get(ev_type)
            .is_some_and(|codes| codes.iter().any(|entry| entry.code() == code))
    }

    /// Bare codes of `ev_type`, calibration dropped
    pub fn codes(&self, ev_type: u16) -> Vec<u16> {
        self.get(ev_type)
            .map(|codes| codes.iter().map(CodeEntry::code).collect())
            .unwrap_or_default()
    }

    pub fn types(&self) -> impl Iterator<Item = u16> + '_ {
        self.types.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &[CodeEntry])> {
        self.types.iter().map(|(&ty, codes)| (ty, codes.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Copy with every absolute axis reduced to its bare code
    pub fn without_absinfo(&self) -> Self {
        let types = self
            .types
            .iter()
            .map(|(&ty, codes)| {
                let bare = codes.iter().map(|e| CodeEntry::Code(e.code())).collect();
                (ty, bare)
            })
            .collect();
        Self { types }
    }

    /// Verbose projection: every type and code paired with its registry name.
    ///
    /// Anything the registry cannot name is reported as `unknown`. The registry is
    /// only read.
    pub fn resolve(&self, registry: &Registry, unknown: &str) -> Vec<ResolvedType> {
        let types = registry.family(Family::Ev);
        self.types
            .iter()
            .map(|(&ty, codes)| {
                let reverse = registry.bytype(ty);
                let codes = codes
                    .iter()
                    .map(|entry| match *entry {
                        CodeEntry::Code(code) => ResolvedEntry::Code(named(reverse, code, unknown)),
                        CodeEntry::Abs(code, info) => {
                            ResolvedEntry::Abs(named(reverse, code, unknown), info)
                        }
                    })
                    .collect();
                ResolvedType {
                    ev_type: named(Some(types), ty, unknown),
                    codes,
                }
            })
            .collect()
    }

    /// Union of several capability sets, skipping `filtered` types.
    ///
    /// A code present in more than one source keeps the first entry seen.
    pub fn merge<'a>(sources: impl IntoIterator<Item = &'a Capabilities>, filtered: &[u16]) -> Self {
        let mut merged = Capabilities::new();
        for source in sources {
            for (ty, codes) in source.iter() {
                if filtered.contains(&ty) {
                    continue;
                }
                merged.enable_type(ty);
                for entry in codes {
                    if !merged.contains(ty, entry.code()) {
                        merged.insert(ty, *entry);
                    }
                }
            }
        }
        merged
    }

    /// `(type, code)` pairs to enable, in order
    pub(crate) fn enable_list(&self) -> Vec<(u16, u16)> {
        self.iter()
            .flat_map(|(ty, codes)| codes.iter().map(move |e| (ty, e.code())))
            .collect()
    }

    /// Absolute axes with their full six-field calibration
    pub(crate) fn abs_setup(&self) -> Vec<(u16, AbsInfo)> {
        self.types
            .values()
            .flatten()
            .filter_map(|entry| match *entry {
                CodeEntry::Abs(code, info) => Some((code, info)),
                CodeEntry::Code(_) => None,
            })
            .collect()
    }
}
impl<I, E> FromIterator<(u16, I)> for Capabilities
where
    I: IntoIterator<Item = E>,
    E: Into<CodeEntry>,
{
    fn from_iter<T: IntoIterator<Item = (u16, I)>>(iter: T) -> Self {
        let mut caps = Capabilities::new();
        for (ty, codes) in iter {
            caps.extend(ty, codes);
        }
        caps
    }
}
