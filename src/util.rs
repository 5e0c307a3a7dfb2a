use crate::ecodes::{Family, Registry};
use lazy_static::lazy_static;
use nix::unistd::{AccessFlags, access};
use regex::Regex;
use std::collections::BTreeMap;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref EVENT_NODE: Regex = Regex::new(r"^event([0-9]+)$").unwrap();
}

/// Number `N` of an `event<N>` node name
pub fn event_number(name: &str) -> Option<u32> {
    EVENT_NODE.captures(name)?.get(1)?.as_str().parse().ok()
}

/// Is `path` a character device this process can read and write
pub fn is_device(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    meta.file_type().is_char_device() && access(path, AccessFlags::R_OK | AccessFlags::W_OK).is_ok()
}

/// `event<N>` nodes under `input_dir` that [`is_device`] accepts, ordered by `N`
pub fn list_devices(input_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(input_dir) else {
        return Vec::new();
    };
    let mut found: Vec<(u32, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let n = event_number(entry.file_name().to_str()?)?;
            Some((n, entry.path()))
        })
        .filter(|(_, path)| is_device(path))
        .collect();
    found.sort();
    found.into_iter().map(|(_, path)| path).collect()
}

/// Codes whose names match `pattern` at their start, grouped by event type.
///
/// Aliases are searched too, so `KEY_ZOOM` finds the code that prints as
/// `KEY_FULL_SCREEN`. Codes outside every type's reverse map are skipped.
pub fn find_ecodes_by_regex(
    registry: &Registry,
    pattern: &str,
) -> Result<BTreeMap<u16, Vec<u16>>, regex::Error> {
    let re = Regex::new(&format!("^(?:{})", pattern))?;
    let mut found: BTreeMap<u16, Vec<u16>> = BTreeMap::new();
    for (&name, &value) in registry.ecodes() {
        if !re.is_match(name) {
            continue;
        }
        let Some(ev_type) = Family::of(name).and_then(Family::event_type) else {
            continue;
        };
        let known = registry
            .bytype(ev_type)
            .is_some_and(|map| map.contains_key(&value));
        if known {
            found.entry(ev_type).or_default().push(value);
        }
    }
    for codes in found.values_mut() {
        codes.sort_unstable();
        codes.dedup();
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecodes::{
        ABS_BRAKE, EV_ABS, EV_KEY, KEY_BREAK, KEY_ZOOM, KEY_ZOOMIN, KEY_ZOOMOUT, KEY_ZOOMRESET,
        registry,
    };

    #[test]
    fn test_event_number() {
        assert_eq!(event_number("event12"), Some(12));
        assert_eq!(event_number("event"), None);
        assert_eq!(event_number("mouse0"), None);
        assert_eq!(event_number("event3-old"), None);
    }

    #[test]
    fn test_find_by_prefix_includes_aliases() {
        let found = find_ecodes_by_regex(registry(), "KEY_ZOOM.*").unwrap();
        assert_eq!(
            found,
            BTreeMap::from([(EV_KEY, vec![KEY_ZOOM, KEY_ZOOMIN, KEY_ZOOMOUT, KEY_ZOOMRESET])])
        );
    }

    #[test]
    fn test_find_across_types() {
        let found = find_ecodes_by_regex(registry(), "(ABS|KEY)_BR(AKE|EAK)").unwrap();
        assert_eq!(
            found,
            BTreeMap::from([(EV_KEY, vec![KEY_BREAK]), (EV_ABS, vec![ABS_BRAKE])])
        );
    }

    #[test]
    fn test_find_skips_sentinels_and_bad_patterns() {
        let found = find_ecodes_by_regex(registry(), "KEY_(MAX|CNT)$").unwrap();
        assert!(found.is_empty());
        assert!(find_ecodes_by_regex(registry(), "KEY_(").is_err());
    }

    #[test]
    fn test_list_devices_missing_dir() {
        assert!(list_devices(Path::new("/nonexistent/input")).is_empty());
    }
}
