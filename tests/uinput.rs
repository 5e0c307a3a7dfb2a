//! Exercises a real virtual device. Every test returns early when `/dev/uinput` is
//! not writable or the created device's event node cannot be found.

use evdevio::ecodes::{
    ABS_X, ABS_Y, EV_ABS, EV_FF, EV_KEY, EV_REL, EV_SYN, FF_RUMBLE, KEY_A, KEY_P, REL_X,
    SYN_REPORT,
};
use evdevio::*;
use std::path::Path;

fn uinput_available() -> bool {
    if !is_device(Path::new("/dev/uinput")) {
        eprintln!("/dev/uinput not writable, skipping");
        return false;
    }
    true
}

fn test_name(tag: &str) -> String {
    format!("evdevio-test-{}-{}", tag, std::process::id())
}

fn provision(tag: &str, builder: UInputBuilder) -> Option<UInput> {
    if !uinput_available() {
        return None;
    }
    let ui = builder.name(test_name(tag)).build().expect("provisioning failed");
    match ui.device() {
        Ok(_) => Some(ui),
        Err(e) => {
            eprintln!("{}, skipping", e);
            None
        }
    }
}

fn virtual_device(tag: &str, events: Capabilities) -> Option<UInput> {
    provision(tag, UInput::builder().events(events))
}

fn keys() -> Capabilities {
    [(EV_KEY, vec![KEY_A, KEY_P])].into_iter().collect()
}

fn axes() -> Capabilities {
    let mut caps = Capabilities::new();
    caps.insert(EV_KEY, KEY_A);
    caps.insert(EV_ABS, CodeEntry::Abs(ABS_X, AbsInfo::from_partial(&[0, 0, 255])));
    caps.insert(EV_ABS, CodeEntry::Abs(ABS_Y, AbsInfo::from_partial(&[0, -127, 127, 2, 4])));
    caps
}

#[test]
fn injected_key_reaches_companion_device() {
    let Some(ui) = virtual_device("key", keys()) else {
        return;
    };
    assert_eq!(ui.state(), UInputState::Ready);

    let device = ui.device().unwrap();
    ui.write(EV_KEY, KEY_P, 1).unwrap();
    ui.syn().unwrap();
    assert!(device.active_keys().unwrap().contains(&KEY_P));
    ui.write_event(KeyEvent::new(InputEvent::new(EV_KEY, KEY_P, 0))).unwrap();
    ui.syn().unwrap();

    let events: Vec<_> = device
        .read_loop()
        .take(4)
        .map(|ev| ev.map(|ev| (ev.type_, ev.code, ev.value)).unwrap())
        .collect();
    assert_eq!(
        events,
        vec![
            (EV_KEY, KEY_P, 1),
            (EV_SYN, SYN_REPORT, 0),
            (EV_KEY, KEY_P, 0),
            (EV_SYN, SYN_REPORT, 0),
        ]
    );
    assert!(device.active_keys().unwrap().is_empty());
}

#[test]
fn declared_capabilities_are_reported() {
    let Some(ui) = virtual_device("caps", axes()) else {
        return;
    };

    let caps = ui.capabilities(true).unwrap();
    assert!(caps.contains(EV_KEY, KEY_A));
    let abs = caps.get(EV_ABS).unwrap();
    assert!(abs.contains(&CodeEntry::Abs(ABS_X, AbsInfo::from_partial(&[0, 0, 255]))));

    let bare = ui.capabilities(false).unwrap();
    assert_eq!(bare.get(EV_ABS).unwrap(), &[CodeEntry::Code(ABS_X), CodeEntry::Code(ABS_Y)]);
}

#[test]
fn partial_absinfo_update_keeps_other_fields() {
    let Some(ui) = virtual_device("abs", axes()) else {
        return;
    };
    let device = ui.device().unwrap();

    let merged = device
        .set_absinfo(
            ABS_Y,
            AbsInfoUpdate {
                max: Some(1000),
                fuzz: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(merged.to_array(), [0, -127, 1000, 2, 4, 0]);
    assert_eq!(device.absinfo(ABS_Y).unwrap(), merged);

    device.set_absinfo_exact(ABS_Y, AbsInfo::from_partial(&[0, -10, 10])).unwrap();
    assert_eq!(device.absinfo(ABS_Y).unwrap().to_array(), [0, -10, 10, 0, 0, 0]);
}

#[test]
fn grab_is_exclusive() {
    let Some(ui) = virtual_device("grab", keys()) else {
        return;
    };
    let device = ui.device().unwrap();

    device.grab().unwrap();
    assert!(matches!(device.grab(), Err(Error::Busy)));
    device.ungrab().unwrap();
    assert!(matches!(device.ungrab(), Err(Error::InvalidArgument)));

    {
        let _grab = device.grab_scoped().unwrap();
        assert!(matches!(device.grab(), Err(Error::Busy)));
    }
    device.grab().unwrap();
    device.ungrab().unwrap();
}

#[test]
fn close_is_idempotent() {
    let Some(mut ui) = virtual_device("close", keys()) else {
        return;
    };
    ui.close().unwrap();
    assert_eq!(ui.state(), UInputState::Closed);
    ui.close().unwrap();
    assert!(matches!(ui.device(), Err(Error::Closed)));
    assert!(matches!(ui.write(EV_KEY, KEY_A, 1), Err(Error::Closed)));
}

#[test]
fn cloned_device_has_same_capabilities() {
    let Some(source) = virtual_device("source", axes()) else {
        return;
    };
    let clone = UInput::from_devices([source.device().unwrap()], None)
        .name(test_name("clone"))
        .build()
        .expect("cloning failed");

    let clone_caps = clone.capabilities(true).expect("clone node unresolved");
    let source_caps = source.capabilities(true).unwrap();
    assert_eq!(clone_caps.codes(EV_KEY), source_caps.codes(EV_KEY));
    assert_eq!(clone_caps.get(EV_ABS), source_caps.get(EV_ABS));
    assert_eq!(
        clone_caps.get(EV_ABS).unwrap()[1].absinfo(),
        Some(&AbsInfo::from_partial(&[0, -127, 127, 2, 4]))
    );
}

#[test]
fn clone_of_two_devices_unions_types() {
    let mut pad = axes();
    pad.insert(EV_FF, FF_RUMBLE);
    let Some(first) = provision("union-a", UInput::builder().events(pad).max_effects(8)) else {
        return;
    };

    let mut mouse: Capabilities = [(EV_KEY, vec![KEY_P, KEY_A]), (EV_REL, vec![REL_X])]
        .into_iter()
        .collect();
    mouse.insert(EV_FF, FF_RUMBLE);
    let Some(second) = provision("union-b", UInput::builder().events(mouse).max_effects(4)) else {
        return;
    };
    assert_eq!(first.device().unwrap().ff_effects_count(), 8);
    assert_eq!(second.device().unwrap().ff_effects_count(), 4);

    let sources = [first.device().unwrap(), second.device().unwrap()];
    let clone = UInput::from_devices(sources, Some(&[EV_SYN][..]))
        .name(test_name("union"))
        .build()
        .expect("cloning failed");
    let device = clone.device().expect("clone node unresolved");

    let caps = device.capabilities(false);
    let mut keys = caps.codes(EV_KEY);
    keys.sort_unstable();
    assert_eq!(keys, vec![KEY_P, KEY_A]);
    assert_eq!(caps.codes(EV_ABS), vec![ABS_X, ABS_Y]);
    assert_eq!(caps.codes(EV_REL), vec![REL_X]);
    assert!(caps.contains(EV_FF, FF_RUMBLE));
    assert_eq!(device.ff_effects_count(), 4);

    // Force feedback is left out unless asked for
    let plain = UInput::from_devices(sources, None)
        .name(test_name("union-plain"))
        .build()
        .expect("cloning failed");
    let plain_caps = plain.capabilities(false).expect("clone node unresolved");
    assert!(plain_caps.get(EV_FF).is_none());
    assert_eq!(plain_caps.codes(EV_REL), vec![REL_X]);
}

#[test]
fn unfound_node_leaves_device_created() {
    if !uinput_available() {
        return;
    }
    let scratch = std::env::temp_dir().join(test_name("empty"));
    let input_dir = scratch.join("input");
    let sysfs_dir = scratch.join("sys");
    std::fs::create_dir_all(&input_dir).unwrap();
    std::fs::create_dir_all(&sysfs_dir).unwrap();

    let config = Config {
        input_dir,
        sysfs_dir,
        discovery_attempts: 1,
        ..Config::default()
    };
    let mut ui = UInput::builder()
        .name(test_name("unresolved"))
        .events(keys())
        .config(config)
        .build()
        .expect("creation itself should succeed");

    assert_eq!(ui.state(), UInputState::Created);
    assert!(matches!(ui.device(), Err(Error::Unresolved { .. })));
    assert!(matches!(ui.resolve_device(), Err(Error::Unresolved { .. })));
    assert!(matches!(ui.capabilities(true), Err(Error::Unresolved { .. })));
    // The kernel device exists, so injection still works
    ui.write(EV_KEY, KEY_A, 1).unwrap();
    ui.syn().unwrap();

    ui.close().unwrap();
    assert_eq!(ui.state(), UInputState::Closed);
    ui.close().unwrap();
    std::fs::remove_dir_all(&scratch).unwrap();
}
