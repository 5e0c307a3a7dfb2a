use evdevio::ecodes::{
    ABS_X, BTN_LEFT, BTN_MOUSE, EV_ABS, EV_KEY, EV_REL, EV_SYN, KEY_A, KEY_P, REL_WHEEL,
    SYN_REPORT,
};
use evdevio::*;

#[test]
fn names_resolve_through_public_registry() {
    let reg = registry();
    assert_eq!(reg.value("KEY_A"), Some(KEY_A));
    assert_eq!(reg.type_name(EV_KEY), Some("EV_KEY"));
    assert_eq!(reg.code_name(EV_REL, REL_WHEEL), Some("REL_WHEEL"));
    // BTN_MOUSE and BTN_LEFT share a value; the first declared name prints
    assert_eq!(BTN_MOUSE, BTN_LEFT);
    assert_eq!(reg.code_name(EV_KEY, BTN_LEFT), Some("BTN_MOUSE"));
    assert_eq!(reg.value("BTN_LEFT"), Some(BTN_LEFT));
    assert_eq!(reg.code_name(EV_KEY, 0x2ff), None);
}

#[test]
fn verbose_capabilities_mark_unknowns() {
    let mut caps = Capabilities::new();
    caps.extend(EV_KEY, [KEY_P, 0x2ffu16]);
    caps.insert(EV_ABS, CodeEntry::Abs(ABS_X, AbsInfo::from_partial(&[5, 0, 255])));
    caps.enable_type(0x1e);

    let resolved = caps.resolve(registry(), "?");
    let names: Vec<(&str, Vec<&str>)> = resolved
        .iter()
        .map(|ty| {
            let codes = ty
                .codes
                .iter()
                .map(|entry| match entry {
                    ResolvedEntry::Code(named) | ResolvedEntry::Abs(named, _) => named.name.as_str(),
                })
                .collect();
            (ty.ev_type.name.as_str(), codes)
        })
        .collect();
    assert_eq!(
        names,
        vec![
            ("EV_KEY", vec!["KEY_P", "?"]),
            ("EV_ABS", vec!["ABS_X"]),
            ("?", vec![]),
        ]
    );
    match &resolved[1].codes[0] {
        ResolvedEntry::Abs(_, info) => assert_eq!(info.value, 5),
        other => panic!("expected absinfo, got {:?}", other),
    }
}

#[test]
fn capabilities_serialize_by_type() {
    let caps: Capabilities = [(EV_KEY, vec![KEY_A])].into_iter().collect();
    let json = serde_json::to_string(&caps).unwrap();
    let back: Capabilities = serde_json::from_str(&json).unwrap();
    assert_eq!(back, caps);
}

#[test]
fn categorized_events_print_names() {
    let key = categorize(InputEvent {
        sec: 1,
        usec: 500,
        type_: EV_KEY,
        code: KEY_A,
        value: 1,
    });
    assert_eq!(key.to_string(), "key event at 1.000500, 30 (KEY_A), down");

    let syn = categorize(InputEvent::new(EV_SYN, SYN_REPORT, 0));
    assert!(matches!(syn, Event::Syn(_)));
    assert_eq!(syn.input_event().code, SYN_REPORT);
}

#[test]
fn regex_search_spans_types() {
    let found = find_ecodes_by_regex(registry(), "(KEY|REL)_WHEEL$").unwrap();
    assert_eq!(found.get(&EV_REL), Some(&vec![REL_WHEEL]));
    assert!(!found.contains_key(&EV_ABS));
}
