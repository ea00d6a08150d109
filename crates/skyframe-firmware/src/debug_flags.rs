use std::sync::atomic::{AtomicBool, Ordering};

/// Global debug flags toggled via console.
/// When a flag is true, the module logs at info! level instead of staying quiet.
pub static DEBUG_TOUCH: AtomicBool = AtomicBool::new(false);
pub static DEBUG_FETCH: AtomicBool = AtomicBool::new(false);
pub static DEBUG_WIFI: AtomicBool = AtomicBool::new(false);

/// Console asks the main loop to fetch the image on its next tick.
pub static REQUEST_REFETCH: AtomicBool = AtomicBool::new(false);

static ALL: [(&str, &AtomicBool); 3] = [
    ("touch", &DEBUG_TOUCH),
    ("fetch", &DEBUG_FETCH),
    ("wifi", &DEBUG_WIFI),
];

pub fn is_on(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Relaxed)
}

pub fn set(flag: &AtomicBool, val: bool) {
    flag.store(val, Ordering::Relaxed);
}

pub fn toggle(flag: &AtomicBool) -> bool {
    !flag.fetch_xor(true, Ordering::Relaxed)
}

pub fn by_name(name: &str) -> Option<&'static AtomicBool> {
    ALL.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

/// Flip every flag on if any is off, otherwise all off.
pub fn toggle_all() -> bool {
    let any_off = ALL.iter().any(|(_, f)| !is_on(f));
    for (_, f) in ALL.iter() {
        set(f, any_off);
    }
    any_off
}

pub fn status_line() -> String {
    ALL.iter()
        .map(|(n, f)| format!("{}={}", n, if is_on(f) { "ON" } else { "off" }))
        .collect::<Vec<_>>()
        .join(" ")
}
