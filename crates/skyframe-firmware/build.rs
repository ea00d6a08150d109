fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=wifi.local.rs");
    emit_local_defaults_from_wifi_local();
    embuild::espidf::sysenv::output();
}

/// Seed compile-time defaults from an untracked `wifi.local.rs`, e.g.
/// `pub const SERVER_URL: &str = "http://10.0.0.5:5000";`
fn emit_local_defaults_from_wifi_local() {
    let Ok(src) = std::fs::read_to_string("wifi.local.rs") else {
        return;
    };

    for (name, env) in [
        ("WIFI_SSID", "LOCAL_WIFI_SSID"),
        ("WIFI_PASS", "LOCAL_WIFI_PASS"),
        ("SERVER_URL", "LOCAL_SERVER_URL"),
    ] {
        if let Some(v) = extract_rust_str_const(&src, name) {
            println!("cargo:rustc-env={}={}", env, v);
        }
    }
}

fn extract_rust_str_const(src: &str, name: &str) -> Option<String> {
    let needle = format!("pub const {}:", name);
    src.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("//"))
        .find(|line| line.starts_with(&needle))
        .and_then(|line| {
            let start = line.find('"')? + 1;
            let end = line[start..].find('"')? + start;
            Some(line[start..end].to_string())
        })
}
