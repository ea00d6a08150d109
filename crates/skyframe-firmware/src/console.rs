use anyhow::Result;
use esp_idf_svc::nvs::{EspNvs, NvsDefault};
use log::{info, warn};
use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::Config;
use crate::debug_flags;

pub type SharedNvs = Arc<Mutex<EspNvs<NvsDefault>>>;
pub type SharedConfig = Arc<Mutex<Config>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn spawn_console(nvs: SharedNvs, config: SharedConfig) -> Result<()> {
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(8192)
        .spawn(move || {
            info!("console: ready (type 'help')");
            let stdin = io::stdin();
            let mut reader = stdin.lock();
            let mut line = String::new();
            let mut buf = [0u8; 1];
            let mut in_escape = false;
            loop {
                match reader.read(&mut buf) {
                    Ok(1) => {
                        let ch = buf[0];
                        if in_escape {
                            if (ch as char).is_ascii_alphabetic() || ch == b'~' {
                                in_escape = false;
                            }
                            continue;
                        }
                        if ch == 0x1b {
                            in_escape = true;
                            continue;
                        }
                        if ch == b'\n' || ch == b'\r' {
                            if line.is_empty() {
                                continue;
                            }
                            info!("> {}", line);
                            if let Err(e) = process_line(&line, &nvs, &config) {
                                warn!("console: error: {}", e);
                            }
                            line.clear();
                        } else if ch == 0x7f || ch == 0x08 {
                            line.pop();
                        } else if ch >= 0x20 {
                            line.push(ch as char);
                        }
                    }
                    Ok(_) => std::thread::sleep(std::time::Duration::from_millis(50)),
                    Err(_) => std::thread::sleep(std::time::Duration::from_millis(100)),
                }
            }
        })?;
    Ok(())
}

fn process_line(line: &str, nvs: &SharedNvs, config: &SharedConfig) -> Result<()> {
    let clean = line.trim();
    if clean.is_empty() {
        return Ok(());
    }
    let mut parts = clean.splitn(3, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let sub = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match cmd {
        "help" | "?" => print_help(),
        "wifi" => handle_wifi(sub, rest, nvs, config)?,
        "server" => handle_server(sub, rest, nvs, config)?,
        "quality" => handle_quality(sub, rest, nvs, config)?,
        "refresh" => handle_refresh(sub, rest, nvs, config)?,
        "fetch" => {
            debug_flags::set(&debug_flags::REQUEST_REFETCH, true);
            info!("fetch: requested (runs on next tick in image view)");
        }
        "debug" => handle_debug(sub),
        "show" | "status" => show(config),
        "reboot" => {
            info!("console: rebooting now");
            std::thread::sleep(std::time::Duration::from_millis(100));
            unsafe { esp_idf_sys::esp_restart() };
        }
        _ => warn!("console: unknown command '{}' (type 'help')", cmd),
    }
    Ok(())
}

fn print_help() {
    info!("commands:");
    info!("  wifi show                  - show Wi-Fi config");
    info!("  wifi set <ssid> <pass>     - set Wi-Fi credentials");
    info!("  wifi clear                 - forget stored credentials");
    info!("  server show|set <url>      - camera server base URL");
    info!("  quality set <1-100>        - requested JPEG quality");
    info!("  refresh set <seconds>      - image refresh interval");
    info!("  fetch                      - fetch the image now");
    info!("  debug <module>             - toggle debug for module");
    info!("    modules: touch, fetch, wifi, all");
    info!("  debug show                 - show debug flag status");
    info!("  show                       - show settings and system status");
    info!("  reboot                     - reboot device");
}

fn show(config: &SharedConfig) {
    let cfg = lock(config);
    info!("wifi: {}", if cfg.wifi_ssid.is_empty() { "not configured" } else { &cfg.wifi_ssid });
    info!("server: {}", cfg.server_url);
    info!("quality: {}", cfg.quality);
    info!("refresh: {} s", cfg.refresh_s);
    let heap_kb = unsafe { esp_idf_sys::esp_get_free_heap_size() } / 1024;
    let psram_kb = unsafe {
        esp_idf_sys::heap_caps_get_free_size(esp_idf_sys::MALLOC_CAP_SPIRAM)
    } / 1024;
    info!("free heap: {} KB (psram {} KB)", heap_kb, psram_kb);
    info!("debug: {}", debug_flags::status_line());
}

fn handle_debug(sub: &str) {
    match sub {
        "show" | "" => info!("debug: {}", debug_flags::status_line()),
        "all" => {
            let on = debug_flags::toggle_all();
            info!("debug all: {}", if on { "ON" } else { "OFF" });
        }
        name => match debug_flags::by_name(name) {
            Some(flag) => {
                let on = debug_flags::toggle(flag);
                info!("debug {}: {}", name, if on { "ON" } else { "OFF" });
            }
            None => info!("unknown module '{}'. options: touch, fetch, wifi, all", name),
        },
    }
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('"').trim_matches('\'')
}

fn handle_wifi(sub: &str, rest: &str, nvs: &SharedNvs, config: &SharedConfig) -> Result<()> {
    match sub {
        "show" | "" => {
            let cfg = lock(config);
            info!("wifi ssid: {}", cfg.wifi_ssid);
            let pass_len = cfg.wifi_pass.len();
            info!(
                "wifi pass: {} ({} chars)",
                if pass_len == 0 { "<empty>" } else { "********" },
                pass_len
            );
        }
        "set" => {
            let (ssid, pass) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let (ssid, pass) = (unquote(ssid), unquote(pass));
            if ssid.is_empty() {
                warn!("usage: wifi set <ssid> <password>");
                return Ok(());
            }
            Config::save_wifi(&mut lock(nvs), ssid, pass)?;
            let mut cfg = lock(config);
            cfg.wifi_ssid = ssid.to_string();
            cfg.wifi_pass = pass.to_string();
            info!("saved: SSID='{}' pass=******** ({} chars)", ssid, pass.len());
            info!("type 'reboot' to apply");
        }
        "clear" => {
            Config::clear_wifi(&mut lock(nvs))?;
            info!("Wi-Fi credentials cleared; build defaults apply after reboot");
        }
        _ => info!("usage: wifi show|set <ssid> <pass>|clear"),
    }
    Ok(())
}

fn handle_server(sub: &str, rest: &str, nvs: &SharedNvs, config: &SharedConfig) -> Result<()> {
    match sub {
        "show" | "" => info!("server: {}", lock(config).server_url),
        "set" => {
            let url = unquote(rest).trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                warn!("usage: server set http://<host>:<port>");
                return Ok(());
            }
            Config::save_server_url(&mut lock(nvs), url)?;
            lock(config).server_url = url.to_string();
            info!("saved: server='{}'", url);
            info!("type 'reboot' to apply");
        }
        _ => info!("usage: server show|set <url>"),
    }
    Ok(())
}

fn handle_quality(sub: &str, rest: &str, nvs: &SharedNvs, config: &SharedConfig) -> Result<()> {
    if sub != "set" {
        info!("quality: {}", lock(config).quality);
        return Ok(());
    }
    match rest.parse::<u8>() {
        Ok(q) if (1..=100).contains(&q) => {
            Config::save_quality(&mut lock(nvs), q)?;
            lock(config).quality = q;
            info!("saved: quality={} (type 'reboot' to apply)", q);
        }
        _ => warn!("usage: quality set <1-100>"),
    }
    Ok(())
}

fn handle_refresh(sub: &str, rest: &str, nvs: &SharedNvs, config: &SharedConfig) -> Result<()> {
    if sub != "set" {
        info!("refresh: {} s", lock(config).refresh_s);
        return Ok(());
    }
    match rest.parse::<u32>() {
        Ok(s) if s >= 5 => {
            Config::save_refresh(&mut lock(nvs), s)?;
            lock(config).refresh_s = s;
            info!("saved: refresh={} s (type 'reboot' to apply)", s);
        }
        _ => warn!("usage: refresh set <seconds, at least 5>"),
    }
    Ok(())
}
