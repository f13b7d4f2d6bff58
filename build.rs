use std::env;

/// Compile-time settings exported to the firmware, with their defaults.
const TALLY_SETTINGS: &[(&str, &str)] = &[
    ("TALLY_MODE", ""),
    ("TALLY_SERVER_IP", "192.168.77.30"),
    ("TALLY_SERVER_HOST", "tally-server"),
    ("TALLY_PORT", "7411"),
    ("TALLY_CHANNEL", "3"),
    ("TALLY_USE_PREVIEW", "true"),
    ("TALLY_DISCOVERY_EXHAUSTED", "rescan"),
];

fn main() {
    // Load .env file for WiFi and tally server configuration
    load_env_config();

    // Linker scripts only make sense for the ESP32-C3 image; host test builds skip them.
    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("riscv32") {
        linker_be_nice();
        // make sure linkall.x is the last linker script (otherwise might cause problems with flip-link)
        println!("cargo:rustc-link-arg=-Tlinkall.x");
    }
}

/// Load environment configuration from .env file
/// Environment variables take priority over .env file values
fn load_env_config() {
    use std::path::Path;

    // Tell cargo to rerun this build script if .env file changes
    println!("cargo:rerun-if-changed=.env");

    // Tell cargo to rerun if environment variables change
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASSWORD");
    for (name, _) in TALLY_SETTINGS {
        println!("cargo:rerun-if-env-changed={}", name);
    }

    // Try to load .env file if it exists
    if Path::new(".env").exists() {
        match dotenvy::dotenv() {
            Ok(_) => println!("cargo:warning=Loaded .env file"),
            Err(e) => println!("cargo:warning=Failed to load .env file: {}", e),
        }
    }

    // Note: We need to handle the case where env vars are set to empty strings
    let wifi_ssid = read_trimmed("WIFI_SSID", "");
    let wifi_password = read_trimmed("WIFI_PASSWORD", "");

    println!("cargo:rustc-env=WIFI_SSID={}", wifi_ssid);
    println!("cargo:rustc-env=WIFI_PASSWORD={}", wifi_password);

    for (name, default) in TALLY_SETTINGS {
        let value = read_trimmed(name, default);
        println!("cargo:rustc-env={}={}", name, value);
    }

    if wifi_ssid.is_empty() {
        println!("cargo:warning=WIFI_SSID is empty - tally light will scan for open networks");
    } else {
        println!("cargo:warning=WIFI_SSID configured: {}", wifi_ssid);
    }

    if !wifi_password.is_empty() {
        println!("cargo:warning=WIFI_PASSWORD configured (length: {})", wifi_password.len());
    }
}

fn read_trimmed(name: &str, default: &str) -> String {
    let value = env::var(name).unwrap_or_default().trim().to_string();
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        let kind = &args[1];
        let what = &args[2];

        match kind.as_str() {
            "undefined-symbol" => match what.as_str() {
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                "esp_wifi_preempt_enable"
                | "esp_wifi_preempt_yield_task"
                | "esp_wifi_preempt_task_create" => {
                    eprintln!();
                    eprintln!("💡 `esp-wifi` has no scheduler enabled. Make sure you have the `builtin-scheduler` feature enabled, or that you provide an external scheduler.");
                    eprintln!();
                }
                "_embassy_time_now" | "_embassy_time_schedule_wake" => {
                    eprintln!();
                    eprintln!("💡 No embassy time driver linked - `esp_hal_embassy::init` must run before any timer is used.");
                    eprintln!();
                }
                _ => (),
            },
            // we don't have anything helpful for "missing-lib" yet
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    println!(
        "cargo:rustc-link-arg=--error-handling-script={}",
        std::env::current_exe().unwrap().display()
    );
}
