//! Indicator wiring check
//!
//! Feeds a fixed sequence of state bytes through the decoder into the real
//! GPIO pins so the lamps can be checked by eye without a tally server.

#![no_std]
#![no_main]

use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_println::println;
use tally_light::config;
use tally_light::indicator::{IndicatorPair, TallyOutputs};
use tally_light::protocol::{OutputPair, TallyState};

esp_bootloader_esp_idf::esp_app_desc!();

/// Inactive, preview, program, an unknown code, program, inactive
const SEQUENCE: [u8; 6] = [0, 1, 2, 9, 2, 0];
const STEP_MS: u32 = 1500;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[TEST] Panic: {}", info);
    loop {}
}

#[esp_hal::main]
fn main() -> ! {
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    let delay = Delay::new();

    println!("=== Indicator test ===");
    println!(
        "Preview on GPIO{}, program on GPIO{}",
        config::PREVIEW_PIN,
        config::PROGRAM_PIN
    );

    let preview = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());
    let program = Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default());
    let mut indicators = match IndicatorPair::new(preview, program) {
        Ok(indicators) => indicators,
        Err(e) => panic!("indicator setup failed: {}", e),
    };

    let mut current = OutputPair::OFF;
    loop {
        for byte in SEQUENCE {
            match TallyState::decode(byte) {
                Some(state) => {
                    current = OutputPair::for_state(state, true);
                    println!(
                        "[TEST] {} ({:?}): preview={} program={}",
                        byte, state, current.preview, current.program
                    );
                    if let Err(e) = indicators.set_pair(current) {
                        println!("[TEST] Output failed: {}", e);
                    }
                }
                None => println!(
                    "[TEST] {} (unknown): lines stay preview={} program={}",
                    byte, current.preview, current.program
                ),
            }
            delay.delay_millis(STEP_MS);
        }
    }
}
