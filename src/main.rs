#![no_std]
#![no_main]

use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_println::println;
use esp_wifi::wifi;

use embassy_net::{Config, Stack, StackResources};
use embassy_time::{Delay, Duration, Timer};
use esp_hal_embassy::Executor;
use static_cell::StaticCell;

use tally_light::acquisition::{AcquisitionStrategy, NetworkAcquisition};
use tally_light::config::{self, TallyConfig};
use tally_light::console::SerialConsole;
use tally_light::indicator::IndicatorPair;
use tally_light::session::{SessionSettings, TallySession};
use tally_light::tcp_client::TcpTransport;
use tally_light::wifi::WiFiManager;

esp_bootloader_esp_idf::esp_app_desc!();

static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static WIFI_MANAGER_CELL: StaticCell<WiFiManager<'static>> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
static TX_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

type Indicators = IndicatorPair<Output<'static>, Output<'static>>;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[MAIN] Panic: {}", info);
    loop {}
}

#[embassy_executor::task]
async fn net_task(
    mut runner: embassy_net::Runner<'static, esp_wifi::wifi::WifiDevice<'static>>,
) -> ! {
    runner.run().await
}

/// Acquire a server, then run the tally session forever
#[embassy_executor::task]
async fn tally_task(
    wifi_manager: &'static mut WiFiManager<'static>,
    stack: Stack<'static>,
    indicators: Indicators,
) {
    let mut console = SerialConsole;
    let mut delay = Delay;

    let settings = match TallyConfig::from_build_env() {
        Ok(settings) => settings,
        Err(e) => {
            // Nothing sensible to run without a valid configuration
            println!("[MAIN] {}, check the TALLY_* build settings", e);
            loop {
                Timer::after(Duration::from_secs(60)).await;
            }
        }
    };

    let mut acquisition = NetworkAcquisition::from_config(&settings);
    let endpoint = acquisition
        .acquire(wifi_manager, &mut delay, &mut console)
        .await;
    wifi_manager.print_dhcp_info();

    let transport = TcpTransport::new(
        stack,
        RX_BUFFER.init([0; 256]),
        TX_BUFFER.init([0; 64]),
        settings.timing.connect_timeout_ms,
    );
    let mut session = TallySession::new(
        transport,
        indicators,
        SessionSettings::from_config(&settings, endpoint),
    );
    session.run(&mut delay, &mut console).await
}

#[esp_hal::main]
fn main() -> ! {
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    // Initialize heap allocator for WiFi (72KB)
    esp_alloc::heap_allocator!(size: 72 * 1024);

    println!("[MAIN] Tally light {}", tally_light::VERSION);

    // Both lines dark before anything touches the network
    let preview = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());
    let program = Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default());
    let indicators = match IndicatorPair::new(preview, program) {
        Ok(indicators) => indicators,
        Err(e) => panic!("indicator setup failed: {}", e),
    };
    println!(
        "[MAIN] Preview on GPIO{}, program on GPIO{}",
        config::PREVIEW_PIN,
        config::PROGRAM_PIN
    );

    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let mut rng = Rng::new(peripherals.RNG);
    let seed = u64::from(rng.random()) << 32 | u64::from(rng.random());
    let wifi_init = match esp_wifi::init(timer_group1.timer0, rng, peripherals.RADIO_CLK) {
        Ok(wifi_init) => wifi_init,
        Err(e) => panic!("WiFi driver init failed: {:?}", e),
    };
    let wifi_init_ref = WIFI_INIT_CELL.init(wifi_init);
    println!("[WIFI] WiFi driver initialized successfully");

    let (wifi_controller, wifi_interfaces) = match wifi::new(wifi_init_ref, peripherals.WIFI) {
        Ok(parts) => parts,
        Err(e) => panic!("WiFi controller init failed: {:?}", e),
    };

    static STACK_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
    let stack_resources = STACK_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(
        wifi_interfaces.sta,
        Config::dhcpv4(Default::default()),
        stack_resources,
        seed,
    );
    println!("[WIFI] Embassy-net stack created with DHCP configuration");

    let wifi_manager = WIFI_MANAGER_CELL.init(WiFiManager::new(wifi_controller, stack));

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        println!("[MAIN] Spawning network task...");
        spawner.spawn(net_task(runner)).ok();

        println!("[MAIN] Spawning tally task...");
        if let Err(e) = spawner.spawn(tally_task(wifi_manager, stack, indicators)) {
            println!("[MAIN] Failed to spawn tally task: {:?}", e);
        }
    });
}
