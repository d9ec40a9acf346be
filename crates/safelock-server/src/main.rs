//! Safelock server binary.

use clap::Parser;
use safelock_app::{Runtime, RuntimeConfig};
use safelock_server::{
    Args, FileEeprom, HttpDriver, Peripherals, ServerConfig, ServerError, SystemEnv,
    gpio::SysfsActuator,
    host::{DropDirUpdates, HostRadio, LogAdvertiser},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::load(Args::parse())?;
    info!(
        listen = %config.listen,
        eeprom = %config.eeprom.display(),
        gpio_root = %config.gpio_root.display(),
        "starting safelock server"
    );

    let eeprom = FileEeprom::open(&config.eeprom)
        .map_err(|err| ServerError::Config(format!("{}: {err}", config.eeprom.display())))?;

    let peripherals = Peripherals {
        actuator: SysfsActuator::new(&config.gpio_root),
        radio: HostRadio::new(config.chip_id, config.networks.clone()),
        advertiser: LogAdvertiser::default(),
        updates: DropDirUpdates::new(config.update_dir.clone()),
    };
    let driver = HttpDriver::bind(&config.listen, peripherals)?;
    if let Some(addr) = driver.local_addr() {
        info!(%addr, "listening");
    }

    let mut runtime = Runtime::boot(driver, SystemEnv, eeprom, RuntimeConfig::default());
    runtime.run()
}
