use access_node_core::codec::{Frame, RadioCodec};
use access_node_core::config::NodeConfig;
use access_node_core::io::RadioTransport;
use access_node_core::node::NodeLoop;
use access_node_core::store::MemoryStore;
use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use static_cell::StaticCell;

use crate::clock::{EmbassyClock, FirmwareInstant};
use crate::hw::BoardOutputs;
use crate::hw::radio::{Nrf24Radio, RadioError};
use crate::hw::reader::Rc522Reader;

mod node_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// SPI clock shared by the reader and the radio.
const SPI_FREQUENCY: Hertz = Hertz(1_000_000);

pub(super) type BoardNode = NodeLoop<
    EmbassyClock,
    Rc522Reader,
    RadioLink,
    MemoryStore<FirmwareInstant>,
    BoardOutputs<'static>,
>;

static NODE: StaticCell<BoardNode> = StaticCell::new();

/// Radio that may have failed bring-up. A missing radio reports every receive
/// as a link fault and leaves the node running on local credentials.
pub(super) struct RadioLink(Option<Nrf24Radio>);

impl RadioTransport for RadioLink {
    type Error = RadioError;

    fn try_receive(&mut self) -> Result<Option<Frame>, Self::Error> {
        self.0.as_mut().ok_or(RadioError::Offline)?.try_receive()
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.0.as_mut().ok_or(RadioError::Offline)?.send(frame)
    }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = NodeConfig::default();
    let hal::Peripherals {
        PA1,
        PA4,
        PA5,
        PA6,
        PA7,
        PA8,
        PB0,
        PB1,
        PB2,
        PB5,
        PB6,
        PB7,
        PB8,
        SPI1,
        SPI2,
        ..
    } = hal::init(hal::Config::default());

    let mut spi_config = spi::Config::default();
    spi_config.frequency = SPI_FREQUENCY;

    let reader_bus = Spi::new_blocking(SPI1, PA1, PA7, PA6, spi_config);
    let reader_cs = Output::new(PA4, Level::High, Speed::Low);
    let reader_spi =
        ExclusiveDevice::new(reader_bus, reader_cs, Delay).expect("reader chip select");
    let reader = Rc522Reader::new(reader_spi, Output::new(PA5, Level::High, Speed::Low));

    let radio_bus = Spi::new_blocking(SPI2, PB8, PB7, PB2, spi_config);
    let radio = match Nrf24Radio::new(
        radio_bus,
        Output::new(PB5, Level::Low, Speed::Low),
        Output::new(PB6, Level::High, Speed::Low),
        &config.radio,
        RadioCodec::new(config.protocol),
    ) {
        Ok(radio) => Some(radio),
        Err(err) => {
            defmt::error!("nrf24 bring-up failed: {}", err);
            None
        }
    };

    let outputs = BoardOutputs::new(
        Output::new(PA8, Level::Low, Speed::Low),
        Output::new(PB0, Level::Low, Speed::Low),
        Output::new(PB1, Level::Low, Speed::Low),
    );

    // The credential table starts empty and is provisioned with `UpdateTable`.
    let node = NodeLoop::new(
        config,
        EmbassyClock,
        reader,
        RadioLink(radio),
        MemoryStore::new(),
        outputs,
    )
    .expect("node configuration");
    let node = NODE.init(node);

    spawner
        .spawn(node_task::run(node))
        .expect("failed to spawn node task");

    core::future::pending::<()>().await;
}
