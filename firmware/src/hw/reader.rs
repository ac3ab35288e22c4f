//! MFRC522 card reader on its own SPI bus.

use access_node_core::credential::CredentialId;
use access_node_core::io::CredentialReader;
use embassy_stm32::gpio::Output;
use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::Spi;
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use mfrc522::comm::blocking::spi::SpiInterface;
use mfrc522::{Initialized, Mfrc522};

/// SPI device the reader sits on. The SDA line is the chip select.
pub type ReaderSpi = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, Delay>;

type Device = Mfrc522<SpiInterface<ReaderSpi>, Initialized>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, defmt::Format)]
pub enum ReaderError {
    /// The chip never answered during bring-up.
    NotInitialized,
    /// SPI transfer failed.
    Bus,
}

/// Polls the antenna for a new card and halts it after reading its UID.
pub struct Rc522Reader {
    device: Option<Device>,
    // Held high for the lifetime of the reader; low resets the chip.
    _reset: Output<'static>,
}

impl Rc522Reader {
    /// Initializes the chip. A reader that fails bring-up is kept and reports
    /// [`ReaderError::NotInitialized`] on every poll.
    pub fn new(spi: ReaderSpi, mut reset: Output<'static>) -> Self {
        reset.set_high();
        let device = match Mfrc522::new(SpiInterface::new(spi)).init() {
            Ok(mut device) => {
                if let Ok(version) = device.version() {
                    defmt::info!("rc522 ready, version={=u8:#x}", version);
                }
                Some(device)
            }
            Err(_) => {
                defmt::error!("rc522 bring-up failed");
                None
            }
        };

        Self {
            device,
            _reset: reset,
        }
    }
}

impl CredentialReader for Rc522Reader {
    type Error = ReaderError;

    fn poll(&mut self) -> Result<Option<CredentialId>, Self::Error> {
        let device = self.device.as_mut().ok_or(ReaderError::NotInitialized)?;

        let atqa = match device.new_card_present() {
            Ok(atqa) => atqa,
            Err(mfrc522::Error::Comm(_)) => return Err(ReaderError::Bus),
            Err(_) => return Ok(None),
        };

        let uid = match device.select(&atqa) {
            Ok(uid) => uid,
            Err(mfrc522::Error::Comm(_)) => return Err(ReaderError::Bus),
            // Card left the field or collided mid-anticollision.
            Err(_) => return Ok(None),
        };

        // A halted card stays silent until it leaves the field.
        if let Err(mfrc522::Error::Comm(_)) = device.hlta() {
            return Err(ReaderError::Bus);
        }

        Ok(CredentialId::new(uid.as_bytes()))
    }
}
