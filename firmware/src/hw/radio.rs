//! nRF24L01+ link to the access server.
//!
//! The radio idles in receive mode on the reading pipe. Replies switch it to
//! transmit for one payload and back. Auto-acknowledge and retransmission are
//! handled by the chip, so a failed send here already exhausted its retries.

use core::convert::Infallible;

use access_node_core::codec::{Frame, RadioCodec};
use access_node_core::config::{DataRate as LinkRate, RadioLinkConfig};
use access_node_core::io::RadioTransport;
use embassy_stm32::gpio::Output;
use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::Spi;
use embedded_nrf24l01::{Configuration, CrcMode, DataRate, NRF24L01, RxMode, StandbyMode};

type Chip = NRF24L01<Infallible, Output<'static>, Output<'static>, Spi<'static, Blocking>>;

/// Highest transmit power setting.
const TX_POWER: u8 = 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq, defmt::Format)]
pub enum RadioError {
    /// The chip was lost after a failed mode switch.
    Offline,
    /// SPI transfer or chip status failure.
    Link,
    /// Payload did not fit a frame.
    Payload,
}

pub struct Nrf24Radio {
    rx: Option<RxMode<Chip>>,
}

impl Nrf24Radio {
    /// Configures the link per `link` and starts listening for `codec`-sized frames.
    pub fn new(
        spi: Spi<'static, Blocking>,
        ce: Output<'static>,
        csn: Output<'static>,
        link: &RadioLinkConfig,
        codec: RadioCodec,
    ) -> Result<Self, RadioError> {
        let mut standby = NRF24L01::new(ce, csn, spi).map_err(|_| RadioError::Link)?;
        configure(&mut standby, link, codec)?;
        let rx = standby.rx().map_err(|_| RadioError::Link)?;
        Ok(Self { rx: Some(rx) })
    }
}

fn configure(
    chip: &mut StandbyMode<Chip>,
    link: &RadioLinkConfig,
    codec: RadioCodec,
) -> Result<(), RadioError> {
    let failed = |_| RadioError::Link;
    let rate = match link.data_rate {
        LinkRate::R250Kbps => DataRate::R250Kbps,
        LinkRate::R1Mbps => DataRate::R1Mbps,
        LinkRate::R2Mbps => DataRate::R2Mbps,
    };
    let payload = u8::try_from(codec.frame_len()).map_err(|_| RadioError::Payload)?;

    chip.set_frequency(link.channel).map_err(failed)?;
    chip.set_rf(&rate, TX_POWER).map_err(failed)?;
    chip.set_crc(CrcMode::TwoBytes).map_err(failed)?;
    chip.set_auto_retransmit(link.retry_delay, link.retry_count)
        .map_err(failed)?;
    chip.set_auto_ack(&[true; 6]).map_err(failed)?;
    chip.set_pipes_rx_lengths(&[Some(payload); 6]).map_err(failed)?;
    chip.set_tx_addr(&link.pipe_address(0)).map_err(failed)?;
    chip.set_rx_addr(0, &link.pipe_address(0)).map_err(failed)?;
    chip.set_rx_addr(1, &link.pipe_address(1)).map_err(failed)?;
    chip.set_pipes_rx_enable(&[true, true, false, false, false, false])
        .map_err(failed)?;
    chip.flush_rx().map_err(failed)?;
    chip.flush_tx().map_err(failed)?;
    Ok(())
}

impl RadioTransport for Nrf24Radio {
    type Error = RadioError;

    fn try_receive(&mut self) -> Result<Option<Frame>, Self::Error> {
        let rx = self.rx.as_mut().ok_or(RadioError::Offline)?;
        if rx.can_read().map_err(|_| RadioError::Link)?.is_none() {
            return Ok(None);
        }
        let payload = rx.read().map_err(|_| RadioError::Link)?;
        Frame::from_slice(&payload)
            .map(Some)
            .map_err(|_| RadioError::Payload)
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        let rx = self.rx.take().ok_or(RadioError::Offline)?;
        let mut tx = rx.standby().tx().map_err(|_| RadioError::Offline)?;

        // The chip retransmits until acknowledged or the retry budget runs out.
        let sent = tx
            .send(frame)
            .and_then(|()| tx.wait_empty())
            .map_err(|_| RadioError::Link);

        let standby = tx.standby().map_err(|_| RadioError::Offline)?;
        self.rx = Some(standby.rx().map_err(|_| RadioError::Offline)?);
        sent
    }
}
