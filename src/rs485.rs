//! RS-485 half-duplex operation on top of a [`UartChannel`].
//!
//! RS-485 is a shared bus: only one node may drive it at a time, and each node enables its
//! line driver through a dedicated driver enable (DE) output. The driver must be enabled
//! before the first start bit and stay enabled until the last stop bit has left the shift
//! register. Releasing it when the last byte was merely handed to the peripheral truncates
//! that byte on the wire.
//!
//! Every write, every [`Print`] call and every `write!` is one burst:
//!
//! ```text
//!  Receiving ──► Asserting ──► Transmitting ──► (transmit complete) ──► Releasing ──► Receiving
//!               DE = transmit    bytes out        + turnaround bits     DE = receive
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};

use crate::InitError;
use crate::channel::{ReadUntil, UartChannel};
use crate::hal::{Config, Pin, PinMap, SerialPeripheral};
use crate::print::Print;

/// Which DE level enables the line driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// DE high transmits, DE low receives.
    #[default]
    ActiveHigh,
    /// DE low transmits, DE high receives.
    ActiveLow,
}

impl Polarity {
    /// Pin level that enables the transmitter.
    pub const fn transmit_level(self) -> PinState {
        match self {
            Polarity::ActiveHigh => PinState::High,
            Polarity::ActiveLow => PinState::Low,
        }
    }

    /// Pin level that enables the receiver.
    pub const fn receive_level(self) -> PinState {
        match self {
            Polarity::ActiveHigh => PinState::Low,
            Polarity::ActiveLow => PinState::High,
        }
    }
}

/// RS-485 direction control settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rs485Config {
    /// DE polarity.
    pub polarity: Polarity,
    /// Extra bit times the driver stays enabled after transmit complete. Zero releases the
    /// line as soon as the peripheral reports the last stop bit sent.
    pub turnaround_bits: u8,
}

/// Position in the transmit-then-release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// DE at the receive level. Initial state and end of every burst.
    Receiving,
    /// DE being driven to the transmit level.
    Asserting,
    /// Bytes are being shifted out.
    Transmitting,
    /// Last stop bit sent, DE being driven back to the receive level.
    Releasing,
}

/// A [`UartChannel`] driving a half-duplex RS-485 transceiver.
///
/// The receive side is the plain channel: incoming bytes keep flowing into the queue and are
/// read with the same methods.
pub struct Rs485<'a, P, DE, D, const N: usize> {
    channel: UartChannel<'a, P, N>,
    de: DE,
    delay: D,
    config: Rs485Config,
    state: Direction,
}

impl<'a, P, DE, D, const N: usize> Rs485<'a, P, DE, D, N>
where
    P: SerialPeripheral,
    DE: OutputPin,
    D: DelayNs,
{
    /// Wraps a disabled `channel`. `de` must already be configured as a push-pull output.
    pub fn new(channel: UartChannel<'a, P, N>, de: DE, delay: D, config: Rs485Config) -> Self {
        Self {
            channel,
            de,
            delay,
            config,
            state: Direction::Receiving,
        }
    }

    /// Parks DE at the receive level, then enables the channel in full-duplex mode.
    ///
    /// # Errors
    ///
    /// - [`InitError::DirectionPin`]: DE could not be driven; the channel is left disabled.
    /// - Any error of [`UartChannel::init`].
    pub fn init<M: PinMap>(
        &mut self,
        pins: &mut M,
        tx: Pin,
        rx: Pin,
        config: Config,
    ) -> Result<(), InitError> {
        if self.channel.is_enabled() {
            return Err(InitError::AlreadyEnabled);
        }
        if self.de.set_state(self.config.polarity.receive_level()).is_err() {
            warn!("rs485: DE pin could not be driven");
            return Err(InitError::DirectionPin);
        }
        self.state = Direction::Receiving;
        self.channel.init(pins, tx, rx, config)?;
        debug!("rs485: enabled, polarity {}", self.config.polarity);
        Ok(())
    }

    /// Turns the channel off and leaves DE at the receive level.
    pub fn off(&mut self) {
        self.channel.off();
        if self.de.set_state(self.config.polarity.receive_level()).is_err() {
            warn!("rs485: DE release failed");
        }
        self.state = Direction::Receiving;
    }

    /// Current direction state. Always [`Direction::Receiving`] between calls.
    pub fn state(&self) -> Direction {
        self.state
    }

    /// Direction control settings.
    pub fn rs485_config(&self) -> Rs485Config {
        self.config
    }

    /// The wrapped channel.
    pub fn channel(&self) -> &UartChannel<'a, P, N> {
        &self.channel
    }

    /// The wrapped channel, for receive-side calls not mirrored here.
    ///
    /// Writing through it bypasses direction control.
    pub fn channel_mut(&mut self) -> &mut UartChannel<'a, P, N> {
        &mut self.channel
    }

    /// Transmits one byte as its own burst.
    pub fn write(&mut self, byte: u8) {
        self.burst(&[&[byte]]);
    }

    /// Whether the channel is enabled.
    pub fn is_enabled(&self) -> bool {
        self.channel.is_enabled()
    }

    /// See [`UartChannel::available`].
    pub fn available(&self) -> usize {
        self.channel.available()
    }

    /// See [`UartChannel::read`].
    pub fn read(&mut self) -> Option<u8> {
        self.channel.read()
    }

    /// See [`UartChannel::peek`].
    pub fn peek(&self) -> Option<u8> {
        self.channel.peek()
    }

    /// See [`UartChannel::read_raw`].
    pub fn read_raw(&mut self) -> i16 {
        self.channel.read_raw()
    }

    /// See [`UartChannel::peek_raw`].
    pub fn peek_raw(&self) -> i16 {
        self.channel.peek_raw()
    }

    /// See [`UartChannel::read_until`].
    pub fn read_until(&mut self, terminator: u8, buf: &mut [u8]) -> ReadUntil {
        self.channel.read_until(terminator, buf)
    }

    /// Turns the channel off and returns the channel, DE pin and delay.
    pub fn release(mut self) -> (UartChannel<'a, P, N>, DE, D) {
        self.off();
        (self.channel, self.de, self.delay)
    }

    fn burst(&mut self, parts: &[&[u8]]) {
        if parts.iter().all(|part| part.is_empty()) {
            return;
        }
        if !self.assert_driver() {
            return;
        }
        for part in parts {
            self.channel.write_bytes(part);
        }
        self.release_driver();
    }

    /// Receiving → Asserting → Transmitting. Returns `false`, with DE untouched or back at
    /// the receive level, if nothing may be sent.
    fn assert_driver(&mut self) -> bool {
        // The peripheral may have been stopped outside the driver; check before DE claims
        // the bus.
        if !self.channel.can_transmit() {
            trace!("rs485: write while disabled dropped");
            return false;
        }

        self.state = Direction::Asserting;
        if self.de.set_state(self.config.polarity.transmit_level()).is_err() {
            warn!("rs485: DE assert failed, burst dropped");
            self.state = Direction::Receiving;
            return false;
        }
        trace!("rs485: driver enabled");
        self.state = Direction::Transmitting;
        true
    }

    /// Transmitting → Releasing → Receiving, once the last stop bit is out.
    fn release_driver(&mut self) {
        // Wait for the shift register, not just the data register.
        self.channel.flush();
        self.hold_turnaround();

        self.state = Direction::Releasing;
        if self.de.set_state(self.config.polarity.receive_level()).is_err() {
            warn!("rs485: DE release failed");
        }
        trace!("rs485: driver released");
        self.state = Direction::Receiving;
    }

    fn hold_turnaround(&mut self) {
        let bits = u32::from(self.config.turnaround_bits);
        if bits == 0 {
            return;
        }
        if let Some(line) = self.channel.config() {
            self.delay.delay_ns(bits.saturating_mul(line.bit_time_ns()));
        }
    }
}

impl<P, DE, D, const N: usize> Print for Rs485<'_, P, DE, D, N>
where
    P: SerialPeripheral,
    DE: OutputPin,
    D: DelayNs,
{
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.burst(&[bytes]);
    }

    fn write_parts(&mut self, parts: &[&[u8]]) {
        self.burst(parts);
    }
}

impl<P, DE, D, const N: usize> core::fmt::Write for Rs485<'_, P, DE, D, N>
where
    P: SerialPeripheral,
    DE: OutputPin,
    D: DelayNs,
{
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    /// Sends the whole formatted message as one burst, so DE is not released between the
    /// literal pieces and arguments of a `write!`.
    fn write_fmt(&mut self, args: core::fmt::Arguments<'_>) -> core::fmt::Result {
        if !self.assert_driver() {
            return Ok(());
        }
        let result = core::fmt::write(&mut self.channel, args);
        self.release_driver();
        result
    }
}
