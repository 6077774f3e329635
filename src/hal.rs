//! Hardware collaborators consumed by the driver.
//!
//! The driver never touches registers itself. A chip support crate implements
//! [`SerialPeripheral`] for its UART instance and [`PinMap`] for its pin multiplexer; the
//! receive interrupt handler feeds bytes into a [`Producer`](crate::Producer).

/// Logical pin identifier, as understood by the board's [`PinMap`].
pub type Pin = u16;

/// Electrical role a pin is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    /// UART transmit line.
    Tx,
    /// UART receive line.
    Rx,
}

/// The pin cannot serve the requested role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinError;

/// Pin multiplexing and clock gating.
///
/// The driver calls [`check`](Self::check) for every pin before it calls
/// [`configure`](Self::configure) for any of them, so a rejected pin leaves nothing routed.
pub trait PinMap {
    /// Whether `pin` has a `role` function, without touching the hardware.
    fn check(&self, pin: Pin, role: PinRole) -> Result<(), PinError>;

    /// Routes `pin` to `role`.
    fn configure(&mut self, pin: Pin, role: PinRole) -> Result<(), PinError>;
}

/// Register-level access to one UART instance.
pub trait SerialPeripheral {
    /// Error reported by [`enable`](Self::enable).
    type Error: core::fmt::Debug;

    /// Configures and enables the peripheral in full-duplex mode, including the receive
    /// interrupt (or DMA channel) whose handler feeds the receive queue.
    fn enable(&mut self, config: &Config, tx: Pin, rx: Pin) -> Result<(), Self::Error>;

    /// Disables the peripheral and its receive event source.
    fn disable(&mut self);

    /// Whether the peripheral is currently running.
    fn is_enabled(&self) -> bool;

    /// Blocks until the transmit data register (or FIFO) accepts `byte`.
    fn write_byte(&mut self, byte: u8);

    /// Whether the last stop bit of the last byte has left the shift register.
    ///
    /// This is the "transmission complete" flag (`TC` on STM32, `BUSY` clear on PL011), not the
    /// "data register empty" flag.
    fn is_tx_complete(&self) -> bool;
}

/// Number of data bits per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    Eight,
    /// 9 data bits.
    Nine,
}

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity bit.
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// 1 stop bit.
    One,
    /// 2 stop bits.
    Two,
}

/// UART line configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Baud rate in bits per second.
    pub baudrate: u32,
    /// Data bits per character.
    pub data_bits: DataBits,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits per character.
    pub stop_bits: StopBits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baudrate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl Config {
    /// 8N1 at `baudrate`.
    pub const fn new(baudrate: u32) -> Self {
        Self {
            baudrate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// Bits on the wire for one character, start and stop bits included.
    pub const fn frame_bits(&self) -> u32 {
        let data = match self.data_bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
            DataBits::Nine => 9,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + data + parity + stop
    }

    /// Duration of one bit in nanoseconds, rounded up. Zero baud yields zero.
    pub const fn bit_time_ns(&self) -> u32 {
        if self.baudrate == 0 {
            return 0;
        }
        1_000_000_000u32.div_ceil(self.baudrate)
    }
}
