#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

#[macro_use]
mod fmt;

#[cfg(feature = "async-await")]
pub(crate) mod atomic_waker;
mod channel;
pub mod hal;
pub mod number;
mod print;
mod ring_buffer;
mod rs485;

pub use channel::{NO_DATA, ReadUntil, Stop, UartChannel};
pub use hal::{Config, DataBits, Parity, Pin, PinError, PinMap, PinRole, SerialPeripheral, StopBits};
pub use print::{LINE_ENDING, Print};
pub use ring_buffer::{Consumer, Producer, RingBuffer};
pub use rs485::{Direction, Polarity, Rs485, Rs485Config};

/// Error returned by [`UartChannel::init`] and [`Rs485::init`].
///
/// No partial state is left enabled when initialization fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// The channel is already enabled. Call `off` before reconfiguring.
    AlreadyEnabled,
    /// The requested baud rate is zero.
    InvalidBaudRate,
    /// The pin map cannot route `pin` to `role`.
    InvalidPin {
        /// Rejected pin.
        pin: Pin,
        /// Role it was requested for.
        role: PinRole,
    },
    /// The peripheral instance is unavailable or rejected the configuration.
    Peripheral,
    /// The RS-485 driver enable pin could not be driven.
    DirectionPin,
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InitError::AlreadyEnabled => f.write_str("channel already enabled"),
            InitError::InvalidBaudRate => f.write_str("baud rate must be non-zero"),
            InitError::InvalidPin { pin, role } => {
                write!(f, "pin {pin} cannot be used as {role:?}")
            }
            InitError::Peripheral => f.write_str("peripheral unavailable"),
            InitError::DirectionPin => f.write_str("driver enable pin could not be driven"),
        }
    }
}

impl core::error::Error for InitError {}
