//! Full-duplex UART channel: interrupt-fed receive queue plus blocking transmit.

use crate::InitError;
use crate::hal::{Config, Pin, PinMap, PinRole, SerialPeripheral};
use crate::print::Print;
use crate::ring_buffer::Consumer;

/// Returned by [`UartChannel::read_raw`] and [`UartChannel::peek_raw`] when nothing is
/// buffered. Lies outside the `0..=255` byte range.
pub const NO_DATA: i16 = -1;

/// Why [`UartChannel::read_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stop {
    /// The terminator was received. It was consumed but not stored.
    Terminator,
    /// The destination buffer filled up before the terminator arrived.
    BufferFull,
    /// The channel or its peripheral was turned off while waiting for data.
    Disabled,
}

/// Result of [`UartChannel::read_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadUntil {
    /// Number of bytes stored at the start of the destination buffer.
    pub len: usize,
    /// Why reading stopped.
    pub stop: Stop,
}

#[derive(Debug, Clone, Copy)]
struct Active {
    config: Config,
    tx: Pin,
    rx: Pin,
}

/// One UART instance with a receive queue of `N` bytes.
///
/// The channel is created disabled. [`init`](Self::init) enables it, [`off`](Self::off)
/// disables it again. While disabled no peripheral access is made: writes are dropped, reads
/// return nothing and [`available`](Self::available) is zero. Bytes left in the queue by
/// `off` are discarded by the next `init`.
pub struct UartChannel<'a, P, const N: usize> {
    peripheral: P,
    rx: Consumer<'a, N>,
    active: Option<Active>,
}

impl<'a, P: SerialPeripheral, const N: usize> UartChannel<'a, P, N> {
    /// Creates a disabled channel reading from `rx`.
    ///
    /// The matching [`Producer`](crate::Producer) must be fed from the peripheral's receive
    /// interrupt.
    pub fn new(peripheral: P, rx: Consumer<'a, N>) -> Self {
        Self {
            peripheral,
            rx,
            active: None,
        }
    }

    /// Enables the channel on `tx`/`rx` with `config`.
    ///
    /// The receive queue and its overflow indicator are cleared before the peripheral is
    /// enabled. On error the channel stays disabled.
    ///
    /// # Errors
    ///
    /// - [`InitError::AlreadyEnabled`]: call [`off`](Self::off) before reconfiguring.
    /// - [`InitError::InvalidBaudRate`]: `config.baudrate` is zero.
    /// - [`InitError::InvalidPin`]: the pin map rejected `tx` or `rx`.
    /// - [`InitError::Peripheral`]: the peripheral could not be enabled.
    pub fn init<M: PinMap>(
        &mut self,
        pins: &mut M,
        tx: Pin,
        rx: Pin,
        config: Config,
    ) -> Result<(), InitError> {
        if self.active.is_some() {
            warn!("uart: init while enabled");
            return Err(InitError::AlreadyEnabled);
        }
        if config.baudrate == 0 {
            return Err(InitError::InvalidBaudRate);
        }
        // Both pins are checked before either is routed.
        check_pin(pins, tx, PinRole::Tx)?;
        check_pin(pins, rx, PinRole::Rx)?;
        configure_pin(pins, tx, PinRole::Tx)?;
        configure_pin(pins, rx, PinRole::Rx)?;

        self.rx.clear();
        self.rx.take_overflows();

        if self.peripheral.enable(&config, tx, rx).is_err() {
            warn!("uart: peripheral enable failed");
            self.peripheral.disable();
            return Err(InitError::Peripheral);
        }

        self.active = Some(Active { config, tx, rx });
        debug!("uart: enabled at {} baud, tx={} rx={}", config.baudrate, tx, rx);
        Ok(())
    }

    /// [`init`](Self::init) with 8N1 framing.
    pub fn begin<M: PinMap>(
        &mut self,
        pins: &mut M,
        baudrate: u32,
        tx: Pin,
        rx: Pin,
    ) -> Result<(), InitError> {
        self.init(pins, tx, rx, Config::new(baudrate))
    }

    /// Disables the peripheral and its receive interrupt. Does nothing if already off.
    pub fn off(&mut self) {
        if self.active.take().is_some() {
            self.peripheral.disable();
            debug!("uart: disabled");
        }
    }

    /// Whether [`init`](Self::init) succeeded and [`off`](Self::off) has not been called since.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// The active line configuration, `None` while disabled.
    pub fn config(&self) -> Option<Config> {
        self.active.map(|a| a.config)
    }

    /// The `(tx, rx)` pins in use, `None` while disabled.
    pub fn pins(&self) -> Option<(Pin, Pin)> {
        self.active.map(|a| (a.tx, a.rx))
    }

    /// The underlying peripheral.
    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Whether bytes written now would reach the line: the channel is enabled and the
    /// peripheral reports itself running.
    ///
    /// Differs from [`is_enabled`](Self::is_enabled) when something outside the driver has
    /// stopped the peripheral.
    pub fn can_transmit(&self) -> bool {
        self.active.is_some() && self.peripheral.is_enabled()
    }

    /// Transmits one byte, blocking until the peripheral accepts it.
    ///
    /// Dropped while disabled or while the peripheral is stopped.
    pub fn write(&mut self, byte: u8) {
        self.write_bytes(&[byte]);
    }

    /// Blocks until the last written byte has completely left the transmitter.
    ///
    /// Returns early if the channel or peripheral is disabled.
    pub fn flush(&mut self) {
        if self.active.is_none() {
            return;
        }
        while !self.peripheral.is_tx_complete() {
            if !self.peripheral.is_enabled() {
                return;
            }
            core::hint::spin_loop();
        }
    }

    /// Number of received bytes ready to be read.
    pub fn available(&self) -> usize {
        if self.active.is_none() {
            return 0;
        }
        self.rx.available()
    }

    /// Removes and returns the oldest received byte.
    pub fn read(&mut self) -> Option<u8> {
        if self.active.is_none() {
            trace!("uart: read while disabled");
            return None;
        }
        self.rx.pop()
    }

    /// Returns the oldest received byte without removing it.
    pub fn peek(&self) -> Option<u8> {
        if self.active.is_none() {
            return None;
        }
        self.rx.peek()
    }

    /// [`read`](Self::read) as an integer, [`NO_DATA`] when nothing is available.
    pub fn read_raw(&mut self) -> i16 {
        self.read().map_or(NO_DATA, i16::from)
    }

    /// [`peek`](Self::peek) as an integer, [`NO_DATA`] when nothing is available.
    pub fn peek_raw(&self) -> i16 {
        self.peek().map_or(NO_DATA, i16::from)
    }

    /// Reads bytes into `buf` until `terminator` is received.
    ///
    /// This call blocks and has no timeout: while the queue is empty it spins until more
    /// data arrives. It returns when
    /// - the terminator is received (it is consumed, not stored),
    /// - `buf` is full (remaining bytes, terminator included, stay queued), or
    /// - the queue is empty and the channel or the peripheral has been disabled.
    pub fn read_until(&mut self, terminator: u8, buf: &mut [u8]) -> ReadUntil {
        let mut len = 0;
        loop {
            if let Some(stop) = self.check_stop(len, buf.len()) {
                return ReadUntil { len, stop };
            }
            match self.rx.pop() {
                Some(byte) if byte == terminator => {
                    return ReadUntil {
                        len,
                        stop: Stop::Terminator,
                    };
                }
                Some(byte) => {
                    buf[len] = byte;
                    len += 1;
                }
                None => {
                    if !self.peripheral.is_enabled() {
                        return ReadUntil {
                            len,
                            stop: Stop::Disabled,
                        };
                    }
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Same contract as [`read_until`](Self::read_until), but awaits new data instead of
    /// spinning.
    ///
    /// The producer wakes the task on every received byte. Turning the peripheral off does
    /// not wake it; drop the future to cancel.
    #[cfg(feature = "async-await")]
    pub async fn read_until_async(&mut self, terminator: u8, buf: &mut [u8]) -> ReadUntil {
        let mut len = 0;
        loop {
            if let Some(stop) = self.check_stop(len, buf.len()) {
                return ReadUntil { len, stop };
            }
            match self.rx.pop() {
                Some(byte) if byte == terminator => {
                    return ReadUntil {
                        len,
                        stop: Stop::Terminator,
                    };
                }
                Some(byte) => {
                    buf[len] = byte;
                    len += 1;
                }
                None => {
                    if !self.peripheral.is_enabled() {
                        return ReadUntil {
                            len,
                            stop: Stop::Disabled,
                        };
                    }
                    self.rx.wait_for_data().await;
                }
            }
        }
    }

    fn check_stop(&self, len: usize, cap: usize) -> Option<Stop> {
        if self.active.is_none() {
            Some(Stop::Disabled)
        } else if len == cap {
            Some(Stop::BufferFull)
        } else {
            None
        }
    }

    /// Bytes dropped because the receive queue was full, since the last
    /// [`take_overflows`](Self::take_overflows).
    pub fn overflows(&self) -> u32 {
        self.rx.overflows()
    }

    /// Returns and resets the overflow indicator.
    pub fn take_overflows(&mut self) -> u32 {
        let dropped = self.rx.take_overflows();
        if dropped > 0 {
            warn!("uart: {} received bytes dropped", dropped);
        }
        dropped
    }

    /// Turns the channel off and returns its parts.
    pub fn release(mut self) -> (P, Consumer<'a, N>) {
        self.off();
        (self.peripheral, self.rx)
    }
}

fn check_pin<M: PinMap>(pins: &M, pin: Pin, role: PinRole) -> Result<(), InitError> {
    pins.check(pin, role).map_err(|_| {
        warn!("uart: pin {} cannot be used as {}", pin, role);
        InitError::InvalidPin { pin, role }
    })
}

fn configure_pin<M: PinMap>(pins: &mut M, pin: Pin, role: PinRole) -> Result<(), InitError> {
    pins.configure(pin, role).map_err(|_| {
        warn!("uart: routing pin {} as {} failed", pin, role);
        InitError::InvalidPin { pin, role }
    })
}

impl<P: SerialPeripheral, const N: usize> Print for UartChannel<'_, P, N> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        if !self.can_transmit() {
            trace!("uart: write while disabled dropped");
            return;
        }
        for &byte in bytes {
            self.peripheral.write_byte(byte);
        }
    }
}

impl<P: SerialPeripheral, const N: usize> core::fmt::Write for UartChannel<'_, P, N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}
