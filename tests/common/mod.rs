//! Simulated UART, DE pin, pin map and delay shared by the integration tests.
//!
//! The UART models a transmit data register feeding a shift register. Every poll of
//! `is_tx_complete` while a frame is in flight advances the line by one bit time and records
//! the DE level seen during that bit.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use uart_rs485::{Config, Pin, PinError, PinMap, PinRole, SerialPeripheral};

/// Something observable on the wire, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// DE driven; `true` is electrically high.
    De(bool),
    /// One bit time of `byte` on the line (`bit` 0 is the start bit).
    Bit { byte: u8, bit: u32, de_high: bool },
    /// Busy wait requested through `DelayNs`.
    Delay(u32),
}

#[derive(Debug, Default)]
pub struct Wire {
    pub enabled: bool,
    pub enable_calls: usize,
    pub disable_calls: usize,
    pub fail_enable: bool,
    pub config: Option<Config>,
    pub pins: Option<(Pin, Pin)>,
    /// Every byte handed to `write_byte`.
    pub written: Vec<u8>,
    /// Turn the peripheral off after this many `is_enabled` polls.
    pub disable_after_polls: Option<usize>,
    pub de_high: bool,
    pub fail_de: bool,
    pub events: Vec<Event>,
    tdr: Option<u8>,
    shifting: Option<(u8, u32)>,
    frame_bits: u32,
}

impl Wire {
    pub fn new() -> Rc<RefCell<Wire>> {
        Rc::new(RefCell::new(Wire::default()))
    }

    pub fn written_str(&self) -> &str {
        std::str::from_utf8(&self.written).unwrap()
    }

    pub fn bits(&self) -> impl Iterator<Item = (u8, u32, bool)> + '_ {
        self.events.iter().filter_map(|e| match *e {
            Event::Bit { byte, bit, de_high } => Some((byte, bit, de_high)),
            _ => None,
        })
    }

    pub fn de_events(&self) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                Event::De(level) => Some(level),
                _ => None,
            })
            .collect()
    }

    fn load(&mut self) {
        if self.shifting.is_none() {
            if let Some(byte) = self.tdr.take() {
                self.shifting = Some((byte, self.frame_bits));
            }
        }
    }

    fn tick(&mut self) {
        if let Some((byte, remaining)) = self.shifting {
            self.events.push(Event::Bit {
                byte,
                bit: self.frame_bits - remaining,
                de_high: self.de_high,
            });
            self.shifting = if remaining > 1 {
                Some((byte, remaining - 1))
            } else {
                None
            };
            self.load();
        }
    }
}

#[derive(Debug)]
pub struct MockError;

pub struct MockUart(pub Rc<RefCell<Wire>>);

impl SerialPeripheral for MockUart {
    type Error = MockError;

    fn enable(&mut self, config: &Config, tx: Pin, rx: Pin) -> Result<(), MockError> {
        let mut w = self.0.borrow_mut();
        w.enable_calls += 1;
        if w.fail_enable {
            return Err(MockError);
        }
        w.enabled = true;
        w.config = Some(*config);
        w.pins = Some((tx, rx));
        w.frame_bits = config.frame_bits();
        Ok(())
    }

    fn disable(&mut self) {
        let mut w = self.0.borrow_mut();
        w.disable_calls += 1;
        w.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        let mut w = self.0.borrow_mut();
        if let Some(polls) = w.disable_after_polls {
            if polls == 0 {
                w.enabled = false;
            } else {
                w.disable_after_polls = Some(polls - 1);
            }
        }
        w.enabled
    }

    fn write_byte(&mut self, byte: u8) {
        let mut w = self.0.borrow_mut();
        w.written.push(byte);
        while w.tdr.is_some() {
            w.tick();
        }
        w.tdr = Some(byte);
        w.load();
    }

    fn is_tx_complete(&self) -> bool {
        let mut w = self.0.borrow_mut();
        if w.shifting.is_none() && w.tdr.is_none() {
            return true;
        }
        w.tick();
        false
    }
}

#[derive(Debug)]
pub struct MockPinError;

impl digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct MockDe(pub Rc<RefCell<Wire>>);

impl MockDe {
    fn drive(&mut self, high: bool) -> Result<(), MockPinError> {
        let mut w = self.0.borrow_mut();
        if w.fail_de {
            return Err(MockPinError);
        }
        w.de_high = high;
        w.events.push(Event::De(high));
        Ok(())
    }
}

impl ErrorType for MockDe {
    type Error = MockPinError;
}

impl OutputPin for MockDe {
    fn set_low(&mut self) -> Result<(), MockPinError> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), MockPinError> {
        self.drive(true)
    }
}

pub struct MockDelay(pub Rc<RefCell<Wire>>);

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().events.push(Event::Delay(ns));
    }
}

/// Accepts every pin except the ones listed in `rejected`.
#[derive(Default)]
pub struct MockPins {
    pub rejected: Vec<(Pin, PinRole)>,
    pub configured: Vec<(Pin, PinRole)>,
}

impl PinMap for MockPins {
    fn check(&self, pin: Pin, role: PinRole) -> Result<(), PinError> {
        if self.rejected.contains(&(pin, role)) {
            return Err(PinError);
        }
        Ok(())
    }

    fn configure(&mut self, pin: Pin, role: PinRole) -> Result<(), PinError> {
        self.check(pin, role)?;
        self.configured.push((pin, role));
        Ok(())
    }
}

pub const TX: Pin = 9;
pub const RX: Pin = 10;
pub const DE: Pin = 8;
