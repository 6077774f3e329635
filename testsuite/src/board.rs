//! Pin multiplexing, GPIO output and busy-wait delay for LM3S6965.
//!
//! Pins are numbered `port * 8 + bit` with port A = 0, so PA0 is 0 and PB0 is 8.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use uart_rs485::{Pin, PinError, PinMap, PinRole};

use crate::uart::{modify_reg, read_reg, write_reg};

/// U0Rx.
pub const PA0: Pin = 0;
/// U0Tx.
pub const PA1: Pin = 1;
/// Plain GPIO, used as RS-485 driver enable.
pub const PB0: Pin = 8;

const GPIO_PORT_BASE: [usize; 4] = [0x4000_4000, 0x4000_5000, 0x4000_6000, 0x4000_7000];

const GPIO_DIR_OFFSET: usize = 0x400;
const GPIO_AFSEL_OFFSET: usize = 0x420;
const GPIO_DEN_OFFSET: usize = 0x51C;

const SYSCTL_RCGC2: usize = 0x400F_E108;

/// Port base address and bit mask of `pin`, `None` for pins this board lacks.
fn locate(pin: Pin) -> Option<(usize, u32)> {
    let base = *GPIO_PORT_BASE.get(usize::from(pin / 8))?;
    Some((base, 1 << (pin % 8)))
}

fn enable_port_clock(pin: Pin) {
    modify_reg(SYSCTL_RCGC2, |v| v | 1 << (pin / 8));
}

/// UART0 alternate functions.
pub struct Pins;

impl PinMap for Pins {
    fn check(&self, pin: Pin, role: PinRole) -> Result<(), PinError> {
        match (pin, role) {
            (PA0, PinRole::Rx) | (PA1, PinRole::Tx) => Ok(()),
            _ => Err(PinError),
        }
    }

    fn configure(&mut self, pin: Pin, role: PinRole) -> Result<(), PinError> {
        self.check(pin, role)?;
        let (base, mask) = locate(pin).ok_or(PinError)?;
        enable_port_clock(pin);
        modify_reg(base + GPIO_AFSEL_OFFSET, |v| v | mask);
        modify_reg(base + GPIO_DEN_OFFSET, |v| v | mask);
        Ok(())
    }
}

/// Push-pull GPIO output.
pub struct Output {
    data: usize,
    mask: u32,
}

impl Output {
    /// Configures `pin` as a digital output, driven low.
    ///
    /// Returns `None` if the board has no such pin.
    pub fn new(pin: Pin) -> Option<Self> {
        let (base, mask) = locate(pin)?;
        enable_port_clock(pin);
        modify_reg(base + GPIO_DEN_OFFSET, |v| v | mask);
        modify_reg(base + GPIO_AFSEL_OFFSET, |v| v & !mask);
        modify_reg(base + GPIO_DIR_OFFSET, |v| v | mask);
        // The data register is masked by address bits 9:2.
        let data = base + ((mask as usize) << 2);
        write_reg(data, 0);
        Some(Output { data, mask })
    }

    /// Current output level.
    pub fn is_high(&self) -> bool {
        read_reg(self.data) & self.mask != 0
    }
}

impl ErrorType for Output {
    type Error = Infallible;
}

impl OutputPin for Output {
    fn set_low(&mut self) -> Result<(), Infallible> {
        write_reg(self.data, 0);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        write_reg(self.data, self.mask);
        Ok(())
    }
}

impl StatefulOutputPin for Output {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.is_high())
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.is_high())
    }
}

/// Reads the output level of `pin` without owning it.
pub fn is_high(pin: Pin) -> bool {
    match locate(pin) {
        Some((base, mask)) => read_reg(base + ((mask as usize) << 2)) & mask != 0,
        None => false,
    }
}

/// Cycle-counting delay.
pub struct SpinDelay {
    cpu_hz: u32,
}

impl SpinDelay {
    /// Delay for a core running at `cpu_hz`.
    pub const fn new(cpu_hz: u32) -> Self {
        SpinDelay { cpu_hz }
    }
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = u64::from(ns) * u64::from(self.cpu_hz) / 1_000_000_000;
        cortex_m::asm::delay(cycles.max(1) as u32);
    }
}
