//! PL011 UART0 driver for LM3S6965 (QEMU testing only).
//!
//! QEMU serial port mapping: `qemu-system-arm ... -serial <uart0>`. Everything the tests
//! transmit ends up in that file and is compared against `testsuite/expected/`.
//!
//! QEMU delivers characters to the shift register instantly, so `BUSY` is only ever seen set
//! on real silicon.

use core::ptr::{with_exposed_provenance, with_exposed_provenance_mut};

use uart_rs485::{Config, DataBits, Parity, Pin, SerialPeripheral, StopBits};

const UART0_BASE: usize = 0x4000_C000;

const UART_DR_OFFSET: usize = 0x000; // Data Register
const UART_FR_OFFSET: usize = 0x018; // Flag Register
const UART_IBRD_OFFSET: usize = 0x024; // Integer Baud-Rate Divisor
const UART_FBRD_OFFSET: usize = 0x028; // Fractional Baud-Rate Divisor
const UART_LCRH_OFFSET: usize = 0x02C; // Line Control
const UART_CR_OFFSET: usize = 0x030; // Control

const UART_FR_BUSY: u32 = 1 << 3;
const UART_FR_TXFF: u32 = 1 << 5;

const UART_LCRH_PEN: u32 = 1 << 1;
const UART_LCRH_EPS: u32 = 1 << 2;
const UART_LCRH_STP2: u32 = 1 << 3;
const UART_LCRH_FEN: u32 = 1 << 4;
const UART_LCRH_WLEN_7: u32 = 0b10 << 5;
const UART_LCRH_WLEN_8: u32 = 0b11 << 5;

const UART_CR_UARTEN: u32 = 1 << 0;
const UART_CR_TXE: u32 = 1 << 8;
const UART_CR_RXE: u32 = 1 << 9;

/// UART clock after reset.
const UART_CLOCK_HZ: u32 = 12_000_000;

const SYSCTL_RCGC1: usize = 0x400F_E104;
const SYSCTL_RCGC1_UART0: u32 = 1 << 0;

pub(crate) fn read_reg(addr: usize) -> u32 {
    unsafe { with_exposed_provenance::<u32>(addr).read_volatile() }
}

pub(crate) fn write_reg(addr: usize, value: u32) {
    unsafe { with_exposed_provenance_mut::<u32>(addr).write_volatile(value) }
}

pub(crate) fn modify_reg(addr: usize, f: impl FnOnce(u32) -> u32) {
    write_reg(addr, f(read_reg(addr)));
}

/// Why UART0 refused a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The PL011 has no 9 bit mode.
    UnsupportedDataBits,
    /// The divisor does not fit the baud rate registers.
    UnsupportedBaudRate,
}

/// UART0.
pub struct Uart0 {
    _private: (),
}

impl Uart0 {
    /// There is a single UART0; the tests take it once.
    pub const fn new() -> Self {
        Uart0 { _private: () }
    }
}

impl Default for Uart0 {
    fn default() -> Self {
        Self::new()
    }
}

/// Baud rate divisor in 1/64ths: `clock / (16 * baud)`.
fn divisor(baudrate: u32) -> Result<(u32, u32), Error> {
    let div = (u64::from(UART_CLOCK_HZ) * 4 + u64::from(baudrate) / 2) / u64::from(baudrate);
    let ibrd = (div >> 6) as u32;
    let fbrd = (div & 0x3F) as u32;
    if ibrd == 0 || ibrd > 0xFFFF {
        return Err(Error::UnsupportedBaudRate);
    }
    Ok((ibrd, fbrd))
}

fn line_control(config: &Config) -> Result<u32, Error> {
    let mut lcrh = UART_LCRH_FEN;
    lcrh |= match config.data_bits {
        DataBits::Seven => UART_LCRH_WLEN_7,
        DataBits::Eight => UART_LCRH_WLEN_8,
        DataBits::Nine => return Err(Error::UnsupportedDataBits),
    };
    lcrh |= match config.parity {
        Parity::None => 0,
        Parity::Even => UART_LCRH_PEN | UART_LCRH_EPS,
        Parity::Odd => UART_LCRH_PEN,
    };
    if config.stop_bits == StopBits::Two {
        lcrh |= UART_LCRH_STP2;
    }
    Ok(lcrh)
}

impl SerialPeripheral for Uart0 {
    type Error = Error;

    fn enable(&mut self, config: &Config, _tx: Pin, _rx: Pin) -> Result<(), Error> {
        let (ibrd, fbrd) = divisor(config.baudrate)?;
        let lcrh = line_control(config)?;

        modify_reg(SYSCTL_RCGC1, |v| v | SYSCTL_RCGC1_UART0);
        write_reg(UART0_BASE + UART_CR_OFFSET, 0);
        write_reg(UART0_BASE + UART_IBRD_OFFSET, ibrd);
        write_reg(UART0_BASE + UART_FBRD_OFFSET, fbrd);
        // LCRH latches the divisor registers.
        write_reg(UART0_BASE + UART_LCRH_OFFSET, lcrh);
        write_reg(
            UART0_BASE + UART_CR_OFFSET,
            UART_CR_UARTEN | UART_CR_TXE | UART_CR_RXE,
        );
        Ok(())
    }

    fn disable(&mut self) {
        write_reg(UART0_BASE + UART_CR_OFFSET, 0);
    }

    fn is_enabled(&self) -> bool {
        read_reg(UART0_BASE + UART_CR_OFFSET) & UART_CR_UARTEN != 0
    }

    fn write_byte(&mut self, byte: u8) {
        while read_reg(UART0_BASE + UART_FR_OFFSET) & UART_FR_TXFF != 0 {}
        write_reg(UART0_BASE + UART_DR_OFFSET, byte as u32);
    }

    fn is_tx_complete(&self) -> bool {
        read_reg(UART0_BASE + UART_FR_OFFSET) & UART_FR_BUSY == 0
    }
}
