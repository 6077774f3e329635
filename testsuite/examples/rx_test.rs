//! Receive path: bytes queued from interrupt context, line reads, overflow accounting.

#![no_std]
#![no_main]

use panic_semihosting as _;
use testsuite::board::{PA0, PA1, Pins};
use testsuite::rx::{self, RX_CAPACITY};
use testsuite::{check, entry, exit_success, hprintln};
use uart_rs485::{Config, NO_DATA, Print, Stop};

#[entry]
fn main() -> ! {
    let mut uart = rx::uart0_channel();
    uart.init(&mut Pins, PA1, PA0, Config::new(115_200)).unwrap();

    check!(uart.available() == 0);
    check!(uart.read_raw() == NO_DATA);
    check!(uart.peek_raw() == NO_DATA);

    rx::receive(b"hello\nworld\n");
    check!(uart.available() == 12);
    check!(uart.peek() == Some(b'h'));

    let mut line = [0u8; 16];
    for _ in 0..2 {
        let r = uart.read_until(b'\n', &mut line);
        check!(r.stop == Stop::Terminator);
        uart.print("echo: ");
        uart.print_array(&line[..r.len]);
        uart.println("");
    }
    check!(uart.available() == 0);

    // Longer than the destination: the rest stays queued.
    rx::receive(b"0123456789\n");
    let mut short = [0u8; 4];
    let r = uart.read_until(b'\n', &mut short);
    check!(r.stop == Stop::BufferFull);
    uart.print_array(&short);
    uart.println("");
    check!(uart.available() == 7);
    let r = uart.read_until(b'\n', &mut line);
    check!(r.stop == Stop::Terminator && r.len == 6);

    // Overflow: the oldest bytes survive, the rest is counted.
    rx::receive(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789");
    check!(uart.available() == RX_CAPACITY);
    check!(uart.take_overflows() == 4);
    check!(uart.overflows() == 0);
    let r = uart.read_until(b'\n', &mut line);
    check!(r.stop == Stop::BufferFull);
    uart.print("kept: ");
    uart.print_array(&line[..r.len]);
    uart.println("");

    // Turning off hides the queue; turning on again starts empty.
    uart.off();
    check!(uart.available() == 0);
    let r = uart.read_until(b'\n', &mut line);
    check!(r.stop == Stop::Disabled && r.len == 0);
    uart.init(&mut Pins, PA1, PA0, Config::new(115_200)).unwrap();
    check!(uart.available() == 0);
    uart.println("rx done");
    uart.flush();

    hprintln!("rx_test done");
    exit_success();
}
