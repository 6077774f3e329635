//! Receive interrupt stand-in.
//!
//! QEMU cannot be scripted to deliver bytes to UART0 at a given point of a test, so the
//! tests hand bytes to the PendSV handler instead, which pushes them into the receive queue
//! from interrupt context exactly like a UART receive interrupt would.

use core::cell::{Cell, RefCell};

use cortex_m::peripheral::SCB;
use cortex_m_rt::exception;
use critical_section::Mutex;
use uart_rs485::{Producer, RingBuffer, UartChannel};

use crate::uart::Uart0;

/// Receive queue size used by all tests.
pub const RX_CAPACITY: usize = 32;

static PRODUCER: Mutex<RefCell<Option<Producer<'static, RX_CAPACITY>>>> =
    Mutex::new(RefCell::new(None));
static PENDING: Mutex<Cell<&'static [u8]>> = Mutex::new(Cell::new(&[]));

/// Creates the UART0 channel with its producer wired to the PendSV handler.
///
/// Panics when called twice.
pub fn uart0_channel() -> UartChannel<'static, Uart0, RX_CAPACITY> {
    let rb = cortex_m::singleton!(: RingBuffer<RX_CAPACITY> = RingBuffer::new())
        .expect("uart0_channel called twice");
    let (producer, consumer) = rb.split();
    critical_section::with(|cs| PRODUCER.borrow_ref_mut(cs).replace(producer));
    UartChannel::new(Uart0::new(), consumer)
}

/// "Receives" `bytes`: returns once the interrupt handler has queued them.
pub fn receive(bytes: &'static [u8]) {
    critical_section::with(|cs| PENDING.borrow(cs).set(bytes));
    SCB::set_pendsv();
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

#[exception]
fn PendSV() {
    critical_section::with(|cs| {
        let bytes = PENDING.borrow(cs).replace(&[]);
        if let Some(producer) = PRODUCER.borrow_ref_mut(cs).as_mut() {
            for &byte in bytes {
                // Full queue: the byte is dropped and counted.
                let _ = producer.push(byte);
            }
        }
    });
}
