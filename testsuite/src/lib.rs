#![no_std]

pub mod board;
pub mod rx;
pub mod uart;

use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll, Waker};
use cortex_m_semihosting::debug::{self, EXIT_FAILURE, EXIT_SUCCESS};

pub use cortex_m_rt::entry;
pub use cortex_m_semihosting::hprintln;

/// Core clock after reset.
pub const CPU_HZ: u32 = 12_000_000;

pub fn exit_success() -> ! {
    debug::exit(EXIT_SUCCESS);
    #[allow(clippy::empty_loop)]
    loop {}
}

pub fn exit_failure() -> ! {
    debug::exit(EXIT_FAILURE);
    #[allow(clippy::empty_loop)]
    loop {}
}

/// Exits with failure unless `cond` holds, naming the failed check on the host console.
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if !$cond {
            $crate::hprintln!("check failed: {}", stringify!($cond));
            $crate::exit_failure();
        }
    };
}

/// Yield once to allow other tasks to run.
pub async fn yield_once() {
    let mut yielded = false;
    core::future::poll_fn(|_cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            Poll::Pending
        }
    })
    .await
}

/// Minimal block_on executor for testing.
pub fn block_on<F: Future>(fut: F) -> F::Output {
    let mut fut = pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());

    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(val) => return val,
            Poll::Pending => {
                cortex_m::asm::nop();
            }
        }
    }
}

/// Join two futures, polling them alternately until both complete.
pub async fn join<A, B, T, U>(a: A, b: B) -> (T, U)
where
    A: Future<Output = T>,
    B: Future<Output = U>,
{
    let mut a = pin!(a);
    let mut b = pin!(b);
    let mut a_done: Option<T> = None;
    let mut b_done: Option<U> = None;

    core::future::poll_fn(|cx| {
        if a_done.is_none() {
            if let Poll::Ready(val) = a.as_mut().poll(cx) {
                a_done = Some(val);
            }
        }
        if b_done.is_none() {
            if let Poll::Ready(val) = b.as_mut().poll(cx) {
                b_done = Some(val);
            }
        }
        match (a_done.take(), b_done.take()) {
            (Some(a), Some(b)) => Poll::Ready((a, b)),
            (a, b) => {
                a_done = a;
                b_done = b;
                Poll::Pending
            }
        }
    })
    .await
}
