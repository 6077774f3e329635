//! A single-producer, single-consumer (SPSC) lock-free byte queue.
//!
//! The receive interrupt (or DMA completion handler) owns the [`Producer`], the application
//! owns the [`Consumer`] through a [`UartChannel`](crate::UartChannel). Both halves only use
//! atomic loads and stores, so the queue also works on cores without atomic read-modify-write
//! instructions (Cortex-M0).

use core::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    ptr,
    sync::atomic::{AtomicU32, Ordering},
};

#[cfg(feature = "async-await")]
use crate::atomic_waker::AtomicWaker;

/// Fixed-capacity receive queue holding up to `N` bytes.
///
/// `N` must be a power of two and at most 2^31; this is checked at compile time.
///
/// # Index scheme
///
/// `read` and `write` are free-running counters that wrap at `u32::MAX`. The slot for a
/// counter value is `value & (N - 1)`. The number of buffered bytes is always
/// `write.wrapping_sub(read)`, so empty and full are derived from the two indices alone and
/// there is no separately maintained count that could disagree with them.
///
/// # Overflow policy
///
/// When the queue is full, incoming bytes are dropped. Already buffered bytes are never
/// overwritten, and the number of dropped bytes is recorded so the application can poll it
/// with [`Consumer::overflows`].
pub struct RingBuffer<const N: usize> {
    /// Where the next read starts. Only stored by the consumer.
    read: AtomicU32,
    /// Where the next write starts. Only stored by the producer.
    write: AtomicU32,
    /// Total number of bytes dropped because the queue was full. Only stored by the producer,
    /// wraps at `u32::MAX`.
    dropped: AtomicU32,
    #[cfg(feature = "async-await")]
    waker: AtomicWaker,
    buf: [UnsafeCell<MaybeUninit<u8>>; N],
}

// SAFETY: The only way to reach the byte storage is through the `Producer`/`Consumer` pair
// returned by `split`, which takes `&mut self` and therefore exists at most once per borrow.
// The producer only writes slots outside `[read, write)`, the consumer only reads slots inside
// it, and ownership of a slot moves between them through Release stores / Acquire loads of the
// indices.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        const {
            assert!(
                N.is_power_of_two() && N <= 1 << 31,
                "RingBuffer capacity must be a power of two no larger than 2^31"
            )
        };
        Self::with_indices(0, 0)
    }

    const fn with_indices(read: u32, write: u32) -> Self {
        RingBuffer {
            read: AtomicU32::new(read),
            write: AtomicU32::new(write),
            dropped: AtomicU32::new(0),
            #[cfg(feature = "async-await")]
            waker: AtomicWaker::new(),
            buf: [const { UnsafeCell::new(MaybeUninit::new(0)) }; N],
        }
    }

    /// Number of bytes the queue can hold.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Splits the queue into its producer and consumer halves.
    ///
    /// Hand the [`Producer`] to the receive interrupt handler and the [`Consumer`] to
    /// [`UartChannel::new`](crate::UartChannel::new).
    #[inline]
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let rb: &Self = self;
        let seen = rb.dropped.load(Ordering::Relaxed);
        (
            Producer { rb },
            Consumer {
                rb,
                seen_dropped: seen,
            },
        )
    }

    /// Pointer to the slot that counter value `index` maps to.
    #[inline]
    fn slot(&self, index: u32) -> *mut u8 {
        self.buf[index as usize & (N - 1)].get().cast()
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.buf.as_ptr().cast_mut().cast()
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes received bytes into the queue. Meant to live in interrupt context.
pub struct Producer<'a, const N: usize> {
    rb: &'a RingBuffer<N>,
}

impl<const N: usize> Producer<'_, N> {
    /// Returns the free space and the current write index.
    #[inline]
    fn free(&self) -> (usize, u32) {
        // Acquire: synchronizes with the consumer's Release store, so slots it released are no
        // longer being read when we overwrite them.
        let read = self.rb.read.load(Ordering::Acquire);
        // Relaxed: producer owns `write`.
        let write = self.rb.write.load(Ordering::Relaxed);
        (N - write.wrapping_sub(read) as usize, write)
    }

    /// How many more bytes fit before the queue is full.
    #[inline]
    pub fn space(&self) -> usize {
        self.free().0
    }

    /// Returns `true` if the next [`push`](Self::push) would be dropped.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.space() == 0
    }

    fn record_dropped(&mut self, count: usize) {
        // The producer is the only writer of `dropped`, a plain load/store pair is enough.
        let total = self.rb.dropped.load(Ordering::Relaxed);
        self.rb
            .dropped
            .store(total.wrapping_add(count as u32), Ordering::Relaxed);
    }

    #[inline]
    fn publish(&mut self, new_write: u32) {
        // Release: makes the slot contents visible before the consumer can observe the index.
        self.rb.write.store(new_write, Ordering::Release);
        #[cfg(feature = "async-await")]
        self.rb.waker.wake();
    }

    /// Appends one byte.
    ///
    /// If the queue is full the byte is dropped, counted as an overflow and handed back in
    /// `Err`. Buffered data is left untouched.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<(), u8> {
        let (free, write) = self.free();
        if free == 0 {
            self.record_dropped(1);
            return Err(byte);
        }

        // SAFETY: `free > 0`, so the slot for `write` is outside `[read, write)` and the
        // consumer does not touch it until `publish` moves `write` past it. The pointer is
        // in bounds because `slot` masks the index with `N - 1`.
        unsafe { self.rb.slot(write).write(byte) };
        self.publish(write.wrapping_add(1));
        Ok(())
    }

    /// Appends as much of `data` as fits, for handlers that receive bytes in blocks (DMA
    /// half/full transfer, hardware FIFO drain).
    ///
    /// Bytes that do not fit are dropped and counted as overflows. Returns the number of bytes
    /// accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let (free, write) = self.free();
        let len = data.len().min(free);
        if len < data.len() {
            self.record_dropped(data.len() - len);
        }
        if len == 0 {
            return 0;
        }

        let base = self.rb.base();
        let start = write as usize & (N - 1);
        let first = len.min(N - start);

        // SAFETY:
        // - src: `data[0..first]`, in bounds since `first <= len <= data.len()`.
        // - dst: `buf[start..start + first]`, in bounds since `first <= N - start`.
        // - The `len <= free` slots starting at `write` are producer-owned, so the consumer
        //   reads none of them until `publish`.
        // - `data` cannot overlap `buf`: the consumer never hands out references into it.
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), base.add(start), first) };
        if first < len {
            // Wrapping case, the rest continues at the start of the storage.
            // SAFETY:
            // - src: `data[first..len]`, in bounds since `first < len <= data.len()`.
            // - dst: `buf[0..len - first]`. `len - first <= free - (N - start)`, which is at
            //   most the read slot, so only producer-owned slots are written.
            unsafe { ptr::copy_nonoverlapping(data.as_ptr().add(first), base, len - first) };
        }

        self.publish(write.wrapping_add(len as u32));
        len
    }
}

/// Reads bytes previously written by the [`Producer`].
pub struct Consumer<'a, const N: usize> {
    rb: &'a RingBuffer<N>,
    /// Value of `RingBuffer::dropped` when overflows were last taken.
    seen_dropped: u32,
}

impl<const N: usize> Consumer<'_, N> {
    /// Returns `(read, write)`.
    #[inline]
    fn indices(&self) -> (u32, u32) {
        // Relaxed: consumer owns `read`.
        let read = self.rb.read.load(Ordering::Relaxed);
        // Acquire: synchronizes with the producer's Release store, ensuring we see the data.
        let write = self.rb.write.load(Ordering::Acquire);
        (read, write)
    }

    /// Number of bytes the queue can hold.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes ready to be read.
    #[inline]
    pub fn available(&self) -> usize {
        let (read, write) = self.indices();
        write.wrapping_sub(read) as usize
    }

    /// Returns `true` if there is no data available to read.
    #[inline]
    pub fn is_empty(&self) -> bool {
        let (read, write) = self.indices();
        read == write
    }

    /// Returns the oldest byte without removing it.
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        let (read, write) = self.indices();
        if read == write {
            return None;
        }
        // SAFETY: `read != write`, so the slot for `read` was published by the producer and
        // stays consumer-owned until `read` is advanced.
        Some(unsafe { self.rb.slot(read).read() })
    }

    /// Removes and returns the oldest byte.
    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        let (read, write) = self.indices();
        if read == write {
            return None;
        }
        // SAFETY: see `peek`.
        let byte = unsafe { self.rb.slot(read).read() };
        // Release: the slot read above happens before the producer may reuse it.
        self.rb.read.store(read.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Discards everything currently buffered.
    ///
    /// Safe to call while the producer is running; bytes published after the snapshot of the
    /// write index are kept.
    pub fn clear(&mut self) {
        let write = self.rb.write.load(Ordering::Acquire);
        self.rb.read.store(write, Ordering::Release);
    }

    /// Number of bytes dropped since the last [`take_overflows`](Self::take_overflows).
    #[inline]
    pub fn overflows(&self) -> u32 {
        self.rb
            .dropped
            .load(Ordering::Relaxed)
            .wrapping_sub(self.seen_dropped)
    }

    /// Returns the number of dropped bytes and resets the indicator.
    pub fn take_overflows(&mut self) -> u32 {
        let total = self.rb.dropped.load(Ordering::Relaxed);
        let count = total.wrapping_sub(self.seen_dropped);
        self.seen_dropped = total;
        count
    }

    #[cfg(feature = "async-await")]
    /// Waits until there is data in the [`Consumer`].
    pub async fn wait_for_data(&mut self) {
        core::future::poll_fn(|cx| {
            self.rb.waker.register(cx.waker());

            if self.is_empty() {
                core::task::Poll::Pending
            } else {
                core::task::Poll::Ready(())
            }
        })
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const BUF_SIZE: usize = 8;

    #[test]
    fn fifo_order() {
        let mut b = RingBuffer::<BUF_SIZE>::new();
        let (mut p, mut c) = b.split();
        for byte in [10, 20, 30, 40, 50] {
            assert_eq!(p.push(byte), Ok(()));
        }
        assert_eq!(c.available(), 5);

        let mut out = [0u8; 5];
        for slot in &mut out {
            *slot = c.pop().unwrap();
        }
        assert_eq!(out, [10, 20, 30, 40, 50]);
        assert_eq!(c.pop(), None);
        assert!(c.is_empty());
    }

    #[test]
    fn fill_to_capacity() {
        let mut b = RingBuffer::<BUF_SIZE>::new();
        let (mut p, mut c) = b.split();
        for byte in 0..BUF_SIZE as u8 {
            p.push(byte).unwrap();
        }
        assert!(p.is_full());
        assert_eq!(c.available(), BUF_SIZE);
        for byte in 0..BUF_SIZE as u8 {
            assert_eq!(c.pop(), Some(byte));
        }
        assert_eq!(c.overflows(), 0);
    }

    #[test]
    fn overfill_drops_newest() {
        let mut b = RingBuffer::<BUF_SIZE>::new();
        let (mut p, mut c) = b.split();
        for byte in 1..=BUF_SIZE as u8 {
            p.push(byte).unwrap();
        }

        assert_eq!(p.push(0xAA), Err(0xAA));
        assert_eq!(p.push(0xBB), Err(0xBB));

        assert_eq!(c.available(), BUF_SIZE);
        assert_eq!(c.peek(), Some(1));
        assert_eq!(c.overflows(), 2);

        for byte in 1..=BUF_SIZE as u8 {
            assert_eq!(c.pop(), Some(byte));
        }
        assert_eq!(c.pop(), None);
    }

    #[test]
    fn take_overflows_resets() {
        let mut b = RingBuffer::<2>::new();
        let (mut p, mut c) = b.split();
        p.write(&[1, 2, 3, 4, 5]);
        assert_eq!(c.overflows(), 3);
        assert_eq!(c.take_overflows(), 3);
        assert_eq!(c.overflows(), 0);
        assert_eq!(c.take_overflows(), 0);

        c.pop();
        let _ = p.push(6);
        let _ = p.push(7);
        assert_eq!(c.take_overflows(), 1);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut b = RingBuffer::<BUF_SIZE>::new();
        let (mut p, mut c) = b.split();
        assert_eq!(c.peek(), None);
        p.push(b'x').unwrap();
        assert_eq!(c.peek(), Some(b'x'));
        assert_eq!(c.peek(), Some(b'x'));
        assert_eq!(c.available(), 1);
        assert_eq!(c.pop(), Some(b'x'));
        assert_eq!(c.peek(), None);
    }

    #[test]
    fn push_crossing_end() {
        let start = BUF_SIZE as u32 - 2;
        let mut b = RingBuffer::<BUF_SIZE>::with_indices(start, start);
        let (mut p, mut c) = b.split();
        for byte in [1, 2, 3, 4] {
            p.push(byte).unwrap();
        }
        assert_eq!(c.available(), 4);
        for byte in [1, 2, 3, 4] {
            assert_eq!(c.pop(), Some(byte));
        }
    }

    #[test]
    fn write_crossing_end() {
        let start = BUF_SIZE as u32 - 3;
        let mut b = RingBuffer::<BUF_SIZE>::with_indices(start, start);
        let (mut p, mut c) = b.split();
        assert_eq!(p.write(&[1, 2, 3, 4, 5]), 5);
        for byte in [1, 2, 3, 4, 5] {
            assert_eq!(c.pop(), Some(byte));
        }
        assert!(c.is_empty());
    }

    #[test]
    fn write_overfill() {
        let mut b = RingBuffer::<BUF_SIZE>::with_indices(5, 5);
        let (mut p, mut c) = b.split();
        p.push(0).unwrap();
        let data: [u8; 12] = core::array::from_fn(|i| i as u8 + 1);
        assert_eq!(p.write(&data), BUF_SIZE - 1);
        assert_eq!(c.overflows(), (data.len() - (BUF_SIZE - 1)) as u32);

        assert_eq!(c.pop(), Some(0));
        for byte in 1..BUF_SIZE as u8 {
            assert_eq!(c.pop(), Some(byte));
        }
        assert_eq!(c.pop(), None);
    }

    #[test]
    fn write_into_full_queue() {
        let mut b = RingBuffer::<BUF_SIZE>::new();
        let (mut p, c) = b.split();
        assert_eq!(p.write(&[0; BUF_SIZE]), BUF_SIZE);
        assert_eq!(p.write(&[1, 2]), 0);
        assert_eq!(c.overflows(), 2);
        assert_eq!(c.available(), BUF_SIZE);
    }

    #[test]
    fn counters_wrap_at_u32_max() {
        let start = u32::MAX - 2;
        let mut b = RingBuffer::<BUF_SIZE>::with_indices(start, start);
        let (mut p, mut c) = b.split();
        for byte in 0..BUF_SIZE as u8 {
            p.push(byte).unwrap();
        }
        assert_eq!(c.available(), BUF_SIZE);
        assert_eq!(p.push(99), Err(99));
        for byte in 0..BUF_SIZE as u8 {
            assert_eq!(c.pop(), Some(byte));
        }
        assert!(c.is_empty());
        assert_eq!(p.space(), BUF_SIZE);
    }

    #[test]
    fn clear_discards_buffered() {
        let mut b = RingBuffer::<BUF_SIZE>::new();
        let (mut p, mut c) = b.split();
        p.write(b"stale");
        c.clear();
        assert_eq!(c.available(), 0);
        p.push(b'n').unwrap();
        assert_eq!(c.pop(), Some(b'n'));
    }

    #[test]
    fn concurrent_producer_keeps_order() {
        const COUNT: usize = 10_000;
        let mut b = RingBuffer::<16>::new();
        let (mut p, mut c) = b.split();

        std::thread::scope(|s| {
            s.spawn(move || {
                let mut next = 0usize;
                while next < COUNT {
                    if p.push(next as u8).is_ok() {
                        next += 1;
                    }
                }
            });

            let mut expected = 0usize;
            while expected < COUNT {
                if let Some(byte) = c.pop() {
                    assert_eq!(byte, expected as u8);
                    expected += 1;
                }
            }
        });
    }

    #[cfg(feature = "async-await")]
    #[test]
    fn wait_for_data_wakes_on_push() {
        use core::future::Future;
        use core::pin::pin;
        use core::task::{Context, Poll};
        use std::sync::Arc;
        use std::sync::atomic::AtomicUsize;
        use std::task::Wake;

        struct CountingWaker(AtomicUsize);

        impl Wake for CountingWaker {
            fn wake(self: Arc<Self>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut b = RingBuffer::<BUF_SIZE>::new();
        let (mut p, mut c) = b.split();
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker: core::task::Waker = counter.clone().into();
        let mut cx = Context::from_waker(&waker);

        {
            let mut fut = pin!(c.wait_for_data());
            assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);

            p.push(1).unwrap();
            assert_eq!(counter.0.load(Ordering::SeqCst), 1);
            assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(()));
        }
        assert_eq!(c.pop(), Some(1));
    }
}
