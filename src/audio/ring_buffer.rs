/// Lock-free single-producer single-consumer (SPSC) ring buffer for audio.
///
/// One per deck: the deck's decoder thread writes, the mixer callback reads.
/// The callback never blocks, even if the buffer is empty.
///
/// Flushing (after a seek) is requested by the producer and carried out by
/// the consumer, so each position counter keeps exactly one writer.
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

const NO_FLUSH: usize = usize::MAX;

pub struct RingBuffer {
    buffer: Box<[UnsafeCell<f32>]>,
    /// Only modified by the producer.
    write_pos: AtomicUsize,
    /// Only modified by the consumer.
    read_pos: AtomicUsize,
    /// Producer's write position at the last flush request, or NO_FLUSH.
    flush_mark: AtomicUsize,
    capacity: usize,
    mask: usize,
}

impl RingBuffer {
    /// `capacity` is rounded up to a power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            buffer: (0..capacity).map(|_| UnsafeCell::new(0.0)).collect(),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            flush_mark: AtomicUsize::new(NO_FLUSH),
            capacity,
            mask: capacity - 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Producer side. Returns the number of samples written (less than
    /// `data.len()` when full).
    pub fn write(&self, data: &[f32]) -> usize {
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);

        // One slot stays empty to tell full from empty.
        let used = write.wrapping_sub(read);
        let available = self.capacity - 1 - used.min(self.capacity - 1);
        let to_write = data.len().min(available);

        if to_write == 0 {
            return 0;
        }

        for (i, sample) in data[..to_write].iter().enumerate() {
            let idx = (write + i) & self.mask;
            // SAFETY: slots in write..write+to_write are not visible to the
            // consumer until write_pos is published below.
            unsafe {
                *self.buffer[idx].get() = *sample;
            }
        }

        self.write_pos
            .store(write.wrapping_add(to_write), Ordering::Release);

        to_write
    }

    /// Consumer side. Fills `output` with what is available; never blocks.
    pub fn read(&self, output: &mut [f32]) -> usize {
        let mut read = self.read_pos.load(Ordering::Relaxed);
        let write = self.write_pos.load(Ordering::Acquire);

        let mark = self.flush_mark.swap(NO_FLUSH, Ordering::AcqRel);
        if mark != NO_FLUSH && mark.wrapping_sub(read) <= write.wrapping_sub(read) {
            read = mark;
            self.read_pos.store(read, Ordering::Release);
        }

        let available = write.wrapping_sub(read);
        let to_read = output.len().min(available);

        for (i, out) in output[..to_read].iter_mut().enumerate() {
            let idx = (read + i) & self.mask;
            // SAFETY: slots in read..write were published by the producer
            // and are not rewritten until read_pos moves past them.
            *out = unsafe { *self.buffer[idx].get() };
        }

        if to_read > 0 {
            self.read_pos
                .store(read.wrapping_add(to_read), Ordering::Release);
        }

        to_read
    }

    /// Producer side: drop everything written so far. The consumer skips it
    /// on its next read.
    pub fn request_flush(&self) {
        let write = self.write_pos.load(Ordering::Relaxed);
        self.flush_mark.store(write, Ordering::Release);
    }

    /// Samples waiting to be read.
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        if self.flush_mark.load(Ordering::Acquire) != NO_FLUSH {
            return write.wrapping_sub(self.flush_mark.load(Ordering::Acquire)).min(write.wrapping_sub(read));
        }
        write.wrapping_sub(read)
    }

    pub fn available_write(&self) -> usize {
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        let used = write.wrapping_sub(read);
        self.capacity - 1 - used.min(self.capacity - 1)
    }
}

// SAFETY: the buffer is only touched through the SPSC protocol above.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_to_power_of_two() {
        assert_eq!(RingBuffer::new(1000).capacity(), 1024);
        assert_eq!(RingBuffer::new(0).capacity(), 2);
    }

    #[test]
    fn write_then_read() {
        let rb = RingBuffer::new(8);
        assert_eq!(rb.write(&[1.0, 2.0, 3.0]), 3);
        let mut out = [0.0; 4];
        assert_eq!(rb.read(&mut out), 3);
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(rb.available_read(), 0);
    }

    #[test]
    fn full_buffer_keeps_one_slot_free() {
        let rb = RingBuffer::new(4);
        assert_eq!(rb.write(&[1.0; 10]), 3);
        assert_eq!(rb.available_write(), 0);
    }

    #[test]
    fn wraps_around() {
        let rb = RingBuffer::new(4);
        let mut out = [0.0; 3];
        for round in 0..5 {
            let v = round as f32;
            assert_eq!(rb.write(&[v, v + 0.5]), 2);
            assert_eq!(rb.read(&mut out), 2);
            assert_eq!(&out[..2], &[v, v + 0.5]);
        }
    }

    #[test]
    fn flush_skips_only_data_written_before_it() {
        let rb = RingBuffer::new(16);
        rb.write(&[1.0, 1.0, 1.0]);
        rb.request_flush();
        rb.write(&[2.0, 2.0]);
        assert_eq!(rb.available_read(), 2);
        let mut out = [0.0; 8];
        assert_eq!(rb.read(&mut out), 2);
        assert_eq!(&out[..2], &[2.0, 2.0]);
    }
}
