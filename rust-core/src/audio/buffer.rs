//! Lock-free SPSC ring buffer for audio samples
//!
//! Carries mono samples from the capture callback to the DSP thread, and
//! from the DSP thread to the monitor output callback.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Frames down-mixed per `push_slice` call in [`AudioProducer::write_interleaved`]
const DOWNMIX_CHUNK: usize = 256;

/// Audio ring buffer before being split into its two ends
pub struct AudioRingBuffer {
    producer: HeapProducer<f64>,
    consumer: HeapConsumer<f64>,
    capacity: usize,
}

impl AudioRingBuffer {
    /// Create new ring buffer with given capacity in samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (producer, consumer) = HeapRb::<f64>::new(capacity).split();

        Self {
            producer,
            consumer,
            capacity,
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
                dropped: 0,
            },
            AudioConsumer {
                consumer: self.consumer,
                capacity: self.capacity,
            },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Producer end of audio ring buffer (for writing)
pub struct AudioProducer {
    producer: HeapProducer<f64>,

    /// Samples discarded because the ring was full
    dropped: u64,
}

impl AudioProducer {
    /// Write samples to buffer
    ///
    /// # Returns
    /// Number of samples actually written (may be less if buffer is full)
    pub fn write(&mut self, samples: &[f64]) -> usize {
        let written = self.producer.push_slice(samples);
        self.dropped += (samples.len() - written) as u64;
        written
    }

    /// Down-mix interleaved frames to mono and write them
    ///
    /// Uses a stack buffer, so it is safe to call from a device callback.
    pub fn write_interleaved<T, F>(&mut self, data: &[T], channels: usize, to_f64: F) -> usize
    where
        T: Copy,
        F: Fn(T) -> f64,
    {
        let channels = channels.max(1);
        let scale = 1.0 / channels as f64;
        let mut mono = [0.0f64; DOWNMIX_CHUNK];
        let mut written = 0;

        for frames in data.chunks(DOWNMIX_CHUNK * channels) {
            let mut n = 0;
            for frame in frames.chunks_exact(channels) {
                mono[n] = frame.iter().map(|&s| to_f64(s)).sum::<f64>() * scale;
                n += 1;
            }
            written += self.write(&mono[..n]);
        }
        written
    }

    /// Get number of free slots
    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Consumer end of audio ring buffer (for reading)
pub struct AudioConsumer {
    consumer: HeapConsumer<f64>,
    capacity: usize,
}

impl AudioConsumer {
    /// Read samples from buffer
    ///
    /// # Returns
    /// Number of samples actually read (may be less if buffer doesn't have enough)
    pub fn read(&mut self, buffer: &mut [f64]) -> usize {
        self.consumer.pop_slice(buffer)
    }

    /// Fill interleaved output frames, duplicating each mono sample across
    /// channels; frames with no data are zeroed
    ///
    /// # Returns
    /// Number of frames filled from the buffer
    pub fn read_interleaved<T, F>(&mut self, data: &mut [T], channels: usize, from_f64: F) -> usize
    where
        T: Copy,
        F: Fn(f64) -> T,
    {
        let channels = channels.max(1);
        let silence = from_f64(0.0);
        let mut frames_read = 0;

        for frame in data.chunks_mut(channels) {
            let value = match self.consumer.pop() {
                Some(sample) => {
                    frames_read += 1;
                    from_f64(sample)
                }
                None => silence,
            };
            frame.fill(value);
        }
        frames_read
    }

    /// Get number of available samples
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_write_read() {
        let (mut producer, mut consumer) = AudioRingBuffer::new(1024).split();

        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(producer.write(&data), 5);

        let mut output = vec![0.0; 5];
        assert_eq!(consumer.read(&mut output), 5);
        assert_eq!(output, data);
    }

    #[test]
    fn test_ring_buffer_overflow() {
        let (mut producer, mut consumer) = AudioRingBuffer::new(10).split();

        let written = producer.write(&vec![1.0; 20]);
        assert_eq!(written, 10);
        assert_eq!(producer.dropped(), 10);

        let mut output = vec![0.0; 20];
        assert_eq!(consumer.read(&mut output), written);
    }

    #[test]
    fn test_ring_buffer_underflow() {
        let (_producer, mut consumer) = AudioRingBuffer::new(1024).split();

        let mut output = vec![0.0; 10];
        assert_eq!(consumer.read(&mut output), 0);
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_write_interleaved_downmixes() {
        let (mut producer, mut consumer) = AudioRingBuffer::new(2048).split();

        // 600 stereo frames spans several down-mix chunks
        let data: Vec<f32> = (0..600).flat_map(|i| [i as f32, -(i as f32) + 2.0]).collect();
        assert_eq!(producer.write_interleaved(&data, 2, |s| s as f64), 600);

        let mut output = vec![0.0; 600];
        assert_eq!(consumer.read(&mut output), 600);
        assert!(output.iter().all(|&s| (s - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_read_interleaved_pads_with_silence() {
        let (mut producer, mut consumer) = AudioRingBuffer::new(16).split();
        producer.write(&[0.5, -0.5]);

        let mut data = [9.0f32; 8];
        let frames = consumer.read_interleaved(&mut data, 2, |s| s as f32);

        assert_eq!(frames, 2);
        assert_eq!(data, [0.5, 0.5, -0.5, -0.5, 0.0, 0.0, 0.0, 0.0]);
    }
}
