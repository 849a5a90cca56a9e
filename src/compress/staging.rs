// Fixed-capacity staging buffers.
//
// A stage is allocated once when its stream is built and never resized, so
// codec calls can borrow it as a plain slice. `[pos, filled)` is the pending
// region: bytes still to be fed to the codec (input side) or still to be
// delivered to the sink/caller (output side).

#[derive(Debug)]
pub(crate) struct Stage {
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
}

impl Stage {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            pos: 0,
            filled: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes not yet consumed/delivered.
    pub(crate) fn pending(&self) -> &[u8] {
        &self.buf[self.pos..self.filled]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.filled
    }

    /// The whole backing buffer, for refilling. Callers must follow up with
    /// `refilled` to say how much of it now holds data.
    pub(crate) fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Mark `[0, filled)` as pending after a refill.
    pub(crate) fn refilled(&mut self, filled: usize) {
        debug_assert!(filled <= self.buf.len());
        self.pos = 0;
        self.filled = filled;
    }

    /// Advance past `n` pending bytes.
    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.filled);
        self.pos += n;
    }

    pub(crate) fn clear(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }

    /// Copy as many pending bytes as fit into `dst`; returns the count.
    pub(crate) fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.filled - self.pos);
        dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.consume(n);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_consume_drain() {
        let mut stage = Stage::with_capacity(8);
        assert!(stage.is_empty());
        assert_eq!(stage.capacity(), 8);

        stage.buffer_mut()[..5].copy_from_slice(b"hello");
        stage.refilled(5);
        assert_eq!(stage.pending(), b"hello");

        stage.consume(1);
        assert_eq!(stage.pending(), b"ello");

        let mut dst = [0u8; 3];
        assert_eq!(stage.drain_into(&mut dst), 3);
        assert_eq!(&dst, b"ell");
        assert_eq!(stage.pending(), b"o");

        let mut big = [0u8; 16];
        assert_eq!(stage.drain_into(&mut big), 1);
        assert!(stage.is_empty());
        assert_eq!(stage.drain_into(&mut big), 0);
    }

    #[test]
    fn clear_resets_cursors() {
        let mut stage = Stage::with_capacity(4);
        stage.refilled(4);
        stage.consume(2);
        stage.clear();
        assert!(stage.is_empty());
        assert!(stage.pending().is_empty());
    }
}
