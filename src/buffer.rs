use arrayvec::ArrayVec;

/// Fixed-capacity receive buffer. Bytes that don't fit are refused, never
/// silently dropped from the front.
#[derive(Debug, Clone, Default)]
pub struct Buffer<const N: usize> {
    data: ArrayVec<u8, N>,
}

impl<const N: usize> Buffer<N> {
    pub fn new() -> Self {
        Self {
            data: ArrayVec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.is_full()
    }

    /// Append one byte. Returns false if the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        self.data.try_push(byte).is_ok()
    }

    pub fn last(&self) -> Option<u8> {
        self.data.last().copied()
    }

    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.data.ends_with(suffix)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Hand out the accumulated bytes and leave the buffer empty.
    pub fn take(&mut self) -> ArrayVec<u8, N> {
        core::mem::take(&mut self.data)
    }
}

impl<const N: usize> AsRef<[u8]> for Buffer<N> {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut buf = Buffer::<3>::new();
        assert!(buf.is_empty());
        assert!(buf.push(1));
        assert!(buf.push(2));
        assert!(buf.push(3));
        assert!(buf.is_full());
        assert!(!buf.push(4));
        assert_eq!(buf.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_take_empties() {
        let mut buf = Buffer::<4>::new();
        buf.push(0xEB);
        buf.push(0xAA);
        assert!(buf.ends_with(&[0xEB, 0xAA]));
        assert_eq!(buf.last(), Some(0xAA));
        let data = buf.take();
        assert_eq!(data.as_slice(), &[0xEB, 0xAA]);
        assert!(buf.is_empty());
        assert_eq!(buf.last(), None);
    }
}
