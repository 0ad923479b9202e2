//! Packed validity bitmap (bit set = value present).

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u8>,
    len: usize,
}

impl Bitmap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            bits: Vec::with_capacity(Self::bytes_for(n)),
            len: 0,
        }
    }

    /// Bytes needed to hold `n` bits.
    pub fn bytes_for(n: usize) -> usize {
        (n + 7) / 8
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn reserve(&mut self, additional: usize) {
        let want = Self::bytes_for(self.len + additional);
        self.bits.reserve(want.saturating_sub(self.bits.len()));
    }

    pub fn push(&mut self, set: bool) {
        let byte = self.len / 8;
        if byte == self.bits.len() {
            self.bits.push(0);
        }
        if set {
            self.bits[byte] |= 1 << (self.len % 8);
        }
        self.len += 1;
    }

    /// Bit `i`; out-of-range reads as unset.
    pub fn get(&self, i: usize) -> bool {
        if i >= self.len {
            return false;
        }
        self.bits[i / 8] & (1 << (i % 8)) != 0
    }

    /// Number of set bits in `[offset, offset + len)`.
    pub fn count_set(&self, offset: usize, len: usize) -> usize {
        let end = (offset + len).min(self.len);
        (offset..end).filter(|&i| self.get(i)).count()
    }

    pub fn byte_len(&self) -> usize {
        self.bits.len()
    }
}
