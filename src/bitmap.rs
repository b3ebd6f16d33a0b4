//! Side bitmap - one bit per price slot, packed into 64-bit words.
//!
//! Bit set ⇔ the corresponding price level is non-empty. Best-price
//! searches scan one word per 64 prices using the hardware leading/
//! trailing-zero count, starting from a cached word near the previous
//! best, so they are amortised O(1) under locality-preserving workloads.

/// Word-packed occupancy bitmap for one book side.
pub struct SideBitmap {
    words: Vec<u64>,
}

impl SideBitmap {
    /// Create a bitmap covering `bits` price slots.
    ///
    /// # Panics
    /// Panics if `bits` is zero or not a multiple of 64.
    pub fn new(bits: usize) -> Self {
        assert!(bits > 0 && bits % 64 == 0, "bitmap size must be a non-zero multiple of 64");
        Self {
            words: vec![0u64; bits / 64],
        }
    }

    #[inline]
    pub fn len_bits(&self) -> usize {
        self.words.len() * 64
    }

    #[inline]
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn set(&mut self, idx: usize) {
        self.words[idx >> 6] |= 1u64 << (idx & 63);
    }

    #[inline]
    pub fn clear(&mut self, idx: usize) {
        self.words[idx >> 6] &= !(1u64 << (idx & 63));
    }

    #[inline]
    pub fn test(&self, idx: usize) -> bool {
        self.words[idx >> 6] & (1u64 << (idx & 63)) != 0
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Highest set bit at or below word `start_word`, scanning downward.
    ///
    /// `start_word` may be -1 (empty-side cache) or past the end; both are
    /// clamped. Used to re-find the best bid after its level empties.
    pub fn highest_set_from(&self, start_word: i64) -> Option<usize> {
        let mut w = start_word.min(self.words.len() as i64 - 1);
        while w >= 0 {
            let word = self.words[w as usize];
            if word != 0 {
                let bit = 63 - word.leading_zeros() as usize;
                return Some((w as usize) * 64 + bit);
            }
            w -= 1;
        }
        None
    }

    /// Lowest set bit at or above word `start_word`, scanning upward.
    ///
    /// Used to re-find the best ask after its level empties.
    pub fn lowest_set_from(&self, start_word: usize) -> Option<usize> {
        for w in start_word..self.words.len() {
            let word = self.words[w];
            if word != 0 {
                return Some(w * 64 + word.trailing_zeros() as usize);
            }
        }
        None
    }

    /// Lowest set bit with index >= `idx`.
    pub fn next_set_geq(&self, idx: usize) -> Option<usize> {
        if idx >= self.len_bits() {
            return None;
        }
        let mut w = idx >> 6;
        let mut word = self.words[w] & (!0u64 << (idx & 63));
        loop {
            if word != 0 {
                return Some(w * 64 + word.trailing_zeros() as usize);
            }
            w += 1;
            if w == self.words.len() {
                return None;
            }
            word = self.words[w];
        }
    }

    /// Highest set bit with index <= `idx`.
    pub fn next_set_leq(&self, idx: usize) -> Option<usize> {
        let idx = idx.min(self.len_bits() - 1);
        let mut w = idx >> 6;
        let mut word = self.words[w] & (!0u64 >> (63 - (idx & 63)));
        loop {
            if word != 0 {
                let bit = 63 - word.leading_zeros() as usize;
                return Some(w * 64 + bit);
            }
            if w == 0 {
                return None;
            }
            w -= 1;
            word = self.words[w];
        }
    }

    /// Pre-fault the word array.
    pub fn warm_up(&mut self) {
        for word in &mut self.words {
            unsafe {
                let v = std::ptr::read_volatile(word);
                std::ptr::write_volatile(word, v);
            }
        }
    }
}
