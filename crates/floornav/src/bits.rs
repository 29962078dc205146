/// A growable bit-set, sized per search to the number of floors, waypoints or triangles involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub(crate) fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
        }
    }

    #[inline]
    pub(crate) fn contains(&self, bit: usize) -> bool {
        self.words
            .get(bit / 64)
            .is_some_and(|word| word & (1_u64 << (bit % 64)) != 0)
    }

    #[inline]
    pub(crate) fn insert(&mut self, bit: usize) {
        let word = bit / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1_u64 << (bit % 64);
    }

    #[inline]
    pub(crate) fn remove(&mut self, bit: usize) {
        if let Some(word) = self.words.get_mut(bit / 64) {
            *word &= !(1_u64 << (bit % 64));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_past_initial_len() {
        let mut bits = BitSet::with_len(10);
        bits.insert(3);
        bits.insert(4000);
        assert!(bits.contains(3));
        assert!(bits.contains(4000));
        assert!(!bits.contains(4001));
        bits.remove(4000);
        assert!(!bits.contains(4000));
    }
}
