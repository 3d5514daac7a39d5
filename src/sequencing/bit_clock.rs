/// Number of bits in the counter, and so the number of note slots
pub const BIT_WIDTH: usize = 10;

/// Largest counter value before it wraps back to zero
pub const MAX_COUNTER: u16 = (1 << BIT_WIDTH) - 1;

/// Zero-padded binary pattern of `counter`, most significant bit first
pub fn bit_pattern(counter: u16) -> String {
    format!("{:0width$b}", counter & MAX_COUNTER, width = BIT_WIDTH)
}

/// Bits that went from 0 to 1 on one advance.
///
/// Indices are pattern positions: index 0 is the most significant bit and
/// index `BIT_WIDTH - 1` the least significant, the same order in which the
/// pattern string and the note slots are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RisingBits {
    mask: u16,
}

impl RisingBits {
    pub fn between(previous: u16, next: u16) -> Self {
        Self {
            mask: next & !previous & MAX_COUNTER,
        }
    }

    pub fn mask(&self) -> u16 {
        self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub fn contains(&self, index: usize) -> bool {
        index < BIT_WIDTH && self.mask & (1 << (BIT_WIDTH - 1 - index)) != 0
    }

    /// Indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..BIT_WIDTH).filter(move |&index| self.contains(index))
    }
}

impl IntoIterator for RisingBits {
    type Item = usize;
    type IntoIter = std::vec::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter().collect::<Vec<_>>().into_iter()
    }
}

/// Wrapping counter advanced once per transport tick
#[derive(Debug, Default)]
pub struct BitClock {
    counter: u16,
}

impl BitClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn pattern(&self) -> String {
        bit_pattern(self.counter)
    }

    /// Step the counter and report which bits turned on. The wrap from the
    /// maximum back to zero turns everything off and reports nothing.
    pub fn advance(&mut self) -> (u16, RisingBits) {
        let previous = self.counter;
        self.counter = if previous >= MAX_COUNTER { 0 } else { previous + 1 };
        (self.counter, RisingBits::between(previous, self.counter))
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_matches_rising_edges_for_every_counter() {
        let mut clock = BitClock::new();

        for previous in 0..=MAX_COUNTER {
            assert_eq!(clock.counter(), previous);
            let (next, rising) = clock.advance();

            let expected_next = (previous + 1) % (MAX_COUNTER + 1);
            assert_eq!(next, expected_next);

            let previous_pattern: Vec<char> = bit_pattern(previous).chars().collect();
            let next_pattern: Vec<char> = bit_pattern(next).chars().collect();
            let expected: Vec<usize> = (0..BIT_WIDTH)
                .filter(|&i| next_pattern[i] == '1' && previous_pattern[i] != '1')
                .collect();

            assert_eq!(rising.iter().collect::<Vec<_>>(), expected, "from {}", previous);
        }

        // Back where we started after a full cycle
        assert_eq!(clock.counter(), 0);
    }

    #[test]
    fn test_wrap_is_silent() {
        let mut clock = BitClock::new();
        for _ in 0..MAX_COUNTER {
            clock.advance();
        }
        assert_eq!(clock.pattern(), "1111111111");

        let (counter, rising) = clock.advance();
        assert_eq!(counter, 0);
        assert!(rising.is_empty());
        assert_eq!(rising.len(), 0);
    }

    #[test]
    fn test_first_advance_fires_least_significant_bit() {
        let mut clock = BitClock::new();
        let (counter, rising) = clock.advance();

        assert_eq!(counter, 1);
        assert_eq!(clock.pattern(), "0000000001");
        assert_eq!(rising.into_iter().collect::<Vec<_>>(), vec![BIT_WIDTH - 1]);
    }

    #[test]
    fn test_rising_bits_are_ascending() {
        // 0111111111 -> 1000000000 only raises the top bit
        let rising = RisingBits::between(0b0111111111, 0b1000000000);
        assert_eq!(rising.iter().collect::<Vec<_>>(), vec![0]);

        // 0000000101 -> 0000000110 raises bit index 8
        let rising = RisingBits::between(0b101, 0b110);
        assert_eq!(rising.iter().collect::<Vec<_>>(), vec![8]);

        let rising = RisingBits::between(0, 0b1000000011);
        assert_eq!(rising.iter().collect::<Vec<_>>(), vec![0, 8, 9]);
        assert!(rising.contains(0));
        assert!(!rising.contains(1));
        assert!(!rising.contains(BIT_WIDTH));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut clock = BitClock::new();
        for _ in 0..37 {
            clock.advance();
        }

        clock.reset();
        clock.reset();
        clock.reset();
        assert_eq!(clock.counter(), 0);
        assert_eq!(clock.pattern(), "0000000000");
    }

    #[test]
    fn test_bit_pattern_formatting() {
        assert_eq!(bit_pattern(0), "0000000000");
        assert_eq!(bit_pattern(5), "0000000101");
        assert_eq!(bit_pattern(MAX_COUNTER), "1111111111");
    }
}
