// Xorshift bit stream for the particle emitters
// A detonation can produce thousands of puffs; this is three shifts and three xors per draw.
// 16-bit state with the 7/9/8 triple, period 65535. Statistical quality is poor and that
// is fine for visual jitter.

/// Seeded once per emitter call
#[derive(Clone, Copy, Debug)]
pub struct Xorshift {
    state: u16,
}

impl Xorshift {
    /// Zero is a fixed point of the shift sequence and is replaced with 1
    pub fn new(seed: u16) -> Self {
        Self { state: if seed == 0 { 1 } else { seed } }
    }

    pub fn next_u16(&mut self) -> u16 {
        self.state ^= self.state << 7;
        self.state ^= self.state >> 9;
        self.state ^= self.state << 8;
        self.state
    }

    /// Uniform-ish value in (0, 1]
    pub fn next_f32(&mut self) -> f32 {
        self.next_u16() as f32 / u16::MAX as f32
    }

    /// Value in [-1, 1]
    pub fn next_signed(&mut self) -> f32 {
        self.next_f32() * 2.0 - 1.0
    }

    /// Integer in [min, max]
    pub fn range_inclusive(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        min + self.next_u16() as u32 % (max - min + 1)
    }

    /// One of -1, 0, 1
    pub fn jitter(&mut self) -> i32 {
        (self.next_u16() % 3) as i32 - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = Xorshift::new(0xBEEF);
        let mut b = Xorshift::new(0xBEEF);
        for _ in 0..100 {
            assert_eq!(a.next_u16(), b.next_u16());
        }
    }

    #[test]
    fn test_full_period() {
        let mut rng = Xorshift::new(1);
        let mut steps = 1u32;
        while rng.next_u16() != 1 {
            steps += 1;
        }
        assert_eq!(steps, 65535);
    }

    #[test]
    fn test_zero_seed_does_not_stick() {
        let mut rng = Xorshift::new(0);
        assert_ne!(rng.next_u16(), 0);
        assert_ne!(rng.next_u16(), 0);
    }

    #[test]
    fn test_ranges() {
        let mut rng = Xorshift::new(12345);
        let mut seen = [false; 5];
        for _ in 0..2000 {
            let f = rng.next_f32();
            assert!((0.0..=1.0).contains(&f));
            let s = rng.next_signed();
            assert!((-1.0..=1.0).contains(&s));
            let n = rng.range_inclusive(3, 7);
            assert!((3..=7).contains(&n));
            seen[(n - 3) as usize] = true;
            assert!((-1..=1).contains(&rng.jitter()));
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(rng.range_inclusive(4, 4), 4);
    }
}
