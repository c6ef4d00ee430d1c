//! Random number sources for DECLARE_RNG and GET_RANDOM_NUMBER

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_B0DF;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7FFF_FFFF;

/// 32-bit Mersenne Twister (MT19937)
#[derive(Clone)]
pub struct MersenneTwister {
    state: Box<[u32; N]>,
    index: usize,
}

impl MersenneTwister {
    pub fn new(seed: u32) -> Self {
        let mut state = Box::new([0u32; N]);
        state[0] = seed;
        for i in 1..N {
            let previous = state[i - 1];
            state[i] = 1_812_433_253u32
                .wrapping_mul(previous ^ (previous >> 30))
                .wrapping_add(i as u32);
        }
        MersenneTwister { state, index: N }
    }

    pub fn next_u32(&mut self) -> u32 {
        if self.index >= N {
            self.twist();
        }
        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C_5680;
        y ^= (y << 15) & 0xEFC6_0000;
        y ^ (y >> 18)
    }

    fn twist(&mut self) {
        for i in 0..N {
            let x = (self.state[i] & UPPER_MASK) | (self.state[(i + 1) % N] & LOWER_MASK);
            let mut shifted = x >> 1;
            if x & 1 != 0 {
                shifted ^= MATRIX_A;
            }
            self.state[i] = self.state[(i + M) % N] ^ shifted;
        }
        self.index = 0;
    }
}

impl std::fmt::Debug for MersenneTwister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MersenneTwister")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Uniform distribution over raw S16.15 bounds, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDistribution {
    pub rng: u8,
    pub min: i32,
    pub max: i32,
}

impl UniformDistribution {
    /// Scale a 32-bit draw into `[min, max]`
    pub fn sample(&self, draw: u32) -> i32 {
        let span = (self.max as i64 - self.min as i64 + 1) as u64;
        let offset = (draw as u64 * span) >> 32;
        (self.min as i64 + offset as i64) as i32
    }
}
