//! Per-slot random numbers (PCG hash).

use glam::Vec2;

#[inline]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Hash-chain generator whose whole state is one `u32`, so it can live in
/// the path task and be reseeded per slot and sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rng(u32);

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self(pcg_hash(seed))
    }

    /// Seed for `slot` drawing its `sample`-th path.
    pub fn for_slot(seed: u32, slot: u32, sample: u32) -> Self {
        Self::new(seed ^ pcg_hash(slot.wrapping_add(pcg_hash(sample))))
    }

    pub fn state(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.0 = pcg_hash(self.0);
        self.0
    }

    /// Uniform in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    #[inline]
    pub fn next_vec2(&mut self) -> Vec2 {
        let x = self.next_f32();
        Vec2::new(x, self.next_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range() {
        let mut rng = Rng::new(7);
        for _ in 0..10_000 {
            let x = rng.next_f32();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_slots_decorrelated() {
        let a = Rng::for_slot(1, 0, 0).state();
        let b = Rng::for_slot(1, 1, 0).state();
        let c = Rng::for_slot(1, 0, 1).state();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Rng::for_slot(1, 0, 0).state());
    }

    #[test]
    fn test_mean_close_to_half() {
        let mut rng = Rng::new(42);
        let mean: f32 = (0..20_000).map(|_| rng.next_f32()).sum::<f32>() / 20_000.0;
        assert!((mean - 0.5).abs() < 0.01);
    }
}
