use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::f64::consts::TAU;

/// u1 is floored here so ln(u1) stays finite
const U1_FLOOR: f64 = 1e-15;

/// One Box-Muller draw: two independent N(0,1) samples from two uniforms.
///
/// Z1 = sqrt(-2 ln U1) cos(2 pi U2)
/// Z2 = sqrt(-2 ln U1) sin(2 pi U2)
#[inline]
pub fn box_muller_pair<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    let u1 = rng.gen::<f64>().max(U1_FLOOR);
    let u2 = rng.gen::<f64>();
    let mag = (-2.0 * u1.ln()).sqrt();
    let (sin, cos) = (TAU * u2).sin_cos();
    (mag * cos, mag * sin)
}

/// `n` standard normal samples. Pairs are emitted in draw order and the last
/// sample of an odd request is discarded.
pub fn box_muller<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    let mut out = Vec::with_capacity(n + 1);
    while out.len() < n {
        let (z1, z2) = box_muller_pair(rng);
        out.push(z1);
        out.push(z2);
    }
    out.truncate(n);
    out
}

pub fn box_muller_seeded(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Pcg64::seed_from_u64(seed);
    box_muller(n, &mut rng)
}
