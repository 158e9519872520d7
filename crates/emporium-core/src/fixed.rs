use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Simulation time in milliseconds.
pub type Millis = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and geometry at the
/// dispatch boundary.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Milliseconds expressed as fractional seconds.
#[inline]
pub fn millis_to_secs(ms: Millis) -> Fixed64 {
    Fixed64::saturating_from_num(ms) / Fixed64::from_num(1000)
}
