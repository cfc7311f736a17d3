use ndarray::NdFloat;

/// Floating-point width the engine runs in.
///
/// Both widths share one code path; the constants below only pick defaults
/// that make sense for the width's exponent range.
pub trait Precision: NdFloat + Default {
    const NAME: &'static str;
    /// Smallest positive subnormal value.
    const SMALLEST_POSITIVE: Self;
    const DEFAULT_THRESHOLD: f64;
    const DEFAULT_REL_TOL: f64;

    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Precision for f64 {
    const NAME: &'static str = "f64";
    const SMALLEST_POSITIVE: Self = f64::from_bits(1);
    const DEFAULT_THRESHOLD: f64 = 1e-56;
    const DEFAULT_REL_TOL: f64 = 1e-9;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

impl Precision for f32 {
    const NAME: &'static str = "f32";
    const SMALLEST_POSITIVE: Self = f32::from_bits(1);
    // 1e-56 is below the f32 range; keep a margin over the normal minimum.
    const DEFAULT_THRESHOLD: f64 = 1e-30;
    const DEFAULT_REL_TOL: f64 = 1e-4;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}
