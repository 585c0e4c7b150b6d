//! Sample-level helpers shared by the track and mixing code
//!
//! Everything here is allocation-free and safe to call per sample.

// ============================================================================
// Constants
// ============================================================================

/// Upper bound of the soft clipper output (strictly below full scale)
pub const SOFT_CLIP_CEILING: f32 = 0.999;

// ============================================================================
// Level Helpers
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns `f32::NEG_INFINITY` for zero or negative input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Convert a duration in milliseconds to a whole number of samples
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    if ms <= 0.0 || sample_rate <= 0.0 {
        0
    } else {
        (ms * 0.001 * sample_rate).round() as usize
    }
}

// ============================================================================
// Safety Stages
// ============================================================================

/// Replace NaN and infinities with silence
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Bounded saturation used by every summing stage
///
/// The identity up to [`SOFT_CLIP_CEILING`] and flat above it, so the
/// curve is odd, monotonic and idempotent: anything it outputs passes
/// through it unchanged. Non-finite input maps to silence.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    let x = sanitize(x);
    if x.abs() <= SOFT_CLIP_CEILING {
        x
    } else {
        SOFT_CLIP_CEILING.copysign(x)
    }
}

/// Apply [`soft_clip`] to a whole channel in place
pub fn soft_clip_slice(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        *sample = soft_clip(*sample);
    }
}

// ============================================================================
// Interpolation
// ============================================================================

/// Linear interpolation between two samples
#[inline]
pub fn lerp(a: f32, b: f32, frac: f32) -> f32 {
    a + (b - a) * frac
}

/// 4-point, 3rd-order Hermite interpolation
///
/// `frac` is the position between `x0` and `x1`.
#[inline]
pub fn hermite(xm1: f32, x0: f32, x1: f32, x2: f32, frac: f32) -> f32 {
    let c0 = x0;
    let c1 = 0.5 * (x1 - xm1);
    let c2 = xm1 - 2.5 * x0 + 2.0 * x1 - 0.5 * x2;
    let c3 = 0.5 * (x2 - xm1) + 1.5 * (x0 - x1);
    ((c3 * frac + c2) * frac + c1) * frac + c0
}

/// Wrap `index` into `[start, start + len)`
#[inline]
pub fn wrap_index(index: isize, start: usize, len: usize) -> usize {
    debug_assert!(len > 0);
    let offset = (index - start as isize).rem_euclid(len as isize) as usize;
    start + offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_soft_clip_identity_below_ceiling() {
        for &x in &[0.0_f32, 0.1, -0.25, 0.5, -0.89, 0.95, SOFT_CLIP_CEILING] {
            assert_eq!(soft_clip(x), x);
        }
    }

    #[test]
    fn test_soft_clip_bounded() {
        for &x in &[1.0_f32, 2.0, 10.0, 1.0e6, f32::MAX, -3.0, -f32::MAX] {
            let y = soft_clip(x);
            assert!(y.abs() < 1.0, "clip({}) = {}", x, y);
        }
    }

    #[test]
    fn test_soft_clip_monotonic() {
        let mut previous = soft_clip(-20.0);
        let mut x = -20.0_f32;
        while x <= 20.0 {
            let y = soft_clip(x);
            assert!(y >= previous, "not monotonic at {}", x);
            previous = y;
            x += 0.001;
        }
    }

    #[test]
    fn test_soft_clip_idempotent() {
        let mut x = -4.0_f32;
        while x <= 4.0 {
            assert_eq!(soft_clip(soft_clip(x)), soft_clip(x), "x = {}", x);
            x += 0.001;
        }
        for &x in &[0.95_f32, 1.0, 1.5, 3.0, 1.0e6, -1.0e6, f32::MAX] {
            assert_eq!(soft_clip(soft_clip(x)), soft_clip(x), "x = {}", x);
        }
    }

    #[test]
    fn test_soft_clip_non_finite() {
        assert_eq!(soft_clip(f32::NAN), 0.0);
        assert_eq!(soft_clip(f32::INFINITY), 0.0);
        assert_eq!(sanitize(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_hermite_hits_sample_points() {
        assert_relative_eq!(hermite(0.0, 1.0, 2.0, 3.0, 0.0), 1.0);
        assert_relative_eq!(hermite(0.0, 1.0, 2.0, 3.0, 0.5), 1.5);
        assert_relative_eq!(hermite(0.0, 1.0, 2.0, 3.0, 1.0), 2.0);
    }

    #[test]
    fn test_wrap_index() {
        assert_eq!(wrap_index(10, 4, 6), 4);
        assert_eq!(wrap_index(3, 4, 6), 9);
        assert_eq!(wrap_index(-1, 0, 8), 7);
    }

    #[test]
    fn test_ms_to_samples() {
        assert_eq!(ms_to_samples(10.0, 48000.0), 480);
        assert_eq!(ms_to_samples(-1.0, 48000.0), 0);
    }

    #[test]
    fn test_db_round_trip() {
        assert_relative_eq!(db_to_linear(0.0), 1.0);
        assert_relative_eq!(linear_to_db(db_to_linear(-6.0)), -6.0, epsilon = 1e-4);
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
    }
}
