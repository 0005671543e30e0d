//! Easing functions.
//!
//! Each function maps normalized elapsed time `t` in [0, 1] to visual
//! progress. All of them satisfy `f(0) = 0` and `f(1) = 1`.

use serde::{Deserialize, Serialize};

#[inline]
pub fn linear(t: f64) -> f64 {
    t
}

#[inline]
pub fn quad_in(t: f64) -> f64 {
    t * t
}

#[inline]
pub fn quad_out(t: f64) -> f64 {
    t * (2.0 - t)
}

/// Accelerate through the first half, decelerate through the second.
///
/// p = 2t² for t < 0.5, otherwise 1 - 2(1 - t)²
#[inline]
pub fn quad_in_out(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        let u = 1.0 - t;
        1.0 - 2.0 * u * u
    }
}

#[inline]
pub fn cubic_in(t: f64) -> f64 {
    t * t * t
}

/// p = 1 - (1 - t)³
#[inline]
pub fn cubic_out(t: f64) -> f64 {
    let u = 1.0 - t;
    1.0 - u * u * u
}

#[inline]
pub fn cubic_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}

/// Named easing curve, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    #[default]
    CubicOut,
    CubicInOut,
}

impl Easing {
    /// Evaluate the curve at `t`.
    #[inline]
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => linear(t),
            Easing::QuadIn => quad_in(t),
            Easing::QuadOut => quad_out(t),
            Easing::QuadInOut => quad_in_out(t),
            Easing::CubicIn => cubic_in(t),
            Easing::CubicOut => cubic_out(t),
            Easing::CubicInOut => cubic_in_out(t),
        }
    }

    pub const ALL: [Easing; 7] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::CubicIn,
        Easing::CubicOut,
        Easing::CubicInOut,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quad_in_out_landmarks() {
        assert_eq!(quad_in_out(0.0), 0.0);
        assert_eq!(quad_in_out(1.0), 1.0);
        assert_eq!(quad_in_out(0.5), 0.5);
        assert!((quad_in_out(0.25) - 0.125).abs() < 1e-12);
        assert!((quad_in_out(0.75) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_cubic_out_landmarks() {
        assert_eq!(cubic_out(0.0), 0.0);
        assert_eq!(cubic_out(1.0), 1.0);
        assert!((cubic_out(0.5) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_all_curves_hit_endpoints() {
        for easing in Easing::ALL {
            assert!(easing.apply(0.0).abs() < 1e-12, "{easing:?} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-12, "{easing:?} at 1");
        }
    }

    #[test]
    fn test_easing_names_in_json() {
        let easing: Easing = serde_json::from_str("\"quad-in-out\"").unwrap();
        assert_eq!(easing, Easing::QuadInOut);
        assert_eq!(Easing::default(), Easing::CubicOut);
    }

    proptest! {
        #[test]
        fn prop_curves_are_monotonic_and_bounded(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for easing in Easing::ALL {
                let p_lo = easing.apply(lo);
                let p_hi = easing.apply(hi);
                prop_assert!(p_lo <= p_hi + 1e-12);
                prop_assert!((-1e-12..=1.0 + 1e-12).contains(&p_lo));
                prop_assert!((-1e-12..=1.0 + 1e-12).contains(&p_hi));
            }
        }
    }
}
