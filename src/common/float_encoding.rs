// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sortable bit encodings for IEEE-754 floats
//!
//! Float columns are stored as `i32` and double columns as `i64` using a
//! monotonic transform of the raw bit pattern. For every pair of non-NaN
//! values `a < b` the encodings satisfy `enc(a) < enc(b)`, so plain integer
//! range scans on the encoded column order floating-point values correctly,
//! including across the sign boundary. `-0.0` encodes just below `+0.0`,
//! infinities sit at the ends of the finite range and NaN (positive payload)
//! sorts above `+inf`.

const FLOAT_SIGN_FLIP: i32 = i32::MIN;
const DOUBLE_SIGN_FLIP: i64 = i64::MIN;

/// Encode an `f32` into its sortable `i32` form
#[inline]
pub fn float_to_sortable_int(value: f32) -> i32 {
    let bits = value.to_bits() as i32;
    if bits < 0 {
        !bits ^ FLOAT_SIGN_FLIP
    } else {
        bits
    }
}

/// Decode a sortable `i32` back into the original `f32`
#[inline]
pub fn sortable_int_to_float(sortable: i32) -> f32 {
    let bits = if sortable < 0 {
        !(sortable ^ FLOAT_SIGN_FLIP)
    } else {
        sortable
    };
    f32::from_bits(bits as u32)
}

/// Encode an `f64` into its sortable `i64` form
#[inline]
pub fn double_to_sortable_long(value: f64) -> i64 {
    let bits = value.to_bits() as i64;
    if bits < 0 {
        !bits ^ DOUBLE_SIGN_FLIP
    } else {
        bits
    }
}

/// Decode a sortable `i64` back into the original `f64`
#[inline]
pub fn sortable_long_to_double(sortable: i64) -> f64 {
    let bits = if sortable < 0 {
        !(sortable ^ DOUBLE_SIGN_FLIP)
    } else {
        sortable
    };
    f64::from_bits(bits as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_roundtrip() {
        for v in [0.0f32, -0.0, 1.5, -1.5, f32::MIN, f32::MAX, f32::INFINITY, f32::NEG_INFINITY] {
            assert_eq!(sortable_int_to_float(float_to_sortable_int(v)).to_bits(), v.to_bits());
        }
        assert!(sortable_int_to_float(float_to_sortable_int(f32::NAN)).is_nan());
    }

    #[test]
    fn test_double_roundtrip() {
        for v in [0.0f64, -0.0, 2.25, -2.25, f64::MIN_POSITIVE, f64::MAX, f64::NEG_INFINITY] {
            assert_eq!(
                sortable_long_to_double(double_to_sortable_long(v)).to_bits(),
                v.to_bits()
            );
        }
    }

    #[test]
    fn test_float_encoding_is_monotonic() {
        let ordered = [
            f32::NEG_INFINITY,
            -1000.0,
            -1.0,
            -f32::MIN_POSITIVE,
            -0.0,
            0.0,
            f32::MIN_POSITIVE,
            1.0,
            1000.0,
            f32::INFINITY,
        ];
        for pair in ordered.windows(2) {
            assert!(
                float_to_sortable_int(pair[0]) < float_to_sortable_int(pair[1]),
                "{} should encode below {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_double_encoding_is_monotonic() {
        let ordered = [f64::NEG_INFINITY, -3.5, -0.0, 0.0, 0.1, 3.5, f64::INFINITY];
        for pair in ordered.windows(2) {
            assert!(double_to_sortable_long(pair[0]) < double_to_sortable_long(pair[1]));
        }
        assert!(double_to_sortable_long(f64::NAN) > double_to_sortable_long(f64::INFINITY));
    }
}
