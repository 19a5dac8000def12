//! Sampling helpers used by the drawing stages.
//!
//! All helpers take the RNG explicitly so a pipeline run can use its own
//! stream (thread-local in production, seeded in tests).

use rand::Rng;

use crate::color::Color;
use crate::constants::COLOR_DIGITS;
use crate::error::{CaptchaError, Result};

/// Draw `n` elements without replacement, in random order.
///
/// Partial Fisher-Yates: only the first `n` slots are shuffled. Returns
/// `None` when `n` exceeds the number of items.
pub fn sample<T: Clone, R: Rng + ?Sized>(rng: &mut R, items: &[T], n: usize) -> Option<Vec<T>> {
    if n > items.len() {
        return None;
    }

    let mut pool = items.to_vec();
    for i in 0..n {
        let j = rng.random_range(i..pool.len());
        pool.swap(i, j);
    }
    pool.truncate(n);
    Some(pool)
}

/// Unique elements, first occurrence wins
pub fn distinct<T: Clone + PartialEq>(items: &[T]) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(item.clone());
        }
    }
    unique
}

/// Draw `n` distinct characters from `alphabet`.
///
/// Repeated symbols count once, so the result never holds duplicates.
pub fn sample_chars<R: Rng + ?Sized>(rng: &mut R, alphabet: &[char], n: usize) -> Result<Vec<char>> {
    let symbols = distinct(alphabet);
    sample(rng, &symbols, n).ok_or(CaptchaError::InsufficientAlphabet {
        alphabet: "chars",
        requested: n,
        available: symbols.len(),
    })
}

/// Build a `#xyz` color from three distinct digits of `hex_alphabet`
pub fn random_color_hex<R: Rng + ?Sized>(rng: &mut R, hex_alphabet: &[char]) -> Result<String> {
    let symbols = distinct(hex_alphabet);
    let digits = sample(rng, &symbols, COLOR_DIGITS).ok_or(CaptchaError::InsufficientAlphabet {
        alphabet: "color_hex",
        requested: COLOR_DIGITS,
        available: symbols.len(),
    })?;

    let mut color = String::with_capacity(COLOR_DIGITS + 1);
    color.push('#');
    color.extend(digits);
    Ok(color)
}

/// Random color, parsed and ready for drawing
pub fn random_color<R: Rng + ?Sized>(rng: &mut R, hex_alphabet: &[char]) -> Result<Color> {
    random_color_hex(rng, hex_alphabet)?.parse()
}

/// Uniform integer in `[lower, upper]`; reversed bounds are swapped
pub fn random_int<R: Rng + ?Sized>(rng: &mut R, lower: i64, upper: i64) -> i64 {
    let (lo, hi) = if lower <= upper { (lower, upper) } else { (upper, lower) };
    rng.random_range(lo..=hi)
}
