//! Geohash encoding, decoding, and prefix arithmetic.
//!
//! Every point's (x, y) location is encoded as a short base-32 string by
//! alternating longitude/latitude bisection, five bits per character. Hashes
//! that share a prefix describe nested cells, which is what lets the tree
//! group points under shared interior nodes. The empty hash `""` is the
//! "global" hash whose cell is the whole world.

use crate::error::{GeotrieError, Result};
use geo::{Coord, Point, Rect};

/// Base-32 geohash alphabet (digits plus lowercase letters, no `a/i/l/o`).
pub const GEOHASH_ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest hash the tree will index.
pub const MAX_HASH_LENGTH: usize = 16;

fn alphabet_index(byte: u8) -> Option<u8> {
    GEOHASH_ALPHABET.iter().position(|&b| b == byte).map(|i| i as u8)
}

/// Check that a hash is within the resolution bound and drawn from the
/// geohash alphabet. The empty hash is valid.
pub fn validate(hash: &str) -> Result<()> {
    if hash.len() > MAX_HASH_LENGTH {
        return Err(GeotrieError::InvalidHash(format!(
            "hash '{}' exceeds maximum resolution {}",
            hash, MAX_HASH_LENGTH
        )));
    }
    match hash.bytes().find(|&b| alphabet_index(b).is_none()) {
        Some(b) => Err(GeotrieError::InvalidHash(format!(
            "hash '{}' contains invalid character '{}'",
            hash, b as char
        ))),
        None => Ok(()),
    }
}

/// Encode a coordinate as a geohash of `resolution` characters.
///
/// Fails when the coordinate is outside lon/lat bounds or the resolution
/// exceeds [`MAX_HASH_LENGTH`].
pub fn encode(point: &Point, resolution: usize) -> Result<String> {
    let (x, y) = (point.x(), point.y());
    if resolution > MAX_HASH_LENGTH {
        return Err(GeotrieError::OutOfRange(format!(
            "resolution {} exceeds maximum {}",
            resolution, MAX_HASH_LENGTH
        )));
    }
    if !(-180.0..=180.0).contains(&x) || !(-90.0..=90.0).contains(&y) {
        return Err(GeotrieError::OutOfRange(format!(
            "coordinate ({}, {}) outside (-180..180, -90..90)",
            x, y
        )));
    }

    let mut lon = (-180.0_f64, 180.0_f64);
    let mut lat = (-90.0_f64, 90.0_f64);
    let mut hash = String::with_capacity(resolution);
    let mut index = 0usize;
    let mut bits = 0u8;
    let mut even = true; // longitude bit first

    while hash.len() < resolution {
        if even {
            let mid = (lon.0 + lon.1) / 2.0;
            if x >= mid {
                index = index * 2 + 1;
                lon.0 = mid;
            } else {
                index *= 2;
                lon.1 = mid;
            }
        } else {
            let mid = (lat.0 + lat.1) / 2.0;
            if y >= mid {
                index = index * 2 + 1;
                lat.0 = mid;
            } else {
                index *= 2;
                lat.1 = mid;
            }
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            hash.push(GEOHASH_ALPHABET[index] as char);
            bits = 0;
            index = 0;
        }
    }
    Ok(hash)
}

/// Decode a hash to the bounding box of its cell.
///
/// The empty hash decodes to the full world.
pub fn decode(hash: &str) -> Result<Rect> {
    validate(hash)?;
    let mut lon = (-180.0_f64, 180.0_f64);
    let mut lat = (-90.0_f64, 90.0_f64);
    let mut even = true;

    for byte in hash.bytes() {
        let index = alphabet_index(byte).unwrap_or_default();
        for shift in (0..5).rev() {
            let bit = (index >> shift) & 1;
            if even {
                let mid = (lon.0 + lon.1) / 2.0;
                if bit == 1 {
                    lon.0 = mid;
                } else {
                    lon.1 = mid;
                }
            } else {
                let mid = (lat.0 + lat.1) / 2.0;
                if bit == 1 {
                    lat.0 = mid;
                } else {
                    lat.1 = mid;
                }
            }
            even = !even;
        }
    }
    Ok(Rect::new(
        Coord { x: lon.0, y: lat.0 },
        Coord { x: lon.1, y: lat.1 },
    ))
}

/// Decode a hash to the midpoint of its cell.
pub fn coordinate(hash: &str) -> Result<Point> {
    let center = decode(hash)?.center();
    Ok(Point::new(center.x, center.y))
}

/// Number of leading characters two hashes share, clamped to `max_len`.
///
/// Returns `0` if either hash is empty (the global hash matches everything
/// trivially) and `-1` when two non-empty hashes share no prefix at all.
///
/// ```
/// use geotrie::hash::common_length;
///
/// assert_eq!(common_length("abcdef", "abc", 3), 3);
/// assert_eq!(common_length("abc", "", 3), 0);
/// assert_eq!(common_length("abcdef", "abcdef", 2), 2);
/// assert_eq!(common_length("abc", "1abc", 3), -1);
/// ```
pub fn common_length(a: &str, b: &str, max_len: usize) -> isize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let shared = a
        .bytes()
        .zip(b.bytes())
        .take(max_len)
        .take_while(|(x, y)| x == y)
        .count();
    if shared == 0 {
        -1
    } else {
        shared as isize
    }
}

/// The relation between an existing hash and an incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMatch {
    /// Two non-empty hashes with no shared prefix.
    None,
    /// The existing hash is the empty "global" hash.
    Global,
    /// Identical hashes.
    Same,
    /// The incoming hash nests strictly under the existing one.
    Child,
    /// The hashes diverge after a shared prefix; both sides must split.
    /// When the existing hash nests under the incoming one, the incoming
    /// leaf part comes back empty and the split is one-sided.
    Split,
}

/// Split two hashes into their unshared suffixes.
///
/// Given an existing node fragment `a` and an incoming fragment `b`, returns
/// the match classification together with fresh owned copies of the part of
/// each hash below the shared prefix. The prefix itself is implied by the
/// caller's position in the tree and is not returned.
pub fn leaf_parts(a: &str, b: &str, max_len: usize) -> Result<(HashMatch, String, String)> {
    if a.is_empty() {
        return Ok((HashMatch::Global, String::new(), b.to_string()));
    }
    if b.is_empty() {
        return Err(GeotrieError::InvalidHash(
            "cannot take leaf parts of an empty incoming hash".to_string(),
        ));
    }
    let shared = match common_length(a, b, max_len) {
        -1 => return Ok((HashMatch::None, a.to_string(), b.to_string())),
        n => n as usize,
    };
    if shared == a.len() && shared == b.len() {
        return Ok((HashMatch::Same, String::new(), String::new()));
    }
    if shared == a.len() {
        // b continues below a
        return Ok((HashMatch::Child, String::new(), b[shared..].to_string()));
    }
    // a continues below b, or both continue past the shared prefix
    Ok((
        HashMatch::Split,
        a[shared..].to_string(),
        b[shared..].to_string(),
    ))
}
