//! LZ-UTF8 block codec, the compression layer of the sync envelope.
//!
//! Any byte whose top two bits are not `11` is a literal. `110lllll dddddddd`
//! and `111lllll dddddddd dddddddd` are back-references of length `l` at
//! distance `d`. A `11xxxxxx` byte followed by a byte with the high bit set is
//! a UTF-8 lead byte and therefore a literal too. That rule only holds for
//! UTF-8 input, so [`compress`] takes `&str`.

use std::collections::HashMap;
use thiserror::Error;

const MIN_MATCH: usize = 4;
const MAX_MATCH: usize = 31;
const MAX_DISTANCE: usize = 32767;
const HASH_BUCKETS: u64 = 65537;
const BUCKET_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated back-reference at byte {offset}")]
    Truncated { offset: usize },
    #[error("back-reference at byte {offset} reaches {distance} bytes behind the output")]
    BadDistance { offset: usize, distance: usize },
    #[error("output exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

pub fn compress(input: &str) -> Vec<u8> {
    let input = input.as_bytes();
    let mut out = Vec::with_capacity(input.len() / 2 + 8);
    let mut buckets: HashMap<u32, Vec<usize>> = HashMap::new();
    let mut covered_until = 0;

    for (pos, &byte) in input.iter().enumerate() {
        let in_match = pos < covered_until;
        // too close to the end to start a match
        if pos + MIN_MATCH > input.len() {
            if !in_match {
                out.push(byte);
            }
            continue;
        }

        let bucket = prefix_hash(&input[pos..pos + MIN_MATCH]);
        if !in_match {
            match buckets.get(&bucket).and_then(|c| longest_match(input, pos, c)) {
                Some((length, distance)) => {
                    push_reference(&mut out, length, distance);
                    covered_until = pos + length;
                }
                None => out.push(byte),
            }
        }

        let candidates = buckets.entry(bucket).or_default();
        if candidates.len() == BUCKET_CAPACITY - 1 {
            candidates.drain(..candidates.len() - BUCKET_CAPACITY / 2);
        }
        candidates.push(pos);
    }
    out
}

/// Expand a compressed block, refusing to produce more than `limit` bytes.
pub fn decompress(input: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
    let mut out: Vec<u8> = Vec::with_capacity(input.len().saturating_mul(2).min(limit));
    let mut pos = 0;
    while pos < input.len() {
        let byte = input[pos];
        let next = input.get(pos + 1).copied();

        if byte >> 6 != 3 || next.is_some_and(|b| b >> 7 == 1) {
            if out.len() >= limit {
                return Err(DecodeError::TooLarge { limit });
            }
            out.push(byte);
            pos += 1;
            continue;
        }

        let length = usize::from(byte & 0x1F);
        let (distance, width) = if byte >> 5 == 6 {
            (next.map(usize::from), 2)
        } else {
            let low = input.get(pos + 2).copied();
            (next.zip(low).map(|(hi, lo)| (usize::from(hi) << 8) | usize::from(lo)), 3)
        };
        let distance = distance.ok_or(DecodeError::Truncated { offset: pos })?;
        if distance == 0 || distance > out.len() {
            return Err(DecodeError::BadDistance { offset: pos, distance });
        }
        if out.len() + length > limit {
            return Err(DecodeError::TooLarge { limit });
        }

        // byte by byte, a reference may overlap what it produces
        let start = out.len() - distance;
        for i in 0..length {
            let b = out[start + i];
            out.push(b);
        }
        pos += width;
    }
    Ok(out)
}

fn prefix_hash(prefix: &[u8]) -> u32 {
    let [a, b, c, d] = [prefix[0], prefix[1], prefix[2], prefix[3]].map(u64::from);
    ((a * 7_880_599 + b * 39_601 + c * 199 + d) % HASH_BUCKETS) as u32
}

/// Newest candidate first. A far match only replaces a near one when it is
/// half again as long, since its reference is a byte longer.
fn longest_match(input: &[u8], pos: usize, candidates: &[usize]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for &candidate in candidates.iter().rev() {
        let distance = pos - candidate;
        let to_beat = match best {
            None => MIN_MATCH - 1,
            Some((length, best_distance)) if best_distance < 128 && distance >= 128 => length + (length >> 1),
            Some((length, _)) => length,
        };
        if distance > MAX_DISTANCE || to_beat >= MAX_MATCH || pos + to_beat >= input.len() {
            break;
        }
        if input[candidate + to_beat] != input[pos + to_beat] {
            continue;
        }

        let mut length = 0;
        loop {
            if pos + length == input.len() || input[candidate + length] != input[pos + length] {
                if length > to_beat {
                    best = Some((length, distance));
                }
                break;
            }
            if length == MAX_MATCH {
                return Some((MAX_MATCH, distance));
            }
            length += 1;
        }
    }
    best
}

fn push_reference(out: &mut Vec<u8>, length: usize, distance: usize) {
    let length = length as u8;
    if distance < 128 {
        out.extend_from_slice(&[0xC0 | length, distance as u8]);
    } else {
        out.extend_from_slice(&[0xE0 | length, (distance >> 8) as u8, (distance & 0xFF) as u8]);
    }
}
