//! 64-bit SimHash fingerprints
//!
//! Similar texts produce fingerprints that differ in few bits, so the Hamming
//! distance between two fingerprints approximates how different the texts
//! are. Features are overlapping character shingles of the text after
//! lower-casing and removing everything but word characters, which makes the
//! fingerprint insensitive to case, whitespace and punctuation changes.

/// Characters per shingle
const SHINGLE_WIDTH: usize = 4;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// SimHash fingerprint of a text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Compute the fingerprint of `text`
    pub fn of(text: &str) -> Self {
        let mut weights = [0i64; 64];

        for feature in shingles(text) {
            let hash = fnv1a(feature.as_bytes());
            for (bit, weight) in weights.iter_mut().enumerate() {
                if hash >> bit & 1 == 1 {
                    *weight += 1;
                } else {
                    *weight -= 1;
                }
            }
        }

        let value = weights
            .iter()
            .enumerate()
            .filter(|(_, weight)| **weight > 0)
            .fold(0u64, |acc, (bit, _)| acc | 1 << bit);
        Self(value)
    }

    /// Number of differing bits
    pub fn distance(self, other: Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

/// Overlapping shingles of the normalized text
///
/// Texts shorter than one shingle yield a single feature.
fn shingles(text: &str) -> Vec<String> {
    let chars: Vec<char> = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect();

    if chars.len() <= SHINGLE_WIDTH {
        return vec![chars.into_iter().collect()];
    }
    chars
        .windows(SHINGLE_WIDTH)
        .map(|window| window.iter().collect())
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: &str = "Hi Sam, thanks for sending over the quarterly numbers. \
        I had a look through them this morning and everything lines up with \
        what we discussed last week. Let's catch up on Thursday.";

    #[test]
    fn test_identical_texts_have_zero_distance() {
        assert_eq!(Fingerprint::of(LETTER).distance(Fingerprint::of(LETTER)), 0);
    }

    #[test]
    fn test_ignores_case_whitespace_and_punctuation() {
        let reflowed = LETTER.to_uppercase().replace(", ", ",\r\n").replace('.', "");
        assert_eq!(Fingerprint::of(LETTER), Fingerprint::of(&reflowed));
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Fingerprint::of(LETTER);
        let b = Fingerprint::of("Completely unrelated text about gardening and tomatoes.");
        assert_eq!(a.distance(b), b.distance(a));
        assert!(a.distance(b) > 0);
    }

    #[test]
    fn test_short_text_is_one_feature() {
        assert_eq!(shingles("Hi!"), vec!["hi".to_string()]);
        assert_eq!(shingles("abcdef"), vec!["abcd", "bcde", "cdef"]);
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
