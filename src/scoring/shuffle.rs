// src/scoring/shuffle.rs

/// Derives a shuffle seed from a (student, question) pair.
///
/// Polynomial rolling hash over the UTF-16 code units of
/// `"<student_id>-<question_id>"`, folded into a 32-bit signed integer.
/// Collision-tolerant, not cryptographic: two students colliding on a seed
/// merely see the same option order.
pub fn derive_seed(student_id: &str, question_id: i64) -> u32 {
    let key = format!("{student_id}-{question_id}");
    let mut hash: i32 = 0;
    for unit in key.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}

/// Small linear-congruential generator. Reseeded per (student, question),
/// so identical inputs always replay the identical stream.
#[derive(Debug, Clone)]
pub struct SeededRng {
    seed: u64,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        Self {
            seed: u64::from(seed),
        }
    }

    /// Next value in `[0, 1)`.
    pub fn next(&mut self) -> f64 {
        self.seed = (self.seed * 9301 + 49297) % 233280;
        self.seed as f64 / 233280.0
    }

    /// Fisher-Yates, iterating from the last index down, each step swapping
    /// with a generated index in `[0, i]`.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = (self.next() * (i as f64 + 1.0)) as usize;
            items.swap(i, j);
        }
    }
}
