// src/scoring/randomizer.rs

use crate::scoring::shuffle::{SeededRng, derive_seed};

/// A per-student view of a question's options.
///
/// `original_index_of[shown] = canonical` maps an on-screen position back to
/// the canonical option index, which is what gets stored and graded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomizedOptions {
    pub options: Vec<String>,
    /// Position of the correct option in the shuffled list, or `None` when
    /// the canonical correct-answer text matches no option. Callers must
    /// treat `None` as ungradable, never as incorrect.
    pub correct_index: Option<usize>,
    pub original_index_of: Vec<usize>,
}

impl RandomizedOptions {
    /// Translates a student's on-screen selection to the canonical index.
    /// `None` when the selection is out of range.
    pub fn canonical_index(&self, shown_index: usize) -> Option<usize> {
        self.original_index_of.get(shown_index).copied()
    }
}

/// Shuffles a question's options deterministically for one student.
///
/// The same (student, question) pair always yields the same order, so the
/// student sees a stable paper across reloads while different students see
/// decorrelated option orders. The correct option is located by text
/// equality against `correct_answer`; on duplicate texts the first match
/// wins.
pub fn randomize_options(
    student_id: &str,
    question_id: i64,
    options: &[String],
    correct_answer: &str,
) -> RandomizedOptions {
    let mut rng = SeededRng::new(derive_seed(student_id, question_id));

    let mut order: Vec<usize> = (0..options.len()).collect();
    rng.shuffle(&mut order);

    let shuffled: Vec<String> = order.iter().map(|&i| options[i].clone()).collect();
    let correct_index = shuffled.iter().position(|opt| opt == correct_answer);

    RandomizedOptions {
        options: shuffled,
        correct_index,
        original_index_of: order,
    }
}
