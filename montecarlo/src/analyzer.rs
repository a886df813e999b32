use crate::{
    game::{MultiDieGame, WideResults},
    Error, Face, Result,
};
use itertools::Itertools;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

////////////////
// FaceCounts //
////////////////

/// Per-roll face frequencies: `counts[[roll, i]]` is how many dice showed
/// `faces[i]` on roll `roll`. `faces` is the sorted set of every face that
/// appeared anywhere in the play.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceCounts<F> {
    faces: Vec<F>,
    counts: Array2<usize>,
}

impl<F: Face> FaceCounts<F> {
    #[inline]
    pub fn faces(&self) -> &[F] {
        &self.faces
    }

    /// `(rolls, distinct faces)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.counts.dim()
    }

    /// How many dice showed `face` on roll `roll`. `None` if the roll is out of
    /// range or the face never appeared in the play.
    pub fn get(&self, roll: usize, face: &F) -> Option<usize> {
        let idx = self.faces.binary_search(face).ok()?;
        self.counts.get((roll, idx)).copied()
    }

    /// All face counts for one roll, in `faces()` order. `None` if the roll is
    /// out of range.
    pub fn row(&self, roll: usize) -> Option<ArrayView1<'_, usize>> {
        if roll < self.counts.nrows() {
            Some(self.counts.row(roll))
        } else {
            None
        }
    }

    #[inline]
    pub fn as_array(&self) -> &Array2<usize> {
        &self.counts
    }
}

/////////////////
// TupleCounts //
/////////////////

/// Occurrence counts of distinct per-roll outcome tuples, most common first
/// (ties broken by tuple order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleCounts<F> {
    rows: Vec<(Vec<F>, usize)>,
}

impl<F: Face> TupleCounts<F> {
    fn from_tuples(tuples: impl Iterator<Item = Vec<F>>) -> Self {
        let mut counts = BTreeMap::<Vec<F>, usize>::new();
        for tuple in tuples {
            *counts.entry(tuple).or_insert(0) += 1;
        }

        let mut rows = counts.into_iter().collect::<Vec<_>>();
        // stable sort, so equal counts keep the map's tuple order
        rows.sort_by(|(_, count1), (_, count2)| count2.cmp(count1));

        Self { rows }
    }

    /// The number of distinct tuples.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The sum of all counts, i.e., the number of rolls.
    pub fn total(&self) -> usize {
        self.rows.iter().map(|(_, count)| count).sum()
    }

    pub fn get(&self, tuple: &[F]) -> Option<usize> {
        self.rows
            .iter()
            .find(|(t, _)| t.as_slice() == tuple)
            .map(|(_, count)| *count)
    }

    #[inline]
    pub fn rows(&self) -> &[(Vec<F>, usize)] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (Vec<F>, usize)> {
        self.rows.iter()
    }
}

////////////////////
// ResultAnalyzer //
////////////////////

/// Summary statistics over a single play. The analyzer owns a copy of the
/// play's table, so later plays of the source game don't affect it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultAnalyzer<F> {
    results: WideResults<F>,
}

impl<F: Face> ResultAnalyzer<F> {
    /// Snapshot the most recent play of `game`. Fails with
    /// [`Error::InvalidArgument`] if the game was never played.
    pub fn new(game: &MultiDieGame<'_, F>) -> Result<Self> {
        let results = game.results().cloned().ok_or_else(|| {
            Error::InvalidArgument("cannot analyze a game that has never been played".to_owned())
        })?;

        log::debug!("analyzer: snapshot of {:?} results", results.shape());
        Ok(Self { results })
    }

    /// Analyze a results table that didn't come from a [`MultiDieGame`], e.g. a
    /// recorded session built with [`WideResults::from_rows`].
    pub fn from_results(results: WideResults<F>) -> Self {
        Self { results }
    }

    #[inline]
    pub fn results(&self) -> &WideResults<F> {
        &self.results
    }

    /// The number of rolls where every die showed the same face. With a single
    /// die every roll is a jackpot.
    pub fn jackpot(&self) -> usize {
        self.results
            .rows()
            .filter(|row| !row.is_empty() && row.iter().all_equal())
            .count()
    }

    /// For each roll, how many dice showed each face. Faces that never appeared
    /// on a given roll count `0`.
    pub fn face_counts_per_roll(&self) -> FaceCounts<F> {
        let faces = self
            .results
            .as_array()
            .iter()
            .cloned()
            .sorted()
            .dedup()
            .collect::<Vec<_>>();

        let mut counts = Array2::<usize>::zeros((self.results.nrolls(), faces.len()));
        for (roll, row) in self.results.rows().enumerate() {
            for face in row.iter() {
                // every outcome is in `faces` by construction
                if let Ok(idx) = faces.binary_search(face) {
                    counts[[roll, idx]] += 1;
                }
            }
        }

        FaceCounts { faces, counts }
    }

    /// Counts of each distinct combination, i.e., the outcomes of a roll with
    /// die order ignored. `[1, 6]` and `[6, 1]` are both the combo `[1, 6]`.
    pub fn combo_counts(&self) -> TupleCounts<F> {
        TupleCounts::from_tuples(
            self.results
                .rows()
                .map(|row| row.iter().cloned().sorted().collect()),
        )
    }

    /// Counts of each distinct permutation, i.e., the outcomes of a roll in die
    /// order. `[1, 6]` and `[6, 1]` are different permutations.
    pub fn permutation_counts(&self) -> TupleCounts<F> {
        TupleCounts::from_tuples(self.results.rows().map(|row| row.to_vec()))
    }
}

///////////
// Tests //
///////////
