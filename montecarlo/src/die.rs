use crate::{face_label, first_duplicate, Error, Face, Result};
use approx::relative_eq;
use rand::{
    distributions::{Distribution, Open01},
    Rng,
};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

const DEFAULT_WEIGHT: f64 = 1.0;

/// A die's face distribution, as a cumulative weight table for more efficient
/// sampling. Samples are face _indices_ into the die's face list.
#[derive(Clone, Debug)]
pub struct FaceDistr {
    // cdf[i] = w_0 + w_1 + .. + w_i
    cdf: Vec<f64>,
}

impl FaceDistr {
    /// Build a distribution from raw, non-normalized weights. Every weight must
    /// be non-negative and their total strictly positive and finite.
    fn from_weights<F: Face>(faces: &[F], weights: &[f64]) -> Result<Self> {
        debug_assert_eq!(faces.len(), weights.len());

        if let Some((face, &weight)) = faces.iter().zip(weights).find(|&(_, &w)| w < 0.0) {
            return Err(Error::NegativeWeight {
                face: face_label(face),
                weight,
            });
        }

        let cdf = weights
            .iter()
            .scan(0.0, |acc, &w| {
                *acc += w;
                Some(*acc)
            })
            .collect::<Vec<_>>();

        let total = cdf.last().copied().unwrap_or(0.0);
        // finite weights can still sum past f64::MAX
        if !total.is_finite() {
            return Err(Error::TotalWeightOverflow(total));
        }
        if !(total > 0.0) {
            return Err(Error::ZeroTotalWeight(total));
        }

        Ok(Self { cdf })
    }

    #[inline]
    pub fn total(&self) -> f64 {
        // from_weights guarantees at least one entry
        self.cdf[self.cdf.len() - 1]
    }

    #[inline]
    pub fn num_faces(&self) -> usize {
        self.cdf.len()
    }

    /// The probability of drawing the face at `idx`.
    #[inline]
    pub fn p_face(&self, idx: usize) -> f64 {
        let prev = if idx == 0 { 0.0 } else { self.cdf[idx - 1] };
        (self.cdf[idx] - prev) / self.total()
    }

    /// convert a standard sample r ∈ (0, 1) to a face index, according to this
    /// CDF. Zero-weight faces have an empty interval and are never selected.
    #[inline]
    fn sample_to_face(&self, r: f64) -> usize {
        let target = r * self.total();
        // first face whose cumulative weight reaches the target
        let idx = self.cdf.partition_point(|&c| c < target);
        // r < 1.0, but guard against float rounding at the top end anyway
        idx.min(self.cdf.len() - 1)
    }
}

impl Distribution<usize> for FaceDistr {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        // sample r ∈ (0, 1)
        let r = Open01.sample(rng);
        self.sample_to_face(r)
    }
}

/// A die with a fixed set of unique faces and a mutable weight per face.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedDie<F> {
    faces: Vec<F>,
    // weights[i] is the weight of faces[i]
    weights: Vec<f64>,
}

impl<F: Face> WeightedDie<F> {
    /// Create a die with the given faces, all with weight `1.0`.
    ///
    /// Fails with [`Error::InvalidArgument`] if there are no faces and with
    /// [`Error::DuplicateFace`] if a face repeats.
    pub fn new(faces: impl IntoIterator<Item = F>) -> Result<Self> {
        let faces = faces.into_iter().collect::<Vec<_>>();

        if faces.is_empty() {
            return Err(Error::InvalidArgument(
                "a die needs at least one face".to_owned(),
            ));
        }
        if let Some(dup) = first_duplicate(&faces) {
            return Err(Error::DuplicateFace(face_label(dup)));
        }

        let weights = vec![DEFAULT_WEIGHT; faces.len()];
        Ok(Self { faces, weights })
    }

    #[inline]
    pub fn faces(&self) -> &[F] {
        &self.faces
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    fn face_index<Q>(&self, face: &Q) -> Option<usize>
    where
        F: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.faces.iter().position(|f| f.borrow() == face)
    }

    /// The current weight of `face`, or `None` if the die has no such face.
    pub fn weight<Q>(&self, face: &Q) -> Option<f64>
    where
        F: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.face_index(face).map(|idx| self.weights[idx])
    }

    /// Change the weight of a single face.
    ///
    /// Zero and negative weights are accepted here; a die whose weights are
    /// not all non-negative with a positive total fails when rolled instead.
    pub fn set_weight<Q>(&mut self, face: &Q, weight: f64) -> Result<()>
    where
        F: Borrow<Q>,
        Q: PartialEq + std::fmt::Debug + ?Sized,
    {
        let idx = self
            .face_index(face)
            .ok_or_else(|| Error::UnknownFace(face_label(face)))?;

        if !weight.is_finite() {
            return Err(Error::InvalidWeight(weight));
        }

        log::trace!("set_weight: face: {:?}, weight: {weight}", face);
        self.weights[idx] = weight;
        Ok(())
    }

    /// The sampling distribution for the die's current weights.
    pub fn distr(&self) -> Result<FaceDistr> {
        FaceDistr::from_weights(&self.faces, &self.weights)
    }

    /// The normalized weights, `Pr[face] = weight(face) / sum(weights)`, in face
    /// order.
    pub fn probabilities(&self) -> Result<Vec<(F, f64)>> {
        let distr = self.distr()?;
        let probs = self
            .faces
            .iter()
            .enumerate()
            .map(|(idx, face)| (face.clone(), distr.p_face(idx)))
            .collect::<Vec<_>>();

        debug_assert!(relative_eq!(
            1.0,
            probs.iter().map(|(_, p)| p).sum::<f64>(),
            epsilon = 1e-9
        ));

        Ok(probs)
    }

    /// Roll the die `times` times, independently and with replacement. The
    /// weights are re-normalized from their current values on every call.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R, times: usize) -> Result<Vec<F>> {
        let distr = self.distr()?;

        log::trace!(
            "roll: times: {times}, faces: {}, total weight: {}",
            self.len(),
            distr.total()
        );

        Ok((0..times)
            .map(|_| self.faces[distr.sample(rng)].clone())
            .collect())
    }

    /// A snapshot of the die's `(face, weight)` pairs, in face order.
    pub fn show(&self) -> Vec<(F, f64)> {
        self.faces
            .iter()
            .cloned()
            .zip(self.weights.iter().copied())
            .collect()
    }
}

#[cfg(test)]
pub mod prop {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoroshiro64Star;

    pub fn small_rng(seed: u64) -> Xoroshiro64Star {
        Xoroshiro64Star::seed_from_u64(seed)
    }

    pub fn arb_rng() -> impl Strategy<Value = Xoroshiro64Star> {
        any::<u64>().prop_map(Xoroshiro64Star::seed_from_u64)
    }

    /// Between 1 and 12 distinct faces, in no particular order.
    pub fn arb_faces() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::btree_set(any::<u8>(), 1..=12)
            .prop_map(|faces| faces.into_iter().rev().collect())
            .prop_shuffle()
    }
}

///////////
// Tests //
///////////
