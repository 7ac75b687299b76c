//! Append-only trial log.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use zt_types::{LogError, ParameterValue, ZtResult};

/// Position of a trial in its log. Returned by [`TrialLog::log_param`] and
/// used to address the score update for that trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrialId(pub usize);

impl TrialId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row-aligned store of normalized samples, rescaled samples and scores.
///
/// Rows are only ever appended. The score of a row is set once, after the
/// trial ran; until then it holds the placeholder given at append time.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialLog {
    names: Vec<String>,
    actual: Vec<Vec<ParameterValue>>,
    unscaled: Vec<Vec<f64>>,
    scores: Vec<f64>,
    scored: Vec<bool>,
    seen: HashSet<Vec<u64>>,
}

/// Bit pattern key for exact equality; `-0.0` and `0.0` compare equal.
fn sample_key(sample: &[f64]) -> Vec<u64> {
    sample
        .iter()
        .map(|&v| if v == 0.0 { 0u64 } else { v.to_bits() })
        .collect()
}

impl TrialLog {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            actual: Vec::new(),
            unscaled: Vec::new(),
            scores: Vec::new(),
            scored: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Rebuild a log from previously persisted columns. `scored` flags the
    /// rows whose score was recorded; the others keep their placeholder and
    /// can still be scored once.
    pub fn from_parts(
        names: Vec<String>,
        actual: Vec<Vec<ParameterValue>>,
        unscaled: Vec<Vec<f64>>,
        scores: Vec<f64>,
        scored: Vec<bool>,
    ) -> ZtResult<Self> {
        let rows = actual.len();
        if unscaled.len() != rows || scores.len() != rows || scored.len() != rows {
            return Err(LogError::LengthMismatch {
                actual: rows,
                unscaled: unscaled.len(),
                scores: scores.len(),
                scored: scored.len(),
            }
            .into());
        }

        let width = names.len();
        for row in &actual {
            check_width(width, row.len())?;
        }
        for row in &unscaled {
            check_width(width, row.len())?;
        }

        let seen = unscaled.iter().map(|row| sample_key(row)).collect();
        Ok(Self {
            names,
            actual,
            unscaled,
            scores,
            scored,
            seen,
        })
    }

    pub fn n_params(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Append a trial unless its normalized sample was logged before.
    ///
    /// Uniqueness is exact equality over the whole normalized vector.
    /// Returns `Ok(None)` for a duplicate; the caller is expected to draw
    /// again.
    pub fn log_param(
        &mut self,
        actual: Vec<ParameterValue>,
        unscaled: Vec<f64>,
        initial_score: f64,
    ) -> ZtResult<Option<TrialId>> {
        check_width(self.n_params(), actual.len())?;
        check_width(self.n_params(), unscaled.len())?;

        if !self.seen.insert(sample_key(&unscaled)) {
            return Ok(None);
        }

        let id = TrialId(self.scores.len());
        self.actual.push(actual);
        self.unscaled.push(unscaled);
        self.scores.push(initial_score);
        self.scored.push(false);
        Ok(Some(id))
    }

    /// Record the score of a trial; `None` addresses the latest row.
    ///
    /// Scores must be finite so the log stays serializable.
    pub fn log_score(&mut self, score: f64, idx: Option<TrialId>) -> ZtResult<()> {
        let rows = self.len();
        let idx = match idx {
            Some(id) => id.index(),
            None => rows.checked_sub(1).ok_or(LogError::Empty)?,
        };
        if idx >= rows {
            return Err(LogError::RowOutOfRange { idx, rows }.into());
        }
        if self.scored[idx] {
            return Err(LogError::AlreadyScored { idx }.into());
        }
        if !score.is_finite() {
            return Err(LogError::NonFiniteScore { idx, score }.into());
        }

        self.scores[idx] = score;
        self.scored[idx] = true;
        Ok(())
    }

    pub fn actual_params(&self) -> &[Vec<ParameterValue>] {
        &self.actual
    }

    pub fn unscaled_params(&self) -> &[Vec<f64>] {
        &self.unscaled
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn is_scored(&self, id: TrialId) -> bool {
        self.scored.get(id.index()).copied().unwrap_or(false)
    }

    /// Per-row flags, `true` once the score was recorded.
    pub fn scored_flags(&self) -> &[bool] {
        &self.scored
    }

    /// Ids of the `k` highest scores, in no particular order. Ties are
    /// broken arbitrarily. Rows still holding their placeholder take part.
    pub fn top_k(&self, k: usize) -> ZtResult<Vec<TrialId>> {
        if k > self.len() {
            return Err(LogError::InsufficientTrials {
                requested: k,
                available: self.len(),
            }
            .into());
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut order: Vec<usize> = (0..self.len()).collect();
        order.select_nth_unstable_by(k - 1, |&a, &b| {
            self.scores[b].total_cmp(&self.scores[a])
        });
        order.truncate(k);
        Ok(order.into_iter().map(TrialId).collect())
    }

    /// Highest-scoring trial among those with a recorded score.
    pub fn best(&self) -> Option<TrialId> {
        (0..self.len())
            .filter(|&i| self.scored[i])
            .max_by(|&a, &b| self.scores[a].total_cmp(&self.scores[b]))
            .map(TrialId)
    }
}

fn check_width(expected: usize, got: usize) -> ZtResult<()> {
    if expected != got {
        return Err(LogError::DimensionMismatch { expected, got }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zt_types::ZtError;

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn row(a: f64, b: f64) -> (Vec<ParameterValue>, Vec<f64>) {
        (
            vec![ParameterValue::Float(a * 10.0), ParameterValue::Float(b * 10.0)],
            vec![a, b],
        )
    }

    #[test]
    fn appends_unique_samples() {
        let mut log = TrialLog::new(names());
        for i in 0..50 {
            let (actual, unscaled) = row(i as f64 / 50.0, 0.5);
            let id = log.log_param(actual, unscaled, 0.0).unwrap();
            assert_eq!(id, Some(TrialId(i)));
        }

        assert_eq!(log.len(), 50);
        assert_eq!(log.actual_params().len(), 50);
        assert_eq!(log.unscaled_params().len(), 50);
        assert_eq!(log.scores().len(), 50);

        let distinct: HashSet<Vec<u64>> = log.unscaled_params().iter().map(|r| sample_key(r)).collect();
        assert_eq!(distinct.len(), 50);
    }

    #[test]
    fn rejects_duplicate_normalized_sample() {
        let mut log = TrialLog::new(names());
        let (actual, unscaled) = row(0.25, 0.75);
        assert!(log.log_param(actual.clone(), unscaled.clone(), 0.0).unwrap().is_some());
        assert!(log.log_param(actual, unscaled, 0.0).unwrap().is_none());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn uniqueness_is_exact() {
        let mut log = TrialLog::new(names());
        let (actual, unscaled) = row(0.25, 0.75);
        log.log_param(actual.clone(), unscaled, 0.0).unwrap();
        let nudged = vec![0.25, 0.75 + f64::EPSILON];
        assert!(log.log_param(actual, nudged, 0.0).unwrap().is_some());
    }

    #[test]
    fn rejects_wrong_width() {
        let mut log = TrialLog::new(names());
        let err = log
            .log_param(vec![ParameterValue::Int(1)], vec![0.1], 0.0)
            .unwrap_err();
        assert!(matches!(
            err,
            ZtError::Log(LogError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn score_addressed_by_id_or_latest() {
        let mut log = TrialLog::new(names());
        let (a0, u0) = row(0.1, 0.1);
        let (a1, u1) = row(0.2, 0.2);
        let first = log.log_param(a0, u0, 0.0).unwrap().unwrap();
        log.log_param(a1, u1, 0.0).unwrap().unwrap();

        log.log_score(3.5, None).unwrap();
        log.log_score(1.5, Some(first)).unwrap();
        assert_eq!(log.scores(), &[1.5, 3.5]);
        assert!(log.is_scored(first));
    }

    #[test]
    fn score_errors() {
        let mut log = TrialLog::new(names());
        assert!(matches!(
            log.log_score(1.0, None),
            Err(ZtError::Log(LogError::Empty))
        ));

        let (a, u) = row(0.1, 0.1);
        let id = log.log_param(a, u, 0.0).unwrap().unwrap();
        assert!(matches!(
            log.log_score(1.0, Some(TrialId(4))),
            Err(ZtError::Log(LogError::RowOutOfRange { idx: 4, rows: 1 }))
        ));

        log.log_score(1.0, Some(id)).unwrap();
        assert!(matches!(
            log.log_score(2.0, Some(id)),
            Err(ZtError::Log(LogError::AlreadyScored { idx: 0 }))
        ));
    }

    #[test]
    fn top_k_selects_highest_scores() {
        let mut log = TrialLog::new(names());
        let scores = [0.3, 0.9, 0.1, 0.7, 0.5];
        for (i, score) in scores.iter().enumerate() {
            let (a, u) = row(i as f64 / 10.0, 0.0);
            let id = log.log_param(a, u, 0.0).unwrap().unwrap();
            log.log_score(*score, Some(id)).unwrap();
        }

        let mut top = log.top_k(2).unwrap();
        top.sort();
        assert_eq!(top, vec![TrialId(1), TrialId(3)]);
        assert_eq!(log.best(), Some(TrialId(1)));
        assert!(log.top_k(0).unwrap().is_empty());
        assert!(matches!(
            log.top_k(6),
            Err(ZtError::Log(LogError::InsufficientTrials { requested: 6, available: 5 }))
        ));
    }

    #[test]
    fn best_ignores_unscored_rows() {
        let mut log = TrialLog::new(names());
        let (a, u) = row(0.1, 0.1);
        log.log_param(a, u, 100.0).unwrap();
        assert_eq!(log.best(), None);
    }

    #[test]
    fn from_parts_restores_uniqueness_index() {
        let (a0, u0) = row(0.1, 0.2);
        let (a1, u1) = row(0.3, 0.4);
        let mut log = TrialLog::from_parts(
            names(),
            vec![a0.clone(), a1],
            vec![u0.clone(), u1],
            vec![1.0, 2.0],
            vec![true, true],
        )
        .unwrap();

        assert_eq!(log.len(), 2);
        assert!(log.log_param(a0, u0, 0.0).unwrap().is_none());
        assert!(matches!(
            log.log_score(5.0, None),
            Err(ZtError::Log(LogError::AlreadyScored { idx: 1 }))
        ));
    }

    #[test]
    fn from_parts_checks_lengths() {
        let (a0, u0) = row(0.1, 0.2);
        let err = TrialLog::from_parts(names(), vec![a0.clone()], vec![u0.clone()], vec![], vec![])
            .unwrap_err();
        assert!(matches!(
            err,
            ZtError::Log(LogError::LengthMismatch { actual: 1, unscaled: 1, scores: 0, scored: 0 })
        ));

        let err = TrialLog::from_parts(names(), vec![a0], vec![u0], vec![1.0], vec![]).unwrap_err();
        assert!(matches!(
            err,
            ZtError::Log(LogError::LengthMismatch { scored: 0, .. })
        ));
    }

    #[test]
    fn from_parts_keeps_unscored_rows_open() {
        let (a0, u0) = row(0.1, 0.2);
        let (a1, u1) = row(0.3, 0.4);
        let mut log = TrialLog::from_parts(
            names(),
            vec![a0, a1],
            vec![u0, u1],
            vec![1.0, 0.0],
            vec![true, false],
        )
        .unwrap();

        assert!(log.is_scored(TrialId(0)));
        assert!(!log.is_scored(TrialId(1)));
        assert_eq!(log.best(), Some(TrialId(0)));

        log.log_score(3.0, Some(TrialId(1))).unwrap();
        assert_eq!(log.best(), Some(TrialId(1)));
    }

    #[test]
    fn rejects_non_finite_scores() {
        let mut log = TrialLog::new(names());
        let (a, u) = row(0.1, 0.1);
        let id = log.log_param(a, u, 0.0).unwrap().unwrap();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                log.log_score(bad, Some(id)),
                Err(ZtError::Log(LogError::NonFiniteScore { idx: 0, .. }))
            ));
        }
        assert!(!log.is_scored(id));
        assert_eq!(log.scores(), &[0.0]);

        log.log_score(-1.0e300, Some(id)).unwrap();
        assert!(log.is_scored(id));
    }
}
