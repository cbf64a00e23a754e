use serde::{Deserialize, Serialize};

use crate::{training::TrainingError, utils::mean_and_stddev};

/// Per-column z-score scaling fitted on training rows only.
/// Columns with zero spread are centred but not scaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
}

impl Standardizer {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, TrainingError> {
        let width = rows.first().map(Vec::len).ok_or(TrainingError::NotEnoughRows {
            needed: 1,
            got: 0,
        })?;

        let mut means = Vec::with_capacity(width);
        let mut std_devs = Vec::with_capacity(width);
        for col in 0..width {
            let column: Vec<f64> = rows
                .iter()
                .map(|r| {
                    r.get(col).copied().ok_or(TrainingError::DimensionMismatch {
                        expected: width,
                        got: r.len(),
                    })
                })
                .collect::<Result<_, _>>()?;
            let (mean, sd) = mean_and_stddev(&column);
            means.push(mean);
            std_devs.push(sd);
        }

        Ok(Self { means, std_devs })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, TrainingError> {
        if row.len() != self.width() {
            return Err(TrainingError::DimensionMismatch {
                expected: self.width(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.std_devs))
            .map(|(x, (mean, sd))| {
                let centred = x - mean;
                if *sd > 0.0 { centred / sd } else { centred }
            })
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, TrainingError> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_to_zero_mean_unit_variance() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let s = Standardizer::fit(&rows).unwrap();
        assert_eq!(s.means, vec![2.0, 10.0]);
        assert_eq!(s.std_devs, vec![1.0, 0.0]);

        let out = s.transform(&rows).unwrap();
        assert_eq!(out, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn rejects_wrong_width() {
        let s = Standardizer::fit(&[vec![1.0, 2.0]]).unwrap();
        assert_eq!(
            s.transform_row(&[1.0]),
            Err(TrainingError::DimensionMismatch { expected: 2, got: 1 })
        );
    }

    #[test]
    fn ragged_rows_fail_to_fit() {
        let rows = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(Standardizer::fit(&rows).is_err());
    }
}
