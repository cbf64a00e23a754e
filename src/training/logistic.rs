use serde::{Deserialize, Serialize};

use crate::{config::TrainingConfig, training::TrainingError};

/// Fitted coefficients of a binary logistic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub weights: Vec<f64>,
    pub bias: f64,
}

/// Binary logistic regression trained by full-batch gradient descent with an
/// L2 penalty on the weights (not the bias).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    learning_rate: f64,
    max_iterations: usize,
    tolerance: f64,
    l2_penalty: f64,
    pub coefficients: Option<Coefficients>,
    pub iterations_run: usize,
    pub final_loss: Option<f64>,
}

impl LogisticRegression {
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            l2_penalty: config.l2_penalty,
            coefficients: None,
            iterations_run: 0,
            final_loss: None,
        }
    }

    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let e = z.exp();
            e / (1.0 + e)
        }
    }

    fn log_loss(labels: &[u8], probabilities: &[f64]) -> f64 {
        const EPS: f64 = 1e-15;
        let total: f64 = labels
            .iter()
            .zip(probabilities)
            .map(|(&y, &p)| {
                let p = p.clamp(EPS, 1.0 - EPS);
                if y == 1 { p.ln() } else { (1.0 - p).ln() }
            })
            .sum();
        -total / labels.len() as f64
    }

    fn linear(weights: &[f64], bias: f64, row: &[f64]) -> f64 {
        weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias
    }

    pub fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), TrainingError> {
        if rows.is_empty() {
            return Err(TrainingError::NotEnoughRows { needed: 1, got: 0 });
        }
        if rows.len() != labels.len() {
            return Err(TrainingError::DimensionMismatch {
                expected: rows.len(),
                got: labels.len(),
            });
        }
        let width = rows[0].len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(TrainingError::DimensionMismatch {
                expected: width,
                got: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut weights = vec![0.0; width];
        let mut bias = 0.0;
        let mut previous_loss = f64::INFINITY;
        let mut loss = None;
        let mut iterations = 0;

        for iter in 0..self.max_iterations {
            iterations = iter + 1;
            let probabilities: Vec<f64> = rows
                .iter()
                .map(|r| Self::sigmoid(Self::linear(&weights, bias, r)))
                .collect();

            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for ((row, &y), p) in rows.iter().zip(labels).zip(&probabilities) {
                let err = p - y as f64;
                grad_b += err;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
            }
            for (g, w) in grad_w.iter_mut().zip(&weights) {
                *g = *g / n + self.l2_penalty * w;
            }
            grad_b /= n;

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g;
            }
            bias -= self.learning_rate * grad_b;

            let penalty = 0.5 * self.l2_penalty * weights.iter().map(|w| w * w).sum::<f64>();
            let current = Self::log_loss(labels, &probabilities) + penalty;
            loss = Some(current);
            if (previous_loss - current).abs() < self.tolerance {
                log::debug!("Logistic regression converged after {} iterations", iterations);
                break;
            }
            previous_loss = current;
        }

        self.coefficients = Some(Coefficients { weights, bias });
        self.iterations_run = iterations;
        self.final_loss = loss;
        Ok(())
    }

    /// Probability that the row belongs to class 1.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, TrainingError> {
        let coefficients = self.coefficients.as_ref().ok_or(TrainingError::NotFitted)?;
        if row.len() != coefficients.weights.len() {
            return Err(TrainingError::DimensionMismatch {
                expected: coefficients.weights.len(),
                got: row.len(),
            });
        }
        Ok(Self::sigmoid(Self::linear(
            &coefficients.weights,
            coefficients.bias,
            row,
        )))
    }

    pub fn predict(&self, rows: &[Vec<f64>], threshold: f64) -> Result<Vec<u8>, TrainingError> {
        rows.iter()
            .map(|r| self.predict_proba(r).map(|p| u8::from(p >= threshold)))
            .collect()
    }
}
