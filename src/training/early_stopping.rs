//! Early stopping on a monitored validation loss

/// Tracks the best (lowest) loss and signals a stop once `patience` rounds
/// pass without improvement.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_value: Option<f64>,
    best_round: usize,
    current_round: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_value: None,
            best_round: 0,
            current_round: 0,
        }
    }

    /// Record this round's loss; `true` once the patience window is exhausted.
    pub fn should_stop(&mut self, value: f64) -> bool {
        let improved = match self.best_value {
            None => true,
            Some(best) => value < best,
        };
        if improved {
            self.best_value = Some(value);
            self.best_round = self.current_round;
        }
        self.current_round += 1;

        self.current_round - self.best_round > self.patience
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    /// Zero-based round with the lowest loss.
    pub fn best_round(&self) -> usize {
        self.best_round
    }

    pub fn rounds_seen(&self) -> usize {
        self.current_round
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_stop_while_improving() {
        let mut es = EarlyStopping::new(3);
        for v in [1.0, 0.9, 0.8, 0.7, 0.6] {
            assert!(!es.should_stop(v));
        }
        assert_eq!(es.best_round(), 4);
        assert_eq!(es.best_value(), Some(0.6));
    }

    #[test]
    fn test_stops_after_patience() {
        let mut es = EarlyStopping::new(3);
        assert!(!es.should_stop(0.5));
        assert!(!es.should_stop(0.6));
        assert!(!es.should_stop(0.7));
        assert!(es.should_stop(0.8));
        assert_eq!(es.best_round(), 0);
        assert_eq!(es.rounds_seen(), 4);
    }

    #[test]
    fn test_equal_value_is_not_improvement() {
        let mut es = EarlyStopping::new(1);
        assert!(!es.should_stop(0.5));
        assert!(es.should_stop(0.5));
    }
}
