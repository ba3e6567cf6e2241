use crate::predict::Prediction;
use crate::value::Outcome;

/// Aggregate forecast quality over a replayed holdout.
#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

pub fn classify_outcome(home_goals: u8, away_goals: u8) -> Outcome {
    match home_goals.cmp(&away_goals) {
        std::cmp::Ordering::Greater => Outcome::Home,
        std::cmp::Ordering::Equal => Outcome::Draw,
        std::cmp::Ordering::Less => Outcome::Away,
    }
}

pub fn evaluate_predictions(predictions: &[Prediction], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let (yh, yd, ya) = one_hot(*outcome);
        brier_sum += (p.home_win_prob - yh).powi(2)
            + (p.draw_prob - yd).powi(2)
            + (p.away_win_prob - ya).powi(2);

        let actual_prob = match outcome {
            Outcome::Home => p.home_win_prob,
            Outcome::Draw => p.draw_prob,
            Outcome::Away => p.away_win_prob,
        }
        .clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();

        if argmax(p) == *outcome {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

fn argmax(p: &Prediction) -> Outcome {
    if p.home_win_prob >= p.draw_prob && p.home_win_prob >= p.away_win_prob {
        Outcome::Home
    } else if p.draw_prob >= p.away_win_prob {
        Outcome::Draw
    } else {
        Outcome::Away
    }
}

fn one_hot(outcome: Outcome) -> (f64, f64, f64) {
    match outcome {
        Outcome::Home => (1.0, 0.0, 0.0),
        Outcome::Draw => (0.0, 1.0, 0.0),
        Outcome::Away => (0.0, 0.0, 1.0),
    }
}
