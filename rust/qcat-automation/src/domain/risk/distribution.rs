//! Optimal fund distribution planning (spec §4.4).

use std::collections::BTreeMap;

use chrono::Utc;

use super::models::{FundTransfer, OptimalFundDistribution, RiskLevel, TransferState};

const REBALANCE_THRESHOLD: f64 = 0.05;

/// Target allocations are a step function of risk level (spec §4.4).
pub fn target_allocation(risk_level: RiskLevel, current: &BTreeMap<String, f64>) -> OptimalFundDistribution {
    let targets = match risk_level {
        RiskLevel::Critical | RiskLevel::High => {
            let mut t = BTreeMap::new();
            t.insert("cold".to_string(), 0.60);
            t.insert("hot".to_string(), 0.10);
            t.insert("binance".to_string(), 0.15);
            t.insert("okx".to_string(), 0.10);
            t.insert("bybit".to_string(), 0.05);
            t
        }
        RiskLevel::Medium => {
            let mut t = BTreeMap::new();
            t.insert("cold".to_string(), 0.50);
            t.insert("hot".to_string(), 0.15);
            t.insert("binance".to_string(), 0.35);
            t
        }
        RiskLevel::Low | RiskLevel::Minimal => {
            let total: f64 = current.values().sum();
            current
                .iter()
                .map(|(k, v)| (k.clone(), if total > 0.0 { v / total } else { 0.0 }))
                .collect()
        }
    };
    OptimalFundDistribution {
        targets,
        risk_level,
        computed_at: Utc::now(),
    }
}

fn priority_for(delta_pct: f64, location: &str) -> u8 {
    let magnitude = delta_pct.abs();
    let mut priority = if magnitude > 0.30 {
        5
    } else if magnitude > 0.20 {
        4
    } else if magnitude > 0.10 {
        3
    } else {
        2
    };
    if location == "hot" || location == "cold" {
        priority = (priority as i8 + 1).clamp(1, 5) as u8;
    }
    priority
}

/// For each location whose `|target - current| > 5%` produce a
/// `FundTransfer`: the most over-allocated location feeds the most
/// under-allocated. Fee is estimated at 0.1% of amount.
pub fn plan_transfers(
    total_funds: f64,
    current: &BTreeMap<String, f64>,
    distribution: &OptimalFundDistribution,
) -> Vec<FundTransfer> {
    let mut deltas: Vec<(String, f64)> = distribution
        .targets
        .iter()
        .map(|(location, target_pct)| {
            let current_pct = current.get(location).copied().unwrap_or(0.0) / total_funds.max(1.0);
            (location.clone(), target_pct - current_pct)
        })
        .filter(|(_, delta)| delta.abs() > REBALANCE_THRESHOLD)
        .collect();

    deltas.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    let mut transfers = Vec::new();
    let mut over: Vec<(String, f64)> = deltas.iter().filter(|(_, d)| *d < 0.0).cloned().collect();
    let mut under: Vec<(String, f64)> = deltas.iter().filter(|(_, d)| *d > 0.0).cloned().collect();
    // Most over-allocated (most negative delta) first, most under-allocated
    // (most positive delta) last — both already sorted ascending by delta.
    over.reverse();

    let mut u_idx = under.len();
    for (from_location, over_delta) in over {
        if u_idx == 0 {
            break;
        }
        u_idx -= 1;
        let (to_location, under_delta) = &under[u_idx];
        let amount = over_delta.abs().min(*under_delta) * total_funds;
        if amount <= 0.0 {
            continue;
        }
        transfers.push(FundTransfer {
            id: uuid::Uuid::new_v4().to_string(),
            from_location: from_location.clone(),
            to_location: to_location.clone(),
            amount,
            fee: amount * 0.001,
            priority: priority_for(over_delta.max(*under_delta), &from_location),
            state: TransferState::Pending,
            confirmations: 0,
            required_confirmations: 6,
            created_at: Utc::now(),
        });
    }
    transfers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_risk_preset_matches_spec_s6() {
        let current = BTreeMap::new();
        let dist = target_allocation(RiskLevel::High, &current);
        assert_eq!(dist.targets.get("cold"), Some(&0.60));
        assert_eq!(dist.targets.get("hot"), Some(&0.10));
        assert_eq!(dist.targets.get("binance"), Some(&0.15));
        assert_eq!(dist.targets.get("okx"), Some(&0.10));
        assert_eq!(dist.targets.get("bybit"), Some(&0.05));
    }

    #[test]
    fn plan_transfers_feeds_overallocated_into_underallocated() {
        let mut current = BTreeMap::new();
        current.insert("binance".to_string(), 70_000.0);
        current.insert("cold".to_string(), 20_000.0);
        current.insert("hot".to_string(), 10_000.0);
        let dist = target_allocation(RiskLevel::High, &current);

        let transfers = plan_transfers(100_000.0, &current, &dist);
        assert!(!transfers.is_empty());
        assert!(transfers.iter().any(|t| t.from_location == "binance" && t.to_location == "cold"));
    }
}
