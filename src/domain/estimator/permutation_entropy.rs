//! Normalized permutation entropy (Bandt-Pompe).
//!
//! Every embedding vector `[p[i], p[i+tau], ..., p[i+(m-1)tau]]` is reduced
//! to its ordinal pattern (the stable argsort, so ties rank by position).
//! The Shannon entropy of the pattern distribution is divided by
//! `log2(m!)`, giving 0 for a perfectly predictable series and 1 when all
//! patterns are equally likely.
//!
//! Requires at least `m + (m-1)*tau` prices.

use std::collections::HashMap;

pub fn permutation_entropy(prices: &[f64], embedding_dim: usize, tau: usize) -> Option<f64> {
    let m = embedding_dim;
    if m == 0 || tau == 0 {
        return None;
    }
    let span = (m - 1) * tau;
    if prices.len() < m + span {
        return None;
    }

    let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut total = 0usize;

    for i in 0..prices.len() - span {
        let embedding: Vec<f64> = (0..m).map(|j| prices[i + j * tau]).collect();
        let mut pattern: Vec<usize> = (0..m).collect();
        pattern.sort_by(|&a, &b| embedding[a].total_cmp(&embedding[b]));
        *counts.entry(pattern).or_insert(0) += 1;
        total += 1;
    }

    if total == 0 {
        return None;
    }

    let entropy: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum();

    let max_entropy = log2_factorial(m);
    if max_entropy > 0.0 {
        Some((entropy / max_entropy).clamp(0.0, 1.0))
    } else {
        Some(0.0)
    }
}

fn log2_factorial(m: usize) -> f64 {
    (2..=m).map(|k| (k as f64).log2()).sum()
}
