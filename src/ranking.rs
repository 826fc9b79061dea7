//! Cohort ranking and per-subject positions.
//!
//! Positions are sequential: students with equal metrics keep their input
//! order and receive consecutive positions rather than a shared rank.

use crate::aggregate::{Metric, StudentAggregate};
use crate::model::Level;
use serde::Serialize;
use std::cmp::Ordering;

pub trait Rankable {
    fn metric(&self) -> Metric;
}

impl Rankable for StudentAggregate {
    fn metric(&self) -> Metric {
        self.metric
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub position: usize,
    #[serde(flatten)]
    pub item: T,
}

fn metric_value(m: Metric) -> Option<f64> {
    match m {
        Metric::Points(p) => Some(f64::from(p)),
        Metric::Average(a) => Some(a),
        Metric::Incomplete | Metric::NoGrades => None,
    }
}

/// Seniors ascend by points, juniors descend by average; sentinels sink.
pub fn compare_metrics(a: Metric, b: Metric, level: Level) -> Ordering {
    match (metric_value(a), metric_value(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let asc = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match level {
                Level::Senior => asc,
                Level::Junior => asc.reverse(),
            }
        }
    }
}

pub fn rank<T: Rankable>(mut cohort: Vec<T>, level: Level) -> Vec<Ranked<T>> {
    // sort_by is stable, which is what gives ties their input order.
    cohort.sort_by(|a, b| compare_metrics(a.metric(), b.metric(), level));
    cohort
        .into_iter()
        .enumerate()
        .map(|(i, item)| Ranked {
            position: i + 1,
            item,
        })
        .collect()
}

pub fn position_where<T>(ranked: &[Ranked<T>], pred: impl Fn(&T) -> bool) -> Option<usize> {
    ranked.iter().find(|r| pred(&r.item)).map(|r| r.position)
}

fn same_score(a: f64, b: f64) -> bool {
    (a * 100.0).round() as i64 == (b * 100.0).round() as i64
}

/// Distinct scores, best first. Equal scores collapse to one entry.
pub fn distinct_scores_desc(scores: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    sorted.dedup_by(|a, b| same_score(*a, *b));
    sorted
}

/// 1-based index of `score` within a distinct, descending score list.
pub fn subject_position(distinct_desc: &[f64], score: f64) -> Option<usize> {
    distinct_desc
        .iter()
        .position(|s| same_score(*s, score))
        .map(|i| i + 1)
}
