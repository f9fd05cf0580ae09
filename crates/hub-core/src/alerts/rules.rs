// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hold-time hysteresis ring (§4.F): a fixed-size ring of recent
//! above/below samples. An alert fires once the ring has filled with
//! consecutive "past threshold" readings and resolves once it fills with
//! consecutive "within range" ones, so a single noisy tick cannot flip it
//! either way.

use std::collections::VecDeque;

use crate::ids::{AlertId, UserId};
use crate::model::{Alert, AlertMetric, Direction, Sample, SystemStatus};

/// Tick spacing the ring assumes when converting `hold_minutes` into a
/// sample count (§4.C: 30s ticks).
const SAMPLE_PERIOD_SECS: u32 = 30;

fn ring_len(hold_minutes: u32) -> usize {
    let secs = hold_minutes.saturating_mul(60);
    secs.div_ceil(SAMPLE_PERIOD_SECS).max(1) as usize
}

pub struct AlertRule {
    pub alert_id: AlertId,
    pub user_id: UserId,
    pub metric: AlertMetric,
    pub threshold: f64,
    pub direction: Direction,
    pub selector: fn(&Sample) -> Option<f64>,
    ring: VecDeque<bool>,
    ring_capacity: usize,
    pub triggered: bool,
    /// `created_at` of the currently-open `AlertHistory` row, if this rule
    /// is triggered, so the matching resolve updates that same row instead
    /// of inserting a new one.
    pub open_fired_at: Option<u64>,
}

impl AlertRule {
    pub fn new(alert: &Alert, selector: fn(&Sample) -> Option<f64>) -> Self {
        let ring_capacity = ring_len(alert.hold_minutes);
        // Status has no user threshold (§3, §4.F): the selector only ever
        // emits 1.0 (down) or 0.0 (up), so any cutpoint between them works;
        // 0.5 is fixed here rather than trusting whatever `alert.threshold`
        // a stale request happened to carry.
        let threshold = if alert.metric == AlertMetric::Status { 0.5 } else { alert.threshold };
        Self {
            alert_id: alert.id.clone(),
            user_id: alert.user_id.clone(),
            metric: alert.metric,
            threshold,
            direction: alert.metric.direction(),
            selector,
            ring: VecDeque::with_capacity(ring_capacity),
            ring_capacity,
            triggered: alert.triggered,
            open_fired_at: None,
        }
    }

    fn past_threshold(&self, value: f64) -> bool {
        match self.direction {
            Direction::Above => value > self.threshold,
            Direction::Below => value < self.threshold,
        }
    }

    fn push(&mut self, past_threshold: bool) {
        if self.ring.len() == self.ring_capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(past_threshold);
    }

    fn ring_all(&self, value: bool) -> bool {
        self.ring.len() == self.ring_capacity && self.ring.iter().all(|&v| v == value)
    }

    /// Feeds one sample's metric value through the ring. Returns
    /// `Some(true)` if this reading caused the alert to newly fire,
    /// `Some(false)` if it caused a newly-triggered alert to resolve, and
    /// `None` if nothing changed.
    pub fn observe(&mut self, value: f64) -> Option<bool> {
        self.push(self.past_threshold(value));

        if !self.triggered && self.ring_all(true) {
            self.triggered = true;
            return Some(true);
        }
        if self.triggered && self.ring_all(false) {
            self.triggered = false;
            return Some(false);
        }
        None
    }

    /// Pausing a system resolves any active alert on it without requiring
    /// the ring to fill with "within range" readings; resuming clears the
    /// ring so the hold window must elapse again before it can re-fire
    /// (§9 resolved Open Question).
    pub fn force_resolve_and_reset(&mut self) -> bool {
        self.ring.clear();
        let was_triggered = self.triggered;
        self.triggered = false;
        self.open_fired_at = None;
        was_triggered
    }
}

/// Status-alert selector: reads the transition edge rather than a scalar
/// sample field (§4.F). `1.0` means down, `0.0` means up.
pub fn status_transition_selector(transitioned_to: SystemStatus) -> f64 {
    if transitioned_to == SystemStatus::Down {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AlertId, SystemId, UserId};

    fn make_rule(hold_minutes: u32, threshold: f64) -> AlertRule {
        let alert = Alert {
            id: AlertId::from("a1"),
            user_id: UserId::from("u1"),
            system_id: SystemId::from("s1"),
            metric: AlertMetric::Cpu,
            threshold,
            hold_minutes,
            triggered: false,
        };
        AlertRule::new(&alert, |s| Some(s.cpu_pct))
    }

    #[test]
    fn fires_only_after_ring_fills_with_consecutive_breaches() {
        let mut rule = make_rule(1, 80.0);
        assert_eq!(ring_len(1), 2);
        assert_eq!(rule.observe(90.0), None);
        assert_eq!(rule.observe(90.0), Some(true));
        assert!(rule.triggered);
    }

    #[test]
    fn does_not_refire_while_still_triggered() {
        let mut rule = make_rule(1, 80.0);
        rule.observe(90.0);
        rule.observe(90.0);
        assert_eq!(rule.observe(95.0), None);
    }

    #[test]
    fn resolves_after_consecutive_within_range_readings() {
        let mut rule = make_rule(1, 80.0);
        rule.observe(90.0);
        rule.observe(90.0);
        assert!(rule.triggered);
        assert_eq!(rule.observe(10.0), None);
        assert_eq!(rule.observe(10.0), Some(false));
        assert!(!rule.triggered);
    }

    #[test]
    fn pause_force_resolves_and_resume_requires_full_hold_again() {
        let mut rule = make_rule(1, 80.0);
        rule.observe(90.0);
        rule.observe(90.0);
        assert!(rule.triggered);
        assert!(rule.force_resolve_and_reset());
        assert_eq!(rule.observe(90.0), None);
        assert_eq!(rule.observe(90.0), Some(true));
    }

    fn make_status_rule(hold_minutes: u32) -> AlertRule {
        let alert = Alert {
            id: AlertId::from("a-status"),
            user_id: UserId::from("u1"),
            system_id: SystemId::from("s1"),
            metric: AlertMetric::Status,
            // Ignored: `AlertRule::new` fixes the Status threshold at 0.5.
            threshold: 0.0,
            hold_minutes,
            triggered: false,
        };
        AlertRule::new(&alert, |_| None)
    }

    /// Invariant 7 / §4.F: a Status alert fires on a sustained down edge
    /// and resolves on a sustained up edge, honouring hold-time uniformly
    /// like any other metric — the hardest case, since the evaluator must
    /// be fed every tick the status persists, not only on the transition.
    #[test]
    fn status_alert_fires_on_sustained_down_and_resolves_on_sustained_up() {
        let mut rule = make_status_rule(1);
        assert_eq!(rule.direction, Direction::Above);

        assert_eq!(rule.observe(status_transition_selector(SystemStatus::Down)), None);
        assert_eq!(rule.observe(status_transition_selector(SystemStatus::Down)), Some(true));
        assert!(rule.triggered);

        // a single up tick does not resolve it before the hold window fills
        assert_eq!(rule.observe(status_transition_selector(SystemStatus::Up)), None);
        assert_eq!(rule.observe(status_transition_selector(SystemStatus::Up)), Some(false));
        assert!(!rule.triggered);
    }

    #[test]
    fn status_alert_does_not_fire_on_a_single_down_reading() {
        let mut rule = make_status_rule(1);
        assert_eq!(rule.observe(status_transition_selector(SystemStatus::Down)), None);
        assert!(!rule.triggered);
    }

    /// Battery is the other Below-direction metric (§9): it breaches when
    /// the reading drops under the threshold, the mirror image of the
    /// Cpu/Status "exceeds" tests above.
    #[test]
    fn below_direction_metric_fires_when_value_drops_under_threshold() {
        let alert = Alert {
            id: AlertId::from("a-batt"),
            user_id: UserId::from("u1"),
            system_id: SystemId::from("s1"),
            metric: AlertMetric::Battery,
            threshold: 20.0,
            hold_minutes: 1,
            triggered: false,
        };
        let mut rule = AlertRule::new(&alert, |s| s.battery_pct);
        assert_eq!(rule.direction, Direction::Below);
        assert_eq!(rule.observe(15.0), None);
        assert_eq!(rule.observe(15.0), Some(true));
        assert!(rule.triggered);

        // a reading back above threshold is the safe side for Below
        assert_eq!(rule.observe(50.0), None);
        assert_eq!(rule.observe(50.0), Some(false));
        assert!(!rule.triggered);
    }

    proptest::proptest! {
        /// The alert ring/hysteresis state machine never fires twice
        /// without an intervening resolve (SPEC_FULL §8), regardless of
        /// the value sequence fed to it.
        #[test]
        fn never_fires_twice_without_an_intervening_resolve(
            values in proptest::collection::vec(0.0f64..150.0, 1..200),
        ) {
            let mut rule = make_rule(2, 80.0);
            let mut open = false;
            for value in values {
                match rule.observe(value) {
                    Some(true) => {
                        proptest::prop_assert!(!open, "fired while already triggered");
                        open = true;
                    }
                    Some(false) => {
                        proptest::prop_assert!(open, "resolved without an open fire");
                        open = false;
                    }
                    None => {}
                }
            }
            proptest::prop_assert_eq!(open, rule.triggered);
        }
    }
}
