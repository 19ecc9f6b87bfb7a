use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::models::{EndpointKey, PrevStatus, Status};

/// Alert bookkeeping for one endpoint in a DOWN streak. A tracker exists if
/// and only if the endpoint is currently alerting; it is removed the moment
/// the endpoint is observed UP, so alert state never leaks across an UP
/// period.
#[derive(Debug, Clone, Copy)]
struct AlertTracker {
    times_sent: u32,
    last_sent: DateTime<Utc>,
}

/// What the escalator decided for one endpoint in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub notify: bool,
    pub tier: u32,
    pub status: Status,
}

/// Per-endpoint alert state machine.
///
/// States are Healthy (no tracker) and Alerting at tier 1, 2 or 3+. The
/// first DOWN alerts immediately; the second waits `second_alert_delay`
/// since the first; every later one waits `subsequent_alert_delay` since
/// the previous. Any UP observation deletes the tracker, and fires exactly
/// one recovery notice when it ends a real DOWN streak.
pub struct AlertEscalator {
    trackers: HashMap<EndpointKey, AlertTracker>,
    second_alert_delay: Duration,
    subsequent_alert_delay: Duration,
}

/// Tier is a pure function of how many alerts went out, capped at 3+.
fn tier_for(times_sent: u32) -> u32 {
    times_sent.min(3)
}

impl AlertEscalator {
    pub fn new(second_alert_delay: Duration, subsequent_alert_delay: Duration) -> Self {
        Self {
            trackers: HashMap::new(),
            second_alert_delay,
            subsequent_alert_delay,
        }
    }

    /// Evaluates one endpoint's fresh verdict against its tracked alert
    /// state and the previous persisted verdict. Called once per endpoint
    /// per cycle; mutates the tracker map accordingly.
    pub fn evaluate(
        &mut self,
        key: &EndpointKey,
        up: bool,
        prev: PrevStatus,
        now: DateTime<Utc>,
    ) -> Decision {
        if up {
            let was_alerting = self.trackers.remove(key).is_some();
            // Recovery only on a real DOWN -> UP transition: either this
            // process was alerting, or the persisted state says the last
            // cycle saw it down. Unknown -> Up stays silent.
            let recovered = was_alerting || prev == PrevStatus::Down;
            return Decision {
                notify: recovered,
                tier: 1,
                status: Status::Up,
            };
        }

        match self.trackers.get_mut(key) {
            None => {
                self.trackers.insert(
                    key.clone(),
                    AlertTracker {
                        times_sent: 1,
                        last_sent: now,
                    },
                );
                Decision {
                    notify: true,
                    tier: 1,
                    status: Status::Down,
                }
            }
            Some(tracker) => {
                let cooldown = if tracker.times_sent == 1 {
                    self.second_alert_delay
                } else {
                    self.subsequent_alert_delay
                };
                if now - tracker.last_sent >= cooldown {
                    tracker.times_sent += 1;
                    tracker.last_sent = now;
                    Decision {
                        notify: true,
                        tier: tier_for(tracker.times_sent),
                        status: Status::Down,
                    }
                } else {
                    Decision {
                        notify: false,
                        tier: tier_for(tracker.times_sent),
                        status: Status::Down,
                    }
                }
            }
        }
    }

    /// Drops trackers for endpoints no longer present in the current
    /// sweep's topology, so removed endpoints cannot keep stale alert state.
    pub fn prune(&mut self, live: &HashMap<EndpointKey, bool>) {
        let before = self.trackers.len();
        self.trackers.retain(|key, _| live.contains_key(key));
        let dropped = before - self.trackers.len();
        if dropped > 0 {
            debug!("pruned {dropped} alert tracker(s) for removed endpoints");
        }
    }

    #[cfg(test)]
    fn tracker_count(&self) -> usize {
        self.trackers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn escalator() -> AlertEscalator {
        AlertEscalator::new(Duration::minutes(10), Duration::minutes(30))
    }

    fn key() -> EndpointKey {
        EndpointKey::new("192.168.1.10", "AppDashboard", 8080)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn minutes(m: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(m)
    }

    #[test]
    fn first_down_alerts_immediately_at_tier_1() {
        let mut esc = escalator();
        let decision = esc.evaluate(&key(), false, PrevStatus::Up, t0());
        assert_eq!(
            decision,
            Decision { notify: true, tier: 1, status: Status::Down }
        );
        assert_eq!(esc.tracker_count(), 1);
    }

    #[test]
    fn full_escalation_timeline() {
        // Cycle-by-cycle script with the default cooldowns: 10 minutes
        // before the second alert, 30 minutes before each later one.
        let mut esc = escalator();
        let k = key();

        // t=0: down -> tier 1 fires.
        let d = esc.evaluate(&k, false, PrevStatus::Up, minutes(0));
        assert_eq!(d, Decision { notify: true, tier: 1, status: Status::Down });

        // t=5m: still down, 5m < 10m -> silent.
        let d = esc.evaluate(&k, false, PrevStatus::Down, minutes(5));
        assert_eq!(d, Decision { notify: false, tier: 1, status: Status::Down });

        // t=12m: 12m >= 10m -> tier 2 fires.
        let d = esc.evaluate(&k, false, PrevStatus::Down, minutes(12));
        assert_eq!(d, Decision { notify: true, tier: 2, status: Status::Down });

        // t=20m: 8m since last < 30m -> silent.
        let d = esc.evaluate(&k, false, PrevStatus::Down, minutes(20));
        assert_eq!(d, Decision { notify: false, tier: 2, status: Status::Down });

        // t=45m: 33m since last >= 30m -> tier 3 fires.
        let d = esc.evaluate(&k, false, PrevStatus::Down, minutes(45));
        assert_eq!(d, Decision { notify: true, tier: 3, status: Status::Down });

        // t=46m: back up -> exactly one recovery, tracker gone.
        let d = esc.evaluate(&k, true, PrevStatus::Down, minutes(46));
        assert_eq!(d, Decision { notify: true, tier: 1, status: Status::Up });
        assert_eq!(esc.tracker_count(), 0);
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let mut esc = escalator();
        let k = key();
        esc.evaluate(&k, false, PrevStatus::Up, minutes(0));
        // Exactly the cooldown elapsed counts as elapsed.
        let d = esc.evaluate(&k, false, PrevStatus::Down, minutes(10));
        assert!(d.notify);
        assert_eq!(d.tier, 2);
    }

    #[test]
    fn tier_caps_at_3_however_long_the_outage() {
        let mut esc = escalator();
        let k = key();
        esc.evaluate(&k, false, PrevStatus::Up, minutes(0));
        let mut fired = 1;
        for hour in 1..=6 {
            let d = esc.evaluate(&k, false, PrevStatus::Down, minutes(hour * 60));
            if d.notify {
                fired += 1;
                assert_eq!(d.tier, tier_for(fired));
            }
        }
        assert!(fired >= 5);
        let d = esc.evaluate(&k, false, PrevStatus::Down, minutes(24 * 60));
        assert_eq!(d.tier, 3);
    }

    #[test]
    fn up_observation_resets_escalation_to_tier_1() {
        let mut esc = escalator();
        let k = key();
        esc.evaluate(&k, false, PrevStatus::Up, minutes(0));
        esc.evaluate(&k, false, PrevStatus::Down, minutes(12));
        esc.evaluate(&k, true, PrevStatus::Down, minutes(13));
        assert_eq!(esc.tracker_count(), 0);

        // A new outage starts over: immediate tier 1, not a continuation.
        let d = esc.evaluate(&k, false, PrevStatus::Up, minutes(14));
        assert_eq!(d, Decision { notify: true, tier: 1, status: Status::Down });
    }

    #[test]
    fn already_up_endpoint_stays_silent() {
        let mut esc = escalator();
        let d = esc.evaluate(&key(), true, PrevStatus::Up, t0());
        assert!(!d.notify);
        assert_eq!(d.status, Status::Up);
    }

    #[test]
    fn first_ever_observation_up_is_not_a_recovery() {
        // Absent from persisted state means Unknown, and Unknown -> Up must
        // not fire a spurious recovery notice.
        let mut esc = escalator();
        let d = esc.evaluate(&key(), true, PrevStatus::Unknown, t0());
        assert!(!d.notify);
    }

    #[test]
    fn persisted_down_without_tracker_still_fires_recovery() {
        // Fresh process after a restart: no tracker in memory, but the
        // durable state says the endpoint was down last cycle.
        let mut esc = escalator();
        let d = esc.evaluate(&key(), true, PrevStatus::Down, t0());
        assert_eq!(d, Decision { notify: true, tier: 1, status: Status::Up });
    }

    #[test]
    fn recovery_fires_only_once() {
        let mut esc = escalator();
        let k = key();
        esc.evaluate(&k, false, PrevStatus::Up, minutes(0));
        let first = esc.evaluate(&k, true, PrevStatus::Down, minutes(1));
        assert!(first.notify);
        // Next cycle the persisted state already says up.
        let second = esc.evaluate(&k, true, PrevStatus::Up, minutes(2));
        assert!(!second.notify);
    }

    #[test]
    fn prune_drops_trackers_for_removed_endpoints() {
        let mut esc = escalator();
        let kept = key();
        let removed = EndpointKey::new("192.168.1.20", "SecureLogsViewer", 8443);
        esc.evaluate(&kept, false, PrevStatus::Up, t0());
        esc.evaluate(&removed, false, PrevStatus::Up, t0());
        assert_eq!(esc.tracker_count(), 2);

        let live = HashMap::from([(kept.clone(), false)]);
        esc.prune(&live);
        assert_eq!(esc.tracker_count(), 1);

        // The surviving tracker still remembers its streak.
        let d = esc.evaluate(&kept, false, PrevStatus::Down, minutes(5));
        assert!(!d.notify);
        // The pruned endpoint, were it to reappear down, starts at tier 1.
        let d = esc.evaluate(&removed, false, PrevStatus::Down, minutes(5));
        assert_eq!(d, Decision { notify: true, tier: 1, status: Status::Down });
    }
}
