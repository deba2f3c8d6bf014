// ==============================================
// ENGINE SCENARIOS (integration)
// ==============================================
//
// End-to-end behavior of the admission engine: request accounting, admission
// through both gates, control messages and periodic reporting. Each scenario
// drives the public API only.

use std::sync::Once;
use std::time::Duration;

use tinyslru::codec::{encode_theta_updates, tlv, AccessDelta, ThetaUpdate};
use tinyslru::engine::{AccessCounting, Engine};
use tinyslru::policy::admission::{AdmissionOutcome, Rejection};
use tinyslru::policy::slru::Segment;
use tinyslru::report::{AccessReport, ManualScheduler, ReportTimer, Scheduler};
use tinyslru::Name;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn n(s: &str) -> Name {
    Name::from(s)
}

/// Request `key`; on a miss, deliver the response and return its outcome.
fn serve(engine: &mut Engine<String>, key: &str) -> Option<AdmissionOutcome> {
    let key = n(key);
    if engine.on_request(&key).is_some() {
        return None;
    }
    let value = format!("payload of {}", key);
    Some(engine.on_response_arrival(key, value))
}

// ==============================================
// Admission
// ==============================================

mod admission {
    use super::*;

    #[test]
    fn two_by_two_request_sequence() {
        init_tracing();
        let mut engine: Engine<String> = Engine::builder()
            .capacities(2, 2)
            .default_theta(1.0)
            .build();

        assert_eq!(
            serve(&mut engine, "/A"),
            Some(AdmissionOutcome::Admitted { evicted: None })
        );
        // Second request for A is a hit and promotes it.
        assert_eq!(serve(&mut engine, "/A"), None);
        assert_eq!(engine.cache().segment_of(&n("/A")), Some(Segment::Protected));

        assert_eq!(
            serve(&mut engine, "/B"),
            Some(AdmissionOutcome::Admitted { evicted: None })
        );
        assert_eq!(engine.cache().segment_of(&n("/B")), Some(Segment::Probation));
        assert_eq!(
            serve(&mut engine, "/C"),
            Some(AdmissionOutcome::Admitted { evicted: None })
        );

        // Protected has a free slot, so D skips the frequency gate and the
        // full probation segment drops its LRU.
        assert!(!engine.cache().is_full());
        assert_eq!(
            serve(&mut engine, "/D"),
            Some(AdmissionOutcome::Admitted {
                evicted: Some(n("/B"))
            })
        );
        assert_eq!(engine.cache().probation_len(), 2);
        assert_eq!(engine.cache().protected_len(), 1);
        assert_eq!(engine.stats().rejected_by_frequency, 0);
    }

    #[test]
    fn free_capacity_admits_past_full_probation() {
        let mut engine: Engine<String> = Engine::builder()
            .capacities(2, 2)
            .default_theta(1.0)
            .build();
        serve(&mut engine, "/a");
        serve(&mut engine, "/b");
        assert!(!engine.cache().is_full());

        let outcome = serve(&mut engine, "/c");
        assert!(outcome.as_ref().is_some_and(AdmissionOutcome::is_cached), "{:?}", outcome);
        assert!(engine.cache().contains(&n("/c")));
        assert_eq!(engine.stats().rejected_by_frequency, 0);
    }

    #[test]
    fn frequency_gate_applies_only_when_full() {
        let mut engine: Engine<String> = Engine::builder()
            .capacities(2, 2)
            .default_theta(1.0)
            .build();
        for key in ["/A", "/A", "/C", "/C", "/D", "/F"] {
            serve(&mut engine, key);
        }
        // protected [C, A], probation [F, D]
        assert!(engine.cache().is_full());

        assert_eq!(
            serve(&mut engine, "/G"),
            Some(AdmissionOutcome::Rejected(Rejection::Frequency {
                victim: n("/D"),
                victim_estimate: 1,
                candidate_estimate: 1,
            }))
        );
        assert!(!engine.cache().contains(&n("/G")));

        // A second response for G outweighs D.
        assert_eq!(
            serve(&mut engine, "/G"),
            Some(AdmissionOutcome::Admitted {
                evicted: Some(n("/D"))
            })
        );
        for key in ["/A", "/C", "/F", "/G"] {
            assert!(engine.cache().contains(&n(key)), "{} missing", key);
        }
    }

    #[test]
    fn zero_theta_blocks_everything() {
        let mut engine: Engine<String> = Engine::builder().default_theta(0.0).build();
        for i in 0..50 {
            let outcome = serve(&mut engine, &format!("/k/{}", i));
            assert!(matches!(
                outcome,
                Some(AdmissionOutcome::Rejected(Rejection::Theta { .. }))
            ));
        }
        assert!(engine.cache().is_empty());
        assert_eq!(engine.stats().rejected_by_theta, 50);
    }

    #[test]
    fn partial_theta_admits_a_fraction() {
        let mut engine: Engine<String> = Engine::builder()
            .capacities(1000, 1000)
            .default_theta(0.5)
            .rng_seed(7)
            .build();
        let mut admitted = 0;
        // Fewer keys than probation slots, so only the θ gate can reject.
        for i in 0..1000 {
            if let Some(outcome) = serve(&mut engine, &format!("/k/{}", i)) {
                if outcome.is_cached() {
                    admitted += 1;
                }
            }
        }
        assert!((400..600).contains(&admitted), "admitted {}", admitted);
    }

    #[test]
    fn same_seed_same_decisions() {
        let run = || {
            let mut engine: Engine<String> = Engine::builder()
                .capacities(4, 4)
                .default_theta(0.6)
                .rng_seed(42)
                .build();
            (0..300)
                .filter_map(|i| serve(&mut engine, &format!("/k/{}", (i * 13) % 37)))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn cached_key_response_refreshes_value() {
        let mut engine: Engine<String> = Engine::builder().default_theta(1.0).build();
        serve(&mut engine, "/a");
        let outcome = engine.on_response_arrival(n("/a"), "fresh".to_string());
        assert_eq!(outcome, AdmissionOutcome::Refreshed);
        assert_eq!(engine.on_request(&n("/a")), Some(&"fresh".to_string()));
        assert_eq!(engine.cache().len(), 1);
    }
}

// ==============================================
// Control messages
// ==============================================

mod control {
    use super::*;

    #[test]
    fn out_of_range_theta_is_clamped() {
        let mut engine: Engine<String> = Engine::builder().build();
        let payload = encode_theta_updates(&[
            ThetaUpdate::new(n("/hot"), 1.7),
            ThetaUpdate::new(n("/cold"), -0.4),
        ]);
        assert_eq!(engine.on_control(&payload), Ok(2));
        assert_eq!(engine.theta_for(&n("/hot")), 1.0);
        assert_eq!(engine.theta_for(&n("/cold")), 0.0);
    }

    #[test]
    fn later_entries_override_earlier_ones() {
        let mut engine: Engine<String> = Engine::builder().build();
        let payload = encode_theta_updates(&[
            ThetaUpdate::new(n("/x"), 0.1),
            ThetaUpdate::new(n("/x"), 0.9),
        ]);
        engine.on_control(&payload).unwrap();
        assert_eq!(engine.theta_for(&n("/x")), 0.9);
    }

    #[test]
    fn malformed_vector_is_dropped_entirely() {
        init_tracing();
        let mut engine: Engine<String> = Engine::builder().build();

        // One well-formed pair followed by a pair missing its theta.
        let good = encode_theta_updates(&[ThetaUpdate::new(n("/ok"), 0.2)]);
        let mut inner = good[2..].to_vec();
        let mut key_only = Vec::new();
        tinyslru::codec::encode_tlv(tlv::KEY, b"/bad", &mut key_only);
        tinyslru::codec::encode_tlv(tlv::THETA_PAIR, &key_only, &mut inner);
        let mut payload = Vec::new();
        tinyslru::codec::encode_tlv(tlv::THETA_VECTOR, &inner, &mut payload);

        assert!(engine.on_control(&payload).is_err());
        assert_eq!(engine.theta_for(&n("/ok")), 0.5);
        assert_eq!(engine.stats().malformed_control, 1);
        assert_eq!(engine.admission().thetas().len(), 0);
    }

    #[test]
    fn control_names_never_enter_the_cache() {
        let mut engine: Engine<Vec<u8>> = Engine::builder().default_theta(1.0).build();
        let payload = encode_theta_updates(&[ThetaUpdate::new(n("/v/a"), 0.0)]);
        let outcome = engine.route_response(n("/fog/instruction/3"), payload);
        assert_eq!(outcome, AdmissionOutcome::ControlMessage);
        assert!(engine.cache().is_empty());

        let outcome = engine.route_response(n("/v/a"), b"frame".to_vec());
        assert!(matches!(
            outcome,
            AdmissionOutcome::Rejected(Rejection::Theta { theta, .. }) if theta == 0.0
        ));
    }

    #[test]
    fn custom_control_prefix() {
        let engine: Engine<String> = Engine::builder().control_prefix("/ctl").build();
        assert!(engine.is_control(&n("/ctl/1")));
        assert!(!engine.is_control(&n("/fog/instruction/1")));
    }
}

// ==============================================
// Reporting
// ==============================================

mod reporting {
    use super::*;

    #[test]
    fn second_report_carries_only_new_requests() {
        let mut engine: Engine<String> = Engine::builder().build();
        for key in ["/key1", "/key2", "/key3"] {
            for _ in 0..5 {
                engine.on_request(&n(key));
            }
        }
        let first = engine.flush().unwrap();
        assert_eq!(
            first.decode().unwrap(),
            vec![
                AccessDelta::new(n("/key1"), 5),
                AccessDelta::new(n("/key2"), 5),
                AccessDelta::new(n("/key3"), 5),
            ]
        );

        engine.on_request(&n("/key2"));
        engine.on_request(&n("/key2"));
        let second = engine.flush().unwrap();
        assert_eq!(second.decode().unwrap(), vec![AccessDelta::new(n("/key2"), 2)]);
        assert_eq!(engine.accountant().total(&n("/key2")), 7);
        assert_eq!(second.name, n("/fog/access-report/v=2"));
    }

    #[test]
    fn misses_only_reports_exclude_hits() {
        let mut engine: Engine<String> = Engine::builder()
            .default_theta(1.0)
            .access_counting(AccessCounting::MissesOnly)
            .build();
        serve(&mut engine, "/a");
        serve(&mut engine, "/a");
        serve(&mut engine, "/a");
        let report = engine.flush().unwrap();
        assert_eq!(report.decode().unwrap(), vec![AccessDelta::new(n("/a"), 1)]);
    }

    #[test]
    fn timer_loop_reports_until_shutdown() {
        init_tracing();
        let mut engine: Engine<String> = Engine::builder()
            .report_interval(Duration::from_secs(5))
            .build();
        let mut scheduler = ManualScheduler::new();
        let mut sent: Vec<AccessReport> = Vec::new();
        let mut timer = engine.report_timer();
        timer.start(&mut scheduler);

        engine.on_request(&n("/a"));
        assert_eq!(
            timer.run_until(Duration::from_secs(5), &mut scheduler, &mut engine, &mut sent),
            1
        );
        assert_eq!(sent.len(), 1);

        // Idle period: the timer fires, nothing is sent.
        assert_eq!(
            timer.run_until(Duration::from_secs(10), &mut scheduler, &mut engine, &mut sent),
            1
        );
        assert_eq!(sent.len(), 1);

        engine.on_request(&n("/b"));
        timer.shutdown(&mut scheduler);
        assert_eq!(
            timer.run_until(Duration::from_secs(60), &mut scheduler, &mut engine, &mut sent),
            0
        );
        assert_eq!(sent.len(), 1);
        assert_eq!(scheduler.now(), Duration::from_secs(60));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(engine.accountant().unreported(&n("/b")), 1);
    }

    #[test]
    fn zero_report_period_never_reaches_a_timer() {
        assert!(
            Engine::<String>::builder()
                .report_interval(Duration::ZERO)
                .try_build()
                .is_err()
        );
        assert!(ReportTimer::try_new(Duration::ZERO).is_err());
    }

    #[test]
    fn reports_carry_configured_freshness() {
        let mut engine: Engine<String> = Engine::builder()
            .report_freshness(Duration::from_millis(250))
            .report_name("/stats")
            .build();
        engine.on_request(&n("/a"));
        let report = engine.flush().unwrap();
        assert_eq!(report.freshness, Duration::from_millis(250));
        assert_eq!(report.name, n("/stats/v=1"));
    }
}

// ==============================================
// Concurrency
// ==============================================

#[cfg(feature = "concurrency")]
mod concurrency {
    use super::*;
    use std::thread;
    use tinyslru::engine::ConcurrentEngine;

    #[test]
    fn shared_engine_accounts_every_request() {
        let engine = ConcurrentEngine::new(
            Engine::<Vec<u8>>::builder()
                .capacities(8, 8)
                .default_theta(1.0)
                .build(),
        );
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        let key = Name::from(format!("/k/{}", (i + t) % 20));
                        if engine.on_request(&key).is_none() {
                            engine.route_response(key, vec![t as u8]);
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let report = engine.flush().unwrap();
        let total: u64 = report.decode().unwrap().iter().map(|d| d.count).sum();
        assert_eq!(total, 2000);
        let snap = engine.snapshot();
        assert_eq!(snap.requests, 2000);
        assert!(snap.cache.cache_len() <= 16);
    }
}
