#![no_main]

use libfuzzer_sys::fuzz_target;
use tinyslru::Name;
use tinyslru::engine::Engine;

// Fuzz arbitrary request/response/control/flush sequences on the engine.
//
// The first two bytes pick the segment capacities; the rest is a stream of
// (op, key) pairs. Segment caps and cache links are checked after every op.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let probation = usize::from(data[0] % 8) + 1;
    let protected = usize::from(data[1] % 8);
    let mut engine: Engine<Vec<u8>> = Engine::builder()
        .capacities(probation, protected)
        .sketch(2, 64)
        .build();

    for chunk in data[2..].chunks(2) {
        let [op, k] = chunk else {
            break;
        };
        let key = Name::from(format!("/k/{}", k % 48));

        match op % 5 {
            0 => {
                let _ = engine.on_request(&key);
            }
            1 | 2 => {
                let _ = engine.route_response(key, vec![*k]);
            }
            3 => {
                // control payload carved from the remaining input
                let _ = engine.on_control(&data[2..]);
            }
            _ => {
                let _ = engine.flush();
            }
        }

        let cache = engine.cache();
        assert!(cache.probation_len() <= probation);
        assert!(cache.protected_len() <= protected);
        assert!(cache.check_invariants().is_ok());
    }

    let stats = engine.stats();
    assert_eq!(stats.requests, stats.hits + stats.misses);
});
