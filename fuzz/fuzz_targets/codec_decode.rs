#![no_main]

use libfuzzer_sys::fuzz_target;
use tinyslru::codec::{
    decode_access_report, decode_theta_updates, encode_access_report, encode_theta_updates,
};

// Fuzz both payload decoders with arbitrary bytes.
//
// Decoding must never panic, every decoded θ must be a probability, and
// anything that decodes must survive a re-encode.
fuzz_target!(|data: &[u8]| {
    if let Ok(updates) = decode_theta_updates(data) {
        for update in &updates {
            assert!((0.0..=1.0).contains(&update.theta));
        }
        let again = decode_theta_updates(&encode_theta_updates(&updates))
            .expect("re-encoded theta vector decodes");
        assert_eq!(again.len(), updates.len());
    }

    if let Ok(records) = decode_access_report(data) {
        let again = decode_access_report(&encode_access_report(&records))
            .expect("re-encoded report decodes");
        assert_eq!(again, records);
    }
});
