// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for stored action record decoding

#![no_main]

use firewalldb_actions::{decode_action, encode_action};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode to an error, never a panic
    let Ok(action) = decode_action(data) else {
        return;
    };

    // Anything that does decode must survive another trip unchanged
    let encoded = encode_action(&action).expect("decoded action re-encodes");
    let again = decode_action(&encoded).expect("re-encoded record decodes");
    assert_eq!(again, action);
});
