#![no_main]

use libfuzzer_sys::fuzz_target;
use netphys::protocol::{EventRegistry, NoAppEvent};

fuzz_target!(|data: &[u8]| {
    // Decoding must never panic on hostile input
    let registry = EventRegistry::new();
    if let Ok(env) = registry.unwrap::<NoAppEvent>(data, 0, "fuzz") {
        // Anything that decodes must encode back into a decodable frame
        if let Ok(frame) = registry.wrap(&env.event, env.meta.sender_tick) {
            let _ = registry.unwrap::<NoAppEvent>(&frame, 0, "fuzz");
        }
    }
});
