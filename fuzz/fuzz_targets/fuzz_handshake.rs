#![no_main]

use libfuzzer_sys::fuzz_target;
use netphys::core::codec::Deserializer;
use netphys::protocol::handshake::SessionState;
use netphys::protocol::SessionEvent;
use netphys::transport::ConnectionState;

fuzz_target!(|data: &[u8]| {
    // Drive the session machine with arbitrary session events
    let mut state = SessionState::new();
    state.begin(data.first().is_some_and(|b| b & 1 == 1));
    state.on_connection_state(ConnectionState::Connected, &[]);
    state.on_connection_state(ConnectionState::SessionEstablished, &["peer-0002".to_string()]);

    let mut de = Deserializer::from_bytes(data.to_vec());
    let mut tick = 0u64;
    while !de.is_exhausted() {
        tick += 1;
        if let Ok(event) = SessionEvent::deserialize(&mut de) {
            let _ = state.on_session_event(event, "peer-0002", 1, tick);
        }
        let _ = state.mark_ready(1, tick);
    }
});
