//! Property-based tests using proptest
//!
//! These tests check wire and convergence invariants across randomly
//! generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use netphys::config::{InterpolationConfig, FRAME_HEADER_LEN};
use netphys::core::codec::{Deserializer, Serializer};
use netphys::core::frame;
use netphys::physics::interpolator::{step_count, InterpolationTarget, KinematicState};
use netphys::physics::{ObjectId, Obstacle, Vec2};
use netphys::protocol::event::{ObjectDeltaEvent, SnapshotEvent};
use netphys::protocol::{EventRegistry, NetEvent, NoAppEvent};
use proptest::prelude::*;

fn finite() -> impl Strategy<Value = f32> {
    -1000.0f32..1000.0
}

fn channels(state: &KinematicState) -> [f32; 6] {
    [
        state.position.x,
        state.position.y,
        state.velocity.x,
        state.velocity.y,
        state.angle,
        state.angular_velocity,
    ]
}

fn kinematic() -> impl Strategy<Value = KinematicState> {
    (finite(), finite(), finite(), finite(), -10.0f32..10.0, finite()).prop_map(
        |(x, y, vx, vy, angle, angular_velocity)| KinematicState {
            position: Vec2::new(x, y),
            velocity: Vec2::new(vx, vy),
            angle,
            angular_velocity,
        },
    )
}

// Property: header and payload survive framing untouched
proptest! {
    #[test]
    fn prop_frame_roundtrip(
        tag in any::<u8>(),
        tick in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let bytes = frame::wrap(tag, tick, &payload);
        prop_assert_eq!(bytes.len(), frame::framed_len(payload.len()));

        let (header, body) = frame::unwrap_header(&bytes).expect("full header");
        prop_assert_eq!(header.tag, tag);
        prop_assert_eq!(header.sender_tick, tick);
        prop_assert_eq!(body, &payload[..]);
    }
}

// Property: decoding arbitrary bytes never panics, and only short input
// fails the header check
proptest! {
    #[test]
    fn prop_unwrap_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let registry = EventRegistry::new();
        let result = registry.unwrap::<NoAppEvent>(&data, 0, "prop");
        if data.len() < FRAME_HEADER_LEN {
            prop_assert!(result.is_err());
        }
    }
}

// Property: lenient reads never panic and never read past the end
proptest! {
    #[test]
    fn prop_lenient_reads(data in prop::collection::vec(any::<u8>(), 0..64), ops in prop::collection::vec(0u8..8, 0..32)) {
        let mut de = Deserializer::from_bytes(data);
        for op in ops {
            let before = de.remaining();
            match op {
                0 => { de.read_bool(); }
                1 => { de.read_u8(); }
                2 => { de.read_u16(); }
                3 => { de.read_u32(); }
                4 => { de.read_u64(); }
                5 => { de.read_f32(); }
                6 => { de.read_blob(); }
                _ => { de.read_rest(); }
            }
            prop_assert!(de.remaining() <= before);
        }
    }
}

// Property: well-formed deltas decode to the event that was encoded
proptest! {
    #[test]
    fn prop_delta_wire_roundtrip(raw_id in any::<u64>(), x in finite(), y in finite(), tick in any::<u64>()) {
        let registry = EventRegistry::new();
        let event: NetEvent<NoAppEvent> =
            NetEvent::ObjectDelta(ObjectDeltaEvent::Position { object_id: ObjectId(raw_id), x, y });

        let bytes = registry.wrap(&event, tick).expect("wrap");
        let env = registry.unwrap::<NoAppEvent>(&bytes, 7, "peer").expect("unwrap");
        prop_assert_eq!(env.event, event);
        prop_assert_eq!(env.meta.sender_tick, tick);
        prop_assert_eq!(env.meta.receive_tick, 7);
    }
}

// Property: a snapshot never yields more entries than its bytes can hold
proptest! {
    #[test]
    fn prop_snapshot_count_bounded(declared in any::<u32>(), tail in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut ser = Serializer::new();
        ser.write_u32(declared);
        ser.write_bytes(&tail);
        let mut de = Deserializer::from_bytes(ser.freeze());

        let snapshot = SnapshotEvent::deserialize(&mut de);
        prop_assert!(snapshot.len() <= tail.len() / 32);
    }
}

// Property: step count always falls within [1, max_steps]
proptest! {
    #[test]
    fn prop_step_count_bounded(a in kinematic(), b in kinematic(), max_steps in 1u32..600) {
        let config = InterpolationConfig { max_steps, ..InterpolationConfig::default() };
        let n = step_count(&config, &a, &b);
        prop_assert!(n >= 1 && n <= max_steps);
    }
}

// Property: interpolation lands exactly on the target after total_steps and
// stays between start and target until then
proptest! {
    #[test]
    fn prop_interpolation_lands_exactly(from in kinematic(), to in kinematic()) {
        let mut body = Obstacle::new(from.position)
            .with_velocity(from.velocity)
            .with_angle(from.angle);
        body.set_shared(true);

        let start = KinematicState::of(&body);
        let config = InterpolationConfig::default();
        let total = step_count(&config, &start, &to);
        let mut target = InterpolationTarget::new(to, total);

        for step in 1..=total {
            let done = target.advance(&mut body);
            prop_assert_eq!(done, step == total);
            if step == total {
                continue;
            }

            let now = KinematicState::of(&body);
            for ((s, t), v) in channels(&start).into_iter().zip(channels(&to)).zip(channels(&now)) {
                prop_assert!(v >= s.min(t) && v <= s.max(t), "{} outside [{}, {}]", v, s, t);
                // Gaps this wide never round onto an endpoint
                if (t - s).abs() >= 1.0 {
                    prop_assert!(v != s && v != t, "{} not strictly inside ({}, {})", v, s, t);
                }
            }
        }
        prop_assert_eq!(KinematicState::of(&body), to);
        prop_assert!(!body.has_changes());
    }
}
