//! Property tests for the foreground/tick boundary
//!
//! Tests invariants for:
//! - Seqlock: the last publish wins, versions count publishes
//! - Command queue: bounded depth, in-order application
//! - Sync: `is_synced` flips only when a tick has applied everything

use micromouse::control::ControlLoop;
use micromouse::hal::NoopHal;
use micromouse::shared::*;
use micromouse::snapshot::*;
use micromouse::types::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn profile_state() -> impl Strategy<Value = ProfileState> {
    (0u32..4).prop_map(ProfileState::from_bits)
}

fn profile_snapshot() -> impl Strategy<Value = ProfileSnapshot> {
    (
        profile_state(),
        -5000.0f32..5000.0f32,
        -3000.0f32..3000.0f32,
        -3000.0f32..3000.0f32,
        -3000.0f32..3000.0f32,
        0.0f32..20000.0f32,
    )
        .prop_map(|(state, position, speed, target_speed, final_speed, acceleration)| {
            ProfileSnapshot {
                state,
                position,
                speed,
                target_speed,
                final_speed,
                acceleration,
            }
        })
}

// ============================================================================
// Seqlock Property Tests
// ============================================================================

proptest! {
    /// CORE INVARIANT: a reader sees exactly the last published value
    #[test]
    fn last_publish_wins(values in prop::collection::vec(profile_snapshot(), 1..50)) {
        let cell: Seqlock<ProfileSnapshot, 6> = Seqlock::new();
        for value in &values {
            cell.publish(value);
        }
        prop_assert_eq!(cell.sample(), Ok(*values.last().unwrap()));
        prop_assert_eq!(cell.version(), values.len() as u32);
    }
}

// ============================================================================
// Command Queue Property Tests
// ============================================================================

proptest! {
    /// The queue holds exactly its depth
    #[test]
    fn queue_depth_is_bounded(extra in 0usize..20) {
        let shared = SharedState::new();
        let total = COMMAND_QUEUE_SIZE + extra;
        let accepted = (0..total)
            .filter(|_| shared.send(Command::Controllers(false)).is_ok())
            .count();
        prop_assert_eq!(accepted, COMMAND_QUEUE_SIZE);
    }

    /// Commands apply in order within one tick, then the foreground is in sync
    #[test]
    fn commands_apply_in_order(
        adjustments in prop::collection::vec(-200.0f32..200.0f32, 1..=COMMAND_QUEUE_SIZE)
    ) {
        let shared = SharedState::new();
        let mut control = ControlLoop::new(None);
        let mut hal = NoopHal::new();

        let forward = shared.forward();
        for adjustment in &adjustments {
            forward.adjust_position(*adjustment).unwrap();
        }
        prop_assert!(!shared.is_synced());

        control.tick(&mut hal, &shared);
        prop_assert!(shared.is_synced());

        let mut expected = 0.0f32;
        for adjustment in &adjustments {
            expected += *adjustment;
        }
        prop_assert_eq!(forward.position(), expected);
        prop_assert_eq!(control.forward().position(), expected);
    }
}
