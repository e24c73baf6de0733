//! End-to-end tests: the whole stack from gait sequencer down to the
//! channel seam, against a scripted mock bus.

use hexapod_bus::channel::mock::{BusEvent, MockChannel};
use hexapod_bus::{
    checksum, Command, Hexapod, JointPositions, Leg, LegSolver, BusTransport,
};

/// Flat-footed solver: good enough to exercise the pipeline.
struct TableSolver;

impl LegSolver for TableSolver {
    fn solve_leg(&self, _leg: usize, x: f64, _y: f64, z: f64) -> Option<JointPositions> {
        Some(JointPositions {
            shoulder: (x + 500.0).clamp(0.0, 1000.0) as u16,
            knee: (500.0 - z).clamp(0.0, 1000.0) as u16,
            ankle: 500,
        })
    }
}

fn reply(id: u8, command: Command, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x55, 0x55, id, 3 + payload.len() as u8, command.code()];
    bytes.extend_from_slice(payload);
    bytes.push(checksum(&bytes[2..]));
    bytes
}

/// Script one joint's worth of diagnostic replies, in the order the leg
/// controller asks for them.
fn push_joint_replies(mock: &MockChannel, id: u8) {
    mock.push_reply(reply(id, Command::AngleLimitRead, &[0, 0, 0xE8, 0x03]));
    mock.push_reply(reply(id, Command::PosRead, &[0xF4, 0x01]));
    mock.push_reply(reply(id, Command::TempLimitRead, &[85]));
    mock.push_reply(reply(id, Command::TempRead, &[41]));
    mock.push_reply(reply(id, Command::VinLimitRead, &[0x28, 0x23, 0x38, 0x31]));
    mock.push_reply(reply(id, Command::VinRead, &[0x7C, 0x2D]));
    mock.push_reply(reply(id, Command::AngleOffsetRead, &[(-7i8) as u8]));
    mock.push_reply(reply(id, Command::LoadModeRead, &[1]));
}

#[test]
fn a_whole_walk_stays_write_only() {
    let mock = MockChannel::new();
    let mut hexapod = Hexapod::new(Box::new(mock.clone()), Box::new(TableSolver)).unwrap();

    hexapod.stand().unwrap();
    hexapod.forward_step(1.0, 8).unwrap();
    hexapod.pivot(15.0, 1).unwrap();
    hexapod.backward_step(1.0, 8).unwrap();

    // Gaits never query; the line never turns around.
    assert!(!mock.events().contains(&BusEvent::SetReadMode));
    // And every transmission was preceded by a write-mode switch.
    let events = mock.events();
    for (i, event) in events.iter().enumerate() {
        if matches!(event, BusEvent::Write(_)) {
            assert_eq!(events[i - 1], BusEvent::SetWriteMode);
        }
    }
}

#[test]
fn leg_diagnostics_decode_the_scripted_servo_answers() {
    let mock = MockChannel::new();
    let bus = BusTransport::shared(Box::new(mock.clone()));
    let leg = Leg::new(&bus, 2).unwrap();

    for id in [7, 8, 9] {
        push_joint_replies(&mock, id);
    }

    let snapshot = leg.read_diagnostics().unwrap();
    assert_eq!(snapshot.leg, 2);
    assert_eq!(snapshot.name, "Port front");
    for (joint, id) in snapshot.joints.iter().zip([7u8, 8, 9]) {
        assert_eq!(joint.id, id);
        assert_eq!(joint.rotation_limits, (0, 1000));
        assert_eq!(joint.position, 500);
        assert_eq!(joint.temperature_limit, 85);
        assert_eq!(joint.temperature, 41);
        assert_eq!(joint.voltage_limits_mv, (9000, 12_600));
        assert_eq!(joint.voltage_mv, 11_644);
        assert_eq!(joint.offset, -7);
        assert!(joint.loaded);
    }

    // Snapshots serialize for logging and fleet tooling.
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"Port front\""));
}

#[test]
fn whole_hexapod_diagnostics_aggregate_all_six_legs() {
    let mock = MockChannel::new();
    let hexapod = Hexapod::new(Box::new(mock.clone()), Box::new(TableSolver)).unwrap();

    for id in 1..=18 {
        push_joint_replies(&mock, id);
    }

    let report = hexapod.diagnostics().unwrap();
    assert_eq!(report.legs.len(), 6);
    assert_eq!(report.legs[5].name, "Starboard front");
    assert_eq!(report.legs[5].joints[2].id, 18);
}

#[test]
fn a_dead_joint_fails_the_whole_aggregate() {
    let mock = MockChannel::new();
    let bus = BusTransport::shared(Box::new(mock.clone()));
    let leg = Leg::new(&bus, 0).unwrap();

    // Only the shoulder answers; the knee's first read times out.
    push_joint_replies(&mock, 1);
    let err = leg.read_diagnostics().unwrap_err();
    assert!(matches!(
        err,
        hexapod_bus::ServoError::Transport(hexapod_bus::TransportError::Timeout)
    ));
}
