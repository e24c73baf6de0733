//! Gait sequencer: six legs walked through phase-offset waypoints.
//!
//! Coordinates are per-leg Cartesian foot positions: X forward, Y out from
//! the shoulder, Z down (so stance height is positive). One step cycle
//! visits four named waypoints; the even-indexed legs (group A) and the
//! odd-indexed legs (group B) traverse the same set 180 degrees out of
//! phase, so three feet are always on the ground while the other three
//! swing. That alternation is the tripod gait.
//!
//! Per waypoint transition the sequencer solves every leg, stages all
//! eighteen joints, fires all eighteen triggers back to back, and then
//! sleeps the slot out so the servos finish travelling before the next
//! transition starts.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::channel::BusChannel;
use crate::constants::LEG_COUNT;
use crate::error::{GaitError, ServoError};
use crate::leg::{JointPositions, Leg, LegSnapshot};
use crate::transport::{BusTransport, SharedBus};

/// Duration weight of the slow, ground-contact stance phase.
const STANCE_WEIGHT: f64 = 0.601;

/// Duration weight of each of the three fast swing transitions.
const SWING_WEIGHT: f64 = 0.133;

/// Y distance of the foot from the shoulder during a step.
const STANCE_Y: f64 = 100.0;

/// Z height of a foot on the ground.
const STANCE_Z: f64 = 70.0;

/// Z height of a foot mid-swing.
const SWING_Z: f64 = 40.0;

/// Forward reach of a full stride.
const STRIDE_X: f64 = 100.0;

/// X of the intermediate swing waypoints.
const HALF_STRIDE_X: f64 = 50.0;

/// Pivot angle bound; one call yaws the body by at most twice this.
const PIVOT_MAX_DEG: f64 = 23.0;

/// Footprint radius of the corner legs about the body centre.
const PIVOT_RADIUS_CORNER: f64 = 271.5;

/// Footprint radius of the middle legs; they pivot in place.
const PIVOT_RADIUS_MIDDLE: f64 = 232.5;

/// Nominal footprint angle of the corner legs, radians.
const PIVOT_BASE_CORNER: f64 = 0.9465;

/// Nominal footprint angle of the middle legs, radians.
const PIVOT_BASE_MIDDLE: f64 = 0.7853;

/// Travel time for posture transitions.
const POSTURE_MS: u16 = 500;

/// Inverse kinematics for one leg, supplied by the caller.
///
/// Must be pure: same inputs, same outputs, no I/O. Returns `None` when
/// the foot position is out of reach.
pub trait LegSolver: Send {
    /// Convert a foot position to the three joint servo positions.
    fn solve_leg(&self, leg: usize, x: f64, y: f64, z: f64) -> Option<JointPositions>;
}

/// Fixed whole-body stances, expressed as one foot position used by all
/// six legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Posture {
    /// Normal standing height
    Stand,
    /// Legs withdrawn, belly on the ground
    Sit,
    /// Legs lifted to half height
    Lift,
    /// Standing as tall as the legs allow
    Tall,
}

impl Posture {
    fn foot(self) -> (f64, f64, f64) {
        match self {
            Posture::Stand => (0.0, STANCE_Y, 70.0),
            Posture::Sit => (0.0, STANCE_Y, 20.0),
            Posture::Lift => (0.0, STANCE_Y, 40.0),
            Posture::Tall => (0.0, STANCE_Y, 120.0),
        }
    }
}

/// Timestamped diagnostics for the whole machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HexapodDiagnostics {
    /// When the interrogation ran
    pub timestamp: DateTime<Utc>,
    /// One snapshot per leg, in leg order
    pub legs: Vec<LegSnapshot>,
}

#[derive(Debug, Clone, Copy)]
struct Waypoint {
    x: f64,
    y: f64,
    z: f64,
    weight: f64,
}

impl Waypoint {
    fn new((x, y, z): (f64, f64, f64), weight: f64) -> Self {
        Waypoint { x, y, z, weight }
    }
}

/// The whole machine: six legs, one bus, one solver.
pub struct Hexapod {
    bus: SharedBus,
    legs: [Leg; LEG_COUNT],
    solver: Box<dyn LegSolver>,
}

impl Hexapod {
    /// Build a hexapod on a fresh channel.
    pub fn new(
        channel: Box<dyn BusChannel>,
        solver: Box<dyn LegSolver>,
    ) -> Result<Self, ServoError> {
        Self::with_bus(BusTransport::shared(channel), solver)
    }

    /// Build a hexapod on an already-shared bus (e.g. one also carrying
    /// telemetry traffic from another thread).
    pub fn with_bus(bus: SharedBus, solver: Box<dyn LegSolver>) -> Result<Self, ServoError> {
        let legs = [
            Leg::new(&bus, 0)?,
            Leg::new(&bus, 1)?,
            Leg::new(&bus, 2)?,
            Leg::new(&bus, 3)?,
            Leg::new(&bus, 4)?,
            Leg::new(&bus, 5)?,
        ];
        Ok(Hexapod { bus, legs, solver })
    }

    /// The shared bus handle.
    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    /// All six legs, in index order.
    pub fn legs(&self) -> &[Leg; LEG_COUNT] {
        &self.legs
    }

    /// Mutable access to the legs, for direct joint work.
    pub fn legs_mut(&mut self) -> &mut [Leg; LEG_COUNT] {
        &mut self.legs
    }

    /// Take one step forward. `stride` stretches the reach waypoint
    /// (1.0 is a nominal stride); `step_ms` is the duration of the whole
    /// cycle, at most 30000.
    pub fn forward_step(&mut self, stride: f64, step_ms: u16) -> Result<(), GaitError> {
        let aep = (STRIDE_X * stride, STANCE_Y, STANCE_Z);
        let pep = (-STRIDE_X, STANCE_Y, STANCE_Z);
        let asp = (HALF_STRIDE_X, STANCE_Y, SWING_Z);
        let psp = (-HALF_STRIDE_X, STANCE_Y, SWING_Z);

        info!("forward step, stride {stride:.2}, {step_ms} ms");
        // Group A pushes the body forward along the ground while group B
        // swings through ASP/AEP; then the roles swap.
        let group_a = [
            Waypoint::new(pep, STANCE_WEIGHT),
            Waypoint::new(psp, SWING_WEIGHT),
            Waypoint::new(asp, SWING_WEIGHT),
            Waypoint::new(aep, SWING_WEIGHT),
        ];
        let group_b = [
            Waypoint::new(asp, SWING_WEIGHT),
            Waypoint::new(aep, SWING_WEIGHT),
            Waypoint::new(pep, STANCE_WEIGHT),
            Waypoint::new(psp, SWING_WEIGHT),
        ];
        self.run_cycle(&group_a, &group_b, step_ms)
    }

    /// Take one step backward; `stride` stretches the rear waypoint.
    pub fn backward_step(&mut self, stride: f64, step_ms: u16) -> Result<(), GaitError> {
        let aep = (STRIDE_X, STANCE_Y, STANCE_Z);
        let pep = (-STRIDE_X * stride, STANCE_Y, STANCE_Z);
        let asp = (HALF_STRIDE_X, STANCE_Y, SWING_Z);
        let psp = (-HALF_STRIDE_X, STANCE_Y, SWING_Z);

        info!("backward step, stride {stride:.2}, {step_ms} ms");
        let group_a = [
            Waypoint::new(aep, STANCE_WEIGHT),
            Waypoint::new(asp, SWING_WEIGHT),
            Waypoint::new(psp, SWING_WEIGHT),
            Waypoint::new(pep, SWING_WEIGHT),
        ];
        let group_b = [
            Waypoint::new(psp, SWING_WEIGHT),
            Waypoint::new(pep, SWING_WEIGHT),
            Waypoint::new(aep, STANCE_WEIGHT),
            Waypoint::new(asp, SWING_WEIGHT),
        ];
        self.run_cycle(&group_a, &group_b, step_ms)
    }

    /// Turn on the spot. Positive `angle_deg` yaws to starboard; the
    /// input is clamped to ±23 degrees and a full call rotates the body
    /// by about twice the clamped angle. `phase_ms` paces each of the
    /// four phases; stance placements take twice that, so keep it at or
    /// below 15000 (and practically, at or above 100).
    pub fn pivot(&mut self, angle_deg: f64, phase_ms: u16) -> Result<(), GaitError> {
        let angle = angle_deg.clamp(-PIVOT_MAX_DEG, PIVOT_MAX_DEG);
        let place_ms = phase_ms.saturating_mul(2);
        info!("pivot {angle:.1} degrees, {phase_ms} ms per phase");

        // Stance tripod pushes round while the swing tripod lifts clear.
        self.stage_group(0, |leg| pivot_foot(leg, angle), place_ms)?;
        self.stage_group(1, |_| Posture::Lift.foot(), phase_ms)?;
        self.trigger_and_wait(phase_ms)?;

        // Swing tripod sets down on the counter-rotated footprint.
        self.stage_group(1, |leg| pivot_foot(leg, -angle), phase_ms)?;
        self.trigger_and_wait(phase_ms)?;

        // Roles swap for the second half-cycle.
        self.stage_group(0, |_| Posture::Lift.foot(), phase_ms)?;
        self.stage_group(1, |leg| pivot_foot(leg, angle), place_ms)?;
        self.trigger_and_wait(phase_ms)?;

        self.stage_group(0, |leg| pivot_foot(leg, -angle), phase_ms)?;
        self.trigger_and_wait(phase_ms)?;
        Ok(())
    }

    /// Adopt a fixed posture: stage all six legs, trigger once, wait out
    /// the travel. Sitting also unloads every servo so the frame rests on
    /// its belly without fighting gravity.
    pub fn posture(&mut self, posture: Posture) -> Result<(), GaitError> {
        info!("posture {posture:?}");
        let foot = posture.foot();
        for index in 0..LEG_COUNT {
            let joints = self.solve(index, foot)?;
            self.legs[index].stage_position(joints, POSTURE_MS)?;
        }
        self.trigger_and_wait(POSTURE_MS)?;
        if posture == Posture::Sit {
            self.unload_all()?;
        }
        Ok(())
    }

    /// Stand at normal height.
    pub fn stand(&mut self) -> Result<(), GaitError> {
        self.posture(Posture::Stand)
    }

    /// Withdraw the legs, rest on the belly, and unload.
    pub fn sit(&mut self) -> Result<(), GaitError> {
        self.posture(Posture::Sit)
    }

    /// Lift to half height.
    pub fn lift(&mut self) -> Result<(), GaitError> {
        self.posture(Posture::Lift)
    }

    /// Stand as tall as the legs allow.
    pub fn tall(&mut self) -> Result<(), GaitError> {
        self.posture(Posture::Tall)
    }

    /// Trigger every staged move on every leg, back to back.
    pub fn trigger_all(&mut self) -> Result<(), ServoError> {
        for leg in self.legs.iter_mut() {
            leg.trigger_all()?;
        }
        Ok(())
    }

    /// Stop every servo dead.
    pub fn stop_all(&mut self) -> Result<(), ServoError> {
        for leg in self.legs.iter_mut() {
            leg.stop_all()?;
        }
        Ok(())
    }

    /// Enable torque on every servo.
    pub fn load_all(&mut self) -> Result<(), ServoError> {
        for leg in self.legs.iter_mut() {
            leg.load_all()?;
        }
        Ok(())
    }

    /// Cut torque on every servo; the machine goes limp.
    pub fn unload_all(&mut self) -> Result<(), ServoError> {
        for leg in self.legs.iter_mut() {
            leg.unload_all()?;
        }
        Ok(())
    }

    /// Interrogate every joint of every leg.
    pub fn diagnostics(&self) -> Result<HexapodDiagnostics, ServoError> {
        let mut legs = Vec::with_capacity(LEG_COUNT);
        for leg in &self.legs {
            debug!("interrogating {} leg", leg.name());
            legs.push(leg.read_diagnostics()?);
        }
        Ok(HexapodDiagnostics {
            timestamp: Utc::now(),
            legs,
        })
    }

    /// One gait cycle: four stage-everything/trigger-everything rounds.
    /// Any failure aborts the round before its trigger pass; already
    /// staged servos keep their pending targets on the device.
    fn run_cycle(
        &mut self,
        group_a: &[Waypoint; 4],
        group_b: &[Waypoint; 4],
        step_ms: u16,
    ) -> Result<(), GaitError> {
        for transition in 0..4 {
            for index in 0..LEG_COUNT {
                let waypoint = if index % 2 == 0 {
                    &group_a[transition]
                } else {
                    &group_b[transition]
                };
                let joints = self.solve(index, (waypoint.x, waypoint.y, waypoint.z))?;
                let duration = scale_ms(step_ms, waypoint.weight);
                self.legs[index].stage_position(joints, duration)?;
            }
            // The slot lasts until the slower group has landed.
            let slot = scale_ms(step_ms, group_a[transition].weight.max(group_b[transition].weight));
            self.trigger_and_wait(slot)?;
        }
        Ok(())
    }

    fn stage_group(
        &mut self,
        parity: usize,
        foot: impl Fn(usize) -> (f64, f64, f64),
        duration_ms: u16,
    ) -> Result<(), GaitError> {
        for index in (0..LEG_COUNT).filter(|i| i % 2 == parity) {
            let joints = self.solve(index, foot(index))?;
            self.legs[index].stage_position(joints, duration_ms)?;
        }
        Ok(())
    }

    fn trigger_and_wait(&mut self, wait_ms: u16) -> Result<(), GaitError> {
        self.trigger_all()?;
        thread::sleep(Duration::from_millis(wait_ms as u64));
        Ok(())
    }

    fn solve(&self, leg: usize, (x, y, z): (f64, f64, f64)) -> Result<JointPositions, GaitError> {
        self.solver
            .solve_leg(leg, x, y, z)
            .ok_or(GaitError::Unreachable { leg, x, y, z })
    }
}

/// Foot position of `leg` with its nominal footprint angle rotated by
/// `angle_deg` about the body centre. Corner legs describe the larger
/// radius; the middle pair pivots in place.
fn pivot_foot(leg: usize, angle_deg: f64) -> (f64, f64, f64) {
    let a = angle_deg.to_radians();
    let (x, y) = match leg {
        0 => (
            PIVOT_RADIUS_CORNER * (PIVOT_BASE_CORNER + a).cos() - 58.5,
            PIVOT_RADIUS_CORNER * (PIVOT_BASE_CORNER + a).sin() - 120.0,
        ),
        1 => (
            PIVOT_RADIUS_MIDDLE * (PIVOT_BASE_MIDDLE + a).cos() - 64.7,
            PIVOT_RADIUS_MIDDLE * (PIVOT_BASE_MIDDLE + a).sin() - 64.7,
        ),
        2 => (
            PIVOT_RADIUS_CORNER * (PIVOT_BASE_CORNER - a).sin() - 120.0,
            PIVOT_RADIUS_CORNER * (PIVOT_BASE_CORNER - a).cos() - 58.5,
        ),
        3 => (
            PIVOT_RADIUS_CORNER * (PIVOT_BASE_CORNER - a).cos() - 58.5,
            PIVOT_RADIUS_CORNER * (PIVOT_BASE_CORNER - a).sin() - 120.0,
        ),
        4 => (
            PIVOT_RADIUS_MIDDLE * (PIVOT_BASE_MIDDLE - a).cos() - 64.7,
            PIVOT_RADIUS_MIDDLE * (PIVOT_BASE_MIDDLE - a).sin() - 64.7,
        ),
        5 => (
            PIVOT_RADIUS_CORNER * (PIVOT_BASE_CORNER + a).sin() - 120.0,
            PIVOT_RADIUS_CORNER * (PIVOT_BASE_CORNER + a).cos() - 58.5,
        ),
        _ => (STRIDE_X, STANCE_Y),
    };
    (x, y, STANCE_Z)
}

fn scale_ms(step_ms: u16, weight: f64) -> u16 {
    (f64::from(step_ms) * weight).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockChannel;
    use crate::command::Command;

    /// Encodes its inputs into the joint values so tests can read the
    /// requested foot position back out of the staged frames.
    struct TracingSolver;

    impl LegSolver for TracingSolver {
        fn solve_leg(&self, leg: usize, x: f64, _y: f64, z: f64) -> Option<JointPositions> {
            Some(JointPositions {
                shoulder: (x + 500.0).clamp(0.0, 1000.0) as u16,
                knee: z.clamp(0.0, 1000.0) as u16,
                ankle: (leg * 100 + 50) as u16,
            })
        }
    }

    struct BlindSolver;

    impl LegSolver for BlindSolver {
        fn solve_leg(&self, _leg: usize, _x: f64, _y: f64, _z: f64) -> Option<JointPositions> {
            None
        }
    }

    fn hexapod(mock: &MockChannel, solver: Box<dyn LegSolver>) -> Hexapod {
        Hexapod::new(Box::new(mock.clone()), solver).unwrap()
    }

    /// (leg, z) per stage frame, in transmission order.
    fn staged_heights(frames: &[Vec<u8>]) -> Vec<(usize, u16)> {
        frames
            .iter()
            .filter(|f| f[4] == Command::MoveTimeWaitWrite.code() && (f[2] - 1) % 3 == 1)
            .map(|f| {
                let leg = (f[2] as usize - 1) / 3;
                let z = u16::from_le_bytes([f[5], f[6]]);
                (leg, z)
            })
            .collect()
    }

    #[test]
    fn tripod_groups_partition_every_transition() {
        let mock = MockChannel::new();
        let mut hexapod = hexapod(&mock, Box::new(TracingSolver));
        hexapod.forward_step(1.0, 8).unwrap();

        let heights = staged_heights(&mock.written_frames());
        assert_eq!(heights.len(), 24, "six knees per transition, four transitions");

        for transition in heights.chunks(6) {
            let even: Vec<u16> = transition
                .iter()
                .filter(|(leg, _)| leg % 2 == 0)
                .map(|&(_, z)| z)
                .collect();
            let odd: Vec<u16> = transition
                .iter()
                .filter(|(leg, _)| leg % 2 == 1)
                .map(|&(_, z)| z)
                .collect();
            assert_eq!(even.len(), 3);
            assert_eq!(odd.len(), 3);
            // Each group moves as one, and while one group works the
            // ground the other is in the air.
            assert!(even.windows(2).all(|w| w[0] == w[1]));
            assert!(odd.windows(2).all(|w| w[0] == w[1]));
            assert_ne!(even[0], odd[0]);
            assert!(even[0] == STANCE_Z as u16 || even[0] == SWING_Z as u16);
            assert!(odd[0] == STANCE_Z as u16 || odd[0] == SWING_Z as u16);
        }
    }

    #[test]
    fn a_step_stages_then_triggers_every_leg_each_transition() {
        let mock = MockChannel::new();
        let mut hexapod = hexapod(&mock, Box::new(TracingSolver));
        hexapod.forward_step(1.0, 8).unwrap();

        let frames = mock.written_frames();
        assert_eq!(frames.len(), 4 * 36);
        for round in frames.chunks(36) {
            assert!(round[..18]
                .iter()
                .all(|f| f[4] == Command::MoveTimeWaitWrite.code()));
            assert!(round[18..].iter().all(|f| f[4] == Command::MoveStart.code()));
        }
    }

    #[test]
    fn stride_factor_stretches_the_reach_waypoint() {
        let mock = MockChannel::new();
        let mut hexapod = hexapod(&mock, Box::new(TracingSolver));
        hexapod.forward_step(2.0, 8).unwrap();

        // Shoulder encodes x + 500; group B hits AEP on its second
        // transition, so a doubled stride stages x = 200 there.
        let frames = mock.written_frames();
        let aep_shoulder = frames
            .iter()
            .filter(|f| f[4] == Command::MoveTimeWaitWrite.code() && f[2] == 4)
            .nth(1)
            .map(|f| u16::from_le_bytes([f[5], f[6]]))
            .unwrap();
        assert_eq!(aep_shoulder, 700);
    }

    #[test]
    fn pivot_clamps_to_its_documented_bound() {
        let full = MockChannel::new();
        hexapod(&full, Box::new(TracingSolver)).pivot(90.0, 1).unwrap();
        let clamped = MockChannel::new();
        hexapod(&clamped, Box::new(TracingSolver)).pivot(23.0, 1).unwrap();
        assert_eq!(full.written_frames(), clamped.written_frames());

        let left = MockChannel::new();
        hexapod(&left, Box::new(TracingSolver)).pivot(-90.0, 1).unwrap();
        let left_clamped = MockChannel::new();
        hexapod(&left_clamped, Box::new(TracingSolver)).pivot(-23.0, 1).unwrap();
        assert_eq!(left.written_frames(), left_clamped.written_frames());

        // And the clamp changes something: a smaller turn stages
        // different coordinates.
        let small = MockChannel::new();
        hexapod(&small, Box::new(TracingSolver)).pivot(10.0, 1).unwrap();
        assert_ne!(small.written_frames(), clamped.written_frames());
    }

    #[test]
    fn a_failed_stage_aborts_before_any_trigger() {
        let mock = MockChannel::new();
        mock.fail_after_writes(4);
        let mut hexapod = hexapod(&mock, Box::new(TracingSolver));

        assert!(hexapod.forward_step(1.0, 8).is_err());
        let frames = mock.written_frames();
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| f[4] != Command::MoveStart.code()));
    }

    #[test]
    fn an_unreachable_waypoint_names_the_leg() {
        let mock = MockChannel::new();
        let mut hexapod = hexapod(&mock, Box::new(BlindSolver));
        match hexapod.forward_step(1.0, 8) {
            Err(GaitError::Unreachable { leg, .. }) => assert_eq!(leg, 0),
            other => panic!("expected Unreachable, got {other:?}"),
        }
        assert!(mock.written_frames().is_empty());
    }

    #[test]
    fn sitting_unloads_after_the_move() {
        let mock = MockChannel::new();
        let mut hexapod = hexapod(&mock, Box::new(TracingSolver));
        hexapod.sit().unwrap();

        let frames = mock.written_frames();
        // 18 stages, 18 triggers, 18 unloads.
        assert_eq!(frames.len(), 54);
        assert!(frames[36..]
            .iter()
            .all(|f| f[4] == Command::LoadModeWrite.code() && f[5] == 0));
    }
}
