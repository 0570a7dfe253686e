use anyhow::Result;

use super::boundary::Boundary;
use super::dispatch::{DispatchOutcome, Dispatcher};
use super::policy::{MotionPolicy, SpeedRange};
use super::region::{extract_regions, Region, TRACKING_CONFIDENCE};
use super::smooth::HeightSmoother;
use super::zone::TargetZone;
use crate::config::TrackingConfig;
use crate::motion::{MotionCommand, MotionSink};
use crate::pose::Person;

/// 1フレーム分の処理結果（描画やログ用）
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub regions: Vec<Region>,
    pub boundary: Option<Boundary>,
    pub zone: TargetZone,
    pub smoothed: f32,
    pub command: MotionCommand,
    pub outcome: DispatchOutcome,
}

/// 検出結果からカメラ駆動までの1フレーム分の処理
///
/// 人物ごとの矩形 → 全体の矩形 → 高さの平滑化 → 判定 → 変化時のみ送信。
pub struct Tracker {
    boundary_fraction: f32,
    smoother: HeightSmoother,
    policy: MotionPolicy,
    dispatcher: Dispatcher,
}

impl Tracker {
    pub fn new(boundary_fraction: f32, speeds: SpeedRange) -> Self {
        Self {
            boundary_fraction,
            smoother: HeightSmoother::new(),
            policy: MotionPolicy::new(speeds),
            dispatcher: Dispatcher::new(MotionCommand::stop(speeds.min)),
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.boundary, config.speeds())
    }

    pub fn process<S: MotionSink + ?Sized>(
        &mut self,
        frame_size: (u32, u32),
        persons: &[Person],
        enabled: bool,
        sink: &mut S,
    ) -> FrameReport {
        let (width, height) = frame_size;
        let zone = TargetZone::compute(width, height, self.boundary_fraction);

        let regions = extract_regions(persons, TRACKING_CONFIDENCE);
        let boundary = Boundary::from_regions(&regions);
        let smoothed = self.smoother.push(boundary.map(|b| b.vertical_extent()));

        let command = self.policy.decide(boundary.as_ref(), smoothed, &zone);
        let outcome = self.dispatcher.dispatch(command, enabled, sink);

        FrameReport {
            regions,
            boundary,
            zone,
            smoothed,
            command,
            outcome,
        }
    }

    /// 終了時の停止
    pub fn halt<S: MotionSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        let speed = self.policy.speeds().min;
        self.dispatcher.halt(sink, speed)
    }

    pub fn last_command(&self) -> MotionCommand {
        self.dispatcher.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::testing::RecordingSink;
    use crate::motion::Direction;
    use crate::pose::Keypoint;

    const FRAME: (u32, u32) = (1280, 720);

    fn tracker() -> Tracker {
        Tracker::new(0.35, SpeedRange::new(1, 12))
    }

    /// (left, top) - (right, bottom) の対角2点だけを持つ人物
    fn person(left: f32, top: f32, right: f32, bottom: f32) -> Person {
        Person::new(vec![
            Keypoint::new(left, top, 0.9),
            Keypoint::new(right, bottom, 0.9),
        ])
    }

    /// 中央、高さ450（ズーム不要の範囲）
    fn centered_person() -> Person {
        person(540.0, 135.0, 740.0, 585.0)
    }

    #[test]
    fn test_no_persons_stops_without_sending() {
        let mut t = tracker();
        let mut sink = RecordingSink::new(1);
        let report = t.process(FRAME, &[], true, &mut sink);

        assert!(report.boundary.is_none());
        assert_eq!(report.command, MotionCommand::stop(1));
        assert_eq!(report.outcome, DispatchOutcome::Unchanged);
        assert!(sink.committed.is_empty());
    }

    #[test]
    fn test_unchanged_command_commits_once() {
        let mut t = tracker();
        let mut sink = RecordingSink::new(1);
        let left = person(0.0, 135.0, 200.0, 585.0);

        for _ in 0..20 {
            t.process(FRAME, &[left.clone()], true, &mut sink);
        }
        assert_eq!(sink.committed.len(), 1);
        assert_eq!(sink.committed[0].direction, Direction::PanLeft);
    }

    #[test]
    fn test_low_confidence_person_is_ignored() {
        let mut t = tracker();
        let mut sink = RecordingSink::new(1);
        let ghost = Person::new(vec![Keypoint::new(0.0, 0.0, 0.05)]);
        let report = t.process(FRAME, &[ghost, centered_person()], true, &mut sink);

        assert_eq!(report.regions.len(), 1);
        assert_eq!(report.boundary, Some(Boundary::new(540.0, 135.0, 740.0, 585.0)));
    }

    #[test]
    fn test_zoom_in_then_single_zoom_stop() {
        let mut t = tracker();
        let mut sink = RecordingSink::new(1);
        // 高さ100の小さな人物 → ズームイン
        let small = person(590.0, 310.0, 690.0, 410.0);

        let report = t.process(FRAME, &[small.clone()], true, &mut sink);
        assert_eq!(report.command.direction, Direction::ZoomIn);
        for _ in 0..10 {
            t.process(FRAME, &[small.clone()], true, &mut sink);
        }

        // 十分な大きさになるまで回す（平滑化のため数フレーム遅れる）
        for _ in 0..10 {
            t.process(FRAME, &[centered_person()], true, &mut sink);
        }

        let directions: Vec<Direction> = sink.committed.iter().map(|c| c.direction).collect();
        assert_eq!(
            directions,
            vec![Direction::ZoomIn, Direction::ZoomStop, Direction::Stop]
        );
    }

    #[test]
    fn test_zoom_stop_precedes_stop_when_target_lost() {
        let mut t = tracker();
        let mut sink = RecordingSink::new(1);
        let small = person(590.0, 310.0, 690.0, 410.0);

        t.process(FRAME, &[small], true, &mut sink);
        t.process(FRAME, &[], true, &mut sink);
        t.process(FRAME, &[], true, &mut sink);

        let directions: Vec<Direction> = sink.committed.iter().map(|c| c.direction).collect();
        assert_eq!(
            directions,
            vec![Direction::ZoomIn, Direction::ZoomStop, Direction::Stop]
        );
    }

    #[test]
    fn test_disabled_tracking_suppresses_sending() {
        let mut t = tracker();
        let mut sink = RecordingSink::new(1);
        let left = person(0.0, 135.0, 200.0, 585.0);

        let report = t.process(FRAME, &[left.clone()], false, &mut sink);
        assert_eq!(report.outcome, DispatchOutcome::Suppressed);
        assert_eq!(t.last_command().direction, Direction::PanLeft);

        let report = t.process(FRAME, &[left], true, &mut sink);
        assert_eq!(report.outcome, DispatchOutcome::Unchanged);
        assert!(sink.committed.is_empty());
    }

    #[test]
    fn test_smoother_shifts_on_empty_frames() {
        let mut t = tracker();
        let mut sink = RecordingSink::new(1);
        t.process(FRAME, &[centered_person()], true, &mut sink);
        let report = t.process(FRAME, &[], true, &mut sink);
        // (10 * 3 - 450 * 2) / 5 = -174
        assert!((report.smoothed - 174.0).abs() < 1e-3, "got {}", report.smoothed);
    }

    #[test]
    fn test_halt() {
        let mut t = tracker();
        let mut sink = RecordingSink::new(1);
        t.halt(&mut sink).unwrap();
        assert_eq!(sink.committed.len(), 2);
        assert_eq!(sink.direction(), Direction::Stop);
    }
}
