use std::thread;
use std::time::Duration;

use crate::camera::FrameSource;
use crate::control::{ControlBus, StateHeartbeat, StatePublisher, TrackingFlag};
use crate::motion::MotionSink;
use crate::tracker::Tracker;

/// 最後の状態配信が届くまでの猶予
pub const PUBLISH_GRACE: Duration = Duration::from_millis(100);

/// 終了処理
///
/// 追跡無効化 → カメラ停止 → "off" 配信と猶予 → リスナー停止 → 映像ソース解放 の順。
/// 各手順は前の手順の失敗に関係なく実行する（失敗はログに残すだけ）。
pub fn shutdown<M, P, B, S>(
    flag: &TrackingFlag,
    tracker: &mut Tracker,
    sink: &mut M,
    heartbeat: Option<&mut StateHeartbeat<P>>,
    bus: Option<B>,
    source: &mut S,
    grace: Duration,
) where
    M: MotionSink + ?Sized,
    P: StatePublisher,
    B: ControlBus,
    S: FrameSource + ?Sized,
{
    tracing::info!("Shutting down");
    flag.set(false);

    if let Err(e) = tracker.halt(sink) {
        tracing::warn!("Failed to stop camera: {:#}", e);
    }

    if let Some(heartbeat) = heartbeat {
        if let Err(e) = heartbeat.publish_now(flag.is_enabled()) {
            tracing::warn!("Failed to publish final state: {:#}", e);
        }
        thread::sleep(grace);
    }

    if let Some(bus) = bus {
        if let Err(e) = bus.stop() {
            tracing::warn!("{:#}", e);
        }
    }

    if let Err(e) = source.release() {
        tracing::warn!("{:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{Direction, MotionCommand};
    use crate::tracker::SpeedRange;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Sink {
        log: Log,
        flag: TrackingFlag,
        direction: Direction,
        speed: u8,
        fail: bool,
    }

    impl MotionSink for Sink {
        fn set_direction(&mut self, direction: Direction) {
            self.direction = direction;
        }
        fn set_speed(&mut self, speed: u8) {
            self.speed = speed;
        }
        fn direction(&self) -> Direction {
            self.direction
        }
        fn speed(&self) -> u8 {
            self.speed
        }
        fn commit(&mut self) -> Result<()> {
            if self.fail {
                anyhow::bail!("camera unreachable");
            }
            self.log.borrow_mut().push(format!(
                "commit {} enabled={}",
                MotionCommand::new(self.direction, self.speed),
                self.flag.is_enabled()
            ));
            Ok(())
        }
    }

    struct Publisher(Log);

    impl StatePublisher for Publisher {
        fn publish_state(&mut self, enabled: bool) -> Result<()> {
            self.0.borrow_mut().push(format!("publish {}", enabled));
            Ok(())
        }
    }

    struct Bus(Log);

    impl ControlBus for Bus {
        fn stop(self) -> Result<()> {
            self.0.borrow_mut().push("stop bus".to_string());
            anyhow::bail!("broker gone")
        }
    }

    struct Source(Log);

    impl FrameSource for Source {
        type Frame = ();
        fn read_frame(&mut self) -> Option<()> {
            None
        }
        fn is_available(&self) -> bool {
            true
        }
        fn release(&mut self) -> Result<()> {
            self.0.borrow_mut().push("release".to_string());
            Ok(())
        }
    }

    fn fixture(fail: bool) -> (Log, TrackingFlag, Sink) {
        let log: Log = Rc::default();
        let flag = TrackingFlag::new(true);
        let sink = Sink {
            log: Rc::clone(&log),
            flag: flag.clone(),
            direction: Direction::ZoomIn,
            speed: 3,
            fail,
        };
        (log, flag, sink)
    }

    #[test]
    fn test_shutdown_order() {
        let (log, flag, mut sink) = fixture(false);
        let mut tracker = Tracker::new(0.35, SpeedRange::new(1, 12));
        let mut heartbeat = StateHeartbeat::new(Publisher(Rc::clone(&log)));

        shutdown(
            &flag,
            &mut tracker,
            &mut sink,
            Some(&mut heartbeat),
            Some(Bus(Rc::clone(&log))),
            &mut Source(Rc::clone(&log)),
            Duration::ZERO,
        );

        assert!(!flag.is_enabled());
        assert_eq!(
            *log.borrow(),
            vec![
                "commit ZOOM_STOP@1 enabled=false",
                "commit STOP@1 enabled=false",
                "publish false",
                "stop bus",
                "release",
            ]
        );
    }

    #[test]
    fn test_failed_halt_does_not_block_later_steps() {
        let (log, flag, mut sink) = fixture(true);
        let mut tracker = Tracker::new(0.35, SpeedRange::new(1, 12));
        let mut heartbeat = StateHeartbeat::new(Publisher(Rc::clone(&log)));

        shutdown(
            &flag,
            &mut tracker,
            &mut sink,
            Some(&mut heartbeat),
            Some(Bus(Rc::clone(&log))),
            &mut Source(Rc::clone(&log)),
            Duration::ZERO,
        );

        assert_eq!(*log.borrow(), vec!["publish false", "stop bus", "release"]);
    }

    #[test]
    fn test_without_bus_only_halts_and_releases() {
        let (log, flag, mut sink) = fixture(false);
        let mut tracker = Tracker::new(0.35, SpeedRange::new(1, 12));

        shutdown::<_, Publisher, Bus, _>(
            &flag,
            &mut tracker,
            &mut sink,
            None,
            None,
            &mut Source(Rc::clone(&log)),
            Duration::ZERO,
        );

        assert_eq!(log.borrow().len(), 3);
        assert_eq!(log.borrow()[2], "release");
    }
}
