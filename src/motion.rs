//! 駆動コマンドと、それをカメラへ送るシンク

use anyhow::Result;
use std::fmt;

/// カメラの駆動方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Stop,
    PanLeft,
    PanRight,
    TiltUp,
    TiltDown,
    ZoomIn,
    ZoomOut,
    ZoomStop,
}

impl Direction {
    /// ズーム系コマンドか（パン・チルトとは別系統で停止が必要）
    pub fn is_zoom(self) -> bool {
        matches!(self, Self::ZoomIn | Self::ZoomOut | Self::ZoomStop)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stop => "STOP",
            Self::PanLeft => "PAN_LEFT",
            Self::PanRight => "PAN_RIGHT",
            Self::TiltUp => "TILT_UP",
            Self::TiltDown => "TILT_DOWN",
            Self::ZoomIn => "ZOOM_IN",
            Self::ZoomOut => "ZOOM_OUT",
            Self::ZoomStop => "ZOOM_STOP",
        };
        f.write_str(name)
    }
}

/// 1フレーム分の駆動指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionCommand {
    pub direction: Direction,
    pub speed: u8,
}

impl MotionCommand {
    pub fn new(direction: Direction, speed: u8) -> Self {
        Self { direction, speed }
    }

    pub fn stop(speed: u8) -> Self {
        Self::new(Direction::Stop, speed)
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.direction, self.speed)
    }
}

/// 駆動コマンドの送信先
///
/// `set_direction` / `set_speed` は状態を書き換えるだけで、`commit` で初めて送信する。
/// `commit` は変化がなくても安全に呼べる。重複送信の抑制は呼び出し側の責務。
pub trait MotionSink {
    fn set_direction(&mut self, direction: Direction);
    fn set_speed(&mut self, speed: u8);
    fn direction(&self) -> Direction;
    fn speed(&self) -> u8;
    fn commit(&mut self) -> Result<()>;

    /// 方向と速度をまとめて設定して送信
    fn apply(&mut self, command: MotionCommand) -> Result<()> {
        self.set_direction(command.direction);
        self.set_speed(command.speed);
        self.commit()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// commit された内容を記録するだけのシンク
    #[derive(Debug)]
    pub struct RecordingSink {
        direction: Direction,
        speed: u8,
        pub committed: Vec<MotionCommand>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn new(speed: u8) -> Self {
            Self {
                direction: Direction::Stop,
                speed,
                committed: Vec::new(),
                fail: false,
            }
        }
    }

    impl MotionSink for RecordingSink {
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
            self.committed.push(MotionCommand::new(self.direction, self.speed));
            Ok(())
        }
    }
}
