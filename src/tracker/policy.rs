use super::boundary::Boundary;
use super::zone::TargetZone;
use crate::motion::{Direction, MotionCommand};

/// チルト速度の上限側を抑える係数
const TILT_DAMPING: f32 = 1.75;

/// 設定された速度範囲と、距離比から速度への線形変換
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedRange {
    pub min: u8,
    pub max: u8,
}

impl SpeedRange {
    pub fn new(min: u8, max: u8) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// パン速度: round((max - min) * ratio + min)
    pub fn linear(&self, lo: f32, val: f32, hi: f32) -> u8 {
        let span = self.max as f32 - self.min as f32;
        self.clamp(span * ratio(lo, val, hi) + self.min as f32)
    }

    /// チルト速度: round((max - min * 1.75) * ratio + min)
    pub fn tilt(&self, lo: f32, val: f32, hi: f32) -> u8 {
        let span = self.max as f32 - self.min as f32 * TILT_DAMPING;
        self.clamp(span * ratio(lo, val, hi) + self.min as f32)
    }

    fn clamp(&self, speed: f32) -> u8 {
        speed.round().clamp(self.min as f32, self.max as f32) as u8
    }
}

fn ratio(lo: f32, val: f32, hi: f32) -> f32 {
    if hi == 0.0 {
        0.0
    } else {
        (val - lo) / hi
    }
}

enum Decision {
    Stop,
    Move(Direction, u8),
    Zoom(Direction),
}

/// 固定優先順位の駆動判定
///
/// 1. 対象なし → STOP
/// 2-3. 水平中心が目標領域の外 → PAN
/// 4-5. 垂直中心が目標領域の外 → TILT
/// 6-7. 平滑化した高さが閾値外 → ZOOM
/// 8. それ以外 → STOP
///
/// ズーム中に STOP の判定（1 または 8）になったフレームは、代わりに ZOOM_STOP を1回だけ出す。
/// パン・チルトはそのまま出し、ズーム中の状態は維持する。
pub struct MotionPolicy {
    speeds: SpeedRange,
    speed: u8,
    zooming: bool,
}

impl MotionPolicy {
    pub fn new(speeds: SpeedRange) -> Self {
        Self {
            speeds,
            speed: speeds.min,
            zooming: false,
        }
    }

    pub fn speeds(&self) -> SpeedRange {
        self.speeds
    }

    pub fn is_zooming(&self) -> bool {
        self.zooming
    }

    pub fn decide(
        &mut self,
        boundary: Option<&Boundary>,
        smoothed: f32,
        zone: &TargetZone,
    ) -> MotionCommand {
        match self.evaluate(boundary, smoothed, zone) {
            Decision::Zoom(direction) => {
                self.zooming = true;
                MotionCommand::new(direction, self.speed)
            }
            Decision::Move(direction, speed) => {
                self.speed = speed;
                MotionCommand::new(direction, speed)
            }
            Decision::Stop if self.zooming => {
                self.zooming = false;
                self.speed = self.speeds.min;
                MotionCommand::new(Direction::ZoomStop, self.speed)
            }
            Decision::Stop => {
                self.speed = self.speeds.min;
                MotionCommand::stop(self.speed)
            }
        }
    }

    fn evaluate(&self, boundary: Option<&Boundary>, smoothed: f32, zone: &TargetZone) -> Decision {
        let Some(b) = boundary else {
            return Decision::Stop;
        };

        let h = b.horizontal_center();
        let v = b.vertical_center();

        if h < zone.left_edge {
            Decision::Move(
                Direction::PanLeft,
                self.speeds.linear(0.0, zone.left_edge - h, zone.left_edge),
            )
        } else if h > zone.right_edge {
            Decision::Move(
                Direction::PanRight,
                self.speeds.linear(0.0, h - zone.right_edge, zone.left_edge),
            )
        } else if v < zone.lower_tilt_edge {
            Decision::Move(
                Direction::TiltDown,
                self.speeds.tilt(0.0, zone.lower_tilt_edge - v, zone.lower_tilt_edge),
            )
        } else if v > zone.upper_tilt_edge {
            Decision::Move(
                Direction::TiltUp,
                self.speeds.tilt(0.0, v - zone.upper_tilt_edge, zone.lower_tilt_edge),
            )
        } else if smoothed >= zone.zoom_out_threshold {
            Decision::Zoom(Direction::ZoomOut)
        } else if smoothed <= zone.zoom_in_threshold {
            Decision::Zoom(Direction::ZoomIn)
        } else {
            Decision::Stop
        }
    }
}
