use anyhow::Result;
use opencv::{
    core::{Mat, Point, Scalar},
    imgproc,
    prelude::*,
};

use crate::pose::{KeypointIndex, Person};
use crate::tracker::{FrameReport, DEFAULT_CONFIDENCE};

/// 骨格の接続定義 (開始キーポイント, 終了キーポイント)
pub const SKELETON_CONNECTIONS: [(KeypointIndex, KeypointIndex); 16] = [
    // 顔
    (KeypointIndex::LeftEar, KeypointIndex::LeftEye),
    (KeypointIndex::LeftEye, KeypointIndex::Nose),
    (KeypointIndex::Nose, KeypointIndex::RightEye),
    (KeypointIndex::RightEye, KeypointIndex::RightEar),
    // 上半身
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist),
    // 胴体
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    // 下半身
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
];

// 色はBGR
fn skeleton_color() -> Scalar { Scalar::new(255.0, 128.0, 0.0, 0.0) }
fn keypoint_color() -> Scalar { Scalar::new(0.0, 0.0, 255.0, 0.0) }
fn region_color() -> Scalar { Scalar::new(0.0, 255.0, 255.0, 0.0) }
fn boundary_color() -> Scalar { Scalar::new(0.0, 200.0, 0.0, 0.0) }
fn center_color() -> Scalar { Scalar::new(255.0, 255.0, 0.0, 0.0) }
fn pan_zone_color() -> Scalar { Scalar::new(255.0, 0.0, 0.0, 0.0) }
fn tilt_zone_color() -> Scalar { Scalar::new(0.0, 255.0, 0.0, 0.0) }

/// 平滑化した高さを描くバーのx座標
const HEIGHT_BAR_X: i32 = 20;

fn point(x: f32, y: f32) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

/// 骨格と追跡状態をフレームに重ねる
///
/// 人物ごとの矩形（黄）、全体の矩形（緑）とその中心、目標領域（左右端とチルト帯）、
/// 左端に平滑化した高さのバー。
pub fn annotate(frame: &mut Mat, persons: &[Person], report: &FrameReport) -> Result<()> {
    let width = frame.cols();
    let height = frame.rows();

    for person in persons {
        draw_skeleton(frame, person)?;
    }

    for region in &report.regions {
        imgproc::rectangle_points(
            frame,
            point(region.x, region.y),
            point(region.right(), region.bottom()),
            region_color(),
            2,
            imgproc::LINE_8,
            0,
        )?;
    }

    let zone = &report.zone;
    imgproc::rectangle_points(
        frame,
        point(zone.left_edge, 0.0),
        point(zone.right_edge, height as f32),
        pan_zone_color(),
        2,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::rectangle_points(
        frame,
        point(0.0, zone.lower_tilt_edge),
        point(width as f32, zone.upper_tilt_edge),
        tilt_zone_color(),
        2,
        imgproc::LINE_8,
        0,
    )?;

    if let Some(b) = &report.boundary {
        imgproc::rectangle_points(
            frame,
            point(b.left, b.bottom),
            point(b.right, b.top),
            boundary_color(),
            2,
            imgproc::LINE_8,
            0,
        )?;
        imgproc::circle(
            frame,
            point(b.horizontal_center(), b.vertical_center()),
            6,
            center_color(),
            -1,
            imgproc::LINE_8,
            0,
        )?;
    }

    // 高さのバーは画面の縦中央に置く
    let bar = report.smoothed.clamp(0.0, height as f32);
    let bar_top = (height as f32 - bar) / 2.0;
    imgproc::line(
        frame,
        point(HEIGHT_BAR_X as f32, bar_top),
        point(HEIGHT_BAR_X as f32, bar_top + bar),
        center_color(),
        4,
        imgproc::LINE_8,
        0,
    )?;

    Ok(())
}

fn draw_skeleton(frame: &mut Mat, person: &Person) -> Result<()> {
    for (start, end) in SKELETON_CONNECTIONS.iter() {
        let (Some(a), Some(b)) = (person.get(*start), person.get(*end)) else {
            continue;
        };
        if a.is_valid(DEFAULT_CONFIDENCE) && b.is_valid(DEFAULT_CONFIDENCE) {
            imgproc::line(
                frame,
                point(a.x, a.y),
                point(b.x, b.y),
                skeleton_color(),
                2,
                imgproc::LINE_8,
                0,
            )?;
        }
    }

    for kp in person.valid_keypoints(DEFAULT_CONFIDENCE) {
        imgproc::circle(frame, point(kp.x, kp.y), 4, keypoint_color(), -1, imgproc::LINE_8, 0)?;
    }
    Ok(())
}
