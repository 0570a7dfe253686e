/// チルトの不感帯を決める比率（フレーム高さに対する下端）
const TILT_EDGE_FRACTION: f32 = 0.45;
const ZOOM_OUT_FRACTION: f32 = 0.75;
const ZOOM_IN_FRACTION: f32 = 0.55;

/// パン・チルトを発行しない目標領域と、ズームの閾値
///
/// フレームサイズから毎フレーム計算し直す。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetZone {
    pub left_edge: f32,
    pub right_edge: f32,
    pub lower_tilt_edge: f32,
    pub upper_tilt_edge: f32,
    pub zoom_out_threshold: f32,
    pub zoom_in_threshold: f32,
}

impl TargetZone {
    pub fn compute(width: u32, height: u32, boundary_fraction: f32) -> Self {
        let width = width as f32;
        let height = height as f32;
        let left_edge = width * boundary_fraction;
        let lower_tilt_edge = height * TILT_EDGE_FRACTION;

        Self {
            left_edge,
            right_edge: width - left_edge,
            lower_tilt_edge,
            upper_tilt_edge: height - lower_tilt_edge,
            zoom_out_threshold: ZOOM_OUT_FRACTION * height,
            zoom_in_threshold: ZOOM_IN_FRACTION * height,
        }
    }
}
