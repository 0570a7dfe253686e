use crate::pose::Person;

/// 追跡用のキーポイント信頼度閾値
pub const TRACKING_CONFIDENCE: f32 = 0.1;
/// 追跡以外（描画など）で使う既定の閾値
pub const DEFAULT_CONFIDENCE: f32 = 0.2;

/// 1人分の外接矩形（ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// 閾値を超えるキーポイントのmin/maxから外接矩形を求める
    ///
    /// 有効なキーポイントが1つもなければNone（この人物はこのフレームでは寄与しない）。
    pub fn from_person(person: &Person, confidence_threshold: f32) -> Option<Self> {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        let mut count = 0u32;

        for kp in person.valid_keypoints(confidence_threshold) {
            min_x = min_x.min(kp.x);
            min_y = min_y.min(kp.y);
            max_x = max_x.max(kp.x);
            max_y = max_y.max(kp.y);
            count += 1;
        }

        if count == 0 {
            return None;
        }

        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// フレーム内の全人物の矩形（有効キーポイントのない人物は除外）
pub fn extract_regions(persons: &[Person], confidence_threshold: f32) -> Vec<Region> {
    persons
        .iter()
        .filter_map(|p| Region::from_person(p, confidence_threshold))
        .collect()
}
