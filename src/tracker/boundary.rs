use super::region::Region;

/// フレーム内の全人物を囲む矩形
///
/// 画像座標（上が小さい）なので通常 top <= bottom。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Boundary {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    /// 全矩形の和。矩形が無ければNone（＝追跡対象なし）
    pub fn from_regions(regions: &[Region]) -> Option<Self> {
        let (first, rest) = regions.split_first()?;
        let seed = Self::new(first.x, first.y, first.right(), first.bottom());

        Some(rest.iter().fold(seed, |b, r| Self {
            left: b.left.min(r.x),
            top: b.top.min(r.y),
            right: b.right.max(r.right()),
            bottom: b.bottom.max(r.bottom()),
        }))
    }

    pub fn horizontal_center(&self) -> f32 {
        (self.right - self.left) / 2.0 + self.left
    }

    pub fn vertical_center(&self) -> f32 {
        (self.top - self.bottom) / 2.0 + self.bottom
    }

    /// top - bottom（画像座標では負の値）
    pub fn vertical_extent(&self) -> f32 {
        self.top - self.bottom
    }
}
