use anyhow::Result;
use minifb::{Key, Window, WindowOptions};
use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;

/// 注釈付きフレームのプレビュー（minifb）
pub struct PreviewWindow {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl PreviewWindow {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;
        // 描画待ちで制御ループを止めない
        window.set_target_fps(0);

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
        })
    }

    /// 閉じられたかEscが押されたらfalse
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// BGR Mat を表示する。ウィンドウより大きい部分は切り捨てる
    pub fn show(&mut self, frame: &Mat) -> Result<()> {
        let rows = self.height.min(frame.rows().max(0) as usize);
        let cols = self.width.min(frame.cols().max(0) as usize);

        for y in 0..rows {
            for x in 0..cols {
                let pixel = frame.at_2d::<Vec3b>(y as i32, x as i32)?;
                self.buffer[y * self.width + x] = bgr_to_rgb(pixel.0);
            }
        }

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }
}

fn bgr_to_rgb([b, g, r]: [u8; 3]) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}
