// 该文件是 Huoyan （火眼） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::{
  detect::{DetectResult, Detection},
  frame::{Frame, PixelFormat},
};

const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_PADDING: u32 = 2;
const BOX_THICKNESS: u32 = 2;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const TEXT_COLOR: [u8; 3] = [0, 0, 0];

pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  box_color: [u8; 3],
  text_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      box_color: BOX_COLOR,
      text_color: TEXT_COLOR,
    }
  }
}

impl Draw {
  /// 设置标签字体；未设置字体时只绘制边框
  pub fn with_font(mut self, font: FontVec) -> Self {
    self.font = Some(font);
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 以源帧分辨率绘制所有检测框
  pub fn draw_detections(&self, frame: &Frame, result: &DetectResult) -> RgbImage {
    let mut image = to_rgb_image(frame);
    for det in result.iter() {
      self.draw_bbox_with_label(&mut image, det);
    }
    image
  }

  // 归一化坐标乘以图像宽高得到像素坐标
  fn draw_bbox_with_label(&self, image: &mut RgbImage, det: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = ((det.x1 * w as f32).floor() as i32).clamp(0, w - 1);
    let y_min = ((det.y1 * h as f32).floor() as i32).clamp(0, h - 1);
    let x_max = ((det.x2 * w as f32).ceil() as i32).clamp(0, w - 1);
    let y_max = ((det.y2 * h as f32).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = Rgb(self.box_color);
    for t in 0..BOX_THICKNESS as i32 {
      let width = x_max - x_min - 2 * t + 1;
      let height = y_max - y_min - 2 * t + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = self.font.as_ref() else {
      return;
    };

    let label = confidence_label(det.confidence);
    let scale = PxScale::from(self.font_size);
    let (text_w, text_h) = text_size(scale, font, &label);
    let label_w = text_w + 2 * LABEL_PADDING;
    let label_h = text_h + 2 * LABEL_PADDING;

    // 标签放在框的上方，空间不足时放在框内
    let label_y = if y_min >= label_h as i32 {
      y_min - label_h as i32
    } else {
      y_min
    };

    draw_filled_rect_mut(
      image,
      Rect::at(x_min, label_y).of_size(label_w, label_h),
      color,
    );
    draw_text_mut(
      image,
      Rgb(self.text_color),
      x_min + LABEL_PADDING as i32,
      label_y + LABEL_PADDING as i32,
      scale,
      font,
      &label,
    );
  }
}

/// 置信度标签，四舍五入到整数百分比
fn confidence_label(confidence: f32) -> String {
  format!("{:.0}%", (confidence * 100.0).round())
}

pub fn to_rgb_image(frame: &Frame) -> RgbImage {
  let (width, height) = (frame.width(), frame.height());
  let data = frame.as_bytes().to_vec();
  let image = match frame.format() {
    PixelFormat::Rgb24 => RgbImage::from_raw(width, height, data),
    PixelFormat::Rgba32 => {
      RgbaImage::from_raw(width, height, data).map(|rgba| DynamicImage::ImageRgba8(rgba).to_rgb8())
    }
  };
  // Frame 构造时已校验长度
  image.unwrap_or_else(|| RgbImage::new(width, height))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
    Detection {
      x1,
      y1,
      x2,
      y2,
      confidence: 0.9,
      class_id: 0,
    }
  }

  #[test]
  fn rgba_frame_drops_alpha() {
    let frame = Frame::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 2, 1, PixelFormat::Rgba32).unwrap();
    let image = to_rgb_image(&frame);
    assert_eq!(image.into_raw(), vec![1, 2, 3, 5, 6, 7]);
  }

  #[test]
  fn box_is_drawn_at_source_resolution() {
    let frame = Frame::new(vec![0; 100 * 48 * 3], 100, 48, PixelFormat::Rgb24).unwrap();
    let result = DetectResult::from(vec![det(0.25, 0.25, 0.75, 0.75)]);

    let image = Draw::default().draw_detections(&frame, &result);
    assert_eq!(image.dimensions(), (100, 48));

    let green = Rgb(BOX_COLOR);
    // 外边框和第二层边框
    assert_eq!(*image.get_pixel(25, 12), green);
    assert_eq!(*image.get_pixel(26, 13), green);
    assert_eq!(*image.get_pixel(75, 36), green);
    assert_eq!(*image.get_pixel(50, 12), green);
    // 框内部不变
    assert_eq!(*image.get_pixel(50, 24), Rgb([0, 0, 0]));
    // 框外不变
    assert_eq!(*image.get_pixel(5, 5), Rgb([0, 0, 0]));
  }

  #[test]
  fn label_rounds_half_up() {
    assert_eq!(confidence_label(0.125), "13%");
    assert_eq!(confidence_label(0.375), "38%");
    assert_eq!(confidence_label(0.9), "90%");
    assert_eq!(confidence_label(1.0), "100%");
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let frame = Frame::new(vec![0; 10 * 10 * 3], 10, 10, PixelFormat::Rgb24).unwrap();
    let result = DetectResult::from(vec![det(0.5, 0.5, 0.5, 0.9)]);

    let image = Draw::default().draw_detections(&frame, &result);
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }
}
