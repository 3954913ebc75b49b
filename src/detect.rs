// 该文件是 Huoyan （火眼） 项目的一部分。
// src/detect.rs - 检测结果与后处理
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

/// 单个检测框，坐标归一化到模型的正方形输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub confidence: f32,
  pub class_id: u32,
}

impl Detection {
  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  /// 退化框（宽或高不为正）面积为 0
  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  pub fn bbox(&self) -> [f32; 4] {
    [self.x1, self.y1, self.x2, self.y2]
  }
}

/// 一帧的最终检测结果，按置信度降序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

mod decode;
mod iou;
mod nms;

pub use self::decode::{DecodeError, OutputLayout, TensorView, decode};
pub use self::iou::iou;
pub use self::nms::suppress;
