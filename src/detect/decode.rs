// 该文件是 Huoyan （火眼） 项目的一部分。
// src/detect/decode.rs - 模型输出解码
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

use thiserror::Error;
use tracing::debug;

use super::Detection;
use crate::{config::DetectConfig, frame::RawOutputTensor};

const MIN_CHANNELS: usize = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
  #[error("不支持的输出布局: 形状 {shape:?}")]
  UnsupportedLayout { shape: Vec<usize> },
}

/// 原始输出张量的只读视图
///
/// 形状为 `[1, d1, d2]`，较小的维度是通道，较大的是锚点；
/// 锚点数不足 5 时按通道优先的 `[1, C, N]` 解释。
/// 所有读取都经过 [`TensorView::idx`]，布局差异只在这里处理。
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
  data: &'a [f32],
  channels: usize,
  anchors: usize,
  channels_first: bool,
}

impl<'a> TensorView<'a> {
  pub fn from_raw(raw: &'a RawOutputTensor) -> Result<Self, DecodeError> {
    let unsupported = || DecodeError::UnsupportedLayout {
      shape: raw.shape().to_vec(),
    };

    let &[batch, d1, d2] = raw.shape() else {
      return Err(unsupported());
    };

    if batch != 1 {
      return Err(unsupported());
    }

    let (channels, anchors, channels_first) = if d1.min(d2) >= MIN_CHANNELS {
      (d1.min(d2), d1.max(d2), d1 < d2)
    } else if d1 >= MIN_CHANNELS {
      // 锚点数少于最小通道数，只能按 [1, C, N] 解释
      (d1, d2, true)
    } else {
      return Err(unsupported());
    };

    Ok(Self {
      data: raw.data(),
      channels,
      anchors,
      channels_first,
    })
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn anchors(&self) -> usize {
    self.anchors
  }

  pub fn channels_first(&self) -> bool {
    self.channels_first
  }

  /// (anchor, channel) 对应的扁平偏移
  pub fn idx(&self, anchor: usize, channel: usize) -> usize {
    if self.channels_first {
      channel * self.anchors + anchor
    } else {
      anchor * self.channels + channel
    }
  }

  pub fn get(&self, anchor: usize, channel: usize) -> f32 {
    self.data[self.idx(anchor, channel)]
  }
}

/// 由通道数决定的输出语义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// 端到端导出：(x1, y1, x2, y2, score)，像素单位
  BoxesOnly,
  /// (cx, cy, w, h, obj, cls)
  ObjClass,
  /// (cx, cy, w, h, obj, cls_0 .. cls_{n-1})
  ObjMultiClass(usize),
}

type AnchorDecoder = fn(&TensorView<'_>, usize, f32) -> Detection;

impl OutputLayout {
  pub fn from_channels(channels: usize) -> Option<Self> {
    match channels {
      0..MIN_CHANNELS => None,
      5 => Some(OutputLayout::BoxesOnly),
      6 => Some(OutputLayout::ObjClass),
      n => Some(OutputLayout::ObjMultiClass(n - MIN_CHANNELS)),
    }
  }

  /// 张量携带的类别数，端到端导出视为单类
  pub fn class_count(&self) -> usize {
    match self {
      OutputLayout::BoxesOnly | OutputLayout::ObjClass => 1,
      OutputLayout::ObjMultiClass(n) => *n,
    }
  }

  fn anchor_decoder(&self) -> AnchorDecoder {
    match self {
      OutputLayout::BoxesOnly => decode_boxes_only,
      OutputLayout::ObjClass => decode_obj_class,
      OutputLayout::ObjMultiClass(_) => decode_obj_multi_class,
    }
  }
}

fn decode_boxes_only(view: &TensorView<'_>, anchor: usize, size: f32) -> Detection {
  Detection {
    x1: view.get(anchor, 0) / size,
    y1: view.get(anchor, 1) / size,
    x2: view.get(anchor, 2) / size,
    y2: view.get(anchor, 3) / size,
    confidence: view.get(anchor, 4),
    class_id: 0,
  }
}

fn decode_obj_class(view: &TensorView<'_>, anchor: usize, size: f32) -> Detection {
  let confidence = view.get(anchor, 4) * view.get(anchor, 5);
  center_to_corners(view, anchor, size, confidence, 0)
}

fn decode_obj_multi_class(view: &TensorView<'_>, anchor: usize, size: f32) -> Detection {
  let mut best_score = f32::NEG_INFINITY;
  let mut best_class = 0usize;
  for class in 0..view.channels() - MIN_CHANNELS {
    let score = view.get(anchor, MIN_CHANNELS + class);
    if score > best_score {
      best_score = score;
      best_class = class;
    }
  }

  let confidence = view.get(anchor, 4) * best_score;
  center_to_corners(view, anchor, size, confidence, best_class as u32)
}

fn center_to_corners(
  view: &TensorView<'_>,
  anchor: usize,
  size: f32,
  confidence: f32,
  class_id: u32,
) -> Detection {
  let cx = view.get(anchor, 0);
  let cy = view.get(anchor, 1);
  let half_w = view.get(anchor, 2) / 2.0;
  let half_h = view.get(anchor, 3) / 2.0;

  Detection {
    x1: (cx - half_w) / size,
    y1: (cy - half_h) / size,
    x2: (cx + half_w) / size,
    y2: (cy + half_h) / size,
    confidence,
    class_id,
  }
}

/// 将原始输出解码为候选框（NMS 之前），按锚点顺序输出
///
/// 置信度低于阈值（或为 NaN）的锚点直接丢弃。坐标各自独立截断到 [0, 1]，
/// 异常输出可能得到 `x1 > x2` 的退化框，由 IoU 计算容忍。
pub fn decode(raw: &RawOutputTensor, config: &DetectConfig) -> Result<Vec<Detection>, DecodeError> {
  let view = TensorView::from_raw(raw)?;
  let layout = OutputLayout::from_channels(view.channels()).ok_or_else(|| {
    DecodeError::UnsupportedLayout {
      shape: raw.shape().to_vec(),
    }
  })?;

  debug!(
    "输出布局: {:?}, 通道数 {}, 锚点数 {}, 通道优先 {}",
    layout,
    view.channels(),
    view.anchors(),
    view.channels_first()
  );

  if layout.class_count() != config.class_count as usize {
    debug!(
      "输出类别数 {} 与配置类别数 {} 不一致",
      layout.class_count(),
      config.class_count
    );
  }

  let size = config.input_size as f32;
  let threshold = config.confidence_threshold;
  let decode_anchor = layout.anchor_decoder();

  let candidates: Vec<Detection> = (0..view.anchors())
    .map(|anchor| decode_anchor(&view, anchor, size))
    .filter(|det| det.confidence >= threshold)
    .map(|det| Detection {
      x1: det.x1.max(0.0),
      y1: det.y1.max(0.0),
      x2: det.x2.min(1.0),
      y2: det.y2.min(1.0),
      ..det
    })
    .collect();

  debug!("候选框数量: {}", candidates.len());
  Ok(candidates)
}
