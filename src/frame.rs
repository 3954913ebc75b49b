// 该文件是 Huoyan （火眼） 项目的一部分。
// src/frame.rs - 帧与张量定义
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

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("帧尺寸溢出: {width}x{height}")]
  DimensionOverflow { width: u32, height: u32 },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
  #[error("张量形状 {shape:?} 需要 {expected} 个元素, 实际为 {actual}")]
  ShapeMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
  #[error("张量形状 {shape:?} 的元素数溢出")]
  ShapeOverflow { shape: Vec<usize> },
}

/// 交错排列的像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Rgb24,
  Rgba32,
}

impl PixelFormat {
  pub fn channels(&self) -> usize {
    match self {
      PixelFormat::Rgb24 => 3,
      PixelFormat::Rgba32 => 4,
    }
  }
}

/// 源视频帧，交错排列，尺寸任意
///
/// 宽或高为 0 的帧表示视频源尚未就绪。
#[derive(Debug, Clone)]
pub struct Frame {
  data: Box<[u8]>,
  width: u32,
  height: u32,
  format: PixelFormat,
}

impl Frame {
  pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self, FrameError> {
    let expected = (width as usize)
      .checked_mul(height as usize)
      .and_then(|v| v.checked_mul(format.channels()))
      .ok_or(FrameError::DimensionOverflow { width, height })?;

    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      width,
      height,
      format,
    })
  }

  /// 尚未就绪的空帧
  pub fn empty(format: PixelFormat) -> Self {
    Self {
      data: Box::default(),
      width: 0,
      height: 0,
      format,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn channels(&self) -> usize {
    self.format.channels()
  }

  pub fn is_ready(&self) -> bool {
    self.width > 0 && self.height > 0
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }
}

/// 归一化后的平面 RGB 张量，长度为 3 × S × S，取值位于 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
  data: Box<[f32]>,
  size: u32,
}

impl NormalizedTensor {
  pub(crate) fn from_planar(data: Vec<f32>, size: u32) -> Self {
    debug_assert_eq!(data.len(), RGB_CHANNELS * size as usize * size as usize);
    Self {
      data: data.into_boxed_slice(),
      size,
    }
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  /// NCHW 形状 [1, 3, S, S]
  pub fn shape(&self) -> [usize; 4] {
    let size = self.size as usize;
    [1, RGB_CHANNELS, size, size]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  /// 取出第 `channel` 个平面
  pub fn plane(&self, channel: usize) -> &[f32] {
    let plane = self.size as usize * self.size as usize;
    &self.data[channel * plane..(channel + 1) * plane]
  }

  pub fn into_inner(self) -> Box<[f32]> {
    self.data
  }
}

/// 推理引擎返回的原始输出，布局需在解码时根据形状推断
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutputTensor {
  data: Box<[f32]>,
  shape: Box<[usize]>,
}

impl RawOutputTensor {
  pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, TensorError> {
    let Some(expected) = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)) else {
      return Err(TensorError::ShapeOverflow { shape });
    };
    if expected != data.len() {
      return Err(TensorError::ShapeMismatch {
        shape,
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      shape: shape.into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }
}
