// 该文件是 Huoyan （火眼） 项目的一部分。
// src/normalize.rs - 帧归一化
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

use std::borrow::Cow;

use image::{ImageBuffer, Pixel, Rgb, Rgba, imageops::FilterType};
use tracing::debug;

use crate::frame::{Frame, NormalizedTensor, PixelFormat};

const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// 将源帧拉伸到 S×S（不保持宽高比），并转换为平面 RGB 浮点张量
///
/// 帧尚未就绪时返回 `None`。
pub fn normalize(frame: &Frame, size: u32) -> Option<NormalizedTensor> {
  if !frame.is_ready() || size == 0 {
    return None;
  }

  let resized = match frame.format() {
    PixelFormat::Rgb24 => resize::<Rgb<u8>>(frame, size),
    PixelFormat::Rgba32 => resize::<Rgba<u8>>(frame, size),
  }?;

  Some(to_planar(&resized, frame.channels(), size))
}

fn resize<P>(frame: &Frame, size: u32) -> Option<Cow<'_, [u8]>>
where
  P: Pixel<Subpixel = u8> + 'static,
{
  if frame.width() == size && frame.height() == size {
    return Some(Cow::Borrowed(frame.as_bytes()));
  }

  debug!(
    "缩放帧 {}x{} -> {}x{}",
    frame.width(),
    frame.height(),
    size,
    size
  );

  // Frame::new 已校验长度
  let view = ImageBuffer::<P, &[u8]>::from_raw(frame.width(), frame.height(), frame.as_bytes())?;

  Some(Cow::Owned(
    image::imageops::resize(&view, size, size, RESIZE_FILTER).into_raw(),
  ))
}

fn to_planar(pixels: &[u8], channels: usize, size: u32) -> NormalizedTensor {
  let plane = size as usize * size as usize;
  let mut data = vec![0f32; 3 * plane];

  let (r, rest) = data.split_at_mut(plane);
  let (g, b) = rest.split_at_mut(plane);

  for (i, pixel) in pixels.chunks_exact(channels).take(plane).enumerate() {
    r[i] = pixel[0] as f32 / 255.0;
    g[i] = pixel[1] as f32 / 255.0;
    b[i] = pixel[2] as f32 / 255.0;
  }

  NormalizedTensor::from_planar(data, size)
}
