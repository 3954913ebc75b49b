// 该文件是 Huoyan （火眼） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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
use image::ImageFormat;
use tracing::{error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, PixelFormat},
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const BUFFER_COUNT: u32 = 4;
const PREFERRED_FORMATS: [&[u8; 4]; 3] = [b"YUYV", b"MJPG", b"RGB3"];

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无法打开设备 {path}: {source}")]
  OpenDevice {
    path: String,
    source: std::io::Error,
  },
  #[error("V4L 错误: {0}")]
  V4lError(#[from] std::io::Error),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("无效的查询参数 {key}={value}")]
  InvalidParameter { key: String, value: String },
}

/// 设备协商得到的采集格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureFormat {
  Yuyv,
  Mjpeg,
  Rgb24,
}

impl CaptureFormat {
  fn from_fourcc(fourcc: FourCC) -> Option<Self> {
    match &fourcc.repr {
      b"YUYV" => Some(Self::Yuyv),
      b"MJPG" => Some(Self::Mjpeg),
      b"RGB3" => Some(Self::Rgb24),
      _ => None,
    }
  }

  /// 把一个采集缓冲区转换为帧，数据不完整时返回 `None`
  fn to_frame(self, buffer: &[u8], width: u32, height: u32) -> Option<Frame> {
    match self {
      Self::Yuyv => {
        let rgba = yuyv_to_rgba(buffer, width, height)?;
        Frame::new(rgba, width, height, PixelFormat::Rgba32).ok()
      }
      Self::Mjpeg => {
        // 以 JPEG 实际尺寸为准
        let rgba = image::load_from_memory_with_format(buffer, ImageFormat::Jpeg)
          .ok()?
          .to_rgba8();
        let (width, height) = rgba.dimensions();
        Frame::new(rgba.into_raw(), width, height, PixelFormat::Rgba32).ok()
      }
      Self::Rgb24 => {
        let needed = (width as usize)
          .checked_mul(height as usize)?
          .checked_mul(3)?;
        let data = buffer.get(..needed)?.to_vec();
        Frame::new(data, width, height, PixelFormat::Rgb24).ok()
      }
    }
  }
}

/// 摄像头输入，优先 YUYV，其次 MJPG 与 RGB3，每次 `next()` 取出一帧
pub struct V4lInput {
  stream: Stream<'static>,
  capture: CaptureFormat,
  width: u32,
  height: u32,
  // 流依赖设备句柄，需保证设备在流之后释放
  _device: Device,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemeMismatch);
    }

    // v4l:///dev/video0?width=640&height=480
    let device_path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };

    let mut width = DEFAULT_WIDTH;
    let mut height = DEFAULT_HEIGHT;
    for (key, value) in url.query_pairs() {
      let target = match key.as_ref() {
        "width" => &mut width,
        "height" => &mut height,
        _ => continue,
      };
      *target = value
        .parse()
        .map_err(|_| V4lInputError::InvalidParameter {
          key: key.to_string(),
          value: value.to_string(),
        })?;
    }

    Self::open(&device_path, width, height)
  }
}

impl V4lInput {
  pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, V4lInputError> {
    let device = Device::with_path(device_path).map_err(|source| V4lInputError::OpenDevice {
      path: device_path.to_string(),
      source,
    })?;

    let mut negotiated = None;
    for fourcc in PREFERRED_FORMATS {
      let mut format = device.format()?;
      format.width = width;
      format.height = height;
      format.fourcc = FourCC::new(fourcc);
      let format = device.set_format(&format)?;
      match CaptureFormat::from_fourcc(format.fourcc) {
        Some(capture) => {
          negotiated = Some((capture, format));
          break;
        }
        None => warn!("设备未接受 {}，实际为 {}", FourCC::new(fourcc), format.fourcc),
      }
    }
    let Some((capture, format)) = negotiated else {
      let current = device.format()?;
      return Err(V4lInputError::UnsupportedPixelFormat(
        current.fourcc.to_string(),
      ));
    };

    let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;
    info!(
      "打开摄像头 {}: {}x{} {}",
      device_path, format.width, format.height, format.fourcc
    );

    Ok(Self {
      stream,
      capture,
      width: format.width,
      height: format.height,
      _device: device,
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }
}

impl Iterator for V4lInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let (buffer, _meta) = match self.stream.next() {
      Ok(captured) => captured,
      Err(e) => {
        error!("无法捕获帧: {}", e);
        return None;
      }
    };

    let frame = self.capture.to_frame(buffer, self.width, self.height);
    if frame.is_none() {
      error!(
        "无法转换帧: {} 字节, 期望 {}x{} {:?}",
        buffer.len(),
        self.width,
        self.height,
        self.capture
      );
    }
    frame
  }
}

/// YUYV (YUV 4:2:2) 转 RGBA，BT.601 系数
///
/// 每 4 字节 `[Y0, U, Y1, V]` 对应两个像素。缓冲区不足一帧时返回 `None`。
fn yuyv_to_rgba(yuyv: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
  let pixels = (width as usize).checked_mul(height as usize)?;
  let needed = pixels.checked_mul(2)?;
  if yuyv.len() < needed || pixels % 2 != 0 {
    return None;
  }

  let mut rgba = Vec::with_capacity(pixels * 4);
  for chunk in yuyv[..needed].chunks_exact(4) {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;

    for y in [chunk[0], chunk[2]] {
      let y = y as f32;
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgba.extend_from_slice(&[r, g, b, u8::MAX]);
    }
  }

  Some(rgba)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn neutral_chroma_is_grey() {
    let yuyv = [100, 128, 200, 128];
    let rgba = yuyv_to_rgba(&yuyv, 2, 1).unwrap();
    assert_eq!(rgba, vec![100, 100, 100, 255, 200, 200, 200, 255]);
  }

  #[test]
  fn channels_are_clamped() {
    let yuyv = [255, 255, 255, 255];
    let rgba = yuyv_to_rgba(&yuyv, 2, 1).unwrap();
    assert_eq!(rgba[0], 255);
    assert_eq!(rgba[2], 255);
    assert_eq!(rgba[3], 255);
  }

  #[test]
  fn short_buffer_is_rejected() {
    assert!(yuyv_to_rgba(&[0; 6], 2, 2).is_none());
  }

  #[test]
  fn fallback_formats_are_recognized() {
    assert_eq!(
      CaptureFormat::from_fourcc(FourCC::new(b"YUYV")),
      Some(CaptureFormat::Yuyv)
    );
    assert_eq!(
      CaptureFormat::from_fourcc(FourCC::new(b"MJPG")),
      Some(CaptureFormat::Mjpeg)
    );
    assert_eq!(
      CaptureFormat::from_fourcc(FourCC::new(b"RGB3")),
      Some(CaptureFormat::Rgb24)
    );
    assert_eq!(CaptureFormat::from_fourcc(FourCC::new(b"NV12")), None);
  }

  #[test]
  fn rgb24_buffer_becomes_rgb_frame() {
    let mut buffer: Vec<u8> = (0..12).collect();
    // 驱动缓冲区可能带有尾部填充
    buffer.extend_from_slice(&[0; 4]);

    let frame = CaptureFormat::Rgb24.to_frame(&buffer, 2, 2).unwrap();
    assert_eq!(frame.format(), PixelFormat::Rgb24);
    assert_eq!(frame.as_bytes(), &buffer[..12]);
    assert!(CaptureFormat::Rgb24.to_frame(&buffer[..11], 2, 2).is_none());
  }

  #[test]
  fn mjpeg_buffer_is_decoded() {
    let image = image::RgbImage::from_pixel(8, 6, image::Rgb([200, 40, 40]));
    let mut jpeg = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
      .write_to(&mut jpeg, ImageFormat::Jpeg)
      .unwrap();

    let frame = CaptureFormat::Mjpeg
      .to_frame(jpeg.get_ref(), 640, 480)
      .unwrap();
    assert_eq!((frame.width(), frame.height()), (8, 6));
    assert_eq!(frame.format(), PixelFormat::Rgba32);
    assert!(CaptureFormat::Mjpeg.to_frame(&[0xFF, 0xD8, 0x00], 8, 6).is_none());
  }
}
