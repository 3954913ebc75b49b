// 该文件是 Huoyan （火眼） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameError, PixelFormat},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("帧构造错误: {0}")]
  FrameError(#[from] FrameError),
}

/// 单张图像输入，迭代一次后结束
pub struct ImageFileInput {
  frame: Option<Frame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    Self::open(url.path())
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgba8();
    let (width, height) = image.dimensions();
    info!("读取图像 {}: {}x{}", path.display(), width, height);

    let frame = Frame::new(image.into_raw(), width, height, PixelFormat::Rgba32)?;
    Ok(Self { frame: Some(frame) })
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}
