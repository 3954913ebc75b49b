// 该文件是 Huoyan （火眼） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use crate::{FromUrl, frame::Frame};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "v4l_input")]
mod v4l_input;
#[cfg(feature = "v4l_input")]
pub use self::v4l_input::{V4lInput, V4lInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "v4l_input")]
  #[error("V4L 输入错误: {0}")]
  V4lInputError(#[from] V4lInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "v4l_input")]
  V4l(V4lInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "v4l_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4lInput::SCHEME {
        let input = V4lInput::from_url(url)?;
        return Ok(InputWrapper::V4l(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l(input) => input.next(),
    }
  }
}
