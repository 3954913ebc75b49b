// 该文件是 Huoyan （火眼） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, detect::DetectResult, frame::Frame};

pub trait Render {
  type Error;
  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error>;
}

impl<R: Render + ?Sized> Render for &R {
  type Error = R::Error;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    (**self).render_result(frame, result)
  }
}

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

mod log_output;
pub use self::log_output::{LogOutput, LogOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  LogOutput(LogOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      LogOutput::SCHEME => {
        let output = LogOutput::from_url(url)?;
        Ok(OutputWrapper::LogOutput(output))
      }
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::LogOutput(output) => output.render_result(frame, result).map_err(|e| match e {}),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dispatches_on_scheme() {
    let url = Url::parse("log:").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::LogOutput(_))
    ));

    let url = Url::parse("rtsp://0.0.0.0:8554/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(scheme)) if scheme == "rtsp"
    ));
  }

  #[cfg(feature = "save_image_file")]
  #[test]
  fn image_scheme_selects_file_output() {
    let url = Url::parse("image:///tmp/huoyan/out.png").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::SaveImageFileOutput(_))
    ));
  }
}
