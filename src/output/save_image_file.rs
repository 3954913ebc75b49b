// 该文件是 Huoyan （火眼） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detect::DetectResult,
  frame::Frame,
  output::{Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("字体文件无效: {0}")]
  InvalidFont(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 将检测框绘制到源帧上并保存为图像文件
///
/// `image:///out.png?font=/path/font.ttf`，指定字体时在框上方标注置信度。
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut draw = Draw::default();
    if let Some((_, font_path)) = uri.query_pairs().find(|(key, _)| key == "font") {
      draw = draw.with_font(load_font(Path::new(font_path.as_ref()))?);
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(uri.path()),
      draw,
    })
  }
}

fn load_font(path: &Path) -> Result<FontVec, SaveImageFileError> {
  let data = std::fs::read(path)?;
  let font = FontVec::try_from_vec(data)
    .map_err(|e| SaveImageFileError::InvalidFont(format!("{}: {}", path.display(), e)))?;
  info!("加载标签字体: {}", path.display());
  Ok(font)
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      draw: Draw::default(),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    if !frame.is_ready() {
      warn!("帧尚未就绪，跳过保存");
      return Ok(());
    }

    let image = self.draw.draw_detections(frame, result);
    self.save_image(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{detect::Detection, frame::PixelFormat};

  #[test]
  fn saves_frame_with_boxes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), path.as_path());

    let frame = Frame::new(vec![0; 40 * 20 * 4], 40, 20, PixelFormat::Rgba32).unwrap();
    let result = DetectResult::from(vec![Detection {
      x1: 0.25,
      y1: 0.25,
      x2: 0.75,
      y2: 0.75,
      confidence: 0.8,
      class_id: 0,
    }]);
    output.render_result(&frame, &result).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (40, 20));
    assert_eq!(saved.get_pixel(10, 5).0, [0, 255, 0]);
    assert_eq!(saved.get_pixel(0, 0).0, [0, 0, 0]);
  }

  #[test]
  fn not_ready_frame_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");
    let output = SaveImageFileOutput::new(&path);

    output
      .render_result(&Frame::empty(PixelFormat::Rgb24), &DetectResult::default())
      .unwrap();
    assert!(!path.exists());
  }

  #[test]
  fn invalid_font_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let font = dir.path().join("font.ttf");
    std::fs::write(&font, b"not a font").unwrap();

    let url = Url::parse(&format!("image:///tmp/out.png?font={}", font.display())).unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::InvalidFont(_))
    ));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("log:").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
