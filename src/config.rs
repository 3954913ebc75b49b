// 该文件是 Huoyan （火眼） 项目的一部分。
// src/config.rs - 检测配置
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

pub(crate) const DEFAULT_INPUT_SIZE: u32 = 320;
pub(crate) const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub(crate) const DEFAULT_IOU_THRESHOLD: f32 = 0.4;
pub(crate) const DEFAULT_MAX_DETECTIONS: usize = 100;
pub(crate) const DEFAULT_CLASS_COUNT: u32 = 1;

/// NMS 抑制范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuppressionMode {
  /// 不区分类别，任意两个框都可能互相抑制
  #[default]
  ClassAgnostic,
  /// 只在同一类别内部抑制
  PerClass,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("输入尺寸必须大于 0")]
  ZeroInputSize,
  #[error("置信度阈值必须位于 [0, 1]，实际为 {0}")]
  ConfidenceThreshold(f32),
  #[error("IOU 阈值必须位于 [0, 1]，实际为 {0}")]
  IouThreshold(f32),
  #[error("最大检测数必须大于 0")]
  ZeroMaxDetections,
  #[error("类别数必须大于 0")]
  ZeroClassCount,
}

/// 检测流水线配置，在流水线生命周期内只读
#[derive(Debug, Clone, PartialEq)]
pub struct DetectConfig {
  /// 模型输入边长 S，输入张量为 [1, 3, S, S]
  pub input_size: u32,
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub max_detections: usize,
  pub class_count: u32,
  pub suppression: SuppressionMode,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      input_size: DEFAULT_INPUT_SIZE,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_detections: DEFAULT_MAX_DETECTIONS,
      class_count: DEFAULT_CLASS_COUNT,
      suppression: SuppressionMode::default(),
    }
  }
}

impl DetectConfig {
  pub fn with_input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn with_max_detections(mut self, max_detections: usize) -> Self {
    self.max_detections = max_detections;
    self
  }

  pub fn with_class_count(mut self, class_count: u32) -> Self {
    self.class_count = class_count;
    self
  }

  pub fn with_suppression(mut self, suppression: SuppressionMode) -> Self {
    self.suppression = suppression;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.input_size == 0 {
      return Err(ConfigError::ZeroInputSize);
    }
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(ConfigError::ConfidenceThreshold(self.confidence_threshold));
    }
    if !(0.0..=1.0).contains(&self.iou_threshold) {
      return Err(ConfigError::IouThreshold(self.iou_threshold));
    }
    if self.max_detections == 0 {
      return Err(ConfigError::ZeroMaxDetections);
    }
    if self.class_count == 0 {
      return Err(ConfigError::ZeroClassCount);
    }
    Ok(())
  }

  pub fn validated(self) -> Result<Self, ConfigError> {
    self.validate()?;
    Ok(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    let config = DetectConfig::default();
    assert_eq!(config.input_size, 320);
    assert_eq!(config.max_detections, 100);
    assert_eq!(config.suppression, SuppressionMode::ClassAgnostic);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn rejects_out_of_range_values() {
    let base = DetectConfig::default();

    assert_eq!(
      base.clone().with_input_size(0).validate(),
      Err(ConfigError::ZeroInputSize)
    );
    assert_eq!(
      base.clone().with_confidence_threshold(1.5).validate(),
      Err(ConfigError::ConfidenceThreshold(1.5))
    );
    assert_eq!(
      base.clone().with_iou_threshold(-0.1).validate(),
      Err(ConfigError::IouThreshold(-0.1))
    );
    assert_eq!(
      base.clone().with_max_detections(0).validate(),
      Err(ConfigError::ZeroMaxDetections)
    );
    assert_eq!(
      base.with_class_count(0).validate(),
      Err(ConfigError::ZeroClassCount)
    );
  }

  #[test]
  fn rejects_nan_thresholds() {
    let result = DetectConfig::default()
      .with_confidence_threshold(f32::NAN)
      .validated();
    assert!(matches!(result, Err(ConfigError::ConfidenceThreshold(_))));
  }
}
