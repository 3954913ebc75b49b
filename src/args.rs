// 该文件是 Huoyan （火眼） 项目的一部分。
// src/args.rs - 检测参数配置
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

use clap::Args;

use crate::config::{
  ConfigError, DEFAULT_CLASS_COUNT, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_SIZE,
  DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS, DetectConfig, SuppressionMode,
};

/// 后处理参数，供各个可执行程序通过 `#[command(flatten)]` 复用
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
  /// 模型输入边长（像素）
  #[arg(long, default_value_t = DEFAULT_INPUT_SIZE, value_name = "SIZE")]
  pub input_size: u32,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 每帧最多保留的检测数
  #[arg(long, default_value_t = DEFAULT_MAX_DETECTIONS, value_name = "COUNT")]
  pub max_detections: usize,

  /// 模型类别数
  #[arg(long, default_value_t = DEFAULT_CLASS_COUNT, value_name = "COUNT")]
  pub class_count: u32,

  /// 按类别分别执行 NMS
  #[arg(long)]
  pub per_class_nms: bool,
}

impl DetectArgs {
  pub fn into_config(self) -> Result<DetectConfig, ConfigError> {
    let suppression = if self.per_class_nms {
      SuppressionMode::PerClass
    } else {
      SuppressionMode::ClassAgnostic
    };

    DetectConfig::default()
      .with_input_size(self.input_size)
      .with_confidence_threshold(self.confidence)
      .with_iou_threshold(self.iou_threshold)
      .with_max_detections(self.max_detections)
      .with_class_count(self.class_count)
      .with_suppression(suppression)
      .validated()
  }
}
