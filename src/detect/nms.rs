// 该文件是 Huoyan （火眼） 项目的一部分。
// src/detect/nms.rs - 非极大值抑制
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

use tracing::debug;

use super::{Detection, iou};
use crate::config::{DetectConfig, SuppressionMode};

/// 贪心 NMS
///
/// 候选框按置信度稳定降序排列（置信度相同时保持解码顺序），
/// 依次保留未被抑制的框，并抑制之后所有 IoU 超过阈值的框，
/// 最后截断到 `max_detections`。
pub fn suppress(mut candidates: Vec<Detection>, config: &DetectConfig) -> Vec<Detection> {
  if candidates.is_empty() {
    return candidates;
  }

  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let total = candidates.len();
  let mut suppressed = vec![false; total];
  let mut keep = Vec::with_capacity(total.min(config.max_detections));

  for i in 0..total {
    if suppressed[i] {
      continue;
    }

    let current = &candidates[i];
    keep.push(*current);
    if keep.len() == config.max_detections {
      // 之后的框不会再被保留
      break;
    }

    for j in (i + 1)..total {
      if suppressed[j] {
        continue;
      }

      let later = &candidates[j];
      if config.suppression == SuppressionMode::PerClass && later.class_id != current.class_id {
        continue;
      }

      if iou(current, later) > config.iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!("NMS: 候选 {} 个，保留 {} 个", total, keep.len());
  keep
}
