// 该文件是 Huoyan （火眼） 项目的一部分。
// src/detect/iou.rs - 交并比
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

use super::Detection;

/// 计算两个角点形式框的 IoU，结果位于 [0, 1]
///
/// 不相交或任一框退化时返回 0，不会产生 NaN。
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  let x1 = a.x1.max(b.x1);
  let y1 = a.y1.max(b.y1);
  let x2 = a.x2.min(b.x2);
  let y2 = a.y2.min(b.y2);

  let inter_w = x2 - x1;
  let inter_h = y2 - y1;
  // 取反比较，NaN 坐标同样落入该分支
  if !(inter_w > 0.0 && inter_h > 0.0) {
    return 0.0;
  }

  let intersection = inter_w * inter_h;
  let union = a.area() + b.area() - intersection;
  if !(union > 0.0) {
    return 0.0;
  }

  (intersection / union).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
    Detection {
      x1,
      y1,
      x2,
      y2,
      confidence: 1.0,
      class_id: 0,
    }
  }

  #[test]
  fn identical_boxes_have_unit_iou() {
    let a = bbox(0.1, 0.2, 0.5, 0.7);
    assert_eq!(iou(&a, &a), 1.0);
  }

  #[test]
  fn iou_is_symmetric() {
    let boxes = [
      bbox(0.0, 0.0, 0.5, 0.5),
      bbox(0.25, 0.25, 0.75, 0.75),
      bbox(0.1, 0.4, 0.9, 0.6),
      bbox(0.6, 0.6, 0.6, 0.9),
    ];
    for a in &boxes {
      for b in &boxes {
        assert_eq!(iou(a, b), iou(b, a));
      }
    }
  }

  #[test]
  fn partial_overlap() {
    let a = bbox(0.0, 0.0, 2.0, 2.0);
    let b = bbox(1.0, 1.0, 3.0, 3.0);
    // 交集 1，并集 4 + 4 - 1 = 7
    assert!((iou(&a, &b) - 1.0 / 7.0).abs() < 1e-6);
  }

  #[test]
  fn disjoint_and_touching_boxes_are_zero() {
    let a = bbox(0.0, 0.0, 0.4, 0.4);
    assert_eq!(iou(&a, &bbox(0.5, 0.5, 0.9, 0.9)), 0.0);
    assert_eq!(iou(&a, &bbox(0.4, 0.0, 0.8, 0.4)), 0.0);
  }

  #[test]
  fn degenerate_boxes_are_zero() {
    let a = bbox(0.1, 0.1, 0.5, 0.5);
    let flat = bbox(0.2, 0.3, 0.4, 0.3);
    let inverted = bbox(0.4, 0.4, 0.2, 0.2);
    let point = bbox(0.3, 0.3, 0.3, 0.3);

    assert_eq!(iou(&a, &flat), 0.0);
    assert_eq!(iou(&a, &inverted), 0.0);
    assert_eq!(iou(&point, &point), 0.0);
  }

  #[test]
  fn nan_coordinates_do_not_leak() {
    let a = bbox(0.1, 0.1, 0.5, 0.5);
    let b = bbox(f32::NAN, 0.1, 0.5, 0.5);
    let value = iou(&a, &b);
    assert!(!value.is_nan());
    assert!((0.0..=1.0).contains(&value));
  }
}
