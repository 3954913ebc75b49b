// 该文件是 Huoyan （火眼） 项目的一部分。
// tests/pipeline.rs - 流水线端到端测试
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

use std::convert::Infallible;

use huoyan::{
  DetectConfig, Frame, NormalizedTensor, Pipeline, PipelineError, PixelFormat, RawOutputTensor,
  detect::{DecodeError, iou},
  model::Model,
};

/// 忽略输入，总是返回同一个输出张量
struct FixedModel {
  output: RawOutputTensor,
}

impl FixedModel {
  /// `rows[c][a]` 为第 c 个通道第 a 个锚点，按通道优先排列
  fn channels_first(rows: &[Vec<f32>]) -> Self {
    let channels = rows.len();
    let anchors = rows[0].len();
    let data = rows.iter().flatten().copied().collect();
    Self {
      output: RawOutputTensor::new(data, vec![1, channels, anchors]).unwrap(),
    }
  }
}

impl Model for FixedModel {
  type Error = Infallible;

  fn infer(&self, _input: NormalizedTensor) -> Result<RawOutputTensor, Self::Error> {
    Ok(self.output.clone())
  }
}

fn frame() -> Frame {
  Frame::new(vec![64; 16 * 12 * 3], 16, 12, PixelFormat::Rgb24).unwrap()
}

fn close(a: f32, b: f32) -> bool {
  (a - b).abs() < 1e-5
}

#[test]
fn single_confident_anchor_is_normalized_by_input_size() {
  // 像素框 (100, 100, 200, 200)，输入边长 320
  let model = FixedModel::channels_first(&[
    vec![100.0, 10.0, 0.0],
    vec![100.0, 10.0, 0.0],
    vec![200.0, 20.0, 320.0],
    vec![200.0, 20.0, 320.0],
    vec![0.9, 0.1, 0.2],
  ]);
  let pipeline = Pipeline::new(DetectConfig::default(), model).unwrap();

  let result = pipeline.process_frame(&frame()).unwrap();
  assert_eq!(result.len(), 1);
  let det = result.items[0];
  assert!(close(det.x1, 0.3125));
  assert!(close(det.y1, 0.3125));
  assert!(close(det.x2, 0.625));
  assert!(close(det.y2, 0.625));
  assert!(close(det.confidence, 0.9));
  assert_eq!(det.class_id, 0);
}

#[test]
fn overlapping_candidates_keep_the_more_confident_one() {
  // 两个框 IoU = 0.6, 置信度 1.0 * 0.8 与 0.75 * 0.8
  let model = FixedModel::channels_first(&[
    vec![50.0, 30.0, 0.0],
    vec![50.0, 50.0, 0.0],
    vec![100.0, 60.0, 0.0],
    vec![100.0, 100.0, 0.0],
    vec![1.0, 0.75, 0.0],
    vec![0.8, 0.8, 0.0],
  ]);
  let config = DetectConfig::default()
    .with_input_size(100)
    .with_iou_threshold(0.4);
  let pipeline = Pipeline::new(config, model).unwrap();

  let result = pipeline.process_frame(&frame()).unwrap();
  assert_eq!(result.len(), 1);
  assert!(close(result.items[0].confidence, 0.8));
  assert!(close(result.items[0].x2, 1.0));
}

#[test]
fn many_disjoint_candidates_are_truncated() {
  // 20 x 10 网格，每格 16 x 32 像素，框互不重叠
  let mut rows = vec![Vec::with_capacity(200); 5];
  for i in 0..200 {
    let x1 = (i % 20) as f32 * 16.0 + 2.0;
    let y1 = (i / 20) as f32 * 32.0 + 4.0;
    rows[0].push(x1);
    rows[1].push(y1);
    rows[2].push(x1 + 12.0);
    rows[3].push(y1 + 24.0);
    rows[4].push(0.2 + i as f32 * 0.004);
  }
  let config = DetectConfig::default()
    .with_confidence_threshold(0.1)
    .with_max_detections(50);
  let pipeline = Pipeline::new(config, FixedModel::channels_first(&rows)).unwrap();

  let result = pipeline.process_frame(&frame()).unwrap();
  assert_eq!(result.len(), 50);
  assert!(close(result.items[0].confidence, 0.2 + 199.0 * 0.004));
  assert!(result.items.windows(2).all(|w| w[0].confidence >= w[1].confidence));
  assert!(result.iter().all(|d| d.confidence > 0.2 + 149.0 * 0.004));
  for (i, a) in result.iter().enumerate() {
    for b in &result.items[i + 1..] {
      assert!(iou(a, b) <= 0.4);
    }
  }
}

#[test]
fn four_channel_output_is_unsupported() {
  let model = FixedModel {
    output: RawOutputTensor::new(vec![0.5; 400], vec![1, 4, 100]).unwrap(),
  };
  let pipeline = Pipeline::new(DetectConfig::default(), model).unwrap();

  let err = pipeline.process_frame(&frame()).unwrap_err();
  match err {
    PipelineError::Decode(DecodeError::UnsupportedLayout { shape }) => {
      assert_eq!(shape, vec![1, 4, 100]);
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn not_ready_frame_yields_empty_result() {
  let model = FixedModel::channels_first(&[
    vec![100.0],
    vec![100.0],
    vec![200.0],
    vec![200.0],
    vec![0.9],
  ]);
  let pipeline = Pipeline::new(DetectConfig::default(), model).unwrap();

  let result = pipeline
    .process_frame(&Frame::empty(PixelFormat::Rgba32))
    .unwrap();
  assert!(result.is_empty());
}

#[test]
fn frames_are_processed_independently() {
  let model = FixedModel::channels_first(&[
    vec![96.0],
    vec![96.0],
    vec![224.0],
    vec![224.0],
    vec![0.7],
  ]);
  let pipeline = Pipeline::new(DetectConfig::default(), model).unwrap();

  let first = pipeline.process_frame(&frame()).unwrap();
  let large = Frame::new(vec![200; 64 * 48 * 4], 64, 48, PixelFormat::Rgba32).unwrap();
  let second = pipeline.process_frame(&large).unwrap();
  assert_eq!(first.items, second.items);
}
