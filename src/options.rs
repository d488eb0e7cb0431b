//! # 单次比对参数
//!
//! `ScreenshotOptions` 只在一次调用内有效：要遮挡的区域、阈值与抗锯齿策略。
//! 阈值与抗锯齿未设置时回退到 `EngineConfig`。

use crate::error::ScreenshotError;
use crate::masking::Rectangle;

/// 单次截图比对参数。
///
/// `E` 是截图源的元素句柄类型。
#[derive(Debug, Clone)]
pub struct ScreenshotOptions<E> {
    /// 像素坐标系下需要遮挡的矩形。
    pub ignore_rectangles: Vec<Rectangle>,
    /// 需要遮挡的元素，位置与尺寸在截图后向截图源查询。
    pub ignore_elements: Vec<E>,
    /// 颜色差异阈值（0~1）。
    pub threshold: Option<f64>,
    /// 是否把抗锯齿像素计入差异。
    pub include_aa: Option<bool>,
}

impl<E> Default for ScreenshotOptions<E> {
    fn default() -> Self {
        Self {
            ignore_rectangles: Vec::new(),
            ignore_elements: Vec::new(),
            threshold: None,
            include_aa: None,
        }
    }
}

impl<E> ScreenshotOptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_rectangle(mut self, rect: Rectangle) -> Self {
        self.ignore_rectangles.push(rect);
        self
    }

    pub fn ignore_element(mut self, element: E) -> Self {
        self.ignore_elements.push(element);
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn include_aa(mut self, include_aa: bool) -> Self {
        self.include_aa = Some(include_aa);
        self
    }

    /// 是否需要执行遮挡（否则跳过解码/编码）。
    pub fn has_ignore_regions(&self) -> bool {
        !self.ignore_rectangles.is_empty() || !self.ignore_elements.is_empty()
    }

    /// 在截图前校验阈值，避免首次运行时静默接受非法参数。
    pub fn validate(&self) -> Result<(), ScreenshotError> {
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ScreenshotError::InvalidOptions(format!(
                    "threshold 必须在 0~1 之间，当前为 {}",
                    threshold
                )));
            }
        }
        Ok(())
    }
}
