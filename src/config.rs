//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `EngineConfig`：默认阈值、抗锯齿策略、差异图配色、
//! 解码像素上限，以及比对通过后是否清理旧的 actual/diff 文件。
//! 单次调用的 `ScreenshotOptions` 只覆盖阈值与抗锯齿两项，其余一律取自这里。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产默认值（阈值 0.1，背景淡化 0.1，红色标记）。
//! - `load` 读取 JSON 配置文件，缺省字段回退默认值。
//! - `validate` 在引擎初始化时执行，配置错误在启动阶段就能暴露。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diff::DiffOptions;
use crate::error::ScreenshotError;

/// 默认颜色差异阈值（0~1，越大越宽松）。
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// 截图比对引擎配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 默认颜色差异阈值，单次调用可覆盖。
    pub threshold: f64,
    /// 是否把抗锯齿像素也计入差异，单次调用可覆盖。
    pub include_aa: bool,
    /// 差异图中未变化像素的淡化系数（0 为纯白，1 为原图灰度）。
    pub diff_alpha: f64,
    /// 差异像素颜色。
    pub diff_color: [u8; 3],
    /// 变暗像素的替代颜色，未设置时统一使用 `diff_color`。
    pub diff_color_alt: Option<[u8; 3]>,
    /// 抗锯齿像素的高亮颜色，未设置时按背景绘制。
    pub aa_color: Option<[u8; 3]>,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 比对通过时是否删除该标签遗留的 actual/diff 文件。
    pub prune_stale_artifacts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            include_aa: false,
            diff_alpha: 0.1,
            diff_color: [255, 0, 0],
            diff_color_alt: None,
            aa_color: None,
            max_decoded_pixels: 100_000_000,
            prune_stale_artifacts: false,
        }
    }
}

impl EngineConfig {
    /// 从 JSON 文件加载配置。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use screenshot_diff::EngineConfig;
    ///
    /// let config = EngineConfig::load("e2e/screenshot-diff.json")?;
    /// # Ok::<(), screenshot_diff::ScreenshotError>(())
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScreenshotError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScreenshotError::Config(format!("读取配置文件 '{}' 失败: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ScreenshotError::Config(format!("解析配置文件 '{}' 失败: {}", path.display(), e))
        })?;
        config.validate()?;

        log::debug!("⚙️ 已加载截图比对配置：{}", path.display());
        Ok(config)
    }

    /// 校验取值范围。
    pub fn validate(&self) -> Result<(), ScreenshotError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ScreenshotError::Config(format!(
                "threshold 必须在 0~1 之间，当前为 {}",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.diff_alpha) {
            return Err(ScreenshotError::Config(format!(
                "diff_alpha 必须在 0~1 之间，当前为 {}",
                self.diff_alpha
            )));
        }
        if self.max_decoded_pixels == 0 {
            return Err(ScreenshotError::Config("max_decoded_pixels 不能为 0".to_string()));
        }
        Ok(())
    }

    /// 结合单次调用的覆盖项生成比对参数。
    pub(crate) fn diff_options(
        &self,
        threshold: Option<f64>,
        include_aa: Option<bool>,
    ) -> DiffOptions {
        DiffOptions {
            threshold: threshold.unwrap_or(self.threshold),
            include_aa: include_aa.unwrap_or(self.include_aa),
            alpha: self.diff_alpha,
            diff_color: self.diff_color,
            diff_color_alt: self.diff_color_alt,
            aa_color: self.aa_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default()
            .validate()
            .expect("default config should be valid");
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp config failed");
        write!(file, r#"{{ "threshold": 0.25, "prune_stale_artifacts": true }}"#)
            .expect("write temp config failed");

        let config = EngineConfig::load(file.path()).expect("config should load");

        assert_eq!(config.threshold, 0.25);
        assert!(config.prune_stale_artifacts);
        assert_eq!(config.diff_color, [255, 0, 0]);
        assert!(!config.include_aa);
    }

    #[test]
    fn load_rejects_out_of_range_threshold() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp config failed");
        write!(file, r#"{{ "threshold": 1.5 }}"#).expect("write temp config failed");

        let result = EngineConfig::load(file.path());

        assert!(matches!(result, Err(ScreenshotError::Config(_))));
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let result = EngineConfig::load("/definitely/not/here/screenshot-diff.json");

        assert!(matches!(result, Err(ScreenshotError::Config(_))));
    }

    #[test]
    fn call_overrides_take_precedence() {
        let config = EngineConfig::default();

        let options = config.diff_options(Some(0.3), Some(true));
        assert_eq!(options.threshold, 0.3);
        assert!(options.include_aa);

        let options = config.diff_options(None, None);
        assert_eq!(options.threshold, DEFAULT_THRESHOLD);
        assert!(!options.include_aa);
    }
}
