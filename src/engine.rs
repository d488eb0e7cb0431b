//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ScreenshotEngine` 只负责流程编排，处理链路固定为：
//! 1. 通过截图源获取编码后的截图
//! 2. 如有忽略配置：并发查询元素位置/尺寸 → 解码 → 遮挡 → 重新编码
//! 3. 无基准图：保存为基准，返回 0；有基准图：比对并返回差异像素数
//!
//! ## 实现思路
//!
//! - 目录在 `initialize` 中创建，权限等问题在启动阶段同步暴露。
//! - 元素查询是只读且互相独立的，使用 `try_join_all` 并发发出；
//!   全部收集完成后才进入遮挡阶段，像素缓冲只有一个所有者，无需加锁。
//! - 解码、遮挡、比对、编码都是 CPU 密集操作，放进 `spawn_blocking`，
//!   但仍在当前调用内顺序等待，不引入额外的并行。
//! - 记录 `capture/mask/compare/total` 阶段耗时，便于排查慢用例。

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::future::try_join_all;
use serde::Serialize;

use crate::capture::{CaptureSource, CaptureTarget, Point, Size};
use crate::config::EngineConfig;
use crate::error::ScreenshotError;
use crate::masking::{self, ElementBox, Rectangle};
use crate::options::ScreenshotOptions;
use crate::raster::RasterImage;
use crate::storage::{ArtifactKind, ArtifactStore, BaselineState};

/// 一次比对的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    /// 首次运行，已保存基准图
    BaselineCreated,
    /// 与基准图一致
    Matched,
    /// 存在差异
    Mismatched { diff_pixels: u64 },
}

/// 一次比对的完整报告，可序列化为 JSON 供报告器使用
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub tag: String,
    pub outcome: ComparisonOutcome,
    pub diff_pixels: u64,
    pub width: u32,
    pub height: u32,
    pub baseline_path: PathBuf,
    pub actual_path: Option<PathBuf>,
    pub diff_path: Option<PathBuf>,
}

impl ComparisonReport {
    pub fn passed(&self) -> bool {
        self.diff_pixels == 0
    }
}

/// 遮挡阶段输出：待落盘的 PNG 字节，以及（若已解码）对应的像素网格。
struct PreparedCapture {
    png: Vec<u8>,
    image: Option<RasterImage>,
}

/// 截图比对引擎
pub struct ScreenshotEngine<S: CaptureSource> {
    source: S,
    store: ArtifactStore,
    config: EngineConfig,
}

impl<S: CaptureSource> ScreenshotEngine<S> {
    /// 使用默认配置初始化引擎，并确保 `baseline/actual/diff` 目录存在。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use screenshot_diff::ScreenshotEngine;
    ///
    /// let engine = ScreenshotEngine::initialize("e2e/screenshots/", driver)?;
    /// let diff_pixels = engine.check_page_screenshot("home", None).await?;
    /// assert_eq!(diff_pixels, 0);
    /// ```
    pub fn initialize(root: impl AsRef<Path>, source: S) -> Result<Self, ScreenshotError> {
        Self::with_config(root, source, EngineConfig::default())
    }

    pub fn with_config(
        root: impl AsRef<Path>,
        source: S,
        config: EngineConfig,
    ) -> Result<Self, ScreenshotError> {
        config.validate()?;
        let store = ArtifactStore::initialize(root)?;
        Ok(Self { source, store, config })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 对元素截图并比对，返回差异像素数。
    ///
    /// # Panics
    ///
    /// 必须在 Tokio 运行时内 await，否则 `spawn_blocking` 会 panic。
    pub async fn check_element_screenshot(
        &self,
        element: &S::Element,
        tag: &str,
        options: Option<&ScreenshotOptions<S::Element>>,
    ) -> Result<u64, ScreenshotError> {
        let report = self
            .check_screenshot(CaptureTarget::Element(element), tag, options)
            .await?;
        Ok(report.diff_pixels)
    }

    /// 对整页截图并比对，返回差异像素数。
    ///
    /// # Panics
    ///
    /// 同 [`Self::check_element_screenshot`]，需要 Tokio 运行时。
    pub async fn check_page_screenshot(
        &self,
        tag: &str,
        options: Option<&ScreenshotOptions<S::Element>>,
    ) -> Result<u64, ScreenshotError> {
        let report = self.check_screenshot(CaptureTarget::Page, tag, options).await?;
        Ok(report.diff_pixels)
    }

    /// 处理主入口：截图 → 遮挡 → 建基准或比对 → 落盘。
    ///
    /// # Panics
    ///
    /// 解码、遮挡与比对通过 `tokio::task::spawn_blocking` 执行，
    /// 在 Tokio 运行时之外 await 会 panic。
    pub async fn check_screenshot(
        &self,
        target: CaptureTarget<'_, S::Element>,
        tag: &str,
        options: Option<&ScreenshotOptions<S::Element>>,
    ) -> Result<ComparisonReport, ScreenshotError> {
        if let Some(options) = options {
            options.validate()?;
        }
        let state = self.store.baseline_state(tag)?;
        let diff_options = self.config.diff_options(
            options.and_then(|o| o.threshold),
            options.and_then(|o| o.include_aa),
        );
        let total_start = Instant::now();

        let capture_start = Instant::now();
        let raw = target.capture(&self.source).await?;
        let capture_elapsed = capture_start.elapsed();

        let mask_start = Instant::now();
        let prepared = self.apply_ignore_regions(raw, target, options).await?;
        let mask_elapsed = mask_start.elapsed();

        let compare_start = Instant::now();
        let store = self.store.clone();
        let tag_owned = tag.to_string();
        let max_pixels = self.config.max_decoded_pixels;
        let prune = self.config.prune_stale_artifacts;

        let report = tokio::task::spawn_blocking(move || {
            let PreparedCapture { png, image } = prepared;
            let image = match image {
                Some(image) => image,
                None => RasterImage::decode_with_limit(&png, max_pixels)?,
            };
            let baseline_path = store.artifact_path(ArtifactKind::Baseline, &tag_owned)?;

            match state {
                BaselineState::NoBaseline => {
                    store.record(&tag_owned, &png)?;
                    Ok::<_, ScreenshotError>(ComparisonReport {
                        tag: tag_owned,
                        outcome: ComparisonOutcome::BaselineCreated,
                        diff_pixels: 0,
                        width: image.width(),
                        height: image.height(),
                        baseline_path,
                        actual_path: None,
                        diff_path: None,
                    })
                }
                BaselineState::HasBaseline => {
                    let comparison =
                        store.compare(&tag_owned, &png, &image, &diff_options, max_pixels)?;
                    let outcome = if comparison.diff_pixels == 0 {
                        if prune && store.prune_failure_artifacts(&tag_owned)? {
                            log::info!("🧹 截图 '{}' 已通过，清理了过期的 actual/diff", tag_owned);
                        }
                        ComparisonOutcome::Matched
                    } else {
                        ComparisonOutcome::Mismatched {
                            diff_pixels: comparison.diff_pixels,
                        }
                    };

                    Ok(ComparisonReport {
                        tag: tag_owned,
                        outcome,
                        diff_pixels: comparison.diff_pixels,
                        width: image.width(),
                        height: image.height(),
                        baseline_path,
                        actual_path: comparison.actual_path,
                        diff_path: comparison.diff_path,
                    })
                }
            }
        })
        .await
        .map_err(|e| ScreenshotError::Task(format!("比对任务执行失败: {}", e)))??;
        let compare_elapsed = compare_start.elapsed();

        log::info!(
            "✅ 比对完成 - tag={} target={} outcome={:?} capture={}ms mask={}ms compare={}ms total={}ms",
            report.tag,
            target.describe(),
            report.outcome,
            capture_elapsed.as_millis(),
            mask_elapsed.as_millis(),
            compare_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(report)
    }

    /// 按忽略配置遮挡截图。
    ///
    /// 没有任何忽略项时原样返回字节，不做解码/编码。
    async fn apply_ignore_regions(
        &self,
        raw: Vec<u8>,
        target: CaptureTarget<'_, S::Element>,
        options: Option<&ScreenshotOptions<S::Element>>,
    ) -> Result<PreparedCapture, ScreenshotError> {
        let Some(options) = options.filter(|o| o.has_ignore_regions()) else {
            return Ok(PreparedCapture { png: raw, image: None });
        };

        // 目标自身与所有忽略元素的查询在同一次 join 中发出
        let (origin, target_size, element_boxes) = if options.ignore_elements.is_empty() {
            (Point::default(), Size::default(), Vec::new())
        } else {
            tokio::try_join!(
                target.location(&self.source),
                target.logical_size(&self.source),
                self.locate_elements(&options.ignore_elements)
            )?
        };

        let rectangles: Vec<Rectangle> = options.ignore_rectangles.clone();
        let max_pixels = self.config.max_decoded_pixels;

        tokio::task::spawn_blocking(move || -> Result<PreparedCapture, ScreenshotError> {
            let mut image = RasterImage::decode_with_limit(&raw, max_pixels)?;
            let regions = masking::resolve_ignore_regions(
                image.width(),
                origin,
                target_size,
                &rectangles,
                &element_boxes,
            )?;
            masking::apply_blackouts(&mut image, &regions);

            log::debug!("⬛ 已遮挡 {} 个区域", regions.len());

            Ok(PreparedCapture {
                png: image.encode()?,
                image: Some(image),
            })
        })
        .await
        .map_err(|e| ScreenshotError::Task(format!("遮挡任务执行失败: {}", e)))?
    }

    /// 并发查询所有忽略元素的位置与尺寸，全部完成后才返回。
    async fn locate_elements(
        &self,
        elements: &[S::Element],
    ) -> Result<Vec<ElementBox>, ScreenshotError> {
        let source = &self.source;
        try_join_all(elements.iter().map(|element| async move {
            let (location, size) = tokio::try_join!(
                source.element_location(element),
                source.element_size(element)
            )?;
            Ok::<_, ScreenshotError>(ElementBox { location, size })
        }))
        .await
    }
}
