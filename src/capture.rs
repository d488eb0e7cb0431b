//! # 截图源抽象
//!
//! ## 设计思路
//!
//! 引擎本身不关心浏览器如何启动、页面如何渲染，只通过 `CaptureSource` 调用：
//! - 对元素或整页截图，返回编码后的图片字节
//! - 查询元素的逻辑位置与尺寸
//! - 查询视口尺寸（整页截图的逻辑尺寸）
//!
//! 截图目标建模为封闭的 `CaptureTarget { Element, Page }`，
//! 整页目标固定位于原点、尺寸等于视口，不再依赖“是否存在 driver 属性”之类的鸭子类型判断。
//!
//! ## 实现思路
//!
//! - 使用 `async-trait`，实现方可以基于 WebDriver、CDP 或内存 Mock。
//! - `decode_base64_screenshot` 处理 WebDriver 常见的 Base64 / Data URL 返回值。

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};

use crate::error::ScreenshotError;

/// 逻辑坐标系中的位置。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 逻辑坐标系中的尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// 截图源接口。
///
/// 元素无法定位时实现方应返回 `ScreenshotError::MissingElement`，引擎会原样透传。
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// 元素句柄类型，由实现方决定（选择器、WebDriver 元素 ID 等）。
    type Element: Send + Sync;

    /// 对单个元素截图，返回编码后的 PNG 字节。
    async fn capture_element(&self, element: &Self::Element) -> Result<Vec<u8>, ScreenshotError>;

    /// 对整个视口截图，返回编码后的 PNG 字节。
    async fn capture_page(&self) -> Result<Vec<u8>, ScreenshotError>;

    /// 元素左上角的逻辑坐标。
    async fn element_location(&self, element: &Self::Element) -> Result<Point, ScreenshotError>;

    /// 元素的逻辑尺寸。
    async fn element_size(&self, element: &Self::Element) -> Result<Size, ScreenshotError>;

    /// 视口的逻辑尺寸。
    async fn viewport_size(&self) -> Result<Size, ScreenshotError>;
}

/// 截图目标。
#[derive(Debug)]
pub enum CaptureTarget<'a, E> {
    /// 单个元素。
    Element(&'a E),
    /// 整个页面（视口）。
    Page,
}

impl<E> Clone for CaptureTarget<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for CaptureTarget<'_, E> {}

impl<'a, E: Send + Sync> CaptureTarget<'a, E> {
    /// 对目标截图。
    pub async fn capture<S>(&self, source: &S) -> Result<Vec<u8>, ScreenshotError>
    where
        S: CaptureSource<Element = E>,
    {
        match self {
            Self::Element(element) => source.capture_element(element).await,
            Self::Page => source.capture_page().await,
        }
    }

    /// 目标左上角的逻辑坐标，整页固定为原点。
    pub async fn location<S>(&self, source: &S) -> Result<Point, ScreenshotError>
    where
        S: CaptureSource<Element = E>,
    {
        match self {
            Self::Element(element) => source.element_location(element).await,
            Self::Page => Ok(Point::default()),
        }
    }

    /// 目标的逻辑尺寸，整页等于视口尺寸。
    pub async fn logical_size<S>(&self, source: &S) -> Result<Size, ScreenshotError>
    where
        S: CaptureSource<Element = E>,
    {
        match self {
            Self::Element(element) => source.element_size(element).await,
            Self::Page => source.viewport_size().await,
        }
    }

    /// 日志用的简短描述。
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Element(_) => "element",
            Self::Page => "page",
        }
    }
}

/// 解析 WebDriver 返回的 Base64 截图（支持 Data URL 与纯 Base64 字符串）。
///
/// # 示例
/// ```rust,ignore
/// use screenshot_diff::capture::decode_base64_screenshot;
///
/// let bytes = decode_base64_screenshot("data:image/png;base64,iVBORw0KGgo=")?;
/// # Ok::<(), screenshot_diff::ScreenshotError>(())
/// ```
pub fn decode_base64_screenshot(data: &str) -> Result<Vec<u8>, ScreenshotError> {
    let normalized = data.trim();

    let payload = if normalized.starts_with("data:image/") {
        let base64_start = normalized
            .find(";base64,")
            .ok_or_else(|| ScreenshotError::Decode("缺少 base64 标记".to_string()))?;
        &normalized[base64_start + 8..]
    } else {
        normalized
    };

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ScreenshotError::Decode(format!("Base64 解码失败：{}", e)))
}
