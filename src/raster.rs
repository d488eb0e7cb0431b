//! # 位图模型模块
//!
//! ## 设计思路
//!
//! 比对算法只认一种内存格式：8 位 RGBA、按行存储的像素网格。
//! 所有“字节 → 像素”的转换集中在这里，并且只接受 PNG，
//! 因为逐像素比对依赖无损格式，任何有损压缩都会制造假差异。
//!
//! ## 实现思路
//!
//! 1. 先读取 PNG 头部尺寸，按像素上限快速拒绝
//! 2. 完整解码，统一转换为 RGBA8
//! 3. 校验字节长度 `width * height * 4`
//! 4. 编码时直接写出 RGBA8 PNG，保证 `decode(encode(img)) == img`

use std::io::Cursor;

use image::{ImageFormat, ImageReader, RgbaImage};

use crate::error::ScreenshotError;

/// 解码后的 RGBA 像素网格。
///
/// 不变量：`pixels.len() == width * height * 4`，且宽高均大于 0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// 用现成的 RGBA 字节构建图像，长度不匹配时返回 `Decode` 错误。
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ScreenshotError> {
        let expected_len = Self::byte_len(width, height)?;
        if pixels.len() != expected_len {
            return Err(ScreenshotError::Decode(format!(
                "像素数据长度异常：期望 {} 字节，实际 {} 字节",
                expected_len,
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 创建纯色图像。
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, ScreenshotError> {
        let expected_len = Self::byte_len(width, height)?;
        let mut pixels = Vec::with_capacity(expected_len);
        for _ in 0..expected_len / 4 {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(width, height, pixels)
    }

    /// 解码 PNG 字节，不限制像素数量。
    pub fn decode(bytes: &[u8]) -> Result<Self, ScreenshotError> {
        Self::decode_with_limit(bytes, u64::MAX)
    }

    /// 解码 PNG 字节，并在完整解码前按 `max_pixels` 拒绝超大图片。
    pub fn decode_with_limit(bytes: &[u8], max_pixels: u64) -> Result<Self, ScreenshotError> {
        let format = image::guess_format(bytes)
            .map_err(|e| ScreenshotError::Decode(format!("无法识别图片格式：{}", e)))?;
        if format != ImageFormat::Png {
            return Err(ScreenshotError::Decode(format!(
                "仅支持无损 PNG，收到 {:?}",
                format
            )));
        }

        let (header_width, header_height) =
            ImageReader::with_format(Cursor::new(bytes), ImageFormat::Png)
                .into_dimensions()
                .map_err(|e| ScreenshotError::Decode(format!("无法读取图片尺寸：{}", e)))?;

        let pixels = (header_width as u64)
            .checked_mul(header_height as u64)
            .ok_or_else(|| ScreenshotError::ResourceLimit("图片像素数溢出".to_string()))?;
        if pixels > max_pixels {
            return Err(ScreenshotError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, max_pixels
            )));
        }

        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| ScreenshotError::Decode(format!("图片解码失败：{}", e)))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::debug!("🖼️ PNG 解码完成 - {}x{}", width, height);

        Self::new(width, height, rgba.into_raw())
    }

    /// 编码为 8 位 RGBA PNG。
    pub fn encode(&self) -> Result<Vec<u8>, ScreenshotError> {
        let buffer = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| ScreenshotError::Encode("像素缓冲区长度异常".to_string()))?;

        let mut cursor = Cursor::new(Vec::new());
        buffer
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| ScreenshotError::Encode(format!("PNG 编码失败：{}", e)))?;
        Ok(cursor.into_inner())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// 可变像素切片。长度固定，因此不变量无法被破坏。
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// 读取 `(x, y)` 处的 RGBA，越界返回 `None`。
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let offset = self.offset(x, y)?;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(rgba)
    }

    /// 写入 `(x, y)` 处的 RGBA，越界时忽略并返回 `false`。
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) -> bool {
        match self.offset(x, y) {
            Some(offset) => {
                self.pixels[offset..offset + 4].copy_from_slice(&rgba);
                true
            }
            None => false,
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    fn byte_len(width: u32, height: u32) -> Result<usize, ScreenshotError> {
        if width == 0 || height == 0 {
            return Err(ScreenshotError::Decode(format!(
                "图片尺寸无效：{}x{}",
                width, height
            )));
        }

        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| ScreenshotError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))
    }
}
