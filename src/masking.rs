//! # 区域遮挡模块
//!
//! ## 设计思路
//!
//! 比对前把已知会变化的区域涂成不透明黑色，让它们在基准图和当前截图中完全一致。
//! 遮挡来源有两种：
//! - 调用方直接给出的像素矩形（`ignore_rectangles`）
//! - 需要向截图源查询位置与尺寸的元素（`ignore_elements`）
//!
//! 元素坐标处于浏览器的“逻辑坐标系”，而截图是物理像素；高分屏下截图可能是视口的 2 倍。
//! 因此元素矩形要乘以换算系数 `image.width / target.logical_width`。
//!
//! ## 实现思路
//!
//! - 元素查询在引擎层并发完成，这里只接收已经收集好的 `ElementBox` 列表（纯函数，便于测试）。
//! - `blackout` 对唯一所有者的像素缓冲逐个矩形写入，越界部分静默裁剪。
//! - 浮点矩形转像素时起点向下取整、终点向上取整，保证被触及的像素都会被覆盖。

use serde::{Deserialize, Serialize};

use crate::capture::{Point, Size};
use crate::error::ScreenshotError;
use crate::raster::RasterImage;

/// 遮挡颜色：不透明黑色。
pub const BLACKOUT_COLOR: [u8; 4] = [0, 0, 0, 255];

/// 像素坐标系下的矩形（相对被遮挡图片的左上角）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rectangle {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// 与图片边界求交并取整，交集为空时返回 `None`。
    pub fn clip_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let values = [self.x, self.y, self.w, self.h];
        if values.iter().any(|v| !v.is_finite()) || self.w <= 0.0 || self.h <= 0.0 {
            return None;
        }

        let x0 = self.x.floor().clamp(0.0, width as f64) as u32;
        let y0 = self.y.floor().clamp(0.0, height as f64) as u32;
        let x1 = (self.x + self.w).ceil().clamp(0.0, width as f64) as u32;
        let y1 = (self.y + self.h).ceil().clamp(0.0, height as f64) as u32;

        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        Some(PixelRect { x0, y0, x1, y1 })
    }
}

/// 已裁剪到图片范围内的半开区间矩形 `[x0, x1) × [y0, y1)`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// 元素在逻辑坐标系中的位置与尺寸。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBox {
    pub location: Point,
    pub size: Size,
}

/// 把矩形区域涂成不透明黑色，原地修改。
///
/// 越界部分静默裁剪，交集为空时什么也不做。
pub fn blackout(image: &mut RasterImage, rect: &Rectangle) {
    let Some(clipped) = rect.clip_to(image.width(), image.height()) else {
        log::debug!("⬛ 遮挡区域与图片无交集，跳过：{:?}", rect);
        return;
    };

    let stride = image.width() as usize * 4;
    let pixels = image.pixels_mut();
    for y in clipped.y0..clipped.y1 {
        let row_start = y as usize * stride;
        let start = row_start + clipped.x0 as usize * 4;
        let end = row_start + clipped.x1 as usize * 4;
        for pixel in pixels[start..end].chunks_exact_mut(4) {
            pixel.copy_from_slice(&BLACKOUT_COLOR);
        }
    }
}

/// 逻辑坐标到像素坐标的换算系数。
pub fn conversion_factor(image_width: u32, target_size: Size) -> Result<f64, ScreenshotError> {
    if !target_size.width.is_finite() || target_size.width <= 0.0 {
        return Err(ScreenshotError::InvalidTarget(format!(
            "截图目标逻辑宽度无效：{}",
            target_size.width
        )));
    }
    Ok(image_width as f64 / target_size.width)
}

/// 把忽略配置解析为像素坐标系下的矩形列表。
///
/// - `rectangles` 原样保留（已经是像素坐标）
/// - `elements` 先减去目标自身的位置，再乘以换算系数
///
/// 只有存在元素时才需要合法的目标尺寸。
pub fn resolve_ignore_regions(
    image_width: u32,
    target_origin: Point,
    target_size: Size,
    rectangles: &[Rectangle],
    elements: &[ElementBox],
) -> Result<Vec<Rectangle>, ScreenshotError> {
    let mut regions = Vec::with_capacity(rectangles.len() + elements.len());
    regions.extend_from_slice(rectangles);

    if elements.is_empty() {
        return Ok(regions);
    }

    let factor = conversion_factor(image_width, target_size)?;
    log::debug!(
        "📐 元素遮挡换算系数：{:.3}（截图宽 {}，逻辑宽 {}）",
        factor,
        image_width,
        target_size.width
    );

    regions.extend(elements.iter().map(|element| Rectangle {
        x: (element.location.x - target_origin.x) * factor,
        y: (element.location.y - target_origin.y) * factor,
        w: element.size.width * factor,
        h: element.size.height * factor,
    }));

    Ok(regions)
}

/// 依次应用所有遮挡矩形。
pub fn apply_blackouts(image: &mut RasterImage, regions: &[Rectangle]) {
    for region in regions {
        blackout(image, region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    fn white(width: u32, height: u32) -> RasterImage {
        RasterImage::filled(width, height, WHITE).expect("filled image")
    }

    fn black_count(image: &RasterImage) -> usize {
        image
            .pixels()
            .chunks_exact(4)
            .filter(|p| *p == BLACKOUT_COLOR)
            .count()
    }

    #[test]
    fn blackout_covers_exact_half_open_region() {
        let mut image = white(10, 10);

        blackout(&mut image, &Rectangle::new(2.0, 3.0, 4.0, 2.0));

        assert_eq!(black_count(&image), 8);
        assert_eq!(image.pixel(2, 3), Some(BLACKOUT_COLOR));
        assert_eq!(image.pixel(5, 4), Some(BLACKOUT_COLOR));
        assert_eq!(image.pixel(6, 4), Some(WHITE));
        assert_eq!(image.pixel(2, 5), Some(WHITE));
    }

    #[test]
    fn blackout_clips_partially_outside_region() {
        let mut image = white(10, 10);

        blackout(&mut image, &Rectangle::new(-3.0, 8.0, 5.0, 10.0));

        assert_eq!(black_count(&image), 4);
        assert_eq!(image.pixel(0, 9), Some(BLACKOUT_COLOR));
        assert_eq!(image.pixel(1, 8), Some(BLACKOUT_COLOR));
    }

    #[test]
    fn blackout_fully_outside_is_noop() {
        let mut image = white(10, 10);
        let before = image.clone();

        blackout(&mut image, &Rectangle::new(50.0, 50.0, 5.0, 5.0));
        blackout(&mut image, &Rectangle::new(2.0, 2.0, 0.0, 5.0));
        blackout(&mut image, &Rectangle::new(f64::NAN, 2.0, 3.0, 5.0));

        assert_eq!(image, before);
    }

    #[test]
    fn fractional_rectangle_covers_every_touched_pixel() {
        let rect = Rectangle::new(1.5, 1.2, 2.0, 1.0);

        let clipped = rect.clip_to(10, 10).expect("non-empty");

        assert_eq!(clipped, PixelRect { x0: 1, y0: 1, x1: 4, y1: 3 });
    }

    #[test]
    fn element_regions_scale_by_device_pixel_ratio() {
        let regions = resolve_ignore_regions(
            1600,
            Point::new(0.0, 0.0),
            Size::new(800.0, 600.0),
            &[],
            &[ElementBox {
                location: Point::new(10.0, 20.0),
                size: Size::new(30.0, 40.0),
            }],
        )
        .expect("resolve should succeed");

        assert_eq!(regions, vec![Rectangle::new(20.0, 40.0, 60.0, 80.0)]);
    }

    #[test]
    fn element_regions_are_relative_to_target_origin() {
        let regions = resolve_ignore_regions(
            200,
            Point::new(100.0, 50.0),
            Size::new(200.0, 100.0),
            &[Rectangle::new(1.0, 2.0, 3.0, 4.0)],
            &[ElementBox {
                location: Point::new(110.0, 60.0),
                size: Size::new(5.0, 5.0),
            }],
        )
        .expect("resolve should succeed");

        assert_eq!(
            regions,
            vec![
                Rectangle::new(1.0, 2.0, 3.0, 4.0),
                Rectangle::new(10.0, 10.0, 5.0, 5.0),
            ]
        );
    }

    #[test]
    fn zero_width_target_is_rejected_only_when_elements_present() {
        let zero = Size::new(0.0, 100.0);

        let rects_only = resolve_ignore_regions(
            100,
            Point::default(),
            zero,
            &[Rectangle::new(0.0, 0.0, 1.0, 1.0)],
            &[],
        );
        assert!(rects_only.is_ok());

        let with_element = resolve_ignore_regions(
            100,
            Point::default(),
            zero,
            &[],
            &[ElementBox {
                location: Point::default(),
                size: Size::new(1.0, 1.0),
            }],
        );
        assert!(matches!(with_element, Err(ScreenshotError::InvalidTarget(_))));
    }

    proptest! {
        #[test]
        fn blackout_never_touches_pixels_outside_rect(
            x in -20.0f64..40.0,
            y in -20.0f64..40.0,
            w in 0.0f64..30.0,
            h in 0.0f64..30.0,
        ) {
            let mut image = white(16, 12);
            let rect = Rectangle::new(x, y, w, h);

            blackout(&mut image, &rect);

            prop_assert_eq!(image.pixels().len(), 16 * 12 * 4);
            let clipped = rect.clip_to(16, 12);
            for py in 0..12 {
                for px in 0..16 {
                    let inside = clipped.map(|c| c.contains(px, py)).unwrap_or(false);
                    let expected = if inside { BLACKOUT_COLOR } else { WHITE };
                    prop_assert_eq!(image.pixel(px, py), Some(expected));
                }
            }
        }
    }
}
