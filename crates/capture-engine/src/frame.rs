//! Still-frame capture of a render surface.
//!
//! A capture grabs the surface's whole window, crops it to the surface
//! region, scales it to the output resolution, and writes it into the
//! session's scratch directory under its sequence number.

use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use keyreel_common::config::{CaptureConfig, ResampleFilter};
use keyreel_common::error::{ReelError, ReelResult};
use keyreel_scene_core::{KeyframeId, PixelRect, RenderSurface, SurfaceRect};

use crate::scratch::ScratchDirectory;

/// Crop and scaling options for [`FrameCapture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Crop regions narrower or shorter than this fall back to the band.
    pub min_region_px: u32,
    /// Rows skipped at the top and bottom in the fallback band.
    pub fallback_margin_px: u32,
    pub filter: ResampleFilter,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            min_region_px: config.min_region_px,
            fallback_margin_px: config.fallback_margin_px,
            filter: config.filter,
        }
    }
}

/// A frame written to scratch storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub sequence: usize,
    /// Keyframe shown while capturing, when the caller knows it.
    pub keyframe: Option<KeyframeId>,
    pub path: PathBuf,
    /// Window-image region the frame was cropped from.
    pub region: PixelRect,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    pub fn for_keyframe(mut self, id: KeyframeId) -> Self {
        self.keyframe = Some(id);
        self
    }
}

/// A grabbed window image and the surface region within it.
#[derive(Debug, Clone)]
pub struct WindowGrab {
    pub image: RgbaImage,
    pub region: PixelRect,
}

/// Captures render surfaces into numbered still images.
#[derive(Debug, Clone, Default)]
pub struct FrameCapture {
    options: CaptureOptions,
}

impl FrameCapture {
    pub fn new(options: CaptureOptions) -> Self {
        Self { options }
    }

    /// Capture the surface's current pixels as frame `sequence`.
    pub fn capture(
        &self,
        surface: &dyn RenderSurface,
        sequence: usize,
        width: u32,
        height: u32,
        scratch: &ScratchDirectory,
    ) -> ReelResult<CapturedFrame> {
        check_output_size(width, height)?;
        let grab = self.grab(surface)?;
        self.write_frame(grab, sequence, width, height, scratch.frame_path(sequence))
    }

    /// Grab the surface's window and work out the region to keep.
    pub fn grab(&self, surface: &dyn RenderSurface) -> ReelResult<WindowGrab> {
        let window = surface
            .window()
            .ok_or_else(|| ReelError::capture("Render surface is not attached to a window"))?;

        let image = window
            .grab_window()
            .filter(|img| img.width() > 0 && img.height() > 0)
            .ok_or_else(|| ReelError::capture("Failed to grab window contents"))?;

        let region =
            self.capture_region(surface.bounds_in_window(), window.size(), image.dimensions());
        Ok(WindowGrab { image, region })
    }

    /// Crop, scale and write a grab to `path` as PNG.
    ///
    /// Blocking; async callers should run it on a blocking thread.
    pub fn write_frame(
        &self,
        grab: WindowGrab,
        sequence: usize,
        width: u32,
        height: u32,
        path: PathBuf,
    ) -> ReelResult<CapturedFrame> {
        check_output_size(width, height)?;
        let WindowGrab { image, region } = grab;

        let cropped = imageops::crop_imm(
            &image,
            region.x as u32,
            region.y as u32,
            region.width as u32,
            region.height as u32,
        )
        .to_image();
        let scaled = imageops::resize(&cropped, width, height, filter_type(self.options.filter));

        scaled
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| {
                ReelError::capture(format!("Failed to write frame {}: {e}", path.display()))
            })?;

        tracing::debug!(
            sequence,
            path = %path.display(),
            crop_x = region.x,
            crop_y = region.y,
            crop_w = region.width,
            crop_h = region.height,
            "Captured frame"
        );

        Ok(CapturedFrame {
            sequence,
            keyframe: None,
            path,
            region,
            width,
            height,
        })
    }

    /// Region of a grabbed window image to keep.
    ///
    /// Surface bounds are given in window coordinates; the grabbed image may
    /// be larger (HiDPI), so they are scaled by the image/window width ratio
    /// first. The result always lies within the image.
    pub fn capture_region(
        &self,
        bounds: SurfaceRect,
        window_size: (u32, u32),
        image_size: (u32, u32),
    ) -> PixelRect {
        let image_rect = PixelRect::from_size(image_size.0, image_size.1);

        let scale = if window_size.0 > 0 {
            image_size.0 as f64 / window_size.0 as f64
        } else {
            1.0
        };
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };

        let region = bounds.scaled(scale).to_pixels().intersect(&image_rect);
        if !region.is_degenerate(self.options.min_region_px) {
            return region;
        }

        let band = PixelRect::centered_band(
            image_size.0,
            image_size.1,
            self.options.fallback_margin_px,
        );
        tracing::warn!(
            surface_w = region.width,
            surface_h = region.height,
            margin = self.options.fallback_margin_px,
            "Surface region unusable, cropping window margins instead"
        );

        if band.is_empty() {
            image_rect
        } else {
            band
        }
    }
}

fn check_output_size(width: u32, height: u32) -> ReelResult<()> {
    if width == 0 || height == 0 {
        return Err(ReelError::capture(format!(
            "Invalid output size {width}x{height}"
        )));
    }
    Ok(())
}

fn filter_type(filter: ResampleFilter) -> FilterType {
    match filter {
        ResampleFilter::Nearest => FilterType::Nearest,
        ResampleFilter::Triangle => FilterType::Triangle,
        ResampleFilter::CatmullRom => FilterType::CatmullRom,
        ResampleFilter::Gaussian => FilterType::Gaussian,
        ResampleFilter::Lanczos3 => FilterType::Lanczos3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchStorage;
    use image::Rgba;
    use keyreel_scene_core::WindowHost;
    use std::sync::Arc;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    struct StaticWindow {
        image: Option<RgbaImage>,
        size: (u32, u32),
    }

    impl WindowHost for StaticWindow {
        fn grab_window(&self) -> Option<RgbaImage> {
            self.image.clone()
        }

        fn size(&self) -> (u32, u32) {
            self.size
        }
    }

    struct StaticSurface {
        bounds: SurfaceRect,
        window: Option<Arc<dyn WindowHost>>,
    }

    impl RenderSurface for StaticSurface {
        fn bounds_in_window(&self) -> SurfaceRect {
            self.bounds
        }

        fn window(&self) -> Option<Arc<dyn WindowHost>> {
            self.window.clone()
        }
    }

    /// 400x300 blue window with a red rectangle at the given pixel region.
    fn window_image(red: PixelRect) -> RgbaImage {
        RgbaImage::from_fn(400, 300, |x, y| {
            let (x, y) = (x as i32, y as i32);
            if x >= red.x && x < red.x + red.width && y >= red.y && y < red.y + red.height {
                RED
            } else {
                BLUE
            }
        })
    }

    fn surface(bounds: SurfaceRect, image: Option<RgbaImage>, size: (u32, u32)) -> StaticSurface {
        StaticSurface {
            bounds,
            window: Some(Arc::new(StaticWindow { image, size })),
        }
    }

    #[test]
    fn test_capture_crops_to_surface_and_scales() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchStorage::new(root.path(), "t").acquire().unwrap();
        let red = PixelRect::new(100, 50, 200, 150);
        let surface = surface(
            SurfaceRect::new(100.0, 50.0, 200.0, 150.0),
            Some(window_image(red)),
            (400, 300),
        );

        let frame = FrameCapture::default()
            .capture(&surface, 3, 64, 48, &scratch)
            .unwrap();

        assert_eq!(frame.path, scratch.path().join("000003.png"));
        assert_eq!(frame.region, red);

        let written = image::open(&frame.path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (64, 48));
        assert_eq!(*written.get_pixel(32, 24), RED);
    }

    #[test]
    fn test_grab_then_write_to_explicit_path() {
        let root = tempfile::tempdir().unwrap();
        let red = PixelRect::new(100, 50, 200, 100);
        let surface = surface(
            SurfaceRect::new(100.0, 50.0, 200.0, 100.0),
            Some(window_image(red)),
            (400, 300),
        );
        let capture = FrameCapture::default();

        let grab = capture.grab(&surface).unwrap();
        assert_eq!(grab.region, red);
        assert_eq!(grab.image.dimensions(), (400, 300));

        let path = root.path().join("frame.png");
        let frame = capture.write_frame(grab.clone(), 7, 20, 10, path.clone()).unwrap();
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.path, path);
        let written = image::open(&path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (20, 10));
        let px = written.get_pixel(10, 5);
        assert!(px[0] > 200 && px[2] < 50);

        assert!(capture.write_frame(grab, 8, 0, 10, root.path().join("x.png")).is_err());
        assert!(!root.path().join("x.png").exists());
    }

    #[test]
    fn test_capture_ignores_aspect_ratio() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchStorage::new(root.path(), "t").acquire().unwrap();
        let surface = surface(
            SurfaceRect::new(0.0, 0.0, 400.0, 300.0),
            Some(window_image(PixelRect::EMPTY)),
            (400, 300),
        );

        let frame = FrameCapture::default()
            .capture(&surface, 0, 100, 20, &scratch)
            .unwrap();
        let written = image::open(&frame.path).unwrap();
        assert_eq!((written.width(), written.height()), (100, 20));
    }

    #[test]
    fn test_region_scales_for_dense_window_images() {
        let capture = FrameCapture::default();
        let region = capture.capture_region(
            SurfaceRect::new(10.0, 20.0, 100.0, 80.0),
            (200, 150),
            (400, 300),
        );
        assert_eq!(region, PixelRect::new(20, 40, 200, 160));
    }

    #[test]
    fn test_region_clips_to_window() {
        let capture = FrameCapture::default();
        let region = capture.capture_region(
            SurfaceRect::new(300.0, -10.0, 500.0, 200.0),
            (400, 300),
            (400, 300),
        );
        assert_eq!(region, PixelRect::new(300, 0, 100, 190));
    }

    #[test]
    fn test_small_region_falls_back_to_band() {
        let capture = FrameCapture::default();
        let region = capture.capture_region(
            SurfaceRect::new(10.0, 10.0, 40.0, 200.0),
            (400, 300),
            (400, 300),
        );
        assert_eq!(region, PixelRect::new(0, 60, 400, 180));
    }

    #[test]
    fn test_offscreen_region_falls_back_to_band() {
        let capture = FrameCapture::default();
        let region = capture.capture_region(
            SurfaceRect::new(1000.0, 1000.0, 300.0, 300.0),
            (400, 300),
            (400, 300),
        );
        assert_eq!(region, PixelRect::new(0, 60, 400, 180));
    }

    #[test]
    fn test_tiny_window_uses_whole_image() {
        let capture = FrameCapture::default();
        let region = capture.capture_region(SurfaceRect::new(0.0, 0.0, 0.0, 0.0), (80, 100), (80, 100));
        assert_eq!(region, PixelRect::from_size(80, 100));
    }

    #[test]
    fn test_fallback_capture_skips_chrome() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchStorage::new(root.path(), "t").acquire().unwrap();
        let red = PixelRect::new(0, 60, 400, 180);
        let surface = surface(
            SurfaceRect::new(0.0, 0.0, 0.0, 0.0),
            Some(window_image(red)),
            (400, 300),
        );

        let frame = FrameCapture::default()
            .capture(&surface, 0, 40, 30, &scratch)
            .unwrap();
        assert_eq!(frame.region, red);
        let written = image::open(&frame.path).unwrap().to_rgba8();
        assert_eq!(*written.get_pixel(20, 15), RED);
    }

    #[test]
    fn test_failed_grab_is_capture_error() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchStorage::new(root.path(), "t").acquire().unwrap();
        let surface = surface(SurfaceRect::new(0.0, 0.0, 400.0, 300.0), None, (400, 300));

        let err = FrameCapture::default()
            .capture(&surface, 0, 64, 48, &scratch)
            .unwrap_err();
        assert!(matches!(err, ReelError::Capture { .. }));
        assert_eq!(scratch.frame_count().unwrap(), 0);
    }

    #[test]
    fn test_empty_grab_is_capture_error() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchStorage::new(root.path(), "t").acquire().unwrap();
        let surface = surface(
            SurfaceRect::new(0.0, 0.0, 400.0, 300.0),
            Some(RgbaImage::new(0, 0)),
            (400, 300),
        );

        let err = FrameCapture::default()
            .capture(&surface, 0, 64, 48, &scratch)
            .unwrap_err();
        assert!(matches!(err, ReelError::Capture { .. }));
    }

    #[test]
    fn test_detached_surface_is_capture_error() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchStorage::new(root.path(), "t").acquire().unwrap();
        let surface = StaticSurface {
            bounds: SurfaceRect::new(0.0, 0.0, 400.0, 300.0),
            window: None,
        };

        let err = FrameCapture::default()
            .capture(&surface, 0, 64, 48, &scratch)
            .unwrap_err();
        assert!(matches!(err, ReelError::Capture { .. }));
    }
}
