//! A scene host backed by a directory of still images.
//!
//! Each `<id>.png` / `<id>.jpg` file is one keyframe. The current keyframe is
//! shown in a simulated window with chrome bands above and below it, and a
//! timeline strip overlaid on the bottom of the scene until overlays are
//! hidden.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use image::{imageops, Rgba, RgbaImage};
use keyreel_common::error::ReelResult;
use keyreel_scene_core::{KeyframeId, KeyframeSource, RenderSurface, SurfaceRect, WindowHost};

const CHROME_COLOR: Rgba<u8> = Rgba([32, 32, 36, 255]);
const TIMELINE_COLOR: Rgba<u8> = Rgba([200, 60, 60, 255]);
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Keyframes read from a directory, rendered into a [`SceneWindow`].
pub struct StillFrameScene {
    frames: BTreeMap<KeyframeId, PathBuf>,
    window: Arc<SceneWindow>,
}

/// Simulated host window: chrome, scene, chrome.
pub struct SceneWindow {
    scene_width: u32,
    scene_height: u32,
    chrome: u32,
    current: Mutex<Option<RgbaImage>>,
    timeline_visible: AtomicBool,
}

impl StillFrameScene {
    /// Scan `dir` for keyframe images. The first keyframe's dimensions fix
    /// the scene size.
    pub fn open(dir: &Path, chrome: u32) -> anyhow::Result<Self> {
        let mut frames = BTreeMap::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read scene directory {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if let Some(id) = keyframe_id_for(&path) {
                if let Some(previous) = frames.insert(id, path.clone()) {
                    tracing::warn!(
                        keyframe = %id,
                        kept = %path.display(),
                        ignored = %previous.display(),
                        "Duplicate keyframe image"
                    );
                }
            }
        }

        let (scene_width, scene_height) = match frames.values().next() {
            Some(first) => image::image_dimensions(first)
                .with_context(|| format!("Failed to read {}", first.display()))?,
            None => (1, 1),
        };

        tracing::debug!(
            dir = %dir.display(),
            keyframes = frames.len(),
            scene_width,
            scene_height,
            "Opened still-frame scene"
        );

        Ok(Self {
            frames,
            window: Arc::new(SceneWindow {
                scene_width,
                scene_height,
                chrome,
                current: Mutex::new(None),
                timeline_visible: AtomicBool::new(true),
            }),
        })
    }

    pub fn keyframe_count(&self) -> usize {
        self.frames.len()
    }

    pub fn scene_size(&self) -> (u32, u32) {
        (self.window.scene_width, self.window.scene_height)
    }
}

impl KeyframeSource for StillFrameScene {
    fn keyframe_ids(&self) -> ReelResult<Vec<KeyframeId>> {
        Ok(self.frames.keys().copied().collect())
    }

    fn load_keyframe(&self, id: KeyframeId) -> bool {
        let Some(path) = self.frames.get(&id) else {
            return false;
        };
        match image::open(path) {
            Ok(img) => {
                let mut rgba = img.to_rgba8();
                if rgba.dimensions() != self.scene_size() {
                    rgba = imageops::resize(
                        &rgba,
                        self.window.scene_width,
                        self.window.scene_height,
                        imageops::FilterType::Triangle,
                    );
                }
                *self
                    .window
                    .current
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(rgba);
                true
            }
            Err(e) => {
                tracing::warn!(keyframe = %id, path = %path.display(), error = %e, "Failed to load keyframe image");
                false
            }
        }
    }
}

impl RenderSurface for StillFrameScene {
    fn bounds_in_window(&self) -> SurfaceRect {
        SurfaceRect::new(
            0.0,
            self.window.chrome as f64,
            self.window.scene_width as f64,
            self.window.scene_height as f64,
        )
    }

    fn window(&self) -> Option<Arc<dyn WindowHost>> {
        Some(self.window.clone() as Arc<dyn WindowHost>)
    }

    fn set_overlays_hidden(&self, hidden: bool) -> bool {
        self.window.timeline_visible.store(!hidden, Ordering::SeqCst);
        true
    }
}

impl WindowHost for SceneWindow {
    fn grab_window(&self) -> Option<RgbaImage> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let scene = current.as_ref()?;

        let (width, height) = self.size();
        let mut canvas = RgbaImage::from_pixel(width, height, CHROME_COLOR);
        imageops::replace(&mut canvas, scene, 0, self.chrome as i64);

        if self.timeline_visible.load(Ordering::SeqCst) {
            let strip = (self.scene_height / 10).max(1);
            let top = self.chrome + self.scene_height - strip;
            for y in top..top + strip {
                for x in 0..width {
                    canvas.put_pixel(x, y, TIMELINE_COLOR);
                }
            }
        }
        Some(canvas)
    }

    fn size(&self) -> (u32, u32) {
        (self.scene_width, self.scene_height + 2 * self.chrome)
    }
}

fn keyframe_id_for(path: &Path) -> Option<KeyframeId> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.parse::<i64>().ok().map(KeyframeId)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frame(dir: &Path, name: &str, color: [u8; 4]) {
        RgbaImage::from_pixel(20, 10, Rgba(color))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_keyframes_come_from_numeric_file_names() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "7.png", [255, 0, 0, 255]);
        write_frame(dir.path(), "-2.png", [0, 255, 0, 255]);
        write_frame(dir.path(), "cover.png", [0, 0, 255, 255]);
        std::fs::write(dir.path().join("3.txt"), "not an image").unwrap();

        let scene = StillFrameScene::open(dir.path(), 4).unwrap();
        assert_eq!(
            scene.keyframe_ids().unwrap(),
            vec![KeyframeId(-2), KeyframeId(7)]
        );
        assert_eq!(scene.scene_size(), (20, 10));
        assert!(!scene.load_keyframe(KeyframeId(3)));
    }

    #[test]
    fn test_window_wraps_scene_in_chrome() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "1.png", [0, 255, 0, 255]);

        let scene = StillFrameScene::open(dir.path(), 4).unwrap();
        let window = scene.window().unwrap();
        assert!(window.grab_window().is_none());

        assert!(scene.load_keyframe(KeyframeId(1)));
        assert_eq!(window.size(), (20, 18));
        assert_eq!(scene.bounds_in_window(), SurfaceRect::new(0.0, 4.0, 20.0, 10.0));

        let grabbed = window.grab_window().unwrap();
        assert_eq!(grabbed.dimensions(), (20, 18));
        assert_eq!(*grabbed.get_pixel(0, 0), CHROME_COLOR);
        assert_eq!(*grabbed.get_pixel(5, 4), Rgba([0, 255, 0, 255]));
        assert_eq!(*grabbed.get_pixel(5, 17), CHROME_COLOR);
    }

    #[test]
    fn test_hiding_overlays_removes_timeline_strip() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "1.png", [0, 255, 0, 255]);
        let scene = StillFrameScene::open(dir.path(), 4).unwrap();
        let window = scene.window().unwrap();
        scene.load_keyframe(KeyframeId(1));

        // Last scene row sits at y = 4 + 10 - 1.
        assert_eq!(*window.grab_window().unwrap().get_pixel(5, 13), TIMELINE_COLOR);

        assert!(scene.set_overlays_hidden(true));
        assert_eq!(
            *window.grab_window().unwrap().get_pixel(5, 13),
            Rgba([0, 255, 0, 255])
        );

        scene.set_overlays_hidden(false);
        assert_eq!(*window.grab_window().unwrap().get_pixel(5, 13), TIMELINE_COLOR);
    }

    #[test]
    fn test_mismatched_keyframe_is_resized_to_scene() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "1.png", [0, 255, 0, 255]);
        RgbaImage::from_pixel(40, 40, Rgba([9, 9, 9, 255]))
            .save(dir.path().join("2.png"))
            .unwrap();

        let scene = StillFrameScene::open(dir.path(), 0).unwrap();
        assert!(scene.load_keyframe(KeyframeId(2)));
        let grabbed = scene.window().unwrap().grab_window().unwrap();
        assert_eq!(grabbed.dimensions(), (20, 10));
    }
}
