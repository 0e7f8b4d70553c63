use eframe::egui::ColorImage;
use tracing::debug;

/// Widest thumbnail kept in memory; larger images are scaled down.
const MAX_WIDTH: u32 = 320;

/// Downloads and decodes the preview image advertised in a video's metadata.
/// Returns `None` when there is no URL or anything along the way fails.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    if url.is_empty() {
        return None;
    }
    // Perform a blocking HTTP GET request, returning None on any error
    let resp = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(|e| debug!("thumbnail download failed: {}", e))
        .ok()?;
    let img = image::load_from_memory(&resp)
        .map_err(|e| debug!("thumbnail decode failed: {}", e))
        .ok()?;
    let img = if img.width() > MAX_WIDTH {
        img.thumbnail(MAX_WIDTH, u32::MAX)
    } else {
        img
    }
    .to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    // Create a ColorImage from the raw RGBA bytes without premultiplying alpha
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}
