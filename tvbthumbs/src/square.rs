use image::{DynamicImage, imageops::FilterType};

/// Fits `img` into a `size`×`size` square, centered on a transparent
/// background. The aspect ratio is kept.
pub fn ensure_square(img: &DynamicImage, size: u32) -> DynamicImage {
    let size = size.max(1);
    let (width, height) = (img.width().max(1), img.height().max(1));

    let scale = size as f32 / width.max(height) as f32;
    let new_width = ((width as f32 * scale) as u32).clamp(1, size);
    let new_height = ((height as f32 * scale) as u32).clamp(1, size);

    let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);

    let mut square = DynamicImage::new_rgba8(size, size);
    let x = (size - new_width) / 2;
    let y = (size - new_height) / 2;
    image::imageops::overlay(&mut square, &resized, x.into(), y.into());

    square
}
