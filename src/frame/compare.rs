//! Fuzzy image comparison

/// Whether two images differ by more than `tolerance`
///
/// Compares the first `height` rows of `width` bytes each, stepping rows by
/// `vir_width`. `tolerance` is the fraction of bytes (0.0 to 1.0) allowed to
/// differ. Returns `false` when the images match within tolerance; images too
/// short for the requested geometry always differ.
pub fn compare_fuzzy(a: &[u8], b: &[u8], width: usize, vir_width: usize, height: usize, tolerance: f64) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    let needed = (height - 1) * vir_width + width;
    if vir_width < width || a.len() < needed || b.len() < needed {
        return true;
    }

    let mut mismatched = 0usize;
    for row in 0..height {
        let start = row * vir_width;
        let end = start + width;
        mismatched += a[start..end]
            .iter()
            .zip(&b[start..end])
            .filter(|(x, y)| x != y)
            .count();
    }

    let ratio = mismatched as f64 / (width * height) as f64;
    ratio > tolerance
}
