use tablestitch_core::{PageLayout, ScanDetection};

/// Guess whether a document is a scan: little extractable text and pages
/// mostly covered by images.
///
/// Only the first `sample_pages` of `pages` are looked at. Pages with no
/// area are skipped; if nothing is left to sample the answer is `false`.
pub fn is_scanned_document(pages: &[PageLayout], config: &ScanDetection) -> bool {
    let mut densities = Vec::new();
    let mut coverages = Vec::new();

    for page in pages.iter().take(config.sample_pages) {
        let area = page.area();
        if !(area.is_finite() && area > 0.0) {
            continue;
        }
        densities.push(page.text_char_count() as f64 / area);
        let image_area: f64 = page.image_blocks().map(|b| b.area()).sum();
        coverages.push(image_area / area);
    }

    if densities.is_empty() {
        return false;
    }

    let avg_density = densities.iter().sum::<f64>() / densities.len() as f64;
    let avg_coverage = coverages.iter().sum::<f64>() / coverages.len() as f64;
    let scanned = avg_density < config.max_text_density && avg_coverage > config.min_image_coverage;

    tracing::debug!(
        sampled = densities.len(),
        density = avg_density,
        coverage = avg_coverage,
        scanned,
        "scanned document check"
    );
    scanned
}
