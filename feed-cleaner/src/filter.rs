use crate::document::{FeedDocument, NodeId};
use crate::types::{Result, TEASER_TAG};
use std::collections::HashSet;
use tracing::{debug, info};

/// Parses `raw` and strips every teaser-tagged `image` entry from it.
///
/// Malformed XML fails before anything is removed. Returns the cleaned tree and
/// how many entries were taken out.
pub fn filter(raw: &[u8]) -> Result<(FeedDocument, usize)> {
    let mut document = FeedDocument::parse(raw)?;
    let removed = remove_teaser_images(&mut document);
    Ok((document, removed))
}

/// Detaches every `image` element carrying the teaser tag and returns the count.
///
/// Candidates are collected up front, so an image nested inside another removed
/// image is still visited once and counted. An image without a parent stays put.
pub fn remove_teaser_images(document: &mut FeedDocument) -> usize {
    let images = document.elements_named("image");
    let mut removed = 0;

    for image in images {
        if !is_teaser_image(document, image) {
            continue;
        }

        if document.detach(image) {
            debug!(
                "Removed teaser image{}",
                document
                    .attribute(image, "id")
                    .map(|id| format!(" (id {})", id))
                    .unwrap_or_default()
            );
            removed += 1;
        }
    }

    info!("Removed {} teaser images from feed", removed);
    removed
}

/// True when one of the direct `tag` children reads exactly `Teaser (Portale)` once trimmed.
pub fn is_teaser_image(document: &FeedDocument, image: NodeId) -> bool {
    image_tags(document, image).contains(TEASER_TAG)
}

fn image_tags(document: &FeedDocument, image: NodeId) -> HashSet<String> {
    document
        .child_elements(image)
        .filter(|&child| document.name(child) == Some("tag"))
        .filter_map(|tag| document.text(tag))
        .map(|text| text.trim().to_string())
        .collect()
}
