//! Image list owned by a carousel node.

use super::ModelError;
use crate::media::{embedded_size, is_embedded_binary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselImage {
    pub id: String,
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub is_uploaded: bool,
    #[serde(default)]
    pub size_bytes: u64,
}

impl CarouselImage {
    /// Builds an entry from a source, classifying it as uploaded when the
    /// source is an embedded `data:` payload.
    pub fn from_source(src: impl Into<String>, alt: impl Into<String>) -> Self {
        let src = src.into();
        let is_uploaded = is_embedded_binary(&src);
        let size_bytes = if is_uploaded { embedded_size(&src) } else { 0 };
        Self {
            id: Uuid::new_v4().to_string(),
            src,
            alt: alt.into(),
            is_uploaded,
            size_bytes,
        }
    }

    /// Bytes this image counts against the payload cap.
    pub fn counted_bytes(&self) -> u64 {
        if !self.is_uploaded {
            0
        } else if self.size_bytes > 0 {
            self.size_bytes
        } else {
            embedded_size(&self.src)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Carousel {
    images: Vec<CarouselImage>,
}

impl Carousel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_images(images: Vec<CarouselImage>) -> Self {
        Self { images }
    }

    pub fn images(&self) -> &[CarouselImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CarouselImage> {
        self.images.iter().find(|image| image.id == id)
    }

    /// Appends an image and returns its id.
    pub fn push(&mut self, image: CarouselImage) -> String {
        let id = image.id.clone();
        self.images.push(image);
        id
    }

    pub fn add_uploaded(&mut self, data_url: impl Into<String>, alt: impl Into<String>) -> String {
        self.push(CarouselImage::from_source(data_url, alt))
    }

    pub fn add_url(&mut self, url: impl Into<String>, alt: impl Into<String>) -> String {
        let mut image = CarouselImage::from_source(url, alt);
        image.is_uploaded = false;
        image.size_bytes = 0;
        self.push(image)
    }

    pub fn remove(&mut self, id: &str) -> Result<CarouselImage, ModelError> {
        let index = self.position(id)?;
        Ok(self.images.remove(index))
    }

    /// Moves the image at `from` so it ends up at index `to`.
    pub fn move_image(&mut self, from: usize, to: usize) -> Result<(), ModelError> {
        if from >= self.images.len() || to >= self.images.len() {
            return Err(ModelError::IndexOutOfBounds);
        }
        let image = self.images.remove(from);
        self.images.insert(to, image);
        Ok(())
    }

    pub fn set_alt(&mut self, id: &str, alt: impl Into<String>) -> Result<(), ModelError> {
        let index = self.position(id)?;
        self.images[index].alt = alt.into();
        Ok(())
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.images.iter().map(CarouselImage::counted_bytes).sum()
    }

    /// Same images, ignoring their ids.
    pub(crate) fn same_content(&self, other: &Carousel) -> bool {
        self.images.len() == other.images.len()
            && self.images.iter().zip(&other.images).all(|(a, b)| {
                a.src == b.src
                    && a.alt == b.alt
                    && a.is_uploaded == b.is_uploaded
                    && a.size_bytes == b.size_bytes
            })
    }

    fn position(&self, id: &str) -> Result<usize, ModelError> {
        self.images
            .iter()
            .position(|image| image.id == id)
            .ok_or_else(|| ModelError::CarouselImageNotFound(id.to_string()))
    }
}
