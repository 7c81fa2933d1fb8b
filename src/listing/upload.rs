use super::{ImageSource, LocalImage, ServiceListing};
use crate::{client::ApiClient, error::ApiError};
use futures::future::try_join_all;
use reqwest::multipart;
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Image upload failed: {0}")]
    Upload(#[from] ApiError),
    #[error("{0} image(s) could not be uploaded")]
    Unprocessed(usize),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Upload(e) => format!("Image upload failed: {}", e.user_message()),
            UploadError::Unprocessed(_) => self.to_string(),
        }
    }
}

/// Uploads one picked file and returns its hosted URL.
pub trait ImageUploader {
    fn upload_image(&self, image: &LocalImage) -> impl Future<Output = Result<String, ApiError>>;
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(alias = "imageUrl")]
    url: String,
}

impl ImageUploader for ApiClient {
    async fn upload_image(&self, image: &LocalImage) -> Result<String, ApiError> {
        let part = multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let form = multipart::Form::new().part("image", part);
        let response: UploadResponse = self.upload("/api/upload/image", form).await?;
        Ok(response.url)
    }
}

/// Uploads every local image of `listing` and returns a copy with each replaced by its URL.
///
/// Uploads run concurrently. URLs are matched to images by call order, which follows the
/// [`ServiceListing::images`] walk. Any failed upload, or a local image left without a
/// usable URL, fails the whole operation and `listing` is left as it was. Images that
/// did upload stay on the server.
pub async fn reconcile_images<U>(
    listing: &ServiceListing,
    uploader: &U,
) -> Result<ServiceListing, UploadError>
where
    U: ImageUploader,
{
    let uploads = listing.images().into_iter().filter_map(|image| match &image.source {
        ImageSource::Local(local) => Some(uploader.upload_image(local)),
        ImageSource::Remote { .. } => None,
    });
    let urls = try_join_all(uploads).await.map_err(|e| {
        #[cfg(feature = "tracing")]
        tracing::warn!("Listing image upload failed: {e}");
        UploadError::from(e)
    })?;

    let mut staged = listing.clone();
    let mut urls = urls.into_iter();
    for image in staged.images_mut().into_iter().filter(|image| image.is_local()) {
        match urls.next() {
            Some(url) if !url.trim().is_empty() => image.source = ImageSource::Remote { url },
            _ => {}
        }
    }

    match staged.local_image_count() {
        0 => Ok(staged),
        remaining => Err(UploadError::Unprocessed(remaining)),
    }
}
