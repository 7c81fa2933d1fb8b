use serde::{ser::Error as _, Deserialize, Serialize, Serializer};
use std::fmt;

/// A file picked by the vendor that has not been uploaded yet.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl LocalImage {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

impl fmt::Debug for LocalImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalImage")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Local(LocalImage),
    Remote { url: String },
}

/// A listing photo.
///
/// Local images only exist client-side; serializing one fails, so a listing can only
/// be sent once every image has been uploaded. Deserialized images are always remote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RemoteImage")]
pub struct Image {
    pub source: ImageSource,
    pub is_main: bool,
}

impl Image {
    pub fn local(image: LocalImage) -> Self {
        Self {
            source: ImageSource::Local(image),
            is_main: false,
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            source: ImageSource::Remote { url: url.into() },
            is_main: false,
        }
    }

    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, ImageSource::Local(_))
    }

    pub fn url(&self) -> Option<&str> {
        match &self.source {
            ImageSource::Remote { url } => Some(url),
            ImageSource::Local(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteImage {
    url: String,
    #[serde(default)]
    is_main: bool,
}

impl From<RemoteImage> for Image {
    fn from(image: RemoteImage) -> Self {
        Image {
            source: ImageSource::Remote { url: image.url },
            is_main: image.is_main,
        }
    }
}

impl Serialize for Image {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.source {
            ImageSource::Remote { url } => RemoteImage {
                url: url.clone(),
                is_main: self.is_main,
            }
            .serialize(serializer),
            ImageSource::Local(local) => Err(S::Error::custom(format!(
                "image `{}` has not been uploaded",
                local.file_name
            ))),
        }
    }
}
