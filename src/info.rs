//! Editorial pages: travel tips, island guides, and the like.

use crate::{client::ApiClient, error::ApiError};
use serde::{Deserialize, Serialize};
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPage {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
}

pub trait InfoApi {
    fn info_pages(&self) -> impl Future<Output = Result<Vec<InfoPage>, ApiError>>;

    fn info_page(&self, slug: &str) -> impl Future<Output = Result<InfoPage, ApiError>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PagesResponse {
    Pages { pages: Vec<InfoPage> },
    Bare(Vec<InfoPage>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageResponse {
    Page { page: InfoPage },
    Bare(InfoPage),
}

impl InfoApi for ApiClient {
    async fn info_pages(&self) -> Result<Vec<InfoPage>, ApiError> {
        let response: PagesResponse = self.get("/api/info").await?;
        Ok(match response {
            PagesResponse::Pages { pages } => pages,
            PagesResponse::Bare(pages) => pages,
        })
    }

    async fn info_page(&self, slug: &str) -> Result<InfoPage, ApiError> {
        let path = format!("/api/info/{slug}");
        let response: PageResponse = self.get(&path).await?;
        Ok(match response {
            PageResponse::Page { page } => page,
            PageResponse::Bare(page) => page,
        })
    }
}
