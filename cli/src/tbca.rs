use anyhow::{Context, Result};

use tbca_core::crawl::PageFetcher;

pub const DEFAULT_BASE_URL: &str = "http://www.tbca.net.br/base-dados/composicao_alimentos.php";

pub struct TbcaClient {
    client: reqwest::Client,
    base_url: String,
    rt: tokio::runtime::Handle,
}

impl TbcaClient {
    /// Must be called from within a Tokio runtime; the handle is captured
    /// so blocking callers can drive requests.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("tbca/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            rt: tokio::runtime::Handle::current(),
        })
    }

    async fn get_html_async(&self, query: &[(&str, &str)]) -> Result<String> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?
            .error_for_status()?;

        resp.text().await.context("Failed to read response body")
    }

    pub async fn listing_async(&self, page: u32) -> Result<String> {
        let page = page.to_string();
        self.get_html_async(&[("pagina", &page)])
            .await
            .with_context(|| format!("Listing page {page}"))
    }

    pub async fn detail_async(&self, code: &str) -> Result<String> {
        self.get_html_async(&[("codigo_alimento", code)])
            .await
            .with_context(|| format!("Detail page for {code}"))
    }
}

impl PageFetcher for TbcaClient {
    fn fetch_listing(&self, page: u32) -> Result<String> {
        self.rt.block_on(self.listing_async(page))
    }

    fn fetch_detail(&self, code: &str) -> Result<String> {
        self.rt.block_on(self.detail_async(code))
    }
}
