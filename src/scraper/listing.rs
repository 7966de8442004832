//! Episode-list pagination: walks `?spage=1..=N` of the listing page and collects
//! every episode link in listing order.

use super::{parse_selector, DocumentSource, ScraperError};
use crate::model::{links_from_urls, EpisodeLink};
use scraper::Html;

/// One row of the episode table.
const EPISODE_ROW_SELECTOR: &str = ".item-subject";
/// Title span on the listing page (first div of the content wrapper).
const TITLE_SELECTOR: &str = "#content_wrapper > div:nth-of-type(1) > span";

/// Listing URL without query string or fragment.
pub fn canonical_listing_url(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// URL of page `page` (1-based) of the listing.
pub fn listing_page_url(listing_url: &str, page: u32) -> String {
    format!("{}?spage={}", listing_url, page)
}

/// Fetch pages `1..=page_count` and return all episode links, page order then
/// document order. A page that fails contributes nothing; the rest still load.
pub fn collect_episode_links<S: DocumentSource + ?Sized>(
    source: &mut S,
    listing_url: &str,
    page_count: u32,
) -> Result<Vec<EpisodeLink>, ScraperError> {
    let row_sel = parse_selector(EPISODE_ROW_SELECTOR)?;
    let mut urls: Vec<String> = Vec::new();
    for page in 1..=page_count {
        let url = listing_page_url(listing_url, page);
        let html = match source.fetch_html(&url) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(page, error = %e, "listing page failed; continuing");
                continue;
            }
        };
        let doc = Html::parse_document(&html);
        let before = urls.len();
        urls.extend(
            doc.select(&row_sel)
                .filter_map(|el| el.value().attr("href"))
                .map(String::from),
        );
        tracing::debug!(page, links = urls.len() - before, "listing page parsed");
    }
    Ok(links_from_urls(urls))
}

/// Novel title from the listing page HTML, if present.
pub fn extract_title(html: &str) -> Result<Option<String>, ScraperError> {
    let title_sel = parse_selector(TITLE_SELECTOR)?;
    let doc = Html::parse_document(html);
    Ok(doc
        .select(&title_sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty()))
}
