use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{Sources, str_field};
use crate::domain::ScientificName;
use crate::fetch::HttpTransport;

const FILE_NAMESPACE: &str = "6";
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonsImage {
    pub url: String,
    pub title: String,
}

impl<T: HttpTransport> Sources<T> {
    pub fn commons_search(&self, name: &ScientificName, max_images: usize) -> Vec<String> {
        if max_images == 0 {
            return Vec::new();
        }
        let search = [
            ("action", "query".to_string()),
            ("list", "search".to_string()),
            ("srsearch", format!("{name} plant")),
            ("srnamespace", FILE_NAMESPACE.to_string()),
            ("srlimit", (max_images * 2).to_string()),
            ("format", "json".to_string()),
        ];
        let titles = self
            .fetch_json("commons-search", &self.endpoints.commons, &search)
            .map(|found| search_titles(&found, max_images))
            .unwrap_or_default();
        if titles.is_empty() {
            debug!(name = %name, "no Commons files matched");
        }
        titles
    }

    pub fn commons_image_info(&self, titles: &[String], max_images: usize) -> Vec<CommonsImage> {
        if titles.is_empty() || max_images == 0 {
            return Vec::new();
        }
        let info = [
            ("action", "query".to_string()),
            ("titles", titles.join("|")),
            ("prop", "imageinfo".to_string()),
            ("iiprop", "url|mime".to_string()),
            ("format", "json".to_string()),
        ];
        self.fetch_json("commons-imageinfo", &self.endpoints.commons, &info)
            .map(|data| image_infos(&data, titles, max_images))
            .unwrap_or_default()
    }
}

pub fn search_titles(data: &Value, max: usize) -> Vec<String> {
    data.pointer("/query/search")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|hit| str_field(hit, "title"))
        .filter(|title| {
            let lower = title.to_lowercase();
            IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .take(max)
        .map(str::to_string)
        .collect()
}

// Pages keyed by a title the request did not name go last.
pub fn image_infos(data: &Value, titles: &[String], max: usize) -> Vec<CommonsImage> {
    let Some(pages) = data.pointer("/query/pages").and_then(Value::as_object) else {
        return Vec::new();
    };
    let normalized = data
        .pointer("/query/normalized")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| Some((str_field(entry, "to")?, str_field(entry, "from")?)))
        .collect::<Vec<_>>();
    let position = |title: &str| {
        let requested = normalized
            .iter()
            .find(|(to, _)| *to == title)
            .map_or(title, |(_, from)| *from);
        titles
            .iter()
            .position(|candidate| candidate == requested)
            .unwrap_or(titles.len())
    };

    let mut images = pages
        .values()
        .filter_map(|page| {
            let info = page.get("imageinfo")?.as_array()?.first()?;
            let url = str_field(info, "url")?;
            let mime = info.get("mime").and_then(Value::as_str).unwrap_or_default();
            if !mime.contains("image") {
                return None;
            }
            Some(CommonsImage {
                url: url.to_string(),
                title: str_field(page, "title").unwrap_or_default().to_string(),
            })
        })
        .collect::<Vec<_>>();
    images.sort_by_key(|image| position(&image.title));
    images.truncate(max);
    images
}
