// src/services/view/host.rs

//! Host page with named mount points.

use regex::Regex;
use scraper::{Html, Selector};

use super::{Fragment, Mount};
use crate::error::{AppError, Result};

const BUILTIN_HOST: &str = include_str!("../../../data/host.html");

/// An HTML document whose mount elements receive rendered fragments.
#[derive(Debug, Clone)]
pub struct HostPage {
    html: String,
}

impl HostPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    /// Page shipped with the crate.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_HOST)
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn has_mount(&self, mount: Mount) -> Result<bool> {
        let document = Html::parse_document(&self.html);
        let selector = mount_selector(mount)?;
        Ok(document.select(&selector).next().is_some())
    }

    /// Mounts present in the document.
    pub fn mounts(&self) -> Result<Vec<Mount>> {
        let document = Html::parse_document(&self.html);
        let mut found = Vec::new();
        for mount in Mount::ALL {
            if document.select(&mount_selector(mount)?).next().is_some() {
                found.push(mount);
            }
        }
        Ok(found)
    }

    /// Replace the content of the fragment's mount element.
    ///
    /// Returns `false` when the page has no such mount.
    pub fn inject(&mut self, fragment: &Fragment) -> Result<bool> {
        if !self.has_mount(fragment.mount)? {
            log::debug!("Host page has no #{} mount, skipping", fragment.mount.id());
            return Ok(false);
        }

        let (content_start, content_end) = locate_content(&self.html, fragment.mount.id())?
            .ok_or_else(|| {
                AppError::template(format!(
                    "cannot locate opening tag of #{}",
                    fragment.mount.id()
                ))
            })?;
        self.html
            .replace_range(content_start..content_end, &fragment.html);
        Ok(true)
    }

    /// Inject every fragment, returning how many found a mount.
    pub fn inject_all(&mut self, fragments: &[Fragment]) -> Result<usize> {
        let mut injected = 0;
        for fragment in fragments {
            if self.inject(fragment)? {
                injected += 1;
            }
        }
        log::debug!("Injected {}/{} fragments", injected, fragments.len());
        Ok(injected)
    }
}

fn mount_selector(mount: Mount) -> Result<Selector> {
    let css = format!("#{}", mount.id());
    Selector::parse(&css).map_err(|e| AppError::template(format!("{css}: {e:?}")))
}

/// Byte range of the element content for `id`.
///
/// Markup inside comments and raw-text elements is ignored, matching what
/// the parsed document sees. Elements without a closing tag get an empty
/// range right after the opening tag.
fn locate_content(html: &str, id: &str) -> Result<Option<(usize, usize)>> {
    let hidden = hidden_ranges(html)?;
    let is_hidden = |pos: usize| hidden.iter().any(|&(from, to)| from < pos && pos < to);

    let id = regex::escape(id);
    let opening = Regex::new(&format!(
        r#"<([A-Za-z][A-Za-z0-9-]*)\b[^>]*\sid\s*=\s*(?:"{id}"|'{id}'|{id}\b)[^>]*>"#
    ))?;
    let Some(caps) = opening
        .captures_iter(html)
        .find(|c| c.get(0).is_some_and(|m| !is_hidden(m.start())))
    else {
        return Ok(None);
    };
    let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
        return Ok(None);
    };
    let start = whole.end();
    if whole.as_str().ends_with("/>") {
        return Ok(Some((start, start)));
    }

    let nested = Regex::new(&format!(r"(?i)<(/?){}\b[^>]*>", regex::escape(tag.as_str())))?;
    let mut depth = 1usize;
    for m in nested.captures_iter(&html[start..]) {
        let Some(all) = m.get(0) else { continue };
        if is_hidden(start + all.start()) {
            continue;
        }
        let closing = m.get(1).is_some_and(|g| !g.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return Ok(Some((start, start + all.start())));
            }
        } else if !all.as_str().ends_with("/>") {
            depth += 1;
        }
    }
    Ok(Some((start, start)))
}

/// Byte ranges of comments and `script`/`style` bodies.
fn hidden_ranges(html: &str) -> Result<Vec<(usize, usize)>> {
    let hidden = Regex::new(
        r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>",
    )?;
    Ok(hidden.find_iter(html).map(|m| (m.start(), m.end())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div id="tripInfo"></div>
<div id="itineraryList"><div class="loading">加载中...</div></div>
<select id="locationSelect"></select>
<span id="originTime">--:--:--</span>
<div data-id="tipsList"></div>
</body></html>"#;

    #[test]
    fn test_mounts_detected() {
        let page = HostPage::new(PAGE);
        let mounts = page.mounts().unwrap();
        assert_eq!(
            mounts,
            vec![
                Mount::ItineraryList,
                Mount::LocationSelect,
                Mount::TripInfo,
                Mount::OriginTime
            ]
        );
        assert!(!page.has_mount(Mount::TipsList).unwrap());
    }

    #[test]
    fn test_inject_replaces_nested_content() {
        let mut page = HostPage::new(PAGE);
        let fragment = Fragment::new(Mount::ItineraryList, "<p>day 1</p>".to_string());
        assert!(page.inject(&fragment).unwrap());
        assert!(page.as_str().contains(r#"<div id="itineraryList"><p>day 1</p></div>"#));
        assert!(!page.as_str().contains("加载中"));
    }

    #[test]
    fn test_inject_replaces_placeholder_text() {
        let mut page = HostPage::new(PAGE);
        page.inject(&Fragment::new(Mount::OriginTime, "08:35:00".to_string()))
            .unwrap();
        assert!(page.as_str().contains(r#"<span id="originTime">08:35:00</span>"#));
    }

    #[test]
    fn test_missing_mount_is_skipped() {
        let mut page = HostPage::new(PAGE);
        let fragments = vec![
            Fragment::new(Mount::TipsList, "<p>tip</p>".to_string()),
            Fragment::new(Mount::TripInfo, "<span>VN4D</span>".to_string()),
        ];
        assert_eq!(page.inject_all(&fragments).unwrap(), 1);
        assert!(page.as_str().contains(r#"<div data-id="tipsList"></div>"#));
    }

    #[test]
    fn test_commented_and_scripted_ids_are_ignored() {
        let page = r#"<html><body>
<!-- <div id="tipsList">old</div> -->
<script>var tpl = '<div id="tipsList"></div>';</script>
<div id="tipsList"><!-- </div> --><p>placeholder</p></div>
</body></html>"#;
        let mut page = HostPage::new(page);
        assert!(page.inject(&Fragment::new(Mount::TipsList, "<p>tip</p>".to_string())).unwrap());
        let html = page.as_str();
        assert!(html.contains(r#"<!-- <div id="tipsList">old</div> -->"#));
        assert!(html.contains(r#"var tpl = '<div id="tipsList"></div>';"#));
        assert!(html.contains(r#"<div id="tipsList"><p>tip</p></div>"#));
    }

    #[test]
    fn test_commented_mount_only_is_missing() {
        let mut page = HostPage::new(r#"<body><!-- <div id="tipsList"></div> --></body>"#);
        assert!(!page.has_mount(Mount::TipsList).unwrap());
        assert!(!page.inject(&Fragment::new(Mount::TipsList, "x".to_string())).unwrap());
    }

    #[test]
    fn test_builtin_page_has_every_panel() {
        let mounts = HostPage::builtin().mounts().unwrap();
        for mount in [
            Mount::Map,
            Mount::ItineraryList,
            Mount::TipsList,
            Mount::FlightInfo,
            Mount::HotelList,
            Mount::DetailSchedule,
            Mount::EmergencyContacts,
            Mount::ExchangeRate,
            Mount::DataVersion,
            Mount::LocationSelect,
            Mount::LikeButton,
            Mount::TripInfo,
        ] {
            assert!(mounts.contains(&mount), "missing #{}", mount.id());
        }
    }
}
