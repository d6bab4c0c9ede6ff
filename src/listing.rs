//! Parsing of HTML directory listing pages
//!
//! Autoindex pages (Apache, nginx, lighttpd) wrap their entries in a `<pre>`
//! block, or a `<table>` when fancy indexing is on. Every anchor inside that
//! block is a candidate child; only links that resolve strictly beneath the
//! listed directory are kept, which drops the `../` parent link as well as
//! column-sort links like `?C=N;O=D`.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static PRE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre\b[^>]*>(.*?)</pre\s*>").expect("valid regex"));

static TABLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").expect("valid regex"));

static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("valid regex")
});

/// Locate the listing block of a page
///
/// Returns `None` when the page has neither a `<pre>` nor a `<table>`.
pub fn listing_block(html: &str) -> Option<&str> {
    PRE_BLOCK
        .captures(html)
        .or_else(|| TABLE_BLOCK.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Raw `href` values of every anchor in `block`, entities decoded, in page order
pub fn extract_hrefs(block: &str) -> Vec<String> {
    ANCHOR_HREF
        .captures_iter(block)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| decode_entities(m.as_str().trim()))
        .collect()
}

/// Absolute URLs of the children listed on the page for directory `dir`
///
/// `dir` must be a directory URL (path ending in `/`). Links outside the
/// directory, links with a query string, and the directory itself are
/// dropped. An empty vector means an empty directory or an unrecognised
/// page shape.
pub fn child_links(dir: &Url, html: &str) -> Vec<Url> {
    let Some(block) = listing_block(html) else {
        log::debug!("No listing block in {}, treating as empty directory", dir);
        return Vec::new();
    };

    let mut children = Vec::new();
    for href in extract_hrefs(block) {
        if href.is_empty() {
            continue;
        }

        let mut child = match dir.join(&href) {
            Ok(url) => url,
            Err(e) => {
                log::debug!("Skipping unresolvable href '{}' on {}: {}", href, dir, e);
                continue;
            }
        };
        child.set_fragment(None);

        if is_strict_child(dir, &child) {
            children.push(child);
        } else {
            log::trace!("Dropping non-child link {} on {}", child, dir);
        }
    }

    children
}

/// True when the URL names a directory rather than a file
pub fn is_directory(url: &Url) -> bool {
    url.path().ends_with('/')
}

fn is_strict_child(dir: &Url, candidate: &Url) -> bool {
    candidate.query().is_none()
        && candidate.scheme() == dir.scheme()
        && candidate.host_str() == dir.host_str()
        && candidate.port_or_known_default() == dir.port_or_known_default()
        && candidate.path().len() > dir.path().len()
        && candidate.path().starts_with(dir.path())
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const APACHE_PAGE: &str = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<html>
 <head><title>Index of /public/Books</title></head>
 <body>
<h1>Index of /public/Books</h1>
<pre><a href="?C=N;O=D">Name</a>  <a href="?C=M;O=A">Last modified</a>
<hr><a href="../">../</a>
<a href="Calibre%20Library/">Calibre Library/</a>      18-Apr-2020 10:01    -
<a href="a.epub">a.epub</a>                  18-Apr-2020 10:01  312K
<a href='Tom &amp; Jerry.pdf'>Tom &amp; Jerry.pdf</a>  18-Apr-2020 10:01  1.2M
</pre><hr></body></html>"#;

    fn dir(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_extracts_children_in_page_order() {
        let base = dir("https://h/public/Books/");
        let links: Vec<String> = child_links(&base, APACHE_PAGE)
            .into_iter()
            .map(|u| u.to_string())
            .collect();

        assert_eq!(
            links,
            vec![
                "https://h/public/Books/Calibre%20Library/",
                "https://h/public/Books/a.epub",
                "https://h/public/Books/Tom%20&%20Jerry.pdf",
            ]
        );
    }

    #[test]
    fn test_drops_parent_link() {
        let base = dir("http://h/root/");
        let page = r#"<pre><a href="../">Parent Directory</a><a href="x.pdf">x.pdf</a></pre>"#;
        let links = child_links(&base, page);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_str(), "http://h/root/x.pdf");
    }

    #[test]
    fn test_drops_foreign_and_absolute_ancestor_links() {
        let base = dir("http://h/root/sub/");
        let page = r##"<pre>
<a href="/root/">up</a>
<a href="http://elsewhere/file.pdf">mirror</a>
<a href="/root/sub/deep/">deep/</a>
<a href="#top">top</a>
</pre>"##;
        let links: Vec<String> = child_links(&base, page).into_iter().map(|u| u.to_string()).collect();
        assert_eq!(links, vec!["http://h/root/sub/deep/"]);
    }

    #[test]
    fn test_no_listing_block() {
        let base = dir("http://h/root/");
        assert!(child_links(&base, "<html><body>Forbidden</body></html>").is_empty());
        assert!(listing_block("<p>nothing</p>").is_none());
    }

    #[test]
    fn test_table_listing_fallback() {
        let base = dir("http://h/root/");
        let page = r#"<table>
<tr><td><a href="/">Parent Directory</a></td></tr>
<tr><td><a href="book.mobi">book.mobi</a></td></tr>
</table>"#;
        let links = child_links(&base, page);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_str(), "http://h/root/book.mobi");
    }

    #[test]
    fn test_pre_preferred_over_table() {
        let page = r#"<table><a href="t.pdf">t</a></table><pre><a href="p.pdf">p</a></pre>"#;
        let hrefs = extract_hrefs(listing_block(page).unwrap());
        assert_eq!(hrefs, vec!["p.pdf"]);
    }

    #[test]
    fn test_is_directory() {
        assert!(is_directory(&dir("http://h/root/sub/")));
        assert!(!is_directory(&dir("http://h/root/sub/a.epub")));
    }
}
