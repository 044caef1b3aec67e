//! THREDDS catalog scraping.
//!
//! A THREDDS Data Server describes its holdings with `catalog.xml` documents in
//! the InvCatalog v1.0 namespace. Leaf files are `dataset` elements that carry a
//! `dataSize` child; collections and directory nodes do not. Each file's
//! `urlPath` is served over HTTP below `/thredds/fileServer/`.

use crate::error::{CatalogError, Error, Result};
use crate::utils::{USER_AGENT, build_http_client};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use regex::Regex;
use std::iter::FusedIterator;
use std::time::Duration;
use tracing::debug;

/// XML namespace of THREDDS catalogs
pub const THREDDS_NAMESPACE: &str =
    "http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0";

/// Pattern used when the caller gives none
pub const MATCH_ALL: &str = ".*";

const CATALOG_SEGMENT: &str = "/thredds/catalog/";
const FILE_SERVER_SEGMENT: &str = "/thredds/fileServer/";

/// Timeout for fetching a catalog document
const CATALOG_FETCH_TIMEOUT_SECS: u64 = 30;

/// A file entry of a catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogDataset {
    /// `name` attribute (empty if absent)
    pub name: String,
    /// `urlPath` attribute, relative to the file server root
    ///
    /// Only required for datasets that pass the name filter.
    pub url_path: Option<String>,
}

/// Download URLs of the catalog files whose name matches the filter
///
/// Filtering happens while iterating. The iterator owns the parsed catalog and
/// can be consumed once.
#[derive(Debug)]
pub struct CatalogUrls {
    file_server: String,
    pattern: Regex,
    datasets: std::vec::IntoIter<CatalogDataset>,
}

impl CatalogUrls {
    /// Build the URL iterator for `datasets` parsed from `catalog_url`
    ///
    /// `pattern` must match at the start of a dataset's name (like an anchored
    /// regex); `None` matches every name.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPattern`] if `pattern` does not compile
    /// - [`CatalogError::MissingUrlPath`] if a dataset passing the filter has no `urlPath`
    pub fn new(
        catalog_url: &str,
        datasets: Vec<CatalogDataset>,
        pattern: Option<&str>,
    ) -> Result<Self> {
        let pattern = compile_name_pattern(pattern.unwrap_or(MATCH_ALL))?;
        Self::from_parts(file_server_url(catalog_url), pattern, datasets)
    }

    fn from_parts(
        file_server: String,
        pattern: Regex,
        datasets: Vec<CatalogDataset>,
    ) -> Result<Self> {
        if let Some(orphan) = datasets
            .iter()
            .find(|d| d.url_path.is_none() && pattern.is_match(&d.name))
        {
            return Err(CatalogError::MissingUrlPath {
                name: orphan.name.clone(),
            }
            .into());
        }

        Ok(Self {
            file_server,
            pattern,
            datasets: datasets.into_iter(),
        })
    }
}

impl Iterator for CatalogUrls {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for dataset in self.datasets.by_ref() {
            if self.pattern.is_match(&dataset.name)
                && let Some(url_path) = dataset.url_path
            {
                return Some(format!("{}{}", self.file_server, url_path));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.datasets.len()))
    }
}

impl FusedIterator for CatalogUrls {}

/// Fetch a THREDDS catalog and list the download URLs of its matching files
///
/// This is an `async fn`; call it from a tokio runtime (or wrap it in
/// `Runtime::block_on` for a blocking caller).
///
/// # Errors
///
/// - [`Error::InvalidPattern`] if `file_regex` does not compile
/// - [`Error::Network`] if the catalog cannot be fetched
/// - [`Error::Catalog`] for a non-success status, a document that cannot be
///   parsed, or a matching dataset without `urlPath`
///
/// # Example
///
/// ```no_run
/// use jupyterlab_sdk::{DownloadRequest, extract_tds_catalog, smart_download};
///
/// # async fn example() -> jupyterlab_sdk::Result<()> {
/// let urls = extract_tds_catalog(
///     "https://tds.example/thredds/catalog/ocean/sst/catalog.xml",
///     Some(r"sst_2024\d{4}\.nc"),
/// )
/// .await?;
/// let results = smart_download(DownloadRequest::from_urls(urls, "sst"), 4, 8).await?;
/// # Ok(())
/// # }
/// ```
pub async fn extract_tds_catalog(url: &str, file_regex: Option<&str>) -> Result<CatalogUrls> {
    let http_client = build_http_client(
        reqwest::Client::builder()
            .timeout(Duration::from_secs(CATALOG_FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT),
    )?;

    extract_tds_catalog_with(&http_client, url, file_regex).await
}

/// [`extract_tds_catalog`] on a caller-provided client
pub async fn extract_tds_catalog_with(
    http_client: &reqwest::Client,
    url: &str,
    file_regex: Option<&str>,
) -> Result<CatalogUrls> {
    let pattern = compile_name_pattern(file_regex.unwrap_or(MATCH_ALL))?;

    debug!("Fetching THREDDS catalog: {}", url);
    let response = http_client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(CatalogError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        }
        .into());
    }

    let content = response.text().await?;
    let datasets = parse_catalog(&content)?;
    debug!("Catalog {} lists {} files", url, datasets.len());

    CatalogUrls::from_parts(file_server_url(url), pattern, datasets)
}

/// File server prefix for a catalog URL
///
/// Everything from the first `/thredds/catalog/` on is replaced by
/// `/thredds/fileServer/`. URLs without that segment are returned unchanged.
///
/// # Examples
///
/// ```
/// use jupyterlab_sdk::catalog::file_server_url;
///
/// assert_eq!(
///     file_server_url("https://tds.example/thredds/catalog/ocean/catalog.xml"),
///     "https://tds.example/thredds/fileServer/"
/// );
/// ```
pub fn file_server_url(catalog_url: &str) -> String {
    match catalog_url.find(CATALOG_SEGMENT) {
        Some(idx) => format!("{}{}", &catalog_url[..idx], FILE_SERVER_SEGMENT),
        None => catalog_url.to_string(),
    }
}

/// Dataset element being read
struct OpenDataset {
    dataset: CatalogDataset,
    sized: bool,
}

/// One open element; `Some(slot)` for catalog datasets
struct Frame {
    dataset_slot: Option<usize>,
}

/// Parse a catalog document into its file datasets, in document order
///
/// A file dataset is a `dataset` element of [`THREDDS_NAMESPACE`], at any
/// depth, with a direct `dataSize` child in the same namespace.
///
/// # Errors
///
/// [`CatalogError::Xml`] for malformed or empty documents. A missing `urlPath`
/// is not checked here; see [`CatalogUrls::new`].
pub fn parse_catalog(xml: &str) -> Result<Vec<CatalogDataset>> {
    let mut reader = NsReader::from_str(xml);
    let mut slots: Vec<OpenDataset> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut saw_root = false;

    loop {
        let (ns, event) = reader.read_resolved_event().map_err(xml_error)?;
        match event {
            Event::Start(e) => {
                saw_root = true;
                let dataset_slot = visit_element(&ns, &e, &mut slots, &stack)?;
                stack.push(Frame { dataset_slot });
            }
            Event::Empty(e) => {
                saw_root = true;
                visit_element(&ns, &e, &mut slots, &stack)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(CatalogError::Xml("document has no root element".to_string()).into());
    }
    if !stack.is_empty() {
        return Err(CatalogError::Xml("unexpected end of document".to_string()).into());
    }

    Ok(slots
        .into_iter()
        .filter(|slot| slot.sized)
        .map(|slot| slot.dataset)
        .collect())
}

/// Record datasets and mark their `dataSize` children; returns the new
/// dataset's slot
fn visit_element(
    ns: &ResolveResult,
    element: &BytesStart,
    slots: &mut Vec<OpenDataset>,
    stack: &[Frame],
) -> Result<Option<usize>> {
    if !in_thredds_namespace(ns) {
        return Ok(None);
    }

    match element.local_name().as_ref() {
        b"dataset" => {
            slots.push(OpenDataset {
                dataset: CatalogDataset {
                    name: attribute(element, "name")?.unwrap_or_default(),
                    url_path: attribute(element, "urlPath")?,
                },
                sized: false,
            });
            Ok(Some(slots.len() - 1))
        }
        b"dataSize" => {
            if let Some(slot) = stack.last().and_then(|frame| frame.dataset_slot) {
                slots[slot].sized = true;
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn in_thredds_namespace(ns: &ResolveResult) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == THREDDS_NAMESPACE.as_bytes())
}

fn attribute(element: &BytesStart, key: &str) -> Result<Option<String>> {
    match element.try_get_attribute(key).map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    CatalogError::Xml(e.to_string()).into()
}

/// Compile a name filter that must match at the start of the name
fn compile_name_pattern(pattern: &str) -> Result<Regex> {
    // Size limit keeps hostile patterns from building huge automata
    Ok(regex::RegexBuilder::new(&format!("^(?:{})", pattern))
        .size_limit(1024 * 1024)
        .build()?)
}
