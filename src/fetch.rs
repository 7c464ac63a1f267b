use anyhow::{bail, Context, Result};
use log::debug;
use std::fs;
use url::Url;

/// Reads a build file from a local path, a `file://` URL or an HTTP(S) URL.
pub fn fetch(location: &str) -> Result<Vec<u8>> {
    let url = match Url::parse(location) {
        // A single-letter scheme is a Windows drive, not a URL.
        Ok(url) if url.scheme().len() > 1 => url,
        _ => return read_file(location),
    };

    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|()| anyhow::anyhow!("invalid file URL: {}", location))?;
            let path = path
                .to_str()
                .with_context(|| format!("file URL is not valid utf-8: {}", location))?;
            read_file(path)
        }
        "http" | "https" => {
            debug!("downloading {}", url);
            let response = reqwest::blocking::get(url.clone())
                .with_context(|| format!("fetching {}", url))?;
            if !response.status().is_success() {
                bail!("fetching {}: {}", url, response.status());
            }
            let body = response
                .bytes()
                .with_context(|| format!("reading response from {}", url))?;
            Ok(body.to_vec())
        }
        scheme => bail!("unsupported URL scheme {:?} in {}", scheme, location),
    }
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path))
}
