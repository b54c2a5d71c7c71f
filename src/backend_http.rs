use bytes::Bytes;
use reqwest::header::{HeaderValue, RANGE};
use reqwest::{Client, IntoUrl, Method, Request, StatusCode, Url};

use crate::async_reader::{AsyncBackend, AsyncS2PmTilesReader, ensure_exact_read};
use crate::cache::{DirectoryCache, NoCache};
use crate::error::{S2PmtError, S2PmtResult};

impl AsyncS2PmTilesReader<HttpBackend, NoCache> {
    /// Creates a new reader from a URL using the Reqwest backend.
    ///
    /// Fails if the URL does not exist or is an invalid archive.
    /// (Note: HTTP requests are made to validate it.)
    pub async fn new_with_url<U: IntoUrl>(client: Client, url: U) -> S2PmtResult<Self> {
        Self::new_with_cached_url(NoCache, client, url).await
    }
}

impl<C: DirectoryCache + Sync + Send> AsyncS2PmTilesReader<HttpBackend, C> {
    /// Creates a new reader with cache from a URL using the Reqwest backend.
    ///
    /// Fails if the URL does not exist or is an invalid archive.
    /// (Note: HTTP requests are made to validate it.)
    pub async fn new_with_cached_url<U: IntoUrl>(
        cache: C,
        client: Client,
        url: U,
    ) -> S2PmtResult<Self> {
        let backend = HttpBackend::try_from(client, url)?;

        Self::try_from_cached_source(backend, cache).await
    }
}

/// Byte-range access over an archive served via HTTP range requests.
pub struct HttpBackend {
    client: Client,
    url: Url,
}

impl HttpBackend {
    /// Wraps a client and archive URL.
    pub fn try_from<U: IntoUrl>(client: Client, url: U) -> S2PmtResult<Self> {
        Ok(Self {
            client,
            url: url.into_url()?,
        })
    }
}

/// Formats `offset..offset + length` as a closed-interval `Range` header.
///
/// Empty ranges cannot be expressed in the header grammar and are
/// rejected, as are ranges running past the end of the id space.
fn range_header(offset: u64, length: u64) -> S2PmtResult<HeaderValue> {
    let end = length
        .checked_sub(1)
        .and_then(|l| offset.checked_add(l))
        .ok_or_else(|| S2PmtError::Reading(std::io::ErrorKind::InvalidInput.into()))?;
    Ok(HeaderValue::try_from(format!("bytes={offset}-{end}"))?)
}

/// Rejects servers that reply with more bytes than the range asked for.
fn ensure_body_fits(body: Bytes, requested: u64) -> S2PmtResult<Bytes> {
    if body.len() as u64 > requested {
        Err(S2PmtError::ResponseBodyTooLong(
            body.len(),
            usize::try_from(requested).unwrap_or(usize::MAX),
        ))
    } else {
        Ok(body)
    }
}

impl AsyncBackend for HttpBackend {
    async fn read_exact(&self, offset: u64, length: u64) -> S2PmtResult<Bytes> {
        ensure_exact_read(self.read(offset, length).await?, length)
    }

    async fn read(&self, offset: u64, length: u64) -> S2PmtResult<Bytes> {
        let mut req = Request::new(Method::GET, self.url.clone());
        req.headers_mut().insert(RANGE, range_header(offset, length)?);

        let response = self.client.execute(req).await?.error_for_status()?;
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(S2PmtError::RangeRequestsUnsupported);
        }

        ensure_body_fits(response.bytes().await?, length)
    }
}
