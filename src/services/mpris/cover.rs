//! Cover art with single-flight fetching and icon fallback.
//!
//! The displayed image follows a fallback chain: the track's cover art
//! first, then whatever icon the owning record currently considers best
//! (see [`crate::services::mpris::PlayerRecord::refresh_icon`]).

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{EngineEvent, EngineSender, FetchError, IconRef, PlayerId, SourceKey};

/// Opacity of real cover art and full colour icons.
pub const OPACITY_FULL: u8 = 255;
/// Opacity of symbolic icons while the row is hovered.
pub const OPACITY_HOVER: u8 = 204;
/// Opacity of symbolic icons otherwise.
pub const OPACITY_BASE: u8 = 153;

/// Transport that turns a cover URI into bytes.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Fetch the bytes behind `uri`.
    ///
    /// # Errors
    /// Returns a [`FetchError`] describing why no bytes are available.
    async fn load(&self, uri: &str) -> Result<Arc<[u8]>, FetchError>;
}

/// Loads `file://` URIs from disk and `http(s)://` URIs over the network.
#[derive(Debug, Clone)]
pub struct UriLoader {
    client: reqwest::Client,
    remote: bool,
    timeout: Duration,
}

impl UriLoader {
    /// Create a loader. Remote URIs are refused unless `remote` is set.
    pub fn new(remote: bool, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            remote,
            timeout,
        }
    }

    async fn load_file(uri: &str) -> Result<Arc<[u8]>, FetchError> {
        let path = reqwest::Url::parse(uri)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| FetchError::UnsupportedScheme(uri.to_string()))?;

        let bytes = tokio::fs::read(&path).await.map_err(|source| FetchError::Io {
            uri: uri.to_string(),
            source,
        })?;
        Ok(Arc::from(bytes))
    }

    async fn load_remote(&self, uri: &str) -> Result<Arc<[u8]>, FetchError> {
        let http_error = |source| FetchError::Http {
            uri: uri.to_string(),
            source,
        };

        let bytes = self
            .client
            .get(uri)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_error)?
            .bytes()
            .await
            .map_err(http_error)?;
        Ok(Arc::from(bytes.as_ref()))
    }
}

#[async_trait]
impl ImageLoader for UriLoader {
    async fn load(&self, uri: &str) -> Result<Arc<[u8]>, FetchError> {
        let fetch = async {
            if uri.starts_with("file://") {
                Self::load_file(uri).await
            } else if self.remote && (uri.starts_with("http://") || uri.starts_with("https://")) {
                self.load_remote(uri).await
            } else {
                Err(FetchError::UnsupportedScheme(uri.to_string()))
            }
        };

        tokio::time::timeout(self.timeout, fetch)
            .await
            .unwrap_or_else(|_| Err(FetchError::TimedOut(uri.to_string())))
    }
}

/// What the cover slot shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverImage {
    /// Encoded image bytes of the track's cover art
    Art(Arc<[u8]>),
    /// A fallback icon
    Icon(IconRef),
}

/// Cover slot of one player.
///
/// Only the most recent [`set_target`](Self::set_target) can affect what is
/// shown. Each call aborts the previous fetch and bumps a generation
/// counter; a completion carrying an older generation is discarded even if
/// its task managed to finish before the abort landed.
pub struct CoverArt {
    id: PlayerId,
    key: SourceKey,
    loader: Arc<dyn ImageLoader>,
    events: EngineSender,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    fallback_active: bool,
    fallback_icon: IconRef,
    parent_hover: bool,
    image: CoverImage,
    opacity: u8,
}

impl CoverArt {
    /// Create a cover slot showing the generic fallback icon.
    pub fn new(
        id: PlayerId,
        key: SourceKey,
        loader: Arc<dyn ImageLoader>,
        events: EngineSender,
    ) -> Self {
        let fallback_icon = IconRef::generic_audio();
        let mut cover = Self {
            id,
            key,
            loader,
            events,
            generation: 0,
            in_flight: None,
            fallback_active: true,
            image: CoverImage::Icon(fallback_icon.clone()),
            fallback_icon,
            parent_hover: false,
            opacity: OPACITY_BASE,
        };
        cover.show_fallback();
        cover
    }

    /// Image currently shown.
    pub fn image(&self) -> &CoverImage {
        &self.image
    }

    /// Opacity the image is drawn with.
    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    /// Generation of the most recent request.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a fetch is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Show the cover behind `uri`, or the fallback icon when there is none.
    ///
    /// The previous image stays visible until the fetch completes.
    pub fn set_target(&mut self, uri: Option<&str>) {
        self.cancel();

        let Some(uri) = uri.filter(|uri| !uri.is_empty()) else {
            self.show_fallback();
            return;
        };

        self.fallback_active = false;

        let generation = self.generation;
        let loader = Arc::clone(&self.loader);
        let events = self.events.clone();
        let id = self.id.clone();
        let key = self.key;
        let uri = uri.to_string();

        debug!(player = %id, %uri, generation, "Fetching cover art");
        self.in_flight = Some(tokio::spawn(async move {
            let result = loader.load(&uri).await;
            let _ = events.send(EngineEvent::CoverLoaded {
                id,
                key,
                generation,
                result,
            });
        }));
    }

    /// Apply the result of the fetch started for `generation`.
    ///
    /// Returns `true` when the shown image changed. Stale and cancelled
    /// results change nothing.
    pub fn complete(&mut self, generation: u64, result: Result<Arc<[u8]>, FetchError>) -> bool {
        if generation != self.generation || self.in_flight.is_none() {
            debug!(player = %self.id, generation, current = self.generation, "Discarding stale cover");
            return false;
        }
        self.in_flight = None;

        match result {
            Ok(bytes) => {
                self.image = CoverImage::Art(bytes);
                self.opacity = OPACITY_FULL;
                true
            }
            Err(error) if error.is_cancelled() => false,
            Err(error) => {
                warn!(player = %self.id, "Cover art unavailable: {error}");
                self.show_fallback();
                true
            }
        }
    }

    /// Replace the icon used when there is no cover art.
    ///
    /// Takes effect immediately if the fallback is showing.
    pub fn set_fallback_icon(&mut self, icon: IconRef) {
        self.fallback_icon = icon;
        if self.fallback_active {
            self.show_fallback();
        }
    }

    /// Track whether the pointer is over the row that owns this slot.
    pub fn on_parent_hover(&mut self, hover: bool) {
        self.parent_hover = hover;
        self.opacity = self.opacity_for_image();
    }

    /// Abort any outstanding fetch; its result will be ignored.
    pub fn cancel(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        self.generation += 1;
    }

    fn show_fallback(&mut self) {
        self.fallback_active = true;
        self.image = CoverImage::Icon(self.fallback_icon.clone());
        self.opacity = self.opacity_for_image();
    }

    fn opacity_for_image(&self) -> u8 {
        match &self.image {
            CoverImage::Icon(icon) if icon.is_symbolic() => {
                if self.parent_hover {
                    OPACITY_HOVER
                } else {
                    OPACITY_BASE
                }
            }
            _ => OPACITY_FULL,
        }
    }
}

impl Drop for CoverArt {
    fn drop(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}
