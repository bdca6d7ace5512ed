//! The gallery's pagination state machine. One coordinator per rendering
//! session: it owns the accumulated item collection and channel metadata,
//! gates overlapping fetches, discards superseded results, and exposes a
//! serializable snapshot to the rendering layer.
//!
//! Errors never escape this module as errors; every fetch failure is
//! folded into the session state as a user-facing message.

use crate::client::ContentFetcher;
use crate::error::Result;
use crate::layout::LayoutEngine;
use crate::models::{derive_total_pages, ChannelMetadata, ContentItem, ContentPage};
use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Consolidated session phase; replaces the pile of independent
/// loading/error booleans the UI would otherwise juggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    LoadingInitial,
    Ready,
    LoadingMore,
    Errored,
}

/// How the session navigates the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// Explicit previous/next controls; page loads replace the collection
    Paged,
    /// Intersection-driven `load_more`; page loads append
    InfiniteScroll,
}

/// What a navigation trigger amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fetched and applied to the session
    Applied,
    /// Dropped before fetching (bounds, duplicate trigger, in-flight gate)
    NoOp,
    /// Fetched, but a later navigation had already superseded it
    Superseded,
    /// Fetch failed; the session carries the user-facing message
    Failed,
}

struct SessionState {
    phase: Phase,
    items: Vec<ContentItem>,
    current_page: u32,
    pending_page: Option<u32>,
    total_pages: Option<u32>,
    total_item_count: u64,
    loaded_pages: HashSet<u32>,
    has_more: bool,
    metadata: Option<ChannelMetadata>,
    display_font: &'static str,
    last_error: Option<String>,
}

/// Render-facing view of the session
#[derive(Debug, Clone, Serialize)]
pub struct GallerySnapshot {
    pub phase: Phase,
    pub items: Vec<ContentItem>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_item_count: u64,
    pub has_more: bool,
    pub channel_title: Option<String>,
    pub display_font: &'static str,
    pub error: Option<String>,
}

pub struct GalleryCoordinator {
    fetcher: Arc<dyn ContentFetcher>,
    mode: NavigationMode,
    page_size: u32,
    state: Mutex<SessionState>,
    layout: std::sync::Mutex<LayoutEngine>,
    /// Gates initial load and load-more; extra triggers are dropped
    in_flight: AtomicBool,
    /// Bumped by every page navigation; a fetch whose token no longer
    /// matches at resolution time is discarded
    generation: AtomicU64,
}

impl GalleryCoordinator {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        mode: NavigationMode,
        mut layout: LayoutEngine,
        page_size: u32,
    ) -> Self {
        // One font per visit, drawn before the first paint.
        let display_font = layout.pick_font();
        Self {
            fetcher,
            mode,
            page_size,
            state: Mutex::new(SessionState {
                phase: Phase::Idle,
                items: Vec::new(),
                current_page: 0,
                pending_page: None,
                total_pages: None,
                total_item_count: 0,
                loaded_pages: HashSet::new(),
                has_more: false,
                metadata: None,
                display_font,
                last_error: None,
            }),
            layout: std::sync::Mutex::new(layout),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> NavigationMode {
        self.mode
    }

    /// Mount the session: fetch channel metadata and the starting page
    /// concurrently. A metadata failure is non-fatal (counts are kept or
    /// defaulted); a page failure on this very first load clears the
    /// collection and surfaces the error.
    pub async fn initial_load(&self, start_page: u32) -> LoadOutcome {
        let start_page = start_page.max(1);
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("initial load already in flight; trigger dropped");
            return LoadOutcome::NoOp;
        }

        {
            let mut state = self.state.lock().await;
            state.phase = Phase::LoadingInitial;
            state.pending_page = Some(start_page);
        }
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (metadata, page) = futures::future::join(
            self.fetcher.channel_metadata(false),
            self.fetcher.content_page(start_page),
        )
        .await;

        let mut state = self.state.lock().await;
        self.in_flight.store(false, Ordering::SeqCst);
        if self.generation.load(Ordering::SeqCst) != token {
            debug!("discarding superseded initial load of page {}", start_page);
            return LoadOutcome::Superseded;
        }
        state.pending_page = None;

        match metadata {
            Ok(meta) => self.apply_metadata(&mut state, meta),
            // The page fetch still carries counts; stale metadata only
            // costs us the header line.
            Err(e) => warn!("channel metadata fetch failed: {}", e),
        }

        match page {
            Ok(page) => {
                self.apply_page_replace(&mut state, page);
                LoadOutcome::Applied
            }
            Err(e) => {
                state.items.clear();
                state.loaded_pages.clear();
                state.has_more = false;
                state.phase = Phase::Errored;
                state.last_error = Some(e.user_message().to_string());
                LoadOutcome::Failed
            }
        }
    }

    /// Paged navigation. No-op outside the known page range, for the page
    /// already shown, and for a duplicate of the pending trigger; a
    /// request for a *different* page supersedes the pending fetch, whose
    /// late result is then discarded.
    pub async fn go_to_page(&self, page: u32) -> LoadOutcome {
        if self.mode != NavigationMode::Paged {
            warn!("go_to_page called on an infinite-scroll session");
            return LoadOutcome::NoOp;
        }

        {
            let mut state = self.state.lock().await;
            if page < 1 || page == state.current_page {
                return LoadOutcome::NoOp;
            }
            if let Some(total) = state.total_pages {
                if page > total {
                    return LoadOutcome::NoOp;
                }
            }
            if state.pending_page == Some(page) {
                debug!("duplicate go_to_page({}) dropped while in flight", page);
                return LoadOutcome::NoOp;
            }
            state.pending_page = Some(page);
            state.phase = if state.items.is_empty() {
                Phase::LoadingInitial
            } else {
                Phase::LoadingMore
            };
        }
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self.fetcher.content_page(page).await;

        let mut state = self.state.lock().await;
        if self.generation.load(Ordering::SeqCst) != token {
            debug!("discarding superseded result for page {}", page);
            return LoadOutcome::Superseded;
        }
        state.pending_page = None;

        match result {
            Ok(fetched) => {
                self.apply_page_replace(&mut state, fetched);
                LoadOutcome::Applied
            }
            Err(e) => {
                // Only a failure with nothing on screen blanks the page.
                if state.items.is_empty() {
                    state.loaded_pages.clear();
                }
                state.phase = Phase::Errored;
                state.last_error = Some(e.user_message().to_string());
                LoadOutcome::Failed
            }
        }
    }

    /// Infinite-scroll trigger. Dropped while a load is in flight, once
    /// the channel is exhausted, and for pages already merged.
    pub async fn load_more(&self) -> LoadOutcome {
        if self.mode != NavigationMode::InfiniteScroll {
            warn!("load_more called on a paged session");
            return LoadOutcome::NoOp;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("load_more dropped: a fetch is already in flight");
            return LoadOutcome::NoOp;
        }

        let next = {
            let mut state = self.state.lock().await;
            if !state.has_more {
                self.in_flight.store(false, Ordering::SeqCst);
                return LoadOutcome::NoOp;
            }
            let next = state.current_page + 1;
            if state.loaded_pages.contains(&next) {
                self.in_flight.store(false, Ordering::SeqCst);
                return LoadOutcome::NoOp;
            }
            state.phase = Phase::LoadingMore;
            state.pending_page = Some(next);
            next
        };
        let token = self.generation.load(Ordering::SeqCst);

        let result = self.fetcher.content_page(next).await;

        let mut state = self.state.lock().await;
        self.in_flight.store(false, Ordering::SeqCst);
        if self.generation.load(Ordering::SeqCst) != token {
            debug!("discarding load_more of page {} from a stale context", next);
            return LoadOutcome::Superseded;
        }
        state.pending_page = None;

        match result {
            Ok(page) => {
                self.apply_page_append(&mut state, page);
                LoadOutcome::Applied
            }
            Err(e) => {
                // Already-loaded items stay on screen.
                state.phase = Phase::Errored;
                state.last_error = Some(e.user_message().to_string());
                LoadOutcome::Failed
            }
        }
    }

    /// Periodic metadata refresh; goes through the response cache, so at
    /// most one upstream call per cache window.
    pub async fn refresh_metadata(&self) -> Result<()> {
        let metadata = self.fetcher.channel_metadata(false).await?;
        let mut state = self.state.lock().await;
        self.apply_metadata(&mut state, metadata);
        Ok(())
    }

    pub async fn snapshot(&self) -> GallerySnapshot {
        let state = self.state.lock().await;
        GallerySnapshot {
            phase: state.phase,
            items: state.items.clone(),
            current_page: state.current_page.max(1),
            total_pages: state.total_pages.unwrap_or(1),
            total_item_count: state.total_item_count,
            has_more: state.has_more,
            channel_title: state.metadata.as_ref().map(|m| m.title.clone()),
            display_font: state.display_font,
            error: state.last_error.clone(),
        }
    }

    fn apply_metadata(&self, state: &mut SessionState, metadata: ChannelMetadata) {
        if metadata.total_item_count > 0 {
            state.total_item_count = metadata.total_item_count;
            state.total_pages = Some(derive_total_pages(
                metadata.total_item_count,
                self.page_size,
            ));
        }
        state.metadata = Some(metadata);
    }

    /// Recompute counts defensively: an upstream response that omits or
    /// zeroes the totals must not flicker the UI to "no results".
    fn apply_counts(&self, state: &mut SessionState, page: &ContentPage) {
        if let Some(count) = page.total_item_count {
            state.total_item_count = count;
        }
        if let Some(total_pages) = page.total_pages {
            state.total_pages = Some(total_pages);
        } else if state.total_item_count > 0 {
            state.total_pages = Some(derive_total_pages(state.total_item_count, self.page_size));
        }
    }

    fn apply_page_replace(&self, state: &mut SessionState, page: ContentPage) {
        self.apply_counts(state, &page);
        let page_number = page.page_number;
        let mut items: Vec<ContentItem> = page.items.into_iter().unique_by(|i| i.id).collect();
        let exhausted = items.is_empty();
        {
            let mut layout = self.layout.lock().expect("layout lock poisoned");
            layout.assign_offsets(&mut items);
        }
        state.items = items;
        state.current_page = page_number;
        state.loaded_pages = HashSet::from([page_number]);
        state.has_more = !exhausted && !self.reached_last_page(state, page_number);
        state.phase = Phase::Ready;
        state.last_error = None;
    }

    fn apply_page_append(&self, state: &mut SessionState, page: ContentPage) {
        self.apply_counts(state, &page);
        let page_number = page.page_number;
        let fetched_empty = page.items.is_empty();

        // De-duplicate against everything already merged; the upstream
        // re-sorts between fetches and can repeat blocks across pages.
        let seen: HashSet<u64> = state.items.iter().map(|i| i.id).collect();
        let mut fresh: Vec<ContentItem> = page
            .items
            .into_iter()
            .filter(|item| !seen.contains(&item.id))
            .unique_by(|i| i.id)
            .collect();
        {
            let mut layout = self.layout.lock().expect("layout lock poisoned");
            layout.assign_offsets(&mut fresh);
        }
        state.items.extend(fresh);
        state.loaded_pages.insert(page_number);
        state.current_page = page_number;
        state.has_more = !fetched_empty && !self.reached_last_page(state, page_number);
        state.phase = Phase::Ready;
        state.last_error = None;
    }

    fn reached_last_page(&self, state: &SessionState, page_number: u32) -> bool {
        match state.total_pages {
            Some(total) => page_number >= total,
            None => false,
        }
    }
}
