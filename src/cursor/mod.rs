//! Lazy, restartable query cursor
//!
//! A [`FindCursor`] turns the service's paged `find` protocol into a
//! single-pass sequence of documents. Pages are fetched on demand, one at a
//! time, and each raw document is mapped only when it is consumed.
//!
//! Lifecycle:
//! - `Uninitialized`: nothing sent yet; builder methods (`filter`, `sort`,
//!   `limit`, `skip`, `project`, `include_similarity`, `map`) are allowed
//! - `Initialized`: at least one page was requested; builder methods fail
//! - `Closed`: terminal; consumption returns nothing and never hits the network
//!
//! A multi-page traversal is not a snapshot: documents changed concurrently
//! may be skipped or seen twice across page boundaries.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures::stream::Stream;
use tracing::debug;

use crate::error::{CursorError, DataApiError, Result};
use crate::executor::{Command, CommandExecutor, CommandOptions, Document, run_command};

mod options;

pub use options::{FindOneOptions, FindOptions};

/// Lifecycle state of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Uninitialized,
    Initialized,
    Closed,
}

type Mapper<T> = Arc<dyn Fn(Document) -> Result<T> + Send + Sync>;

/// Cursor over the results of a find query
pub struct FindCursor<T = Document> {
    namespace: String,
    executor: Arc<dyn CommandExecutor>,
    command_options: CommandOptions,
    filter: Document,
    options: FindOptions,
    mapper: Mapper<T>,
    state: CursorState,
    buffer: VecDeque<Document>,
    page_state: Option<String>,
    consumed: u64,
}

impl FindCursor<Document> {
    /// Create a cursor over raw documents
    ///
    /// # Arguments
    /// * `namespace` - Target collection
    /// * `executor` - Transport used to fetch pages
    /// * `filter` - Query predicate, forwarded verbatim
    ///
    /// # Returns
    /// * `Self` - Uninitialized cursor; nothing is sent until it is consumed
    pub fn new(
        namespace: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
        filter: Document,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            executor,
            command_options: CommandOptions::default(),
            filter,
            options: FindOptions::default(),
            mapper: Arc::new(Ok::<Document, DataApiError>),
            state: CursorState::Uninitialized,
            buffer: VecDeque::new(),
            page_state: None,
            consumed: 0,
        }
    }
}

impl<T> FindCursor<T> {
    /// Options applied to every page request (timeout)
    pub fn with_command_options(mut self, options: CommandOptions) -> Self {
        self.command_options = options;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Current query predicate
    pub fn filter_ref(&self) -> &Document {
        &self.filter
    }

    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    /// Number of documents yielded (or drained) so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Number of raw documents fetched but not yet consumed
    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }

    /* ---------------------------- builder methods ---------------------------- */

    fn ensure_uninitialized(&self, operation: &'static str) -> Result<()> {
        match self.state {
            CursorState::Uninitialized => Ok(()),
            CursorState::Initialized => Err(CursorError::AlreadyInitialized { operation }.into()),
            CursorState::Closed => Err(CursorError::Closed { operation }.into()),
        }
    }

    /// Replace the query predicate
    pub fn filter(mut self, filter: Document) -> Result<Self> {
        self.ensure_uninitialized("filter")?;
        self.filter = filter;
        Ok(self)
    }

    pub fn sort(mut self, sort: Document) -> Result<Self> {
        self.ensure_uninitialized("sort")?;
        self.options.sort = Some(sort);
        Ok(self)
    }

    /// Cap the number of yielded documents; `0` removes the cap
    pub fn limit(mut self, limit: u64) -> Result<Self> {
        self.ensure_uninitialized("limit")?;
        self.options.limit = limit;
        Ok(self)
    }

    pub fn skip(mut self, skip: u64) -> Result<Self> {
        self.ensure_uninitialized("skip")?;
        self.options.skip = Some(skip);
        Ok(self)
    }

    pub fn project(mut self, projection: Document) -> Result<Self> {
        self.ensure_uninitialized("project")?;
        self.options.projection = Some(projection);
        Ok(self)
    }

    pub fn include_similarity(mut self, include: bool) -> Result<Self> {
        self.ensure_uninitialized("include_similarity")?;
        self.options.include_similarity = include;
        Ok(self)
    }

    /// Transform every yielded document
    ///
    /// The function runs at consumption time, never when a page is buffered.
    /// Successive calls compose in order.
    pub fn map<R, F>(self, f: F) -> Result<FindCursor<R>>
    where
        F: Fn(T) -> R + Send + Sync + 'static,
        T: 'static,
        R: 'static,
    {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Like [`FindCursor::map`], for fallible transformations
    ///
    /// An error returned by `f` closes the cursor and is passed to the caller unchanged.
    pub fn try_map<R, F>(self, f: F) -> Result<FindCursor<R>>
    where
        F: Fn(T) -> Result<R> + Send + Sync + 'static,
        T: 'static,
        R: 'static,
    {
        self.ensure_uninitialized("map")?;
        let previous = self.mapper;
        let mapper: Mapper<R> = Arc::new(move |doc| f(previous(doc)?));

        Ok(FindCursor {
            namespace: self.namespace,
            executor: self.executor,
            command_options: self.command_options,
            filter: self.filter,
            options: self.options,
            mapper,
            state: self.state,
            buffer: self.buffer,
            page_state: self.page_state,
            consumed: self.consumed,
        })
    }

    /* ------------------------------ lifecycle ------------------------------- */

    /// Close the cursor; no further pages are requested
    ///
    /// Already buffered documents stay readable through
    /// [`FindCursor::read_buffered_documents`].
    pub fn close(&mut self) {
        if self.state != CursorState::Closed {
            debug!(
                "Closing cursor on '{}' after {} document(s)",
                self.namespace, self.consumed
            );
        }
        self.state = CursorState::Closed;
        self.page_state = None;
    }

    /// Reset to `Uninitialized`, keeping filter, options and mapping
    pub fn rewind(&mut self) {
        self.state = CursorState::Uninitialized;
        self.buffer.clear();
        self.page_state = None;
        self.consumed = 0;
    }

    /// Take up to `max` (default: all) buffered raw documents without fetching
    ///
    /// Drained documents count as consumed for limit purposes.
    pub fn read_buffered_documents(&mut self, max: Option<usize>) -> Vec<Document> {
        let count = max.unwrap_or(self.buffer.len()).min(self.buffer.len());
        self.consumed += count as u64;
        self.buffer.drain(..count).collect()
    }

    /* ------------------------------ fetching -------------------------------- */

    fn page_command(&self) -> Command {
        Command::Find {
            filter: self.filter.clone(),
            sort: self.options.sort.clone(),
            projection: self.options.projection.clone(),
            limit: (self.options.limit > 0).then_some(self.options.limit),
            skip: self.options.skip,
            include_similarity: self.options.include_similarity,
            page_state: self.page_state.clone(),
        }
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        let command = self.page_command();
        self.state = CursorState::Initialized;

        let response = match run_command(
            self.executor.as_ref(),
            &self.namespace,
            &command,
            &self.command_options,
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        self.page_state = response.next_page_state();
        let mut documents = response.into_documents();

        if self.options.limit > 0 {
            let remaining = self.options.limit.saturating_sub(self.consumed) as usize;
            if documents.len() >= remaining {
                documents.truncate(remaining);
                self.page_state = None;
            }
        }

        debug!(
            "Fetched page of {} document(s) from '{}' (more pages: {})",
            documents.len(),
            self.namespace,
            self.page_state.is_some()
        );
        self.buffer = documents.into();
        Ok(())
    }

    /// Fetch until the buffer has a document or no page remains
    async fn fill_buffer(&mut self) -> Result<bool> {
        loop {
            if !self.buffer.is_empty() {
                return Ok(!matches!(self.state, CursorState::Closed));
            }
            match self.state {
                CursorState::Closed => return Ok(false),
                CursorState::Initialized if self.page_state.is_none() => {
                    self.close();
                    return Ok(false);
                }
                _ => self.fetch_next_page().await?,
            }
        }
    }

    /* ----------------------------- consumption ------------------------------ */

    /// Whether another document is available, fetching only if the buffer is empty
    pub async fn has_next(&mut self) -> Result<bool> {
        self.fill_buffer().await
    }

    /// Next document, or `None` once the cursor is exhausted or closed
    pub async fn next(&mut self) -> Result<Option<T>> {
        if !self.fill_buffer().await? {
            return Ok(None);
        }
        let Some(raw) = self.buffer.pop_front() else {
            return Ok(None);
        };
        self.consumed += 1;

        match (self.mapper)(raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Collect every remaining document and close the cursor
    pub async fn to_array(&mut self) -> Result<Vec<T>> {
        let mut items = Vec::with_capacity(self.buffer.len());
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        self.close();
        Ok(items)
    }

    /// Call `f` for every remaining document
    ///
    /// Returning `false` from `f` stops the iteration and closes the cursor.
    pub async fn for_each<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(T) -> bool,
    {
        while let Some(item) = self.next().await? {
            if !f(item) {
                self.close();
                break;
            }
        }
        self.close();
        Ok(())
    }

    /// Borrow the cursor as a stream
    ///
    /// Dropping the stream, for example by breaking out of a loop, closes the cursor.
    pub fn stream(&mut self) -> impl Stream<Item = Result<T>> + '_ {
        futures::stream::unfold(CloseOnDrop { cursor: self }, |guard| async move {
            match guard.cursor.next().await {
                Ok(Some(item)) => Some((Ok(item), guard)),
                Ok(None) => None,
                Err(e) => Some((Err(e), guard)),
            }
        })
    }
}

struct CloseOnDrop<'a, T> {
    cursor: &'a mut FindCursor<T>,
}

impl<T> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.cursor.close();
    }
}

/// Produces a fresh `Uninitialized` cursor with the same filter, options and
/// mapping. Buffer and pagination state are never shared.
impl<T> Clone for FindCursor<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            executor: Arc::clone(&self.executor),
            command_options: self.command_options.clone(),
            filter: self.filter.clone(),
            options: self.options.clone(),
            mapper: Arc::clone(&self.mapper),
            state: CursorState::Uninitialized,
            buffer: VecDeque::new(),
            page_state: None,
            consumed: 0,
        }
    }
}

/// Manual Debug implementation since the mapping closure doesn't implement Debug
impl<T> fmt::Debug for FindCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindCursor")
            .field("namespace", &self.namespace)
            .field("filter", &self.filter)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("has_page_state", &self.page_state.is_some())
            .field("consumed", &self.consumed)
            .finish()
    }
}
