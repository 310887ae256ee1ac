//! Write operations for collections
//!
//! This module contains all write operations including:
//! - insertOne, insertMany
//! - updateOne, updateMany
//! - replaceOne
//! - deleteOne, deleteMany, deleteAll
//! - bulkWrite
//!
//! `updateMany` and `deleteMany` are processed by the service one page of
//! matches at a time; the command is repeated while the response reports
//! `moreData`.

use tracing::{debug, info};

use super::{CallOptions, DeleteResult, InsertOneResult, UpdateResult};
use crate::bulk::{
    self, BulkOperation, BulkWriteOptions, BulkWriteResult, InsertManyOptions, InsertManyResult,
};
use crate::error::{DataApiError, DeleteManyError, Result, UpdateManyError};
use crate::executor::{Command, Document, run_command};

impl super::Collection {
    /// Insert a single document
    ///
    /// # Returns
    /// * `Result<InsertOneResult>` - Id assigned to (or carried by) the document
    pub async fn insert_one(
        &self,
        document: Document,
        options: CallOptions,
    ) -> Result<InsertOneResult> {
        let response = run_command(
            self.executor.as_ref(),
            &self.name,
            &Command::insert_one(document),
            &self.command_options(options.timeout),
        )
        .await?;

        let inserted_id = response
            .status
            .and_then(|status| status.inserted_ids)
            .and_then(|ids| ids.into_iter().next())
            .ok_or_else(|| {
                DataApiError::Transport("insertOne response carried no inserted id".to_string())
            })?;

        Ok(InsertOneResult { inserted_id })
    }

    /// Insert many documents, chunked and orchestrated
    ///
    /// Unset options fall back to the collection defaults.
    pub async fn insert_many(
        &self,
        documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult> {
        let options = InsertManyOptions {
            chunk_size: options.chunk_size.or(Some(self.defaults.chunk_size)),
            concurrency: match options.concurrency {
                Some(n) => Some(n),
                None if options.ordered => None,
                None => Some(self.defaults.concurrency),
            },
            timeout: options.timeout.or(self.defaults.timeout),
            ordered: options.ordered,
        };
        bulk::insert_many(self.executor.as_ref(), &self.name, documents, &options).await
    }

    /// Update the first document matching `filter`
    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
        options: CallOptions,
    ) -> Result<UpdateResult> {
        let command = Command::update_one(filter, update, upsert)?;
        self.single_update(command, options).await
    }

    /// Replace the first document matching `filter`
    pub async fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        upsert: bool,
        options: CallOptions,
    ) -> Result<UpdateResult> {
        let command = Command::replace_one(filter, replacement, upsert)?;
        self.single_update(command, options).await
    }

    async fn single_update(
        &self,
        command: Command,
        options: CallOptions,
    ) -> Result<UpdateResult> {
        let response = run_command(
            self.executor.as_ref(),
            &self.name,
            &command,
            &self.command_options(options.timeout),
        )
        .await?;

        let mut result = UpdateResult::default();
        result.merge(&response);
        Ok(result)
    }

    /// Update every document matching `filter`
    ///
    /// # Returns
    /// * `Result<UpdateResult>` - Summed counters over all pages, or
    ///   [`DataApiError::UpdateMany`] with the pages processed before a failure
    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
        options: CallOptions,
    ) -> Result<UpdateResult> {
        let mut command = Command::update_many(filter, update, upsert)?;
        let options = self.command_options(options.timeout);
        let mut result = UpdateResult::default();
        let mut pages = 0u32;

        loop {
            let response =
                match run_command(self.executor.as_ref(), &self.name, &command, &options).await {
                    Ok(response) => response,
                    Err(e) => {
                        if let Some(raw) = e.raw_response() {
                            result.merge(raw);
                        } else if pages == 0 {
                            return Err(e);
                        }
                        return Err(UpdateManyError {
                            partial_result: result,
                            cause: Box::new(e),
                        }
                        .into());
                    }
                };

            pages += 1;
            result.merge(&response);

            let next = response
                .more_data()
                .then(|| response.next_page_state())
                .flatten();
            match (next, &mut command) {
                (Some(state), Command::UpdateMany { page_state, .. }) => {
                    debug!("updateMany on '{}' continuing after page {}", self.name, pages);
                    *page_state = Some(state);
                }
                _ => break,
            }
        }

        info!(
            "updateMany on '{}': {} matched, {} modified in {} page(s)",
            self.name, result.matched_count, result.modified_count, pages
        );
        Ok(result)
    }

    /// Delete the first document matching `filter`
    pub async fn delete_one(
        &self,
        filter: Document,
        options: CallOptions,
    ) -> Result<DeleteResult> {
        let response = run_command(
            self.executor.as_ref(),
            &self.name,
            &Command::delete_one(filter),
            &self.command_options(options.timeout),
        )
        .await?;

        let mut result = DeleteResult::default();
        result.merge(&response);
        Ok(result)
    }

    /// Delete every document matching `filter`
    ///
    /// An empty filter is rejected before anything is sent; use
    /// [`Collection::delete_all`](super::Collection::delete_all) to empty a collection.
    pub async fn delete_many(
        &self,
        filter: Document,
        options: CallOptions,
    ) -> Result<DeleteResult> {
        let command = Command::delete_many(filter)?;
        self.repeat_delete(command, options).await
    }

    /// Delete every document of the collection
    pub async fn delete_all(&self, options: CallOptions) -> Result<()> {
        self.repeat_delete(Command::delete_all(), options).await?;
        Ok(())
    }

    async fn repeat_delete(
        &self,
        command: Command,
        options: CallOptions,
    ) -> Result<DeleteResult> {
        let options = self.command_options(options.timeout);
        let mut result = DeleteResult::default();
        let mut pages = 0u32;

        loop {
            let response =
                match run_command(self.executor.as_ref(), &self.name, &command, &options).await {
                    Ok(response) => response,
                    Err(e) => {
                        if let Some(raw) = e.raw_response() {
                            result.merge(raw);
                        } else if pages == 0 {
                            return Err(e);
                        }
                        return Err(DeleteManyError {
                            partial_result: result,
                            cause: Box::new(e),
                        }
                        .into());
                    }
                };

            pages += 1;
            result.merge(&response);
            if !response.more_data() {
                break;
            }
        }

        info!(
            "deleteMany on '{}': {} deleted in {} page(s)",
            self.name, result.deleted_count, pages
        );
        Ok(result)
    }

    /// Execute a batch of write operations
    ///
    /// Unset options fall back to the collection defaults.
    pub async fn bulk_write(
        &self,
        operations: &[BulkOperation],
        options: BulkWriteOptions,
    ) -> Result<BulkWriteResult> {
        let options = BulkWriteOptions {
            concurrency: match options.concurrency {
                Some(n) => Some(n),
                None if options.ordered => None,
                None => Some(self.defaults.concurrency),
            },
            timeout: options.timeout.or(self.defaults.timeout),
            ordered: options.ordered,
        };
        bulk::bulk_write(self.executor.as_ref(), &self.name, operations, &options).await
    }
}
