//! The traversal engine.
//!
//! One call to [`Engine::handle`] is one step of a task:
//! block check → dispatch (classify) → extract → emit, in that order. The
//! engine does not fetch; continuation requests are emitted with the child
//! [`TaskState`] they must be handled with, and the scheduler calls the
//! engine again with their responses. A task ends when a step emits no
//! fetches or returns an error.

use chrono::{DateTime, Utc};
use harvest_core::CanonicalProduct;

use crate::classify::PageKind;
use crate::cursor::{PaginationCursor, TaskState};
use crate::error::HarvestError;
use crate::extract::Output;
use crate::failure::detect_block;
use crate::fetch::{CrawlOptions, FetchDescriptor, Response};
use crate::site::SiteModule;

/// Continuation hops allowed per task before further fetches are dropped.
/// Guards against sources whose cursors cycle.
pub const DEFAULT_MAX_DEPTH: u32 = 200;

/// What an emission carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
    Product(Box<CanonicalProduct>),
    Fetch {
        descriptor: FetchDescriptor,
        kind_hint: Option<PageKind>,
        /// State to pass back to the engine with this fetch's response.
        state: TaskState,
        options: CrawlOptions,
    },
}

/// One item handed to the sink/scheduler callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    /// Cursor value after this emission. Strictly increasing by one within
    /// a task step.
    pub item_index: u64,
    pub task_id: String,
    pub emitted_at: DateTime<Utc>,
    pub emitted: Emitted,
}

/// Summary of one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOutcome {
    pub kind: Option<PageKind>,
    pub products: usize,
    pub fetches: usize,
    /// Fetches dropped by the depth guard.
    pub dropped_fetches: usize,
    /// Cursor after the last emission.
    pub cursor: PaginationCursor,
}

impl TaskOutcome {
    fn empty(kind: Option<PageKind>, cursor: PaginationCursor) -> Self {
        Self {
            kind,
            products: 0,
            fetches: 0,
            dropped_fetches: 0,
            cursor,
        }
    }

    /// `true` when this step emitted no follow-up fetches.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.fetches == 0
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    max_depth: u32,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Engine {
    #[must_use]
    pub fn with_max_depth(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// Runs one traversal step of `module` over `response`.
    ///
    /// Items reach `emit` in the order the extractor returned them, each
    /// with the next cursor index. Items emitted before a failure are not
    /// retracted.
    ///
    /// # Errors
    ///
    /// - [`HarvestError::AccessDenied`] for HTTP 403 or a module block marker.
    /// - [`HarvestError::Unsupported`] / [`HarvestError::InvalidUrl`] when the
    ///   URL matches no page kind.
    /// - [`HarvestError::HttpStatus`] for other non-2xx responses (except
    ///   404/410 on a detail page, which finishes the task empty).
    /// - Any extractor error, and [`HarvestError::Entity`] when an extracted
    ///   product violates the catalog invariants.
    pub fn handle(
        &self,
        module: &dyn SiteModule,
        state: TaskState,
        response: &Response,
        emit: &mut dyn FnMut(Emission),
    ) -> Result<TaskOutcome, HarvestError> {
        let span = tracing::debug_span!(
            "harvest_step",
            task_id = %state.task_id,
            site = module.id(),
            depth = state.depth,
        );
        let _entered = span.enter();

        self.step(module, &state, response, emit)
            .inspect_err(|err| err.log(&state.task_id))
    }

    fn step(
        &self,
        module: &dyn SiteModule,
        state: &TaskState,
        response: &Response,
        emit: &mut dyn FnMut(Emission),
    ) -> Result<TaskOutcome, HarvestError> {
        if let Some(blocked) = detect_block(response, module.block_markers()) {
            return Err(blocked);
        }

        let kind = module.classifier().classify(&response.url)?;
        tracing::debug!(url = %response.url, page_kind = %kind, status = response.status, "dispatching");

        if !response.is_success() {
            if kind == PageKind::Detail && matches!(response.status, 404 | 410) {
                tracing::info!(url = %response.url, status = response.status, "product no longer listed");
                return Ok(TaskOutcome::empty(Some(kind), state.cursor));
            }
            return Err(HarvestError::HttpStatus {
                status: response.status,
                url: response.url.clone(),
            });
        }

        let outputs = module.extract(kind, response, state.cursor)?;

        let mut outcome = TaskOutcome::empty(Some(kind), state.cursor);
        let mut cursor = state.cursor;
        for output in outputs {
            match output {
                Output::Product(product) => {
                    product.validate()?;
                    let item_index = cursor.advance();
                    tracing::trace!(item_index, source_id = %product.source_id, "emitting product");
                    emit(Emission {
                        item_index,
                        task_id: state.task_id.clone(),
                        emitted_at: Utc::now(),
                        emitted: Emitted::Product(product),
                    });
                    outcome.products += 1;
                }
                Output::Fetch {
                    descriptor,
                    kind_hint,
                } => {
                    if state.depth >= self.max_depth {
                        tracing::warn!(
                            url = %descriptor.url,
                            max_depth = self.max_depth,
                            "continuation depth limit reached, dropping fetch"
                        );
                        outcome.dropped_fetches += 1;
                        continue;
                    }
                    let item_index = cursor.advance();
                    let options = module.default_options(&descriptor.url);
                    tracing::trace!(item_index, url = %descriptor.url, "emitting fetch");
                    emit(Emission {
                        item_index,
                        task_id: state.task_id.clone(),
                        emitted_at: Utc::now(),
                        emitted: Emitted::Fetch {
                            descriptor,
                            kind_hint,
                            state: state.continuation(item_index),
                            options,
                        },
                    });
                    outcome.fetches += 1;
                }
            }
            outcome.cursor = cursor;
        }

        tracing::debug!(
            page_kind = %kind,
            products = outcome.products,
            fetches = outcome.fetches,
            item_index = cursor.item_index(),
            "step complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
