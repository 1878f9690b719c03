//! Acquisition State Machine
//!
//! Start -> FetchOrAcquire -> Validate -> { Ready | RetryWait -> FetchOrAcquire }
//!
//! Validation failures are not errors: the candidate is destroyed, the slot is
//! cleared and acquisition starts over after `RESOURCE_RETRY_DELAY`, with no
//! attempt ceiling. Only handler destruction ends the loop early.

use crate::application::constants::{ACQUISITION_KEY, RESOURCE_RETRY_DELAY};
use crate::application::handler::HandlerShared;
use crate::application::scheduler::JobContext;
use crate::application::slot::Generation;
use crate::domain::{CandidateOrigin, JobKind, JobStep};
use crate::error::{HandlerError, Result};
use crate::port::ResourceOwner;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Resource produced by FetchOrAcquire, not yet trusted
pub(crate) struct Candidate<R> {
    resource: R,
    origin: CandidateOrigin,
    generation: Option<Generation>,
}

/// Result of the Validate step
pub(crate) enum Validation<R> {
    Ready(R),
    Rejected,
}

pub(crate) fn upgrade<O: ResourceOwner>(
    handler: &Weak<HandlerShared<O>>,
) -> Result<Arc<HandlerShared<O>>> {
    handler.upgrade().ok_or(HandlerError::NoResourceHandler)
}

/// FetchOrAcquire: the held resource if any, otherwise a fresh one from the owner
pub(crate) async fn fetch_or_acquire<O: ResourceOwner>(
    handler: &HandlerShared<O>,
    ctx: &JobContext,
) -> Result<Candidate<O::Resource>> {
    if let Some((resource, generation)) = handler.slot.lock().await.held() {
        debug!(job_id = %ctx.id(), handler = %handler.config.label, generation, "Using held resource");
        return Ok(Candidate {
            resource,
            origin: CandidateOrigin::Held,
            generation: Some(generation),
        });
    }

    let options = handler
        .options
        .read()
        .await
        .clone()
        .ok_or(HandlerError::NoResourceHandler)?;

    info!(job_id = %ctx.id(), handler = %handler.config.label, "Acquiring resource");
    let resource = handler
        .owner
        .acquire_resource(&options)
        .await
        .map_err(|e| {
            warn!(job_id = %ctx.id(), handler = %handler.config.label, error = %e, "Resource acquisition failed");
            e
        })?;

    Ok(Candidate {
        resource,
        origin: CandidateOrigin::Acquired,
        generation: None,
    })
}

/// Validate: commit a usable candidate, destroy and clear an unusable one
///
/// `step` names the checkpoint taken before validating (Validate for the
/// acquisition job, OnResource for an inline operation job).
pub(crate) async fn validate<O: ResourceOwner>(
    handler: &HandlerShared<O>,
    ctx: &JobContext,
    step: JobStep,
    candidate: Candidate<O::Resource>,
) -> Result<Validation<O::Resource>> {
    if let Err(e) = ctx.checkpoint(step) {
        discard(handler, ctx, candidate).await;
        return Err(e);
    }

    let usable = match handler.owner.is_resource_usable(&candidate.resource) {
        Ok(usable) => usable,
        Err(e) if e.is_contract_violation() => {
            discard(handler, ctx, candidate).await;
            return Err(e);
        }
        Err(e) => {
            // A failing health check counts as a failed validation
            warn!(
                job_id = %ctx.id(),
                handler = %handler.config.label,
                error = %e,
                "Resource health check failed"
            );
            false
        }
    };

    if !usable {
        warn!(
            job_id = %ctx.id(),
            handler = %handler.config.label,
            origin = ?candidate.origin,
            "Resource is not usable, destroying it"
        );
        reject(handler, ctx, candidate).await?;
        return Ok(Validation::Rejected);
    }

    match candidate.origin {
        // Already in the slot; nothing to commit
        CandidateOrigin::Held => Ok(Validation::Ready(candidate.resource)),
        CandidateOrigin::Acquired => {
            let mut slot = handler.slot.lock().await;
            if ctx.is_cancelled() {
                drop(slot);
                discard(handler, ctx, candidate).await;
                return Err(HandlerError::NoResourceHandler);
            }
            if let Some((held, _)) = slot.held() {
                // Inline race: another job committed first. Its resource stays.
                drop(slot);
                debug!(job_id = %ctx.id(), handler = %handler.config.label, "Slot already filled, releasing duplicate");
                release(handler, candidate.resource).await?;
                return Ok(Validation::Ready(held));
            }
            let generation = slot.commit(candidate.resource.clone());
            info!(job_id = %ctx.id(), handler = %handler.config.label, generation, "Resource ready");
            Ok(Validation::Ready(candidate.resource))
        }
    }
}

/// Clear the rejected candidate from the slot (if it came from there) and destroy it
async fn reject<O: ResourceOwner>(
    handler: &HandlerShared<O>,
    ctx: &JobContext,
    candidate: Candidate<O::Resource>,
) -> Result<()> {
    let owned = match (candidate.origin, candidate.generation) {
        (CandidateOrigin::Held, Some(generation)) => {
            // None: someone else already removed it and owns its destruction
            handler.slot.lock().await.take_if(generation)
        }
        _ => Some(candidate.resource),
    };
    match owned {
        Some(resource) => release(handler, resource).await,
        None => {
            debug!(job_id = %ctx.id(), "Rejected resource already removed from slot");
            Ok(())
        }
    }
}

/// Drop a candidate the job will not hand out (cancelled, or failed with an error)
///
/// A freshly acquired candidate is owned by nobody else, so it is destroyed.
/// A held one still belongs to the slot, which the handler tears down itself.
async fn discard<O: ResourceOwner>(
    handler: &HandlerShared<O>,
    ctx: &JobContext,
    candidate: Candidate<O::Resource>,
) {
    if candidate.origin == CandidateOrigin::Acquired {
        info!(job_id = %ctx.id(), handler = %handler.config.label, "Destroying orphaned resource");
        if let Err(e) = release(handler, candidate.resource).await {
            warn!(job_id = %ctx.id(), error = %e, "Failed to destroy orphaned resource");
        }
    }
}

/// Destroy a resource through the owner
///
/// Owner failures are logged and absorbed; a missing implementation is not.
pub(crate) async fn release<O: ResourceOwner>(
    handler: &HandlerShared<O>,
    resource: O::Resource,
) -> Result<()> {
    match handler.owner.destroy_resource(resource).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_contract_violation() => Err(e),
        Err(e) => {
            warn!(handler = %handler.config.label, error = %e, "Destroying resource failed");
            Ok(())
        }
    }
}

/// One run of the state machine, holding only a weak handler reference
pub(crate) struct AcquisitionJob<O: ResourceOwner> {
    handler: Weak<HandlerShared<O>>,
    ctx: JobContext,
}

impl<O: ResourceOwner> AcquisitionJob<O> {
    pub(crate) fn new(handler: Weak<HandlerShared<O>>, ctx: JobContext) -> Self {
        Self { handler, ctx }
    }

    pub(crate) async fn run(self) -> Result<O::Resource> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.ctx.checkpoint(JobStep::FetchOrAcquire)?;
            let handler = upgrade(&self.handler)?;

            let candidate = fetch_or_acquire(&handler, &self.ctx).await?;
            match validate(&handler, &self.ctx, JobStep::Validate, candidate).await? {
                Validation::Ready(resource) => {
                    debug!(job_id = %self.ctx.id(), attempt, "Acquisition finished");
                    return Ok(resource);
                }
                Validation::Rejected => {}
            }
            drop(handler);

            self.ctx.checkpoint(JobStep::RetryWait)?;
            info!(
                job_id = %self.ctx.id(),
                attempt,
                delay_secs = RESOURCE_RETRY_DELAY.as_secs(),
                "Retrying acquisition after delay"
            );
            self.ctx.delay(RESOURCE_RETRY_DELAY).await?;
        }
    }
}

/// Inline acquisition: read or acquire without joining other jobs, validate, retry
///
/// `caller` only labels the logs (method name, or the entry point).
pub(crate) async fn acquire_inline<O: ResourceOwner>(
    handler: &Weak<HandlerShared<O>>,
    ctx: &JobContext,
    caller: &str,
) -> Result<O::Resource> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        ctx.checkpoint(JobStep::GetResource)?;
        let shared = upgrade(handler)?;
        let candidate = fetch_or_acquire(&shared, ctx).await?;

        match validate(&shared, ctx, JobStep::OnResource, candidate).await? {
            Validation::Ready(resource) => return Ok(resource),
            Validation::Rejected => {}
        }
        drop(shared);

        ctx.checkpoint(JobStep::RetryWait)?;
        info!(
            job_id = %ctx.id(),
            caller = %caller,
            attempt,
            delay_secs = RESOURCE_RETRY_DELAY.as_secs(),
            "Retrying inline acquisition after delay"
        );
        ctx.delay(RESOURCE_RETRY_DELAY).await?;
    }
}

/// Serialized entry point: join the handler's in-flight acquisition or start one
pub(crate) async fn get_hold_of_resource<O: ResourceOwner>(
    handler: &Arc<HandlerShared<O>>,
) -> Result<O::Resource> {
    let weak = Arc::downgrade(handler);
    let ctx = handler.scheduler.context(JobKind::Acquisition);
    handler
        .scheduler
        .run_serialized(ACQUISITION_KEY, move || AcquisitionJob::new(weak, ctx).run())
        .await
}
