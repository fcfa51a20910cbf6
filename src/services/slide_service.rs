use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::database::SharedStore;
use crate::error::{Error, Result};
use crate::models::event::ProgressEvent;
use crate::services::gating_service::ModuleState;
use crate::services::progress_service::{aggregate, CourseProgress, LearnerContext};
use crate::services::unlock_service::UnlockPolicy;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlideViewOutcome {
    pub module_number: i32,
    pub slide_number: i32,
    pub slides_viewed: i32,
    pub total_slides: i32,
    pub all_slides_viewed: bool,
    pub module_state: ModuleState,
    pub course_progress: CourseProgress,
    pub events: Vec<ProgressEvent>,
}

#[derive(Clone)]
pub struct SlideService {
    store: SharedStore,
    policy: UnlockPolicy,
}

impl SlideService {
    pub fn new(store: SharedStore, policy: UnlockPolicy) -> Self {
        Self { store, policy }
    }

    /// Records a slide view. Viewing the same slide again only moves the
    /// resume pointer.
    pub async fn mark_viewed(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
        module_number: i32,
        slide_number: i32,
    ) -> Result<SlideViewOutcome> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut ctx = LearnerContext::load(tx.as_mut(), learner_id, course_id).await?;
        let module = ctx.module(module_number)?;

        if slide_number < 1 || slide_number > module.total_slides {
            return Err(Error::BadRequest(format!(
                "Slide {} is out of range 1..={} for module {}",
                slide_number, module.total_slides, module_number
            )));
        }
        if !ctx.state_of(module_number).is_open() {
            return Err(Error::ModuleLocked(module_number));
        }

        let progress = ctx.ensure_progress(tx.as_mut(), &module, now).await?;
        let first_view = progress.completed_slides.insert(slide_number);
        progress.current_slide = slide_number;
        progress.last_accessed_at = now;
        let slides_viewed = progress.slides_viewed();

        ctx.enrollment.mark_started(now);
        let events = ctx.settle(self.policy, now);
        ctx.persist(tx.as_mut()).await?;
        tx.commit().await?;

        if first_view {
            tracing::debug!(
                %learner_id,
                %course_id,
                module_number,
                slide_number,
                "slide recorded"
            );
        }

        let states = ctx.states();
        Ok(SlideViewOutcome {
            module_number,
            slide_number,
            slides_viewed,
            total_slides: module.total_slides,
            all_slides_viewed: slides_viewed >= module.total_slides,
            module_state: ctx.state_of(module_number),
            course_progress: aggregate(&states),
            events,
        })
    }
}
