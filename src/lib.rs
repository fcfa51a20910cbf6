pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::database::SharedStore;
use crate::services::{
    certificate_service::{CertificateIssuer, CertificateService},
    enrollment_service::EnrollmentService,
    final_exam_service::FinalExamService,
    progress_service::ProgressService,
    quiz_service::QuizService,
    slide_service::SlideService,
    unlock_service::UnlockPolicy,
};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub enrollment_service: EnrollmentService,
    pub progress_service: ProgressService,
    pub slide_service: SlideService,
    pub quiz_service: QuizService,
    pub final_exam_service: FinalExamService,
    pub certificate_service: CertificateService,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        let config = crate::config::get_config();
        Self::with_settings(
            store,
            config.unlock_policy,
            CertificateIssuer::from_config(config),
        )
    }

    pub fn with_settings(store: SharedStore, policy: UnlockPolicy, issuer: CertificateIssuer) -> Self {
        Self {
            enrollment_service: EnrollmentService::new(store.clone(), policy, issuer.clone()),
            progress_service: ProgressService::new(store.clone(), policy),
            slide_service: SlideService::new(store.clone(), policy),
            quiz_service: QuizService::new(store.clone(), policy),
            final_exam_service: FinalExamService::new(store.clone(), policy, issuer.clone()),
            certificate_service: CertificateService::new(store.clone(), issuer),
            store,
        }
    }
}
