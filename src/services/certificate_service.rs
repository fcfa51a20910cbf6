use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::database::SharedStore;
use crate::error::{Error, Result};
use crate::models::course::Course;
use crate::models::enrollment::Enrollment;
use crate::models::event::ProgressEvent;
use crate::utils::crypto;

const NUMBER_SUFFIX_LEN: usize = 8;
const VERIFICATION_CODE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Certificate {
    pub certificate_number: String,
    pub verification_code: String,
    pub enrollment_id: Uuid,
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub final_exam_score: Option<i32>,
    pub issued_at: DateTime<Utc>,
}

/// Decides and stamps certificate issuance. Numbers are derived from the
/// enrollment id, so issuing is idempotent without a sequence.
#[derive(Clone)]
pub struct CertificateIssuer {
    prefix: String,
    secret: String,
}

impl CertificateIssuer {
    pub fn new(prefix: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            secret: secret.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.certificate_prefix, &config.certificate_secret)
    }

    pub fn certificate_number(&self, enrollment_id: Uuid) -> String {
        let hex = enrollment_id.simple().to_string().to_uppercase();
        format!("{}-{}", self.prefix, &hex[..NUMBER_SUFFIX_LEN])
    }

    pub fn verification_code(&self, enrollment_id: Uuid) -> Result<String> {
        let signature = crypto::sign_hex(&self.secret, enrollment_id.as_bytes())?;
        Ok(signature[..VERIFICATION_CODE_LEN].to_uppercase())
    }

    /// Applies a passing final exam to the enrollment. Certificate fields are
    /// only ever set once; a repeated call returns `None` and changes nothing.
    pub fn on_final_exam_passed(
        &self,
        course: &Course,
        enrollment: &mut Enrollment,
        now: DateTime<Utc>,
    ) -> Option<ProgressEvent> {
        enrollment.final_exam_passed = true;
        enrollment.progress_percentage = 100;
        enrollment.mark_completed(now);

        if !course.certificate_enabled || enrollment.certificate_issued {
            return None;
        }
        enrollment.certificate_issued = true;
        enrollment.certificate_issued_at.get_or_insert(now);

        let certificate_number = self.certificate_number(enrollment.id);
        tracing::info!(
            learner_id = %enrollment.learner_id,
            course_id = %enrollment.course_id,
            %certificate_number,
            "certificate issued"
        );
        Some(ProgressEvent::CertificateIssued { certificate_number })
    }

    pub fn certificate(&self, enrollment: &Enrollment) -> Result<Option<Certificate>> {
        let issued_at = match (enrollment.certificate_issued, enrollment.certificate_issued_at) {
            (true, Some(at)) => at,
            _ => return Ok(None),
        };
        Ok(Some(Certificate {
            certificate_number: self.certificate_number(enrollment.id),
            verification_code: self.verification_code(enrollment.id)?,
            enrollment_id: enrollment.id,
            learner_id: enrollment.learner_id,
            course_id: enrollment.course_id,
            final_exam_score: enrollment.final_exam_best_score,
            issued_at,
        }))
    }

    /// Lower-case id prefix encoded in a certificate number, if the number
    /// is well formed for this issuer.
    fn id_prefix(&self, certificate_number: &str) -> Option<String> {
        let (prefix, suffix) = certificate_number.trim().rsplit_once('-')?;
        if !prefix.eq_ignore_ascii_case(&self.prefix)
            || suffix.len() != NUMBER_SUFFIX_LEN
            || !suffix.chars().all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }
        Some(suffix.to_ascii_lowercase())
    }
}

#[derive(Clone)]
pub struct CertificateService {
    store: SharedStore,
    issuer: CertificateIssuer,
}

impl CertificateService {
    pub fn new(store: SharedStore, issuer: CertificateIssuer) -> Self {
        Self { store, issuer }
    }

    pub async fn certificate(&self, learner_id: Uuid, course_id: Uuid) -> Result<Certificate> {
        let mut tx = self.store.begin().await?;
        let enrollment = tx
            .enrollment(learner_id, course_id)
            .await?
            .ok_or(Error::NotEnrolled(course_id))?;
        self.issuer
            .certificate(&enrollment)?
            .ok_or_else(|| Error::NotFound("Certificate has not been issued".to_string()))
    }

    /// Public lookup by number and verification code.
    pub async fn verify(&self, certificate_number: &str, code: &str) -> Result<Certificate> {
        let not_found = || Error::NotFound("Certificate not found".to_string());
        let id_prefix = self.issuer.id_prefix(certificate_number).ok_or_else(not_found)?;

        let mut tx = self.store.begin().await?;
        for enrollment in tx.certified_enrollments(&id_prefix).await? {
            let expected = self.issuer.verification_code(enrollment.id)?;
            if crypto::constant_time_eq(code.trim(), &expected) {
                return self.issuer.certificate(&enrollment)?.ok_or_else(not_found);
            }
        }

        tracing::warn!(%certificate_number, "certificate verification failed");
        Err(not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enrollment::EnrollmentStatus;

    fn issuer() -> CertificateIssuer {
        CertificateIssuer::new("ICMS", "test-secret")
    }

    #[test]
    fn number_uses_enrollment_id() {
        let id = Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap();
        assert_eq!(issuer().certificate_number(id), "ICMS-3F2A9C1E");
        assert_eq!(issuer().id_prefix("icms-3F2A9C1E").as_deref(), Some("3f2a9c1e"));
        assert_eq!(issuer().id_prefix("OTHER-3F2A9C1E"), None);
        assert_eq!(issuer().id_prefix("ICMS-3F2A"), None);
    }

    #[test]
    fn verification_code_depends_on_secret() {
        let id = Uuid::new_v4();
        let code = issuer().verification_code(id).unwrap();
        assert_eq!(code.len(), 12);
        assert_eq!(code, issuer().verification_code(id).unwrap());
        assert_ne!(code, CertificateIssuer::new("ICMS", "rotated").verification_code(id).unwrap());
    }

    #[test]
    fn issuance_happens_once() {
        let course = Course::new("safety-101");
        let mut enrollment = Enrollment::new(Uuid::new_v4(), course.id, Utc::now());
        let first = Utc::now();

        let event = issuer().on_final_exam_passed(&course, &mut enrollment, first);
        assert!(matches!(event, Some(ProgressEvent::CertificateIssued { .. })));
        assert!(enrollment.final_exam_passed);
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
        assert_eq!(enrollment.progress_percentage, 100);
        assert_eq!(enrollment.certificate_issued_at, Some(first));

        assert_eq!(issuer().on_final_exam_passed(&course, &mut enrollment, Utc::now()), None);
        assert_eq!(enrollment.certificate_issued_at, Some(first));
    }

    #[test]
    fn disabled_certificates_still_complete_the_course() {
        let mut course = Course::new("no-cert");
        course.certificate_enabled = false;
        let mut enrollment = Enrollment::new(Uuid::new_v4(), course.id, Utc::now());
        assert_eq!(issuer().on_final_exam_passed(&course, &mut enrollment, Utc::now()), None);
        assert!(enrollment.final_exam_passed);
        assert!(!enrollment.certificate_issued);
        assert!(issuer().certificate(&enrollment).unwrap().is_none());
    }
}
