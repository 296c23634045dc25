//! crates/course_market_core/src/checkout.rs
//!
//! The purchase lifecycle: pending purchase + provider checkout session, then the
//! asynchronous provider confirmation that completes the purchase and grants the
//! entitlement.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    amount_from_minor_units, amount_to_minor_units, CourseDetails, Purchase, PurchaseStatus,
    PurchasedCourse,
};
use crate::ports::{
    CheckoutRequest, DatabaseService, PaymentEvent, PaymentService, PortError, PortResult,
};

/// Static inputs for building provider checkout requests.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    /// Base URL of the browser client; success and cancel pages hang off it.
    pub frontend_url: String,
}

impl CheckoutSettings {
    fn success_url(&self, course_id: Uuid) -> String {
        format!(
            "{}/course-progress/{}",
            self.frontend_url.trim_end_matches('/'),
            course_id
        )
    }

    fn cancel_url(&self, course_id: Uuid) -> String {
        format!(
            "{}/course-details/{}",
            self.frontend_url.trim_end_matches('/'),
            course_id
        )
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub purchase_id: Uuid,
    pub checkout_url: String,
}

/// What a verified provider event did to the purchase store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Completed { purchase_id: Uuid },
    Failed { purchase_id: Uuid },
    /// The event was valid but required no change.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PurchaseStatusView {
    pub course: CourseDetails,
    pub purchased: bool,
}

pub struct CheckoutOrchestrator {
    db: Arc<dyn DatabaseService>,
    payments: Arc<dyn PaymentService>,
    settings: CheckoutSettings,
}

impl CheckoutOrchestrator {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        payments: Arc<dyn PaymentService>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            db,
            payments,
            settings,
        }
    }

    /// Creates a pending purchase and a provider checkout session for it.
    ///
    /// If the provider call fails, the pending purchase stays behind without a
    /// session id.
    pub async fn initiate_checkout(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<CheckoutStarted> {
        let course = self.db.get_course(course_id).await?;
        let price = course
            .price
            .ok_or_else(|| PortError::Validation("Course has no price set".to_string()))?;
        let unit_amount = amount_to_minor_units(price)
            .ok_or_else(|| PortError::Validation("Course price is out of range".to_string()))?;

        let existing = self.db.find_purchases(user_id, course_id).await?;
        if existing
            .iter()
            .any(|purchase| purchase.status == PurchaseStatus::Completed)
        {
            return Err(PortError::Validation("Course already purchased".to_string()));
        }

        let purchase = Purchase::new_pending(user_id, course_id, price);
        self.db.insert_purchase(&purchase).await?;

        let request = CheckoutRequest {
            product_name: course.title.clone(),
            product_image: course.thumbnail_url.clone(),
            unit_amount,
            currency: self.settings.currency.clone(),
            success_url: self.settings.success_url(course_id),
            cancel_url: self.settings.cancel_url(course_id),
            metadata: vec![
                ("courseId".to_string(), course_id.to_string()),
                ("userId".to_string(), user_id.to_string()),
            ],
        };
        let session = self.payments.create_checkout_session(request).await?;

        self.db
            .attach_payment_session(purchase.id, &session.id)
            .await?;
        info!(
            purchase_id = %purchase.id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutStarted {
            purchase_id: purchase.id,
            checkout_url: session.url,
        })
    }

    /// Verifies and applies a provider callback.
    ///
    /// A completion for an unknown session fails with `NotFound` and changes
    /// nothing. The purchase is marked completed only after every entitlement
    /// write has succeeded, so a failure midway leaves it pending and a
    /// redelivery of the same event finishes the job. A zero provider total
    /// keeps the stored price.
    pub async fn handle_payment_confirmation(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PortResult<ConfirmationOutcome> {
        let event = self.payments.verify_webhook(payload, signature)?;

        match event {
            PaymentEvent::CheckoutCompleted {
                session_id,
                amount_total,
            } => self.complete_purchase(&session_id, amount_total).await,
            PaymentEvent::CheckoutFailed { session_id } => self.fail_purchase(&session_id).await,
            PaymentEvent::PaymentPending { session_id } => {
                info!(session_id = %session_id, "Checkout finished with payment still pending");
                Ok(ConfirmationOutcome::Ignored)
            }
            PaymentEvent::Other { event_type } => {
                info!(event_type = %event_type, "Ignoring payment event");
                Ok(ConfirmationOutcome::Ignored)
            }
        }
    }

    async fn complete_purchase(
        &self,
        session_id: &str,
        amount_total: Option<i64>,
    ) -> PortResult<ConfirmationOutcome> {
        let mut purchase = self
            .db
            .find_purchase_by_session(session_id)
            .await?
            .ok_or_else(|| PortError::NotFound("Purchase not found".to_string()))?;

        if purchase.status == PurchaseStatus::Failed {
            warn!(
                purchase_id = %purchase.id,
                "Completion received for a failed purchase; leaving it unchanged"
            );
            return Ok(ConfirmationOutcome::Ignored);
        }

        let course = self.db.get_course(purchase.course_id).await?;
        if !course.lectures.is_empty() {
            self.db.set_lectures_preview_free(&course.lectures).await?;
        }
        self.db
            .add_enrolled_course(purchase.user_id, course.id)
            .await?;
        self.db
            .add_enrolled_student(course.id, purchase.user_id)
            .await?;

        purchase.transition_to(PurchaseStatus::Completed)?;
        if let Some(total) = amount_total.filter(|total| *total > 0) {
            purchase.amount = amount_from_minor_units(total);
        }
        if !self.db.update_purchase(&purchase).await? {
            warn!(
                purchase_id = %purchase.id,
                "Purchase was settled concurrently; completion not recorded"
            );
            return Ok(ConfirmationOutcome::Ignored);
        }

        info!(
            purchase_id = %purchase.id,
            user_id = %purchase.user_id,
            course_id = %purchase.course_id,
            "Purchase completed and user enrolled"
        );
        Ok(ConfirmationOutcome::Completed {
            purchase_id: purchase.id,
        })
    }

    async fn fail_purchase(&self, session_id: &str) -> PortResult<ConfirmationOutcome> {
        let Some(mut purchase) = self.db.find_purchase_by_session(session_id).await? else {
            warn!(session_id = %session_id, "Failure event for unknown checkout session");
            return Ok(ConfirmationOutcome::Ignored);
        };

        if purchase.status != PurchaseStatus::Pending {
            return Ok(ConfirmationOutcome::Ignored);
        }

        purchase.transition_to(PurchaseStatus::Failed)?;
        if !self.db.update_purchase(&purchase).await? {
            warn!(
                purchase_id = %purchase.id,
                "Purchase was settled concurrently; failure not recorded"
            );
            return Ok(ConfirmationOutcome::Ignored);
        }
        info!(purchase_id = %purchase.id, "Purchase marked failed");

        Ok(ConfirmationOutcome::Failed {
            purchase_id: purchase.id,
        })
    }

    /// Resolves the course and whether the user holds a completed purchase of it.
    pub async fn get_purchase_status(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<PurchaseStatusView> {
        let course = self.db.get_course_details(course_id).await?;
        let purchased = self
            .db
            .find_purchases(user_id, course_id)
            .await?
            .iter()
            .any(|purchase| purchase.status == PurchaseStatus::Completed);

        Ok(PurchaseStatusView { course, purchased })
    }

    pub async fn list_purchased_courses(&self) -> PortResult<Vec<PurchasedCourse>> {
        self.db.list_completed_purchases().await
    }
}
