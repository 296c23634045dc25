mod common;

use std::sync::Arc;

use api_lib::adapters::MemoryDb;
use async_trait::async_trait;
use common::{
    completed_event, expired_event, seed_course, seed_user, session_event, settings, sign, Fixture,
};
use course_market_core::checkout::{CheckoutOrchestrator, ConfirmationOutcome};
use course_market_core::domain::{
    Course, CourseDetails, CourseSearch, Lecture, NewCourse, NewLecture, NewUser, ProgressRecord,
    Purchase, PurchaseStatus, PurchasedCourse, Role, User, UserCredentials,
};
use course_market_core::ports::{DatabaseService, PortError, PortResult};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

/// Serves a fixed purchase snapshot for session lookups, as a replica that
/// has not caught up yet would. Every write goes to the real store.
struct LaggingReads {
    inner: Arc<MemoryDb>,
    snapshot: Purchase,
}

#[async_trait]
impl DatabaseService for LaggingReads {
    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        self.inner.create_user(user).await
    }
    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.inner.get_user_by_id(user_id).await
    }
    async fn get_user_credentials(&self, email: &str) -> PortResult<UserCredentials> {
        self.inner.get_user_credentials(email).await
    }
    async fn add_enrolled_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<()> {
        self.inner.add_enrolled_course(user_id, course_id).await
    }
    async fn update_user_name(&self, user_id: Uuid, name: &str) -> PortResult<User> {
        self.inner.update_user_name(user_id, name).await
    }
    async fn create_course(&self, course: NewCourse) -> PortResult<Course> {
        self.inner.create_course(course).await
    }
    async fn get_course(&self, course_id: Uuid) -> PortResult<Course> {
        self.inner.get_course(course_id).await
    }
    async fn get_course_details(&self, course_id: Uuid) -> PortResult<CourseDetails> {
        self.inner.get_course_details(course_id).await
    }
    async fn update_course(&self, course: &Course) -> PortResult<Course> {
        self.inner.update_course(course).await
    }
    async fn list_courses_by_creator(&self, creator_id: Uuid) -> PortResult<Vec<Course>> {
        self.inner.list_courses_by_creator(creator_id).await
    }
    async fn list_published_courses(&self) -> PortResult<Vec<Course>> {
        self.inner.list_published_courses().await
    }
    async fn search_courses(&self, search: &CourseSearch) -> PortResult<Vec<Course>> {
        self.inner.search_courses(search).await
    }
    async fn delete_course(&self, course_id: Uuid) -> PortResult<()> {
        self.inner.delete_course(course_id).await
    }
    async fn list_courses_by_ids(&self, course_ids: &[Uuid]) -> PortResult<Vec<Course>> {
        self.inner.list_courses_by_ids(course_ids).await
    }
    async fn add_enrolled_student(&self, course_id: Uuid, user_id: Uuid) -> PortResult<()> {
        self.inner.add_enrolled_student(course_id, user_id).await
    }
    async fn create_lecture(&self, lecture: NewLecture) -> PortResult<Lecture> {
        self.inner.create_lecture(lecture).await
    }
    async fn get_lecture(&self, lecture_id: Uuid) -> PortResult<Lecture> {
        self.inner.get_lecture(lecture_id).await
    }
    async fn update_lecture(&self, lecture: &Lecture) -> PortResult<Lecture> {
        self.inner.update_lecture(lecture).await
    }
    async fn delete_lecture(&self, lecture_id: Uuid) -> PortResult<()> {
        self.inner.delete_lecture(lecture_id).await
    }
    async fn set_lectures_preview_free(&self, lecture_ids: &[Uuid]) -> PortResult<()> {
        self.inner.set_lectures_preview_free(lecture_ids).await
    }
    async fn insert_purchase(&self, purchase: &Purchase) -> PortResult<()> {
        self.inner.insert_purchase(purchase).await
    }
    async fn attach_payment_session(&self, purchase_id: Uuid, session_id: &str) -> PortResult<()> {
        self.inner.attach_payment_session(purchase_id, session_id).await
    }
    async fn find_purchase_by_session(&self, _session_id: &str) -> PortResult<Option<Purchase>> {
        Ok(Some(self.snapshot.clone()))
    }
    async fn update_purchase(&self, purchase: &Purchase) -> PortResult<bool> {
        self.inner.update_purchase(purchase).await
    }
    async fn find_purchases(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Vec<Purchase>> {
        self.inner.find_purchases(user_id, course_id).await
    }
    async fn list_completed_purchases(&self) -> PortResult<Vec<PurchasedCourse>> {
        self.inner.list_completed_purchases().await
    }
    async fn get_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<Option<ProgressRecord>> {
        self.inner.get_progress(user_id, course_id).await
    }
    async fn save_progress(&self, record: &ProgressRecord) -> PortResult<()> {
        self.inner.save_progress(record).await
    }
}

#[tokio::test]
async fn confirmed_checkout_enrolls_the_buyer() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 2).await;

    let started = fx
        .checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();
    assert_eq!(started.checkout_url, "https://checkout.example.com/pay/cs_test_1");

    let purchases = fx.db.find_purchases(student.id, course.id).await.unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].status, PurchaseStatus::Pending);
    assert_eq!(purchases[0].amount, Decimal::from(500));
    assert_eq!(purchases[0].payment_session_id.as_deref(), Some("cs_test_1"));

    let request = fx.payments.last_request().unwrap();
    assert_eq!(request.unit_amount, 50_000);
    assert_eq!(request.currency, "inr");
    assert_eq!(
        request.success_url,
        format!("http://localhost:5173/course-progress/{}", course.id)
    );
    assert_eq!(
        request.cancel_url,
        format!("http://localhost:5173/course-details/{}", course.id)
    );
    assert!(request
        .metadata
        .contains(&("courseId".to_string(), course.id.to_string())));
    assert!(request
        .metadata
        .contains(&("userId".to_string(), student.id.to_string())));

    let payload = completed_event("cs_test_1", Some(50_000));
    let outcome = fx
        .checkout
        .handle_payment_confirmation(&payload, &sign(&payload))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ConfirmationOutcome::Completed {
            purchase_id: started.purchase_id
        }
    );

    let purchase = fx
        .db
        .find_purchase_by_session("cs_test_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Completed);
    assert_eq!(purchase.amount, Decimal::from(500));

    let user = fx.db.get_user_by_id(student.id).await.unwrap();
    assert_eq!(user.enrolled_courses, vec![course.id]);
    let details = fx.db.get_course_details(course.id).await.unwrap();
    assert_eq!(details.course.enrolled_students, vec![student.id]);
    assert!(details.lectures.iter().all(|l| l.is_preview_free));

    let status = fx
        .checkout
        .get_purchase_status(student.id, course.id)
        .await
        .unwrap();
    assert!(status.purchased);
}

#[tokio::test]
async fn provider_amount_overrides_the_stored_price() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;

    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();
    let payload = completed_event("cs_test_1", Some(42_050));
    fx.checkout
        .handle_payment_confirmation(&payload, &sign(&payload))
        .await
        .unwrap();

    let purchase = fx
        .db
        .find_purchase_by_session("cs_test_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(purchase.amount, Decimal::new(42_050, 2));
}

#[tokio::test]
async fn confirmation_for_unknown_session_changes_nothing() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;
    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();

    let payload = completed_event("cs_does_not_exist", Some(50_000));
    let err = fx
        .checkout
        .handle_payment_confirmation(&payload, &sign(&payload))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(msg) if msg == "Purchase not found"));

    let purchases = fx.db.find_purchases(student.id, course.id).await.unwrap();
    assert_eq!(purchases[0].status, PurchaseStatus::Pending);
    let user = fx.db.get_user_by_id(student.id).await.unwrap();
    assert!(user.enrolled_courses.is_empty());
}

#[tokio::test]
async fn replayed_confirmation_is_idempotent() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 2).await;
    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();

    let payload = completed_event("cs_test_1", Some(50_000));
    for _ in 0..2 {
        let outcome = fx
            .checkout
            .handle_payment_confirmation(&payload, &sign(&payload))
            .await
            .unwrap();
        assert!(matches!(outcome, ConfirmationOutcome::Completed { .. }));
    }

    let user = fx.db.get_user_by_id(student.id).await.unwrap();
    assert_eq!(user.enrolled_courses, vec![course.id]);
    let course = fx.db.get_course(course.id).await.unwrap();
    assert_eq!(course.enrolled_students, vec![student.id]);
    let completed = fx.checkout.list_purchased_courses().await.unwrap();
    assert_eq!(completed.len(), 1);
}

#[tokio::test]
async fn pending_purchase_does_not_count_as_purchased() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;

    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();
    let status = fx
        .checkout
        .get_purchase_status(student.id, course.id)
        .await
        .unwrap();
    assert!(!status.purchased);
    assert_eq!(status.course.course.id, course.id);
}

#[tokio::test]
async fn repeat_checkout_is_allowed_until_a_purchase_completes() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;

    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();
    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();
    assert_eq!(
        fx.db.find_purchases(student.id, course.id).await.unwrap().len(),
        2
    );

    let payload = completed_event("cs_test_2", Some(50_000));
    fx.checkout
        .handle_payment_confirmation(&payload, &sign(&payload))
        .await
        .unwrap();

    let err = fx
        .checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Validation(msg) if msg == "Course already purchased"));
}

#[tokio::test]
async fn checkout_requires_a_priced_existing_course() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let free = seed_course(fx.db.as_ref(), instructor.id, None, 1).await;

    let err = fx
        .checkout
        .initiate_checkout(student.id, free.id)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));

    let err = fx
        .checkout
        .initiate_checkout(student.id, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
    assert!(fx.payments.last_request().is_none());
}

#[tokio::test]
async fn provider_outage_leaves_an_unattached_pending_purchase() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;
    fx.payments.set_unavailable(true);

    let err = fx
        .checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::ExternalService(_)));

    let purchases = fx.db.find_purchases(student.id, course.id).await.unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].status, PurchaseStatus::Pending);
    assert!(purchases[0].payment_session_id.is_none());
}

#[tokio::test]
async fn tampered_webhook_is_rejected() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;
    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();

    let signed = completed_event("cs_test_1", Some(100));
    let signature = sign(&signed);
    let forged = completed_event("cs_test_1", Some(1));
    let err = fx
        .checkout
        .handle_payment_confirmation(&forged, &signature)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));

    let purchase = fx
        .db
        .find_purchase_by_session("cs_test_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Pending);
}

#[tokio::test]
async fn expired_session_fails_the_purchase_for_good() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;
    let started = fx
        .checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();

    let expired = expired_event("cs_test_1");
    let outcome = fx
        .checkout
        .handle_payment_confirmation(&expired, &sign(&expired))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ConfirmationOutcome::Failed {
            purchase_id: started.purchase_id
        }
    );

    let late = completed_event("cs_test_1", Some(50_000));
    let outcome = fx
        .checkout
        .handle_payment_confirmation(&late, &sign(&late))
        .await
        .unwrap();
    assert_eq!(outcome, ConfirmationOutcome::Ignored);

    let purchase = fx
        .db
        .find_purchase_by_session("cs_test_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Failed);
    let user = fx.db.get_user_by_id(student.id).await.unwrap();
    assert!(user.enrolled_courses.is_empty());
}

#[tokio::test]
async fn unrelated_events_are_acknowledged_and_ignored() {
    let fx = Fixture::new();
    let payload = serde_json::to_vec(&serde_json::json!({
        "id": "evt_1",
        "type": "payment_intent.created",
        "data": { "object": { "id": "pi_1" } }
    }))
    .unwrap();

    let outcome = fx
        .checkout
        .handle_payment_confirmation(&payload, &sign(&payload))
        .await
        .unwrap();
    assert_eq!(outcome, ConfirmationOutcome::Ignored);
}

#[tokio::test]
async fn purchased_courses_list_names_the_buyer() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;
    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();
    assert!(fx.checkout.list_purchased_courses().await.unwrap().is_empty());

    let payload = completed_event("cs_test_1", None);
    fx.checkout
        .handle_payment_confirmation(&payload, &sign(&payload))
        .await
        .unwrap();

    let purchased = fx.checkout.list_purchased_courses().await.unwrap();
    assert_eq!(purchased.len(), 1);
    assert_eq!(purchased[0].buyer_name, "Sam");
    assert_eq!(purchased[0].buyer_email, "sam@example.com");
    assert_eq!(purchased[0].course.id, course.id);
    assert_eq!(purchased[0].purchase.amount, Decimal::from(500));
}

#[tokio::test]
async fn late_expiry_cannot_undo_a_completed_purchase() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;
    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();
    let pending = fx
        .db
        .find_purchase_by_session("cs_test_1")
        .await
        .unwrap()
        .unwrap();

    let payload = completed_event("cs_test_1", Some(50_000));
    fx.checkout
        .handle_payment_confirmation(&payload, &sign(&payload))
        .await
        .unwrap();

    // The expiry handler still reads the purchase as pending.
    let lagging = CheckoutOrchestrator::new(
        Arc::new(LaggingReads {
            inner: fx.db.clone(),
            snapshot: pending,
        }),
        fx.payments.clone(),
        settings(),
    );
    let expired = expired_event("cs_test_1");
    let outcome = lagging
        .handle_payment_confirmation(&expired, &sign(&expired))
        .await
        .unwrap();
    assert_eq!(outcome, ConfirmationOutcome::Ignored);

    let purchase = fx
        .db
        .find_purchase_by_session("cs_test_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Completed);
    let user = fx.db.get_user_by_id(student.id).await.unwrap();
    assert_eq!(user.enrolled_courses, vec![course.id]);
    assert!(fx
        .checkout
        .get_purchase_status(student.id, course.id)
        .await
        .unwrap()
        .purchased);
}

#[tokio::test]
async fn zero_provider_total_keeps_the_stored_price() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;
    fx.checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();

    let payload = completed_event("cs_test_1", Some(0));
    fx.checkout
        .handle_payment_confirmation(&payload, &sign(&payload))
        .await
        .unwrap();

    let purchase = fx
        .db
        .find_purchase_by_session("cs_test_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Completed);
    assert_eq!(purchase.amount, Decimal::from(500));
}

#[tokio::test]
async fn unpaid_session_waits_for_the_async_payment() {
    let fx = Fixture::new();
    let instructor = seed_user(fx.db.as_ref(), "Ines", Role::Instructor).await;
    let student = seed_user(fx.db.as_ref(), "Sam", Role::Student).await;
    let course = seed_course(fx.db.as_ref(), instructor.id, Some(Decimal::from(500)), 1).await;
    let started = fx
        .checkout
        .initiate_checkout(student.id, course.id)
        .await
        .unwrap();

    let unpaid = session_event(
        "checkout.session.completed",
        json!({ "id": "cs_test_1", "amount_total": 50_000, "payment_status": "unpaid" }),
    );
    let outcome = fx
        .checkout
        .handle_payment_confirmation(&unpaid, &sign(&unpaid))
        .await
        .unwrap();
    assert_eq!(outcome, ConfirmationOutcome::Ignored);
    let status = fx
        .checkout
        .get_purchase_status(student.id, course.id)
        .await
        .unwrap();
    assert!(!status.purchased);
    let user = fx.db.get_user_by_id(student.id).await.unwrap();
    assert!(user.enrolled_courses.is_empty());

    let settled = session_event(
        "checkout.session.async_payment_succeeded",
        json!({ "id": "cs_test_1", "amount_total": 50_000, "payment_status": "paid" }),
    );
    let outcome = fx
        .checkout
        .handle_payment_confirmation(&settled, &sign(&settled))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ConfirmationOutcome::Completed {
            purchase_id: started.purchase_id
        }
    );
    let user = fx.db.get_user_by_id(student.id).await.unwrap();
    assert_eq!(user.enrolled_courses, vec![course.id]);
}
