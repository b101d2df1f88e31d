/// Enroll and cancel flows through the reservation coordinator
use lessonbank::{
    models::{
        booking::{Enrollment, EnrollmentStatus},
        ledger::{CreditKey, CreditReason},
    },
    services::PaymentConfirmed,
    ApiError,
};
use time::macros::datetime;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::setup_test_environment;

#[tokio::test]
async fn test_math_enroll_and_cancel_scenario() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));
    let student_id = Uuid::new_v4();
    let math = Uuid::new_v4();
    let key = CreditKey::new(student_id, math);
    let session_id = env.add_session(math, 72).await;

    // Balance 0: enroll fails, nothing is created
    let err = env
        .state
        .reservations
        .enroll(student_id, session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NoCreditsAvailable { .. }));
    assert!(env.store.ledger().await.is_empty());

    // Admin grants 4 credits
    env.state
        .credits_service
        .admin_adjust(student_id, math, 4, Some("Trial package".to_string()))
        .await
        .unwrap();

    let enrollment = env
        .state
        .reservations
        .enroll(student_id, session_id)
        .await
        .unwrap();
    assert_eq!(enrollment.credits_reserved, 1);
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
    assert_eq!(env.stored_balance(key).await, 3);
    assert_eq!(
        env.store.enrollment(enrollment.id).await.unwrap().credits_reserved,
        1
    );

    // Cancel with the session still 72h away
    let cancelled = env
        .state
        .reservations
        .cancel(enrollment.id)
        .await
        .unwrap();
    assert_eq!(cancelled.credits_reserved, 0);
    assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);
    assert_eq!(env.stored_balance(key).await, 4);

    let stored = env.store.enrollment(enrollment.id).await.unwrap();
    assert_eq!(stored.credits_reserved, 0);
    assert_eq!(stored.cancelled_at, Some(datetime!(2025-03-10 10:00 UTC)));
}

#[tokio::test]
async fn test_cancel_after_session_start_keeps_credit() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));
    let student_id = Uuid::new_v4();
    let subject_id = Uuid::new_v4();
    let key = CreditKey::new(student_id, subject_id);
    let session_id = env.add_session(subject_id, 2).await;

    env.state
        .credits_service
        .admin_adjust(student_id, subject_id, 2, None)
        .await
        .unwrap();
    let enrollment = env
        .state
        .reservations
        .enroll(student_id, session_id)
        .await
        .unwrap();

    env.clock.advance(time::Duration::hours(3));
    let cancelled = env
        .state
        .reservations
        .cancel(enrollment.id)
        .await
        .unwrap();

    assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);
    assert_eq!(cancelled.credits_reserved, 1);
    assert_eq!(env.stored_balance(key).await, 1);
    assert!(!env
        .store
        .ledger()
        .await
        .iter()
        .any(|e| e.reason == CreditReason::EnrollRelease));
}

#[tokio::test]
async fn test_cancel_without_reserved_credit_does_not_release() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));
    let student_id = Uuid::new_v4();
    let subject_id = Uuid::new_v4();
    let key = CreditKey::new(student_id, subject_id);
    let session_id = env.add_session(subject_id, 48).await;

    env.state
        .credits_service
        .admin_adjust(student_id, subject_id, 2, None)
        .await
        .unwrap();

    // Active but holding no credit, e.g. a complimentary seat
    let enrollment_id = Uuid::new_v4();
    env.store
        .add_enrollment(Enrollment {
            id: enrollment_id,
            session_id,
            student_id,
            status: EnrollmentStatus::Active,
            credits_reserved: 0,
            created_at: datetime!(2025-03-09 10:00 UTC),
            cancelled_at: None,
        })
        .await;

    let cancelled = env.state.reservations.cancel(enrollment_id).await.unwrap();

    assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);
    assert_eq!(cancelled.credits_reserved, 0);
    assert_eq!(env.stored_balance(key).await, 2);
    assert!(!env
        .store
        .ledger()
        .await
        .iter()
        .any(|e| e.reason == CreditReason::EnrollRelease));
}

#[tokio::test]
async fn test_cancel_twice_releases_once() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));
    let student_id = Uuid::new_v4();
    let subject_id = Uuid::new_v4();
    let key = CreditKey::new(student_id, subject_id);
    let session_id = env.add_session(subject_id, 48).await;

    env.state
        .credits_service
        .admin_adjust(student_id, subject_id, 1, None)
        .await
        .unwrap();
    let enrollment = env
        .state
        .reservations
        .enroll(student_id, session_id)
        .await
        .unwrap();

    let first = env.state.reservations.cancel(enrollment.id).await.unwrap();
    let second = env.state.reservations.cancel(enrollment.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(env.stored_balance(key).await, 1);
    let releases = env
        .store
        .ledger()
        .await
        .iter()
        .filter(|e| e.reason == CreditReason::EnrollRelease)
        .count();
    assert_eq!(releases, 1);
}

#[tokio::test]
async fn test_enroll_rejects_started_unknown_and_duplicate() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));
    let student_id = Uuid::new_v4();
    let subject_id = Uuid::new_v4();
    env.state
        .credits_service
        .admin_adjust(student_id, subject_id, 5, None)
        .await
        .unwrap();

    let started = env.add_session(subject_id, -1).await;
    let err = env
        .state
        .reservations
        .enroll(student_id, started)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let err = env
        .state
        .reservations
        .enroll(student_id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let upcoming = env.add_session(subject_id, 24).await;
    env.state
        .reservations
        .enroll(student_id, upcoming)
        .await
        .unwrap();
    let err = env
        .state
        .reservations
        .enroll(student_id, upcoming)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    assert_eq!(
        env.stored_balance(CreditKey::new(student_id, subject_id))
            .await,
        4
    );
}

#[tokio::test]
async fn test_cancel_unknown_enrollment() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));

    let err = env
        .state
        .reservations
        .cancel(Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_any_subject_package_allocated_once() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));
    let student_id = Uuid::new_v4();
    let math = Uuid::new_v4();
    let physics = Uuid::new_v4();
    let payment_id = Uuid::new_v4();

    env.state
        .payment_events
        .payment_confirmed(PaymentConfirmed {
            payment_id,
            student_id,
            subject_id: None,
            session_count: 4,
        })
        .await
        .unwrap();

    let math_session = env.add_session(math, 24).await;
    env.state
        .reservations
        .enroll(student_id, math_session)
        .await
        .unwrap();
    assert_eq!(env.stored_balance(CreditKey::new(student_id, math)).await, 3);

    // The package now belongs to Math
    let physics_session = env.add_session(physics, 24).await;
    let err = env
        .state
        .reservations
        .enroll(student_id, physics_session)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NoCreditsAvailable { .. }));

    let grants: Vec<_> = env
        .store
        .ledger()
        .await
        .into_iter()
        .filter(|e| e.reason == CreditReason::PaymentCredit)
        .collect();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].payment_id, Some(payment_id));
    assert_eq!(grants[0].key.subject_id, math);
}

#[tokio::test]
async fn test_failed_enroll_keeps_package_unallocated() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));
    let student_id = Uuid::new_v4();
    let subject_id = Uuid::new_v4();

    env.state
        .payment_events
        .payment_confirmed(PaymentConfirmed {
            payment_id: Uuid::new_v4(),
            student_id,
            subject_id: None,
            session_count: 2,
        })
        .await
        .unwrap();

    // The session is already running, so nothing may be allocated
    let started = env.add_session(subject_id, 0).await;
    env.state
        .reservations
        .enroll(student_id, started)
        .await
        .unwrap_err();
    assert!(env.store.ledger().await.is_empty());

    let upcoming = env.add_session(subject_id, 1).await;
    env.state
        .reservations
        .enroll(student_id, upcoming)
        .await
        .unwrap();
    assert_eq!(
        env.stored_balance(CreditKey::new(student_id, subject_id))
            .await,
        1
    );
}

#[tokio::test]
async fn test_concurrent_enrolls_never_overcommit() {
    let env = setup_test_environment(datetime!(2025-03-10 10:00 UTC));
    let student_id = Uuid::new_v4();
    let subject_id = Uuid::new_v4();
    env.state
        .credits_service
        .admin_adjust(student_id, subject_id, 3, None)
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let session_id = env.add_session(subject_id, 24 + i).await;
        let reservations = env.state.reservations.clone();
        tasks.spawn(async move { reservations.enroll(student_id, session_id).await });
    }

    let mut success_count = 0;
    let mut no_credit_count = 0;
    while let Some(result) = tasks.join_next().await {
        match result.expect("enroll task panicked") {
            Ok(_) => success_count += 1,
            Err(ApiError::NoCreditsAvailable { .. }) => no_credit_count += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(success_count, 3);
    assert_eq!(no_credit_count, 7);
    assert_eq!(
        env.stored_balance(CreditKey::new(student_id, subject_id))
            .await,
        0
    );
}
