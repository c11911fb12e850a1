// Runs against a real PostgreSQL when DATABASE_URL is set.

use assert_matches::assert_matches;

use patient_cell::{CreateReviewRequest, PatientError, ReviewService};
use shared_database::MarketplaceStore;
use shared_utils::test_utils::PgFixture;

async fn fixture() -> Option<PgFixture> {
    let fx = PgFixture::connect().await;
    if fx.is_none() {
        println!("Skipping PostgreSQL tests (set DATABASE_URL to enable)");
    }
    fx
}

fn review(clinic_id: i64, rating: i32) -> CreateReviewRequest {
    CreateReviewRequest {
        clinic_id,
        rating,
        comment: Some("Friendly staff".to_string()),
    }
}

#[tokio::test]
async fn concurrent_reviews_on_postgres_keep_the_rating_exact() {
    let Some(fx) = fixture().await else { return };
    let ratings = [5, 4, 3, 5, 1, 2, 4, 5];

    let handles: Vec<_> = ratings
        .iter()
        .map(|&rating| {
            let state = fx.state.clone();
            let patient = fx.patient.clone();
            let clinic_id = fx.clinic.id;
            tokio::spawn(async move {
                ReviewService::new(&state)
                    .create_review(&patient, review(clinic_id, rating))
                    .await
            })
        })
        .collect();
    for joined in futures::future::join_all(handles).await {
        joined.expect("task panicked").unwrap();
    }

    let stored = fx.store.reviews_for_clinic(fx.clinic.id).await.unwrap();
    assert_eq!(stored.len(), ratings.len());
    let mean = stored.iter().map(|r| r.rating).sum::<i32>() as f64 / stored.len() as f64;

    let clinic = fx.store.clinic_by_id(fx.clinic.id).await.unwrap().unwrap();
    assert_eq!(clinic.review_count, ratings.len() as i64);
    assert!((clinic.rating - mean).abs() < 1e-9, "{} != {}", clinic.rating, mean);

    let rival = fx.store.clinic_by_id(fx.rival_clinic.id).await.unwrap().unwrap();
    assert_eq!(rival.review_count, 0);
    assert_eq!(rival.rating, 4.8);
}

#[tokio::test]
async fn review_for_unknown_clinic_on_postgres_is_not_found() {
    let Some(fx) = fixture().await else { return };

    assert_matches!(
        ReviewService::new(&fx.state)
            .create_review(&fx.patient, review(-1, 3))
            .await,
        Err(PatientError::ClinicNotFound(-1))
    );
}
