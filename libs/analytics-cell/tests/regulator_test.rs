use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;
use tower::ServiceExt;

use analytics_cell::{
    regulator_routes, AnalyticsError, Period, RegulatorService, StatisticsService,
};
use shared_database::{
    ClinicFilter, DateRange, MarketplaceStore, NewComplaint, StatisticsScope,
};
use shared_models::{ComplaintStatus, PriceListItem, Specialization, Statistics};
use shared_utils::test_utils::TestFixture;

fn days_ago(n: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(n)
}

fn regional(date: NaiveDate, plans: i64, caries: i64, wait: f64) -> Statistics {
    Statistics {
        date,
        clinic_id: None,
        treatment_plans_generated: plans,
        appointments_completed: plans / 2,
        total_revenue: plans * 100_000,
        patient_count: plans,
        caries_count: caries,
        pulpitis_count: 2,
        periodontitis_count: 1,
        gingivitis_count: 1,
        parodontitis_count: 0,
        average_wait_days: wait,
        average_treatment_cost: 120_000,
        ..Statistics::default()
    }
}

fn per_clinic(clinic_id: i64, date: NaiveDate, patients: i64) -> Statistics {
    Statistics {
        date,
        clinic_id: Some(clinic_id),
        patient_count: patients,
        total_revenue: patients * 80_000,
        average_wait_days: 1.5,
        caries_count: 100,
        ..Statistics::default()
    }
}

async fn seeded() -> TestFixture {
    let fx = TestFixture::new().await;
    fx.store.insert_statistics(regional(days_ago(0), 10, 6, 2.0)).await;
    fx.store.insert_statistics(regional(days_ago(5), 20, 2, 4.0)).await;
    // Boundary day of a 30 day window
    fx.store.insert_statistics(regional(days_ago(30), 4, 2, 6.0)).await;
    fx.store.insert_statistics(regional(days_ago(31), 1_000, 1_000, 99.0)).await;
    fx.store.insert_statistics(per_clinic(fx.clinic.id, days_ago(3), 40)).await;
    fx.store.insert_statistics(per_clinic(fx.clinic.id, days_ago(1), 45)).await;
    fx.store.insert_statistics(per_clinic(fx.rival_clinic.id, days_ago(2), 12)).await;
    fx
}

#[tokio::test]
async fn statistics_never_mix_scopes() {
    let fx = seeded().await;
    let service = StatisticsService::new(&fx.state);
    let range = DateRange::new(days_ago(90), days_ago(0));

    let regional_rows = service
        .get_statistics(range, StatisticsScope::Regional)
        .await
        .unwrap();
    assert_eq!(regional_rows.len(), 4);
    assert!(regional_rows.iter().all(|r| r.clinic_id.is_none()));
    assert!(regional_rows.windows(2).all(|w| w[0].date <= w[1].date));

    let clinic_rows = service
        .get_statistics(range, StatisticsScope::Clinic(fx.clinic.id))
        .await
        .unwrap();
    assert_eq!(clinic_rows.len(), 2);
    assert!(clinic_rows.iter().all(|r| r.clinic_id == Some(fx.clinic.id)));
}

#[tokio::test]
async fn dashboard_rolls_up_the_selected_period() {
    let fx = seeded().await;
    let service = RegulatorService::new(&fx.state);

    let dashboard = service.dashboard(Period::ThirtyDays).await.unwrap();
    assert_eq!(dashboard.time_series.len(), 3);
    assert_eq!(dashboard.summary.total_clinics, 2);

    let rollup = &dashboard.summary.rollup;
    assert_eq!(rollup.total_treatment_plans, 34);
    assert_eq!(rollup.total_appointments, 5 + 10 + 2);
    assert_eq!(rollup.total_revenue, 3_400_000);
    assert_eq!(rollup.average_wait_days, 4.0);
    assert_eq!(rollup.average_treatment_cost, 120_000);
    assert_eq!(dashboard.disease_statistics.caries, 10);

    let week = service.dashboard(Period::SevenDays).await.unwrap();
    assert_eq!(week.time_series.len(), 2);
    assert_eq!(week.summary.rollup.total_treatment_plans, 30);
}

#[tokio::test]
async fn empty_period_gives_zero_averages() {
    let fx = TestFixture::new().await;
    let service = RegulatorService::new(&fx.state);

    let dashboard = service.dashboard(Period::NinetyDays).await.unwrap();
    assert!(dashboard.time_series.is_empty());
    assert_eq!(dashboard.summary.rollup.average_wait_days, 0.0);
    assert_eq!(dashboard.summary.rollup.average_treatment_cost, 0);

    let analytics = service.disease_analytics(Period::NinetyDays).await.unwrap();
    assert_eq!(analytics.total_cases, 0);
    assert!(analytics.diseases.iter().all(|d| d.percentage == 0.0));
}

#[tokio::test]
async fn disease_analytics_use_regional_rows_only() {
    let fx = seeded().await;
    let service = RegulatorService::new(&fx.state);

    let analytics = service.disease_analytics(Period::ThirtyDays).await.unwrap();
    // caries 10, pulpitis 6, periodontitis 3, gingivitis 3, parodontitis 0
    assert_eq!(analytics.total_cases, 22);
    let names: Vec<_> = analytics.diseases.iter().map(|d| d.disease).collect();
    assert_eq!(
        names,
        ["caries", "pulpitis", "periodontitis", "gingivitis", "parodontitis"]
    );
    let sum: f64 = analytics.diseases.iter().map(|d| d.percentage).sum();
    assert!((sum - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn scoped_statistics_carry_the_clinic() {
    let fx = seeded().await;
    let service = RegulatorService::new(&fx.state);

    let report = service
        .statistics(Period::ThirtyDays, Some(fx.rival_clinic.id))
        .await
        .unwrap();
    assert_eq!(report.statistics.len(), 1);
    assert_eq!(report.clinic.map(|c| c.name), Some("Smile Care".to_string()));

    let regional_report = service.statistics(Period::ThirtyDays, None).await.unwrap();
    assert!(regional_report.clinic.is_none());
    assert_eq!(regional_report.statistics.len(), 3);
}

#[tokio::test]
async fn clinics_come_with_latest_figures() {
    let fx = seeded().await;
    let service = RegulatorService::new(&fx.state);

    let clinics = service.clinics(&ClinicFilter::default()).await.unwrap();
    let names: Vec<_> = clinics.iter().map(|c| c.clinic.name.as_str()).collect();
    assert_eq!(names, ["Smile Care", "Dental Lux"]);
    assert_eq!(clinics[1].patient_count, 45);
    assert_eq!(clinics[0].patient_count, 12);

    let filtered = service
        .clinics(&ClinicFilter {
            city: Some("Almaty".into()),
            district: Some("Medeu".into()),
        })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].clinic.id, fx.clinic.id);
}

#[tokio::test]
async fn clinic_details_count_price_list_and_appointments() {
    let fx = seeded().await;
    fx.store
        .insert_price_item(PriceListItem {
            clinic_id: fx.clinic.id,
            specialization: Specialization::Therapy,
            service_name: "Composite filling".into(),
            price: 25_000,
            ..PriceListItem::default()
        })
        .await;
    let service = RegulatorService::new(&fx.state);

    let details = service
        .clinic_details(fx.clinic.id, Period::SevenDays)
        .await
        .unwrap();
    assert_eq!(details.statistics.len(), 2);
    assert_eq!(details.rollup.total_patients, 85);
    assert_eq!(details.price_list_count, 1);
    assert_eq!(details.appointments_count, 0);

    assert_matches!(
        service.clinic_details(777, Period::SevenDays).await,
        Err(AnalyticsError::ClinicNotFound(777))
    );
}

#[tokio::test]
async fn complaints_filter_by_status() {
    let fx = TestFixture::new().await;
    fx.store
        .insert_complaint(&NewComplaint {
            patient_id: fx.patient.id,
            clinic_id: fx.clinic.id,
            subject: "Late appointment".into(),
            description: "Waited two hours".into(),
        })
        .await
        .unwrap();
    let service = RegulatorService::new(&fx.state);

    assert_eq!(service.complaints(None).await.unwrap().len(), 1);
    assert_eq!(
        service
            .complaints(Some(ComplaintStatus::Open))
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(service
        .complaints(Some(ComplaintStatus::Resolved))
        .await
        .unwrap()
        .is_empty());
}

async fn get_json(fx: &TestFixture, uri: &str, bearer: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", bearer)
        .body(Body::empty())
        .unwrap();
    let response = regulator_routes(fx.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn dashboard_endpoint_reports_period_and_summary() {
    let fx = seeded().await;

    let (status, body) = get_json(
        &fx,
        "/dashboard?period=7d",
        fx.bearer(&fx.regulator_user),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["period"], "7d");
    assert_eq!(body["summary"]["total_clinics"], 2);
    assert_eq!(body["summary"]["total_treatment_plans"], 30);
    assert_eq!(body["disease_statistics"]["caries"], 8);
    assert_eq!(body["time_series"].as_array().unwrap().len(), 2);

    let (_, body) = get_json(&fx, "/dashboard?period=2w", fx.bearer(&fx.regulator_user)).await;
    assert_eq!(body["period"], "30d");
}

#[tokio::test]
async fn regulator_endpoints_reject_other_roles() {
    let fx = seeded().await;

    let (status, _) = get_json(&fx, "/dashboard", fx.bearer(&fx.clinic_user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get_json(&fx, "/complaints", fx.bearer(&fx.patient_user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_clinic_details_are_not_found() {
    let fx = seeded().await;

    let (status, body) = get_json(&fx, "/clinics/4040", fx.bearer(&fx.regulator_user)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Clinic 4040 not found");

    let (status, body) = get_json(
        &fx,
        &format!("/clinics/{}?period=90d", fx.clinic.id),
        fx.bearer(&fx.regulator_user),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clinic"]["name"], "Dental Lux");
    assert_eq!(body["statistics"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn disease_endpoint_lists_diseases_in_fixed_order() {
    let fx = seeded().await;

    let (status, body) = get_json(&fx, "/disease-analytics", fx.bearer(&fx.regulator_user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_cases"], 22);
    assert_eq!(body["diseases"][0]["disease"], "caries");
    assert_eq!(body["diseases"][4]["disease"], "parodontitis");
    assert_eq!(body["diseases"][4]["percentage"], 0.0);
}
