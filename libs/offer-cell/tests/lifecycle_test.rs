use assert_matches::assert_matches;
use chrono::{Duration, Utc};

use offer_cell::{OfferError, OfferService, SubmitOfferRequest};
use shared_database::MarketplaceStore;
use shared_models::{
    AppointmentStatus, Clinic, ClinicOffer, CostBreakdown, OfferStatus, PlanStatus,
};
use shared_utils::test_utils::{sample_plan, Fault, FaultyStore, TestFixture};

fn offer_request(plan_id: i64, costs: CostBreakdown) -> SubmitOfferRequest {
    SubmitOfferRequest {
        treatment_plan_id: plan_id,
        costs,
        total_cost: costs.component_sum(),
        estimated_duration: Some("3 months".to_string()),
        installment_months: 6,
        warranty_details: Some("2 years on implants".to_string()),
        notes: None,
    }
}

/// 222 500 in total.
fn premium_costs() -> CostBreakdown {
    CostBreakdown {
        therapy_cost: 45_000,
        orthopedics_cost: 120_000,
        surgery_cost: 40_000,
        hygiene_cost: 17_500,
        periodontics_cost: 0,
    }
}

/// 191 500 in total.
fn budget_costs() -> CostBreakdown {
    CostBreakdown {
        therapy_cost: 38_000,
        orthopedics_cost: 105_000,
        surgery_cost: 35_000,
        hygiene_cost: 13_500,
        periodontics_cost: 0,
    }
}

async fn submit(
    service: &OfferService,
    clinic: &Clinic,
    plan_id: i64,
    costs: CostBreakdown,
) -> ClinicOffer {
    service
        .submit_offer(clinic, offer_request(plan_id, costs))
        .await
        .expect("offer should be accepted by the engine")
}

#[tokio::test]
async fn bidding_and_selection_scenario() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);
    let plan_id = fx.plan.id;
    assert_eq!(fx.plan.status, PlanStatus::Generated);

    let o1 = submit(&service, &fx.clinic, plan_id, premium_costs()).await;
    assert_eq!(o1.total_cost, 222_500);
    assert_eq!(o1.status, OfferStatus::Sent);

    let o2 = submit(&service, &fx.rival_clinic, plan_id, budget_costs()).await;
    assert_eq!(o2.total_cost, 191_500);

    let plan = fx.store.plan_by_id(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::OffersReceived);

    let listed: Vec<i64> = service
        .offers_for_plan(plan_id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(listed, vec![o2.id, o1.id]);

    let before = Utc::now();
    let accepted = service.accept_offer(o2.id, fx.patient.id).await.unwrap();
    let after = Utc::now();

    assert_eq!(accepted.offer.id, o2.id);
    assert_eq!(accepted.offer.status, OfferStatus::Accepted);
    assert_eq!(accepted.treatment_plan_id, plan_id);
    assert_eq!(accepted.rejected_offers, 1);

    let appointment = &accepted.appointment;
    assert_eq!(appointment.clinic_offer_id, o2.id);
    assert_eq!(appointment.clinic_id, fx.rival_clinic.id);
    assert_eq!(appointment.patient_id, fx.patient.id);
    assert_eq!(appointment.treatment_plan_id, plan_id);
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert!(appointment.appointment_date >= before + Duration::days(7));
    assert!(appointment.appointment_date <= after + Duration::days(7));

    let offers = fx.store.offers_for_plan(plan_id).await.unwrap();
    let status_of = |id: i64| offers.iter().find(|o| o.id == id).unwrap().status;
    assert_eq!(status_of(o2.id), OfferStatus::Accepted);
    assert_eq!(status_of(o1.id), OfferStatus::Rejected);

    let plan = fx.store.plan_by_id(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::OfferSelected);

    let appointments = fx.store.appointments_for_plan(plan_id).await.unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].clinic_offer_id, o2.id);
}

#[tokio::test]
async fn total_cost_is_kept_as_submitted() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let mut request = offer_request(fx.plan.id, budget_costs());
    request.total_cost = 180_000;

    let offer = service.submit_offer(&fx.clinic, request).await.unwrap();
    assert_eq!(offer.total_cost, 180_000);
    assert_eq!(offer.costs.component_sum(), 191_500);
}

#[tokio::test]
async fn invalid_costs_are_rejected_before_any_write() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let mut request = offer_request(fx.plan.id, budget_costs());
    request.total_cost = 0;
    assert_matches!(
        service.submit_offer(&fx.clinic, request).await,
        Err(OfferError::ValidationError(_))
    );

    let mut costs = budget_costs();
    costs.hygiene_cost = -1;
    assert_matches!(
        service.submit_offer(&fx.clinic, offer_request(fx.plan.id, costs)).await,
        Err(OfferError::ValidationError(_))
    );

    let plan = fx.store.plan_by_id(fx.plan.id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Generated);
}

#[tokio::test]
async fn second_offer_from_same_clinic_is_a_duplicate() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    submit(&service, &fx.clinic, fx.plan.id, budget_costs()).await;
    let result = service
        .submit_offer(&fx.clinic, offer_request(fx.plan.id, premium_costs()))
        .await;

    assert_matches!(result, Err(OfferError::DuplicateOffer { clinic_id, plan_id })
        if clinic_id == fx.clinic.id && plan_id == fx.plan.id);
    assert_eq!(fx.store.offers_for_plan(fx.plan.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn offer_on_unknown_plan_is_not_found() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    assert_matches!(
        service.submit_offer(&fx.clinic, offer_request(9_999, budget_costs())).await,
        Err(OfferError::PlanNotFound(9_999))
    );
}

#[tokio::test]
async fn offers_on_a_selected_plan_are_refused() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let offer = submit(&service, &fx.clinic, fx.plan.id, budget_costs()).await;
    service.accept_offer(offer.id, fx.patient.id).await.unwrap();

    assert_matches!(
        service
            .submit_offer(&fx.rival_clinic, offer_request(fx.plan.id, premium_costs()))
            .await,
        Err(OfferError::InvalidTransition {
            from: PlanStatus::OfferSelected,
            to: PlanStatus::OffersReceived
        })
    );
}

#[tokio::test]
async fn pending_offers_are_hidden_from_patients() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let pending = fx
        .store
        .insert_offer(ClinicOffer {
            treatment_plan_id: fx.plan.id,
            clinic_id: fx.rival_clinic.id,
            status: OfferStatus::Pending,
            total_cost: 1_000,
            ..ClinicOffer::default()
        })
        .await;
    let sent = submit(&service, &fx.clinic, fx.plan.id, premium_costs()).await;

    let offers = service.offers_for_plan(fx.plan.id).await.unwrap();
    assert!(offers.iter().all(|o| o.status != OfferStatus::Pending));
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].id, sent.id);
    assert_eq!(
        offers[0].clinic.as_ref().map(|c| c.name.as_str()),
        Some("Dental Lux")
    );

    assert_matches!(
        service.accept_offer(pending.id, fx.patient.id).await,
        Err(OfferError::OfferNotFound(id)) if id == pending.id
    );
}

#[tokio::test]
async fn visible_offers_are_sorted_by_total_cost() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    for (user_id, total_cost) in [(900, 310_000), (901, 150_000), (902, 150_000), (903, 275_000)] {
        let clinic = fx
            .store
            .insert_clinic(Clinic {
                user_id,
                name: format!("Clinic {user_id}"),
                ..Clinic::default()
            })
            .await;
        let mut request = offer_request(fx.plan.id, budget_costs());
        request.total_cost = total_cost;
        service.submit_offer(&clinic, request).await.unwrap();
    }

    let costs: Vec<i64> = service
        .offers_for_plan(fx.plan.id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.total_cost)
        .collect();
    assert_eq!(costs, vec![150_000, 150_000, 275_000, 310_000]);
}

#[tokio::test]
async fn incoming_plans_exclude_plans_the_clinic_bid_on() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let second_scan = fx
        .store
        .insert_scan(shared_models::CtScan {
            patient_id: fx.other_patient.id,
            ..shared_models::CtScan::default()
        })
        .await;
    let second_plan = fx
        .store
        .insert_plan(sample_plan(fx.other_patient.id, second_scan.id))
        .await;

    let offer = submit(&service, &fx.clinic, fx.plan.id, budget_costs()).await;
    submit(&service, &fx.rival_clinic, second_plan.id, premium_costs()).await;

    let incoming = service.incoming_plans(fx.clinic.id, None).await.unwrap();
    let ids: Vec<i64> = incoming.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second_plan.id]);
    assert!(!ids.contains(&offer.treatment_plan_id));
    // Competitors' bids never leak
    assert!(incoming
        .iter()
        .all(|p| p.offers.iter().all(|o| o.clinic_id == fx.clinic.id)));

    let rival_incoming = service.incoming_plans(fx.rival_clinic.id, None).await.unwrap();
    assert_eq!(
        rival_incoming.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![fx.plan.id]
    );
}

#[tokio::test]
async fn incoming_plans_can_filter_by_status() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    submit(&service, &fx.rival_clinic, fx.plan.id, premium_costs()).await;

    let generated = service
        .incoming_plans(fx.clinic.id, Some(PlanStatus::Generated))
        .await
        .unwrap();
    assert!(generated.is_empty());

    let received = service
        .incoming_plans(fx.clinic.id, Some(PlanStatus::OffersReceived))
        .await
        .unwrap();
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn accepting_unknown_offer_is_not_found() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    assert_matches!(
        service.accept_offer(4_242, fx.patient.id).await,
        Err(OfferError::OfferNotFound(4_242))
    );
}

#[tokio::test]
async fn only_the_plan_owner_can_accept() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let offer = submit(&service, &fx.clinic, fx.plan.id, budget_costs()).await;

    assert_matches!(
        service.accept_offer(offer.id, fx.other_patient.id).await,
        Err(OfferError::OfferNotFound(_))
    );
    let plan = fx.store.plan_by_id(fx.plan.id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::OffersReceived);
    assert!(fx.store.appointments_for_plan(fx.plan.id).await.unwrap().is_empty());

    assert_matches!(
        service.patient_offers_for_plan(fx.other_patient.id, fx.plan.id).await,
        Err(OfferError::PlanNotFound(_))
    );
    assert_eq!(
        service
            .patient_offers_for_plan(fx.patient.id, fx.plan.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn second_accept_on_same_plan_is_refused() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let o1 = submit(&service, &fx.clinic, fx.plan.id, premium_costs()).await;
    let o2 = submit(&service, &fx.rival_clinic, fx.plan.id, budget_costs()).await;

    service.accept_offer(o1.id, fx.patient.id).await.unwrap();
    assert_matches!(
        service.accept_offer(o2.id, fx.patient.id).await,
        Err(OfferError::AlreadySelected(id)) if id == fx.plan.id
    );
    assert_matches!(
        service.accept_offer(o1.id, fx.patient.id).await,
        Err(OfferError::AlreadySelected(_))
    );
    assert_eq!(fx.store.appointments_for_plan(fx.plan.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_accepts_on_one_plan_produce_a_single_winner() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let o1 = submit(&service, &fx.clinic, fx.plan.id, premium_costs()).await;
    let o2 = submit(&service, &fx.rival_clinic, fx.plan.id, budget_costs()).await;

    let mut handles = Vec::new();
    for offer_id in [o1.id, o2.id, o1.id, o2.id] {
        let state = fx.state.clone();
        let patient_id = fx.patient.id;
        handles.push(tokio::spawn(async move {
            OfferService::new(&state).accept_offer(offer_id, patient_id).await
        }));
    }

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for result in &results {
        if let Err(err) = result {
            assert_matches!(err, OfferError::AlreadySelected(_));
        }
    }

    let offers = fx.store.offers_for_plan(fx.plan.id).await.unwrap();
    let accepted: Vec<_> = offers
        .iter()
        .filter(|o| o.status == OfferStatus::Accepted)
        .collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, winners[0].offer.id);
    assert!(offers
        .iter()
        .filter(|o| o.id != winners[0].offer.id)
        .all(|o| o.status == OfferStatus::Rejected));
    assert_eq!(fx.store.appointments_for_plan(fx.plan.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failure_mid_accept_rolls_everything_back() {
    for fault in [Fault::SetPlanStatus, Fault::InsertAppointment] {
        let fx = TestFixture::new().await;
        let service = OfferService::new(&fx.state);

        let o1 = submit(&service, &fx.clinic, fx.plan.id, premium_costs()).await;
        let o2 = submit(&service, &fx.rival_clinic, fx.plan.id, budget_costs()).await;

        let faulty_state = FaultyStore::new(fx.store.clone(), fault).into_state(&fx.config);
        let faulty = OfferService::new(&faulty_state);

        assert_matches!(
            faulty.accept_offer(o2.id, fx.patient.id).await,
            Err(OfferError::Internal(_))
        );

        let offers = fx.store.offers_for_plan(fx.plan.id).await.unwrap();
        assert!(offers.iter().all(|o| o.status == OfferStatus::Sent), "{fault:?}");
        let plan = fx.store.plan_by_id(fx.plan.id).await.unwrap().unwrap();
        assert_eq!(plan.status, PlanStatus::OffersReceived, "{fault:?}");
        assert!(fx.store.appointments_for_plan(fx.plan.id).await.unwrap().is_empty());

        // The healthy store still accepts afterwards
        service.accept_offer(o1.id, fx.patient.id).await.unwrap();
    }
}

#[tokio::test]
async fn accept_with_missing_clinic_is_internal() {
    let fx = TestFixture::new().await;
    let service = OfferService::new(&fx.state);

    let offer = submit(&service, &fx.rival_clinic, fx.plan.id, budget_costs()).await;
    fx.store.soft_delete_clinic(fx.rival_clinic.id).await;

    assert_matches!(
        service.accept_offer(offer.id, fx.patient.id).await,
        Err(OfferError::Internal(_))
    );
    let plan = fx.store.plan_by_id(fx.plan.id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::OffersReceived);
}

#[tokio::test]
async fn appointment_lead_time_follows_configuration() {
    let mut fx = TestFixture::new().await;
    fx.config.appointment_lead_days = 14;
    let state = std::sync::Arc::new(shared_database::AppState::new(
        fx.config.to_app_config(),
        std::sync::Arc::new(fx.store.clone()),
    ));
    let service = OfferService::new(&state);

    let offer = submit(&service, &fx.clinic, fx.plan.id, budget_costs()).await;
    let accepted = service.accept_offer(offer.id, fx.patient.id).await.unwrap();

    let lead = accepted.appointment.appointment_date - Utc::now();
    assert!(lead > Duration::days(13) && lead <= Duration::days(14));
}
