use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use slotwise::model::{format_clock, BookingStatus, Customer, Span};
use slotwise::schedule::RawSettings;
use slotwise::service::{Admission, BookingRequest, BookingService};
use slotwise::tenant::TenantManager;

fn test_data_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("slotwise_test_admission").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn setup(name: &str) -> (Arc<TenantManager>, BookingService) {
    slotwise::observability::init_logging();
    let tenants = Arc::new(TenantManager::new(test_data_dir(name), 1000, Duration::from_secs(60)));
    let service = BookingService::new(tenants.clone(), tenants.clone());
    (tenants, service)
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn customer(first_name: &str) -> Customer {
    Customer {
        first_name: first_name.into(),
        last_name: "Lovelace".into(),
        email: format!("{}@example.com", first_name.to_lowercase()),
        phone: Some("+49 30 1234567".into()),
        notes: None,
    }
}

fn request(day: &str, from: &str, to: &str, who: &str) -> BookingRequest {
    BookingRequest {
        date: date(day),
        start_time: from.into(),
        end_time: to.into(),
        customer: customer(who),
    }
}

/// Mon–Fri 09:00–17:00, 30-minute slots, no buffer.
fn office_hours() -> RawSettings {
    serde_json::from_value(serde_json::json!({
        "slotMinutes": 30,
        "bufferMinutes": 0,
        "hours": {
            "mon": [{ "from": "09:00", "to": "17:00" }],
            "tue": [{ "from": "09:00", "to": "17:00" }],
            "wed": [{ "from": "09:00", "to": "17:00" }],
            "thu": [{ "from": "09:00", "to": "17:00" }],
            "fri": [{ "from": "09:00", "to": "17:00" }]
        },
        "workDays": [1, 2, 3, 4, 5]
    }))
    .unwrap()
}

const MONDAY: &str = "2024-06-03";

#[tokio::test]
async fn monday_with_one_confirmed_booking() {
    let (tenants, service) = setup("monday");
    tenants.get_or_create("salon").await.unwrap().update_settings(&office_hours()).await.unwrap();

    let Admission::Created(booking) = service
        .create_booking("salon", request(MONDAY, "10:00", "10:30", "Ada"))
        .await
        .unwrap()
    else {
        panic!("expected the first booking to be created");
    };
    service.confirm("salon", booking.id).await.unwrap();

    let slots = service.available_slots("salon", date(MONDAY)).await.unwrap();
    assert_eq!(slots.len(), 15);
    assert!(!slots.contains(&Span::parse("10:00", "10:30").unwrap()));
    let starts: Vec<String> = slots.iter().map(|s| format_clock(s.start)).collect();
    assert_eq!(starts.first().map(String::as_str), Some("09:00"));
    assert_eq!(starts.last().map(String::as_str), Some("16:30"));
    assert!(starts.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_simultaneous_requests_for_one_slot() {
    let (_tenants, service) = setup("simultaneous");

    let attempts = join_all([
        service.create_booking("salon", request(MONDAY, "11:00", "11:30", "Ada")),
        service.create_booking("salon", request(MONDAY, "11:00", "11:30", "Grace")),
    ])
    .await;

    let created = attempts
        .iter()
        .filter(|a| matches!(a, Ok(Admission::Created(_))))
        .count();
    let taken = attempts
        .iter()
        .filter(|a| matches!(a, Ok(Admission::SlotTaken)))
        .count();
    assert_eq!((created, taken), (1, 1), "{attempts:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_spawned_requests_for_one_slot() {
    let (_tenants, service) = setup("spawned");

    let mut handles = Vec::new();
    for i in 0..24 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .create_booking("salon", request(MONDAY, "14:00", "14:30", &format!("guest{i}")))
                .await
                .unwrap()
        }));
    }
    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Admission::Created(_) => created += 1,
            Admission::SlotTaken => {}
            Admission::InvalidSlot => panic!("slot is offered"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(service.list_bookings("salon", date(MONDAY)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stale_slot_after_hours_change_is_invalid() {
    let (tenants, service) = setup("stale");
    let engine = tenants.get_or_create("salon").await.unwrap();
    engine.update_settings(&office_hours()).await.unwrap();
    assert!(service
        .available_slots("salon", date(MONDAY))
        .await
        .unwrap()
        .contains(&Span::parse("09:30", "10:00").unwrap()));

    // The tenant switches to hour-long slots while a customer holds the old list.
    let mut hourly = office_hours();
    hourly.slot_minutes = serde_json::json!(60);
    engine.update_settings(&hourly).await.unwrap();

    assert_eq!(
        service
            .create_booking("salon", request(MONDAY, "09:30", "10:00", "Ada"))
            .await
            .unwrap(),
        Admission::InvalidSlot
    );
    assert!(matches!(
        service
            .create_booking("salon", request(MONDAY, "09:00", "10:00", "Ada"))
            .await
            .unwrap(),
        Admission::Created(_)
    ));
}

#[tokio::test]
async fn holidays_and_vacations_close_days() {
    let (tenants, service) = setup("closed_days");
    let engine = tenants.get_or_create("salon").await.unwrap();
    let mut settings = office_hours();
    settings.vacations = serde_json::json!([
        { "start": "2024-06-10", "end": "2024-06-12", "note": "Trade fair" }
    ]);
    engine.update_settings(&settings).await.unwrap();
    engine.add_holiday(date(MONDAY), Some("Staff training".into())).await.unwrap();

    assert!(service.available_slots("salon", date(MONDAY)).await.unwrap().is_empty());
    assert_eq!(
        service
            .create_booking("salon", request(MONDAY, "09:00", "09:30", "Ada"))
            .await
            .unwrap(),
        Admission::InvalidSlot
    );

    let open_days = service
        .availability_range("salon", date("2024-06-03"), date("2024-06-14"))
        .await
        .unwrap();
    let dates: Vec<NaiveDate> = open_days.iter().map(|d| d.date).collect();
    assert_eq!(
        dates,
        vec![
            date("2024-06-04"),
            date("2024-06-05"),
            date("2024-06-06"),
            date("2024-06-07"),
            date("2024-06-13"),
            date("2024-06-14"),
        ]
    );
}

#[tokio::test]
async fn fresh_tenant_is_bookable_with_defaults() {
    let (_tenants, service) = setup("defaults");
    // Friday closes at 15:00 in the default template.
    let friday = service.available_slots("new_salon", date("2024-06-07")).await.unwrap();
    assert_eq!(friday.len(), 12);
    assert!(service.available_slots("new_salon", date("2024-06-08")).await.unwrap().is_empty());
}

#[tokio::test]
async fn tenants_do_not_share_bookings() {
    let (_tenants, service) = setup("isolation");
    for tenant in ["salon_north", "salon_south"] {
        assert!(matches!(
            service
                .create_booking(tenant, request(MONDAY, "09:00", "09:30", "Ada"))
                .await
                .unwrap(),
            Admission::Created(_)
        ));
    }
    let north = service.list_bookings("salon_north", date(MONDAY)).await.unwrap();
    assert_eq!(north.len(), 1);
    assert_eq!(north[0].tenant_id, "salon_north");
}

#[tokio::test]
async fn staff_workflow_and_restart() {
    let dir = test_data_dir("restart");
    let booking_id = {
        let tenants = Arc::new(TenantManager::new(dir.clone(), 1000, Duration::from_secs(60)));
        let service = BookingService::new(tenants.clone(), tenants.clone());
        let Admission::Created(booking) = service
            .create_booking("salon", request(MONDAY, "15:00", "15:30", "Ada"))
            .await
            .unwrap()
        else {
            panic!("expected created");
        };
        let declined = service.decline("salon", booking.id).await.unwrap();
        assert_eq!(declined.status, BookingStatus::Declined);
        assert!(service.confirm("salon", booking.id).await.is_err());
        booking.id
    };

    let tenants = Arc::new(TenantManager::new(dir, 1000, Duration::from_secs(60)));
    let service = BookingService::new(tenants.clone(), tenants.clone());
    let restored = service.get_booking("salon", booking_id).await.unwrap().unwrap();
    assert_eq!(restored.status, BookingStatus::Declined);
    // A declined booking does not hold its slot.
    assert!(matches!(
        service
            .create_booking("salon", request(MONDAY, "15:00", "15:30", "Grace"))
            .await
            .unwrap(),
        Admission::Created(_)
    ));
}
