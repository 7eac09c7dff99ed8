use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use nvg_booking::{
    BookingError, BookingService, CargoBooking, MockPaymentProcessor, PaymentReconciler,
    PaymentRequest, ScheduleInput, ScheduleService, TicketBooking, TicketUpdate, TrackingNumbers,
};
use nvg_capacity::{AllocationError, SeatSource, UtilizationLevel};
use nvg_core::{
    BookingRules, CargoStatus, PaymentProcessor, PaymentStatus, ProcessorError, ProcessorIntent,
    Schedule,
};
use nvg_store::MemoryStore;
use uuid::Uuid;

struct Fixture {
    store: MemoryStore,
    bookings: Arc<BookingService>,
    schedules: ScheduleService,
    owner: Uuid,
}

async fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let rules = BookingRules::default();
    let shared: Arc<dyn nvg_core::BookingStore> = Arc::new(store.clone());
    let owner = store.add_owner().await;
    Fixture {
        bookings: Arc::new(BookingService::new(shared.clone(), rules.clone())),
        schedules: ScheduleService::new(shared, &rules),
        store,
        owner,
    }
}

impl Fixture {
    fn input(&self, vessel_id: Uuid, route_id: Uuid, seats: i32, cargo_kg: f64) -> ScheduleInput {
        let departure = Utc::now() + Duration::days(3);
        ScheduleInput {
            vessel_id,
            route_id,
            departure_time: departure,
            arrival_time: departure + Duration::hours(5),
            total_seats: seats,
            total_cargo_capacity: cargo_kg,
            seat_price: 30.0,
            cargo_price_per_kg: 2.5,
        }
    }

    async fn schedule(&self, seats: i32, cargo_kg: f64) -> Schedule {
        let vessel = self.store.add_vessel("Kivu Queen", 120).await;
        let route = self.store.add_route().await;
        self.schedules
            .create(self.input(vessel, route, seats, cargo_kg))
            .await
            .unwrap()
    }

    fn cargo(&self, schedule_id: Uuid, weight: f64) -> CargoBooking {
        CargoBooking {
            owner_id: self.owner,
            schedule_id,
            description: "Coffee beans".to_string(),
            weight,
            special_requirements: None,
        }
    }
}

fn ticket(schedule_id: Uuid, seat: &str) -> TicketBooking {
    TicketBooking {
        schedule_id,
        seat_number: seat.to_string(),
        paid: false,
        price: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cargo_never_oversells() {
    let f = fixture().await;
    let schedule = f.schedule(10, 100.0).await;

    let first = tokio::spawn({
        let bookings = f.bookings.clone();
        let req = f.cargo(schedule.id, 60.0);
        async move { bookings.book_cargo(req).await }
    });
    let second = tokio::spawn({
        let bookings = f.bookings.clone();
        let req = f.cargo(schedule.id, 60.0);
        async move { bookings.book_cargo(req).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(
        rejected,
        BookingError::Allocation(AllocationError::InsufficientCapacity { available, requested })
            if *available == 40.0 && *requested == 60.0
    ));

    let capacity = f.bookings.cargo_capacity(schedule.id).await.unwrap();
    assert_eq!(capacity.booked_weight, 60.0);
    assert_eq!(capacity.available_capacity, 40.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_seat_race_has_one_winner() {
    let f = fixture().await;
    let schedule = f.schedule(50, 100.0).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bookings = f.bookings.clone();
            let req = ticket(schedule.id, "C7");
            tokio::spawn(async move { bookings.book_ticket(req).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert!(matches!(e, BookingError::Allocation(AllocationError::SeatTaken(_)))),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(f.bookings.seat_info(schedule.id).await.unwrap().booked_seats, 1);
}

#[tokio::test]
async fn test_seat_allocation_on_two_seat_schedule() {
    let f = fixture().await;
    let schedule = f.schedule(2, 100.0).await;

    let first = f.bookings.book_ticket(ticket(schedule.id, "A1")).await.unwrap();
    assert_eq!(first.price, 30.0);
    assert!(!first.paid);

    let dup = f.bookings.book_ticket(ticket(schedule.id, "a1")).await.unwrap_err();
    assert!(matches!(dup, BookingError::Allocation(AllocationError::SeatTaken(ref s)) if s == "A1"));

    let second = f.bookings.book_ticket(ticket(schedule.id, "a2")).await.unwrap();
    assert_eq!(second.seat_number, "A2");

    let full = f.bookings.book_ticket(ticket(schedule.id, "A3")).await.unwrap_err();
    assert!(matches!(
        full,
        BookingError::Allocation(AllocationError::NoSeatsAvailable { total: 2 })
    ));

    let info = f.bookings.seat_info(schedule.id).await.unwrap();
    assert_eq!(info.total_seats, 2);
    assert_eq!(info.available_seats, 0);
    assert_eq!(info.booked_seat_numbers, vec!["A1", "A2"]);
}

#[tokio::test]
async fn test_ticket_validation_and_missing_schedule() {
    let f = fixture().await;
    let schedule = f.schedule(5, 100.0).await;

    let bad = f.bookings.book_ticket(ticket(schedule.id, "12A")).await.unwrap_err();
    assert!(matches!(bad, BookingError::Allocation(AllocationError::InvalidSeatNumber(_))));

    let missing = Uuid::new_v4();
    let err = f.bookings.book_ticket(ticket(missing, "A1")).await.unwrap_err();
    assert!(matches!(err, BookingError::ScheduleNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_ticket_update_and_delete() {
    let f = fixture().await;
    let schedule = f.schedule(5, 100.0).await;
    let a1 = f.bookings.book_ticket(ticket(schedule.id, "A1")).await.unwrap();
    f.bookings.book_ticket(ticket(schedule.id, "A2")).await.unwrap();

    let clash = f
        .bookings
        .update_ticket(a1.id, TicketUpdate { seat_number: Some("A2".into()), paid: None })
        .await
        .unwrap_err();
    assert!(matches!(clash, BookingError::Allocation(AllocationError::SeatTaken(_))));

    let moved = f
        .bookings
        .update_ticket(a1.id, TicketUpdate { seat_number: Some("b4".into()), paid: Some(true) })
        .await
        .unwrap();
    assert_eq!(moved.seat_number, "B4");
    assert!(moved.paid);

    f.bookings.delete_ticket(a1.id).await.unwrap();
    assert!(matches!(
        f.bookings.delete_ticket(a1.id).await,
        Err(BookingError::TicketNotFound(_))
    ));
    let remaining = f.bookings.tickets_for_schedule(schedule.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].seat_number, "A2");
}

#[tokio::test]
async fn test_seat_total_falls_back_to_vessel_capacity() {
    let f = fixture().await;
    let vessel_id = f.store.add_vessel("Legacy Ferry", 3).await;
    let route_id = f.store.add_route().await;
    let now = Utc::now();
    let legacy = Schedule {
        id: Uuid::new_v4(),
        vessel_id,
        route_id,
        departure_time: now + Duration::days(1),
        arrival_time: now + Duration::days(1) + Duration::hours(2),
        total_seats: None,
        total_cargo_capacity: 100.0,
        seat_price: 10.0,
        cargo_price_per_kg: 1.0,
        created_at: now,
        updated_at: now,
    };
    f.store.put_schedule(legacy.clone()).await;

    let info = f.bookings.seat_info(legacy.id).await.unwrap();
    assert_eq!(info.total_seats, 3);
    assert_eq!(info.seat_source, SeatSource::Vessel);

    for seat in ["A1", "A2", "A3"] {
        f.bookings.book_ticket(ticket(legacy.id, seat)).await.unwrap();
    }
    assert!(matches!(
        f.bookings.book_ticket(ticket(legacy.id, "A4")).await,
        Err(BookingError::Allocation(AllocationError::NoSeatsAvailable { total: 3 }))
    ));
}

#[tokio::test]
async fn test_cargo_booking_prices_and_rejects_overflow() {
    let f = fixture().await;
    let schedule = f.schedule(10, 100.0).await;

    let cargo = f.bookings.book_cargo(f.cargo(schedule.id, 40.0)).await.unwrap();
    assert_eq!(cargo.status, CargoStatus::Pending);
    assert_eq!(cargo.price, 100.0);
    assert!(TrackingNumbers::new("NGV-").matches(&cargo.tracking_number));

    let err = f.bookings.book_cargo(f.cargo(schedule.id, 61.0)).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::Allocation(AllocationError::InsufficientCapacity { available, requested })
            if available == 60.0 && requested == 61.0
    ));
    assert_eq!(f.bookings.cargo_for_schedule(schedule.id).await.unwrap().len(), 1);

    // Exactly filling the schedule is allowed.
    f.bookings.book_cargo(f.cargo(schedule.id, 60.0)).await.unwrap();
    let capacity = f.bookings.cargo_capacity(schedule.id).await.unwrap();
    assert_eq!(capacity.utilization_percentage, 100.0);
    assert_eq!(capacity.utilization_level, UtilizationLevel::High);
}

#[tokio::test]
async fn test_cargo_rejects_bad_input() {
    let f = fixture().await;
    let schedule = f.schedule(10, 100_000.0).await;

    assert!(matches!(
        f.bookings.book_cargo(f.cargo(schedule.id, 0.0)).await,
        Err(BookingError::Allocation(AllocationError::InvalidWeight(_)))
    ));
    assert!(matches!(
        f.bookings.book_cargo(f.cargo(schedule.id, 50_001.0)).await,
        Err(BookingError::Allocation(AllocationError::WeightAboveLimit { .. }))
    ));

    let mut bad_code = f.cargo(schedule.id, 10.0);
    bad_code.special_requirements = Some("fragile".into());
    assert!(matches!(
        f.bookings.book_cargo(bad_code).await,
        Err(BookingError::Validation(_))
    ));

    let mut stranger = f.cargo(schedule.id, 10.0);
    stranger.owner_id = Uuid::new_v4();
    assert!(matches!(
        f.bookings.book_cargo(stranger).await,
        Err(BookingError::OwnerNotFound(_))
    ));
}

#[tokio::test]
async fn test_reweigh_recomputes_price() {
    let f = fixture().await;
    let schedule = f.schedule(10, 100.0).await;
    let cargo = f.bookings.book_cargo(f.cargo(schedule.id, 40.0)).await.unwrap();
    f.bookings.book_cargo(f.cargo(schedule.id, 50.0)).await.unwrap();

    let lighter = f.bookings.reweigh_cargo(cargo.id, 25.0).await.unwrap();
    assert_eq!(lighter.weight, 25.0);
    assert_eq!(lighter.price, 25.0 * 2.5);

    // Others hold 50kg; this cargo may grow to 50kg but not beyond.
    let heavier = f.bookings.reweigh_cargo(cargo.id, 50.0).await.unwrap();
    assert_eq!(heavier.price, 125.0);
    let err = f.bookings.reweigh_cargo(cargo.id, 55.0).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::Allocation(AllocationError::InsufficientCapacity { available, requested })
            if available == 0.0 && requested == 5.0
    ));

    assert!(matches!(
        f.bookings.reweigh_cargo(Uuid::new_v4(), 5.0).await,
        Err(BookingError::CargoNotFound(_))
    ));
}

#[tokio::test]
async fn test_status_transitions_and_release() {
    let f = fixture().await;
    let schedule = f.schedule(10, 100.0).await;
    let cargo = f.bookings.book_cargo(f.cargo(schedule.id, 80.0)).await.unwrap();

    let moved = f.bookings.update_cargo_status(cargo.id, "in_transit").await.unwrap();
    assert_eq!(moved.status, CargoStatus::InTransit);

    assert!(matches!(
        f.bookings.update_cargo_status(cargo.id, "TELEPORTED").await,
        Err(BookingError::InvalidStatus(_))
    ));

    f.bookings.update_cargo_status(cargo.id, "CANCELLED").await.unwrap();
    let capacity = f.bookings.cargo_capacity(schedule.id).await.unwrap();
    assert_eq!(capacity.booked_weight, 0.0);

    assert!(matches!(
        f.bookings.update_cargo_status(cargo.id, "PENDING").await,
        Err(BookingError::InvalidTransition { from: CargoStatus::Cancelled, to: CargoStatus::Pending })
    ));
    // Same status again is accepted.
    f.bookings.update_cargo_status(cargo.id, "cancelled").await.unwrap();

    // Released weight is bookable again.
    f.bookings.book_cargo(f.cargo(schedule.id, 100.0)).await.unwrap();
}

#[tokio::test]
async fn test_cargo_lookups() {
    let f = fixture().await;
    let schedule = f.schedule(10, 1_000.0).await;
    let cargo = f.bookings.book_cargo(f.cargo(schedule.id, 10.0)).await.unwrap();

    let found = f
        .bookings
        .find_by_tracking(&cargo.tracking_number.to_lowercase())
        .await
        .unwrap();
    assert_eq!(found.id, cargo.id);
    assert_eq!(f.bookings.cargo_for_owner(f.owner).await.unwrap().len(), 1);
    assert!(matches!(
        f.bookings.cargo_for_owner(Uuid::new_v4()).await,
        Err(BookingError::OwnerNotFound(_))
    ));

    f.bookings.delete_cargo(cargo.id).await.unwrap();
    assert!(matches!(
        f.bookings.get_cargo(cargo.id).await,
        Err(BookingError::CargoNotFound(_))
    ));
    assert_eq!(f.bookings.valid_statuses().len(), 15);
}

#[tokio::test]
async fn test_thousand_cargo_bookings_get_distinct_tracking_numbers() {
    let f = fixture().await;
    let schedule = f.schedule(10, 10_000.0).await;
    let numbers = TrackingNumbers::new("NGV-");

    let mut seen = std::collections::HashSet::new();
    for _ in 0..1000 {
        let cargo = f.bookings.book_cargo(f.cargo(schedule.id, 1.0)).await.unwrap();
        assert!(numbers.matches(&cargo.tracking_number));
        seen.insert(cargo.tracking_number);
    }
    assert_eq!(seen.len(), 1000);
}

#[tokio::test]
async fn test_schedule_conflicts_and_updates() {
    let f = fixture().await;
    let vessel = f.store.add_vessel("Kivu Queen", 120).await;
    let route = f.store.add_route().await;

    let first = f.schedules.create(f.input(vessel, route, 10, 100.0)).await.unwrap();

    // Starts 30 minutes after the first one arrives: inside the one hour buffer.
    let mut close = f.input(vessel, route, 10, 100.0);
    close.departure_time = first.arrival_time + Duration::minutes(30);
    close.arrival_time = close.departure_time + Duration::hours(2);
    assert!(matches!(
        f.schedules.create(close.clone()).await,
        Err(BookingError::ScheduleConflict(v)) if v == vessel
    ));

    close.departure_time = first.arrival_time + Duration::minutes(61);
    close.arrival_time = close.departure_time + Duration::hours(2);
    f.schedules.create(close).await.unwrap();

    assert!(matches!(
        f.schedules.create(f.input(Uuid::new_v4(), route, 10, 100.0)).await,
        Err(BookingError::VesselNotFound(_))
    ));

    // Shrinking below booked load is rejected.
    f.bookings.book_ticket(ticket(first.id, "A1")).await.unwrap();
    f.bookings.book_ticket(ticket(first.id, "A2")).await.unwrap();
    let mut shrink = f.input(vessel, route, 1, 100.0);
    shrink.departure_time = first.departure_time;
    shrink.arrival_time = first.arrival_time;
    assert!(matches!(
        f.schedules.update(first.id, shrink.clone()).await,
        Err(BookingError::Validation(_))
    ));

    // Updating in place does not conflict with itself.
    shrink.total_seats = 20;
    shrink.seat_price = 45.0;
    let updated = f.schedules.update(first.id, shrink).await.unwrap();
    assert_eq!(updated.total_seats, Some(20));
    assert_eq!(updated.seat_price, 45.0);

    f.schedules.delete(first.id).await.unwrap();
    assert!(matches!(
        f.schedules.get(first.id).await,
        Err(BookingError::ScheduleNotFound(_))
    ));
    assert_eq!(f.schedules.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_marks_linked_tickets_paid() {
    let f = fixture().await;
    let schedule = f.schedule(10, 1_000.0).await;
    let processor = Arc::new(MockPaymentProcessor::new());
    let shared: Arc<dyn nvg_core::BookingStore> = Arc::new(f.store.clone());
    let payments = PaymentReconciler::new(shared, processor.clone(), BookingRules::default());

    let t1 = f.bookings.book_ticket(ticket(schedule.id, "A1")).await.unwrap();
    let t2 = f.bookings.book_ticket(ticket(schedule.id, "A2")).await.unwrap();
    let t3 = f.bookings.book_ticket(ticket(schedule.id, "A3")).await.unwrap();
    let cargo = f.bookings.book_cargo(f.cargo(schedule.id, 20.0)).await.unwrap();

    let receipt = payments
        .initiate(PaymentRequest {
            user_id: f.owner,
            ticket_ids: vec![t1.id, t2.id],
            cargo_ids: vec![cargo.id],
            currency: None,
            payment_method: None,
        })
        .await
        .unwrap();
    assert_eq!(receipt.payment.amount, 30.0 + 30.0 + 50.0);
    assert_eq!(receipt.payment.status, PaymentStatus::RequiresPaymentMethod);
    let attributed: f64 = receipt.tickets.iter().map(|l| l.amount).sum::<f64>()
        + receipt.cargo.iter().map(|l| l.amount).sum::<f64>();
    assert!((attributed - receipt.payment.amount).abs() < 1e-9);

    let secret = receipt.client_secret.unwrap();
    let confirmation = payments.confirm(secret.expose()).await.unwrap();
    assert_eq!(confirmation.payment.status, PaymentStatus::Succeeded);
    assert_eq!(confirmation.paid_ticket_ids.len(), 2);
    assert_eq!(confirmation.paid_cargo_ids, vec![cargo.id]);

    assert!(f.bookings.get_ticket(t1.id).await.unwrap().paid);
    assert!(f.bookings.get_ticket(t2.id).await.unwrap().paid);
    assert!(!f.bookings.get_ticket(t3.id).await.unwrap().paid);
    // Payment success does not move the cargo workflow.
    assert_eq!(f.bookings.get_cargo(cargo.id).await.unwrap().status, CargoStatus::Pending);

    let details = payments.get(receipt.payment.id).await.unwrap();
    assert_eq!(details.tickets.len(), 2);
    assert_eq!(details.cargo.len(), 1);
}

#[tokio::test]
async fn test_failed_payment_leaves_tickets_unpaid() {
    let f = fixture().await;
    let schedule = f.schedule(10, 1_000.0).await;
    let processor = Arc::new(MockPaymentProcessor::new());
    processor.settle_as(PaymentStatus::Failed).await;
    let shared: Arc<dyn nvg_core::BookingStore> = Arc::new(f.store.clone());
    let payments = PaymentReconciler::new(shared, processor.clone(), BookingRules::default());

    let t1 = f.bookings.book_ticket(ticket(schedule.id, "A1")).await.unwrap();
    let receipt = payments
        .initiate(PaymentRequest {
            user_id: f.owner,
            ticket_ids: vec![t1.id],
            cargo_ids: vec![],
            currency: Some("USD".into()),
            payment_method: Some("card".into()),
        })
        .await
        .unwrap();
    assert_eq!(receipt.payment.currency, "usd");

    let confirmation = payments.confirm(&receipt.payment.processor_reference).await.unwrap();
    assert_eq!(confirmation.payment.status, PaymentStatus::Failed);
    assert!(confirmation.paid_ticket_ids.is_empty());
    assert!(!f.bookings.get_ticket(t1.id).await.unwrap().paid);

    assert!(matches!(
        payments.confirm("pi_unknown").await,
        Err(BookingError::PaymentNotFound(_))
    ));

    processor.set_available(false);
    assert!(matches!(
        payments
            .initiate(PaymentRequest {
                user_id: f.owner,
                ticket_ids: vec![t1.id],
                cargo_ids: vec![],
                currency: None,
                payment_method: None,
            })
            .await,
        Err(BookingError::Processor(_))
    ));
}

#[tokio::test]
async fn test_ticket_listings_and_seat_order() {
    let f = fixture().await;
    let schedule = f.schedule(20, 100.0).await;
    for seat in ["B1", "A10", "A2"] {
        f.bookings.book_ticket(ticket(schedule.id, seat)).await.unwrap();
    }
    let a2 = f.bookings.tickets_for_schedule(schedule.id).await.unwrap()[0].clone();
    assert_eq!(a2.seat_number, "A2");
    f.bookings
        .update_ticket(a2.id, TicketUpdate { seat_number: None, paid: Some(true) })
        .await
        .unwrap();

    let info = f.bookings.seat_info(schedule.id).await.unwrap();
    assert_eq!(info.booked_seat_numbers, vec!["A2", "A10", "B1"]);

    assert_eq!(f.bookings.list_tickets().await.unwrap().len(), 3);
    let paid = f.bookings.tickets_by_paid(true).await.unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].id, a2.id);
    assert_eq!(f.bookings.tickets_by_paid(false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_seat_move_keeps_paid_flag() {
    let f = fixture().await;
    let schedule = f.schedule(5, 100.0).await;
    let booked = f
        .bookings
        .book_ticket(TicketBooking { paid: true, ..ticket(schedule.id, "A1") })
        .await
        .unwrap();

    let moved = f
        .bookings
        .update_ticket(booked.id, TicketUpdate { seat_number: Some("C3".into()), paid: None })
        .await
        .unwrap();
    assert_eq!(moved.seat_number, "C3");
    assert!(moved.paid);
    assert!(f.bookings.get_ticket(booked.id).await.unwrap().paid);
}

#[tokio::test]
async fn test_cargo_listings_by_status() {
    let f = fixture().await;
    let schedule = f.schedule(10, 1_000.0).await;
    let first = f.bookings.book_cargo(f.cargo(schedule.id, 10.0)).await.unwrap();
    f.bookings.book_cargo(f.cargo(schedule.id, 20.0)).await.unwrap();
    f.bookings.update_cargo_status(first.id, "IN_TRANSIT").await.unwrap();

    assert_eq!(f.bookings.list_cargo().await.unwrap().len(), 2);
    let moving = f.bookings.cargo_by_status("in_transit").await.unwrap();
    assert_eq!(moving.len(), 1);
    assert_eq!(moving[0].id, first.id);
    assert!(f.bookings.cargo_by_status("DELIVERED").await.unwrap().is_empty());
    assert!(matches!(
        f.bookings.cargo_by_status("SHIPPED").await,
        Err(BookingError::InvalidStatus(s)) if s == "SHIPPED"
    ));
}

#[tokio::test]
async fn test_status_change_keeps_reweighed_values() {
    let f = fixture().await;
    let schedule = f.schedule(10, 100.0).await;
    let cargo = f.bookings.book_cargo(f.cargo(schedule.id, 50.0)).await.unwrap();

    f.bookings.reweigh_cargo(cargo.id, 2.0).await.unwrap();
    let cancelled = f.bookings.update_cargo_status(cargo.id, "CANCELLED").await.unwrap();
    assert_eq!(cancelled.weight, 2.0);
    assert_eq!(cancelled.price, 5.0);

    let stored = f.bookings.get_cargo(cargo.id).await.unwrap();
    assert_eq!(stored.status, CargoStatus::Cancelled);
    assert_eq!(stored.weight, 2.0);
}

#[tokio::test]
async fn test_schedule_lookups() {
    let f = fixture().await;
    let vessel = f.store.add_vessel("Kivu Queen", 120).await;
    let route = f.store.add_route().await;
    let other_route = f.store.add_route().await;

    let early = f.schedules.create(f.input(vessel, route, 10, 100.0)).await.unwrap();
    let mut later_input = f.input(vessel, other_route, 10, 100.0);
    later_input.departure_time = early.arrival_time + Duration::days(1);
    later_input.arrival_time = later_input.departure_time + Duration::hours(4);
    let later = f.schedules.create(later_input).await.unwrap();

    let by_vessel = f.schedules.for_vessel(vessel).await.unwrap();
    assert_eq!(by_vessel.iter().map(|s| s.id).collect::<Vec<_>>(), vec![early.id, later.id]);
    assert_eq!(f.schedules.for_route(other_route).await.unwrap()[0].id, later.id);
    assert!(matches!(
        f.schedules.for_vessel(Uuid::new_v4()).await,
        Err(BookingError::VesselNotFound(_))
    ));
    assert!(matches!(
        f.schedules.for_route(Uuid::new_v4()).await,
        Err(BookingError::RouteNotFound(_))
    ));

    let departing = f
        .schedules
        .departing_between(early.departure_time, early.departure_time)
        .await
        .unwrap();
    assert_eq!(departing.len(), 1);
    assert_eq!(departing[0].id, early.id);

    let arriving = f
        .schedules
        .arriving_between(early.arrival_time, later.arrival_time)
        .await
        .unwrap();
    assert_eq!(arriving.len(), 2);

    assert!(f
        .schedules
        .arriving_between(later.arrival_time + Duration::hours(1), later.arrival_time + Duration::days(1))
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        f.schedules.departing_between(later.departure_time, early.departure_time).await,
        Err(BookingError::Validation(fields)) if fields[0].field == "start"
    ));
}

#[tokio::test]
async fn test_out_of_range_buffer_falls_back_to_default() {
    let f = fixture().await;
    let shared: Arc<dyn nvg_core::BookingStore> = Arc::new(f.store.clone());
    let rules = BookingRules {
        schedule_buffer_minutes: i64::MAX,
        ..BookingRules::default()
    };
    let schedules = ScheduleService::new(shared, &rules);

    let vessel = f.store.add_vessel("Kivu Queen", 120).await;
    let route = f.store.add_route().await;
    let first = schedules.create(f.input(vessel, route, 10, 100.0)).await.unwrap();

    let mut close = f.input(vessel, route, 10, 100.0);
    close.departure_time = first.arrival_time + Duration::minutes(30);
    close.arrival_time = close.departure_time + Duration::hours(1);
    assert!(matches!(
        schedules.create(close).await,
        Err(BookingError::ScheduleConflict(_))
    ));
}

/// Deletes a ticket while the intent is being created, as a concurrent
/// request would.
struct DeletingProcessor {
    inner: MockPaymentProcessor,
    bookings: Arc<BookingService>,
    ticket_id: Uuid,
}

#[async_trait]
impl PaymentProcessor for DeletingProcessor {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        method: Option<&str>,
    ) -> Result<ProcessorIntent, ProcessorError> {
        self.bookings.delete_ticket(self.ticket_id).await.unwrap();
        self.inner.create_intent(amount_minor, currency, method).await
    }

    async fn retrieve_intent(&self, reference: &str) -> Result<ProcessorIntent, ProcessorError> {
        self.inner.retrieve_intent(reference).await
    }
}

#[tokio::test]
async fn test_payment_for_deleted_ticket_is_not_found() {
    let f = fixture().await;
    let schedule = f.schedule(10, 1_000.0).await;
    let kept = f.bookings.book_ticket(ticket(schedule.id, "A1")).await.unwrap();
    let doomed = f.bookings.book_ticket(ticket(schedule.id, "A2")).await.unwrap();

    let processor = Arc::new(DeletingProcessor {
        inner: MockPaymentProcessor::new(),
        bookings: f.bookings.clone(),
        ticket_id: doomed.id,
    });
    let shared: Arc<dyn nvg_core::BookingStore> = Arc::new(f.store.clone());
    let payments = PaymentReconciler::new(shared, processor, BookingRules::default());

    let err = payments
        .initiate(PaymentRequest {
            user_id: f.owner,
            ticket_ids: vec![kept.id, doomed.id],
            cargo_ids: vec![],
            currency: None,
            payment_method: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::TicketNotFound(id) if id == doomed.id));
    assert!(!f.bookings.get_ticket(kept.id).await.unwrap().paid);
}
