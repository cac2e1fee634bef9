use axum_marketplace_api::models::{OrderStatus, PaymentStatus};

#[test]
fn forward_transitions_are_allowed() {
    assert!(OrderStatus::Pending.can_transition(OrderStatus::Processing));
    assert!(OrderStatus::Processing.can_transition(OrderStatus::Shipped));
    assert!(OrderStatus::Shipped.can_transition(OrderStatus::Delivered));
}

#[test]
fn cancellation_only_before_shipping() {
    assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled));
    assert!(OrderStatus::Processing.can_transition(OrderStatus::Cancelled));
    assert!(!OrderStatus::Shipped.can_transition(OrderStatus::Cancelled));
}

#[test]
fn no_skipping_or_rewinding() {
    assert!(!OrderStatus::Pending.can_transition(OrderStatus::Shipped));
    assert!(!OrderStatus::Pending.can_transition(OrderStatus::Delivered));
    assert!(!OrderStatus::Processing.can_transition(OrderStatus::Pending));
    assert!(!OrderStatus::Shipped.can_transition(OrderStatus::Processing));
}

#[test]
fn terminal_states_have_no_outgoing_edges() {
    let all = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];
    for next in all {
        assert!(!OrderStatus::Delivered.can_transition(next));
        assert!(!OrderStatus::Cancelled.can_transition(next));
    }
}

#[test]
fn self_transitions_are_rejected() {
    for status in [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        assert!(!status.can_transition(status));
    }
}

#[test]
fn order_status_round_trips_through_strings() {
    for status in [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ] {
        assert_eq!(OrderStatus::parse(status.as_str()).unwrap(), status);
    }
    assert!(OrderStatus::parse("dispatched").is_err());
    assert!(OrderStatus::parse("Pending").is_err());
}

#[test]
fn payment_status_round_trips_through_strings() {
    for status in [
        PaymentStatus::Unpaid,
        PaymentStatus::Paid,
        PaymentStatus::Refunded,
    ] {
        assert_eq!(PaymentStatus::parse(status.as_str()).unwrap(), status);
    }
    assert!(PaymentStatus::parse("settled").is_err());
}
