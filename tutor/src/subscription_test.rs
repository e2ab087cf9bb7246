use super::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

fn at(secs: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(secs).unwrap()
}

fn pending(now: OffsetDateTime) -> Subscription {
    Subscription::pending(Uuid::new_v4(), "dana@example.com", Plan::Premium, BillingCycle::Monthly, now)
}

// =============================================================================
// pricing
// =============================================================================

#[test]
fn prices() {
    assert_eq!(plan_price(Plan::Premium, BillingCycle::Monthly), 30);
    assert_eq!(plan_price(Plan::Premium, BillingCycle::Yearly), 288);
    assert_eq!(plan_price(Plan::Basic, BillingCycle::Yearly), 0);
}

#[test]
fn period_lengths() {
    let start = at(0);
    assert_eq!(period_end(BillingCycle::Monthly, start), at(30 * 86_400));
    assert_eq!(period_end(BillingCycle::Yearly, start), at(365 * 86_400));
}

// =============================================================================
// transitions
// =============================================================================

#[test]
fn pending_is_trial_and_not_entitled() {
    let sub = pending(at(0));
    assert_eq!(sub.status, SubscriptionStatus::Trial);
    assert!(sub.auto_renew);
    assert!(!sub.is_entitled(at(1)));
}

#[test]
fn trial_to_active_grants_premium() {
    let mut sub = pending(at(0));
    sub.transition(SubscriptionStatus::Active, at(10)).unwrap();
    assert!(sub.is_entitled(at(20)));
    assert_eq!(sub.updated_at, at(10));
}

#[test]
fn active_to_cancelled_stops_renewal() {
    let mut sub = pending(at(0));
    sub.transition(SubscriptionStatus::Active, at(1)).unwrap();
    sub.transition(SubscriptionStatus::Cancelled, at(2)).unwrap();
    assert!(!sub.auto_renew);
    assert!(!sub.is_entitled(at(3)));
}

#[test]
fn invalid_transitions_rejected() {
    let mut sub = pending(at(0));
    let err = sub.transition(SubscriptionStatus::Cancelled, at(1)).unwrap_err();
    assert_eq!(err, TransitionError { from: SubscriptionStatus::Trial, to: SubscriptionStatus::Cancelled });
    assert_eq!(sub.status, SubscriptionStatus::Trial);

    sub.transition(SubscriptionStatus::Expired, at(2)).unwrap();
    assert!(sub.transition(SubscriptionStatus::Active, at(3)).is_err());
}

#[test]
fn entitlement_ends_with_period() {
    let mut sub = pending(at(0));
    sub.transition(SubscriptionStatus::Active, at(0)).unwrap();
    let end = sub.end_date;
    assert!(sub.is_entitled(end - time::Duration::seconds(1)));
    assert!(!sub.is_entitled(end));
    assert!(sub.is_due_for_expiry(end));
}

#[test]
fn cancelled_is_never_due_for_expiry() {
    let mut sub = pending(at(0));
    sub.transition(SubscriptionStatus::Active, at(0)).unwrap();
    sub.transition(SubscriptionStatus::Cancelled, at(0)).unwrap();
    assert!(!sub.is_due_for_expiry(at(i64::from(u32::MAX))));
}

#[test]
fn serde_wire_shape() {
    let sub = pending(at(0));
    let value = serde_json::to_value(&sub).unwrap();
    assert_eq!(value["status"], "trial");
    assert_eq!(value["billingCycle"], "monthly");
    assert_eq!(value["startDate"], "1970-01-01T00:00:00Z");
    let back: Subscription = serde_json::from_value(value).unwrap();
    assert_eq!(back, sub);
}

#[test]
fn parse_choices() {
    assert_eq!("yearly".parse::<BillingCycle>().unwrap(), BillingCycle::Yearly);
    assert_eq!("premium".parse::<Plan>().unwrap(), Plan::Premium);
    assert_eq!("expired".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::Expired);
    assert!("gold".parse::<Plan>().is_err());
}

// =============================================================================
// poll_until_active
// =============================================================================

struct ScriptedCheck {
    results: Mutex<Vec<Result<bool, GatewayError>>>,
    calls: AtomicU32,
}

impl ScriptedCheck {
    fn new(results: Vec<Result<bool, GatewayError>>) -> Self {
        Self { results: Mutex::new(results), calls: AtomicU32::new(0) }
    }
}

#[async_trait]
impl EntitlementCheck for ScriptedCheck {
    async fn is_active(&self) -> Result<bool, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut results = self.results.lock().unwrap();
        if results.is_empty() { Ok(false) } else { results.remove(0) }
    }
}

#[tokio::test]
async fn poll_activates_after_errors_and_misses() {
    let check = ScriptedCheck::new(vec![Ok(false), Err(GatewayError::Network("x".into())), Ok(true)]);
    let outcome = poll_until_active(&check, Duration::from_millis(1), 10, CancellationToken::new()).await;
    assert_eq!(outcome, PollOutcome::Activated);
    assert_eq!(check.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn poll_times_out() {
    let check = ScriptedCheck::new(vec![]);
    let outcome = poll_until_active(&check, Duration::from_millis(1), 4, CancellationToken::new()).await;
    assert_eq!(outcome, PollOutcome::TimedOut);
    assert_eq!(check.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn poll_stops_when_cancelled() {
    let check = ScriptedCheck::new(vec![]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = poll_until_active(&check, Duration::from_secs(60), 10, cancel).await;
    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(check.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn poll_cancel_interrupts_sleep() {
    let check = ScriptedCheck::new(vec![]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let outcome = poll_until_active(&check, Duration::from_secs(60), 10, cancel).await;
    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(check.calls.load(Ordering::SeqCst), 1);
}
