//! End-to-end authorization scenarios: issue through the store, resolve
//! through the verifier, decide on event snapshots.

use access::{Access, DenyReason, Error, Verifier};
use chrono::{Duration, TimeZone, Utc};
use policy::{
    CalendarId, CalendarSettings, Capability, CapabilitySet, EventId, EventSnapshot,
    ExternalAttendee, ExternalAttendeeId, InternalAttendee, ProposedEvent, TenantId, UserId,
};
use storage::{ExternalIdentity, TokenStore};

const TENANT: TenantId = TenantId(1);
const CALENDAR: CalendarId = CalendarId(100);
const EVENT: EventId = EventId(500);
const OWNER: UserId = UserId(1);

fn event() -> EventSnapshot {
    let start = Utc.with_ymd_and_hms(2025, 9, 1, 15, 0, 0).unwrap();
    EventSnapshot {
        id: EVENT,
        calendar_id: CALENDAR,
        title: "A".into(),
        description: "quarterly review".into(),
        start_time: start,
        end_time: start + Duration::hours(1),
        attendees: vec![InternalAttendee::new(OWNER), InternalAttendee::new(UserId(2))],
        external_attendees: vec![ExternalAttendee::new("client@example.com")],
    }
}

fn retitled(old: &EventSnapshot) -> EventSnapshot {
    let mut new = old.clone();
    new.title = "B".into();
    new
}

fn proposal() -> ProposedEvent {
    let start = Utc.with_ymd_and_hms(2025, 9, 2, 9, 0, 0).unwrap();
    ProposedEvent {
        title: "Consultation".into(),
        description: String::new(),
        start_time: start,
        end_time: start + Duration::minutes(45),
        timezone: "America/Sao_Paulo".into(),
        attendees: Vec::new(),
        external_attendees: Vec::new(),
    }
}

#[test]
fn owner_token_allows_detail_update_until_capability_removed() {
    let store = TokenStore::in_memory().unwrap();
    let issued = store.issue_owner_token(TENANT, OWNER, CALENDAR, None).unwrap();
    let verifier = Verifier::new(&store);

    let old = event();
    let new = retitled(&old);

    let token = verifier
        .resolve_for_user(OWNER, TENANT, None, Some(CALENDAR))
        .unwrap();
    assert_eq!(
        token.required_capabilities(&old, Some(&new)).as_slice(),
        &[Capability::UpdateDetails]
    );
    assert!(token.can_perform_update(&old, Some(&new)));

    let without_details: CapabilitySet = issued
        .token
        .capabilities
        .iter()
        .filter(|c| *c != Capability::UpdateDetails)
        .collect();
    store
        .set_capabilities(TENANT, issued.token.id, &without_details)
        .unwrap();

    let token = verifier
        .resolve_for_user(OWNER, TENANT, None, Some(CALENDAR))
        .unwrap();
    assert!(!token.can_perform_update(&old, Some(&new)));
}

#[test]
fn event_token_never_authorizes_another_event() {
    let store = TokenStore::in_memory().unwrap();
    let everything: CapabilitySet = Capability::ALL.into();
    let issued = store
        .issue_attendee_token(TENANT, OWNER, EVENT, Some(everything))
        .unwrap();
    let access = Verifier::new(&store)
        .authorize(&issued.bearer().unwrap(), TENANT)
        .unwrap();

    let mut other = event();
    other.id = EventId(501);
    assert!(!access.can_perform_update(&other, Some(&retitled(&other))));
    assert!(!access.can_perform_update(&other, None));
    assert!(access.can_perform_update(&event(), None));
}

#[test]
fn attendee_removing_self_versus_other() {
    let store = TokenStore::in_memory().unwrap();
    let issued = store
        .issue_attendee_token(
            TENANT,
            OWNER,
            EVENT,
            Some(CapabilitySet::from([Capability::UpdateSelfRsvp])),
        )
        .unwrap();
    let access = Verifier::new(&store)
        .authorize(&issued.bearer().unwrap(), TENANT)
        .unwrap();

    let old = event();
    let mut leave = old.clone();
    leave.attendees.retain(|a| a.user_id != OWNER);
    assert_eq!(
        access.required_capabilities(&old, Some(&leave)).unwrap().as_slice(),
        &[Capability::UpdateSelfRsvp]
    );
    assert!(access.can_perform_update(&old, Some(&leave)));

    let mut kick = old.clone();
    kick.attendees.retain(|a| a.user_id != UserId(2));
    assert_eq!(
        access.required_capabilities(&old, Some(&kick)).unwrap().as_slice(),
        &[Capability::UpdateAttendees]
    );
    assert!(!access.can_perform_update(&old, Some(&kick)));
}

#[test]
fn external_attendee_default_bundle() {
    let store = TokenStore::in_memory().unwrap();
    let client = ExternalIdentity::new(ExternalAttendeeId(9), "Client@Example.com");
    let issued = store
        .issue_external_update_token(TENANT, client, EVENT, None)
        .unwrap();
    let access = Verifier::new(&store)
        .authorize(&issued.bearer().unwrap(), TENANT)
        .unwrap();

    let old = event();
    let mut decline = old.clone();
    decline.external_attendees.clear();
    assert!(access.can_perform_update(&old, Some(&decline)));

    let mut moved = old.clone();
    moved.start_time += Duration::days(1);
    moved.end_time += Duration::days(1);
    assert!(access.can_perform_update(&old, Some(&moved)));

    assert!(!access.can_perform_update(&old, Some(&retitled(&old))));
    assert!(access.can_perform_update(&old, None));
}

#[test]
fn update_cannot_move_event_to_another_calendar() {
    let store = TokenStore::in_memory().unwrap();
    let old = event();
    let mut moved = old.clone();
    moved.calendar_id = CalendarId(999);
    moved.id = EventId(12345);

    store
        .issue_owner_token(TENANT, OWNER, CALENDAR, Some(CapabilitySet::from([Capability::Create])))
        .unwrap();
    let owner = Verifier::new(&store)
        .authorize_user(OWNER, TENANT, None, Some(CALENDAR))
        .unwrap();
    assert!(!owner.can_perform_update(&old, Some(&moved)));

    let attendee = store.issue_attendee_token(TENANT, UserId(2), EVENT, None).unwrap();
    let access = Verifier::new(&store)
        .authorize(&attendee.bearer().unwrap(), TENANT)
        .unwrap();
    let mut same_id = old.clone();
    same_id.calendar_id = CalendarId(999);
    assert!(!access.can_perform_update(&old, Some(&same_id)));
    assert!(!access.can_perform_update(&old, Some(&moved)));
}

#[test]
fn cancellation_requires_exactly_cancel() {
    let store = TokenStore::in_memory().unwrap();
    let verifier = Verifier::new(&store);
    let old = event();

    let only_cancel = store
        .issue_attendee_token(TENANT, UserId(2), EVENT, Some(CapabilitySet::from([Capability::Cancel])))
        .unwrap();
    let access = verifier
        .authorize(&only_cancel.bearer().unwrap(), TENANT)
        .unwrap();
    assert_eq!(
        access.required_capabilities(&old, None).unwrap().as_slice(),
        &[Capability::Cancel]
    );
    assert!(access.can_perform_update(&old, None));
    assert!(!access.can_perform_update(&old, Some(&retitled(&old))));
}

#[test]
fn revocation_is_immediate_and_irreversible() {
    let store = TokenStore::in_memory().unwrap();
    let issued = store.issue_attendee_token(TENANT, OWNER, EVENT, None).unwrap();
    let bearer = issued.bearer().unwrap();
    let verifier = Verifier::new(&store);
    assert!(verifier.resolve(&bearer, TENANT).is_ok());

    store.revoke(TENANT, issued.token.id).unwrap();
    store.revoke(TENANT, issued.token.id).unwrap();

    for _ in 0..3 {
        assert!(matches!(verifier.resolve(&bearer, TENANT), Err(Error::InvalidToken)));
    }
    assert_eq!(
        verifier.authorize(&bearer, TENANT).unwrap(),
        Access::Denied(DenyReason::InvalidToken)
    );
    assert!(matches!(
        verifier.resolve_for_user(OWNER, TENANT, Some(EVENT), None),
        Err(Error::InvalidToken)
    ));
}

#[test]
fn empty_capability_override_is_rejected() {
    let store = TokenStore::in_memory().unwrap();
    let err: Error = store
        .issue_owner_token(TENANT, OWNER, CALENDAR, Some(CapabilitySet::new()))
        .unwrap_err()
        .into();
    assert!(matches!(err, Error::NoPermissionsSpecified));
}

#[test]
fn external_schedule_token_creates_only_on_its_calendar() {
    let store = TokenStore::in_memory().unwrap();
    let issued = store
        .issue_external_schedule_token(
            TENANT,
            ExternalIdentity::new(ExternalAttendeeId(9), "lead@example.com"),
            CALENDAR,
        )
        .unwrap();
    let access = Verifier::new(&store)
        .authorize(&issued.bearer().unwrap(), TENANT)
        .unwrap();
    let private = CalendarSettings::default();

    assert!(access.can_perform_scheduling(CALENDAR, &private, &proposal()));
    assert!(!access.can_perform_scheduling(CalendarId(101), &private, &proposal()));
    assert!(!access.can_perform_update(&event(), Some(&retitled(&event()))));
}

#[test]
fn public_calendar_accepts_anonymous_scheduling() {
    let public = CalendarSettings {
        accepts_public_scheduling: true,
        ..Default::default()
    };
    assert!(Access::Anonymous.can_perform_scheduling(CALENDAR, &public, &proposal()));
    assert!(!Access::Anonymous.can_perform_scheduling(
        CALENDAR,
        &CalendarSettings::default(),
        &proposal()
    ));
}

#[test]
fn attendee_token_cannot_schedule() {
    let store = TokenStore::in_memory().unwrap();
    let everything: CapabilitySet = Capability::ALL.into();
    let issued = store
        .issue_attendee_token(TENANT, OWNER, EVENT, Some(everything))
        .unwrap();
    let access = Verifier::new(&store)
        .authorize(&issued.bearer().unwrap(), TENANT)
        .unwrap();
    assert!(!access.can_perform_scheduling(
        CALENDAR,
        &CalendarSettings::default(),
        &proposal()
    ));
}

#[test]
fn tokens_do_not_cross_tenants() {
    let store = TokenStore::in_memory().unwrap();
    let issued = store.issue_attendee_token(TENANT, OWNER, EVENT, None).unwrap();
    let verifier = Verifier::new(&store);
    assert!(matches!(
        verifier.resolve(&issued.bearer().unwrap(), TenantId(2)),
        Err(Error::InvalidToken)
    ));
    assert!(matches!(
        verifier.resolve_for_user(OWNER, TenantId(2), Some(EVENT), None),
        Err(Error::InvalidToken)
    ));
}
