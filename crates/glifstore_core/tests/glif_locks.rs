mod common;

use common::{age_lock, empty, fixture, outlined, HOUR_MS};
use glifstore_core::{
    open_db, Actor, ContainerService, GlifError, GlifKind, GlifService, GlifStatus,
    SqliteContainerRepository, StoreConfig,
};
use uuid::Uuid;

#[test]
fn second_actor_cannot_acquire_or_write_a_held_lock() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let u2 = Actor::designer("u2");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();

    let locked = service.acquire(key, &u1).unwrap();
    assert_eq!(locked.locked_by(), Some("u1"));
    assert!(locked.locked_at().is_some());
    assert!(service.is_locked(key).unwrap());

    let err = service.acquire(key, &u2).unwrap_err();
    assert!(matches!(err, GlifError::LockConflict { holder } if holder == "u1"));
    let err = service
        .set_data(key, outlined("uni4E00", 0x4E00), &u2)
        .unwrap_err();
    assert!(matches!(err, GlifError::LockConflict { .. }));

    let written = service
        .set_data(key, outlined("uni4E00", 0x4E00), &u1)
        .unwrap();
    assert!(written.flags.has_outlines);
    assert!(written.flags.has_unicode);
    assert!(!written.flags.is_empty);
    assert_eq!(written.unicode_hex, "4E00");

    let advanced = service.advance(key, GlifStatus::Checking1, &u1).unwrap();
    assert_eq!(advanced.status.status, GlifStatus::Checking1);
    assert_eq!(advanced.status.previous, Some(GlifStatus::Wip));
    assert!(!advanced.status.downgraded);
}

#[test]
fn writes_require_holding_the_lock() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let key = service
        .create_glif(GlifKind::AtomicElement, fx.font.id, empty("stroke"))
        .unwrap()
        .key();

    let err = service
        .set_data(key, outlined("stroke", 0x4E00), &Actor::designer("u1"))
        .unwrap_err();
    assert!(matches!(err, GlifError::NotLocked));
    let err = service
        .advance(key, GlifStatus::Done, &Actor::designer("u1"))
        .unwrap_err();
    assert!(matches!(err, GlifError::NotLocked));

    let stored = service.get_glif(key, false).unwrap().unwrap();
    assert_eq!(stored.version, 0);
    assert!(stored.flags.is_empty);
}

#[test]
fn reacquire_by_holder_refreshes_lock_and_bumps_version() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::DeepComponent, fx.font.id, empty("DC_a"))
        .unwrap()
        .key();

    let first = service.acquire(key, &u1).unwrap();
    let second = service.acquire(key, &u1).unwrap();
    assert_eq!(second.locked_by(), Some("u1"));
    assert!(second.locked_at() >= first.locked_at());
    assert_eq!(second.version, first.version + 1);
}

#[test]
fn release_rules() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let u2 = Actor::designer("u2");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E01"))
        .unwrap()
        .key();

    assert!(!service.release(key, &u1, false).unwrap());

    service.acquire(key, &u1).unwrap();
    let held = service.get_glif(key, false).unwrap().unwrap();
    assert!(!service.release(key, &u2, false).unwrap());
    let untouched = service.get_glif(key, false).unwrap().unwrap();
    assert_eq!(untouched.lock, held.lock);
    assert_eq!(untouched.version, held.version);

    assert!(service.release(key, &u2, true).unwrap());
    let stored = service.get_glif(key, false).unwrap().unwrap();
    assert_eq!(stored.lock, None);
    assert!(!service.is_locked(key).unwrap());

    service.acquire(key, &u1).unwrap();
    assert!(service.release(key, &u1, false).unwrap());
}

#[test]
fn stale_lock_no_longer_blocks_other_actors() {
    let mut fx = fixture();
    let key = {
        let mut service = GlifService::with_defaults(&mut fx.conn);
        let key = service
            .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E02"))
            .unwrap()
            .key();
        service.acquire(key, &Actor::designer("u2")).unwrap();
        key
    };
    age_lock(&fx.conn, key, 2 * HOUR_MS);

    let mut service = GlifService::with_defaults(&mut fx.conn);
    assert!(!service.is_locked(key).unwrap());

    let err = service
        .set_data(key, empty("uni4E02"), &Actor::designer("u1"))
        .unwrap_err();
    assert!(matches!(err, GlifError::NotLocked));

    let taken = service.acquire(key, &Actor::designer("u1")).unwrap();
    assert_eq!(taken.locked_by(), Some("u1"));
}

#[test]
fn administrative_unlock_clears_stale_lock_of_another_actor() {
    let mut fx = fixture();
    let u1 = Actor::designer("u1");
    let key = {
        let mut service = GlifService::with_defaults(&mut fx.conn);
        let key = service
            .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E03"))
            .unwrap()
            .key();
        service.acquire(key, &Actor::designer("u2")).unwrap();
        key
    };
    age_lock(&fx.conn, key, 2 * HOUR_MS);

    let mut service = GlifService::with_defaults(&mut fx.conn);
    assert!(service.release(key, &u1, true).unwrap());
    assert_eq!(service.get_glif(key, false).unwrap().unwrap().lock, None);

    let taken = service.acquire(key, &u1).unwrap();
    assert_eq!(taken.locked_by(), Some("u1"));
}

#[test]
fn stale_lock_of_another_actor_survives_plain_release() {
    let mut fx = fixture();
    let key = {
        let mut service = GlifService::with_defaults(&mut fx.conn);
        let key = service
            .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E05"))
            .unwrap()
            .key();
        service.acquire(key, &Actor::designer("u2")).unwrap();
        key
    };
    age_lock(&fx.conn, key, 2 * HOUR_MS);

    let mut service = GlifService::with_defaults(&mut fx.conn);
    assert!(!service.release(key, &Actor::designer("u1"), false).unwrap());
    let stored = service.get_glif(key, false).unwrap().unwrap();
    assert_eq!(stored.locked_by(), Some("u2"));
    assert!(!service.is_locked(key).unwrap());
}

#[test]
fn administrator_takes_over_lock_on_write() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E04"))
        .unwrap()
        .key();
    service.acquire(key, &Actor::designer("u1")).unwrap();

    let admin = Actor::admin("root");
    let advanced = service.advance(key, GlifStatus::Checking2, &admin).unwrap();
    assert_eq!(advanced.locked_by(), Some("root"));
    assert_eq!(advanced.status.status, GlifStatus::Checking2);

    let err = service
        .set_data(key, empty("uni4E04"), &Actor::designer("u1"))
        .unwrap_err();
    assert!(matches!(err, GlifError::LockConflict { holder } if holder == "root"));
}

#[test]
fn sweep_releases_only_stale_locks() {
    let mut fx = fixture();
    let (stale, live) = {
        let mut service = GlifService::with_defaults(&mut fx.conn);
        let stale = service
            .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E05"))
            .unwrap()
            .key();
        let live = service
            .create_glif(GlifKind::AtomicElement, fx.font.id, empty("dot"))
            .unwrap()
            .key();
        service.acquire(stale, &Actor::designer("u1")).unwrap();
        service.acquire(live, &Actor::designer("u2")).unwrap();
        (stale, live)
    };
    age_lock(&fx.conn, stale, 2 * HOUR_MS);

    let mut service = GlifService::with_defaults(&mut fx.conn);
    assert!(service
        .sweep_stale_locks(Some(Uuid::new_v4()))
        .unwrap()
        .is_empty());

    let swept = service.sweep_stale_locks(Some(fx.font.id)).unwrap();
    assert_eq!(swept, vec![stale]);
    assert_eq!(service.get_glif(stale, false).unwrap().unwrap().lock, None);
    assert_eq!(
        service.get_glif(live, false).unwrap().unwrap().locked_by(),
        Some("u2")
    );

    assert!(service.sweep_stale_locks(None).unwrap().is_empty());
}

#[test]
fn zero_ttl_disables_lock_expiry() {
    let mut fx = fixture();
    let config = StoreConfig::from_toml_str("lock_ttl_secs = 0").unwrap();
    let key = {
        let mut service = GlifService::new(&mut fx.conn, &config);
        let key = service
            .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E06"))
            .unwrap()
            .key();
        service.acquire(key, &Actor::designer("u1")).unwrap();
        key
    };
    age_lock(&fx.conn, key, 1000 * HOUR_MS);

    let mut service = GlifService::new(&mut fx.conn, &config);
    assert!(service.is_locked(key).unwrap());
    assert!(matches!(
        service.acquire(key, &Actor::designer("u2")).unwrap_err(),
        GlifError::LockConflict { .. }
    ));
    assert!(service.sweep_stale_locks(None).unwrap().is_empty());
}

#[test]
fn unlock_all_counts_only_held_locks() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let held = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E07"))
        .unwrap()
        .key();
    let free = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E08"))
        .unwrap()
        .key();
    service.acquire(held, &Actor::designer("u1")).unwrap();

    assert_eq!(service.unlock_all(&[held, free]).unwrap(), 1);
    assert!(!service.is_locked(held).unwrap());
    assert_eq!(service.unlock_all(&[held, free]).unwrap(), 0);
}

#[test]
fn stale_version_is_rejected_as_write_conflict() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E09"))
        .unwrap()
        .key();
    let read = service.acquire(key, &u1).unwrap();

    let written = service
        .set_data_at_version(key, outlined("uni4E09", 0x4E09), &u1, read.version)
        .unwrap();
    assert_eq!(written.version, read.version + 1);

    let err = service
        .set_data_at_version(key, empty("uni4E09"), &u1, read.version)
        .unwrap_err();
    assert!(matches!(
        err,
        GlifError::WriteConflict { expected, actual }
            if expected == read.version && actual == written.version
    ));
    let stored = service.get_glif(key, false).unwrap().unwrap();
    assert!(stored.flags.has_outlines);
}

#[test]
fn concurrent_sessions_serialize_on_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("glifstore.db");
    let mut first = open_db(&path).unwrap();
    let mut second = open_db(&path).unwrap();

    let font_id = {
        let containers = ContainerService::new(SqliteContainerRepository::new(&first));
        let project = containers
            .create_project("Shared", "https://git.example.com/shared.git", &Actor::designer("owner"))
            .unwrap();
        containers.create_font(project.id, "Regular").unwrap().id
    };

    let mut session_a = GlifService::with_defaults(&mut first);
    let key = session_a
        .create_glif(GlifKind::CharacterGlyph, font_id, empty("uni4E0A"))
        .unwrap()
        .key();
    session_a.acquire(key, &Actor::designer("u1")).unwrap();

    let mut session_b = GlifService::with_defaults(&mut second);
    let err = session_b.acquire(key, &Actor::designer("u2")).unwrap_err();
    assert!(matches!(err, GlifError::LockConflict { holder } if holder == "u1"));

    session_a.release(key, &Actor::designer("u1"), false).unwrap();
    let taken = session_b.acquire(key, &Actor::designer("u2")).unwrap();
    assert_eq!(taken.locked_by(), Some("u2"));
}

#[test]
fn operations_on_unknown_glif_report_not_found() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let missing = glifstore_core::GlifKey::new(GlifKind::CharacterGlyph, Uuid::new_v4());

    assert!(matches!(
        service.acquire(missing, &Actor::designer("u1")).unwrap_err(),
        GlifError::NotFound(key) if key == missing
    ));
    assert!(matches!(
        service.is_locked(missing).unwrap_err(),
        GlifError::NotFound(_)
    ));
}

#[test]
fn blank_actor_is_rejected() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E0B"))
        .unwrap()
        .key();

    assert!(matches!(
        service.acquire(key, &Actor::designer("  ")).unwrap_err(),
        GlifError::InvalidActor
    ));
}
