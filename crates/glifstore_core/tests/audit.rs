mod common;

use common::{count_rows, empty, fixture, outlined};
use glifstore_core::{Actor, GlifError, GlifKey, GlifKind, GlifService, GlifStatus};
use uuid::Uuid;

#[test]
fn record_edit_appends_history_and_tracks_editor_set() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();

    assert!(service.record_edit(key, &u1).unwrap());
    assert!(!service.record_edit(key, &u1).unwrap());
    assert!(service.record_edit(key, &Actor::designer("u0")).unwrap());

    let history = service.editors_history(key).unwrap();
    let actors = history
        .iter()
        .map(|entry| entry.actor.as_str())
        .collect::<Vec<_>>();
    assert_eq!(actors, vec!["u1", "u1", "u0"]);
    assert!(history.windows(2).all(|pair| pair[0].seq < pair[1].seq));

    let glif = service.get_glif(key, false).unwrap().unwrap();
    assert_eq!(glif.editors, vec!["u0".to_string(), "u1".to_string()]);
}

#[test]
fn data_and_status_writes_record_the_editor() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();

    let locked = service.acquire(key, &u1).unwrap();
    assert!(locked.editors.is_empty());
    assert!(service.editors_history(key).unwrap().is_empty());

    let written = service
        .set_data(key, outlined("uni4E00", 0x4E00), &u1)
        .unwrap();
    assert_eq!(written.editors, vec!["u1".to_string()]);

    let admin = Actor::admin("root");
    let advanced = service.advance(key, GlifStatus::Checking1, &admin).unwrap();
    assert_eq!(
        advanced.editors,
        vec!["root".to_string(), "u1".to_string()]
    );
    assert_eq!(service.editors_history(key).unwrap().len(), 2);
}

#[test]
fn editors_are_always_a_subset_of_history() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let key = service
        .create_glif(GlifKind::AtomicElement, fx.font.id, empty("stroke"))
        .unwrap()
        .key();
    for actor in ["u3", "u1", "u2", "u1"] {
        service.record_edit(key, &Actor::designer(actor)).unwrap();
    }
    service.remove_editor(key, "u2").unwrap();

    let history = service.editors_history(key).unwrap();
    let editors = service.get_glif(key, false).unwrap().unwrap().editors;
    assert_eq!(editors, vec!["u1".to_string(), "u3".to_string()]);
    for editor in &editors {
        assert!(history.iter().any(|entry| &entry.actor == editor));
    }
}

#[test]
fn remove_editor_keeps_history() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();
    service.record_edit(key, &Actor::designer("u1")).unwrap();

    assert!(service.remove_editor(key, "u1").unwrap());
    assert!(!service.remove_editor(key, "u1").unwrap());
    assert!(service
        .get_glif(key, false)
        .unwrap()
        .unwrap()
        .editors
        .is_empty());
    assert_eq!(service.editors_history(key).unwrap().len(), 1);

    assert!(service.record_edit(key, &Actor::designer("u1")).unwrap());
}

#[test]
fn history_rows_cannot_be_rewritten() {
    let mut fx = fixture();
    {
        let mut service = GlifService::with_defaults(&mut fx.conn);
        let key = service
            .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
            .unwrap()
            .key();
        service.record_edit(key, &Actor::designer("u1")).unwrap();
    }

    assert!(fx
        .conn
        .execute("UPDATE glif_editor_history SET actor_id = 'forged';", [])
        .is_err());
    assert!(fx
        .conn
        .execute("DELETE FROM glif_editor_history;", [])
        .is_err());
    assert_eq!(count_rows(&fx.conn, "glif_editor_history"), 1);
}

#[test]
fn commit_message_lists_font_editors_since_timestamp() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let first = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();
    let second = service
        .create_glif(GlifKind::DeepComponent, fx.font.id, empty("DC_a"))
        .unwrap()
        .key();
    service.record_edit(first, &Actor::designer("zoe")).unwrap();
    service.record_edit(second, &Actor::designer("adam")).unwrap();
    service.record_edit(first, &Actor::designer("adam")).unwrap();

    assert_eq!(
        service.font_editors_since(fx.font.id, 0).unwrap(),
        vec!["adam".to_string(), "zoe".to_string()]
    );
    assert_eq!(
        service.commit_message(fx.font.id, 0).unwrap(),
        "Updated Bold by: adam, zoe."
    );
    assert_eq!(
        service.commit_message(fx.font.id, i64::MAX).unwrap(),
        "Updated Bold."
    );
    assert!(matches!(
        service.commit_message(Uuid::new_v4(), 0).unwrap_err(),
        GlifError::FontNotFound(_)
    ));
}

#[test]
fn audit_on_unknown_glif_reports_not_found() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let missing = GlifKey::new(GlifKind::CharacterGlyph, Uuid::new_v4());

    assert!(matches!(
        service.record_edit(missing, &Actor::designer("u1")).unwrap_err(),
        GlifError::NotFound(_)
    ));
    assert!(matches!(
        service.editors_history(missing).unwrap_err(),
        GlifError::NotFound(_)
    ));
}
