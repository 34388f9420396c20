mod common;

use common::{empty, fixture, outlined, with_anchor};
use glifstore_core::{Actor, GlifError, GlifKind, GlifService, LayerKind};

#[test]
fn deep_components_have_no_layers() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::DeepComponent, fx.font.id, empty("DC_a"))
        .unwrap()
        .key();
    service.acquire(key, &u1).unwrap();

    let err = service
        .create_layer(key, "bold", empty("DC_a"), &u1)
        .unwrap_err();
    assert!(matches!(
        err,
        GlifError::LayersUnsupported(GlifKind::DeepComponent)
    ));
    assert!(matches!(
        service.list_layers(key, false).unwrap_err(),
        GlifError::LayersUnsupported(_)
    ));
}

#[test]
fn create_layer_goes_through_the_parent_lock() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::AtomicElement, fx.font.id, empty("stroke"))
        .unwrap()
        .key();

    assert!(matches!(
        service
            .create_layer(key, "wght_700", outlined("stroke", 0x4E00), &u1)
            .unwrap_err(),
        GlifError::NotLocked
    ));

    let before = service.acquire(key, &u1).unwrap();
    let layer = service
        .create_layer(key, " wght_700 ", outlined("stroke", 0x4E00), &u1)
        .unwrap();
    assert_eq!(layer.kind, LayerKind::AtomicElementLayer);
    assert_eq!(layer.glif_id, key.id);
    assert_eq!(layer.group_name, "wght_700");
    assert!(layer.flags.has_outlines);
    assert!(!layer.deleted);

    let parent = service.get_glif(key, false).unwrap().unwrap();
    assert_eq!(parent.version, before.version + 1);
    assert_eq!(parent.layers_updated_at, Some(layer.updated_at));
    assert_eq!(parent.editors, vec!["u1".to_string()]);

    assert_eq!(
        service.get_layer(key, "wght_700").unwrap(),
        Some(layer)
    );
}

#[test]
fn one_active_layer_per_group() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();
    service.acquire(key, &u1).unwrap();
    service.create_layer(key, "bold", empty("uni4E00"), &u1).unwrap();

    let err = service
        .create_layer(key, "bold", empty("uni4E00"), &u1)
        .unwrap_err();
    assert!(matches!(
        err,
        GlifError::LayerConflict { kind: LayerKind::CharacterGlyphLayer, group_name } if group_name == "bold"
    ));
    assert!(matches!(
        service.create_layer(key, "  ", empty("uni4E00"), &u1).unwrap_err(),
        GlifError::InvalidGroupName
    ));

    service.delete_layer(key, "bold", &u1).unwrap();
    service.create_layer(key, "bold", empty("uni4E00"), &u1).unwrap();
    assert_eq!(service.list_layers(key, false).unwrap().len(), 1);
    assert_eq!(service.list_layers(key, true).unwrap().len(), 2);
}

#[test]
fn set_layer_data_rederives_flags() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();
    service.acquire(key, &u1).unwrap();
    let created = service
        .create_layer(key, "bold", empty("uni4E00"), &u1)
        .unwrap();
    assert!(created.flags.is_empty);

    let updated = service
        .set_layer_data(key, "bold", with_anchor("uni4E00"), &u1)
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert!(!updated.flags.is_empty);
    assert!(!updated.flags.has_outlines);

    assert!(matches!(
        service
            .set_layer_data(key, "light", empty("uni4E00"), &u1)
            .unwrap_err(),
        GlifError::LayerNotFound { group_name, .. } if group_name == "light"
    ));
}

#[test]
fn rename_layer_moves_group() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();
    service.acquire(key, &u1).unwrap();
    service.create_layer(key, "bold", empty("uni4E00"), &u1).unwrap();
    service.create_layer(key, "light", empty("uni4E00"), &u1).unwrap();

    assert!(matches!(
        service.rename_layer(key, "bold", "light", &u1).unwrap_err(),
        GlifError::LayerConflict { .. }
    ));

    let before = service.get_glif(key, false).unwrap().unwrap();
    let same = service.rename_layer(key, "bold", "bold", &u1).unwrap();
    assert_eq!(same.group_name, "bold");
    assert_eq!(
        service.get_glif(key, false).unwrap().unwrap().version,
        before.version
    );

    let renamed = service.rename_layer(key, "bold", "black", &u1).unwrap();
    assert_eq!(renamed.group_name, "black");
    assert!(service.get_layer(key, "bold").unwrap().is_none());
    let groups = service
        .list_layers(key, false)
        .unwrap()
        .into_iter()
        .map(|layer| layer.group_name)
        .collect::<Vec<_>>();
    assert_eq!(groups, vec!["black".to_string(), "light".to_string()]);
}

#[test]
fn delete_layer_writes_tombstone() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let key = service
        .create_glif(GlifKind::AtomicElement, fx.font.id, empty("stroke"))
        .unwrap()
        .key();
    service.acquire(key, &u1).unwrap();
    service.create_layer(key, "bold", empty("stroke"), &u1).unwrap();

    let tombstone = service.delete_layer(key, "bold", &u1).unwrap();
    assert_eq!(
        tombstone.filepath,
        "hanzi-sans/bold.rcjk/atomicElement/bold/stroke.glif"
    );
    assert_eq!(tombstone.deleted_by.as_deref(), Some("u1"));
    assert!(service.get_layer(key, "bold").unwrap().is_none());
    assert!(service.get_glif(key, false).unwrap().unwrap().layers_updated_at.is_some());

    assert!(matches!(
        service.delete_layer(key, "bold", &u1).unwrap_err(),
        GlifError::LayerNotFound { .. }
    ));
}

#[test]
fn layer_writes_by_others_are_blocked() {
    let mut fx = fixture();
    let mut service = GlifService::with_defaults(&mut fx.conn);
    let u1 = Actor::designer("u1");
    let u2 = Actor::designer("u2");
    let key = service
        .create_glif(GlifKind::CharacterGlyph, fx.font.id, empty("uni4E00"))
        .unwrap()
        .key();
    service.acquire(key, &u1).unwrap();
    service.create_layer(key, "bold", empty("uni4E00"), &u1).unwrap();

    assert!(matches!(
        service
            .set_layer_data(key, "bold", outlined("uni4E00", 0x4E00), &u2)
            .unwrap_err(),
        GlifError::LockConflict { .. }
    ));
    assert!(matches!(
        service.delete_layer(key, "bold", &u2).unwrap_err(),
        GlifError::LockConflict { .. }
    ));
    assert!(service.get_layer(key, "bold").unwrap().unwrap().flags.is_empty);
}
