#![allow(dead_code)]

use glifstore_core::model::payload::{Anchor, PlacedComponent, Point};
use glifstore_core::{
    open_db_in_memory, Actor, ContainerService, Font, GlifKey, GlifKind, GlifPayload, Project,
    SqliteContainerRepository,
};
use rusqlite::Connection;
use std::collections::BTreeMap;

pub const HOUR_MS: i64 = 60 * 60 * 1000;

pub struct Fixture {
    pub conn: Connection,
    pub project: Project,
    pub font: Font,
}

/// In-memory store with one project (`hanzi-sans`) and one font (`bold`).
pub fn fixture() -> Fixture {
    let conn = open_db_in_memory().unwrap();
    let (project, font) = {
        let containers = ContainerService::new(SqliteContainerRepository::new(&conn));
        let project = containers
            .create_project(
                "Hanzi Sans",
                "https://git.example.com/hanzi-sans.git",
                &Actor::designer("owner"),
            )
            .unwrap();
        let font = containers.create_font(project.id, "Bold").unwrap();
        (project, font)
    };
    Fixture {
        conn,
        project,
        font,
    }
}

pub fn empty(name: &str) -> GlifPayload {
    GlifPayload::named(name)
}

/// One closed square contour plus one codepoint.
pub fn outlined(name: &str, codepoint: u32) -> GlifPayload {
    let mut payload = GlifPayload::named(name);
    payload.unicodes = vec![codepoint];
    payload.contours = vec![vec![
        point(0.0, 0.0),
        point(100.0, 0.0),
        point(100.0, 100.0),
        point(0.0, 100.0),
    ]];
    payload
}

pub fn with_anchor(name: &str) -> GlifPayload {
    let mut payload = GlifPayload::named(name);
    payload.anchors = vec![Anchor {
        name: "top".to_string(),
        x: 50.0,
        y: 120.0,
    }];
    payload
}

pub fn composed(name: &str, refs: &[(GlifKind, &str)]) -> GlifPayload {
    let mut payload = GlifPayload::named(name);
    payload.components = refs
        .iter()
        .map(|(kind, target)| PlacedComponent {
            kind: *kind,
            name: (*target).to_string(),
            coord: BTreeMap::new(),
        })
        .collect();
    payload
}

fn point(x: f64, y: f64) -> Point {
    Point {
        x,
        y,
        segment_type: Some("line".to_string()),
        smooth: false,
    }
}

/// Moves the lock timestamp `ms` into the past.
pub fn age_lock(conn: &Connection, key: GlifKey, ms: i64) {
    let changed = conn
        .execute(
            &format!(
                "UPDATE {} SET locked_at = locked_at - ?1 WHERE id = ?2 AND locked_at IS NOT NULL;",
                key.kind.table()
            ),
            rusqlite::params![ms, key.id.to_string()],
        )
        .unwrap();
    assert_eq!(changed, 1, "glif {key} has no lock to age");
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
