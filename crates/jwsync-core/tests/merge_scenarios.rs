//! # Merge Scenarios
//!
//! End-to-end merges of real `.jwlibrary` containers built on the fly:
//! SQLite database, manifest and attachments, packed with the crate's own
//! codec and merged with the built-in catalog.

// Allow panic in tests - standard for asserting on error variants
#![allow(clippy::unwrap_used, clippy::panic)]

use jwsync_core::schema::jw_library::catalog;
use jwsync_core::schema::IdentityRule;
use jwsync_core::{
    ConflictPolicy, ErrorKind, Manifest, MergeOptions, MergeState, Merger, RowKey, Schema,
    SchemaVersion, Snapshot, SyncError, Table, TableSchema, UserDataBackup, Value, content_hash,
    merge, pack, unpack, verify,
};
use rusqlite::Connection;
use serde_json::Map;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::macros::datetime;

// =============================================================================
// FIXTURES
// =============================================================================

const DDL: &str = "
    CREATE TABLE Location (
        LocationId INTEGER PRIMARY KEY, BookNumber INTEGER, ChapterNumber INTEGER,
        DocumentId INTEGER, Track INTEGER, IssueTagNumber INTEGER NOT NULL DEFAULT 0,
        KeySymbol TEXT, MepsLanguage INTEGER, Type INTEGER NOT NULL, Title TEXT);
    CREATE TABLE UserMark (
        UserMarkId INTEGER PRIMARY KEY, ColorIndex INTEGER NOT NULL, LocationId INTEGER NOT NULL,
        StyleIndex INTEGER NOT NULL, UserMarkGuid TEXT NOT NULL UNIQUE, Version INTEGER NOT NULL);
    CREATE TABLE BlockRange (
        BlockRangeId INTEGER PRIMARY KEY, BlockType INTEGER NOT NULL, Identifier INTEGER NOT NULL,
        StartToken INTEGER, EndToken INTEGER, UserMarkId INTEGER NOT NULL);
    CREATE TABLE Note (
        NoteId INTEGER PRIMARY KEY, Guid TEXT NOT NULL UNIQUE, UserMarkId INTEGER,
        LocationId INTEGER, Title TEXT, Content TEXT, LastModified TEXT NOT NULL,
        Created TEXT, BlockType INTEGER NOT NULL DEFAULT 0, BlockIdentifier INTEGER);
    CREATE TABLE PlaylistItem (
        PlaylistItemId INTEGER PRIMARY KEY, Label TEXT NOT NULL, StartTrimOffsetTicks INTEGER,
        EndTrimOffsetTicks INTEGER, Accuracy INTEGER NOT NULL, EndAction INTEGER NOT NULL,
        ThumbnailFilePath TEXT);
    CREATE TABLE Tag (TagId INTEGER PRIMARY KEY, Type INTEGER NOT NULL, Name TEXT NOT NULL);
    CREATE TABLE InputField (
        LocationId INTEGER NOT NULL, TextTag TEXT NOT NULL, Value TEXT NOT NULL,
        PRIMARY KEY (LocationId, TextTag));
    CREATE TABLE TagMap (
        TagMapId INTEGER PRIMARY KEY, PlaylistItemId INTEGER, LocationId INTEGER, NoteId INTEGER,
        TagId INTEGER NOT NULL, Position INTEGER NOT NULL, UNIQUE (TagId, Position));
    CREATE TABLE LastModified (LastModified TEXT NOT NULL);
    CREATE TABLE Bookmark (BookmarkId INTEGER PRIMARY KEY, Title TEXT);
    INSERT INTO LastModified VALUES ('2024-01-01T00:00:00Z');
";

const COMPLETED: OffsetDateTime = datetime!(2024-06-02 13:04:05 UTC);

/// A userData.db with the JW Library tables, `user_version` and `rows`.
fn database(version: u32, rows: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("userData.db");
    let conn = Connection::open(&path).expect("open");
    conn.execute_batch(DDL).expect("ddl");
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .expect("user_version");
    conn.execute_batch(rows).expect("rows");
    drop(conn);
    std::fs::read(&path).expect("read")
}

fn manifest(version: u32, database: &[u8], device: &str) -> Manifest {
    Manifest {
        name: format!("UserdataBackup_{device}"),
        creation_date: "2024-01-01".to_string(),
        version: 1,
        kind: 0,
        user_data_backup: UserDataBackup {
            last_modified_date: "2024-01-01T00:00:00Z".to_string(),
            device_name: device.to_string(),
            database_name: "userData.db".to_string(),
            hash: content_hash(database),
            schema_version: version,
            database_size: None,
            row_counts: None,
            extra: Map::new(),
        },
        extra: Map::new(),
    }
}

fn container(version: u32, rows: &str, device: &str, attachments: &[(&str, &[u8])]) -> Vec<u8> {
    let db = database(version, rows);
    let attachments: BTreeMap<String, Vec<u8>> = attachments
        .iter()
        .map(|(name, bytes)| ((*name).to_string(), bytes.to_vec()))
        .collect();
    pack(&manifest(version, &db, device), &db, &attachments).expect("pack")
}

fn merged_snapshot(bytes: &[u8]) -> Snapshot {
    unpack(bytes, &catalog()).expect("unpack output").snapshot
}

fn column(table: &Table, name: &str) -> usize {
    table.column_index(name).expect("column")
}

const KITCHEN: &str =
    "INSERT INTO Location (LocationId, BookNumber, ChapterNumber, KeySymbol, MepsLanguage, Type)
     VALUES (1, 40, 5, 'nwtsty', 0, 0);";

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn same_location_new_note_is_remapped() {
    let primary = container(
        14,
        &format!(
            "{KITCHEN}
             INSERT INTO Note (NoteId, Guid, LocationId, Title, Content, LastModified)
             VALUES (1, 'note-a', 1, 'A', 'first', '2024-01-01T00:00:00Z');"
        ),
        "Phone",
        &[],
    );
    let secondary = container(
        14,
        "INSERT INTO Location (LocationId, BookNumber, ChapterNumber, KeySymbol, MepsLanguage, Type)
         VALUES (5, 40, 5, 'nwtsty', 0, 0);
         INSERT INTO Note (NoteId, Guid, LocationId, Title, Content, LastModified)
         VALUES (1, 'note-b', 5, 'B', 'second', '2024-01-02T00:00:00Z');",
        "Tablet",
        &[],
    );

    let outcome = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    let merged = merged_snapshot(&outcome.container);

    let locations = merged.table("Location").expect("Location");
    assert_eq!(locations.len(), 1);

    let notes = merged.table("Note").expect("Note");
    assert_eq!(notes.len(), 2);
    let note_b = notes.get(RowKey(2)).expect("fresh key 2");
    assert_eq!(note_b.get(column(notes, "Guid")), &Value::text("note-b"));
    assert_eq!(note_b.get(column(notes, "LocationId")), &Value::Integer(1));

    assert_eq!(outcome.report.tables["Location"].deduplicated, 1);
    assert_eq!(outcome.report.tables["Note"].inserted, 1);
}

#[test]
fn manifest_is_regenerated_and_consistent() {
    let primary = container(14, KITCHEN, "Phone", &[]);
    let secondary = container(14, KITCHEN, "Tablet", &[]);

    let outcome = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");

    assert!(verify(&outcome.container).expect("verify"));
    assert_eq!(outcome.file_name, "merged_2024-06-02_13-04-05.jwlibrary");

    let unpacked = unpack(&outcome.container, &catalog()).expect("unpack");
    let backup = &unpacked.manifest.user_data_backup;
    assert_eq!(backup.hash, content_hash(&unpacked.database));
    assert_eq!(backup.last_modified_date, "2024-06-02T13:04:05Z");
    assert_eq!(backup.device_name, "Phone");
    assert_eq!(backup.database_size, Some(unpacked.database.len() as u64));
    assert_eq!(
        backup.row_counts.as_ref().and_then(|c| c.get("Location")),
        Some(&1)
    );
    assert_eq!(unpacked.manifest, outcome.manifest);
}

#[test]
fn incompatible_versions_are_rejected() {
    let options = MergeOptions {
        min_schema_version: 1,
        max_schema_version: 3,
        ..MergeOptions::default()
    };
    let primary = container(1, "", "Phone", &[]);
    let secondary = container(3, "", "Tablet", &[]);

    let schema = catalog();
    let mut merger = Merger::new(&schema, options);
    let result = merger.merge_containers(&primary, &secondary, COMPLETED);

    assert!(matches!(result, Err(SyncError::UnsupportedSchema(_))));
    assert_eq!(merger.state(), &MergeState::Failed(ErrorKind::UnsupportedSchema));
}

#[test]
fn manifest_and_user_version_must_agree() {
    let db = database(13, "");
    let bytes = pack(&manifest(14, &db, "Phone"), &db, &BTreeMap::new()).expect("pack");
    assert!(matches!(
        unpack(&bytes, &catalog()),
        Err(SyncError::UnsupportedSchema(_))
    ));
}

#[test]
fn dangling_note_reference_is_unresolved() {
    let primary = container(14, KITCHEN, "Phone", &[]);
    let secondary = container(
        14,
        "INSERT INTO Note (NoteId, Guid, LocationId, Content, LastModified)
         VALUES (1, 'orphan', 99, 'lost', '2024-01-01T00:00:00Z');",
        "Tablet",
        &[],
    );

    let schema = catalog();
    let mut merger = Merger::new(&schema, MergeOptions::default());
    match merger.merge_containers(&primary, &secondary, COMPLETED) {
        Err(SyncError::UnresolvedReference {
            table,
            column,
            references,
            key,
            ..
        }) => {
            assert_eq!(table, "Note");
            assert_eq!(column, "LocationId");
            assert_eq!(references, "Location");
            assert_eq!(key, 99);
        }
        other => panic!("expected unresolved reference, got {:?}", other.map(|o| o.file_name)),
    }
    assert_eq!(
        merger.state(),
        &MergeState::Failed(ErrorKind::UnresolvedReference)
    );
}

#[test]
fn newer_note_wins_unless_primary_wins() {
    let primary = container(
        14,
        "INSERT INTO Note (NoteId, Guid, Content, LastModified)
         VALUES (1, 'shared', 'old text', '2024-01-01T00:00:00Z');",
        "Phone",
        &[],
    );
    let secondary = container(
        14,
        "INSERT INTO Note (NoteId, Guid, Content, LastModified)
         VALUES (8, 'shared', 'new text', '2024-03-01T00:00:00Z');",
        "Tablet",
        &[],
    );

    let content_of = |options: MergeOptions| {
        let outcome = merge(&primary, &secondary, options, COMPLETED).expect("merge");
        let merged = merged_snapshot(&outcome.container);
        let notes = merged.table("Note").expect("Note");
        assert_eq!(notes.len(), 1);
        notes
            .get(RowKey(1))
            .expect("primary key kept")
            .get(column(notes, "Content"))
            .clone()
    };

    assert_eq!(content_of(MergeOptions::default()), Value::text("new text"));
    assert_eq!(
        content_of(MergeOptions {
            policy: ConflictPolicy::PrimaryWins,
            ..MergeOptions::default()
        }),
        Value::text("old text")
    );
}

#[test]
fn tag_positions_do_not_collide() {
    let primary = container(
        14,
        "INSERT INTO Tag VALUES (1, 1, 'Favorites');
         INSERT INTO Note (NoteId, Guid, Content, LastModified) VALUES (1, 'a', 'x', '2024-01-01T00:00:00Z');
         INSERT INTO TagMap (TagMapId, NoteId, TagId, Position) VALUES (1, 1, 1, 0);",
        "Phone",
        &[],
    );
    let secondary = container(
        14,
        "INSERT INTO Tag VALUES (3, 1, 'Favorites');
         INSERT INTO Note (NoteId, Guid, Content, LastModified) VALUES (4, 'b', 'y', '2024-01-01T00:00:00Z');
         INSERT INTO TagMap (TagMapId, NoteId, TagId, Position) VALUES (1, 4, 3, 0);",
        "Tablet",
        &[],
    );

    let outcome = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    let merged = merged_snapshot(&outcome.container);

    let tag_map = merged.table("TagMap").expect("TagMap");
    assert_eq!(tag_map.len(), 2);
    let added = tag_map.get(RowKey(2)).expect("new tag map");
    assert_eq!(added.get(column(tag_map, "TagId")), &Value::Integer(1));
    assert_eq!(added.get(column(tag_map, "NoteId")), &Value::Integer(2));
    assert_eq!(added.get(column(tag_map, "Position")), &Value::Integer(1));
}

#[test]
fn input_fields_follow_their_location() {
    let primary = container(14, KITCHEN, "Phone", &[]);
    let secondary = container(
        14,
        "INSERT INTO Location (LocationId, BookNumber, ChapterNumber, KeySymbol, MepsLanguage, Type)
         VALUES (3, 40, 5, 'nwtsty', 0, 0);
         INSERT INTO InputField VALUES (3, 'tt1', 'answer');",
        "Tablet",
        &[],
    );

    let outcome = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    let merged = merged_snapshot(&outcome.container);

    let fields = merged.table("InputField").expect("InputField");
    assert_eq!(fields.len(), 1);
    assert_eq!(
        fields.rows()[0].get(column(fields, "LocationId")),
        &Value::Integer(1)
    );
}

#[test]
fn ambiguous_identity_is_an_error() {
    let primary = container(
        14,
        "INSERT INTO Tag VALUES (1, 1, 'Twice');
         INSERT INTO Tag VALUES (2, 1, 'Twice');",
        "Phone",
        &[],
    );
    let secondary = container(14, "INSERT INTO Tag VALUES (1, 1, 'Twice');", "Tablet", &[]);

    let result = merge(&primary, &secondary, MergeOptions::default(), COMPLETED);
    match result {
        Err(SyncError::IdentityAmbiguity {
            table, candidates, ..
        }) => {
            assert_eq!(table, "Tag");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected ambiguity, got {:?}", other.map(|o| o.file_name)),
    }
}

#[test]
fn output_is_deterministic() {
    let primary = container(14, KITCHEN, "Phone", &[("a.png", b"1")]);
    let secondary = container(
        14,
        "INSERT INTO Tag VALUES (1, 1, 'New');",
        "Tablet",
        &[("b.png", b"2")],
    );

    let first = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    let second = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    assert_eq!(first.container, second.container);
}

#[test]
fn attachments_and_foreign_tables_are_carried() {
    let primary = container(
        14,
        "INSERT INTO Bookmark VALUES (1, 'keep');",
        "Phone",
        &[("a.png", b"primary"), ("shared.png", b"mine")],
    );
    let secondary = container(
        14,
        "INSERT INTO Bookmark VALUES (1, 'ignored');",
        "Tablet",
        &[("b.png", b"secondary"), ("shared.png", b"theirs")],
    );

    let outcome = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    let unpacked = unpack(&outcome.container, &catalog()).expect("unpack");

    assert_eq!(
        unpacked.attachments.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["a.png", "b.png", "shared.png"]
    );
    assert_eq!(unpacked.attachments["shared.png"], b"mine".to_vec());

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.db");
    std::fs::write(&path, &unpacked.database).expect("write");
    let conn = Connection::open(&path).expect("open");
    let title: String = conn
        .query_row("SELECT Title FROM Bookmark", [], |r| r.get(0))
        .expect("bookmark");
    assert_eq!(title, "keep");
    let stamp: String = conn
        .query_row("SELECT LastModified FROM LastModified", [], |r| r.get(0))
        .expect("stamp");
    assert_eq!(stamp, "2024-06-02T13:04:05Z");
}

#[test]
fn corrupt_container_is_rejected() {
    let good = container(14, "", "Phone", &[]);
    let result = merge(b"PK\x03\x04 truncated", &good, MergeOptions::default(), COMPLETED);
    assert_eq!(
        result.map(|o| o.file_name).map_err(|e| e.kind()),
        Err(ErrorKind::CorruptArchive)
    );
}

#[test]
fn missing_table_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("userData.db");
    let conn = Connection::open(&path).expect("open");
    conn.execute_batch(DDL).expect("ddl");
    conn.execute_batch("DROP TABLE TagMap; PRAGMA user_version = 14;")
        .expect("drop");
    drop(conn);
    let db = std::fs::read(&path).expect("read");
    let broken = pack(&manifest(14, &db, "Old"), &db, &BTreeMap::new()).expect("pack");

    let good = container(14, "", "Phone", &[]);
    match merge(&good, &broken, MergeOptions::default(), COMPLETED) {
        Err(SyncError::MissingTable(name)) => assert_eq!(name, "TagMap"),
        other => panic!("expected missing table, got {:?}", other.map(|o| o.file_name)),
    }
}

#[test]
fn cyclic_catalog_is_rejected() {
    let schema = Schema::new(vec![
        TableSchema::new("a", &["id", "b_fk"])
            .with_key("id")
            .with_nullable_foreign_key("b_fk", "b"),
        TableSchema::new("b", &["id", "a_fk"])
            .with_key("id")
            .with_nullable_foreign_key("a_fk", "a")
            .with_identity(IdentityRule::AllColumns),
    ]);
    let empty = Snapshot::new(SchemaVersion(14));

    let mut merger = Merger::new(&schema, MergeOptions::default());
    let result = merger.merge_snapshots(&empty, &empty);

    assert!(matches!(result, Err(SyncError::CyclicSchema(_))));
    assert_eq!(merger.state(), &MergeState::Failed(ErrorKind::CyclicSchema));
}

// =============================================================================
// LOCATION IDENTITY
// =============================================================================

const ISSUE: &str =
    "INSERT INTO Location (LocationId, DocumentId, IssueTagNumber, KeySymbol, MepsLanguage, Type, Title)
     VALUES (1, 2024281, 20240100, 'w', 0, 3, 'Study article');";

#[test]
fn issue_locations_match_on_issue_columns() {
    let primary = container(14, ISSUE, "Phone", &[]);
    let secondary = container(
        14,
        "INSERT INTO Location (LocationId, BookNumber, DocumentId, IssueTagNumber, KeySymbol, MepsLanguage, Type, Title)
         VALUES (7, 19, 2024281, 20240100, 'w', 0, 3, 'Renamed on tablet');
         INSERT INTO Location (LocationId, DocumentId, IssueTagNumber, KeySymbol, MepsLanguage, Type)
         VALUES (8, 2024282, 20240200, 'w', 0, 3);
         INSERT INTO Note (NoteId, Guid, LocationId, Content, LastModified)
         VALUES (1, 'on-issue', 7, 'x', '2024-01-01T00:00:00Z');",
        "Tablet",
        &[],
    );

    let outcome = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    let merged = merged_snapshot(&outcome.container);

    let locations = merged.table("Location").expect("Location");
    assert_eq!(locations.len(), 2);
    let kept = locations.get(RowKey(1)).expect("primary issue");
    assert_eq!(kept.get(column(locations, "Title")), &Value::text("Study article"));
    assert_eq!(kept.get(column(locations, "BookNumber")), &Value::Null);
    assert_eq!(outcome.report.tables["Location"].deduplicated, 1);
    assert_eq!(outcome.report.tables["Location"].inserted, 1);

    let notes = merged.table("Note").expect("Note");
    let note = notes.rows().first().expect("note");
    assert_eq!(note.get(column(notes, "LocationId")), &Value::Integer(1));
}

#[test]
fn document_locations_ignore_non_identity_fields() {
    let primary = container(
        14,
        "INSERT INTO Location (LocationId, DocumentId, KeySymbol, MepsLanguage, Type, Title)
         VALUES (1, 1102021, 'lff', 0, 0, 'Lesson 1');",
        "Phone",
        &[],
    );
    let secondary = container(
        14,
        "INSERT INTO Location (LocationId, DocumentId, Track, KeySymbol, MepsLanguage, Type, Title)
         VALUES (4, 1102021, 2, 'lff', 0, 0, 'Lesson one');
         INSERT INTO Location (LocationId, KeySymbol, MepsLanguage, Type)
         VALUES (5, 'lff', 0, 0);
         INSERT INTO InputField VALUES (4, 'tt3', 'typed on tablet');",
        "Tablet",
        &[],
    );

    let outcome = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    let merged = merged_snapshot(&outcome.container);

    let locations = merged.table("Location").expect("Location");
    assert_eq!(locations.len(), 2);
    let kept = locations.get(RowKey(1)).expect("primary document");
    assert_eq!(kept.get(column(locations, "Title")), &Value::text("Lesson 1"));
    assert_eq!(kept.get(column(locations, "Track")), &Value::Null);

    // Same symbol without a document falls back to the book/chapter branch.
    let fallback = locations.get(RowKey(2)).expect("fallback location");
    assert_eq!(fallback.get(column(locations, "DocumentId")), &Value::Null);

    let fields = merged.table("InputField").expect("InputField");
    assert_eq!(
        fields.rows()[0].get(column(fields, "LocationId")),
        &Value::Integer(1)
    );
}

#[test]
fn full_catalog_self_merge_inserts_nothing() {
    let rows = format!(
        "{KITCHEN}
         {issue}
         INSERT INTO UserMark VALUES (1, 2, 1, 0, 'mark-1', 1);
         INSERT INTO BlockRange VALUES (1, 1, 3, 0, 12, 1);
         INSERT INTO Note (NoteId, Guid, UserMarkId, LocationId, Title, Content, LastModified)
         VALUES (1, 'note-1', 1, 1, 'Title', 'Body', '2024-01-01T00:00:00Z');
         INSERT INTO PlaylistItem VALUES (1, 'Song 1', NULL, NULL, 1, 0, NULL);
         INSERT INTO Tag VALUES (1, 1, 'Favorites');
         INSERT INTO InputField VALUES (2, 'tt1', 'answer');
         INSERT INTO TagMap (TagMapId, NoteId, TagId, Position) VALUES (1, 1, 1, 0);
         INSERT INTO TagMap (TagMapId, PlaylistItemId, TagId, Position) VALUES (2, 1, 1, 1);",
        issue = ISSUE.replace("VALUES (1,", "VALUES (2,"),
    );
    let backup = container(14, &rows, "Phone", &[]);

    let outcome = merge(&backup, &backup, MergeOptions::default(), COMPLETED).expect("merge");
    assert_eq!(outcome.report.inserted(), 0);
    assert_eq!(outcome.report.superseded(), 0);

    let original = unpack(&backup, &catalog()).expect("unpack input").snapshot;
    assert_eq!(original.total_rows(), 10);
    assert_eq!(merged_snapshot(&outcome.container), original);
}

// =============================================================================
// EDGE CASES
// =============================================================================

#[test]
fn non_utf8_primary_text_survives_merge() {
    let primary = container(
        14,
        "INSERT INTO Note (NoteId, Guid, Content, LastModified)
         VALUES (1, 'raw', CAST(x'61ff62' AS TEXT), '2024-01-01T00:00:00Z');",
        "Phone",
        &[],
    );
    let secondary = container(14, KITCHEN, "Tablet", &[]);

    let outcome = merge(&primary, &secondary, MergeOptions::default(), COMPLETED).expect("merge");
    let unpacked = unpack(&outcome.container, &catalog()).expect("unpack");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.db");
    std::fs::write(&path, &unpacked.database).expect("write");
    let conn = Connection::open(&path).expect("open");
    let content: Vec<u8> = conn
        .query_row("SELECT CAST(Content AS BLOB) FROM Note WHERE NoteId = 1", [], |r| {
            r.get(0)
        })
        .expect("content");
    assert_eq!(content, vec![0x61, 0xff, 0x62]);
}

#[test]
fn exhausted_key_space_is_reported() {
    let primary = container(
        14,
        "INSERT INTO Location (LocationId, BookNumber, ChapterNumber, KeySymbol, MepsLanguage, Type)
         VALUES (9223372036854775807, 1, 1, 'nwtsty', 0, 0);",
        "Phone",
        &[],
    );
    let secondary = container(14, KITCHEN, "Tablet", &[]);

    let schema = catalog();
    let mut merger = Merger::new(&schema, MergeOptions::default());
    match merger.merge_containers(&primary, &secondary, COMPLETED) {
        Err(SyncError::KeySpaceExhausted(table)) => assert_eq!(table, "Location"),
        other => panic!("expected exhausted key space, got {:?}", other.map(|o| o.file_name)),
    }
    assert_eq!(
        merger.state(),
        &MergeState::Failed(ErrorKind::KeySpaceExhausted)
    );
}
