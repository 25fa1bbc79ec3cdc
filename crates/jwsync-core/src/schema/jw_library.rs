//! # JW Library userData Catalog
//!
//! The tables of a JW Library `userData.db` that carry user content and
//! how each one is matched across backups. Tables outside this catalog
//! (bookmarks, independent media, playlist media maps, ...) are carried over
//! from the primary backup unchanged.
//!
//! | Table | Identity |
//! |-------|----------|
//! | Location | conditional on `Type` / `DocumentId` |
//! | UserMark | `UserMarkGuid` |
//! | BlockRange | all non-key columns |
//! | Note | `Guid` (newest `LastModified` wins) |
//! | PlaylistItem | all non-key columns |
//! | Tag | `(Type, Name)` |
//! | InputField | `(LocationId, TextTag)` |
//! | TagMap | association, `Position` re-sequenced per tag |

use super::{Condition, IdentityBranch, IdentityRule, Schema, TableSchema};
use crate::Value;

pub const LOCATION: &str = "Location";
pub const USER_MARK: &str = "UserMark";
pub const BLOCK_RANGE: &str = "BlockRange";
pub const NOTE: &str = "Note";
pub const PLAYLIST_ITEM: &str = "PlaylistItem";
pub const TAG: &str = "Tag";
pub const INPUT_FIELD: &str = "InputField";
pub const TAG_MAP: &str = "TagMap";

/// `Location.Type` of publication-issue locations (periodicals, media).
const LOCATION_TYPE_ISSUE: i64 = 3;

/// Location identity.
///
/// Issue locations are identified by symbol/issue/document/track; other
/// locations by book/chapter, plus the document when there is one.
fn location_identity() -> IdentityRule {
    IdentityRule::Conditional(vec![
        IdentityBranch::new(
            Condition::Equals {
                column: "Type".to_string(),
                value: Value::Integer(LOCATION_TYPE_ISSUE),
            },
            &[
                "KeySymbol",
                "IssueTagNumber",
                "MepsLanguage",
                "DocumentId",
                "Track",
                "Type",
            ],
        ),
        IdentityBranch::new(
            Condition::NotNull("DocumentId".to_string()),
            &[
                "BookNumber",
                "ChapterNumber",
                "KeySymbol",
                "MepsLanguage",
                "Type",
                "DocumentId",
            ],
        ),
        IdentityBranch::new(
            Condition::Always,
            &[
                "BookNumber",
                "ChapterNumber",
                "KeySymbol",
                "MepsLanguage",
                "Type",
            ],
        ),
    ])
}

/// The built-in catalog, in the order the tables are declared.
#[must_use]
pub fn catalog() -> Schema {
    Schema::new(vec![
        TableSchema::new(
            LOCATION,
            &[
                "LocationId",
                "BookNumber",
                "ChapterNumber",
                "DocumentId",
                "Track",
                "IssueTagNumber",
                "KeySymbol",
                "MepsLanguage",
                "Type",
            ],
        )
        .with_key("LocationId")
        .with_identity(location_identity()),
        TableSchema::new(
            USER_MARK,
            &[
                "UserMarkId",
                "ColorIndex",
                "LocationId",
                "StyleIndex",
                "UserMarkGuid",
                "Version",
            ],
        )
        .with_key("UserMarkId")
        .with_foreign_key("LocationId", LOCATION)
        .with_identity(IdentityRule::columns(&["UserMarkGuid"])),
        TableSchema::new(
            BLOCK_RANGE,
            &[
                "BlockRangeId",
                "BlockType",
                "Identifier",
                "StartToken",
                "EndToken",
                "UserMarkId",
            ],
        )
        .with_key("BlockRangeId")
        .with_foreign_key("UserMarkId", USER_MARK),
        TableSchema::new(
            NOTE,
            &[
                "NoteId",
                "Guid",
                "UserMarkId",
                "LocationId",
                "Title",
                "Content",
                "LastModified",
            ],
        )
        .with_key("NoteId")
        .with_nullable_foreign_key("UserMarkId", USER_MARK)
        .with_nullable_foreign_key("LocationId", LOCATION)
        .with_identity(IdentityRule::columns(&["Guid"]))
        .with_modified_column("LastModified"),
        TableSchema::new(
            PLAYLIST_ITEM,
            &[
                "PlaylistItemId",
                "Label",
                "StartTrimOffsetTicks",
                "EndTrimOffsetTicks",
                "Accuracy",
                "EndAction",
                "ThumbnailFilePath",
            ],
        )
        .with_key("PlaylistItemId"),
        TableSchema::new(TAG, &["TagId", "Type", "Name"])
            .with_key("TagId")
            .with_identity(IdentityRule::columns(&["Type", "Name"])),
        TableSchema::new(INPUT_FIELD, &["LocationId", "TextTag", "Value"])
            .with_foreign_key("LocationId", LOCATION)
            .with_identity(IdentityRule::columns(&["LocationId", "TextTag"])),
        TableSchema::new(
            TAG_MAP,
            &[
                "TagMapId",
                "PlaylistItemId",
                "LocationId",
                "NoteId",
                "TagId",
                "Position",
            ],
        )
        .with_key("TagMapId")
        .with_nullable_foreign_key("PlaylistItemId", PLAYLIST_ITEM)
        .with_nullable_foreign_key("LocationId", LOCATION)
        .with_nullable_foreign_key("NoteId", NOTE)
        .with_foreign_key("TagId", TAG)
        .with_identity(IdentityRule::association(&[
            "TagId",
            "PlaylistItemId",
            "LocationId",
            "NoteId",
        ]))
        .with_sequence("Position", "TagId"),
    ])
}
