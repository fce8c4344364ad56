//! SQL fragments and row mappers shared by the denormalized view queries.
//!
//! Every view query joins the content author as `u` and selects
//! [`AUTHOR_PROFILE_COLUMNS`], which takes one bind: the viewer id (or NULL).

use sqlx::Row;

use crate::models::{avatar_for, FollowStats, Profile};

pub(crate) const AUTHOR_PROFILE_COLUMNS: &str = r#"
    u.username AS author_username,
    u.email AS author_email,
    u.display_name AS author_display_name,
    u.bio AS author_bio,
    u.image AS author_image,
    (SELECT COUNT(*) FROM follows fr WHERE fr.followee_id = u.id) AS author_follower_count,
    (SELECT COUNT(*) FROM follows fg WHERE fg.follower_id = u.id) AS author_following_count,
    EXISTS(SELECT 1 FROM follows fv WHERE fv.followee_id = u.id AND fv.follower_id = ?) AS author_following
"#;

/// Escape LIKE wildcards with `!` and wrap the term in `%`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '!' | '%' | '_') {
            pattern.push('!');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `?, ?, ?` for an IN list of `n` binds
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn author_profile_sqlite(row: &sqlx::sqlite::SqliteRow) -> Profile {
    let email: String = row.get("author_email");
    let image: Option<String> = row.get("author_image");
    Profile {
        id: row.get("author_id"),
        username: row.get("author_username"),
        display_name: row.get("author_display_name"),
        bio: row.get("author_bio"),
        image: avatar_for(image.as_deref(), &email),
        following: row.get::<i64, _>("author_following") != 0,
        follower_count: row.get("author_follower_count"),
        following_count: row.get("author_following_count"),
    }
}

pub(crate) fn author_profile_mysql(row: &sqlx::mysql::MySqlRow) -> Profile {
    let email: String = row.get("author_email");
    let image: Option<String> = row.get("author_image");
    Profile {
        id: row.get("author_id"),
        username: row.get("author_username"),
        display_name: row.get("author_display_name"),
        bio: row.get("author_bio"),
        image: avatar_for(image.as_deref(), &email),
        following: row.get::<i64, _>("author_following") != 0,
        follower_count: row.get("author_follower_count"),
        following_count: row.get("author_following_count"),
    }
}

pub(crate) fn follow_stats_sqlite(row: &sqlx::sqlite::SqliteRow) -> FollowStats {
    FollowStats {
        follower_count: row.get("follower_count"),
        following_count: row.get("following_count"),
        following: row.get::<i64, _>("following") != 0,
    }
}

pub(crate) fn follow_stats_mysql(row: &sqlx::mysql::MySqlRow) -> FollowStats {
    FollowStats {
        follower_count: row.get("follower_count"),
        following_count: row.get("following_count"),
        following: row.get::<i64, _>("following") != 0,
    }
}
