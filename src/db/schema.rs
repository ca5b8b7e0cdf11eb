//! Database schema migrations for feedwatch.
//!
//! Each entry in [`MIGRATIONS`] is applied once, in order, and recorded in
//! the `schema_version` table.

/// All schema migrations, in order.
pub const MIGRATIONS: &[&str] = &[
    // v1: watermarks and scheduler state
    r#"
    CREATE TABLE watermarks (
        source_key  TEXT PRIMARY KEY,
        kind        TEXT NOT NULL CHECK (kind IN ('feed', 'timeline')),
        cursor      TEXT NOT NULL,
        updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE scheduler_state (
        id                  INTEGER PRIMARY KEY CHECK (id = 1),
        attempt_count       INTEGER NOT NULL DEFAULT 0,
        base_interval_mins  INTEGER NOT NULL,
        updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    // v2: subscribed sources
    r#"
    CREATE TABLE sources (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        display_name TEXT NOT NULL,
        kind         TEXT NOT NULL CHECK (kind IN ('feed', 'timeline')),
        locator      TEXT NOT NULL UNIQUE,
        is_active    INTEGER NOT NULL DEFAULT 1,
        created_at   TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_sources_active ON sources (is_active);
    "#,
    // v3: server-variant fanout tables
    r#"
    CREATE TABLE articles (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        content_hash   TEXT NOT NULL UNIQUE,
        guid           TEXT NOT NULL,
        title          TEXT NOT NULL,
        body           TEXT,
        link           TEXT,
        published_at   TEXT,
        source_locator TEXT NOT NULL,
        fetched_at     TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_articles_source ON articles (source_locator);

    CREATE TABLE subscriptions (
        user_id        INTEGER NOT NULL,
        source_locator TEXT NOT NULL,
        created_at     TEXT NOT NULL DEFAULT (datetime('now')),
        PRIMARY KEY (user_id, source_locator)
    );

    CREATE INDEX idx_subscriptions_locator ON subscriptions (source_locator);

    CREATE TABLE device_tokens (
        user_id    INTEGER NOT NULL,
        token      TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        PRIMARY KEY (user_id, token)
    );

    CREATE TABLE user_notifications (
        id           TEXT PRIMARY KEY,
        user_id      INTEGER NOT NULL,
        article_hash TEXT NOT NULL,
        title        TEXT NOT NULL,
        message      TEXT,
        source_name  TEXT NOT NULL,
        category     TEXT NOT NULL,
        is_read      INTEGER NOT NULL DEFAULT 0,
        created_at   TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_user_notifications_user ON user_notifications (user_id);
    "#,
];
