use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, influencers, posts)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL,
                name                TEXT NOT NULL,
                external_identity   TEXT NOT NULL UNIQUE,
                role                TEXT NOT NULL DEFAULT 'user'
                                    CHECK (role IN ('user', 'admin')),
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE influencers (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                platform    TEXT NOT NULL,
                account_id  TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'active'
                            CHECK (status IN ('active', 'suspended')),
                owner_id    TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE (platform, account_id)
            );

            CREATE INDEX idx_influencers_owner ON influencers(owner_id);

            CREATE TABLE posts (
                id              TEXT PRIMARY KEY,
                influencer_id   TEXT NOT NULL REFERENCES influencers(id),
                content         TEXT NOT NULL,
                scheduled_time  TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'scheduled'
                                CHECK (status IN ('scheduled', 'posted', 'failed')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_posts_influencer_schedule ON posts(influencer_id, scheduled_time);
            CREATE INDEX idx_posts_status ON posts(status);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
