//! Schema DDL.
//!
//! Applied idempotently at startup. Weighted tsvector columns are stored
//! generated columns (subject A, party B, analysis B, dialog C); dialog
//! bodies index only when the encoding marks them textual, analysis bodies
//! index unless base64-encoded. The tag materialized view is refreshed by
//! the tag repository on every tag write; rows for deleted vCons are
//! filtered out by joining `vcons` at query time until the next refresh.

use sqlx::PgPool;

use vcon_domain::error::Result;

use super::map_sqlx_error;

const SCHEMA: &str = r#"
CREATE EXTENSION IF NOT EXISTS vector;
CREATE EXTENSION IF NOT EXISTS pg_trgm;

CREATE TABLE IF NOT EXISTS vcons (
    id            BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    uuid          UUID NOT NULL UNIQUE,
    vcon_version  TEXT NOT NULL DEFAULT '0.3.0',
    subject       TEXT,
    extensions    JSONB,
    must_support  JSONB,
    redacted      JSONB,
    appended      JSONB,
    tenant_id     TEXT,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    subject_tsv   tsvector GENERATED ALWAYS AS
        (setweight(to_tsvector('english', coalesce(subject, '')), 'A')) STORED,
    CONSTRAINT vcons_updated_after_created CHECK (updated_at >= created_at)
);

CREATE INDEX IF NOT EXISTS idx_vcons_created_at ON vcons (created_at DESC);
CREATE INDEX IF NOT EXISTS idx_vcons_updated_at ON vcons (updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_vcons_tenant ON vcons (tenant_id);
CREATE INDEX IF NOT EXISTS idx_vcons_subject_tsv ON vcons USING gin (subject_tsv);
CREATE INDEX IF NOT EXISTS idx_vcons_subject_trgm ON vcons USING gin (subject gin_trgm_ops);

CREATE TABLE IF NOT EXISTS parties (
    id            BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    vcon_id       BIGINT NOT NULL REFERENCES vcons(id) ON DELETE CASCADE,
    party_index   INT NOT NULL,
    tel           TEXT,
    sip           TEXT,
    stir          TEXT,
    mailto        TEXT,
    name          TEXT,
    did           TEXT,
    uuid          TEXT,
    jcard         JSONB,
    civicaddress  JSONB,
    timezone      TEXT,
    party_tsv     tsvector GENERATED ALWAYS AS
        (setweight(to_tsvector('english',
            coalesce(name, '') || ' ' || coalesce(mailto, '') || ' ' || coalesce(tel, '')), 'B')) STORED,
    UNIQUE (vcon_id, party_index)
);

CREATE INDEX IF NOT EXISTS idx_parties_vcon ON parties (vcon_id, party_index);
CREATE INDEX IF NOT EXISTS idx_parties_tsv ON parties USING gin (party_tsv);

CREATE TABLE IF NOT EXISTS dialogs (
    id               BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    vcon_id          BIGINT NOT NULL REFERENCES vcons(id) ON DELETE CASCADE,
    dialog_index     INT NOT NULL,
    type             TEXT NOT NULL CHECK (type IN ('recording', 'text', 'transfer', 'incomplete')),
    start_time       TIMESTAMPTZ,
    duration_seconds DOUBLE PRECISION,
    parties          JSONB,
    originator       INT,
    mediatype        TEXT,
    body             TEXT,
    encoding         TEXT CHECK (encoding IN ('base64url', 'json', 'none')),
    url              TEXT,
    content_hash     TEXT,
    disposition      TEXT CHECK (disposition IN
        ('no-answer', 'congestion', 'failed', 'busy', 'hung-up', 'voicemail-no-message')),
    session_id       TEXT,
    application      TEXT,
    message_id       TEXT,
    body_tsv         tsvector GENERATED ALWAYS AS
        (setweight(to_tsvector('english',
            CASE WHEN encoding IS NULL OR encoding = 'none'
                 THEN coalesce(body, '') ELSE '' END), 'C')) STORED,
    UNIQUE (vcon_id, dialog_index)
);

CREATE INDEX IF NOT EXISTS idx_dialogs_vcon ON dialogs (vcon_id, dialog_index);
CREATE INDEX IF NOT EXISTS idx_dialogs_tsv ON dialogs USING gin (body_tsv);

CREATE TABLE IF NOT EXISTS party_history (
    id           BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    dialog_id    BIGINT NOT NULL REFERENCES dialogs(id) ON DELETE CASCADE,
    party_index  INT NOT NULL,
    time         TIMESTAMPTZ NOT NULL,
    event        TEXT NOT NULL CHECK (event IN ('join', 'drop', 'hold', 'unhold', 'mute', 'unmute'))
);

CREATE INDEX IF NOT EXISTS idx_party_history_dialog ON party_history (dialog_id);

CREATE TABLE IF NOT EXISTS analyses (
    id              BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    vcon_id         BIGINT NOT NULL REFERENCES vcons(id) ON DELETE CASCADE,
    analysis_index  INT NOT NULL,
    type            TEXT NOT NULL,
    dialog_indices  JSONB,
    vendor          TEXT NOT NULL CHECK (vendor <> ''),
    product         TEXT,
    schema          TEXT,
    body            TEXT,
    encoding        TEXT CHECK (encoding IN ('base64url', 'json', 'none')),
    url             TEXT,
    content_hash    TEXT,
    body_tsv        tsvector GENERATED ALWAYS AS
        (setweight(to_tsvector('english',
            CASE WHEN encoding IS DISTINCT FROM 'base64url'
                 THEN coalesce(body, '') ELSE '' END), 'B')) STORED,
    UNIQUE (vcon_id, analysis_index)
);

CREATE INDEX IF NOT EXISTS idx_analyses_vcon ON analyses (vcon_id, analysis_index);
CREATE INDEX IF NOT EXISTS idx_analyses_tsv ON analyses USING gin (body_tsv);

CREATE TABLE IF NOT EXISTS attachments (
    id                BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    vcon_id           BIGINT NOT NULL REFERENCES vcons(id) ON DELETE CASCADE,
    attachment_index  INT NOT NULL,
    type              TEXT,
    party             INT,
    dialog            INT,
    mimetype          TEXT,
    body              TEXT,
    encoding          TEXT CHECK (encoding IN ('base64url', 'json', 'none')),
    url               TEXT,
    content_hash      TEXT,
    start_time        TIMESTAMPTZ,
    UNIQUE (vcon_id, attachment_index)
);

CREATE INDEX IF NOT EXISTS idx_attachments_vcon ON attachments (vcon_id, attachment_index);
CREATE INDEX IF NOT EXISTS idx_attachments_type ON attachments (type);

CREATE TABLE IF NOT EXISTS vcon_groups (
    id           BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    vcon_id      BIGINT NOT NULL REFERENCES vcons(id) ON DELETE CASCADE,
    group_index  INT NOT NULL,
    uuid         UUID NOT NULL,
    body         JSONB,
    encoding     TEXT,
    url          TEXT,
    UNIQUE (vcon_id, group_index)
);

CREATE INDEX IF NOT EXISTS idx_vcon_groups_vcon ON vcon_groups (vcon_id, group_index);

CREATE TABLE IF NOT EXISTS vcon_embeddings (
    id                 BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    vcon_id            BIGINT NOT NULL REFERENCES vcons(id) ON DELETE CASCADE,
    content_type       TEXT NOT NULL CHECK (content_type IN ('subject', 'dialog', 'analysis')),
    content_reference  TEXT NOT NULL,
    content_text       TEXT NOT NULL,
    embedding          vector(384) NOT NULL,
    model              TEXT NOT NULL,
    dimension          INT NOT NULL,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (vcon_id, content_type, content_reference)
);

CREATE INDEX IF NOT EXISTS idx_vcon_embeddings_vcon ON vcon_embeddings (vcon_id);
CREATE INDEX IF NOT EXISTS idx_vcon_embeddings_cosine ON vcon_embeddings
    USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100);

CREATE TABLE IF NOT EXISTS embedding_tasks (
    id                 BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    vcon_id            BIGINT NOT NULL REFERENCES vcons(id) ON DELETE CASCADE,
    content_type       TEXT NOT NULL CHECK (content_type IN ('subject', 'dialog', 'analysis')),
    content_reference  TEXT NOT NULL,
    content_text       TEXT NOT NULL,
    status             TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
    retry_count        INT NOT NULL DEFAULT 0,
    last_error         TEXT,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (vcon_id, content_type, content_reference)
);

CREATE INDEX IF NOT EXISTS idx_embedding_tasks_status ON embedding_tasks (status, created_at);

CREATE MATERIALIZED VIEW IF NOT EXISTS vcon_tags AS
SELECT a.vcon_id,
       v.uuid AS vcon_uuid,
       a.body AS tags_json,
       (SELECT jsonb_object_agg(split_part(elem, ':', 1), substr(elem, strpos(elem, ':') + 1))
          FROM jsonb_array_elements_text(a.body::jsonb) AS elem) AS tags_object
  FROM attachments a
  JOIN vcons v ON v.id = a.vcon_id
 WHERE a.type = 'tags' AND a.encoding = 'json';

CREATE UNIQUE INDEX IF NOT EXISTS idx_vcon_tags_vcon ON vcon_tags (vcon_id);
CREATE INDEX IF NOT EXISTS idx_vcon_tags_object ON vcon_tags USING gin (tags_object);
"#;

/// RLS policies keyed on the session variable. Child tables are reachable
/// only through `vcons` joins, but carry their own policies as well.
const RLS: &str = r#"
ALTER TABLE vcons ENABLE ROW LEVEL SECURITY;
ALTER TABLE vcons FORCE ROW LEVEL SECURITY;

DROP POLICY IF EXISTS vcons_tenant_isolation ON vcons;
CREATE POLICY vcons_tenant_isolation ON vcons
    USING (tenant_id IS NULL
           OR tenant_id = current_setting('app.current_tenant', true));

ALTER TABLE parties ENABLE ROW LEVEL SECURITY;
ALTER TABLE parties FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS parties_tenant_isolation ON parties;
CREATE POLICY parties_tenant_isolation ON parties
    USING (EXISTS (SELECT 1 FROM vcons v WHERE v.id = parties.vcon_id));

ALTER TABLE dialogs ENABLE ROW LEVEL SECURITY;
ALTER TABLE dialogs FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS dialogs_tenant_isolation ON dialogs;
CREATE POLICY dialogs_tenant_isolation ON dialogs
    USING (EXISTS (SELECT 1 FROM vcons v WHERE v.id = dialogs.vcon_id));

ALTER TABLE analyses ENABLE ROW LEVEL SECURITY;
ALTER TABLE analyses FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS analyses_tenant_isolation ON analyses;
CREATE POLICY analyses_tenant_isolation ON analyses
    USING (EXISTS (SELECT 1 FROM vcons v WHERE v.id = analyses.vcon_id));

ALTER TABLE attachments ENABLE ROW LEVEL SECURITY;
ALTER TABLE attachments FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS attachments_tenant_isolation ON attachments;
CREATE POLICY attachments_tenant_isolation ON attachments
    USING (EXISTS (SELECT 1 FROM vcons v WHERE v.id = attachments.vcon_id));

ALTER TABLE vcon_groups ENABLE ROW LEVEL SECURITY;
ALTER TABLE vcon_groups FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS groups_tenant_isolation ON vcon_groups;
CREATE POLICY groups_tenant_isolation ON vcon_groups
    USING (EXISTS (SELECT 1 FROM vcons v WHERE v.id = vcon_groups.vcon_id));

ALTER TABLE vcon_embeddings ENABLE ROW LEVEL SECURITY;
ALTER TABLE vcon_embeddings FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS vcon_embeddings_tenant_isolation ON vcon_embeddings;
CREATE POLICY vcon_embeddings_tenant_isolation ON vcon_embeddings
    USING (EXISTS (SELECT 1 FROM vcons v WHERE v.id = vcon_embeddings.vcon_id));

ALTER TABLE embedding_tasks ENABLE ROW LEVEL SECURITY;
ALTER TABLE embedding_tasks FORCE ROW LEVEL SECURITY;
DROP POLICY IF EXISTS embedding_tasks_tenant_isolation ON embedding_tasks;
CREATE POLICY embedding_tasks_tenant_isolation ON embedding_tasks
    USING (EXISTS (SELECT 1 FROM vcons v WHERE v.id = embedding_tasks.vcon_id));
"#;

/// Apply the schema (and RLS policies when enabled) idempotently.
pub async fn ensure_schema(pool: &PgPool, rls_enabled: bool) -> Result<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    if rls_enabled {
        sqlx::raw_sql(RLS)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_rls", e))?;
    }
    Ok(())
}
