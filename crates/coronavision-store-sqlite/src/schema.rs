//! SQL schema for the coronavision SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per (location, date). Empty name columns mark roll-ups:
-- county = '' is a province total, province = '' a country total,
-- country = '' the world total.
CREATE TABLE IF NOT EXISTS datapoints (
    country          TEXT    NOT NULL DEFAULT '',
    province         TEXT    NOT NULL DEFAULT '',
    county           TEXT    NOT NULL DEFAULT '',
    entry_date       TEXT    NOT NULL,          -- YYYY-MM-DD
    update_time      TEXT    NOT NULL,          -- RFC 3339 UTC
    grp              TEXT    NOT NULL DEFAULT '',
    latitude         REAL,
    longitude        REAL,
    is_first_day     INTEGER NOT NULL DEFAULT 0,

    confirmed        INTEGER NOT NULL DEFAULT 0,
    recovered        INTEGER NOT NULL DEFAULT 0,
    deaths           INTEGER NOT NULL DEFAULT 0,
    active           INTEGER NOT NULL DEFAULT 0,
    serious          INTEGER NOT NULL DEFAULT 0,
    num_tests        INTEGER NOT NULL DEFAULT 0,

    dconfirmed       INTEGER NOT NULL DEFAULT 0,
    drecovered       INTEGER NOT NULL DEFAULT 0,
    ddeaths          INTEGER NOT NULL DEFAULT 0,
    dactive          INTEGER NOT NULL DEFAULT 0,
    dserious         INTEGER NOT NULL DEFAULT 0,

    source_confirmed TEXT,
    source_recovered TEXT,
    source_deaths    TEXT,
    source_serious   TEXT,
    source_num_tests TEXT,

    PRIMARY KEY (country, province, county, entry_date)
);

CREATE TABLE IF NOT EXISTS locations (
    country        TEXT    NOT NULL DEFAULT '',
    province       TEXT    NOT NULL DEFAULT '',
    county         TEXT    NOT NULL DEFAULT '',
    latitude       REAL,
    longitude      REAL,
    show_geography INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (country, province, county)
);

CREATE INDEX IF NOT EXISTS datapoints_date_idx ON datapoints(entry_date);

PRAGMA user_version = 1;
";
