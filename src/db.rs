use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::fetch::encode_image;
use crate::parser::options::Label;
use crate::parser::record::QuestionRecord;
use crate::topic;

pub const USER_STATS_TABLE: &str = "user_stats";
pub const DEFAULT_USER: &str = "default_user";
const SEARCH_LIMIT: usize = 50;
const RESERVED_PREFIX: &str = "sqlite_";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS user_stats (
            id           INTEGER PRIMARY KEY,
            user_id      TEXT NOT NULL DEFAULT 'default_user',
            table_name   TEXT NOT NULL,
            question_id  INTEGER NOT NULL,
            attempts     INTEGER NOT NULL DEFAULT 0,
            correct      INTEGER NOT NULL DEFAULT 0,
            last_attempt TEXT NOT NULL DEFAULT (datetime('now')),
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, table_name, question_id)
        );
        CREATE INDEX IF NOT EXISTS idx_user_stats_user_table ON user_stats(user_id, table_name);
        CREATE INDEX IF NOT EXISTS idx_user_stats_question ON user_stats(question_id);
        ",
    )
}

// ── Ingestion ──

/// Table that stores a topic's questions.
///
/// Same as [`topic::normalize`], except ids SQLite reserves (`sqlite_*`) or
/// that collide with the progress table get the `tbl_` prefix.
pub fn table_for_topic(topic_label: &str) -> String {
    let id = topic::normalize(topic_label);
    if id.starts_with(RESERVED_PREFIX) || id == USER_STATS_TABLE {
        format!("{}{}", topic::PREFIX, id)
    } else {
        id
    }
}

/// Create the per-topic table if it is missing. Safe to call on every run.
/// `table_id` must come from [`table_for_topic`].
pub fn ensure_topic_table(conn: &Connection, table_id: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS \"{t}\" (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_name          TEXT NOT NULL,
            question_text       TEXT NOT NULL,
            question_image_url  TEXT,
            question_image_data TEXT,
            question_image_type TEXT,
            answer_a            TEXT,
            answer_b            TEXT,
            answer_c            TEXT,
            answer_d            TEXT,
            answer_e            TEXT,
            answer_f            TEXT,
            correct_answers     TEXT NOT NULL,
            page_number         INTEGER,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS \"idx_{t}_page_number\" ON \"{t}\"(page_number);
        CREATE INDEX IF NOT EXISTS \"idx_{t}_topic_name\" ON \"{t}\"(topic_name);
        ",
        t = table_id
    ))
}

/// Write one page's accepted questions in a single transaction.
pub fn save_questions(
    conn: &Connection,
    table_id: &str,
    records: &[QuestionRecord],
) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO \"{}\"
             (topic_name, question_text, question_image_url, question_image_data, question_image_type,
              answer_a, answer_b, answer_c, answer_d, answer_e, answer_f, correct_answers, page_number)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            table_id
        ))?;
        for r in records {
            let image = r.image.as_ref();
            count += stmt.execute(rusqlite::params![
                r.topic,
                r.text,
                image.map(|i| i.url.as_str()),
                image.and_then(|i| i.data.as_deref()).map(encode_image),
                image.and_then(|i| i.mime_type.as_deref()),
                r.answer(Label::A),
                r.answer(Label::B),
                r.answer(Label::C),
                r.answer(Label::D),
                r.answer(Label::E),
                r.answer(Label::F),
                r.correct_answers(),
                r.page_number,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Topics ──

#[derive(Debug, Serialize)]
pub struct TopicRow {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "totalQuestions")]
    pub total_questions: usize,
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    if table == USER_STATS_TABLE {
        return Ok(false);
    }
    let n: usize = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

/// Guard for every query that interpolates a table name.
fn ensure_known_table(conn: &Connection, table: &str) -> Result<()> {
    if !table_exists(conn, table)? {
        bail!("test bank not found: {}", table);
    }
    Ok(())
}

pub fn list_topics(conn: &Connection) -> Result<Vec<TopicRow>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name != ?1 AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([USER_STATS_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut topics = Vec::with_capacity(names.len());
    for name in names {
        let total: usize =
            conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", name), [], |r| r.get(0))?;
        let stored: Option<String> = conn
            .query_row(
                &format!("SELECT topic_name FROM \"{}\" ORDER BY id LIMIT 1", name),
                [],
                |r| r.get(0),
            )
            .optional()?;
        let display_name = stored
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| topic::display_name(&name));
        topics.push(TopicRow {
            name,
            display_name,
            total_questions: total,
        });
    }
    Ok(topics)
}

// ── Questions ──

#[derive(Debug, Serialize)]
pub struct QuestionRow {
    pub id: i64,
    pub topic_name: String,
    pub question_text: String,
    pub question_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_image_base64: Option<String>,
    pub question_image_type: Option<String>,
    pub answer_a: Option<String>,
    pub answer_b: Option<String>,
    pub answer_c: Option<String>,
    pub answer_d: Option<String>,
    pub answer_e: Option<String>,
    pub answer_f: Option<String>,
    pub correct_answers: String,
    pub page_number: Option<i64>,
}

impl QuestionRow {
    pub fn answers(&self) -> Vec<(Label, &str)> {
        let cols = [
            &self.answer_a,
            &self.answer_b,
            &self.answer_c,
            &self.answer_d,
            &self.answer_e,
            &self.answer_f,
        ];
        Label::ALL
            .iter()
            .zip(cols)
            .filter_map(|(l, a)| a.as_deref().map(|a| (*l, a)))
            .collect()
    }
}

const QUESTION_COLUMNS: &str = "id, topic_name, question_text, question_image_url, question_image_data,
     question_image_type, answer_a, answer_b, answer_c, answer_d, answer_e, answer_f,
     correct_answers, page_number";

fn question_from_row(row: &rusqlite::Row) -> rusqlite::Result<QuestionRow> {
    Ok(QuestionRow {
        id: row.get(0)?,
        topic_name: row.get(1)?,
        question_text: row.get(2)?,
        question_image_url: row.get(3)?,
        question_image_base64: row.get(4)?,
        question_image_type: row.get(5)?,
        answer_a: row.get(6)?,
        answer_b: row.get(7)?,
        answer_c: row.get(8)?,
        answer_d: row.get(9)?,
        answer_e: row.get(10)?,
        answer_f: row.get(11)?,
        correct_answers: row.get(12)?,
        page_number: row.get(13)?,
    })
}

/// Questions `start..=end` (1-based), by id or shuffled.
pub fn fetch_questions(
    conn: &Connection,
    table: &str,
    start: usize,
    end: usize,
    random: bool,
) -> Result<Vec<QuestionRow>> {
    ensure_known_table(conn, table)?;
    if start == 0 || end < start {
        bail!("invalid range {}..={} (1-based, inclusive)", start, end);
    }
    let order = if random { "RANDOM()" } else { "id" };
    let sql = format!(
        "SELECT {} FROM \"{}\" ORDER BY {} LIMIT ?1 OFFSET ?2",
        QUESTION_COLUMNS, table, order
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![(end - start + 1) as i64, (start - 1) as i64],
            question_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_question(conn: &Connection, table: &str, id: i64) -> Result<Option<QuestionRow>> {
    ensure_known_table(conn, table)?;
    let sql = format!("SELECT {} FROM \"{}\" WHERE id = ?1", QUESTION_COLUMNS, table);
    let row = conn.query_row(&sql, [id], question_from_row).optional()?;
    Ok(row)
}

/// Case-insensitive substring search over question and answer text.
pub fn search_questions(conn: &Connection, table: &str, keyword: &str) -> Result<Vec<QuestionRow>> {
    ensure_known_table(conn, table)?;
    if keyword.trim().is_empty() {
        bail!("search query required");
    }
    let sql = format!(
        "SELECT {} FROM \"{}\"
         WHERE question_text LIKE ?1
            OR answer_a LIKE ?1 OR answer_b LIKE ?1 OR answer_c LIKE ?1
            OR answer_d LIKE ?1 OR answer_e LIKE ?1 OR answer_f LIKE ?1
         ORDER BY id
         LIMIT {}",
        QUESTION_COLUMNS, table, SEARCH_LIMIT
    );
    let pattern = format!("%{}%", keyword.trim());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([pattern], question_from_row)?
        .map(|r| {
            r.map(|mut q| {
                q.question_image_base64 = None;
                q
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

#[derive(Debug, Serialize)]
pub struct TopicStats {
    pub total_questions: usize,
    pub questions_with_images: usize,
    pub multiple_answer_questions: usize,
    pub answer_distribution: Vec<(String, usize)>,
}

pub fn topic_stats(conn: &Connection, table: &str) -> Result<TopicStats> {
    ensure_known_table(conn, table)?;
    let (total_questions, questions_with_images, multiple_answer_questions) = conn.query_row(
        &format!(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN question_image_url IS NOT NULL
                                        OR question_image_data IS NOT NULL THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN correct_answers LIKE '%,%' THEN 1 ELSE 0 END), 0)
             FROM \"{}\"",
            table
        ),
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT correct_answers, COUNT(*) AS n FROM \"{}\"
         GROUP BY correct_answers
         ORDER BY n DESC, correct_answers",
        table
    ))?;
    let answer_distribution = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TopicStats {
        total_questions,
        questions_with_images,
        multiple_answer_questions,
        answer_distribution,
    })
}

// ── User progress ──

#[derive(Debug, Serialize, PartialEq)]
pub struct UserStatRow {
    pub question_id: i64,
    pub attempts: i64,
    pub correct: i64,
    #[serde(rename = "lastAttempt")]
    pub last_attempt: Option<NaiveDateTime>,
}

fn user_stat_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserStatRow> {
    Ok(UserStatRow {
        question_id: row.get(0)?,
        attempts: row.get(1)?,
        correct: row.get(2)?,
        last_attempt: row.get(3)?,
    })
}

pub fn fetch_user_stats(conn: &Connection, user_id: &str, table: &str) -> Result<Vec<UserStatRow>> {
    let mut stmt = conn.prepare(
        "SELECT question_id, attempts, correct, last_attempt
         FROM user_stats
         WHERE user_id = ?1 AND table_name = ?2
         ORDER BY question_id",
    )?;
    let rows = stmt
        .query_map([user_id, table], user_stat_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Count one attempt at a question and return the updated totals.
pub fn record_attempt(
    conn: &Connection,
    user_id: &str,
    table: &str,
    question_id: i64,
    is_correct: bool,
) -> Result<UserStatRow> {
    ensure_known_table(conn, table)?;
    let increment = i64::from(is_correct);
    conn.execute(
        "INSERT INTO user_stats (user_id, table_name, question_id, attempts, correct, last_attempt)
         VALUES (?1, ?2, ?3, 1, ?4, datetime('now'))
         ON CONFLICT(user_id, table_name, question_id) DO UPDATE SET
             attempts = attempts + 1,
             correct = correct + excluded.correct,
             last_attempt = datetime('now')",
        rusqlite::params![user_id, table, question_id, increment],
    )?;
    let row = conn.query_row(
        "SELECT question_id, attempts, correct, last_attempt
         FROM user_stats
         WHERE user_id = ?1 AND table_name = ?2 AND question_id = ?3",
        rusqlite::params![user_id, table, question_id],
        user_stat_from_row,
    )?;
    Ok(row)
}

/// Delete a user's progress, for one bank or all of them.
pub fn reset_user_stats(conn: &Connection, user_id: &str, table: Option<&str>) -> Result<usize> {
    let n = match table {
        Some(table) => conn.execute(
            "DELETE FROM user_stats WHERE user_id = ?1 AND table_name = ?2",
            [user_id, table],
        )?,
        None => conn.execute("DELETE FROM user_stats WHERE user_id = ?1", [user_id])?,
    };
    Ok(n)
}
