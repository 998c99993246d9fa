//! Chat message source
//!
//! Messages are written by the messaging platform integration; this service
//! only reads them. `insert_message` exists for seeding and imports.

use coachlink_common::Result;
use sqlx::{Row, SqlitePool};

use crate::models::{ChatMessage, SenderRole};

/// Customer messages at or after `since_ms`, oldest first
pub async fn load_customer_messages_since(
    pool: &SqlitePool,
    since_ms: i64,
) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT identity, msg_timestamp, body, sender_role
        FROM chat_messages
        WHERE msg_timestamp >= ? AND sender_role = ?
        ORDER BY msg_timestamp, id
        "#,
    )
    .bind(since_ms)
    .bind(SenderRole::Customer.as_str())
    .fetch_all(pool)
    .await?;

    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let role: String = row.get("sender_role");
        let Some(sender_role) = SenderRole::parse(&role) else {
            tracing::warn!(sender_role = %role, "Skipping chat message with unknown sender role");
            continue;
        };
        messages.push(ChatMessage {
            identity: row.get("identity"),
            timestamp: row.get("msg_timestamp"),
            body: row.get("body"),
            sender_role,
        });
    }

    Ok(messages)
}

/// Store a chat message
pub async fn insert_message(pool: &SqlitePool, message: &ChatMessage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chat_messages (identity, msg_timestamp, body, sender_role)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&message.identity)
    .bind(message.timestamp)
    .bind(&message.body)
    .bind(message.sender_role.as_str())
    .execute(pool)
    .await?;

    Ok(())
}
