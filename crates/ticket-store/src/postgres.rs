use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    MatchmakingStatus, TableError, TableResult, Ticket, TicketId,
    table::{TicketStream, TicketTable, WriteCondition},
};

/// PostgreSQL-backed ticket table.
///
/// Conditional writes map onto single statements: `ON CONFLICT DO NOTHING`
/// for a free key, `UPDATE ... WHERE ticket_id = $1` for an existing one.
/// Zero affected rows means the precondition failed.
#[derive(Clone)]
pub struct PostgresTicketTable {
    pool: PgPool,
}

impl PostgresTicketTable {
    /// Creates a new PostgreSQL ticket table.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> TableResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Deletes records whose ttl has passed. Records with a zero ttl never
    /// expire. Returns the number of records removed.
    pub async fn sweep_expired(&self, now_epoch_secs: i64) -> TableResult<u64> {
        let result =
            sqlx::query("DELETE FROM matchmaking_tickets WHERE ttl > 0 AND ttl <= $1")
                .bind(now_epoch_secs)
                .execute(&self.pool)
                .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            tracing::debug!(removed, "swept expired tickets");
        }
        Ok(removed)
    }

    fn row_to_ticket(row: PgRow) -> TableResult<Ticket> {
        let status: String = row.try_get("matchmaking_status")?;
        let matchmaking_status: MatchmakingStatus =
            serde_json::from_value(serde_json::Value::String(status))?;

        Ok(Ticket {
            ticket_id: TicketId::new(row.try_get::<String, _>("ticket_id")?),
            matchmaking_status,
            player_session_id: row.try_get("player_session_id")?,
            ip: row.try_get("ip")?,
            port: row.try_get("port")?,
            dns_name: row.try_get("dns_name")?,
            ttl: row.try_get("ttl")?,
        })
    }
}

#[async_trait]
impl TicketTable for PostgresTicketTable {
    async fn get(&self, ticket_id: &TicketId) -> TableResult<Option<Ticket>> {
        let row = sqlx::query(
            r#"
            SELECT ticket_id, matchmaking_status, player_session_id, ip, port, dns_name, ttl
            FROM matchmaking_tickets
            WHERE ticket_id = $1
            "#,
        )
        .bind(ticket_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_ticket).transpose()
    }

    async fn put(&self, ticket: Ticket, condition: WriteCondition) -> TableResult<()> {
        let sql = match condition {
            WriteCondition::None => {
                r#"
                INSERT INTO matchmaking_tickets
                    (ticket_id, matchmaking_status, player_session_id, ip, port, dns_name, ttl)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (ticket_id) DO UPDATE SET
                    matchmaking_status = EXCLUDED.matchmaking_status,
                    player_session_id = EXCLUDED.player_session_id,
                    ip = EXCLUDED.ip,
                    port = EXCLUDED.port,
                    dns_name = EXCLUDED.dns_name,
                    ttl = EXCLUDED.ttl
                "#
            }
            WriteCondition::NotExists => {
                r#"
                INSERT INTO matchmaking_tickets
                    (ticket_id, matchmaking_status, player_session_id, ip, port, dns_name, ttl)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (ticket_id) DO NOTHING
                "#
            }
            WriteCondition::Exists => {
                r#"
                UPDATE matchmaking_tickets SET
                    matchmaking_status = $2,
                    player_session_id = $3,
                    ip = $4,
                    port = $5,
                    dns_name = $6,
                    ttl = $7
                WHERE ticket_id = $1
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(ticket.ticket_id.as_str())
            .bind(ticket.matchmaking_status.as_str())
            .bind(&ticket.player_session_id)
            .bind(&ticket.ip)
            .bind(&ticket.port)
            .bind(&ticket.dns_name)
            .bind(ticket.ttl)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TableError::ConditionalCheckFailed {
                ticket_id: ticket.ticket_id,
            });
        }

        Ok(())
    }

    async fn delete(&self, ticket_id: &TicketId, condition: WriteCondition) -> TableResult<()> {
        if condition == WriteCondition::NotExists {
            // Deleting a key that must not exist is a no-op when it holds.
            return match self.get(ticket_id).await? {
                Some(_) => Err(TableError::ConditionalCheckFailed {
                    ticket_id: ticket_id.clone(),
                }),
                None => Ok(()),
            };
        }

        let result = sqlx::query("DELETE FROM matchmaking_tickets WHERE ticket_id = $1")
            .bind(ticket_id.as_str())
            .execute(&self.pool)
            .await?;

        if condition == WriteCondition::Exists && result.rows_affected() == 0 {
            return Err(TableError::ConditionalCheckFailed {
                ticket_id: ticket_id.clone(),
            });
        }

        Ok(())
    }

    async fn scan(&self) -> TableResult<TicketStream> {
        use futures_util::stream;

        let rows = sqlx::query(
            r#"
            SELECT ticket_id, matchmaking_status, player_session_id, ip, port, dns_name, ttl
            FROM matchmaking_tickets
            ORDER BY ticket_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let tickets: Vec<TableResult<Ticket>> = rows.into_iter().map(Self::row_to_ticket).collect();
        Ok(Box::pin(stream::iter(tickets)))
    }
}
