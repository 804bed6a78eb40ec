use async_trait::async_trait;
use cosmwasm_std::{Binary, Uint128};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use unite_types::{
    both_legs_funded, AuctionParams, Commitment, CommitmentStatus, EscrowRecord, EscrowRole,
    Order, OrderStatus, OrderTerms, Secret, Timelocks,
};

use crate::ledger::{check_commit, check_price, may_expire};
use crate::secrets::check_revealable;
use crate::store::{displaced_commitment_status, transition_rejection, StateTransition};
use crate::{CommitError, CommitmentLedger, OrderStore, SecretVault, StoreError};

const MIGRATIONS: [&str; 8] = [
    include_str!("../migrations/001_create_orders.sql"),
    include_str!("../migrations/002_create_orders_status_index.sql"),
    include_str!("../migrations/003_create_order_transitions.sql"),
    include_str!("../migrations/004_create_commitments.sql"),
    include_str!("../migrations/005_create_active_commitment_index.sql"),
    include_str!("../migrations/006_create_escrows.sql"),
    include_str!("../migrations/007_create_secrets.sql"),
    include_str!("../migrations/008_create_superseded_escrows_index.sql"),
];

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

/// SQLite backend implementing the order store, commitment ledger and secret
/// vault over one database. Conditional writes open each transaction so the
/// write lock is taken before anything is read.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(path = %db_path.as_ref().display(), "opened sqlite order store");

        Ok(store)
    }

    /// In-memory database on a single pinned connection
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for migration in MIGRATIONS {
            sqlx::query(migration)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ORDER STORE
// ═══════════════════════════════════════════════════════════════════════════

#[async_trait]
impl OrderStore for SqliteStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let terms = &order.terms;
        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, version, nonce, maker,
                src_chain_id, dst_chain_id, src_asset, dst_asset, src_amount,
                auction_start_price, auction_end_price,
                auction_duration_secs, auction_start_timestamp,
                secret_hash, fill_deadline, signature, public_key,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.order_id)
        .bind(&terms.version)
        .bind(terms.nonce as i64)
        .bind(&terms.maker)
        .bind(&terms.src_chain_id)
        .bind(&terms.dst_chain_id)
        .bind(&terms.src_asset)
        .bind(&terms.dst_asset)
        .bind(terms.src_amount.to_string())
        .bind(terms.auction.start_price.to_string())
        .bind(terms.auction.end_price.to_string())
        .bind(terms.auction.duration_secs as i64)
        .bind(terms.auction.start_timestamp as i64)
        .bind(&terms.secret_hash)
        .bind(terms.fill_deadline as i64)
        .bind(hex::encode(order.signature.as_slice()))
        .bind(hex::encode(order.public_key.as_slice()))
        .bind(order.status.as_str())
        .bind(order.created_at as i64)
        .bind(order.updated_at as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::DuplicateId(order.order_id.clone()))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_order(&mut conn, order_id).await
    }

    async fn transition(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: u64,
        details: Option<String>,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if from.can_transition_to(to) && cas_status(&mut tx, order_id, from, to, now).await? {
            displace_commitment(&mut tx, order_id, to, now).await?;
            insert_transition(
                &mut tx,
                order_id,
                &StateTransition::new(from, to, now).with_details(details),
            )
            .await?;
            let order = load_order(&mut tx, order_id).await?;
            tx.commit().await.map_err(db_err)?;

            debug!(order_id = %order_id, from = %from, to = %to, "order transitioned");
            return Ok(order);
        }

        let order = load_order(&mut tx, order_id).await?;
        if order.status != from {
            Err(transition_rejection(order_id, from, order.status))
        } else {
            Err(StoreError::InvalidTransition { from, to })
        }
    }

    async fn expire_stale_orders(&self, now: u64) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, status FROM orders
            WHERE fill_deadline <= ?
            AND status IN ('Announced', 'Committed', 'EscrowsPending')
            ORDER BY order_id ASC
            "#,
        )
        .bind(now as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut expired = Vec::new();
        for row in rows {
            let order_id: String = row.get("order_id");
            let status = parse_order_status(row.get("status"))?;

            match self
                .transition(
                    &order_id,
                    status,
                    OrderStatus::Expired,
                    now,
                    Some("fill deadline passed".to_string()),
                )
                .await
            {
                Ok(_) => expired.push(order_id),
                // moved concurrently; the next sweep sees the new status
                Err(StoreError::Conflict { .. }) | Err(StoreError::TerminalState { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE status = ? ORDER BY created_at ASC, order_id ASC LIMIT ?",
        )
        .bind(status.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_order).collect()
    }

    async fn get_history(&self, order_id: &str) -> Result<Vec<StateTransition>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM order_transitions WHERE order_id = ? ORDER BY id ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        if rows.is_empty() {
            // distinguish "no transitions yet" from an unknown order
            self.get_order(order_id).await?;
        }

        rows.iter()
            .map(|row| {
                Ok(StateTransition {
                    from_status: parse_order_status(row.get("from_status"))?,
                    to_status: parse_order_status(row.get("to_status"))?,
                    timestamp: row.get::<i64, _>("timestamp") as u64,
                    details: row.get("details"),
                })
            })
            .collect()
    }

    async fn upsert_escrow(&self, record: &EscrowRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO escrows (
                order_id, resolver, role, chain_id, escrow_address, amount, confirmed_amount,
                withdrawal_secs, public_withdrawal_secs, cancellation_secs,
                created_at, state, superseded
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (order_id, chain_id, escrow_address) DO UPDATE SET
                resolver = excluded.resolver,
                role = excluded.role,
                amount = excluded.amount,
                confirmed_amount = excluded.confirmed_amount,
                withdrawal_secs = excluded.withdrawal_secs,
                public_withdrawal_secs = excluded.public_withdrawal_secs,
                cancellation_secs = excluded.cancellation_secs,
                created_at = excluded.created_at,
                state = excluded.state,
                superseded = MAX(escrows.superseded, excluded.superseded)
            "#,
        )
        .bind(&record.order_id)
        .bind(&record.resolver)
        .bind(record.role.as_str())
        .bind(&record.chain_id)
        .bind(&record.escrow_address)
        .bind(record.amount.to_string())
        .bind(record.confirmed_amount.to_string())
        .bind(record.timelocks.withdrawal_secs as i64)
        .bind(record.timelocks.public_withdrawal_secs as i64)
        .bind(record.timelocks.cancellation_secs as i64)
        .bind(record.created_at as i64)
        .bind(record.state.as_str())
        .bind(record.superseded)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
                Err(StoreError::NotFound(record.order_id.clone()))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get_escrows(&self, order_id: &str) -> Result<Vec<EscrowRecord>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_escrows(&mut conn, order_id).await
    }

    async fn superseded_escrows(&self, limit: usize) -> Result<Vec<EscrowRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM escrows
            WHERE superseded = 1 AND state IN ('Created', 'Funded')
            ORDER BY created_at ASC, escrow_address ASC LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_escrow).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// COMMITMENT LEDGER
// ═══════════════════════════════════════════════════════════════════════════

#[async_trait]
impl CommitmentLedger for SqliteStore {
    async fn try_commit(
        &self,
        order_id: &str,
        resolver: &str,
        committed_price: Uint128,
        now: u64,
    ) -> Result<Commitment, CommitError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let opened = sqlx::query(
            r#"
            UPDATE orders SET status = 'Committed', updated_at = ?
            WHERE order_id = ? AND status = 'Announced' AND fill_deadline > ?
            "#,
        )
        .bind(now as i64)
        .bind(order_id)
        .bind(now as i64)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected()
            == 1;

        let order = load_order(&mut tx, order_id).await?;
        if !opened {
            let active = load_active_commitment(&mut tx, order_id).await?;
            check_commit(&order, active.as_ref(), committed_price, now)?;
            return Err(CommitError::OrderNotAnnounced {
                order_id: order_id.to_string(),
                status: order.status,
            });
        }

        // dropping the transaction rolls the status change back
        check_price(&order, committed_price, now)?;

        let commitment = Commitment::new(order_id, resolver, committed_price, now);
        let inserted = sqlx::query(
            r#"
            INSERT INTO commitments (
                order_id, resolver, committed_price, committed_at, status, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(resolver)
        .bind(committed_price.to_string())
        .bind(now as i64)
        .bind(commitment.status.as_str())
        .bind(now as i64)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(CommitError::AlreadyCommitted {
                    order_id: order_id.to_string(),
                    resolver: String::new(),
                });
            }
            Err(e) => return Err(db_err(e).into()),
        }

        insert_transition(
            &mut tx,
            order_id,
            &StateTransition::new(OrderStatus::Announced, OrderStatus::Committed, now)
                .with_details(Some(format!(
                    "committed by {resolver} at {committed_price}"
                ))),
        )
        .await?;
        tx.commit().await.map_err(db_err)?;

        info!(
            order_id = %order_id,
            resolver = %resolver,
            price = %committed_price,
            "commitment accepted"
        );
        Ok(commitment)
    }

    async fn mark_ready(
        &self,
        order_id: &str,
        resolver: &str,
        now: u64,
    ) -> Result<Commitment, CommitError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;

        sqlx::query(
            r#"
            UPDATE commitments SET status = 'Confirmed', updated_at = ?
            WHERE order_id = ? AND resolver = ? AND status = 'Pending'
            "#,
        )
        .bind(now as i64)
        .bind(order_id)
        .bind(resolver)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

        match load_active_commitment(&mut conn, order_id).await? {
            Some(active) if active.resolver == resolver => Ok(active),
            Some(active) => Err(CommitError::ResolverMismatch {
                expected: active.resolver,
                actual: resolver.to_string(),
            }),
            None => {
                load_order(&mut conn, order_id).await?;
                Err(CommitError::NoActiveCommitment(order_id.to_string()))
            }
        }
    }

    async fn expire_commitment(
        &self,
        order_id: &str,
        now: u64,
        grace_period_secs: u64,
    ) -> Result<Option<Commitment>, CommitError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // dropping the transaction on any early return rolls this back
        let lapsed = sqlx::query(
            r#"
            UPDATE commitments SET status = 'Expired', updated_at = ?
            WHERE order_id = ? AND status IN ('Pending', 'Confirmed')
            AND committed_at + ? <= ?
            RETURNING *
            "#,
        )
        .bind(now as i64)
        .bind(order_id)
        .bind(grace_period_secs as i64)
        .bind(now as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let order = load_order(&mut tx, order_id).await?;
        let expired = match lapsed {
            Some(row) => row_to_commitment(&row)?,
            None => return Ok(None),
        };

        let escrows = load_escrows(&mut tx, order_id).await?;
        if !may_expire(order.status, both_legs_funded(&escrows, &expired.resolver)) {
            return Ok(None);
        }
        if !cas_status(&mut tx, order_id, order.status, OrderStatus::Announced, now).await? {
            return Ok(None);
        }
        supersede_escrows(&mut tx, order_id).await?;

        insert_transition(
            &mut tx,
            order_id,
            &StateTransition::new(order.status, OrderStatus::Announced, now).with_details(Some(
                format!("commitment by {} lapsed, re-auctioning", expired.resolver),
            )),
        )
        .await?;
        tx.commit().await.map_err(db_err)?;

        debug!(order_id = %order_id, resolver = %expired.resolver, "commitment expired");
        Ok(Some(expired))
    }

    async fn active_commitment(&self, order_id: &str) -> Result<Option<Commitment>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_active_commitment(&mut conn, order_id).await
    }

    async fn commitments_for(&self, order_id: &str) -> Result<Vec<Commitment>, StoreError> {
        let rows = sqlx::query("SELECT * FROM commitments WHERE order_id = ? ORDER BY id ASC")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(row_to_commitment).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECRET VAULT
// ═══════════════════════════════════════════════════════════════════════════

#[async_trait]
impl SecretVault for SqliteStore {
    async fn store_secret(&self, order_id: &str, secret: &Secret) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO secrets (order_id, secret, revealed_at) VALUES (?, ?, NULL)
            ON CONFLICT (order_id) DO UPDATE SET secret = excluded.secret
            "#,
        )
        .bind(order_id)
        .bind(secret.to_hex())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
                Err(StoreError::NotFound(order_id.to_string()))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn reveal(&self, order_id: &str, now: u64) -> Result<Secret, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;

        let order = load_order(&mut conn, order_id).await?;
        check_revealable(order_id, order.status)?;

        sqlx::query("UPDATE secrets SET revealed_at = COALESCE(revealed_at, ?) WHERE order_id = ?")
            .bind(now as i64)
            .bind(order_id)
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;

        let row = sqlx::query("SELECT secret FROM secrets WHERE order_id = ?")
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::SecretMissing(order_id.to_string()))?;

        Secret::from_hex(row.get::<String, _>("secret").as_str())
            .map_err(|e| StoreError::SerializationError(e.to_string()))
    }

    async fn revealed_at(&self, order_id: &str) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query("SELECT revealed_at FROM secrets WHERE order_id = ?")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row
            .and_then(|row| row.get::<Option<i64>, _>("revealed_at"))
            .map(|v| v as u64))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

fn parse_err(e: impl ToString) -> StoreError {
    StoreError::SerializationError(e.to_string())
}

fn parse_order_status(s: &str) -> Result<OrderStatus, StoreError> {
    s.parse().map_err(StoreError::SerializationError)
}

fn parse_amount(row: &SqliteRow, column: &str) -> Result<Uint128, StoreError> {
    Uint128::from_str(row.get::<String, _>(column).as_str()).map_err(parse_err)
}

fn parse_binary(row: &SqliteRow, column: &str) -> Result<Binary, StoreError> {
    hex::decode(row.get::<String, _>(column))
        .map(Binary::from)
        .map_err(parse_err)
}

async fn cas_status(
    conn: &mut SqliteConnection,
    order_id: &str,
    from: OrderStatus,
    to: OrderStatus,
    now: u64,
) -> Result<bool, StoreError> {
    let result =
        sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE order_id = ? AND status = ?")
            .bind(to.as_str())
            .bind(now as i64)
            .bind(order_id)
            .bind(from.as_str())
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
    Ok(result.rows_affected() == 1)
}

/// Release the active commitment and its escrows when the order moves to `to`
async fn displace_commitment(
    conn: &mut SqliteConnection,
    order_id: &str,
    to: OrderStatus,
    now: u64,
) -> Result<(), StoreError> {
    if let Some(status) = displaced_commitment_status(to) {
        sqlx::query(
            r#"
            UPDATE commitments SET status = ?, updated_at = ?
            WHERE order_id = ? AND status IN ('Pending', 'Confirmed')
            "#,
        )
        .bind(status.as_str())
        .bind(now as i64)
        .bind(order_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
        supersede_escrows(conn, order_id).await?;
    }
    Ok(())
}

async fn supersede_escrows(conn: &mut SqliteConnection, order_id: &str) -> Result<(), StoreError> {
    sqlx::query("UPDATE escrows SET superseded = 1 WHERE order_id = ?")
        .bind(order_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn insert_transition(
    conn: &mut SqliteConnection,
    order_id: &str,
    transition: &StateTransition,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO order_transitions (order_id, from_status, to_status, timestamp, details)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(order_id)
    .bind(transition.from_status.as_str())
    .bind(transition.to_status.as_str())
    .bind(transition.timestamp as i64)
    .bind(&transition.details)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn load_order(conn: &mut SqliteConnection, order_id: &str) -> Result<Order, StoreError> {
    let row = sqlx::query("SELECT * FROM orders WHERE order_id = ?")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;
    row_to_order(&row)
}

async fn load_active_commitment(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> Result<Option<Commitment>, StoreError> {
    let row = sqlx::query(
        "SELECT * FROM commitments WHERE order_id = ? AND status IN ('Pending', 'Confirmed') LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;

    row.as_ref().map(row_to_commitment).transpose()
}

async fn load_escrows(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> Result<Vec<EscrowRecord>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM escrows WHERE order_id = ?
        ORDER BY CASE role WHEN 'src' THEN 0 ELSE 1 END, created_at ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    rows.iter().map(row_to_escrow).collect()
}

fn row_to_order(row: &SqliteRow) -> Result<Order, StoreError> {
    let terms = OrderTerms {
        version: row.get("version"),
        nonce: row.get::<i64, _>("nonce") as u64,
        maker: row.get("maker"),
        src_chain_id: row.get("src_chain_id"),
        dst_chain_id: row.get("dst_chain_id"),
        src_asset: row.get("src_asset"),
        dst_asset: row.get("dst_asset"),
        src_amount: parse_amount(row, "src_amount")?,
        auction: AuctionParams {
            start_price: parse_amount(row, "auction_start_price")?,
            end_price: parse_amount(row, "auction_end_price")?,
            duration_secs: row.get::<i64, _>("auction_duration_secs") as u64,
            start_timestamp: row.get::<i64, _>("auction_start_timestamp") as u64,
        },
        secret_hash: row.get("secret_hash"),
        fill_deadline: row.get::<i64, _>("fill_deadline") as u64,
    };

    Ok(Order {
        order_id: row.get("order_id"),
        terms,
        signature: parse_binary(row, "signature")?,
        public_key: parse_binary(row, "public_key")?,
        status: parse_order_status(row.get("status"))?,
        created_at: row.get::<i64, _>("created_at") as u64,
        updated_at: row.get::<i64, _>("updated_at") as u64,
    })
}

fn row_to_commitment(row: &SqliteRow) -> Result<Commitment, StoreError> {
    Ok(Commitment {
        order_id: row.get("order_id"),
        resolver: row.get("resolver"),
        committed_price: parse_amount(row, "committed_price")?,
        committed_at: row.get::<i64, _>("committed_at") as u64,
        status: CommitmentStatus::from_str(row.get("status")).map_err(parse_err)?,
        updated_at: row.get::<i64, _>("updated_at") as u64,
    })
}

fn row_to_escrow(row: &SqliteRow) -> Result<EscrowRecord, StoreError> {
    Ok(EscrowRecord {
        order_id: row.get("order_id"),
        resolver: row.get("resolver"),
        role: EscrowRole::from_str(row.get("role")).map_err(parse_err)?,
        chain_id: row.get("chain_id"),
        escrow_address: row.get("escrow_address"),
        amount: parse_amount(row, "amount")?,
        confirmed_amount: parse_amount(row, "confirmed_amount")?,
        timelocks: Timelocks {
            withdrawal_secs: row.get::<i64, _>("withdrawal_secs") as u64,
            public_withdrawal_secs: row.get::<i64, _>("public_withdrawal_secs") as u64,
            cancellation_secs: row.get::<i64, _>("cancellation_secs") as u64,
        },
        created_at: row.get::<i64, _>("created_at") as u64,
        state: row.get::<String, _>("state").parse().map_err(parse_err)?,
        superseded: row.get("superseded"),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
