use async_trait::async_trait;
use uuid::Uuid;

use crate::database::Database;
use crate::models::{Seat, SeatSlot, User};
use crate::store::{SeatStore, StoreError, StoreResult, UserStore};

const SEAT_COLUMNS: &str = "id, seat_number, row_number, is_booked, owner_id";

#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SeatStore for PgStore {
    async fn seed(&self, layout: &[SeatSlot]) -> StoreResult<u64> {
        let numbers: Vec<i32> = layout.iter().map(|s| s.seat_number).collect();
        let rows: Vec<i32> = layout.iter().map(|s| s.row_number).collect();

        // ON CONFLICT по уникальному seat_number - повторный посев ничего не дублирует
        let result = sqlx::query(
            r#"
            INSERT INTO seats (id, seat_number, row_number, is_booked, owner_id)
            SELECT gen_random_uuid(), n, r, FALSE, NULL
            FROM UNNEST($1::int4[], $2::int4[]) AS t(n, r)
            ON CONFLICT (seat_number) DO NOTHING
            "#,
        )
        .bind(&numbers)
        .bind(&rows)
        .execute(&self.db.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> StoreResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats ORDER BY seat_number"
        ))
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    async fn list_owned(&self, owner_id: Uuid) -> StoreResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE owner_id = $1 ORDER BY seat_number"
        ))
        .bind(owner_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    async fn book_if_free(&self, seat_ids: &[Uuid], owner_id: Uuid) -> StoreResult<Option<Vec<Seat>>> {
        let ids = seat_ids.to_vec();
        let mut tx = self.db.pool.begin().await?;

        // 1) Блокируем строки в порядке номеров, чтобы пересекающиеся запросы не ловили deadlock
        sqlx::query("SELECT id FROM seats WHERE id = ANY($1) ORDER BY seat_number FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

        // 2) Условное обновление: только ещё свободные места
        let mut booked = sqlx::query_as::<_, Seat>(&format!(
            r#"
            UPDATE seats
            SET is_booked = TRUE, owner_id = $2, updated_at = NOW()
            WHERE id = ANY($1) AND is_booked = FALSE
            RETURNING {SEAT_COLUMNS}
            "#
        ))
        .bind(&ids)
        .bind(owner_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::UnknownOwner,
            e => e.into(),
        })?;

        // 3) Всё или ничего
        if booked.len() != ids.len() {
            tx.rollback().await?;
            tracing::debug!(
                requested = ids.len(),
                available = booked.len(),
                "conditional booking rolled back"
            );
            return Ok(None);
        }

        tx.commit().await?;
        booked.sort_by_key(|s| s.seat_number);
        Ok(Some(booked))
    }

    async fn release_owned(&self, owner_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET is_booked = FALSE, owner_id = NULL, updated_at = NOW()
            WHERE owner_id = $1 AND is_booked = TRUE
            "#,
        )
        .bind(owner_id)
        .execute(&self.db.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn release_all(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE seats SET is_booked = FALSE, owner_id = NULL, updated_at = NOW() WHERE is_booked = TRUE",
        )
        .execute(&self.db.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> StoreResult<User> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.db.pool)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(user)
    }
}
