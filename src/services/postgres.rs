use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::core::{
    donation_status_on_request, generate_pickup_code, plan_transition, verify_pickup_code,
    TransitionError, TransitionPlan,
};
use crate::models::{
    BoundingBox, Coordinates, CreateDonationRequest, CreatePickupRequest, CreateReviewRequest,
    CreateUserRequest, Donation, DonationStatus, PickupRequest, PickupTransaction, RequestStatus,
    Review, UpdateRequestStatus, UpdateUserRequest, User,
};

/// Upper bound on rows pulled for one nearby search
const MAX_NEARBY_CANDIDATES: i64 = 1000;

const USER_COLUMNS: &str = "id, email, name, phone, role, user_type, address, latitude, longitude, \
    id_card_number, trust_score, is_active, created_at, updated_at";

const DONATION_COLUMNS: &str = "id, donor_id, title, description, category, quantity, unit, images, \
    latitude, longitude, address, pickup_time_start, pickup_time_end, expiry_time, status, notes, \
    is_recurring, recurring_days, total_requests, completed_at, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, donation_id, receiver_id, status, message, estimated_pickup_time, \
    actual_pickup_time, pickup_code, priority, rejection_reason, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, donation_id, request_id, donor_id, receiver_id, pickup_code, \
    completed_at, created_at, updated_at";

const REVIEW_COLUMNS: &str = "id, transaction_id, reviewer_id, reviewee_id, rating, comment, created_at";

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<TransitionError> for PostgresError {
    fn from(value: TransitionError) -> Self {
        PostgresError::Conflict(value.to_string())
    }
}

/// Filters for listing pickup requests
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub donation_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
}

/// Outcome of a request status change
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub request: PickupRequest,
    pub transaction: Option<PickupTransaction>,
}

/// PostgreSQL client for the marketplace records
///
/// Every multi-row state change (filing a request, approving, completing,
/// reviewing) runs inside a single database transaction; status updates are
/// conditional on the status they expect to replace.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Wrap an existing pool without running migrations
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    pub async fn create_user(
        &self,
        req: &CreateUserRequest,
        now: DateTime<Utc>,
    ) -> Result<User, PostgresError> {
        let location = Coordinates::from_parts(req.latitude, req.longitude);
        let query = format!(
            r#"
            INSERT INTO users (id, email, name, phone, role, user_type, address,
                               latitude, longitude, id_card_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(req.email.trim().to_lowercase())
            .bind(&req.name)
            .bind(&req.phone)
            .bind(req.role)
            .bind(req.user_type)
            .bind(&req.address)
            .bind(location.map(|l| l.latitude))
            .bind(location.map(|l| l.longitude))
            .bind(&req.id_card_number)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        let user = user_from_row(&row)?;
        tracing::info!("Created user {} ({:?})", user.id, user.role);

        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, PostgresError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("User {}", id)))?;

        Ok(user_from_row(&row)?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PostgresError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        let row = sqlx::query(&query)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, PostgresError> {
        let query = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(user_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Apply a partial update; the location only changes when both
    /// coordinates are supplied
    pub async fn update_user(
        &self,
        id: Uuid,
        req: &UpdateUserRequest,
        now: DateTime<Utc>,
    ) -> Result<User, PostgresError> {
        let location = Coordinates::from_parts(req.latitude, req.longitude);
        let query = format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                name = COALESCE($3, name),
                phone = COALESCE($4, phone),
                role = COALESCE($5, role),
                user_type = COALESCE($6, user_type),
                address = COALESCE($7, address),
                latitude = COALESCE($8, latitude),
                longitude = COALESCE($9, longitude),
                id_card_number = COALESCE($10, id_card_number),
                updated_at = $11
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(id)
            .bind(req.email.as_ref().map(|email| email.trim().to_lowercase()))
            .bind(&req.name)
            .bind(&req.phone)
            .bind(req.role)
            .bind(req.user_type)
            .bind(&req.address)
            .bind(location.map(|l| l.latitude))
            .bind(location.map(|l| l.longitude))
            .bind(&req.id_card_number)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("User {}", id)))?;

        Ok(user_from_row(&row)?)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<bool, PostgresError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ---------------------------------------------------------------------
    // Donations
    // ---------------------------------------------------------------------

    pub async fn create_donation(
        &self,
        donor_id: Uuid,
        req: &CreateDonationRequest,
        now: DateTime<Utc>,
    ) -> Result<Donation, PostgresError> {
        let recurring_days: Vec<String> =
            req.recurring_days.iter().map(|day| day.to_lowercase()).collect();
        let query = format!(
            r#"
            INSERT INTO donations (id, donor_id, title, description, category, quantity, unit,
                                   images, latitude, longitude, address, pickup_time_start,
                                   pickup_time_end, expiry_time, status, notes, is_recurring,
                                   recurring_days, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $19)
            RETURNING {}
            "#,
            DONATION_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(donor_id)
            .bind(&req.title)
            .bind(&req.description)
            .bind(req.category)
            .bind(req.quantity)
            .bind(&req.unit)
            .bind(&req.images)
            .bind(req.latitude)
            .bind(req.longitude)
            .bind(&req.address)
            .bind(req.pickup_time_start)
            .bind(req.pickup_time_end)
            .bind(req.expiry_time)
            .bind(DonationStatus::Available)
            .bind(&req.notes)
            .bind(req.is_recurring)
            .bind(&recurring_days)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        let donation = donation_from_row(&row)?;
        tracing::info!("Donor {} posted donation {}", donor_id, donation.id);

        Ok(donation)
    }

    pub async fn get_donation(&self, id: Uuid) -> Result<Donation, PostgresError> {
        let query = format!("SELECT {} FROM donations WHERE id = $1", DONATION_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Donation {}", id)))?;

        Ok(donation_from_row(&row)?)
    }

    /// List donations, newest first
    pub async fn list_donations(
        &self,
        donor_id: Option<Uuid>,
        status: Option<DonationStatus>,
    ) -> Result<Vec<Donation>, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM donations
            WHERE ($1::uuid IS NULL OR donor_id = $1)
              AND ($2::donation_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            DONATION_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(donor_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(donation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Claimable donations inside a bounding box, nearest to `origin` first
    ///
    /// This is the coarse pre-filter; the exact radius check happens in the
    /// matcher. The candidate cap keeps the rows closest to the origin by an
    /// equirectangular approximation, with longitude gaps wrapped at 180°.
    pub async fn nearby_candidates(
        &self,
        origin: &Coordinates,
        bbox: &BoundingBox,
        now: DateTime<Utc>,
    ) -> Result<Vec<Donation>, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM donations
            WHERE status IN ('available', 'requested')
              AND expiry_time > $1
              AND latitude BETWEEN $2 AND $3
              AND longitude BETWEEN $4 AND $5
            ORDER BY power(latitude - $6, 2)
                   + power(LEAST(ABS(longitude - $7), 360 - ABS(longitude - $7)) * $8, 2),
                     created_at DESC
            LIMIT $9
            "#,
            DONATION_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(now)
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(bbox.min_lon)
            .bind(bbox.max_lon)
            .bind(origin.latitude)
            .bind(origin.longitude)
            .bind(origin.latitude.to_radians().cos())
            .bind(MAX_NEARBY_CANDIDATES)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("Bounding box pre-filter returned {} donations", rows.len());

        Ok(rows.iter().map(donation_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Cancel a donation that is still open, together with its pending requests
    pub async fn cancel_donation(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Donation, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            UPDATE donations SET status = 'cancelled', updated_at = $2
            WHERE id = $1 AND status IN ('available', 'requested')
            RETURNING {}
            "#,
            DONATION_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

        let donation = match row {
            Some(row) => donation_from_row(&row)?,
            None => {
                let status: Option<DonationStatus> =
                    sqlx::query_scalar("SELECT status FROM donations WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;

                return Err(match status {
                    Some(status) => TransitionError::DonationClosed(status).into(),
                    None => PostgresError::NotFound(format!("Donation {}", id)),
                });
            }
        };

        let cancelled = sqlx::query(
            r#"
            UPDATE requests SET status = 'cancelled', updated_at = $2
            WHERE donation_id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Cancelled donation {} and {} pending requests",
            id,
            cancelled.rows_affected()
        );

        Ok(donation)
    }

    /// Mark open donations past their expiry as expired
    ///
    /// Pending requests against them are cancelled in the same transaction.
    pub async fn expire_donations(&self, now: DateTime<Utc>) -> Result<u64, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let expired: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE donations SET status = 'expired', updated_at = $1
            WHERE status IN ('available', 'requested') AND expiry_time <= $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        if !expired.is_empty() {
            sqlx::query(
                r#"
                UPDATE requests SET status = 'cancelled', updated_at = $2
                WHERE donation_id = ANY($1) AND status = 'pending'
                "#,
            )
            .bind(&expired)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!("Expired {} donations", expired.len());

        Ok(expired.len() as u64)
    }

    // ---------------------------------------------------------------------
    // Pickup requests
    // ---------------------------------------------------------------------

    /// File a request against a donation
    ///
    /// The donation row is locked while its status and expiry are re-checked,
    /// then the request insert and the donation update commit together.
    pub async fn create_request(
        &self,
        receiver_id: Uuid,
        req: &CreatePickupRequest,
        priority: i32,
        now: DateTime<Utc>,
    ) -> Result<PickupRequest, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let donation = sqlx::query(
            "SELECT status, expiry_time FROM donations WHERE id = $1 FOR UPDATE",
        )
        .bind(req.donation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| PostgresError::NotFound(format!("Donation {}", req.donation_id)))?;

        let status: DonationStatus = donation.try_get("status")?;
        let expiry_time: DateTime<Utc> = donation.try_get("expiry_time")?;

        if expiry_time <= now {
            return Err(PostgresError::Conflict(format!(
                "Donation {} has expired",
                req.donation_id
            )));
        }
        let next_status = donation_status_on_request(status)?;

        let open_requests: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM requests
            WHERE donation_id = $1 AND receiver_id = $2 AND status IN ('pending', 'approved')
            "#,
        )
        .bind(req.donation_id)
        .bind(receiver_id)
        .fetch_one(&mut *tx)
        .await?;

        if open_requests > 0 {
            return Err(PostgresError::Conflict(
                "Receiver already has an open request for this donation".to_string(),
            ));
        }

        let query = format!(
            r#"
            INSERT INTO requests (id, donation_id, receiver_id, status, message,
                                  estimated_pickup_time, priority, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(req.donation_id)
            .bind(receiver_id)
            .bind(RequestStatus::Pending)
            .bind(&req.message)
            .bind(req.estimated_pickup_time)
            .bind(priority)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE donations
            SET total_requests = total_requests + 1, status = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(req.donation_id)
        .bind(next_status)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let request = request_from_row(&row)?;
        tracing::info!(
            "Receiver {} requested donation {} (priority {})",
            receiver_id,
            req.donation_id,
            priority
        );

        Ok(request)
    }

    pub async fn get_request(&self, id: Uuid) -> Result<PickupRequest, PostgresError> {
        let query = format!("SELECT {} FROM requests WHERE id = $1", REQUEST_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Request {}", id)))?;

        Ok(request_from_row(&row)?)
    }

    /// Requests matching the filter, in no particular order
    ///
    /// Callers rank the result with `core::rank_requests`.
    pub async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<PickupRequest>, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM requests
            WHERE ($1::uuid IS NULL OR donation_id = $1)
              AND ($2::uuid IS NULL OR receiver_id = $2)
              AND ($3::request_status IS NULL OR status = $3)
            "#,
            REQUEST_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(filter.donation_id)
            .bind(filter.receiver_id)
            .bind(filter.status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(request_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove a pending or cancelled request
    ///
    /// Approved, completed and rejected requests are part of the handover
    /// history and are refused. The donation goes back to available when no
    /// open request is left.
    pub async fn delete_request(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), PostgresError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_request(&mut tx, id).await?;
        if !current.status.is_deletable() {
            return Err(PostgresError::Conflict(format!(
                "Request {} is {:?} and can no longer be deleted",
                id, current.status
            )));
        }

        sqlx::query("DELETE FROM requests WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        release_donation_if_idle(&mut tx, current.donation_id, now).await?;

        tx.commit().await?;

        Ok(())
    }

    /// Move a request to a new status with all of its side effects
    pub async fn transition_request(
        &self,
        id: Uuid,
        update: &UpdateRequestStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_request(&mut tx, id).await?;
        let plan = plan_transition(current.status, update.status)?;

        let outcome = apply_transition(
            &mut tx,
            &current,
            &plan,
            update.rejection_reason.as_deref(),
            update.actual_pickup_time,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Request {} moved {:?} -> {:?}", id, plan.from, plan.to);

        Ok(outcome)
    }

    /// Complete an approved request when the presented code matches
    pub async fn verify_pickup(
        &self,
        id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_request(&mut tx, id).await?;
        if current.status != RequestStatus::Approved {
            return Err(PostgresError::Conflict(format!(
                "Request {} is {:?}, only approved requests can be picked up",
                id, current.status
            )));
        }

        if !verify_pickup_code(current.pickup_code.as_deref(), code) {
            tracing::warn!("Pickup code mismatch for request {}", id);
            return Err(PostgresError::InvalidInput(
                "Pickup code does not match".to_string(),
            ));
        }

        let plan = plan_transition(current.status, RequestStatus::Completed)?;
        let outcome = apply_transition(&mut tx, &current, &plan, None, Some(now), now).await?;

        tx.commit().await?;

        tracing::info!("Pickup verified for request {}", id);

        Ok(outcome)
    }

    // ---------------------------------------------------------------------
    // Transactions and reviews
    // ---------------------------------------------------------------------

    pub async fn get_transaction(&self, id: Uuid) -> Result<PickupTransaction, PostgresError> {
        let query = format!("SELECT {} FROM transactions WHERE id = $1", TRANSACTION_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Transaction {}", id)))?;

        Ok(transaction_from_row(&row)?)
    }

    /// Handovers where the user is either the donor or the receiver
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PickupTransaction>, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE donor_id = $1 OR receiver_id = $1
            ORDER BY created_at DESC
            "#,
            TRANSACTION_COLUMNS
        );

        let rows = sqlx::query(&query).bind(user_id).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(transaction_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Record a review and refresh the reviewee's trust score
    ///
    /// The trust score becomes the mean of all ratings the reviewee has
    /// received, bounded to [0, 5].
    pub async fn create_review(
        &self,
        reviewer_id: Uuid,
        req: &CreateReviewRequest,
        now: DateTime<Utc>,
    ) -> Result<(Review, f64), PostgresError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {} FROM transactions WHERE id = $1", TRANSACTION_COLUMNS);
        let transaction = sqlx::query(&query)
            .bind(req.transaction_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Transaction {}", req.transaction_id)))
            .and_then(|row| transaction_from_row(&row).map_err(Into::into))?;

        if transaction.completed_at.is_none() {
            return Err(PostgresError::Conflict(
                "Pickup has not been completed yet".to_string(),
            ));
        }

        if transaction.counterparty(reviewer_id) != Some(req.reviewee_id) {
            return Err(PostgresError::InvalidInput(
                "Reviewer and reviewee must be the two parties of the transaction".to_string(),
            ));
        }

        let query = format!(
            r#"
            INSERT INTO reviews (id, transaction_id, reviewer_id, reviewee_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            REVIEW_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(req.transaction_id)
            .bind(reviewer_id)
            .bind(req.reviewee_id)
            .bind(req.rating)
            .bind(&req.comment)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        let review = review_from_row(&row)?;

        let trust_score: f64 = sqlx::query_scalar(
            r#"
            UPDATE users SET
                trust_score = LEAST(5, GREATEST(0, COALESCE(
                    (SELECT AVG(rating) FROM reviews WHERE reviewee_id = $1), 0))),
                updated_at = $2
            WHERE id = $1
            RETURNING trust_score
            "#,
        )
        .bind(req.reviewee_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| PostgresError::NotFound(format!("User {}", req.reviewee_id)))?;

        tx.commit().await?;

        tracing::info!(
            "Review {} recorded, trust score of {} is now {:.2}",
            review.id,
            req.reviewee_id,
            trust_score
        );

        Ok((review, trust_score))
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Load a request and hold its row lock until the transaction ends
async fn lock_request(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<PickupRequest, PostgresError> {
    let query = format!("SELECT {} FROM requests WHERE id = $1 FOR UPDATE", REQUEST_COLUMNS);

    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| PostgresError::NotFound(format!("Request {}", id)))?;

    Ok(request_from_row(&row)?)
}

/// Put a requested donation back to available once no pending or approved
/// request remains
async fn release_donation_if_idle(
    tx: &mut Transaction<'_, Postgres>,
    donation_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), PostgresError> {
    let released = sqlx::query(
        r#"
        UPDATE donations SET status = 'available', updated_at = $2
        WHERE id = $1
          AND status = 'requested'
          AND NOT EXISTS (
              SELECT 1 FROM requests
              WHERE donation_id = $1 AND status IN ('pending', 'approved')
          )
        "#,
    )
    .bind(donation_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    if released.rows_affected() > 0 {
        tracing::debug!("Donation {} is available again", donation_id);
    }

    Ok(())
}

/// Write a planned transition inside the caller's transaction
async fn apply_transition(
    tx: &mut Transaction<'_, Postgres>,
    current: &PickupRequest,
    plan: &TransitionPlan,
    rejection_reason: Option<&str>,
    actual_pickup_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, PostgresError> {
    let pickup_code = plan
        .issue_pickup_code
        .then(|| generate_pickup_code(current.id, now));
    let pickup_time = plan
        .complete_handover
        .then(|| actual_pickup_time.unwrap_or(now));
    let rejection_reason = rejection_reason.filter(|_| plan.to == RequestStatus::Rejected);

    let query = format!(
        r#"
        UPDATE requests SET
            status = $3,
            pickup_code = COALESCE($4, pickup_code),
            rejection_reason = COALESCE($5, rejection_reason),
            actual_pickup_time = COALESCE($6, actual_pickup_time),
            updated_at = $7
        WHERE id = $1 AND status = $2
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    );

    let row = sqlx::query(&query)
        .bind(current.id)
        .bind(plan.from)
        .bind(plan.to)
        .bind(&pickup_code)
        .bind(rejection_reason)
        .bind(pickup_time)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| {
            PostgresError::Conflict(format!("Request {} is no longer {:?}", current.id, plan.from))
        })?;
    let request = request_from_row(&row)?;

    let mut transaction = None;

    if let (Some(code), Some(donation_status)) = (&pickup_code, plan.donation_status) {
        let donor_id: Uuid = sqlx::query_scalar(
            r#"
            UPDATE donations SET status = $2, completed_at = $3, updated_at = $3
            WHERE id = $1 AND status IN ('available', 'requested')
            RETURNING donor_id
            "#,
        )
        .bind(current.donation_id)
        .bind(donation_status)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| {
            PostgresError::Conflict(format!(
                "Donation {} is no longer open for approval",
                current.donation_id
            ))
        })?;

        let query = format!(
            r#"
            INSERT INTO transactions (id, donation_id, request_id, donor_id, receiver_id,
                                      pickup_code, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(current.donation_id)
            .bind(current.id)
            .bind(donor_id)
            .bind(current.receiver_id)
            .bind(code)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;

        transaction = Some(transaction_from_row(&row)?);
    }

    if let Some(completed_at) = pickup_time {
        let query = format!(
            r#"
            UPDATE transactions SET completed_at = $2, updated_at = $3
            WHERE request_id = $1
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(current.id)
            .bind(completed_at)
            .bind(now)
            .fetch_optional(&mut **tx)
            .await?;

        transaction = row.as_ref().map(transaction_from_row).transpose()?;
    }

    if plan.release_donation {
        release_donation_if_idle(tx, current.donation_id, now).await?;
    }

    Ok(TransitionOutcome {
        request,
        transaction,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        role: row.try_get("role")?,
        user_type: row.try_get("user_type")?,
        address: row.try_get("address")?,
        location: Coordinates::from_parts(row.try_get("latitude")?, row.try_get("longitude")?),
        id_card_number: row.try_get("id_card_number")?,
        trust_score: row.try_get("trust_score")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn donation_from_row(row: &PgRow) -> Result<Donation, sqlx::Error> {
    Ok(Donation {
        id: row.try_get("id")?,
        donor_id: row.try_get("donor_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        quantity: row.try_get("quantity")?,
        unit: row.try_get("unit")?,
        images: row.try_get("images")?,
        location: Coordinates::new(row.try_get("latitude")?, row.try_get("longitude")?),
        address: row.try_get("address")?,
        pickup_time_start: row.try_get("pickup_time_start")?,
        pickup_time_end: row.try_get("pickup_time_end")?,
        expiry_time: row.try_get("expiry_time")?,
        status: row.try_get("status")?,
        notes: row.try_get("notes")?,
        is_recurring: row.try_get("is_recurring")?,
        recurring_days: row.try_get("recurring_days")?,
        total_requests: row.try_get("total_requests")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn request_from_row(row: &PgRow) -> Result<PickupRequest, sqlx::Error> {
    Ok(PickupRequest {
        id: row.try_get("id")?,
        donation_id: row.try_get("donation_id")?,
        receiver_id: row.try_get("receiver_id")?,
        status: row.try_get("status")?,
        message: row.try_get("message")?,
        estimated_pickup_time: row.try_get("estimated_pickup_time")?,
        actual_pickup_time: row.try_get("actual_pickup_time")?,
        pickup_code: row.try_get("pickup_code")?,
        priority: row.try_get("priority")?,
        rejection_reason: row.try_get("rejection_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<PickupTransaction, sqlx::Error> {
    Ok(PickupTransaction {
        id: row.try_get("id")?,
        donation_id: row.try_get("donation_id")?,
        request_id: row.try_get("request_id")?,
        donor_id: row.try_get("donor_id")?,
        receiver_id: row.try_get("receiver_id")?,
        pickup_code: row.try_get("pickup_code")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn review_from_row(row: &PgRow) -> Result<Review, sqlx::Error> {
    Ok(Review {
        id: row.try_get("id")?,
        transaction_id: row.try_get("transaction_id")?,
        reviewer_id: row.try_get("reviewer_id")?,
        reviewee_id: row.try_get("reviewee_id")?,
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_is_conflict() {
        let err: PostgresError = TransitionError::InvalidRequestTransition {
            from: RequestStatus::Completed,
            to: RequestStatus::Pending,
        }
        .into();

        assert!(matches!(err, PostgresError::Conflict(_)));
    }

    #[test]
    fn test_request_filter_default_is_unfiltered() {
        let filter = RequestFilter::default();
        assert!(filter.donation_id.is_none());
        assert!(filter.receiver_id.is_none());
        assert!(filter.status.is_none());
    }
}
