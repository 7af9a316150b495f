use async_trait::async_trait;
use domain::{LineItem, Money, Order, OrderStatus};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};

use crate::{OrderId, OrderNumber, OrderStore, PartitionRouter, Result, StoreError};

const SELECT_HEADER: &str = r#"
    SELECT id, order_number, user_id, quantity, total_cents, total_mark_up_cents,
           total_discount_cents, status, idempotent_key, created_at, updated_at
    FROM orders
    WHERE id = $1
"#;

const SELECT_LINE_ITEMS: &str = r#"
    SELECT product_id, quantity, mark_up_cents, discount_cents, final_price_cents
    FROM product_requests
    WHERE order_id = $1
    ORDER BY position ASC
"#;

/// PostgreSQL-backed order store with one connection pool per partition.
///
/// Every partition database carries the same schema (see `migrations/`).
#[derive(Clone)]
pub struct PostgresOrderStore {
    router: PartitionRouter,
    pools: Vec<PgPool>,
}

impl PostgresOrderStore {
    /// Creates a store over existing pools; pool `i` backs partition `i`.
    pub fn new(pools: Vec<PgPool>) -> Result<Self> {
        let router = PartitionRouter::new(pools.len())?;
        Ok(Self { router, pools })
    }

    /// Connects one pool per database URL.
    pub async fn connect(urls: &[String], max_connections: u32) -> Result<Self> {
        let mut pools = Vec::with_capacity(urls.len());
        for url in urls {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await?;
            pools.push(pool);
        }
        tracing::info!(partitions = pools.len(), "connected to partition databases");
        Self::new(pools)
    }

    /// Returns the partition router.
    pub fn router(&self) -> PartitionRouter {
        self.router
    }

    /// Gets the pool backing a partition.
    pub fn pool(&self, partition: usize) -> Result<&PgPool> {
        self.pools.get(partition).ok_or(StoreError::PartitionMissing {
            partition,
            configured: self.pools.len(),
        })
    }

    /// Runs the database migrations against every partition.
    pub async fn run_migrations(&self) -> Result<()> {
        for pool in &self.pools {
            sqlx::migrate!("../../migrations").run(pool).await?;
        }
        Ok(())
    }

    fn row_to_header(row: &PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            order_number: OrderNumber::new(row.try_get("order_number")?),
            user_id: row.try_get::<i64, _>("user_id")?.into(),
            line_items: Vec::new(),
            quantity: to_unsigned(row.try_get("quantity")?)?,
            total: Money::from_cents(row.try_get("total_cents")?),
            total_markup: Money::from_cents(row.try_get("total_mark_up_cents")?),
            total_discount: Money::from_cents(row.try_get("total_discount_cents")?),
            status: OrderStatus::from(row.try_get::<String, _>("status")?),
            idempotency_key: row.try_get("idempotent_key")?,
            created_at: Some(row.try_get("created_at")?),
            updated_at: Some(row.try_get("updated_at")?),
        })
    }

    fn row_to_line_item(row: &PgRow) -> Result<LineItem> {
        Ok(LineItem {
            product_id: row.try_get::<i64, _>("product_id")?.into(),
            quantity: to_unsigned(row.try_get("quantity")?)?,
            markup: Money::from_cents(row.try_get("mark_up_cents")?),
            discount: Money::from_cents(row.try_get("discount_cents")?),
            final_price: Money::from_cents(row.try_get("final_price_cents")?),
        })
    }

    /// Inserts all line items of an order in a single multi-row statement.
    async fn insert_line_items(conn: &mut PgConnection, id: OrderId, items: &[LineItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO product_requests \
             (order_id, position, product_id, quantity, mark_up_cents, discount_cents, final_price_cents) ",
        );
        builder.push_values(items.iter().enumerate(), |mut row, (position, item)| {
            row.push_bind(id.as_i64())
                .push_bind(position as i32)
                .push_bind(item.product_id.as_i64())
                .push_bind(i64::from(item.quantity))
                .push_bind(item.markup.cents())
                .push_bind(item.discount.cents())
                .push_bind(item.final_price.cents());
        });
        builder.build().execute(&mut *conn).await?;
        Ok(())
    }
}

fn to_unsigned<T: TryFrom<i64>>(value: i64) -> Result<T>
where
    T::Error: std::error::Error + Send + Sync + 'static,
{
    T::try_from(value).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn record_commit(operation: &'static str, partition: usize) {
    metrics::counter!(
        "order_store_commits_total",
        "operation" => operation,
        "partition" => partition.to_string()
    )
    .increment(1);
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(order_number = %order.order_number))]
    async fn create(&self, mut order: Order) -> Result<Order> {
        let partition = self.router.partition_for_number(order.order_number);
        let pool = self.pool(partition)?;

        // Dropping the transaction on any early return rolls it back.
        let mut tx = pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, quantity, total_cents,
                                total_mark_up_cents, total_discount_cents, status, idempotent_key)
            VALUES (nextval('orders_id_seq') * $1 + $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(self.router.partition_count() as i64)
        .bind(partition as i64)
        .bind(order.order_number.as_i64())
        .bind(order.user_id.as_i64())
        .bind(order.quantity as i64)
        .bind(order.total.cents())
        .bind(order.total_markup.cents())
        .bind(order.total_discount.cents())
        .bind(order.status.as_str())
        .bind(&order.idempotency_key)
        .fetch_one(&mut *tx)
        .await?;

        let id = OrderId::new(row.try_get("id")?);
        Self::insert_line_items(&mut tx, id, &order.line_items).await?;

        tx.commit().await?;
        record_commit("create", partition);

        order.id = id;
        order.created_at = Some(row.try_get("created_at")?);
        order.updated_at = Some(row.try_get("updated_at")?);
        tracing::debug!(%id, partition, "order created");
        Ok(order)
    }

    #[tracing::instrument(skip(self, order), fields(id = %order.id))]
    async fn update(&self, mut order: Order) -> Result<Order> {
        let partition = self.router.partition_for_number(order.order_number);
        let pool = self.pool(partition)?;
        let mut tx = pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE orders
            SET user_id = $1, quantity = $2, total_cents = $3, total_mark_up_cents = $4,
                total_discount_cents = $5, status = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING created_at, updated_at
            "#,
        )
        .bind(order.user_id.as_i64())
        .bind(order.quantity as i64)
        .bind(order.total.cents())
        .bind(order.total_markup.cents())
        .bind(order.total_discount.cents())
        .bind(order.status.as_str())
        .bind(order.id.as_i64())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(order.id))?;

        sqlx::query("DELETE FROM product_requests WHERE order_id = $1")
            .bind(order.id.as_i64())
            .execute(&mut *tx)
            .await?;

        Self::insert_line_items(&mut tx, order.id, &order.line_items).await?;

        tx.commit().await?;
        record_commit("update", partition);

        order.created_at = Some(row.try_get("created_at")?);
        order.updated_at = Some(row.try_get("updated_at")?);
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, id: OrderId) -> Result<Order> {
        let pool = self.pool(self.router.partition_for_id(id))?;

        let header = sqlx::query(SELECT_HEADER)
            .bind(id.as_i64())
            .fetch_optional(pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        let mut order = Self::row_to_header(&header)?;

        let rows = sqlx::query(SELECT_LINE_ITEMS)
            .bind(id.as_i64())
            .fetch_all(pool)
            .await?;
        order.line_items = rows
            .iter()
            .map(Self::row_to_line_item)
            .collect::<Result<_>>()?;

        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: OrderId) -> Result<()> {
        let partition = self.router.partition_for_id(id);
        let mut tx = self.pool(partition)?.begin().await?;

        sqlx::query("DELETE FROM product_requests WHERE order_id = $1")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::NotFound(id));
        }

        tx.commit().await?;
        record_commit("delete", partition);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, id: OrderId, status: &OrderStatus) -> Result<()> {
        let partition = self.router.partition_for_id(id);

        let updated = sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id.as_i64())
            .execute(self.pool(partition)?)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }

        record_commit("update_status", partition);
        Ok(())
    }
}
